//! Per-user image queues and the conversion lease.
//!
//! The store is the only shared mutable state in the process. Every operation
//! takes the mutex for one short critical section; the busy check and the
//! lease grant happen in the same section, so two concurrent conversions for
//! one user cannot both start.
//!
//! A lease is released by [`ConversionLease`]'s `Drop`, which covers normal
//! completion, early returns, a panicking blocking task, and a cancelled
//! future alike. A lease older than the configured timeout is treated as
//! abandoned and may be taken over; lease ids keep a late `Drop` of the old
//! guard from releasing the new one.

use crate::config::BotConfig;
use crate::error::Photo2PdfError;
use crate::output::{SessionCount, SessionStatus};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Stable per-user identity assigned by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Ingestion limits enforced by [`SessionStore::add_image`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionLimits {
    pub max_file_size: u64,
    pub max_images_per_user: usize,
    pub max_bytes_per_user: u64,
    pub lease_timeout: Duration,
}

impl From<&BotConfig> for SessionLimits {
    fn from(c: &BotConfig) -> Self {
        Self {
            max_file_size: c.max_file_size,
            max_images_per_user: c.max_images_per_user,
            max_bytes_per_user: c.max_bytes_per_user,
            lease_timeout: c.lease_timeout(),
        }
    }
}

impl Default for SessionLimits {
    fn default() -> Self {
        Self::from(&BotConfig::default())
    }
}

#[derive(Debug, Clone, Copy)]
struct Lease {
    id: u64,
    acquired_at: Instant,
}

#[derive(Debug, Default)]
struct UserSession {
    pending_images: Vec<Arc<[u8]>>,
    total_bytes: u64,
    lease: Option<Lease>,
}

impl UserSession {
    /// A lease that exists and has not timed out.
    fn live_lease(&self, timeout: Duration) -> Option<Lease> {
        self.lease.filter(|l| l.acquired_at.elapsed() < timeout)
    }
}

/// Process-wide map from user to pending images and lease state.
pub struct SessionStore {
    sessions: Mutex<HashMap<UserId, UserSession>>,
    limits: SessionLimits,
    next_lease_id: AtomicU64,
}

impl SessionStore {
    pub fn new(limits: SessionLimits) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            limits,
            next_lease_id: AtomicU64::new(1),
        }
    }

    pub fn limits(&self) -> &SessionLimits {
        &self.limits
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<UserId, UserSession>> {
        // A panic while holding the lock cannot leave a session half-updated:
        // no code below panics between changing the queue and its byte count.
        self.sessions.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Append a payload to the user's queue.
    ///
    /// Returns the new number of queued images.
    pub fn add_image(&self, user: UserId, bytes: Vec<u8>) -> Result<usize, Photo2PdfError> {
        let size = bytes.len() as u64;
        if size > self.limits.max_file_size {
            return Err(Photo2PdfError::PayloadTooLarge {
                size,
                limit: self.limits.max_file_size,
            });
        }

        let mut sessions = self.lock();
        if let Some(session) = sessions.get(&user) {
            if session.live_lease(self.limits.lease_timeout).is_some() {
                return Err(Photo2PdfError::AlreadyProcessing);
            }
            if session.pending_images.len() >= self.limits.max_images_per_user {
                return Err(Photo2PdfError::QuotaExceeded {
                    detail: format!("at most {} images", self.limits.max_images_per_user),
                });
            }
            if session.total_bytes + size > self.limits.max_bytes_per_user {
                return Err(Photo2PdfError::QuotaExceeded {
                    detail: format!("at most {} bytes", self.limits.max_bytes_per_user),
                });
            }
        }

        let session = sessions.entry(user).or_default();
        session.pending_images.push(Arc::from(bytes));
        session.total_bytes += size;
        let count = session.pending_images.len();
        debug!("User {}: stored image #{} ({} bytes)", user, count, size);
        Ok(count)
    }

    /// Drop every queued image for `user`.
    ///
    /// Returns how many images were removed (0 when there was no session).
    pub fn clear(&self, user: UserId) -> Result<usize, Photo2PdfError> {
        let mut sessions = self.lock();
        if let Some(session) = sessions.get(&user) {
            if session.live_lease(self.limits.lease_timeout).is_some() {
                return Err(Photo2PdfError::AlreadyProcessing);
            }
        }
        let removed = sessions
            .remove(&user)
            .map(|s| s.pending_images.len())
            .unwrap_or(0);
        if removed > 0 {
            info!("User {}: cleared {} images", user, removed);
        }
        Ok(removed)
    }

    /// Number and total size of queued images. Read-only.
    pub fn count(&self, user: UserId) -> SessionCount {
        self.lock()
            .get(&user)
            .map(|s| SessionCount {
                count: s.pending_images.len(),
                total_bytes: s.total_bytes,
            })
            .unwrap_or_default()
    }

    /// Store-wide and per-user status. Read-only.
    pub fn status(&self, user: UserId) -> SessionStatus {
        let sessions = self.lock();
        let active_users = sessions
            .values()
            .filter(|s| !s.pending_images.is_empty())
            .count();
        match sessions.get(&user) {
            Some(s) => SessionStatus {
                active_users,
                image_count: s.pending_images.len(),
                total_bytes: s.total_bytes,
                busy: s.live_lease(self.limits.lease_timeout).is_some(),
            },
            None => SessionStatus {
                active_users,
                ..SessionStatus::default()
            },
        }
    }

    /// Atomically mark the user's session busy and snapshot its images.
    ///
    /// Fails with [`Photo2PdfError::EmptySession`] when nothing is queued and
    /// [`Photo2PdfError::AlreadyProcessing`] when a live lease exists.
    pub fn acquire(&self, user: UserId) -> Result<ConversionLease<'_>, Photo2PdfError> {
        let mut sessions = self.lock();
        let session = match sessions.get_mut(&user) {
            Some(s) if !s.pending_images.is_empty() => s,
            _ => return Err(Photo2PdfError::EmptySession),
        };

        if let Some(lease) = session.lease {
            if lease.acquired_at.elapsed() < self.limits.lease_timeout {
                return Err(Photo2PdfError::AlreadyProcessing);
            }
            warn!(
                "User {}: lease {} expired after {:?}; taking over",
                user,
                lease.id,
                lease.acquired_at.elapsed()
            );
        }

        let id = self.next_lease_id.fetch_add(1, Ordering::Relaxed);
        session.lease = Some(Lease {
            id,
            acquired_at: Instant::now(),
        });
        debug!("User {}: acquired lease {}", user, id);

        Ok(ConversionLease {
            store: self,
            user,
            id,
            images: session.pending_images.clone(),
            finished: false,
        })
    }

    /// Release `lease_id` if it is still the user's current lease.
    ///
    /// `consumed` is the length of the lease's snapshot; that many images are
    /// removed from the front of the queue. Images queued after an expired
    /// lease stay, and the session is dropped only once it is empty.
    fn release(&self, user: UserId, lease_id: u64, consumed: usize) {
        let mut sessions = self.lock();
        let Some(session) = sessions.get_mut(&user) else {
            return;
        };
        if session.lease.map(|l| l.id) != Some(lease_id) {
            debug!("User {}: lease {} already superseded", user, lease_id);
            return;
        }
        session.lease = None;
        if consumed == 0 {
            debug!("User {}: released lease {}", user, lease_id);
            return;
        }

        let n = consumed.min(session.pending_images.len());
        let freed: u64 = session
            .pending_images
            .drain(..n)
            .map(|image| image.len() as u64)
            .sum();
        session.total_bytes = session.total_bytes.saturating_sub(freed);
        if session.pending_images.is_empty() {
            sessions.remove(&user);
            debug!("User {}: session cleared after conversion", user);
        } else {
            info!(
                "User {}: removed {} converted images, {} queued since are kept",
                user,
                n,
                session.pending_images.len()
            );
        }
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(SessionLimits::default())
    }
}

/// Exclusive right to convert one user's session.
///
/// Dropping the guard clears the busy state. [`ConversionLease::finish`]
/// additionally removes the snapshotted images once their document has been
/// delivered.
pub struct ConversionLease<'a> {
    store: &'a SessionStore,
    user: UserId,
    id: u64,
    images: Vec<Arc<[u8]>>,
    finished: bool,
}

impl ConversionLease<'_> {
    pub fn user(&self) -> UserId {
        self.user
    }

    /// Snapshot of the queued images, in insertion order.
    pub fn images(&self) -> &[Arc<[u8]>] {
        &self.images
    }

    /// Release the lease; when `clear_session`, also remove the images in
    /// this lease's snapshot. Images queued after the snapshot are kept.
    pub fn finish(mut self, clear_session: bool) {
        self.finished = true;
        let consumed = if clear_session { self.images.len() } else { 0 };
        self.store.release(self.user, self.id, consumed);
    }
}

impl Drop for ConversionLease<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.store.release(self.user, self.id, 0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALICE: UserId = UserId(1);
    const BOB: UserId = UserId(2);

    fn store() -> SessionStore {
        SessionStore::new(SessionLimits {
            max_file_size: 100,
            max_images_per_user: 3,
            max_bytes_per_user: 250,
            lease_timeout: Duration::from_secs(600),
        })
    }

    #[test]
    fn add_preserves_order_and_counts_bytes() {
        let s = store();
        assert_eq!(s.add_image(ALICE, vec![1; 10]).unwrap(), 1);
        assert_eq!(s.add_image(ALICE, vec![2; 20]).unwrap(), 2);
        assert_eq!(
            s.count(ALICE),
            SessionCount {
                count: 2,
                total_bytes: 30
            }
        );

        let lease = s.acquire(ALICE).unwrap();
        assert_eq!(lease.images()[0][0], 1);
        assert_eq!(lease.images()[1][0], 2);
    }

    #[test]
    fn count_and_status_do_not_create_sessions() {
        let s = store();
        assert_eq!(s.count(ALICE), SessionCount::default());
        assert_eq!(s.status(ALICE), SessionStatus::default());
        assert!(matches!(s.acquire(ALICE), Err(Photo2PdfError::EmptySession)));
        assert_eq!(s.status(BOB).active_users, 0);
    }

    #[test]
    fn clear_then_count_is_zero() {
        let s = store();
        s.add_image(ALICE, vec![0; 5]).unwrap();
        assert_eq!(s.clear(ALICE).unwrap(), 1);
        assert_eq!(s.count(ALICE).count, 0);
        assert_eq!(s.clear(ALICE).unwrap(), 0);
    }

    #[test]
    fn busy_session_rejects_ingest_clear_and_second_acquire() {
        let s = store();
        s.add_image(ALICE, vec![0; 5]).unwrap();
        let lease = s.acquire(ALICE).unwrap();

        assert!(s.status(ALICE).busy);
        assert!(matches!(
            s.add_image(ALICE, vec![0; 5]),
            Err(Photo2PdfError::AlreadyProcessing)
        ));
        assert!(matches!(s.clear(ALICE), Err(Photo2PdfError::AlreadyProcessing)));
        assert!(matches!(s.acquire(ALICE), Err(Photo2PdfError::AlreadyProcessing)));
        assert_eq!(s.count(ALICE).count, 1);

        // Other users are unaffected.
        s.add_image(BOB, vec![0; 5]).unwrap();

        drop(lease);
        assert!(!s.status(ALICE).busy);
        assert_eq!(s.count(ALICE).count, 1);
        s.add_image(ALICE, vec![0; 5]).unwrap();
    }

    #[test]
    fn finish_with_clear_removes_session() {
        let s = store();
        s.add_image(ALICE, vec![0; 5]).unwrap();
        s.acquire(ALICE).unwrap().finish(true);
        assert_eq!(s.count(ALICE).count, 0);
        assert!(!s.status(ALICE).busy);
    }

    #[test]
    fn finish_without_clear_keeps_images() {
        let s = store();
        s.add_image(ALICE, vec![0; 5]).unwrap();
        s.acquire(ALICE).unwrap().finish(false);
        assert_eq!(s.count(ALICE).count, 1);
        assert!(!s.status(ALICE).busy);
    }

    #[test]
    fn limits_are_enforced() {
        let s = store();
        assert!(matches!(
            s.add_image(ALICE, vec![0; 101]),
            Err(Photo2PdfError::PayloadTooLarge { size: 101, limit: 100 })
        ));
        s.add_image(ALICE, vec![0; 100]).unwrap();
        s.add_image(ALICE, vec![0; 100]).unwrap();
        assert!(matches!(
            s.add_image(ALICE, vec![0; 60]),
            Err(Photo2PdfError::QuotaExceeded { .. })
        ));
        s.add_image(ALICE, vec![0; 50]).unwrap();
        assert!(matches!(
            s.add_image(ALICE, vec![0; 1]),
            Err(Photo2PdfError::QuotaExceeded { .. })
        ));
        assert_eq!(s.count(ALICE).count, 3);
    }

    #[test]
    fn stale_lease_expires_and_old_guard_cannot_release_new_one() {
        let s = SessionStore::new(SessionLimits {
            lease_timeout: Duration::from_millis(20),
            ..SessionLimits::default()
        });
        s.add_image(ALICE, vec![0; 5]).unwrap();
        let stale = s.acquire(ALICE).unwrap();
        std::thread::sleep(Duration::from_millis(40));

        assert!(!s.status(ALICE).busy);
        let fresh = s.acquire(ALICE).unwrap();
        drop(stale);
        assert!(s.status(ALICE).busy, "old guard released the new lease");
        drop(fresh);
        assert!(!s.status(ALICE).busy);
    }

    #[test]
    fn late_finish_of_expired_lease_keeps_images_added_after_it() {
        let s = SessionStore::new(SessionLimits {
            lease_timeout: Duration::from_millis(20),
            ..SessionLimits::default()
        });
        s.add_image(ALICE, vec![1; 5]).unwrap();
        let slow = s.acquire(ALICE).unwrap();
        std::thread::sleep(Duration::from_millis(40));

        // The expired lease no longer blocks ingest.
        assert_eq!(s.add_image(ALICE, vec![2; 7]).unwrap(), 2);
        slow.finish(true);

        assert_eq!(
            s.count(ALICE),
            SessionCount {
                count: 1,
                total_bytes: 7
            }
        );
        assert!(!s.status(ALICE).busy);
        let lease = s.acquire(ALICE).unwrap();
        assert_eq!(lease.images()[0][0], 2);
    }

    #[test]
    fn concurrent_acquire_grants_exactly_one() {
        let s = Arc::new(store());
        s.add_image(ALICE, vec![0; 5]).unwrap();
        let barrier = Arc::new(std::sync::Barrier::new(8));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let s = Arc::clone(&s);
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    barrier.wait();
                    // Keep the lease alive until every thread has tried.
                    s.acquire(ALICE).map(|lease| {
                        std::thread::sleep(Duration::from_millis(200));
                        lease.finish(false);
                    })
                })
            })
            .collect();
        let granted = handles
            .into_iter()
            .map(|h| h.join().unwrap().is_ok())
            .filter(|&ok| ok)
            .count();
        assert_eq!(granted, 1);
    }
}
