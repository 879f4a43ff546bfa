//! Messaging transport: the narrow surface the bot needs from a chat API.
//!
//! The command layer only ever talks to [`Transport`], so tests drive the
//! whole bot with a recording mock while production uses
//! [`telegram::TelegramTransport`].
//!
//! ## Retry Strategy
//!
//! [`with_retry`] retries transient failures (see
//! [`TransportError::is_transient`]) a bounded number of times with a fixed
//! delay. A rate-limit response that names a `retry_after` replaces the fixed
//! delay for that attempt. Fatal errors return immediately.

pub mod telegram;

use crate::config::RetryPolicy;
use crate::error::TransportError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;

/// Chat the bot replies into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChatId(pub i64);

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Handle to a message the bot sent, for later edits or deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRef {
    pub chat: ChatId,
    pub message_id: i64,
}

/// Outbound calls and file retrieval against a chat API.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send plain text.
    async fn send_text(&self, chat: ChatId, text: &str) -> Result<MessageRef, TransportError>;

    /// Send text with HTML markup (used for user mentions).
    async fn send_html(&self, chat: ChatId, html: &str) -> Result<MessageRef, TransportError>;

    /// Replace the text of a previously sent message.
    async fn edit_text(&self, message: MessageRef, text: &str) -> Result<(), TransportError>;

    async fn delete_message(&self, message: MessageRef) -> Result<(), TransportError>;

    /// Upload a document with a caption.
    async fn send_document(
        &self,
        chat: ChatId,
        bytes: Vec<u8>,
        filename: &str,
        caption: &str,
    ) -> Result<MessageRef, TransportError>;

    /// Fetch the full bytes of an uploaded file.
    async fn download_file(&self, file_id: &str) -> Result<Vec<u8>, TransportError>;
}

/// Run `call` until it succeeds, fails fatally, or attempts run out.
///
/// `op` names the call in log lines.
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    op: &str,
    mut call: F,
) -> Result<T, TransportError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, TransportError>>,
{
    let attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match call().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt < attempts => {
                let wait = match e {
                    TransportError::RateLimited {
                        retry_after_secs: Some(secs),
                    } => Duration::from_secs(secs),
                    _ => policy.delay(),
                };
                warn!(
                    "{}: attempt {}/{} failed ({}), retrying in {}ms",
                    op,
                    attempt,
                    attempts,
                    e,
                    wait.as_millis()
                );
                sleep(wait).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast(attempts: u32) -> RetryPolicy {
        RetryPolicy::new(attempts, 1)
    }

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let out = with_retry(&fast(3), "download", || async move {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(TransportError::Timeout)
            } else {
                Ok(42)
            }
        })
        .await;
        assert_eq!(out, Ok(42));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let out: Result<(), _> = with_retry(&fast(3), "download", || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(TransportError::Server { status: 502 })
        })
        .await;
        assert_eq!(out, Err(TransportError::Server { status: 502 }));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn fatal_error_stops_immediately() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let out: Result<(), _> = with_retry(&fast(5), "send", || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(TransportError::Rejected {
                code: 400,
                description: "chat not found".into(),
            })
        })
        .await;
        assert!(matches!(out, Err(TransportError::Rejected { code: 400, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn rate_limit_retry_after_replaces_fixed_delay() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        // A fixed delay this long would trip the timeout below.
        let slow = RetryPolicy::new(2, 60_000);
        let out = tokio::time::timeout(
            Duration::from_secs(5),
            with_retry(&slow, "send", || async move {
                if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(TransportError::RateLimited {
                        retry_after_secs: Some(0),
                    })
                } else {
                    Ok(())
                }
            }),
        )
        .await;
        assert_eq!(out, Ok(Ok(())));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
