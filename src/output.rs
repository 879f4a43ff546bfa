//! Result types handed back to callers of the session and conversion APIs.

use crate::error::ImageError;
use serde::{Deserialize, Serialize};

/// Outcome of one conversion run. Not persisted.
#[derive(Debug, Clone)]
pub struct ConversionResult {
    /// Finished PDF bytes (one page per succeeded image).
    pub document_bytes: Vec<u8>,
    /// Images that became pages.
    pub succeeded_count: usize,
    /// Images that were skipped.
    pub failed_count: usize,
    /// Images in the batch.
    pub total: usize,
    /// Per-image failures, in batch order.
    pub errors: Vec<ImageError>,
    /// Wall-clock duration of normalization + composition.
    pub duration_ms: u64,
}

impl ConversionResult {
    /// Whether the document has at least one page.
    pub fn has_pages(&self) -> bool {
        self.succeeded_count > 0
    }

    /// Size of the document in MiB, for user-facing captions.
    pub fn size_mib(&self) -> f64 {
        bytes_to_mib(self.document_bytes.len() as u64)
    }
}

/// Answer to a `count` query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCount {
    pub count: usize,
    pub total_bytes: u64,
}

/// Answer to a `status` query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStatus {
    /// Users with at least one stored image.
    pub active_users: usize,
    pub image_count: usize,
    pub total_bytes: u64,
    /// A live (non-expired) conversion lease is held for this user.
    pub busy: bool,
}

pub fn bytes_to_mib(bytes: u64) -> f64 {
    bytes as f64 / 1024.0 / 1024.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mib_conversion() {
        assert_eq!(bytes_to_mib(0), 0.0);
        assert!((bytes_to_mib(3 * 1024 * 1024 / 2) - 1.5).abs() < 1e-9);
    }

    #[test]
    fn has_pages_tracks_successes() {
        let r = ConversionResult {
            document_bytes: vec![],
            succeeded_count: 0,
            failed_count: 2,
            total: 2,
            errors: vec![],
            duration_ms: 1,
        };
        assert!(!r.has_pages());
    }
}
