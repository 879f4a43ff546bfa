//! Progress-callback trait for per-image conversion events.
//!
//! The orchestrator runs on a blocking thread and must not await the
//! transport, so it only reports counters through
//! [`ConversionProgressCallback`]. The command layer decides how often to turn
//! those counters into chat edits (see [`should_report`]); a channel-backed
//! implementation lives in [`crate::stream`].
//!
//! # Example
//!
//! ```rust
//! use photo2pdf::{ConversionProgress, ConversionProgressCallback};
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! struct Counting(AtomicUsize);
//!
//! impl ConversionProgressCallback for Counting {
//!     fn on_image_processed(&self, progress: ConversionProgress) {
//!         self.0.store(progress.processed, Ordering::SeqCst);
//!     }
//! }
//!
//! let cb = Counting(AtomicUsize::new(0));
//! cb.on_image_processed(ConversionProgress { processed: 2, succeeded: 2, failed: 0, total: 5 });
//! assert_eq!(cb.0.load(Ordering::SeqCst), 2);
//! ```

use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Counters after each processed image.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionProgress {
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub total: usize,
}

impl ConversionProgress {
    /// Whole-number percentage of images processed.
    pub fn percent(&self) -> usize {
        if self.total == 0 {
            100
        } else {
            self.processed * 100 / self.total
        }
    }
}

/// Called by the orchestrator as it processes each image.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Calls arrive from a blocking worker thread.
pub trait ConversionProgressCallback: Send + Sync {
    /// Called once before the first image.
    fn on_conversion_start(&self, total: usize) {
        let _ = total;
    }

    /// Called after every image, whether it succeeded or failed.
    fn on_image_processed(&self, progress: ConversionProgress) {
        let _ = progress;
    }

    /// Called when an image is skipped.
    ///
    /// # Arguments
    /// * `index` — 1-based position in the batch
    /// * `error` — human-readable error description (for logs, not users)
    fn on_image_error(&self, index: usize, total: usize, error: &str) {
        let _ = (index, total, error);
    }

    /// Called once after every image has been attempted.
    fn on_conversion_complete(&self, progress: ConversionProgress) {
        let _ = progress;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ConversionProgressCallback for NoopProgressCallback {}

/// Convenience alias for a shareable callback.
pub type ProgressCallback = Arc<dyn ConversionProgressCallback>;

/// Whether a chat progress edit should be sent after image `processed`.
///
/// Large batches (> 10 images) report every 5th image; small ones every 2nd.
pub fn should_report(processed: usize, total: usize) -> bool {
    if processed == 0 {
        return false;
    }
    if total > 10 {
        processed % 5 == 0
    } else {
        processed % 2 == 0
    }
}
