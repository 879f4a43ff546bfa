//! Error types for the photo2pdf library.
//!
//! Three error types map onto three failure modes:
//!
//! * [`Photo2PdfError`] — **Operation-level**: a session operation or a whole
//!   conversion cannot proceed (session busy, nothing to convert, quota hit,
//!   transport gave up). Returned as `Err(Photo2PdfError)`.
//!
//! * [`ImageError`] — **Non-fatal**: one stored image could not be turned into
//!   a page. Collected in [`crate::output::ConversionResult::errors`] so a
//!   single corrupt photo never costs the user the rest of the document.
//!
//! * [`TransportError`] — a messaging API call failed. Split into transient
//!   and fatal kinds; [`TransportError::is_transient`] drives the retry policy
//!   in [`crate::transport::with_retry`].

use thiserror::Error;

/// All operation-level errors returned by the photo2pdf library.
///
/// Image-level failures use [`ImageError`] and are tallied in
/// [`crate::output::ConversionResult`] rather than propagated here.
#[derive(Debug, Error)]
pub enum Photo2PdfError {
    // ── Session errors ────────────────────────────────────────────────────
    /// A conversion is in flight for this user.
    #[error("A conversion is already in progress for this user")]
    AlreadyProcessing,

    /// The user has no stored images.
    #[error("No images stored for this user")]
    EmptySession,

    // ── Resource limits ───────────────────────────────────────────────────
    /// A single payload is larger than the per-file limit.
    #[error("Payload of {size} bytes exceeds the {limit}-byte file limit")]
    PayloadTooLarge { size: u64, limit: u64 },

    /// Accepting the payload would exceed the per-user quota.
    #[error("Per-user quota exceeded: {detail}")]
    QuotaExceeded { detail: String },

    /// The payload was rejected by the validate-on-ingest policy.
    #[error("Payload is not a decodable image: {detail}")]
    InvalidPayload { detail: String },

    // ── Transport errors ──────────────────────────────────────────────────
    /// The messaging API failed after retries (or fatally).
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    // ── Document errors ───────────────────────────────────────────────────
    /// The PDF could not be serialised.
    #[error("Failed to build PDF document: {0}")]
    DocumentBuild(String),

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single stored image.
///
/// `index` is 1-based, matching the order in which the user sent the images.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum ImageError {
    /// The payload did not decode as a supported raster format.
    #[error("Image {index}: not a valid image: {detail}")]
    InvalidImage { index: usize, detail: String },

    /// The normalized image could not be re-encoded for embedding.
    #[error("Image {index}: encoding failed: {detail}")]
    EncodeFailed { index: usize, detail: String },
}

impl ImageError {
    /// 1-based position of the failing image in the session.
    pub fn index(&self) -> usize {
        match self {
            ImageError::InvalidImage { index, .. } | ImageError::EncodeFailed { index, .. } => {
                *index
            }
        }
    }
}

/// Failure of a single messaging API call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// HTTP 429: the server asked us to wait.
    #[error("Rate limited by the messaging API (retry after {retry_after_secs:?}s)")]
    RateLimited { retry_after_secs: Option<u64> },

    /// The request did not complete in time.
    #[error("Request to the messaging API timed out")]
    Timeout,

    /// Connection-level failure.
    #[error("Network error: {0}")]
    Network(String),

    /// 5xx from the messaging API.
    #[error("Messaging API server error (HTTP {status})")]
    Server { status: u16 },

    /// The API refused the request (bad request, forbidden, not found).
    #[error("Messaging API rejected the request ({code}): {description}")]
    Rejected { code: i64, description: String },

    /// The response could not be decoded.
    #[error("Malformed response from the messaging API: {0}")]
    Malformed(String),
}

impl TransportError {
    /// Whether retrying the same call may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            TransportError::RateLimited { .. }
                | TransportError::Timeout
                | TransportError::Network(_)
                | TransportError::Server { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_too_large_display() {
        let e = Photo2PdfError::PayloadTooLarge {
            size: 60,
            limit: 50,
        };
        let msg = e.to_string();
        assert!(msg.contains("60"), "got: {msg}");
        assert!(msg.contains("50"), "got: {msg}");
    }

    #[test]
    fn transport_error_converts() {
        let e: Photo2PdfError = TransportError::Timeout.into();
        assert!(matches!(e, Photo2PdfError::Transport(TransportError::Timeout)));
    }

    #[test]
    fn transient_classification() {
        assert!(TransportError::RateLimited {
            retry_after_secs: Some(3)
        }
        .is_transient());
        assert!(TransportError::Timeout.is_transient());
        assert!(TransportError::Network("reset".into()).is_transient());
        assert!(TransportError::Server { status: 502 }.is_transient());
        assert!(!TransportError::Rejected {
            code: 400,
            description: "Bad Request: chat not found".into()
        }
        .is_transient());
        assert!(!TransportError::Malformed("eof".into()).is_transient());
    }

    #[test]
    fn image_error_index() {
        let e = ImageError::InvalidImage {
            index: 4,
            detail: "bad header".into(),
        };
        assert_eq!(e.index(), 4);
        assert!(e.to_string().contains("Image 4"));
    }
}
