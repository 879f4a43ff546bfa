//! Conversion orchestration: a user's queued images → one PDF.
//!
//! [`compose_document`] is the synchronous core: it walks the images in
//! insertion order, tallies per-image failures instead of aborting, and
//! reports counters after every image. [`convert_leased`] moves that work
//! onto the blocking pool for a held lease; [`convert_session`] also takes and
//! finishes the lease.

use crate::config::BotConfig;
use crate::error::{ImageError, Photo2PdfError};
use crate::output::ConversionResult;
use crate::pipeline::compose::PdfComposer;
use crate::pipeline::{encode, layout, normalize};
use crate::progress::{ConversionProgress, ConversionProgressCallback, ProgressCallback};
use crate::session::{ConversionLease, SessionStore, UserId};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Convert a user's queued images into a PDF.
///
/// Convenience for callers that keep the document themselves: the snapshot
/// is removed from the session as soon as at least one page was produced.
/// Callers that still have to deliver the document should hold the lease
/// with [`SessionStore::acquire`] and [`convert_leased`], and finish it only
/// once delivery succeeded.
///
/// # Returns
/// `Ok(ConversionResult)` whenever the batch ran, even if every image failed
/// (check `succeeded_count`). When nothing converted the session is left
/// intact for a retry or `/clear`.
///
/// # Errors
/// - [`Photo2PdfError::EmptySession`]: nothing queued
/// - [`Photo2PdfError::AlreadyProcessing`]: another conversion holds the lease
/// - [`Photo2PdfError::Internal`]: the blocking task panicked
/// - [`Photo2PdfError::DocumentBuild`]: the PDF could not be serialised
///
/// The lease is released on every one of these paths.
pub async fn convert_session(
    store: &SessionStore,
    user: UserId,
    config: &BotConfig,
    progress: ProgressCallback,
) -> Result<ConversionResult, Photo2PdfError> {
    let lease = store.acquire(user)?;
    let result = convert_leased(&lease, config, progress).await?;
    lease.finish(result.has_pages());
    Ok(result)
}

/// Convert the images snapshotted by `lease` on the blocking pool.
///
/// The session is left untouched; the caller decides whether to
/// [`ConversionLease::finish`] with or without clearing.
pub async fn convert_leased(
    lease: &ConversionLease<'_>,
    config: &BotConfig,
    progress: ProgressCallback,
) -> Result<ConversionResult, Photo2PdfError> {
    let user = lease.user();
    let images = lease.images().to_vec();
    info!("User {}: converting {} images", user, images.len());

    let cfg = config.clone();
    let result = tokio::task::spawn_blocking(move || {
        compose_document(&images, &cfg, progress.as_ref())
    })
    .await
    .map_err(|e| Photo2PdfError::Internal(format!("Conversion task panicked: {}", e)))??;

    info!(
        "User {}: {}/{} images converted, {} bytes, {}ms",
        user,
        result.succeeded_count,
        result.total,
        result.document_bytes.len(),
        result.duration_ms
    );
    Ok(result)
}

/// Normalize, encode, and compose every image into one document.
///
/// Per-image failures are recorded in [`ConversionResult::errors`]; only a
/// failure to serialise the finished document is returned as `Err`.
pub fn compose_document(
    images: &[Arc<[u8]>],
    config: &BotConfig,
    progress: &dyn ConversionProgressCallback,
) -> Result<ConversionResult, Photo2PdfError> {
    let start = Instant::now();
    let total = images.len();
    let mut composer = PdfComposer::new(config.geometry);
    let mut errors = Vec::new();
    let mut counters = ConversionProgress {
        total,
        ..ConversionProgress::default()
    };

    progress.on_conversion_start(total);

    for (i, raw) in images.iter().enumerate() {
        let index = i + 1;
        match render_page(raw, index, config, &mut composer) {
            Ok(()) => {
                counters.succeeded += 1;
                debug!("Image {}/{} → page {}", index, total, composer.page_count());
            }
            Err(e) => {
                warn!("Skipping image {}/{}: {}", index, total, e);
                counters.failed += 1;
                progress.on_image_error(index, total, &e.to_string());
                errors.push(e);
            }
        }
        counters.processed = index;
        progress.on_image_processed(counters);
    }

    let document_bytes = composer.finish()?;
    progress.on_conversion_complete(counters);

    Ok(ConversionResult {
        document_bytes,
        succeeded_count: counters.succeeded,
        failed_count: counters.failed,
        total,
        errors,
        duration_ms: start.elapsed().as_millis() as u64,
    })
}

/// One image → one page. Nothing is added to `composer` on failure.
fn render_page(
    raw: &[u8],
    index: usize,
    config: &BotConfig,
    composer: &mut PdfComposer,
) -> Result<(), ImageError> {
    let image = normalize::normalize(raw, config.max_image_dimension).map_err(|e| {
        ImageError::InvalidImage {
            index,
            detail: e.to_string(),
        }
    })?;

    let encoded =
        encode::encode_jpeg(&image, config.jpeg_quality).map_err(|e| ImageError::EncodeFailed {
            index,
            detail: e.to_string(),
        })?;

    let placement = layout::fit_and_center(encoded.width, encoded.height, &config.geometry);
    composer
        .add_image_page(&encoded, &placement)
        .map_err(|e| ImageError::EncodeFailed {
            index,
            detail: e.to_string(),
        })
}
