//! Configuration types for the bot and its conversion pipeline.
//!
//! Everything tunable lives in [`BotConfig`], built via [`BotConfigBuilder`].
//! The plain-data parts ([`PageGeometry`], [`ValidationPolicy`],
//! [`RetryPolicy`]) are `serde`-serialisable so they can be logged as one
//! structured record at startup.

use crate::error::Photo2PdfError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Points per millimetre (1 pt = 1/72 in).
const PT_PER_MM: f64 = 72.0 / 25.4;

/// Fixed page size and inset used by the fit-and-center layout.
///
/// All values are PDF points with the origin at the bottom-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageGeometry {
    pub page_width: f64,
    pub page_height: f64,
    pub margin: f64,
}

impl PageGeometry {
    /// ISO A4 portrait (210 × 297 mm).
    pub fn a4(margin: f64) -> Self {
        Self {
            page_width: 210.0 * PT_PER_MM,
            page_height: 297.0 * PT_PER_MM,
            margin,
        }
    }

    /// Widest box an image may occupy.
    pub fn max_width(&self) -> f64 {
        self.page_width - 2.0 * self.margin
    }

    /// Tallest box an image may occupy.
    pub fn max_height(&self) -> f64 {
        self.page_height - 2.0 * self.margin
    }

    fn validate(&self) -> Result<(), Photo2PdfError> {
        if !(self.page_width.is_finite() && self.page_height.is_finite()) {
            return Err(Photo2PdfError::InvalidConfig(
                "page dimensions must be finite".into(),
            ));
        }
        if self.margin < 0.0 {
            return Err(Photo2PdfError::InvalidConfig(format!(
                "margin must be ≥ 0, got {}",
                self.margin
            )));
        }
        if self.max_width() <= 0.0 || self.max_height() <= 0.0 {
            return Err(Photo2PdfError::InvalidConfig(format!(
                "margin {} leaves no printable area on a {}×{} page",
                self.margin, self.page_width, self.page_height
            )));
        }
        Ok(())
    }
}

impl Default for PageGeometry {
    fn default() -> Self {
        Self::a4(30.0)
    }
}

/// When stored payloads are checked for being decodable images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ValidationPolicy {
    /// Store raw bytes unchecked; bad images surface as a failed tally at
    /// conversion time. (default)
    #[default]
    OnConvert,
    /// Decode every payload before storing it and reject the ones that fail.
    OnIngest,
}

/// Bounded fixed-delay retry for messaging API calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts including the first one. Always ≥ 1.
    pub max_attempts: u32,
    /// Delay between attempts when the server gives no `retry_after`.
    pub delay_ms: u64,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay_ms: u64) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay_ms,
        }
    }

    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

/// Configuration for the bot, its session store, and the conversion pipeline.
///
/// # Example
/// ```rust
/// use photo2pdf::{BotConfig, ValidationPolicy};
///
/// let config = BotConfig::builder()
///     .token("123:abc")
///     .margin(20.0)
///     .jpeg_quality(90)
///     .validation(ValidationPolicy::OnIngest)
///     .build()
///     .unwrap();
/// assert_eq!(config.geometry.margin, 20.0);
/// ```
#[derive(Clone)]
pub struct BotConfig {
    /// Bot API token. Never logged.
    pub token: String,

    /// Base URL of the Bot API. Default: `https://api.telegram.org`.
    pub api_url: String,

    /// Page size and margin for every output page. Default: A4, 30 pt margin.
    pub geometry: PageGeometry,

    /// JPEG quality (1–100) for embedded page images. Default: 95.
    pub jpeg_quality: u8,

    /// Longest allowed image side after normalization. Default: 4096.
    pub max_image_dimension: u32,

    /// Largest single payload accepted, in bytes. Default: 50 MiB.
    pub max_file_size: u64,

    /// Payloads above this size get a "downloading…" notice. Default: 5 MiB.
    pub large_file_notice: u64,

    /// Maximum queued images per user. Default: 200.
    pub max_images_per_user: usize,

    /// Maximum queued bytes per user. Default: 512 MiB.
    pub max_bytes_per_user: u64,

    /// When payloads are checked for decodability. Default: on convert.
    pub validation: ValidationPolicy,

    /// Age after which a conversion lease is considered abandoned. Default: 600 s.
    pub lease_timeout_secs: u64,

    /// Retry policy for file downloads. Default: 3 attempts, 1 s apart.
    pub download_retry: RetryPolicy,

    /// Retry policy for outbound messages. Default: 2 attempts, 1 s apart.
    pub send_retry: RetryPolicy,

    /// Long-polling timeout for `getUpdates`. Default: 30 s.
    pub poll_timeout_secs: u64,

    /// Per-request HTTP timeout for non-polling calls. Default: 60 s.
    pub request_timeout_secs: u64,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            api_url: "https://api.telegram.org".to_string(),
            geometry: PageGeometry::default(),
            jpeg_quality: 95,
            max_image_dimension: 4096,
            max_file_size: 50 * 1024 * 1024,
            large_file_notice: 5 * 1024 * 1024,
            max_images_per_user: 200,
            max_bytes_per_user: 512 * 1024 * 1024,
            validation: ValidationPolicy::default(),
            lease_timeout_secs: 600,
            download_retry: RetryPolicy::new(3, 1000),
            send_retry: RetryPolicy::new(2, 1000),
            poll_timeout_secs: 30,
            request_timeout_secs: 60,
        }
    }
}

impl fmt::Debug for BotConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BotConfig")
            .field("token", &"<redacted>")
            .field("api_url", &self.api_url)
            .field("geometry", &self.geometry)
            .field("jpeg_quality", &self.jpeg_quality)
            .field("max_image_dimension", &self.max_image_dimension)
            .field("max_file_size", &self.max_file_size)
            .field("max_images_per_user", &self.max_images_per_user)
            .field("max_bytes_per_user", &self.max_bytes_per_user)
            .field("validation", &self.validation)
            .field("lease_timeout_secs", &self.lease_timeout_secs)
            .field("download_retry", &self.download_retry)
            .field("send_retry", &self.send_retry)
            .finish()
    }
}

impl BotConfig {
    /// Create a new builder for `BotConfig`.
    pub fn builder() -> BotConfigBuilder {
        BotConfigBuilder {
            config: Self::default(),
        }
    }

    pub fn lease_timeout(&self) -> Duration {
        Duration::from_secs(self.lease_timeout_secs)
    }
}

/// Builder for [`BotConfig`].
#[derive(Debug)]
pub struct BotConfigBuilder {
    config: BotConfig,
}

impl BotConfigBuilder {
    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.config.token = token.into();
        self
    }

    pub fn api_url(mut self, url: impl Into<String>) -> Self {
        self.config.api_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn geometry(mut self, geometry: PageGeometry) -> Self {
        self.config.geometry = geometry;
        self
    }

    pub fn margin(mut self, margin: f64) -> Self {
        self.config.geometry.margin = margin;
        self
    }

    pub fn jpeg_quality(mut self, q: u8) -> Self {
        self.config.jpeg_quality = q.clamp(1, 100);
        self
    }

    pub fn max_image_dimension(mut self, px: u32) -> Self {
        self.config.max_image_dimension = px.max(16);
        self
    }

    pub fn max_file_size(mut self, bytes: u64) -> Self {
        self.config.max_file_size = bytes;
        self
    }

    pub fn large_file_notice(mut self, bytes: u64) -> Self {
        self.config.large_file_notice = bytes;
        self
    }

    pub fn max_images_per_user(mut self, n: usize) -> Self {
        self.config.max_images_per_user = n.max(1);
        self
    }

    pub fn max_bytes_per_user(mut self, bytes: u64) -> Self {
        self.config.max_bytes_per_user = bytes;
        self
    }

    pub fn validation(mut self, policy: ValidationPolicy) -> Self {
        self.config.validation = policy;
        self
    }

    pub fn lease_timeout_secs(mut self, secs: u64) -> Self {
        self.config.lease_timeout_secs = secs;
        self
    }

    pub fn download_retry(mut self, policy: RetryPolicy) -> Self {
        self.config.download_retry = policy;
        self
    }

    pub fn send_retry(mut self, policy: RetryPolicy) -> Self {
        self.config.send_retry = policy;
        self
    }

    pub fn poll_timeout_secs(mut self, secs: u64) -> Self {
        self.config.poll_timeout_secs = secs;
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs.max(1);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<BotConfig, Photo2PdfError> {
        let c = &self.config;
        c.geometry.validate()?;
        if c.max_file_size == 0 {
            return Err(Photo2PdfError::InvalidConfig(
                "max_file_size must be > 0".into(),
            ));
        }
        if c.max_bytes_per_user < c.max_file_size {
            return Err(Photo2PdfError::InvalidConfig(format!(
                "max_bytes_per_user ({}) is smaller than max_file_size ({})",
                c.max_bytes_per_user, c.max_file_size
            )));
        }
        if c.lease_timeout_secs == 0 {
            return Err(Photo2PdfError::InvalidConfig(
                "lease_timeout_secs must be ≥ 1".into(),
            ));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn a4_geometry_matches_iso_size() {
        let g = PageGeometry::default();
        assert!((g.page_width - 595.2756).abs() < 1e-3);
        assert!((g.page_height - 841.8898).abs() < 1e-3);
        assert!((g.max_width() - 535.2756).abs() < 1e-3);
        assert!((g.max_height() - 781.8898).abs() < 1e-3);
    }

    #[test]
    fn defaults_follow_documented_values() {
        let c = BotConfig::default();
        assert_eq!(c.jpeg_quality, 95);
        assert_eq!(c.max_image_dimension, 4096);
        assert_eq!(c.max_file_size, 50 * 1024 * 1024);
        assert_eq!(c.download_retry.max_attempts, 3);
        assert_eq!(c.validation, ValidationPolicy::OnConvert);
    }

    #[test]
    fn builder_clamps_quality() {
        let c = BotConfig::builder().jpeg_quality(0).build().unwrap();
        assert_eq!(c.jpeg_quality, 1);
        let c = BotConfig::builder().jpeg_quality(200).build().unwrap();
        assert_eq!(c.jpeg_quality, 100);
    }

    #[test]
    fn oversized_margin_rejected() {
        let err = BotConfig::builder().margin(400.0).build().unwrap_err();
        assert!(matches!(err, Photo2PdfError::InvalidConfig(_)));
    }

    #[test]
    fn quota_smaller_than_file_limit_rejected() {
        let err = BotConfig::builder()
            .max_file_size(10)
            .max_bytes_per_user(5)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("max_bytes_per_user"));
    }

    #[test]
    fn api_url_trailing_slash_trimmed() {
        let c = BotConfig::builder()
            .api_url("http://localhost:8081/")
            .build()
            .unwrap();
        assert_eq!(c.api_url, "http://localhost:8081");
    }

    #[test]
    fn debug_redacts_token() {
        let c = BotConfig::builder().token("secret-token").build().unwrap();
        let dbg = format!("{c:?}");
        assert!(!dbg.contains("secret-token"));
    }

    #[test]
    fn retry_policy_has_at_least_one_attempt() {
        assert_eq!(RetryPolicy::new(0, 10).max_attempts, 1);
    }
}
