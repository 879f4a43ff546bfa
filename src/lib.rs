//! # photo2pdf
//!
//! A Telegram bot that collects the photos a user sends and turns them into a
//! single PDF, one page per photo, on request.
//!
//! ## Flow
//!
//! ```text
//! photo ─▶ transport download ─▶ SessionStore (per-user queue)
//!
//! /convert
//!  │
//!  ├─ 1. Lease     acquire the user's conversion lease (one at a time)
//!  ├─ 2. Normalize decode, EXIF-rotate, L8/RGB8, cap size (spawn_blocking)
//!  ├─ 3. Encode    JPEG for a /DCTDecode image stream
//!  ├─ 4. Layout    fit inside the A4 margin box, centered, never upscaled
//!  ├─ 5. Compose   append one page per image (lopdf)
//!  └─ 6. Deliver   send the document, clear the session, release the lease
//! ```
//!
//! A corrupt photo costs only its own page: per-image failures are tallied in
//! [`ConversionResult`] and the rest of the batch still becomes a document.
//!
//! ## Using the library without Telegram
//!
//! ```rust
//! use photo2pdf::{convert_session, BotConfig, NoopProgressCallback, SessionStore, UserId};
//! use std::sync::Arc;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), photo2pdf::Photo2PdfError> {
//! let store = SessionStore::default();
//! let mut png = Vec::new();
//! image::DynamicImage::new_rgb8(40, 30)
//!     .write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
//!     .unwrap();
//! store.add_image(UserId(1), png)?;
//!
//! let result = convert_session(
//!     &store,
//!     UserId(1),
//!     &BotConfig::default(),
//!     Arc::new(NoopProgressCallback),
//! )
//! .await?;
//! assert_eq!(result.succeeded_count, 1);
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `photo2pdf-bot` binary (clap + anyhow + tracing-subscriber) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod bot;
pub mod config;
pub mod convert;
pub mod error;
pub mod messages;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod session;
pub mod stream;
pub mod transport;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use bot::{Bot, Command, InboundEvent};
pub use config::{BotConfig, BotConfigBuilder, PageGeometry, RetryPolicy, ValidationPolicy};
pub use convert::{compose_document, convert_leased, convert_session};
pub use error::{ImageError, Photo2PdfError, TransportError};
pub use output::{ConversionResult, SessionCount, SessionStatus};
pub use progress::{ConversionProgress, ConversionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use session::{ConversionLease, SessionLimits, SessionStore, UserId};
pub use stream::{progress_channel, ProgressEvent, ProgressStream};
pub use transport::telegram::TelegramTransport;
pub use transport::{ChatId, MessageRef, Transport};
