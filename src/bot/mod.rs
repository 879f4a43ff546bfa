//! Command layer: turns inbound events into session operations and replies.
//!
//! [`Bot::handle`] is called once per update, each on its own task, so
//! handlers for different users run concurrently. Expected outcomes (busy,
//! nothing stored, quota reached) are answered with a fixed text from
//! [`crate::messages`]; anything else is logged and answered with a generic
//! apology. Error details never reach the chat.

pub mod command;

pub use command::Command;

use crate::config::{BotConfig, ValidationPolicy};
use crate::convert::convert_leased;
use crate::error::{Photo2PdfError, TransportError};
use crate::messages;
use crate::output::ConversionResult;
use crate::pipeline::normalize;
use crate::progress::should_report;
use crate::session::{SessionLimits, SessionStore, UserId};
use crate::stream::{progress_channel, ProgressEvent, ProgressStream};
use crate::transport::{with_retry, ChatId, MessageRef, Transport};
use chrono::Utc;
use futures::StreamExt;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// What the bot reacts to in one update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    Command {
        user: UserId,
        chat: ChatId,
        command: Command,
        /// Sender's display name, for the welcome mention.
        mention: String,
    },
    Photo {
        user: UserId,
        chat: ChatId,
        file_id: String,
        /// Size advertised by the server, if any.
        file_size: Option<u64>,
    },
    Ignored,
}

/// Shared handler state. Cheap to clone.
#[derive(Clone)]
pub struct Bot {
    store: Arc<SessionStore>,
    transport: Arc<dyn Transport>,
    config: Arc<BotConfig>,
}

impl Bot {
    pub fn new(config: BotConfig, transport: Arc<dyn Transport>) -> Self {
        let store = SessionStore::new(SessionLimits::from(&config));
        Self {
            store: Arc::new(store),
            transport,
            config: Arc::new(config),
        }
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn config(&self) -> &BotConfig {
        &self.config
    }

    /// Handle one event to completion.
    pub async fn handle(&self, event: InboundEvent) {
        let (user, chat, outcome) = match event {
            InboundEvent::Command {
                user,
                chat,
                command,
                mention,
            } => {
                info!("User {}: {}", user, command);
                let outcome = match command {
                    Command::Start => self
                        .reply_html(chat, &messages::welcome(user, &mention))
                        .await
                        .map(drop)
                        .map_err(Photo2PdfError::from),
                    Command::Help => self.reply_ok(chat, messages::HELP).await,
                    Command::Status => self.on_status(user, chat).await,
                    Command::Count => {
                        self.reply_ok(chat, &messages::count(&self.store.count(user)))
                            .await
                    }
                    Command::Clear => self.on_clear(user, chat).await,
                    Command::Convert => self.on_convert(user, chat).await,
                };
                (user, chat, outcome)
            }
            InboundEvent::Photo {
                user,
                chat,
                file_id,
                file_size,
            } => {
                let outcome = self.on_photo(user, chat, &file_id, file_size).await;
                (user, chat, outcome)
            }
            InboundEvent::Ignored => return,
        };

        if let Err(e) = outcome {
            error!("User {}: handler failed: {}", user, e);
            if let Err(e) = self.reply(chat, messages::APOLOGY).await {
                error!("User {}: could not send apology: {}", user, e);
            }
        }
    }

    // ── Commands ─────────────────────────────────────────────────────────

    async fn on_status(&self, user: UserId, chat: ChatId) -> Result<(), Photo2PdfError> {
        let status = self.store.status(user);
        self.reply_ok(chat, &messages::status(&status, env!("CARGO_PKG_VERSION")))
            .await
    }

    async fn on_clear(&self, user: UserId, chat: ChatId) -> Result<(), Photo2PdfError> {
        match self.store.clear(user) {
            Ok(0) => self.reply_ok(chat, messages::NOTHING_TO_CLEAR).await,
            Ok(removed) => {
                info!("User {}: cleared {} images", user, removed);
                self.reply_ok(chat, &messages::cleared(removed)).await
            }
            Err(Photo2PdfError::AlreadyProcessing) => {
                self.reply_ok(chat, messages::BUSY_CLEAR).await
            }
            Err(e) => Err(e),
        }
    }

    async fn on_photo(
        &self,
        user: UserId,
        chat: ChatId,
        file_id: &str,
        file_size: Option<u64>,
    ) -> Result<(), Photo2PdfError> {
        if self.store.status(user).busy {
            return self.reply_ok(chat, messages::BUSY_INGEST).await;
        }

        if let Some(size) = file_size {
            if size > self.config.max_file_size {
                info!("User {}: rejected {}-byte photo before download", user, size);
                return self
                    .reply_ok(chat, &messages::too_large(self.config.max_file_size))
                    .await;
            }
        }

        let notice = match file_size {
            Some(size) if size > self.config.large_file_notice => {
                self.reply(chat, messages::DOWNLOADING).await.ok()
            }
            _ => None,
        };

        let downloaded = with_retry(&self.config.download_retry, "download", || {
            self.transport.download_file(file_id)
        })
        .await;

        let stored = match downloaded {
            Ok(bytes) => self.store_photo(user, bytes).await,
            Err(e) => Err(Photo2PdfError::from(e)),
        };
        self.dismiss(notice).await;

        let text = match stored {
            Ok((count, size)) => messages::image_added(count, size),
            Err(Photo2PdfError::AlreadyProcessing) => messages::BUSY_INGEST.to_string(),
            Err(Photo2PdfError::PayloadTooLarge { limit, .. }) => messages::too_large(limit),
            Err(Photo2PdfError::QuotaExceeded { detail }) => {
                info!("User {}: quota reached ({})", user, detail);
                let limits = self.store.limits();
                messages::quota_exceeded(limits.max_images_per_user, limits.max_bytes_per_user)
            }
            Err(Photo2PdfError::InvalidPayload { detail }) => {
                info!("User {}: rejected undecodable payload: {}", user, detail);
                messages::INVALID_IMAGE.to_string()
            }
            Err(Photo2PdfError::Transport(e)) if e.is_transient() => {
                warn!("User {}: download of {} failed: {}", user, file_id, e);
                messages::DOWNLOAD_FAILED.to_string()
            }
            Err(e) => {
                error!("User {}: could not store photo {}: {}", user, file_id, e);
                messages::INGEST_FAILED.to_string()
            }
        };
        self.reply_ok(chat, &text).await
    }

    /// Validate (when configured) and queue a downloaded payload.
    ///
    /// Returns the new queue length and the stored size.
    async fn store_photo(
        &self,
        user: UserId,
        bytes: Vec<u8>,
    ) -> Result<(usize, u64), Photo2PdfError> {
        let bytes = match self.config.validation {
            ValidationPolicy::OnIngest => validate(bytes).await?,
            ValidationPolicy::OnConvert => bytes,
        };
        let size = bytes.len() as u64;
        let count = self.store.add_image(user, bytes)?;
        Ok((count, size))
    }

    async fn on_convert(&self, user: UserId, chat: ChatId) -> Result<(), Photo2PdfError> {
        // The lease is held until the document is delivered, so a failed
        // upload leaves every photo in place.
        let lease = match self.store.acquire(user) {
            Ok(lease) => lease,
            Err(Photo2PdfError::EmptySession) => {
                return self.reply_ok(chat, messages::NOTHING_TO_CONVERT).await;
            }
            Err(Photo2PdfError::AlreadyProcessing) => {
                return self.reply_ok(chat, messages::BUSY_CONVERT).await;
            }
            Err(e) => return Err(e),
        };

        let queued = lease.images().len();
        let progress_msg = self.reply(chat, &messages::convert_started(queued)).await?;
        let (callback, events) = progress_channel();
        let reporter = tokio::spawn(report_progress(
            Arc::clone(&self.transport),
            progress_msg,
            events,
        ));

        // The callback is dropped when the conversion ends, which ends the
        // event stream and lets the reporter finish before the final edit.
        let outcome = convert_leased(&lease, &self.config, callback).await;
        if let Err(e) = reporter.await {
            warn!("User {}: progress reporter stopped: {}", user, e);
        }

        let result = match outcome {
            Ok(result) => result,
            Err(e) => {
                error!("User {}: conversion failed: {}", user, e);
                lease.finish(false);
                self.edit(progress_msg, messages::CONVERT_FAILED).await;
                return Ok(());
            }
        };

        if !result.has_pages() {
            warn!(
                "User {}: none of {} images converted; keeping session",
                user, result.total
            );
            lease.finish(false);
            self.edit(progress_msg, messages::NO_PAGES).await;
            return Ok(());
        }

        self.edit(progress_msg, &messages::convert_finished(result.succeeded_count))
            .await;
        if let Err(e) = self.send_document(user, chat, result).await {
            error!("User {}: sending document failed: {}; keeping session", user, e);
            lease.finish(false);
            self.edit(progress_msg, messages::CONVERT_FAILED).await;
            return Ok(());
        }
        lease.finish(true);

        self.dismiss(Some(progress_msg)).await;
        self.reply_ok(chat, messages::DONE).await
    }

    async fn send_document(
        &self,
        user: UserId,
        chat: ChatId,
        result: ConversionResult,
    ) -> Result<MessageRef, TransportError> {
        let now = Utc::now();
        let caption = messages::document_caption(&result, self.config.jpeg_quality, now);
        let filename = messages::document_filename(user, now);
        let bytes = result.document_bytes;

        let sent = with_retry(&self.config.send_retry, "sendDocument", || {
            self.transport
                .send_document(chat, bytes.clone(), &filename, &caption)
        })
        .await?;
        info!("User {}: delivered {} ({} bytes)", user, filename, bytes.len());
        Ok(sent)
    }

    // ── Outbound helpers ─────────────────────────────────────────────────

    async fn reply(&self, chat: ChatId, text: &str) -> Result<MessageRef, TransportError> {
        with_retry(&self.config.send_retry, "sendMessage", || {
            self.transport.send_text(chat, text)
        })
        .await
    }

    async fn reply_ok(&self, chat: ChatId, text: &str) -> Result<(), Photo2PdfError> {
        self.reply(chat, text).await?;
        Ok(())
    }

    async fn reply_html(&self, chat: ChatId, html: &str) -> Result<MessageRef, TransportError> {
        with_retry(&self.config.send_retry, "sendMessage", || {
            self.transport.send_html(chat, html)
        })
        .await
    }

    /// Best-effort edit; failures are logged.
    async fn edit(&self, message: MessageRef, text: &str) {
        let edited = with_retry(&self.config.send_retry, "editMessageText", || {
            self.transport.edit_text(message, text)
        })
        .await;
        if let Err(e) = edited {
            warn!("Could not edit message {}: {}", message.message_id, e);
        }
    }

    /// Best-effort delete of a transient notice.
    async fn dismiss(&self, message: Option<MessageRef>) {
        if let Some(message) = message {
            if let Err(e) = self.transport.delete_message(message).await {
                debug!("Could not delete message {}: {}", message.message_id, e);
            }
        }
    }
}

/// Full decode on the blocking pool; an undecodable payload is
/// [`Photo2PdfError::InvalidPayload`].
async fn validate(bytes: Vec<u8>) -> Result<Vec<u8>, Photo2PdfError> {
    tokio::task::spawn_blocking(move || match normalize::probe(&bytes) {
        Ok(_) => Ok(bytes),
        Err(e) => Err(Photo2PdfError::InvalidPayload {
            detail: e.to_string(),
        }),
    })
    .await
    .map_err(|e| Photo2PdfError::Internal(format!("Validation task panicked: {}", e)))?
}

/// Turn progress events into edits of `message` at the reporting cadence.
async fn report_progress(
    transport: Arc<dyn Transport>,
    message: MessageRef,
    mut events: ProgressStream,
) {
    while let Some(event) = events.next().await {
        match event {
            ProgressEvent::Processed(p) if should_report(p.processed, p.total) => {
                if let Err(e) = transport
                    .edit_text(message, &messages::convert_progress(&p))
                    .await
                {
                    debug!("Progress edit failed: {}", e);
                }
            }
            ProgressEvent::ImageFailed { index, total } => {
                debug!("Image {}/{} skipped", index, total);
            }
            _ => {}
        }
    }
}
