//! Telegram Bot API client over `reqwest`.
//!
//! Every method call is a POST to `{api}/bot{token}/{method}` and answers with
//! the `{ ok, result, description, error_code, parameters }` envelope decoded
//! into [`ApiResponse`]. Failures are classified into [`TransportError`] so
//! [`super::with_retry`] can tell transient from fatal.
//!
//! The token is part of every URL, so `reqwest` errors are stripped of their
//! URL before they reach a log line.

use super::{ChatId, MessageRef, Transport};
use crate::bot::{Command, InboundEvent};
use crate::config::BotConfig;
use crate::error::TransportError;
use crate::session::UserId;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, info};

// ── Wire types ───────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
    pub ok: bool,
    pub result: Option<T>,
    pub description: Option<String>,
    pub error_code: Option<i64>,
    pub parameters: Option<ResponseParameters>,
}

#[derive(Debug, Deserialize)]
pub struct ResponseParameters {
    pub retry_after: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    pub from: Option<User>,
    pub text: Option<String>,
    pub photo: Option<Vec<PhotoSize>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
    pub first_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PhotoSize {
    pub file_id: String,
    pub width: u32,
    pub height: u32,
    pub file_size: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct File {
    pub file_id: String,
    pub file_size: Option<u64>,
    pub file_path: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct SentMessage {
    message_id: i64,
}

impl Update {
    /// Reduce an update to the event the bot reacts to.
    ///
    /// Photos use the largest size Telegram offers. Messages without a sender
    /// (channel posts) are ignored.
    pub fn into_event(self) -> InboundEvent {
        let Some(message) = self.message else {
            return InboundEvent::Ignored;
        };
        let Some(from) = message.from else {
            return InboundEvent::Ignored;
        };
        let user = UserId(from.id);
        let chat = ChatId(message.chat.id);

        if let Some(photo) = message
            .photo
            .as_deref()
            .and_then(|sizes| sizes.iter().max_by_key(|p| u64::from(p.width) * u64::from(p.height)))
        {
            return InboundEvent::Photo {
                user,
                chat,
                file_id: photo.file_id.clone(),
                file_size: photo.file_size,
            };
        }

        match message.text.as_deref().and_then(Command::parse) {
            Some(command) => InboundEvent::Command {
                user,
                chat,
                command,
                mention: from.first_name,
            },
            None => InboundEvent::Ignored,
        }
    }
}

// ── Error classification ─────────────────────────────────────────────────

/// Map an API error envelope to a transport error.
pub fn classify_api_error(
    code: i64,
    description: Option<String>,
    retry_after: Option<u64>,
) -> TransportError {
    match code {
        429 => TransportError::RateLimited {
            retry_after_secs: retry_after,
        },
        500..=599 => TransportError::Server { status: code as u16 },
        _ => TransportError::Rejected {
            code,
            description: description.unwrap_or_default(),
        },
    }
}

fn classify_status(status: StatusCode) -> TransportError {
    classify_api_error(
        i64::from(status.as_u16()),
        status.canonical_reason().map(str::to_string),
        None,
    )
}

fn from_reqwest(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout
    } else {
        TransportError::Network(e.without_url().to_string())
    }
}

/// Decode a response body into `T`, classifying API-level failures.
pub fn decode_response<T: DeserializeOwned>(
    status: StatusCode,
    body: &[u8],
) -> Result<T, TransportError> {
    let envelope: ApiResponse<T> = match serde_json::from_slice(body) {
        Ok(env) => env,
        Err(_) if !status.is_success() => return Err(classify_status(status)),
        Err(e) => return Err(TransportError::Malformed(e.to_string())),
    };

    if envelope.ok {
        return envelope
            .result
            .ok_or_else(|| TransportError::Malformed("ok response without result".into()));
    }

    Err(classify_api_error(
        envelope.error_code.unwrap_or_else(|| i64::from(status.as_u16())),
        envelope.description,
        envelope.parameters.and_then(|p| p.retry_after),
    ))
}

// ── Client ───────────────────────────────────────────────────────────────

/// Telegram Bot API transport.
pub struct TelegramTransport {
    client: Client,
    method_base: String,
    file_base: String,
    poll_timeout_secs: u64,
    request_timeout: Duration,
}

impl TelegramTransport {
    pub fn new(config: &BotConfig) -> Result<Self, TransportError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(from_reqwest)?;

        Ok(Self {
            client,
            method_base: format!("{}/bot{}", config.api_url, config.token),
            file_base: format!("{}/file/bot{}", config.api_url, config.token),
            poll_timeout_secs: config.poll_timeout_secs,
            request_timeout: Duration::from_secs(config.request_timeout_secs),
        })
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        body: serde_json::Value,
        timeout: Duration,
    ) -> Result<T, TransportError> {
        let response = self
            .client
            .post(format!("{}/{}", self.method_base, method))
            .timeout(timeout)
            .json(&body)
            .send()
            .await
            .map_err(from_reqwest)?;

        let status = response.status();
        let bytes = response.bytes().await.map_err(from_reqwest)?;
        decode_response(status, &bytes)
    }

    /// Long-poll for updates after `offset`.
    pub async fn get_updates(&self, offset: Option<i64>) -> Result<Vec<Update>, TransportError> {
        let mut body = json!({
            "timeout": self.poll_timeout_secs,
            "allowed_updates": ["message"],
        });
        if let Some(offset) = offset {
            body["offset"] = json!(offset);
        }
        // Leave the server room to answer an idle poll before we give up.
        let timeout = Duration::from_secs(self.poll_timeout_secs) + self.request_timeout;
        self.call("getUpdates", body, timeout).await
    }

    /// Discard updates queued while the bot was offline.
    pub async fn drop_pending_updates(&self) -> Result<(), TransportError> {
        let _: bool = self
            .call(
                "deleteWebhook",
                json!({ "drop_pending_updates": true }),
                self.request_timeout,
            )
            .await?;
        info!("Dropped pending updates");
        Ok(())
    }

    async fn send_message(
        &self,
        chat: ChatId,
        text: &str,
        parse_mode: Option<&str>,
    ) -> Result<MessageRef, TransportError> {
        let mut body = json!({ "chat_id": chat.0, "text": text });
        if let Some(mode) = parse_mode {
            body["parse_mode"] = json!(mode);
        }
        let sent: SentMessage = self.call("sendMessage", body, self.request_timeout).await?;
        Ok(MessageRef {
            chat,
            message_id: sent.message_id,
        })
    }
}

#[async_trait]
impl Transport for TelegramTransport {
    async fn send_text(&self, chat: ChatId, text: &str) -> Result<MessageRef, TransportError> {
        self.send_message(chat, text, None).await
    }

    async fn send_html(&self, chat: ChatId, html: &str) -> Result<MessageRef, TransportError> {
        self.send_message(chat, html, Some("HTML")).await
    }

    async fn edit_text(&self, message: MessageRef, text: &str) -> Result<(), TransportError> {
        // Telegram answers with the edited Message; only success matters here.
        let _: serde_json::Value = self
            .call(
                "editMessageText",
                json!({
                    "chat_id": message.chat.0,
                    "message_id": message.message_id,
                    "text": text,
                }),
                self.request_timeout,
            )
            .await?;
        Ok(())
    }

    async fn delete_message(&self, message: MessageRef) -> Result<(), TransportError> {
        let _: bool = self
            .call(
                "deleteMessage",
                json!({ "chat_id": message.chat.0, "message_id": message.message_id }),
                self.request_timeout,
            )
            .await?;
        Ok(())
    }

    async fn send_document(
        &self,
        chat: ChatId,
        bytes: Vec<u8>,
        filename: &str,
        caption: &str,
    ) -> Result<MessageRef, TransportError> {
        let size = bytes.len();
        let part = Part::bytes(bytes)
            .file_name(filename.to_string())
            .mime_str("application/pdf")
            .map_err(from_reqwest)?;
        let form = Form::new()
            .text("chat_id", chat.0.to_string())
            .text("caption", caption.to_string())
            .part("document", part);

        let response = self
            .client
            .post(format!("{}/sendDocument", self.method_base))
            .timeout(self.request_timeout)
            .multipart(form)
            .send()
            .await
            .map_err(from_reqwest)?;

        let status = response.status();
        let body = response.bytes().await.map_err(from_reqwest)?;
        let sent: SentMessage = decode_response(status, &body)?;
        debug!("Sent document {} ({} bytes) to chat {}", filename, size, chat);
        Ok(MessageRef {
            chat,
            message_id: sent.message_id,
        })
    }

    async fn download_file(&self, file_id: &str) -> Result<Vec<u8>, TransportError> {
        let file: File = self
            .call("getFile", json!({ "file_id": file_id }), self.request_timeout)
            .await?;
        let path = file
            .file_path
            .ok_or_else(|| TransportError::Malformed(format!("file {} has no path", file.file_id)))?;

        let response = self
            .client
            .get(format!("{}/{}", self.file_base, path))
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(from_reqwest)?;

        if !response.status().is_success() {
            return Err(classify_status(response.status()));
        }

        let bytes = response.bytes().await.map_err(from_reqwest)?;
        debug!(
            "Downloaded file {} ({} bytes, advertised {:?})",
            file_id,
            bytes.len(),
            file.file_size
        );
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn update(json: &str) -> Update {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn rate_limit_carries_retry_after() {
        let body = br#"{"ok":false,"error_code":429,"description":"Too Many Requests: retry after 7","parameters":{"retry_after":7}}"#;
        let err = decode_response::<bool>(StatusCode::TOO_MANY_REQUESTS, body).unwrap_err();
        assert_eq!(
            err,
            TransportError::RateLimited {
                retry_after_secs: Some(7)
            }
        );
        assert!(err.is_transient());
    }

    #[test]
    fn bad_request_is_fatal() {
        let body = br#"{"ok":false,"error_code":400,"description":"Bad Request: chat not found"}"#;
        let err = decode_response::<bool>(StatusCode::BAD_REQUEST, body).unwrap_err();
        assert!(matches!(err, TransportError::Rejected { code: 400, .. }));
        assert!(!err.is_transient());
    }

    #[test]
    fn non_json_gateway_error_is_server_error() {
        let err = decode_response::<bool>(StatusCode::BAD_GATEWAY, b"<html>bad gateway</html>")
            .unwrap_err();
        assert_eq!(err, TransportError::Server { status: 502 });
    }

    #[test]
    fn garbage_success_body_is_malformed() {
        let err = decode_response::<bool>(StatusCode::OK, b"nope").unwrap_err();
        assert!(matches!(err, TransportError::Malformed(_)));
    }

    #[test]
    fn ok_response_decodes_result() {
        let body = br#"{"ok":true,"result":{"message_id":99,"date":0}}"#;
        let sent: SentMessage = decode_response(StatusCode::OK, body).unwrap();
        assert_eq!(sent.message_id, 99);
    }

    #[test]
    fn photo_update_uses_largest_size() {
        let ev = update(
            r#"{"update_id":1,"message":{"message_id":5,"chat":{"id":10},
                "from":{"id":42,"first_name":"Ada"},
                "photo":[{"file_id":"small","width":90,"height":60,"file_size":1000},
                         {"file_id":"large","width":1280,"height":853,"file_size":90000},
                         {"file_id":"mid","width":320,"height":213}]}}"#,
        )
        .into_event();
        assert_eq!(
            ev,
            InboundEvent::Photo {
                user: UserId(42),
                chat: ChatId(10),
                file_id: "large".into(),
                file_size: Some(90000),
            }
        );
    }

    #[test]
    fn command_update_parses_command() {
        let ev = update(
            r#"{"update_id":2,"message":{"message_id":6,"chat":{"id":10},
                "from":{"id":42,"first_name":"Ada"},"text":"/convert@photo2pdf_bot"}}"#,
        )
        .into_event();
        assert_eq!(
            ev,
            InboundEvent::Command {
                user: UserId(42),
                chat: ChatId(10),
                command: Command::Convert,
                mention: "Ada".into(),
            }
        );
    }

    #[test]
    fn plain_text_and_empty_updates_are_ignored() {
        let text = update(
            r#"{"update_id":3,"message":{"message_id":7,"chat":{"id":10},
                "from":{"id":42,"first_name":"Ada"},"text":"hello"}}"#,
        );
        assert_eq!(text.into_event(), InboundEvent::Ignored);
        assert_eq!(update(r#"{"update_id":4}"#).into_event(), InboundEvent::Ignored);
    }
}
