//! Telegram Bot API client.
//!
//! Only the calls the bot needs: long-poll `getUpdates`, `getFile` plus the
//! file download, and `sendMessage`. The bot token is part of every URL, so
//! transport errors are stripped of their URL before they are surfaced.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;

use netdrop_core::config::Secret;
use netdrop_core::error::BoxError;
use netdrop_core::identity::Principal;
use netdrop_core::pipeline::{DocumentRef, DocumentSource, InboundEvent};

/// Slack added on top of the long-poll timeout for API requests.
const POLL_GRACE: Duration = Duration::from_secs(10);

const DEFAULT_DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    #[serde(default)]
    pub from: Option<User>,
    pub chat: Chat,
    #[serde(default)]
    pub document: Option<Document>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Document {
    pub file_id: String,
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub file_size: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
struct RemoteFile {
    #[serde(default)]
    file_path: Option<String>,
}

#[derive(Debug, Serialize)]
struct GetUpdates {
    #[serde(skip_serializing_if = "Option::is_none")]
    offset: Option<i64>,
    timeout: u64,
    allowed_updates: [&'static str; 1],
}

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: i64,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_to_message_id: Option<i64>,
}

impl Message {
    /// Turn a document message into a pipeline event.
    ///
    /// Messages without a document or without a sender are not uploads.
    pub fn inbound_event(&self) -> Option<InboundEvent> {
        let from = self.from.as_ref()?;
        let document = self.document.as_ref()?;

        let mut principal = Principal::new(from.id);
        if let Some(name) = from.username.as_ref().or(from.first_name.as_ref()) {
            principal = principal.with_display_name(name.clone());
        }

        Some(InboundEvent {
            principal,
            document: DocumentRef {
                handle: document.file_id.clone(),
                file_name: document.file_name.clone(),
                declared_size: document.file_size,
            },
        })
    }
}

/// Telegram Bot API client.
#[derive(Debug, Clone)]
pub struct TelegramClient {
    http: reqwest::Client,
    api_base: String,
    token: Secret,
    poll_timeout: Duration,
    download_timeout: Duration,
}

impl TelegramClient {
    pub fn new(token: &str, api_base: &str, poll_timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("netdrop/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            token: Secret::new(token),
            poll_timeout,
            download_timeout: DEFAULT_DOWNLOAD_TIMEOUT,
        })
    }

    /// Deadline for one file transfer, independent of the long-poll timeout.
    pub fn with_download_timeout(mut self, timeout: Duration) -> Self {
        self.download_timeout = timeout;
        self
    }

    pub fn download_timeout(&self) -> Duration {
        self.download_timeout
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base, self.token.expose(), method)
    }

    fn file_url(&self, file_path: &str) -> String {
        format!("{}/file/bot{}/{}", self.api_base, self.token.expose(), file_path)
    }

    async fn call<B, T>(&self, method: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self
            .http
            .post(self.method_url(method))
            .timeout(self.poll_timeout + POLL_GRACE)
            .json(body)
            .send()
            .await
            .map_err(reqwest::Error::without_url)
            .with_context(|| format!("Telegram {method} request failed"))?;

        let status = response.status();
        let parsed: ApiResponse<T> = response
            .json()
            .await
            .map_err(reqwest::Error::without_url)
            .with_context(|| format!("Telegram {method} returned an unreadable body ({status})"))?;

        if !parsed.ok {
            anyhow::bail!(
                "Telegram {method} failed ({status}): {}",
                parsed.description.as_deref().unwrap_or("no description")
            );
        }
        parsed
            .result
            .with_context(|| format!("Telegram {method} returned no result"))
    }

    /// Long-poll for updates after `offset`.
    pub async fn get_updates(&self, offset: Option<i64>) -> Result<Vec<Update>> {
        let request = GetUpdates {
            offset,
            timeout: self.poll_timeout.as_secs(),
            allowed_updates: ["message"],
        };
        self.call("getUpdates", &request).await
    }

    pub async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        reply_to: Option<i64>,
    ) -> Result<()> {
        let request = SendMessage {
            chat_id,
            text,
            reply_to_message_id: reply_to,
        };
        let _: serde_json::Value = self.call("sendMessage", &request).await?;
        Ok(())
    }

    /// Resolve a file id to its download path.
    async fn file_path(&self, file_id: &str) -> Result<String> {
        let file: RemoteFile = self
            .call("getFile", &serde_json::json!({ "file_id": file_id }))
            .await?;
        file.file_path
            .filter(|p| !p.is_empty())
            .context("Telegram getFile returned no file_path")
    }

    /// Stream a file to `dest`, returning the number of bytes written.
    ///
    /// Reading stops at the first chunk that takes the total past `limit`,
    /// so an oversized file returns a count above `limit`.
    pub async fn download(&self, file_id: &str, dest: &Path, limit: u64) -> Result<u64> {
        let remote = self.file_path(file_id).await?;

        let mut response = self
            .http
            .get(self.file_url(&remote))
            .timeout(self.download_timeout)
            .send()
            .await
            .map_err(reqwest::Error::without_url)
            .context("File download request failed")?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("File download failed with status {status}");
        }

        let mut file = tokio::fs::File::create(dest)
            .await
            .with_context(|| format!("Failed to create {}", dest.display()))?;
        let mut written = 0u64;
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(reqwest::Error::without_url)
            .context("File download interrupted")?
        {
            file.write_all(&chunk)
                .await
                .with_context(|| format!("Failed to write {}", dest.display()))?;
            written += chunk.len() as u64;
            if written > limit {
                tracing::debug!(bytes = written, limit, "download exceeds limit, stopping");
                break;
            }
        }
        file.flush().await?;

        tracing::debug!(bytes = written, dest = %dest.display(), "document downloaded");
        Ok(written)
    }
}

#[async_trait]
impl DocumentSource for TelegramClient {
    async fn fetch(
        &self,
        document: &DocumentRef,
        dest: &Path,
        limit: u64,
    ) -> Result<u64, BoxError> {
        Ok(self.download(&document.handle, dest, limit).await?)
    }
}
