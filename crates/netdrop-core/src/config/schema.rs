//! Configuration schema for netdrop.toml
//!
//! ```toml
//! [telegram]
//! token = "123:abc"
//!
//! [hosting]
//! token = "nfp_..."
//! site_id = "my-site"
//! strategy = "digest-declared"
//! # "backend" (default) or a templated base URL
//! url = { mode = "templated", public_base_url = "https://files.example.com" }
//!
//! [access]
//! allowed_users = [42]
//!
//! [files]
//! allowed_extensions = ["xlsx", "csv"]
//! ```

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::deploy::netlify::DEFAULT_API_BASE;
use crate::deploy::{DeployStrategy, OrchestratorSettings, PromoteEndpoint, UrlMode};
use crate::fs::StagingArea;
use crate::identity::AllowList;
use crate::validate::{ExtensionPolicy, is_always_blocked};

pub const DEFAULT_TELEGRAM_API_BASE: &str = "https://api.telegram.org";

/// Credential whose value never appears in `Debug` or `Display` output.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(if self.is_empty() { "<unset>" } else { "<redacted>" })
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Root configuration structure for netdrop.toml
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetdropConfig {
    #[serde(default)]
    pub telegram: TelegramSection,

    #[serde(default)]
    pub hosting: HostingSection,

    #[serde(default)]
    pub access: AccessSection,

    #[serde(default)]
    pub files: FilesSection,
}

/// Chat transport settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelegramSection {
    #[serde(default)]
    pub token: Secret,

    #[serde(default = "default_telegram_api_base")]
    pub api_base: String,

    /// Long-poll timeout for getUpdates
    #[serde(default = "default_poll_timeout_secs")]
    pub poll_timeout_secs: u64,

    /// Deadline for downloading one document
    #[serde(default = "default_download_timeout_secs")]
    pub download_timeout_secs: u64,

    /// Send a "processing" reply before the deploy starts
    #[serde(default = "default_true")]
    pub processing_ack: bool,
}

impl Default for TelegramSection {
    fn default() -> Self {
        Self {
            token: Secret::default(),
            api_base: default_telegram_api_base(),
            poll_timeout_secs: default_poll_timeout_secs(),
            download_timeout_secs: default_download_timeout_secs(),
            processing_ack: true,
        }
    }
}

impl TelegramSection {
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_secs(self.poll_timeout_secs)
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }
}

/// Hosting backend settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostingSection {
    #[serde(default)]
    pub token: Secret,

    #[serde(default)]
    pub site_id: String,

    #[serde(default = "default_hosting_api_base")]
    pub api_base: String,

    #[serde(default)]
    pub strategy: DeployStrategy,

    #[serde(default)]
    pub promote: PromoteEndpoint,

    #[serde(default)]
    pub url: UrlMode,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for HostingSection {
    fn default() -> Self {
        Self {
            token: Secret::default(),
            site_id: String::new(),
            api_base: default_hosting_api_base(),
            strategy: DeployStrategy::default(),
            promote: PromoteEndpoint::default(),
            url: UrlMode::default(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl HostingSection {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn orchestrator_settings(&self) -> OrchestratorSettings {
        OrchestratorSettings {
            strategy: self.strategy,
            promote: self.promote,
            url_mode: self.url.clone(),
        }
    }
}

/// Who may upload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessSection {
    #[serde(default)]
    pub allowed_users: Vec<i64>,
}

impl AccessSection {
    pub fn allow_list(&self) -> AllowList {
        AllowList::new(self.allowed_users.iter().copied())
    }
}

/// What may be uploaded and where it is staged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilesSection {
    #[serde(default = "default_allowed_extensions")]
    pub allowed_extensions: Vec<String>,

    /// Accept any extension except archives and executables
    #[serde(default)]
    pub accept_any: bool,

    #[serde(default)]
    pub staging_dir: Option<PathBuf>,

    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: u64,
}

impl Default for FilesSection {
    fn default() -> Self {
        Self {
            allowed_extensions: default_allowed_extensions(),
            accept_any: false,
            staging_dir: None,
            max_file_bytes: default_max_file_bytes(),
        }
    }
}

impl FilesSection {
    pub fn extension_policy(&self) -> ExtensionPolicy {
        if self.accept_any {
            ExtensionPolicy::Any
        } else {
            ExtensionPolicy::only(&self.allowed_extensions)
        }
    }

    pub fn staging_area(&self) -> StagingArea {
        match &self.staging_dir {
            Some(dir) => StagingArea::new(dir.clone()),
            None => StagingArea::system_temp(),
        }
    }
}

impl NetdropConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check invariants that would otherwise surface only on first upload.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.hosting.token.is_empty() {
            anyhow::bail!("hosting.token is not set (or NETLIFY_TOKEN)");
        }
        if self.hosting.site_id.trim().is_empty() {
            anyhow::bail!("hosting.site_id is not set (or NETLIFY_SITE_ID)");
        }
        if let UrlMode::Templated { public_base_url } = &self.hosting.url {
            if public_base_url.trim().is_empty() {
                anyhow::bail!("hosting.url.public_base_url must be set for templated URLs");
            }
        }
        if self.hosting.request_timeout_secs == 0 {
            anyhow::bail!("hosting.request_timeout_secs must be greater than zero");
        }
        if !self.files.accept_any
            && self
                .files
                .allowed_extensions
                .iter()
                .all(|ext| ext.trim().trim_start_matches('.').is_empty())
        {
            anyhow::bail!("files.allowed_extensions is empty; set accept_any = true to allow any");
        }
        if let Some(blocked) = self
            .files
            .allowed_extensions
            .iter()
            .find(|ext| is_always_blocked(ext))
        {
            anyhow::bail!(
                "files.allowed_extensions lists '{}'; archives and executables are never accepted",
                blocked.trim()
            );
        }
        if self.files.max_file_bytes == 0 {
            anyhow::bail!("files.max_file_bytes must be greater than zero");
        }
        Ok(())
    }

    /// Copy with every credential replaced by a placeholder, safe to print.
    pub fn redacted(&self) -> Self {
        let mask = |secret: &Secret| {
            if secret.is_empty() {
                Secret::default()
            } else {
                Secret::new("<redacted>")
            }
        };

        let mut copy = self.clone();
        copy.telegram.token = mask(&self.telegram.token);
        copy.hosting.token = mask(&self.hosting.token);
        copy
    }

    /// Validation for the chat transport, checked only when it is started.
    pub fn validate_telegram(&self) -> anyhow::Result<()> {
        if self.telegram.token.is_empty() {
            anyhow::bail!("telegram.token is not set (or TELEGRAM_TOKEN)");
        }
        if self.telegram.poll_timeout_secs == 0 {
            anyhow::bail!("telegram.poll_timeout_secs must be greater than zero");
        }
        if self.telegram.download_timeout_secs == 0 {
            anyhow::bail!("telegram.download_timeout_secs must be greater than zero");
        }
        Ok(())
    }
}

fn default_true() -> bool {
    true
}

fn default_telegram_api_base() -> String {
    DEFAULT_TELEGRAM_API_BASE.to_string()
}

fn default_hosting_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}

fn default_poll_timeout_secs() -> u64 {
    30
}

fn default_download_timeout_secs() -> u64 {
    120
}

fn default_request_timeout_secs() -> u64 {
    60
}

fn default_max_file_bytes() -> u64 {
    // Bot API download ceiling
    20 * 1024 * 1024
}

fn default_allowed_extensions() -> Vec<String> {
    ["xlsx", "xls", "xlsm", "csv", "ods"]
        .into_iter()
        .map(String::from)
        .collect()
}
