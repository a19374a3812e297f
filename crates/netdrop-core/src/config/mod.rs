//! Configuration loading
//!
//! Configuration is read once at startup from netdrop.toml, overlaid with
//! environment variables and validated. The resulting [`NetdropConfig`] is
//! immutable and passed into constructors; nothing in the core reads the
//! process environment on its own.

pub mod parser;
pub mod schema;

use std::path::{Path, PathBuf};

use anyhow::Context;

pub use parser::{parse_config_file, parse_config_str, to_toml};
pub use schema::{
    AccessSection, FilesSection, HostingSection, NetdropConfig, Secret, TelegramSection,
};

pub const ENV_TELEGRAM_TOKEN: &str = "TELEGRAM_TOKEN";
pub const ENV_HOSTING_TOKEN: &str = "NETLIFY_TOKEN";
pub const ENV_SITE_ID: &str = "NETLIFY_SITE_ID";
pub const ENV_ALLOWED_USERS: &str = "ALLOWED_USER_IDS";

/// Default config file location: `<config dir>/netdrop/netdrop.toml`.
pub fn default_config_path() -> anyhow::Result<PathBuf> {
    let dir = dirs::config_dir()
        .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
    Ok(dir.join("netdrop").join("netdrop.toml"))
}

/// Parse a comma-separated id list, skipping entries that are not integers.
pub fn parse_id_list(raw: &str) -> Vec<i64> {
    raw.split(',')
        .map(str::trim)
        .filter_map(|id| id.parse::<i64>().ok())
        .collect()
}

impl NetdropConfig {
    /// Overlay values from the environment through `lookup`.
    ///
    /// Non-empty variables replace file values.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(token) = get(ENV_TELEGRAM_TOKEN) {
            self.telegram.token = Secret::new(token);
        }
        if let Some(token) = get(ENV_HOSTING_TOKEN) {
            self.hosting.token = Secret::new(token);
        }
        if let Some(site_id) = get(ENV_SITE_ID) {
            self.hosting.site_id = site_id;
        }
        if let Some(ids) = get(ENV_ALLOWED_USERS) {
            self.access.allowed_users = parse_id_list(&ids);
        }
    }

    /// Load, overlay the process environment and validate.
    ///
    /// An explicit `path` must exist; the default location may be absent.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut config = match path {
            Some(path) => parse_config_file(path)?,
            None => {
                let default = default_config_path()?;
                if default.exists() {
                    parse_config_file(&default)?
                } else {
                    tracing::debug!(path = %default.display(), "no config file, using defaults");
                    Self::default()
                }
            }
        };

        config.apply_env(|key| std::env::var(key).ok());
        config.validate().context("Invalid configuration")?;
        Ok(config)
    }
}
