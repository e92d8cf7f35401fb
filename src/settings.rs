use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::BaseDirs;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::utils::{normalize_url, socket_io_url};

pub const ENV_API_URL: &str = "SENDME_API_URL";
pub const ENV_SOCKET_URL: &str = "SENDME_SOCKET_URL";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// REST base, e.g. `http://localhost:5000/api`.
    pub api_url: String,
    /// socket.io server base, e.g. `http://localhost:5000`.
    pub socket_url: String,
    pub request_timeout_secs: u64,
    pub reconnect_delay_secs: u64,
    /// Keep conversation summaries in a local SQLite file.
    pub cache_conversations: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:5000/api".into(),
            socket_url: "http://localhost:5000".into(),
            request_timeout_secs: 15,
            reconnect_delay_secs: 2,
            cache_conversations: true,
        }
    }
}

impl Settings {
    fn default_path() -> Option<PathBuf> {
        let base = BaseDirs::new()?;
        Some(base.config_dir().join("sendme.toml"))
    }

    /// Settings file if present, defaults otherwise, then environment
    /// overrides.
    pub fn load() -> Result<Self> {
        let mut settings = match Self::default_path() {
            Some(path) if path.exists() => Self::load_from(&path)?,
            _ => Self::default(),
        };
        settings.apply_env(|key| std::env::var(key).ok());
        settings.validate()?;
        Ok(settings)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        toml::from_str(&text).map_err(|e| Error::Config(format!("{}: {e}", path.display())))
    }

    pub fn save_to(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let toml = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;
        fs::write(path, toml)
    }

    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(url) = var(ENV_API_URL) {
            self.api_url = url;
        }
        if let Some(url) = var(ENV_SOCKET_URL) {
            self.socket_url = url;
        }
    }

    fn validate(&mut self) -> Result<()> {
        self.api_url = normalize_url(&self.api_url);
        self.socket_url = normalize_url(&self.socket_url);
        url::Url::parse(&self.api_url).map_err(|e| Error::Config(format!("api_url: {e}")))?;
        socket_io_url(&self.socket_url).map_err(|e| Error::Config(format!("socket_url: {e}")))?;
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_delay_secs)
    }
}
