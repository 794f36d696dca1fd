//! Browser configuration.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{BrowserError, Result};

/// Default request timeout, seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 20;
/// Default upload limit the service enforces (1 GiB).
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 1024 * 1024 * 1024;

/// Settings for one browsing session.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// Service origin, e.g. `http://localhost:8080`
    pub base_url: String,
    /// Authorization scheme prefix
    pub token_type: String,
    pub access_token: Option<String>,
    /// HTTP or SOCKS proxy URL
    pub proxy: Option<String>,
    pub request_timeout_secs: u64,
    /// Used to phrase the "too large" message; the service enforces the limit.
    pub max_upload_bytes: u64,
    /// Capacity of the coordinator command channel
    pub command_buffer: usize,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            token_type: "Bearer".to_string(),
            access_token: None,
            proxy: None,
            request_timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            command_buffer: 64,
        }
    }
}

impl BrowserConfig {
    /// Defaults overridden by `CLOUDNAV_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Parse a JSON document; missing fields keep their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| BrowserError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read a JSON config file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| BrowserError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&json)
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        if let Some(url) = lookup("CLOUDNAV_BASE_URL") {
            config.base_url = url;
        }
        if let Some(token) = lookup("CLOUDNAV_TOKEN") {
            config.access_token = Some(token);
        }
        if let Some(token_type) = lookup("CLOUDNAV_TOKEN_TYPE") {
            config.token_type = token_type;
        }
        if let Some(proxy) = lookup("CLOUDNAV_PROXY") {
            config.proxy = Some(proxy);
        }
        if let Some(secs) = lookup("CLOUDNAV_TIMEOUT_SECS") {
            config.request_timeout_secs = secs
                .parse()
                .map_err(|_| BrowserError::Config(format!("Invalid timeout: {}", secs)))?;
        }
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.base_url.trim().is_empty() {
            return Err(BrowserError::Config("base_url cannot be empty".to_string()));
        }
        if self.command_buffer == 0 {
            return Err(BrowserError::Config("command_buffer must be positive".to_string()));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// `authorization` header value, when a token is configured.
    pub fn authorization(&self) -> Option<String> {
        self.access_token
            .as_ref()
            .map(|token| format!("{} {}", self.token_type, token))
    }

    /// The upload limit as shown to users ("1 GB").
    pub fn upload_limit_label(&self) -> String {
        const GIB: u64 = 1024 * 1024 * 1024;
        const MIB: u64 = 1024 * 1024;
        if self.max_upload_bytes >= GIB && self.max_upload_bytes % GIB == 0 {
            format!("{} GB", self.max_upload_bytes / GIB)
        } else if self.max_upload_bytes >= MIB {
            format!("{} MB", self.max_upload_bytes / MIB)
        } else {
            format!("{} bytes", self.max_upload_bytes)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = BrowserConfig::default();
        assert_eq!(config.request_timeout(), Duration::from_secs(20));
        assert_eq!(config.upload_limit_label(), "1 GB");
        assert_eq!(config.authorization(), None);
    }

    #[test]
    fn test_from_json_partial() {
        let config =
            BrowserConfig::from_json(r#"{"base_url":"https://files.example","access_token":"abc"}"#)
                .unwrap();
        assert_eq!(config.base_url, "https://files.example");
        assert_eq!(config.authorization(), Some("Bearer abc".to_string()));
        assert_eq!(config.command_buffer, 64);
    }

    #[test]
    fn test_from_json_rejects_empty_url() {
        let err = BrowserConfig::from_json(r#"{"base_url":" "}"#).unwrap_err();
        assert!(matches!(err, BrowserError::Config(_)));
    }

    #[test]
    fn test_from_lookup() {
        let vars: HashMap<&str, &str> = [
            ("CLOUDNAV_BASE_URL", "http://127.0.0.1:9000"),
            ("CLOUDNAV_TOKEN", "t0k"),
            ("CLOUDNAV_TOKEN_TYPE", "Token"),
            ("CLOUDNAV_TIMEOUT_SECS", "5"),
        ]
        .into_iter()
        .collect();
        let config =
            BrowserConfig::from_lookup(|key| vars.get(key).map(|v| v.to_string())).unwrap();
        assert_eq!(config.base_url, "http://127.0.0.1:9000");
        assert_eq!(config.authorization(), Some("Token t0k".to_string()));
        assert_eq!(config.request_timeout(), Duration::from_secs(5));

        let bad = BrowserConfig::from_lookup(|key| {
            (key == "CLOUDNAV_TIMEOUT_SECS").then(|| "soon".to_string())
        });
        assert!(bad.is_err());
    }

    #[test]
    fn test_upload_limit_label() {
        let config = BrowserConfig {
            max_upload_bytes: 512 * 1024 * 1024,
            ..Default::default()
        };
        assert_eq!(config.upload_limit_label(), "512 MB");
    }
}
