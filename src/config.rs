//! Client configuration with file and environment variable loading.
//!
//! Environment variables:
//! - `CAMLI_CONFIG`: Path of the TOML config file (default: `~/.camli/config.toml`)
//! - `CAMLI_SERVER`: Server base URL
//! - `CAMLI_TIMEOUT_SECS`: Request timeout in seconds (`0` disables it)
//!
//! The file is optional and holds a `[client]` table:
//!
//! ```toml
//! [client]
//! server = "http://localhost:3179/"
//! timeout_secs = 60
//! ```

use crate::error::{CamliError, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Settings for reaching a server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Server base URL used for discovery.
    pub server: Option<String>,
    /// Per-request timeout; `None` waits forever.
    pub timeout: Option<Duration>,
    /// `User-Agent` header value.
    pub user_agent: String,
    /// Honour `HTTP_PROXY`-style environment variables.
    pub trust_env_proxy: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server: None,
            timeout: Some(DEFAULT_TIMEOUT),
            user_agent: concat!("camli/", env!("CARGO_PKG_VERSION")).to_string(),
            trust_env_proxy: false,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    client: FileSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileSection {
    server: Option<String>,
    timeout_secs: Option<u64>,
    user_agent: Option<String>,
    trust_env_proxy: Option<bool>,
}

impl ClientConfig {
    /// Create a config with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the server base URL.
    #[must_use]
    pub fn with_server(mut self, server: impl Into<String>) -> Self {
        self.server = Some(server.into());
        self
    }

    /// Set the request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the `User-Agent`.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Enable or disable environment proxy settings.
    #[must_use]
    pub fn with_trust_env_proxy(mut self, trust: bool) -> Self {
        self.trust_env_proxy = trust;
        self
    }

    /// Default config file location (`~/.camli/config.toml`).
    #[must_use]
    pub fn default_path() -> PathBuf {
        let home = std::env::var("HOME").map_or_else(|_| PathBuf::from("."), PathBuf::from);
        home.join(".camli").join("config.toml")
    }

    /// Load defaults, then the config file, then environment overrides.
    ///
    /// `path` overrides `CAMLI_CONFIG`; a missing file is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but is unreadable or invalid, or
    /// if an environment variable has an unusable value.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path.map(Path::to_path_buf).unwrap_or_else(|| {
            std::env::var("CAMLI_CONFIG").map_or_else(|_| Self::default_path(), PathBuf::from)
        });

        let config = if path.exists() {
            Self::from_file(&path)?
        } else {
            Self::default()
        };

        config.apply_env(|key| std::env::var(key).ok())
    }

    /// Load defaults overlaid with a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Load defaults overlaid with TOML text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not a valid config document.
    pub fn from_toml(content: &str) -> Result<Self> {
        let file: ConfigFile = toml::from_str(content)?;
        let section = file.client;
        let mut config = Self::default();

        if let Some(server) = section.server {
            config.server = Some(server);
        }
        if let Some(secs) = section.timeout_secs {
            config.timeout = timeout_from_secs(secs);
        }
        if let Some(user_agent) = section.user_agent {
            config.user_agent = user_agent;
        }
        if let Some(trust) = section.trust_env_proxy {
            config.trust_env_proxy = trust;
        }

        Ok(config)
    }

    fn apply_env(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(server) = lookup("CAMLI_SERVER").filter(|s| !s.is_empty()) {
            self.server = Some(server);
        }
        if let Some(raw) = lookup("CAMLI_TIMEOUT_SECS") {
            let secs: u64 = raw.trim().parse().map_err(|_| {
                CamliError::Config(format!("CAMLI_TIMEOUT_SECS is not a number: {raw}"))
            })?;
            self.timeout = timeout_from_secs(secs);
        }
        Ok(self)
    }

    /// The configured server, or a `Config` error naming how to set one.
    ///
    /// # Errors
    ///
    /// Returns `Config` when no server is configured.
    pub fn require_server(&self) -> Result<&str> {
        self.server.as_deref().ok_or_else(|| {
            CamliError::Config(
                "no server configured; pass --server or set CAMLI_SERVER".to_string(),
            )
        })
    }
}

fn timeout_from_secs(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert!(config.server.is_none());
        assert_eq!(config.timeout, Some(DEFAULT_TIMEOUT));
        assert!(config.user_agent.starts_with("camli/"));
        assert!(!config.trust_env_proxy);
    }

    #[test]
    fn test_builder() {
        let config = ClientConfig::new()
            .with_server("http://localhost:3179/")
            .with_timeout(None)
            .with_user_agent("test/1")
            .with_trust_env_proxy(true);
        assert_eq!(config.server.as_deref(), Some("http://localhost:3179/"));
        assert!(config.timeout.is_none());
        assert_eq!(config.user_agent, "test/1");
        assert!(config.trust_env_proxy);
    }

    #[test]
    fn test_from_toml() {
        let config = ClientConfig::from_toml(
            r#"
            [client]
            server = "http://camli.example/"
            timeout_secs = 5
            "#,
        )
        .unwrap();
        assert_eq!(config.server.as_deref(), Some("http://camli.example/"));
        assert_eq!(config.timeout, Some(Duration::from_secs(5)));
        assert!(config.user_agent.starts_with("camli/"));
    }

    #[test]
    fn test_from_toml_zero_timeout_disables() {
        let config = ClientConfig::from_toml("[client]\ntimeout_secs = 0\n").unwrap();
        assert!(config.timeout.is_none());
    }

    #[test]
    fn test_from_toml_empty_is_default() {
        assert_eq!(ClientConfig::from_toml("").unwrap(), ClientConfig::default());
    }

    #[test]
    fn test_from_toml_rejects_unknown_keys() {
        let err = ClientConfig::from_toml("[client]\nsevrer = \"x\"\n").unwrap_err();
        assert!(matches!(err, CamliError::TomlDeserialize(_)));
    }

    #[test]
    fn test_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[client]\nserver = \"http://filehost/\"\n").unwrap();

        let config = ClientConfig::load(Some(&path)).unwrap();
        assert!(config.server.is_some());
    }

    #[test]
    fn test_from_file_missing_is_io_error() {
        let dir = TempDir::new().unwrap();
        let config = ClientConfig::from_file(&dir.path().join("absent.toml"));
        assert!(matches!(config, Err(CamliError::Io(_))));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("CAMLI_SERVER", "http://envhost/"),
            ("CAMLI_TIMEOUT_SECS", "12"),
        ]
        .into_iter()
        .collect();

        let config = ClientConfig::default()
            .with_server("http://filehost/")
            .apply_env(|k| env.get(k).map(|v| (*v).to_string()))
            .unwrap();
        assert_eq!(config.server.as_deref(), Some("http://envhost/"));
        assert_eq!(config.timeout, Some(Duration::from_secs(12)));
    }

    #[test]
    fn test_env_bad_timeout() {
        let err = ClientConfig::default()
            .apply_env(|k| (k == "CAMLI_TIMEOUT_SECS").then(|| "soon".to_string()))
            .unwrap_err();
        assert!(matches!(err, CamliError::Config(_)));
    }

    #[test]
    fn test_require_server() {
        assert!(ClientConfig::default().require_server().is_err());
        let config = ClientConfig::default().with_server("http://x/");
        assert_eq!(config.require_server().unwrap(), "http://x/");
    }
}
