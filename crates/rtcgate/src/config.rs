use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::fs;

use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// Config (root)
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub plugins: PluginsConfig,
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub certificates: CertificatesConfig,
}

impl Config {
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = match fs::read_to_string(path).await {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(ConfigError::Io(e)),
        };
        let config: Self = serde_saphyr::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.session.poll_timeout_seconds == 0 {
            return Err(ConfigError::Invalid(
                "session.poll_timeout_seconds must be greater than zero".to_string(),
            ));
        }
        if self.server.request_timeout_seconds <= self.session.poll_timeout_seconds {
            return Err(ConfigError::Invalid(format!(
                "server.request_timeout_seconds ({}) must exceed session.poll_timeout_seconds ({})",
                self.server.request_timeout_seconds, self.session.poll_timeout_seconds
            )));
        }
        if !self.server.base_path.starts_with('/') {
            return Err(ConfigError::Invalid(format!(
                "server.base_path must start with '/', got '{}'",
                self.server.base_path
            )));
        }
        Ok(())
    }
}

// ============================================================================
// ServerConfig
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Path prefix the long-poll transport is mounted under.
    #[serde(default = "default_base_path")]
    pub base_path: String,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            base_path: default_base_path(),
            request_timeout_seconds: default_request_timeout(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8088
}

fn default_base_path() -> String {
    "/janus".to_string()
}

fn default_request_timeout() -> u64 {
    60
}

// ============================================================================
// SessionConfig
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_poll_timeout")]
    pub poll_timeout_seconds: u64,
    /// Upper bound for the `maxev` query parameter of a long poll.
    #[serde(default = "default_max_events_per_poll")]
    pub max_events_per_poll: usize,
    /// Sessions without any request for this long are reaped. 0 disables.
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_seconds: u64,
    #[serde(default = "default_reaper_interval")]
    pub reaper_interval_seconds: u64,
}

impl SessionConfig {
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_secs(self.poll_timeout_seconds)
    }

    pub fn idle_timeout(&self) -> Option<Duration> {
        (self.idle_timeout_seconds > 0).then(|| Duration::from_secs(self.idle_timeout_seconds))
    }

    pub fn reaper_interval(&self) -> Duration {
        Duration::from_secs(self.reaper_interval_seconds.max(1))
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            poll_timeout_seconds: default_poll_timeout(),
            max_events_per_poll: default_max_events_per_poll(),
            idle_timeout_seconds: default_idle_timeout(),
            reaper_interval_seconds: default_reaper_interval(),
        }
    }
}

fn default_poll_timeout() -> u64 {
    30
}

fn default_max_events_per_poll() -> usize {
    10
}

fn default_idle_timeout() -> u64 {
    60
}

fn default_reaper_interval() -> u64 {
    2
}

// ============================================================================
// PluginsConfig
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct PluginsConfig {
    /// Package names of built-in plugins that should not be loaded.
    #[serde(default)]
    pub disable: Vec<String>,
}

// ============================================================================
// NetworkConfig / CertificatesConfig
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct NetworkConfig {
    /// Overrides local address auto-detection.
    #[serde(default)]
    pub local_ip: Option<String>,
    #[serde(default)]
    pub public_ip: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CertificatesConfig {
    #[serde(default)]
    pub cert_pem: Option<PathBuf>,
    #[serde(default)]
    pub cert_key: Option<PathBuf>,
}

// ============================================================================
// ConfigError
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Yaml(#[from] serde_saphyr::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8088);
        assert_eq!(config.server.base_path, "/janus");
        assert_eq!(config.server.request_timeout_seconds, 60);
        assert_eq!(config.session.poll_timeout(), Duration::from_secs(30));
        assert_eq!(config.session.max_events_per_poll, 10);
        assert_eq!(config.session.idle_timeout(), Some(Duration::from_secs(60)));
        assert!(config.plugins.disable.is_empty());
        assert!(config.network.public_ip.is_none());
        assert!(config.certificates.cert_pem.is_none());
    }

    #[tokio::test]
    async fn test_load_missing_file_returns_defaults() {
        let tmp_dir = TempDir::new().unwrap();
        let missing_path = tmp_dir.path().join("missing-config.yaml");
        let config = Config::load(missing_path).await.unwrap();
        assert_eq!(config.server.port, 8088);
        assert_eq!(config.session.poll_timeout_seconds, 30);
    }

    #[tokio::test]
    async fn test_load_valid_yaml() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
server:
  host: "127.0.0.1"
  port: 3000
  base_path: "/gateway"
  request_timeout_seconds: 90
session:
  poll_timeout_seconds: 20
  max_events_per_poll: 5
  idle_timeout_seconds: 0
plugins:
  disable:
    - "rtcgate.plugin.echo"
network:
  public_ip: "203.0.113.7"
certificates:
  cert_pem: "/etc/rtcgate/cert.pem"
"#
        )
        .unwrap();

        let config = Config::load(file.path()).await.unwrap();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.server.base_path, "/gateway");
        assert_eq!(config.session.poll_timeout_seconds, 20);
        assert_eq!(config.session.max_events_per_poll, 5);
        assert_eq!(config.session.idle_timeout(), None);
        assert_eq!(config.plugins.disable, vec!["rtcgate.plugin.echo"]);
        assert_eq!(config.network.public_ip.as_deref(), Some("203.0.113.7"));
        assert_eq!(
            config.certificates.cert_pem,
            Some(PathBuf::from("/etc/rtcgate/cert.pem"))
        );
    }

    #[tokio::test]
    async fn test_load_partial_yaml_uses_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
server:
  port: 9000
"#
        )
        .unwrap();

        let config = Config::load(file.path()).await.unwrap();
        assert_eq!(config.server.host, "0.0.0.0"); // default
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.base_path, "/janus"); // default
        assert_eq!(config.session.poll_timeout_seconds, 30); // default
    }

    #[tokio::test]
    async fn test_load_invalid_yaml() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "invalid: yaml: content: [").unwrap();

        let result = Config::load(file.path()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_request_timeout_must_exceed_poll_timeout() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
server:
  request_timeout_seconds: 30
session:
  poll_timeout_seconds: 30
"#
        )
        .unwrap();

        let err = Config::load(file.path()).await.unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
        assert!(err.to_string().contains("must exceed"));
    }

    #[test]
    fn test_config_error_display() {
        let io_error = ConfigError::Io(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "test",
        ));
        assert!(io_error.to_string().contains("failed to read config file"));
    }
}
