// ABOUTME: Client configuration loaded from TOML and overridden by command line flags
// Every field has a default so a missing or partial config file is fine

use crate::transport::{Destinations, ProbeCandidate, ReconnectPolicy};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid server URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
}

/// Main configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub server: ServerConfig,
    pub connect: ConnectConfig,
    pub reconnect: ReconnectConfig,
    pub latency: LatencyConfig,
    pub terminal: TerminalConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// WebSocket URL of the gateway's STOMP endpoint
    pub url: String,
    pub destinations: Destinations,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            url: "ws://localhost:8080/ssh-ws/websocket".to_string(),
            destinations: Destinations::default(),
        }
    }
}

/// Remote login target. The password is never read from the file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectConfig {
    pub handshake_timeout_ms: u64,
    pub host: Option<String>,
    pub port: u16,
    pub username: Option<String>,
}

impl Default for ConnectConfig {
    fn default() -> Self {
        Self {
            handshake_timeout_ms: 10_000,
            host: None,
            port: 22,
            username: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectConfig {
    pub enabled: bool,
    pub delay_secs: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        let policy = ReconnectPolicy::default();
        Self {
            enabled: policy.enabled,
            delay_secs: policy.delay_secs,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LatencyConfig {
    pub interval_secs: u64,
    pub timeout_ms: u64,
    /// Probe targets. Empty means the gateway's default health endpoints.
    pub candidates: Vec<ProbeCandidate>,
}

impl Default for LatencyConfig {
    fn default() -> Self {
        Self {
            interval_secs: 10,
            timeout_ms: 3000,
            candidates: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerminalConfig {
    pub rows: u16,
    pub cols: u16,
    pub scrollback: usize,
    pub settle_delay_ms: u64,
}

impl Default for TerminalConfig {
    fn default() -> Self {
        Self {
            rows: 24,
            cols: 80,
            scrollback: 10_000,
            settle_delay_ms: 100,
        }
    }
}

impl ClientConfig {
    /// Load from `path`, or from the per-user config file when `path` is None.
    ///
    /// A missing per-user file yields the defaults; a missing explicit file is an error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => match Self::default_path() {
                Some(path) if path.exists() => path,
                _ => {
                    debug!("No config file found, using defaults");
                    return Ok(Self::default());
                }
            },
        };

        let content = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        let config = Self::from_toml_str(&content)?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// `<config dir>/webssh-client/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "webssh-client")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy {
            enabled: self.reconnect.enabled,
            delay_secs: self.reconnect.delay_secs.max(1),
        }
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.connect.handshake_timeout_ms)
    }

    pub fn probe_interval(&self) -> Duration {
        Duration::from_secs(self.latency.interval_secs.max(1))
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.latency.timeout_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.terminal.settle_delay_ms)
    }

    fn server_url(&self) -> Result<reqwest::Url, ConfigError> {
        reqwest::Url::parse(&self.server.url).map_err(|e| ConfigError::InvalidUrl {
            url: self.server.url.clone(),
            reason: e.to_string(),
        })
    }

    /// HTTP(S) origin serving the same host as the control channel
    pub fn probe_origin(&self) -> Result<String, ConfigError> {
        let url = self.server_url()?;
        let scheme = match url.scheme() {
            "ws" | "http" => "http",
            "wss" | "https" => "https",
            other => {
                return Err(ConfigError::InvalidUrl {
                    url: self.server.url.clone(),
                    reason: format!("unsupported scheme {other}"),
                })
            }
        };
        let host = url.host_str().ok_or_else(|| ConfigError::InvalidUrl {
            url: self.server.url.clone(),
            reason: "missing host".to_string(),
        })?;
        Ok(match url.port() {
            Some(port) => format!("{scheme}://{host}:{port}"),
            None => format!("{scheme}://{host}"),
        })
    }

    /// Configured probe targets, or the defaults for the server's origin
    pub fn resolved_candidates(&self) -> Result<Vec<ProbeCandidate>, ConfigError> {
        if !self.latency.candidates.is_empty() {
            return Ok(self.latency.candidates.clone());
        }
        Ok(ProbeCandidate::defaults_for(&self.probe_origin()?))
    }

    /// Value for the STOMP `host` header
    pub fn stomp_host(&self) -> Result<String, ConfigError> {
        let url = self.server_url()?;
        Ok(url.host_str().unwrap_or("localhost").to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::ProbeMethod;
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_file_gives_defaults() {
        let config = ClientConfig::from_toml_str("").unwrap();
        assert_eq!(config, ClientConfig::default());
        assert_eq!(config.reconnect.delay_secs, 5);
        assert_eq!(config.probe_timeout(), Duration::from_millis(3000));
        assert_eq!(config.probe_interval(), Duration::from_secs(10));
        assert_eq!(config.settle_delay(), Duration::from_millis(100));
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = ClientConfig::from_toml_str(
            r#"
            [server]
            url = "wss://gateway.example:8443/ssh-ws/websocket"

            [server.destinations]
            output = "/user/queue/term"

            [reconnect]
            enabled = false

            [[latency.candidates]]
            url = "https://gateway.example:8443/healthz"
            method = "HEAD"
            "#,
        )
        .unwrap();

        assert_eq!(config.server.destinations.output, "/user/queue/term");
        assert_eq!(config.server.destinations.input, "/app/ssh/input");
        assert!(!config.reconnect_policy().enabled);
        assert_eq!(config.reconnect_policy().delay_secs, 5);
        assert_eq!(
            config.resolved_candidates().unwrap(),
            vec![ProbeCandidate {
                url: "https://gateway.example:8443/healthz".to_string(),
                method: ProbeMethod::Head,
            }]
        );
        assert_eq!(config.stomp_host().unwrap(), "gateway.example");
    }

    #[test]
    fn probe_origin_follows_the_socket_scheme() {
        let mut config = ClientConfig::default();
        assert_eq!(config.probe_origin().unwrap(), "http://localhost:8080");

        config.server.url = "wss://gateway.example/ssh-ws/websocket".to_string();
        assert_eq!(config.probe_origin().unwrap(), "https://gateway.example");
        assert_eq!(
            config.resolved_candidates().unwrap()[0],
            ProbeCandidate::get("https://gateway.example/api/ping")
        );

        config.server.url = "ftp://gateway.example".to_string();
        assert!(matches!(config.probe_origin(), Err(ConfigError::InvalidUrl { .. })));
    }

    #[test]
    fn invalid_toml_is_reported() {
        assert!(matches!(
            ClientConfig::from_toml_str("[reconnect]\nenabled = \"sometimes\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(matches!(
            ClientConfig::load(Some(&missing)),
            Err(ConfigError::Read { .. })
        ));
    }
}
