use serde::Deserialize;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),
}

// ---------------------------------------------------------------------------
// Config structs
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WebsocketConfig {
    /// Seconds between protocol-level pings sent by the hub's writer task.
    /// This is what detects half-open connections; application-level
    /// `ping`/`pong` messages are an extra probe clients may use on top.
    #[serde(default = "default_heartbeat_secs")]
    pub heartbeat_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub websocket: WebsocketConfig,
}

// ---------------------------------------------------------------------------
// Defaults + helpers
// ---------------------------------------------------------------------------

fn default_bind() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    1337
}

fn default_max_connections() -> usize {
    1024
}

fn default_heartbeat_secs() -> u64 {
    30
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
            max_connections: default_max_connections(),
        }
    }
}

impl Default for WebsocketConfig {
    fn default() -> Self {
        Self {
            heartbeat_secs: default_heartbeat_secs(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            websocket: WebsocketConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Full bind address, e.g. `"127.0.0.1:1337"`
    pub fn addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_yields_defaults() {
        let cfg: AppConfig = toml::from_str("").unwrap();
        assert_eq!(cfg.server.port, 1337);
        assert_eq!(cfg.server.max_connections, 1024);
        assert_eq!(cfg.websocket.heartbeat_secs, 30);
    }

    #[test]
    fn explicit_values_override_defaults() {
        let cfg: AppConfig = toml::from_str(
            r#"
            [server]
            bind = "0.0.0.0"
            port = 9000

            [websocket]
            heartbeat_secs = 10
            "#,
        )
        .unwrap();
        assert_eq!(cfg.server.addr(), "0.0.0.0:9000");
        assert_eq!(cfg.websocket.heartbeat_secs, 10);
    }
}
