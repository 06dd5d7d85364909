use std::fs;
use tracing::{debug, error, info};

use crate::types::hub_config::{AppConfig, ConfigError};

pub fn load_config(path: &str) -> Result<AppConfig, ConfigError> {
    info!("Loading configuration from: {}", path);

    let contents = fs::read_to_string(path)?;
    debug!("Processing file: {}", path);

    if contents.trim().is_empty() {
        error!("Configuration file is empty");
        return Err(ConfigError::InvalidConfig("empty file".into()));
    }

    let config: AppConfig = toml::from_str(&contents)?;

    info!("Configuration loaded successfully");
    debug!("Config: {:?}", config);

    validate_config(&config)?;

    info!("Config validated");

    Ok(config)
}

fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    if config.server.bind.is_empty() {
        return Err(ConfigError::InvalidConfig("bind cannot be empty".into()));
    }

    if config.server.max_connections == 0 {
        return Err(ConfigError::InvalidConfig(
            "max_connections must be greater than 0".into(),
        ));
    }

    if config.websocket.heartbeat_secs == 0 {
        return Err(ConfigError::InvalidConfig(
            "heartbeat_secs must be greater than 0".into(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_heartbeat_is_rejected() {
        let cfg: AppConfig = toml::from_str("[websocket]\nheartbeat_secs = 0").unwrap();
        assert!(validate_config(&cfg).is_err());
    }

    #[test]
    fn zero_max_connections_is_rejected() {
        let cfg: AppConfig = toml::from_str("[server]\nmax_connections = 0").unwrap();
        assert!(validate_config(&cfg).is_err());
    }

    #[test]
    fn defaults_validate() {
        assert!(validate_config(&AppConfig::default()).is_ok());
    }
}
