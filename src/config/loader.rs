//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use crate::config::schema::TunnelConfig;

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Load configuration from a TOML file.
///
/// Semantic validation happens per mode at dispatch time, after CLI
/// overrides are applied on top of the file values.
pub fn load_config(path: &Path) -> Result<TunnelConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    let config: TunnelConfig = toml::from_str(&content).map_err(ConfigError::Parse)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_parses_with_defaults() {
        let config: TunnelConfig = toml::from_str(
            r#"
            [server]
            secret = "s3cret"
            "#,
        )
        .unwrap();

        assert_eq!(config.server.secret, "s3cret");
        assert_eq!(config.server.bind_address, "0.0.0.0:8080");
        assert_eq!(config.timeouts.idle_secs, 90);
        assert_eq!(config.timeouts.dial_secs, 5);
    }
}
