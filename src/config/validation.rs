//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check addresses, URLs, and value ranges per mode
//!
//! # Design Decisions
//! - Returns all validation errors, not just the first
//! - Validation is a pure function over the loaded config
//! - Runs after CLI overrides, before any socket is bound

use std::fmt;
use std::net::SocketAddr;

use url::Url;

use crate::config::schema::TunnelConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate everything server mode needs.
pub fn validate_server(config: &TunnelConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    check_bind_address(&mut errors, "server.bind_address", &config.server.bind_address);
    check_secret(&mut errors, "server.secret", &config.server.secret);
    check_timeouts(&mut errors, config);
    finish(errors)
}

/// Validate everything client mode needs.
pub fn validate_client(config: &TunnelConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    check_bind_address(&mut errors, "client.bind_address", &config.client.bind_address);
    check_secret(&mut errors, "client.secret", &config.client.secret);
    check_url(&mut errors, "client.upload_url", &config.client.upload_url);
    check_url(&mut errors, "client.download_url", &config.client.download_url);

    // The destination may be a hostname, so only the shape is checked here;
    // the server resolves it at dial time.
    if !config.client.target_address.contains(':') {
        errors.push(ValidationError {
            field: "client.target_address",
            message: "expected host:port".to_string(),
        });
    }

    if config.client.max_connections == 0 {
        errors.push(ValidationError {
            field: "client.max_connections",
            message: "must be greater than zero".to_string(),
        });
    }

    check_timeouts(&mut errors, config);
    finish(errors)
}

fn finish(errors: Vec<ValidationError>) -> Result<(), Vec<ValidationError>> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_bind_address(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError {
            field,
            message: format!("`{}` is not a valid socket address", value),
        });
    }
}

fn check_secret(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if value.is_empty() {
        errors.push(ValidationError {
            field,
            message: "shared secret must not be empty".to_string(),
        });
    }
}

fn check_url(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    match Url::parse(value) {
        Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {}
        Ok(url) => errors.push(ValidationError {
            field,
            message: format!("unsupported scheme `{}`", url.scheme()),
        }),
        Err(e) => errors.push(ValidationError {
            field,
            message: format!("`{}` is not a valid URL: {}", value, e),
        }),
    }
}

fn check_timeouts(errors: &mut Vec<ValidationError>, config: &TunnelConfig) {
    let checks = [
        ("timeouts.dial_secs", config.timeouts.dial_secs),
        ("timeouts.idle_secs", config.timeouts.idle_secs),
        ("timeouts.session_wait_secs", config.timeouts.session_wait_secs),
    ];
    for (field, value) in checks {
        if value == 0 {
            errors.push(ValidationError {
                field,
                message: "must be greater than zero".to_string(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server_config() -> TunnelConfig {
        let mut config = TunnelConfig::default();
        config.server.secret = "s3cret".to_string();
        config
    }

    fn client_config() -> TunnelConfig {
        let mut config = TunnelConfig::default();
        config.client.secret = "s3cret".to_string();
        config.client.upload_url = "http://relay.example:8080/upload".to_string();
        config.client.download_url = "http://relay.example:8080/download".to_string();
        config.client.target_address = "10.0.0.2:22".to_string();
        config
    }

    #[test]
    fn valid_server_config_passes() {
        assert!(validate_server(&server_config()).is_ok());
    }

    #[test]
    fn empty_secret_is_rejected() {
        let mut config = server_config();
        config.server.secret.clear();
        let errors = validate_server(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "server.secret");
    }

    #[test]
    fn valid_client_config_passes() {
        assert!(validate_client(&client_config()).is_ok());
    }

    #[test]
    fn client_urls_must_be_http() {
        let mut config = client_config();
        config.client.upload_url = "ftp://relay.example/upload".to_string();
        config.client.download_url = "not a url".to_string();
        let errors = validate_client(&config).unwrap_err();
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn all_problems_are_reported_together() {
        let config = TunnelConfig::default();
        let errors = validate_client(&config).unwrap_err();
        assert!(errors.len() >= 4);
    }
}
