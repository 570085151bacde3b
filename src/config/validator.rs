use crate::config::ServerConfig;
use crate::error::{Error, Result};

/// Validates the bind host
pub fn validate_host(host: &str) -> Result<()> {
    if host.trim().is_empty() {
        return Err(Error::ConfigInvalid("Host must not be empty".to_string()));
    }

    if host.chars().any(char::is_whitespace) || host.contains('/') {
        return Err(Error::ConfigInvalid(format!(
            "Host '{}' is not a bare hostname or IP address",
            host
        )));
    }

    Ok(())
}

/// Validates timeouts and search limits
pub fn validate_limits(config: &ServerConfig) -> Result<()> {
    if config.startup_timeout_ms == 0 {
        return Err(Error::ConfigInvalid(
            "Startup timeout must be greater than zero".to_string(),
        ));
    }

    if config.shutdown_timeout_ms == 0 {
        return Err(Error::ConfigInvalid(
            "Shutdown timeout must be greater than zero".to_string(),
        ));
    }

    if config.port_search_limit == 0 {
        return Err(Error::ConfigInvalid(
            "Port search limit must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

/// Full configuration validation
pub fn validate_config(config: &ServerConfig) -> Result<()> {
    validate_host(&config.host)?;
    validate_limits(config)?;

    if config.php_binary.as_os_str().is_empty() {
        return Err(Error::ConfigInvalid(
            "PHP binary must not be empty".to_string(),
        ));
    }

    Ok(())
}
