use super::{types::Config, AuthMethod, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Auth section exists (enforced by serde)
/// - An operator key is set when using api_key auth
/// - Server port is not 0
/// - Queue offset and retry budget are usable
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.auth.method == AuthMethod::ApiKey
        && config.auth.api_key.as_deref().is_none_or(str::is_empty)
    {
        return Err(ConfigError::ValidationError(
            "auth.api_key must be set when auth.method is \"api_key\"".to_string(),
        ));
    }

    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    if config.queue.utc_offset().is_none() {
        return Err(ConfigError::ValidationError(format!(
            "queue.utc_offset_minutes out of range: {}",
            config.queue.utc_offset_minutes
        )));
    }

    if config.queue.max_attempts == 0 {
        return Err(ConfigError::ValidationError(
            "queue.max_attempts must be at least 1".to_string(),
        ));
    }

    Ok(())
}
