use crate::catalog::endpoints;
use crate::config::types::{Config, FetcherSettings, OutputConfig, RangeConfig, RelaysConfig};
use crate::ConfigError;

/// Upper bound for both throttle caps
const MAX_CAP: u32 = 1000;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_relays(&config.relays)?;
    validate_fetcher(&config.fetcher)?;
    validate_range(&config.range)?;
    validate_output(&config.output)?;
    Ok(())
}

/// Validates that the relay selector exists on the chosen network
fn validate_relays(config: &RelaysConfig) -> Result<(), ConfigError> {
    if endpoints(config.network, config.relay).is_empty() {
        return Err(ConfigError::Validation(format!(
            "relay '{}' does not serve network '{}'",
            config.relay, config.network
        )));
    }
    Ok(())
}

/// Validates throttle and retry settings
fn validate_fetcher(config: &FetcherSettings) -> Result<(), ConfigError> {
    if config.max_concurrent < 1 || config.max_concurrent > MAX_CAP {
        return Err(ConfigError::Validation(format!(
            "max_concurrent must be between 1 and {}, got {}",
            MAX_CAP, config.max_concurrent
        )));
    }

    if config.max_per_second < 1 || config.max_per_second > MAX_CAP {
        return Err(ConfigError::Validation(format!(
            "max_per_second must be between 1 and {}, got {}",
            MAX_CAP, config.max_per_second
        )));
    }

    if config.request_timeout_secs < 1 {
        return Err(ConfigError::Validation(format!(
            "request_timeout_secs must be >= 1, got {}",
            config.request_timeout_secs
        )));
    }

    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user_agent cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates the slot range when both ends are present
fn validate_range(config: &RangeConfig) -> Result<(), ConfigError> {
    match (config.start_slot, config.end_slot) {
        (Some(start), Some(end)) if end <= start => Err(ConfigError::Validation(format!(
            "end_slot ({}) must be greater than start_slot ({})",
            end, start
        ))),
        (Some(_), None) | (None, Some(_)) => Err(ConfigError::Validation(
            "start_slot and end_slot must be given together".to_string(),
        )),
        _ => Ok(()),
    }
}

/// Validates output configuration
fn validate_output(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.filename.is_empty() {
        return Err(ConfigError::Validation(
            "filename cannot be empty".to_string(),
        ));
    }

    if config.filename.contains('/') || config.filename.contains('\\') {
        return Err(ConfigError::Validation(format!(
            "filename must not contain path separators, got '{}'",
            config.filename
        )));
    }

    if config.save_to_file && config.directory.is_empty() {
        return Err(ConfigError::Validation(
            "directory cannot be empty when save_to_file is set".to_string(),
        ));
    }

    Ok(())
}
