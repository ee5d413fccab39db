use crate::config::types::{Config, MonitorConfig, SchedulerConfig, TransportConfig};
use crate::ConfigError;

/// Upper bound on the concurrency limit
const MAX_CONCURRENCY: usize = 1000;

/// Upper bound on redirects followed per request
const MAX_FOLLOW: usize = 20;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_scheduler_config(&config.scheduler)?;
    validate_transport_config(&config.transport)?;
    validate_monitor_config(&config.monitor)?;
    Ok(())
}

/// Validates scheduler configuration
fn validate_scheduler_config(config: &SchedulerConfig) -> Result<(), ConfigError> {
    if config.concurrency < 1 || config.concurrency > MAX_CONCURRENCY {
        return Err(ConfigError::Validation(format!(
            "concurrency must be between 1 and {}, got {}",
            MAX_CONCURRENCY, config.concurrency
        )));
    }

    if config.tries < 1 {
        return Err(ConfigError::Validation(
            "tries must be >= 1, got 0".to_string(),
        ));
    }

    Ok(())
}

/// Validates transport configuration
fn validate_transport_config(config: &TransportConfig) -> Result<(), ConfigError> {
    if config.timeout_ms < 1 {
        return Err(ConfigError::Validation(
            "timeout-ms must be >= 1ms, got 0ms".to_string(),
        ));
    }

    if config.follow > MAX_FOLLOW {
        return Err(ConfigError::Validation(format!(
            "follow must be <= {}, got {}",
            MAX_FOLLOW, config.follow
        )));
    }

    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user-agent cannot be empty".to_string(),
        ));
    }

    // Header values cannot carry control characters
    if config.user_agent.chars().any(|c| c.is_control()) {
        return Err(ConfigError::Validation(format!(
            "user-agent contains control characters: {:?}",
            config.user_agent
        )));
    }

    Ok(())
}

/// Validates monitor configuration
fn validate_monitor_config(config: &MonitorConfig) -> Result<(), ConfigError> {
    if config.enabled && config.pressure_delta == 0 {
        return Err(ConfigError::Validation(
            "pressure-delta must be >= 1 when the monitor is enabled".to_string(),
        ));
    }
    Ok(())
}
