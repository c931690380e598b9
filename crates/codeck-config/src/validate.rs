//! Post-merge configuration validation.

use crate::error::{ConfigError, ConfigResult};
use crate::types::Config;

/// Validate a fully-merged configuration.
///
/// # Errors
///
/// Returns the first validation error found.
pub fn validate(config: &Config) -> ConfigResult<()> {
    validate_sessions(config)?;
    validate_agents(config)?;
    validate_gateway(config)?;
    validate_logging(config)?;
    Ok(())
}

fn field_err(field: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError {
        field: field.to_string(),
        message: message.into(),
    }
}

fn validate_sessions(config: &Config) -> ConfigResult<()> {
    let s = &config.sessions;
    if s.max_sessions == 0 {
        return Err(field_err("sessions.max_sessions", "must be at least 1"));
    }
    if s.session_ttl_days == 0 {
        return Err(field_err("sessions.session_ttl_days", "must be at least 1"));
    }
    if s.output_buffer_bytes == 0 {
        return Err(field_err(
            "sessions.output_buffer_bytes",
            "must be greater than 0",
        ));
    }
    Ok(())
}

fn validate_agents(config: &Config) -> ConfigResult<()> {
    let a = &config.agents;
    if a.max_agents == 0 {
        return Err(field_err("agents.max_agents", "must be at least 1"));
    }
    if !(5..=60).contains(&a.sigkill_grace_secs) {
        return Err(field_err(
            "agents.sigkill_grace_secs",
            "must be between 5 and 60 seconds",
        ));
    }
    Ok(())
}

fn validate_gateway(config: &Config) -> ConfigResult<()> {
    let g = &config.gateway;
    if g.rate_limit_per_minute == 0 {
        return Err(field_err(
            "gateway.rate_limit_per_minute",
            "must be greater than 0",
        ));
    }
    if let Some(url) = &g.runtime_url {
        if url::Url::parse(url).is_err() {
            return Err(field_err("gateway.runtime_url", "must be a valid URL"));
        }
    }
    Ok(())
}

fn validate_logging(config: &Config) -> ConfigResult<()> {
    let l = &config.logging;
    if !matches!(l.format.as_str(), "pretty" | "compact" | "json") {
        return Err(field_err(
            "logging.format",
            format!("unsupported format '{}'; expected pretty, compact, or json", l.format),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(validate(&Config::default()).is_ok());
    }

    #[test]
    fn rejects_zero_max_sessions() {
        let mut config = Config::default();
        config.sessions.max_sessions = 0;
        let err = validate(&config).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError { field, .. } if field == "sessions.max_sessions"));
    }

    #[test]
    fn rejects_sigkill_grace_out_of_range() {
        let mut config = Config::default();
        config.agents.sigkill_grace_secs = 200;
        assert!(validate(&config).is_err());
        config.agents.sigkill_grace_secs = 1;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn rejects_unknown_log_format() {
        let mut config = Config::default();
        config.logging.format = "xml".to_string();
        assert!(validate(&config).is_err());
    }
}
