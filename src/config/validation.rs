//! Configuration validation
//!
//! Sanity checks that catch obviously broken settings at startup, before the
//! bot connects anywhere.

use crate::utils::errors::RideMateError;
use super::settings::Settings;

/// Validate the full settings tree
pub fn validate_settings(settings: &Settings) -> Result<(), RideMateError> {
    validate_bot_config(settings)?;
    validate_database_config(settings)?;
    validate_flow_config(settings)?;
    Ok(())
}

fn validate_bot_config(settings: &Settings) -> Result<(), RideMateError> {
    if settings.bot.token.trim().is_empty() {
        return Err(RideMateError::Config(
            "Bot token is required (RIDEMATE__BOT__TOKEN)".to_string(),
        ));
    }
    if settings.bot.admin_id == 0 {
        return Err(RideMateError::Config(
            "Operator admin_id is required (RIDEMATE__BOT__ADMIN_ID)".to_string(),
        ));
    }
    Ok(())
}

fn validate_database_config(settings: &Settings) -> Result<(), RideMateError> {
    if !settings.database.url.starts_with("sqlite:") {
        return Err(RideMateError::Config(format!(
            "Unsupported database url: {}",
            settings.database.url
        )));
    }
    if settings.database.max_connections == 0 {
        return Err(RideMateError::Config(
            "database.max_connections must be at least 1".to_string(),
        ));
    }
    Ok(())
}

fn validate_flow_config(settings: &Settings) -> Result<(), RideMateError> {
    if settings.flow.idle_timeout_secs == 0 {
        return Err(RideMateError::Config(
            "flow.idle_timeout_secs must be positive".to_string(),
        ));
    }
    if settings.flow.subscription_days <= 0 {
        return Err(RideMateError::Config(
            "flow.subscription_days must be positive".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_settings() -> Settings {
        let mut settings = Settings::default();
        settings.bot.token = "123:abc".to_string();
        settings.bot.admin_id = 42;
        settings
    }

    #[test]
    fn test_valid_settings_pass() {
        assert!(validate_settings(&valid_settings()).is_ok());
    }

    #[test]
    fn test_missing_token_rejected() {
        let mut settings = valid_settings();
        settings.bot.token = String::new();
        assert!(validate_settings(&settings).is_err());
    }

    #[test]
    fn test_missing_admin_rejected() {
        let mut settings = valid_settings();
        settings.bot.admin_id = 0;
        assert!(validate_settings(&settings).is_err());
    }

    #[test]
    fn test_zero_idle_timeout_rejected() {
        let mut settings = valid_settings();
        settings.flow.idle_timeout_secs = 0;
        assert!(validate_settings(&settings).is_err());
    }
}
