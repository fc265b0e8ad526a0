//! Configuration validation.
//!
//! Validates all config fields before a report runs.

use crate::domain::error::JournalError;
use crate::ports::config_port::ConfigPort;

pub fn validate_journal_config(config: &dyn ConfigPort) -> Result<(), JournalError> {
    validate_current_balance(config)?;
    validate_fallback_balance(config)?;
    validate_days(config)?;
    validate_trade_sources(config)?;
    Ok(())
}

fn invalid(section: &str, key: &str, reason: &str) -> JournalError {
    JournalError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

fn is_set(config: &dyn ConfigPort, section: &str, key: &str) -> bool {
    config
        .get_string(section, key)
        .is_some_and(|v| !v.trim().is_empty())
}

fn validate_current_balance(config: &dyn ConfigPort) -> Result<(), JournalError> {
    if is_set(config, "account", "current_balance")
        && config.get_decimal("account", "current_balance").is_none()
    {
        return Err(invalid(
            "account",
            "current_balance",
            "current_balance must be a number",
        ));
    }
    Ok(())
}

fn validate_fallback_balance(config: &dyn ConfigPort) -> Result<(), JournalError> {
    if !is_set(config, "account", "fallback_balance") {
        return Ok(());
    }
    match config.get_decimal("account", "fallback_balance") {
        Some(value) if value > rust_decimal::Decimal::ZERO => Ok(()),
        _ => Err(invalid(
            "account",
            "fallback_balance",
            "fallback_balance must be a positive number",
        )),
    }
}

fn validate_days(config: &dyn ConfigPort) -> Result<(), JournalError> {
    if !is_set(config, "report", "days") {
        return Ok(());
    }
    let days = config.get_int("report", "days", -1);
    if days < 0 || days > i64::from(u32::MAX) {
        return Err(invalid(
            "report",
            "days",
            "days must be a non-negative integer",
        ));
    }
    Ok(())
}

fn validate_trade_sources(config: &dyn ConfigPort) -> Result<(), JournalError> {
    let Some(value) = config.get_string("sources", "trades") else {
        return Ok(());
    };
    if value.split(',').all(|p| p.trim().is_empty()) {
        return Err(invalid(
            "sources",
            "trades",
            "trades must list at least one CSV path",
        ));
    }
    Ok(())
}
