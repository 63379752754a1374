//! Configuration validation.
//!
//! Checks every field a run depends on before the first window executes.

use crate::domain::error::ReversionError;
use crate::domain::timeframe::parse_timeframe;
use crate::ports::config_port::ConfigPort;
use chrono::NaiveDate;
use std::fmt::Display;
use std::str::FromStr;

pub fn validate_backtest_config(config: &dyn ConfigPort) -> Result<(), ReversionError> {
    validate_data_sources(config)?;
    validate_initial_capital(config)?;
    validate_dates(config)?;
    validate_interval(config, "backtest_interval")?;
    validate_interval(config, "test_interval")?;
    validate_max_selection_attempts(config)?;
    validate_random_runs(config)?;
    validate_random_seed(config)?;
    validate_risk_free_rate(config)?;
    Ok(())
}

fn validate_data_sources(config: &dyn ConfigPort) -> Result<(), ReversionError> {
    if config.get_non_empty("data", "price_dir").is_none() {
        return Err(ReversionError::ConfigMissing {
            section: "data".to_string(),
            key: "price_dir".to_string(),
        });
    }
    let universe = config.get_non_empty("data", "universe_file");
    let history = config.get_non_empty("data", "sector_history_file");
    if universe.is_none() && history.is_none() {
        return Err(ReversionError::ConfigMissing {
            section: "data".to_string(),
            key: "universe_file".to_string(),
        });
    }
    Ok(())
}

/// Numeric `[section] key`, or `default` when the key is absent or blank.
///
/// Unlike the port's typed getters, a value that does not parse is an error
/// rather than a silent fallback.
pub(crate) fn parse_value<T>(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: T,
) -> Result<T, ReversionError>
where
    T: FromStr,
    T::Err: Display,
{
    match config.get_non_empty(section, key) {
        None => Ok(default),
        Some(raw) => raw.parse::<T>().map_err(|e| ReversionError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: format!("invalid {key} value '{raw}': {e}"),
        }),
    }
}

fn validate_initial_capital(config: &dyn ConfigPort) -> Result<(), ReversionError> {
    let value: f64 = parse_value(config, "backtest", "initial_capital", 0.0)?;
    if !(value > 0.0 && value.is_finite()) {
        return Err(ReversionError::ConfigInvalid {
            section: "backtest".to_string(),
            key: "initial_capital".to_string(),
            reason: "initial_capital must be positive".to_string(),
        });
    }
    Ok(())
}

fn validate_dates(config: &dyn ConfigPort) -> Result<(), ReversionError> {
    let start_str = config.get_non_empty("backtest", "start_date");
    let end_str = config.get_non_empty("backtest", "end_date");

    let start_date = parse_date(start_str.as_deref(), "start_date")?;
    let end_date = parse_date(end_str.as_deref(), "end_date")?;

    if start_date >= end_date {
        return Err(ReversionError::InvalidDateRange {
            start: start_date,
            end: end_date,
        });
    }
    Ok(())
}

pub(crate) fn parse_date(value: Option<&str>, field: &str) -> Result<NaiveDate, ReversionError> {
    match value {
        None => Err(ReversionError::ConfigMissing {
            section: "backtest".to_string(),
            key: field.to_string(),
        }),
        Some(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").map_err(|_| {
            ReversionError::ConfigInvalid {
                section: "backtest".to_string(),
                key: field.to_string(),
                reason: format!("invalid {} format, expected YYYY-MM-DD", field),
            }
        }),
    }
}

fn validate_interval(config: &dyn ConfigPort, key: &str) -> Result<(), ReversionError> {
    match config.get_non_empty("backtest", key) {
        None => Err(ReversionError::ConfigMissing {
            section: "backtest".to_string(),
            key: key.to_string(),
        }),
        Some(token) => parse_timeframe(&token).map(|_| ()),
    }
}

fn validate_max_selection_attempts(config: &dyn ConfigPort) -> Result<(), ReversionError> {
    let value: i64 = parse_value(config, "backtest", "max_selection_attempts", 1)?;
    if value < 1 {
        return Err(ReversionError::ConfigInvalid {
            section: "backtest".to_string(),
            key: "max_selection_attempts".to_string(),
            reason: "max_selection_attempts must be at least 1".to_string(),
        });
    }
    Ok(())
}

fn validate_random_runs(config: &dyn ConfigPort) -> Result<(), ReversionError> {
    let value: i64 = parse_value(config, "backtest", "random_runs", 0)?;
    if value < 0 {
        return Err(ReversionError::ConfigInvalid {
            section: "backtest".to_string(),
            key: "random_runs".to_string(),
            reason: "random_runs must be non-negative".to_string(),
        });
    }
    Ok(())
}

fn validate_random_seed(config: &dyn ConfigPort) -> Result<(), ReversionError> {
    if let Some(seed) = config.get_non_empty("backtest", "random_seed") {
        seed.parse::<u64>()
            .map_err(|e| ReversionError::ConfigInvalid {
                section: "backtest".to_string(),
                key: "random_seed".to_string(),
                reason: format!("random_seed must be an unsigned integer: {e}"),
            })?;
    }
    Ok(())
}

fn validate_risk_free_rate(config: &dyn ConfigPort) -> Result<(), ReversionError> {
    let value: f64 = parse_value(config, "backtest", "risk_free_rate", 0.0)?;
    if !(0.0..1.0).contains(&value) {
        return Err(ReversionError::ConfigInvalid {
            section: "backtest".to_string(),
            key: "risk_free_rate".to_string(),
            reason: "risk_free_rate must be between 0 and 1".to_string(),
        });
    }
    Ok(())
}
