use crate::error::ValidationError;
use crate::models::StrategyParameters;
use anyhow::{anyhow, Result};
use chrono::NaiveDate;
use std::env;

pub const DEFAULT_TARGET_PERCENT: f64 = 0.2;
pub const DEFAULT_STOP_LOSS_PERCENT: f64 = 0.2;
pub const DEFAULT_CAPITAL: f64 = 100_000.0;
pub const MINIMUM_CAPITAL: f64 = 1_000.0;
pub const MAX_PERCENT: f64 = 10.0;

pub const DATABASE_URL_ENV_VAR: &str = "DATABASE_URL";
pub const MARKET_DATA_URL_ENV_VAR: &str = "MARKET_DATA_URL";
pub const MARKET_DATA_API_KEY_ENV_VAR: &str = "MARKET_DATA_API_KEY";

/// One backtest invocation as received at the surface. Validated before any
/// data is loaded or simulated.
#[derive(Debug, Clone)]
pub struct BacktestRequest {
    pub security_id: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub target_percent: f64,
    pub stop_loss_percent: f64,
    pub capital: f64,
}

impl BacktestRequest {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.start_date >= self.end_date {
            return Err(ValidationError::DateRange {
                start: self.start_date,
                end: self.end_date,
            });
        }
        if !(self.target_percent > 0.0 && self.target_percent <= MAX_PERCENT) {
            return Err(ValidationError::TargetPercent {
                value: self.target_percent,
                max: MAX_PERCENT,
            });
        }
        if !(self.stop_loss_percent > 0.0 && self.stop_loss_percent <= MAX_PERCENT) {
            return Err(ValidationError::StopLossPercent {
                value: self.stop_loss_percent,
                max: MAX_PERCENT,
            });
        }
        if !(self.capital >= MINIMUM_CAPITAL) {
            return Err(ValidationError::Capital {
                value: self.capital,
                minimum: MINIMUM_CAPITAL,
            });
        }
        Ok(())
    }

    pub fn parameters(&self) -> StrategyParameters {
        StrategyParameters {
            target_percent: self.target_percent,
            stop_loss_percent: self.stop_loss_percent,
            capital: self.capital,
        }
    }
}

/// Connection settings for the market data provider, sourced from the
/// environment the way the database URL is.
#[derive(Debug, Clone)]
pub struct ProviderSettings {
    pub base_url: String,
    pub api_key: String,
}

impl ProviderSettings {
    pub fn from_env() -> Result<Self> {
        let base_url = require_env(MARKET_DATA_URL_ENV_VAR)?;
        let api_key = require_env(MARKET_DATA_API_KEY_ENV_VAR)?;
        Ok(Self { base_url, api_key })
    }
}

fn require_env(key: &str) -> Result<String> {
    let value = env::var(key)
        .map_err(|_| anyhow!("Missing required environment variable {}", key))?;
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(anyhow!("Environment variable {} must not be empty", key));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> BacktestRequest {
        BacktestRequest {
            security_id: "AAA".to_string(),
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2024, 6, 30).unwrap(),
            target_percent: DEFAULT_TARGET_PERCENT,
            stop_loss_percent: DEFAULT_STOP_LOSS_PERCENT,
            capital: DEFAULT_CAPITAL,
        }
    }

    #[test]
    fn defaults_pass_validation() {
        assert!(request().validate().is_ok());
    }

    #[test]
    fn rejects_inverted_or_empty_date_range() {
        let mut req = request();
        req.end_date = req.start_date;
        assert!(matches!(
            req.validate(),
            Err(ValidationError::DateRange { .. })
        ));

        req.end_date = NaiveDate::from_ymd_opt(2023, 12, 31).unwrap();
        assert!(matches!(
            req.validate(),
            Err(ValidationError::DateRange { .. })
        ));
    }

    #[test]
    fn rejects_out_of_range_percentages() {
        let mut req = request();
        req.target_percent = 0.0;
        assert!(matches!(
            req.validate(),
            Err(ValidationError::TargetPercent { .. })
        ));

        let mut req = request();
        req.target_percent = 10.5;
        assert!(matches!(
            req.validate(),
            Err(ValidationError::TargetPercent { .. })
        ));

        let mut req = request();
        req.stop_loss_percent = -0.1;
        assert!(matches!(
            req.validate(),
            Err(ValidationError::StopLossPercent { .. })
        ));

        // The bound itself is allowed.
        let mut req = request();
        req.target_percent = MAX_PERCENT;
        req.stop_loss_percent = MAX_PERCENT;
        assert!(req.validate().is_ok());
    }

    #[test]
    fn rejects_capital_below_minimum() {
        let mut req = request();
        req.capital = 999.99;
        assert!(matches!(
            req.validate(),
            Err(ValidationError::Capital { .. })
        ));

        req.capital = MINIMUM_CAPITAL;
        assert!(req.validate().is_ok());
    }
}
