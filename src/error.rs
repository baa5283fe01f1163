use chrono::NaiveDate;
use thiserror::Error;

/// Malformed or out-of-range backtest inputs. Surfaced before any data is
/// loaded or simulated; never retried.
///
/// Missing prior levels and candle-free days are not errors: the driver
/// absorbs them as [`crate::models::SkippedDay`] entries. Failures of the
/// store or the provider propagate as `anyhow` errors with the offending
/// day or parameter attached.
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("start date {start} must be before end date {end}")]
    DateRange { start: NaiveDate, end: NaiveDate },
    #[error("target percent must be in (0, {max}] (value: {value})")]
    TargetPercent { value: f64, max: f64 },
    #[error("stop loss percent must be in (0, {max}] (value: {value})")]
    StopLossPercent { value: f64, max: f64 },
    #[error("capital must be at least {minimum} (value: {value})")]
    Capital { value: f64, minimum: f64 },
}
