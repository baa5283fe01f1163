use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// One minute bar as delivered by the market data provider. Timestamps are
/// exchange-local and minute-aligned; within a security they are unique.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candle {
    pub security_id: String,
    pub timestamp: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: i64,
}

impl Candle {
    /// Local trading date of this bar. Intentionally not UTC-normalized:
    /// the provider's timestamps already carry the exchange calendar.
    pub fn trading_date(&self) -> NaiveDate {
        self.timestamp.date()
    }
}

/// Composite key of a daily summary row.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SummaryKey {
    pub security_id: String,
    pub date: NaiveDate,
}

/// Daily OHLCV aggregate derived from a day's minute candles. Recomputable;
/// a recomputed summary replaces the stored row for the same key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailySummary {
    pub security_id: String,
    pub date: NaiveDate,
    pub open: f64,
    pub close: f64,
    pub daily_high: f64,
    pub daily_low: f64,
    pub total_volume: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeType {
    Buy,
    Sell,
}

impl TradeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeType::Buy => "BUY",
            TradeType::Sell => "SELL",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExitReason {
    Target,
    StopLoss,
    EndOfDay,
}

impl ExitReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExitReason::Target => "TARGET",
            ExitReason::StopLoss => "STOP_LOSS",
            ExitReason::EndOfDay => "END_OF_DAY",
        }
    }
}

/// One realized breakout trade. At most one exists per (security, day).
/// Never mutated after the simulator produces it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    pub security_id: String,
    pub trade_type: TradeType,
    pub entry_price: f64,
    pub entry_time: NaiveDateTime,
    pub exit_price: f64,
    pub exit_time: NaiveDateTime,
    pub exit_reason: ExitReason,
    pub quantity: i64,
    pub pnl: f64,
    /// Unleveraged price return in percent; not scaled by quantity or capital.
    pub pnl_percent: f64,
}

/// Strategy inputs for one backtest run. Immutable for the run's duration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StrategyParameters {
    pub target_percent: f64,
    pub stop_loss_percent: f64,
    pub capital: f64,
}

/// Aggregate statistics over a trade ledger. Recomputed wholesale from the
/// ledger; drawdown is indexed by trade ordinal, not by time (skipped days
/// are invisible to it).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceMetrics {
    pub total_trades: i32,
    pub winning_trades: i32,
    pub losing_trades: i32,
    pub win_rate: f64,
    pub total_pnl: f64,
    pub average_pnl: f64,
    pub best_trade: f64,
    pub worst_trade: f64,
    pub max_drawdown: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkipReason {
    NoPriorLevels,
    NoCandles,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::NoPriorLevels => "no_prior_levels",
            SkipReason::NoCandles => "no_candles",
        }
    }
}

/// A trading day the driver skipped without touching capital.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkippedDay {
    pub date: NaiveDate,
    pub reason: SkipReason,
}

/// Invocation-surface output of a backtest run. Emitted, never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct BacktestReport {
    pub id: String,
    pub security_id: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub parameters: StrategyParameters,
    pub initial_capital: f64,
    pub final_capital: f64,
    pub trades: Vec<Trade>,
    pub skipped_days: Vec<SkippedDay>,
    pub skipped_day_count: usize,
    pub metrics: PerformanceMetrics,
    pub created_at: DateTime<Utc>,
}

/// Rounds a currency or percent figure to two decimal places for output.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round2_clamps_to_two_decimals() {
        assert_eq!(round2(1.006), 1.01);
        assert_eq!(round2(-1.006), -1.01);
        assert_eq!(round2(2.0), 2.0);
        assert_eq!(round2(0.19999999999999574), 0.2);
    }

    #[test]
    fn trading_date_uses_local_timestamp() {
        let candle = Candle {
            security_id: "AAA".to_string(),
            timestamp: NaiveDate::from_ymd_opt(2024, 3, 8)
                .unwrap()
                .and_hms_opt(9, 15, 0)
                .unwrap(),
            open: 100.0,
            high: 101.0,
            low: 99.0,
            close: 100.5,
            volume: 1_000,
        };
        assert_eq!(
            candle.trading_date(),
            NaiveDate::from_ymd_opt(2024, 3, 8).unwrap()
        );
    }
}
