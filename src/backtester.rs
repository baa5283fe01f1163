use crate::levels::LevelBook;
use crate::models::{Candle, SkipReason, SkippedDay, StrategyParameters, Trade};
use crate::simulator::simulate_day;
use chrono::NaiveDate;
use log::{debug, info};
use std::collections::BTreeMap;

/// Everything a run produces before metrics are computed.
#[derive(Debug)]
pub struct BacktestRun {
    pub trades: Vec<Trade>,
    pub skipped_days: Vec<SkippedDay>,
    pub final_capital: f64,
}

/// Accumulator threaded through the day fold. Capital from day N-1 sizes
/// day N, so days are processed strictly in chronological order; this loop
/// must never be parallelized.
struct RunState {
    capital: f64,
    trades: Vec<Trade>,
    skipped_days: Vec<SkippedDay>,
}

pub struct Backtester {
    params: StrategyParameters,
}

impl Backtester {
    pub fn new(params: StrategyParameters) -> Self {
        Self { params }
    }

    /// Drives the simulation over every trading day that has candles,
    /// ascending by date: `state_n = step(state_{n-1}, day_n)`.
    pub fn run(
        &self,
        day_candles: &BTreeMap<NaiveDate, Vec<Candle>>,
        levels: &LevelBook,
    ) -> BacktestRun {
        let initial = RunState {
            capital: self.params.capital,
            trades: Vec::new(),
            skipped_days: Vec::new(),
        };

        let state = day_candles
            .iter()
            .fold(initial, |state, (day, candles)| {
                self.step(state, *day, candles, levels)
            });

        info!(
            "Backtest walked {} trading days: {} trades, {} skipped, final capital {:.2}",
            day_candles.len(),
            state.trades.len(),
            state.skipped_days.len(),
            state.capital
        );

        BacktestRun {
            trades: state.trades,
            skipped_days: state.skipped_days,
            final_capital: state.capital,
        }
    }

    fn step(
        &self,
        mut state: RunState,
        day: NaiveDate,
        candles: &[Candle],
        levels: &LevelBook,
    ) -> RunState {
        let Some(prior) = levels.previous_levels(day) else {
            debug!("Skipping {}: {}", day, SkipReason::NoPriorLevels.as_str());
            state.skipped_days.push(SkippedDay {
                date: day,
                reason: SkipReason::NoPriorLevels,
            });
            return state;
        };
        if candles.is_empty() {
            debug!("Skipping {}: {}", day, SkipReason::NoCandles.as_str());
            state.skipped_days.push(SkippedDay {
                date: day,
                reason: SkipReason::NoCandles,
            });
            return state;
        }

        let simulation = simulate_day(candles, prior, &self.params, state.capital);
        if let Some(trade) = simulation.trade {
            state.trades.push(trade);
        }
        state.capital = simulation.capital_out;
        state
    }
}
