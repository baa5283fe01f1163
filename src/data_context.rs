use crate::aggregator::{aggregate_daily, sorted_summaries};
use crate::database::Database;
use crate::levels::LevelBook;
use crate::models::Candle;
use anyhow::Result;
use chrono::NaiveDate;
use log::info;
use std::collections::BTreeMap;

/// Fully materialized inputs for one backtest window: the security's minute
/// candles grouped per local trading day, and the level book mirroring the
/// daily-summary store. Loaded once; the engine core then runs purely over
/// this data with no further I/O.
pub struct SessionData {
    pub security_id: String,
    pub day_candles: BTreeMap<NaiveDate, Vec<Candle>>,
    pub levels: LevelBook,
}

impl SessionData {
    /// Loads one backtest window. The window's own daily summaries are
    /// recomputed from the loaded candles and upserted first, so level
    /// lookups inside the window never see stale aggregates.
    pub async fn load(
        db: &Database,
        security_id: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Self> {
        let from = start_date.and_hms_opt(0, 0, 0).expect("midnight is valid");
        let to = end_date.and_hms_opt(23, 59, 0).expect("23:59 is valid");
        let candles = db.candles_in_range(security_id, from, to).await?;

        for summary in sorted_summaries(aggregate_daily(&candles)) {
            db.upsert_daily_summary(&summary).await?;
        }
        let summaries = db.summaries_at_or_before(security_id, end_date).await?;

        let data = Self::from_parts(security_id, candles, LevelBook::from_summaries(summaries));
        info!(
            "Loaded {} trading days and {} level rows for {}",
            data.day_candles.len(),
            data.levels.len(),
            security_id
        );
        Ok(data)
    }

    /// Groups candles by local trading day, each day ascending by timestamp.
    pub fn from_parts(security_id: &str, candles: Vec<Candle>, levels: LevelBook) -> Self {
        let mut day_candles: BTreeMap<NaiveDate, Vec<Candle>> = BTreeMap::new();
        for candle in candles {
            day_candles
                .entry(candle.trading_date())
                .or_default()
                .push(candle);
        }
        for day in day_candles.values_mut() {
            day.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        }

        Self {
            security_id: security_id.to_string(),
            day_candles,
            levels,
        }
    }

    pub fn has_data(&self) -> bool {
        !self.day_candles.is_empty()
    }
}
