use crate::models::{Candle, DailySummary, SummaryKey};
use std::collections::HashMap;

/// Folds minute candles into one daily summary per (security, local calendar
/// day). Input order does not matter: groups are sorted by timestamp before
/// the first/last bar fix open and close. Pure; an empty input yields an
/// empty map and it is the caller's call whether that is fatal.
pub fn aggregate_daily(candles: &[Candle]) -> HashMap<SummaryKey, DailySummary> {
    let mut grouped: HashMap<SummaryKey, Vec<&Candle>> = HashMap::new();
    for candle in candles {
        let key = SummaryKey {
            security_id: candle.security_id.clone(),
            date: candle.trading_date(),
        };
        grouped.entry(key).or_default().push(candle);
    }

    let mut summaries = HashMap::with_capacity(grouped.len());
    for (key, mut group) in grouped {
        group.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        summaries.insert(key.clone(), summarize_day(&key, &group));
    }
    summaries
}

/// Summaries of one security sorted by date, ready for level lookups.
pub fn sorted_summaries(
    summaries: HashMap<SummaryKey, DailySummary>,
) -> Vec<DailySummary> {
    let mut rows: Vec<DailySummary> = summaries.into_values().collect();
    rows.sort_by(|a, b| {
        a.security_id
            .cmp(&b.security_id)
            .then(a.date.cmp(&b.date))
    });
    rows
}

fn summarize_day(key: &SummaryKey, group: &[&Candle]) -> DailySummary {
    // Callers only reach this with a non-empty, timestamp-sorted group.
    let first = group[0];
    let last = group[group.len() - 1];

    let mut daily_high = f64::MIN;
    let mut daily_low = f64::MAX;
    let mut total_volume = 0i64;
    for candle in group {
        daily_high = daily_high.max(candle.high);
        daily_low = daily_low.min(candle.low);
        total_volume += candle.volume;
    }

    DailySummary {
        security_id: key.security_id.clone(),
        date: key.date,
        open: first.open,
        close: last.close,
        daily_high,
        daily_low,
        total_volume,
    }
}
