use crate::models::DailySummary;
use chrono::{Duration, NaiveDate};
use std::collections::BTreeMap;

/// Ordered view of one security's daily summaries, mirroring the
/// daily-summary store for level lookups during a run.
#[derive(Debug, Default)]
pub struct LevelBook {
    by_date: BTreeMap<NaiveDate, DailySummary>,
}

impl LevelBook {
    pub fn from_summaries(summaries: Vec<DailySummary>) -> Self {
        let mut by_date = BTreeMap::new();
        for summary in summaries {
            // Later rows replace earlier ones for the same date, matching
            // the store's upsert semantics.
            by_date.insert(summary.date, summary);
        }
        Self { by_date }
    }

    pub fn len(&self) -> usize {
        self.by_date.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_date.is_empty()
    }

    /// Most recent summary with `date <= day - 1`. Gaps such as weekends and
    /// holidays are tolerated: the lookup walks back to the latest session
    /// before the bound. `None` means the day must be skipped, never that
    /// the levels are zero.
    pub fn previous_levels(&self, day: NaiveDate) -> Option<&DailySummary> {
        let bound = day - Duration::days(1);
        self.by_date.range(..=bound).next_back().map(|(_, s)| s)
    }
}
