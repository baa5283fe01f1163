use crate::aggregator::{aggregate_daily, sorted_summaries};
use crate::context::AppContext;
use anyhow::Result;
use log::{info, warn};

/// Recomputes every daily summary for a security from its stored candles.
/// Summaries are derived data; the rebuilt rows replace whatever was stored.
pub async fn run(app: &AppContext, security_id: &str) -> Result<()> {
    let db = app.database().await?;
    let candles = db.all_candles_for_security(security_id).await?;
    if candles.is_empty() {
        warn!("No candles stored for {}; nothing to rebuild", security_id);
        return Ok(());
    }

    let summaries = sorted_summaries(aggregate_daily(&candles));
    for summary in &summaries {
        db.upsert_daily_summary(summary).await?;
    }
    info!(
        "Rebuilt {} daily summaries for {} from {} candles",
        summaries.len(),
        security_id,
        candles.len()
    );

    Ok(())
}
