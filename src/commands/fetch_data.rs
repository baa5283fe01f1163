use crate::aggregator::{aggregate_daily, sorted_summaries};
use crate::config::ProviderSettings;
use crate::context::AppContext;
use crate::provider::{chunk_windows, MarketDataClient, REQUEST_DELAY};
use crate::retry::retry_data_operation;
use anyhow::{anyhow, Result};
use chrono::NaiveDate;
use indicatif::{ProgressBar, ProgressStyle};
use log::info;
use reqwest::Client;
use tokio::time::sleep;

/// Backfills minute candles for one security from the provider, then
/// refreshes the daily summaries derived from them.
pub async fn run(
    app: &AppContext,
    security_id: &str,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<()> {
    if from > to {
        return Err(anyhow!(
            "Fetch range start {} must not be after end {}",
            from,
            to
        ));
    }

    let db = app.database().await?;
    let settings = ProviderSettings::from_env()?;
    let http = Client::new();
    let client = MarketDataClient::new(&http, &settings)?;

    let windows = chunk_windows(from, to);
    info!(
        "Fetching {} to {} for {} in {} request window(s)",
        from,
        to,
        security_id,
        windows.len()
    );

    let pb = ProgressBar::new(windows.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
            .unwrap()
            .progress_chars("#>-"),
    );

    let mut fetched = Vec::new();
    for (index, (window_from, window_to)) in windows.iter().enumerate() {
        let context = format!(
            "fetching candles for {} ({} to {})",
            security_id, window_from, window_to
        );
        let candles = retry_data_operation!(context, client.fetch_window(
            security_id,
            *window_from,
            *window_to
        ))?;
        fetched.extend(candles);
        pb.inc(1);
        if index + 1 < windows.len() {
            sleep(REQUEST_DELAY).await;
        }
    }
    pb.finish_and_clear();

    if fetched.is_empty() {
        return Err(anyhow!(
            "Provider returned no candles for {} between {} and {}",
            security_id,
            from,
            to
        ));
    }

    let offered = db.insert_candles(&fetched).await?;
    info!(
        "Stored {} candles for {} (duplicates skipped by the store)",
        offered, security_id
    );

    let summaries = sorted_summaries(aggregate_daily(&fetched));
    for summary in &summaries {
        db.upsert_daily_summary(summary).await?;
    }
    info!(
        "Refreshed {} daily summaries for {}",
        summaries.len(),
        security_id
    );

    Ok(())
}
