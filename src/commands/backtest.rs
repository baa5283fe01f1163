use crate::backtester::Backtester;
use crate::config::BacktestRequest;
use crate::context::AppContext;
use crate::data_context::SessionData;
use crate::models::{round2, BacktestReport};
use crate::performance::PerformanceCalculator;
use anyhow::Result;
use chrono::Utc;
use log::{info, warn};
use uuid::Uuid;

/// Validates a backtest request, runs it, and emits the report as JSON on
/// stdout. Results are never persisted.
pub async fn run(app: &AppContext, request: &BacktestRequest) -> Result<()> {
    request.validate()?;

    let db = app.database().await?;
    let data = SessionData::load(
        &db,
        &request.security_id,
        request.start_date,
        request.end_date,
    )
    .await?;
    if !data.has_data() {
        warn!(
            "No candles stored for {} between {} and {}; the run will produce an empty ledger",
            request.security_id, request.start_date, request.end_date
        );
    }
    if data.levels.is_empty() {
        warn!(
            "No daily summaries stored at or before {}; every day will be skipped",
            request.end_date
        );
    }

    let backtester = Backtester::new(request.parameters());
    let run = backtester.run(&data.day_candles, &data.levels);
    let metrics = PerformanceCalculator::evaluate(&run.trades);

    let report = BacktestReport {
        id: Uuid::new_v4().to_string(),
        security_id: request.security_id.clone(),
        start_date: request.start_date,
        end_date: request.end_date,
        parameters: request.parameters(),
        initial_capital: request.capital,
        final_capital: round2(run.final_capital),
        skipped_day_count: run.skipped_days.len(),
        trades: run.trades,
        skipped_days: run.skipped_days,
        metrics,
        created_at: Utc::now(),
    };

    info!(
        "Backtest {} for {}: {} trades, win rate {:.2}%, total pnl {:.2}, max drawdown {:.2}, {} days skipped",
        report.id,
        report.security_id,
        report.metrics.total_trades,
        report.metrics.win_rate,
        report.metrics.total_pnl,
        report.metrics.max_drawdown,
        report.skipped_day_count
    );

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
