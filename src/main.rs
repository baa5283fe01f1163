use anyhow::anyhow;
use breakout_engine::commands::{backtest, fetch_data, rebuild_summaries};
use breakout_engine::config::{
    self, BacktestRequest, DEFAULT_CAPITAL, DEFAULT_STOP_LOSS_PERCENT, DEFAULT_TARGET_PERCENT,
};
use breakout_engine::context::AppContext;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use log::info;
use std::env;

#[derive(Parser)]
#[command(name = "breakout-engine")]
#[command(about = "An intraday breakout strategy backtester")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch minute candles from the market data provider and store them
    FetchData {
        /// Security to fetch
        security_id: String,
        /// First day to fetch (YYYY-MM-DD)
        from: NaiveDate,
        /// Last day to fetch (YYYY-MM-DD)
        to: NaiveDate,
    },
    /// Recompute all daily summaries for a security from stored candles
    RebuildSummaries {
        /// Security to rebuild
        security_id: String,
    },
    /// Run the breakout backtest over a date range and print the report
    Backtest {
        /// Security to backtest
        security_id: String,
        /// First day of the window (YYYY-MM-DD)
        start_date: NaiveDate,
        /// Last day of the window (YYYY-MM-DD)
        end_date: NaiveDate,
        /// Profit target as a percent of the entry price
        #[arg(long, default_value_t = DEFAULT_TARGET_PERCENT)]
        target_percent: f64,
        /// Stop loss as a percent of the entry price
        #[arg(long, default_value_t = DEFAULT_STOP_LOSS_PERCENT)]
        stop_loss_percent: f64,
        /// Starting capital for position sizing
        #[arg(long, default_value_t = DEFAULT_CAPITAL)]
        capital: f64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let Cli { command } = cli;

    let database_url = env::var(config::DATABASE_URL_ENV_VAR).ok();
    if database_url.is_none() {
        return Err(anyhow!(
            "DATABASE_URL must be set; every engine command works against the candle store."
        ));
    }
    let app_context = AppContext::initialize(database_url).await?;
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    info!("Starting breakout engine. Not financial advice. Use at your own risk.");

    match command {
        Commands::FetchData {
            security_id,
            from,
            to,
        } => {
            fetch_data::run(&app_context, &security_id, from, to).await?;
        }
        Commands::RebuildSummaries { security_id } => {
            rebuild_summaries::run(&app_context, &security_id).await?;
        }
        Commands::Backtest {
            security_id,
            start_date,
            end_date,
            target_percent,
            stop_loss_percent,
            capital,
        } => {
            let request = BacktestRequest {
                security_id,
                start_date,
                end_date,
                target_percent,
                stop_loss_percent,
                capital,
            };
            backtest::run(&app_context, &request).await?;
        }
    }

    Ok(())
}
