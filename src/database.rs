use crate::models::{Candle, DailySummary};
use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveDateTime};
use log::error;
use tokio_postgres::{Client, NoTls};

// Keep candle batches to one statement per chunk without hitting the
// parameter limit (7 binds per row, 65535 parameters max).
const CANDLE_INSERT_CHUNK_SIZE: usize = 9_000;

pub struct Database {
    client: Client,
}

impl Database {
    pub async fn new<S: AsRef<str>>(database_url: S) -> Result<Self> {
        let database_url = database_url.as_ref().to_string();
        let (client, connection) = tokio_postgres::connect(&database_url, NoTls)
            .await
            .with_context(|| format!("failed to connect to PostgreSQL at {}", database_url))?;

        tokio::spawn(async move {
            if let Err(err) = connection.await {
                error!("PostgreSQL connection error: {}", err);
            }
        });

        Ok(Self { client })
    }

    pub async fn ensure_schema(&self) -> Result<()> {
        self.client
            .batch_execute(
                "CREATE TABLE IF NOT EXISTS candles (
                     security_id TEXT NOT NULL,
                     ts TIMESTAMP NOT NULL,
                     open DOUBLE PRECISION NOT NULL,
                     high DOUBLE PRECISION NOT NULL,
                     low DOUBLE PRECISION NOT NULL,
                     close DOUBLE PRECISION NOT NULL,
                     volume BIGINT NOT NULL,
                     PRIMARY KEY (security_id, ts)
                 );
                 CREATE TABLE IF NOT EXISTS daily_summaries (
                     security_id TEXT NOT NULL,
                     date DATE NOT NULL,
                     open DOUBLE PRECISION NOT NULL,
                     close DOUBLE PRECISION NOT NULL,
                     daily_high DOUBLE PRECISION NOT NULL,
                     daily_low DOUBLE PRECISION NOT NULL,
                     total_volume BIGINT NOT NULL,
                     PRIMARY KEY (security_id, date)
                 );",
            )
            .await
            .context("failed to create engine tables")?;
        Ok(())
    }

    /// Inserts candles, silently skipping rows already stored for the same
    /// (security, timestamp). Returns the number of rows offered.
    pub async fn insert_candles(&self, candles: &[Candle]) -> Result<usize> {
        for chunk in candles.chunks(CANDLE_INSERT_CHUNK_SIZE) {
            let mut query = String::from(
                "INSERT INTO candles (security_id, ts, open, high, low, close, volume) VALUES ",
            );
            let mut params: Vec<&(dyn tokio_postgres::types::ToSql + Sync)> =
                Vec::with_capacity(chunk.len() * 7);

            for (row, candle) in chunk.iter().enumerate() {
                if row > 0 {
                    query.push_str(", ");
                }
                let base = row * 7;
                query.push_str(&format!(
                    "(${}, ${}, ${}, ${}, ${}, ${}, ${})",
                    base + 1,
                    base + 2,
                    base + 3,
                    base + 4,
                    base + 5,
                    base + 6,
                    base + 7
                ));
                params.push(&candle.security_id);
                params.push(&candle.timestamp);
                params.push(&candle.open);
                params.push(&candle.high);
                params.push(&candle.low);
                params.push(&candle.close);
                params.push(&candle.volume);
            }
            query.push_str(" ON CONFLICT (security_id, ts) DO NOTHING");

            self.client
                .execute(query.as_str(), &params)
                .await
                .context("failed to insert candle batch")?;
        }
        Ok(candles.len())
    }

    pub async fn candles_in_range(
        &self,
        security_id: &str,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> Result<Vec<Candle>> {
        let rows = self
            .client
            .query(
                "SELECT security_id, ts, open, high, low, close, volume
                 FROM candles
                 WHERE security_id = $1 AND ts >= $2 AND ts <= $3
                 ORDER BY ts",
                &[&security_id, &from, &to],
            )
            .await
            .with_context(|| format!("failed to load candles for {}", security_id))?;

        let mut candles = Vec::with_capacity(rows.len());
        for row in rows {
            candles.push(Candle {
                security_id: row.get(0),
                timestamp: row.get(1),
                open: row.get(2),
                high: row.get(3),
                low: row.get(4),
                close: row.get(5),
                volume: row.get(6),
            });
        }
        Ok(candles)
    }

    pub async fn all_candles_for_security(&self, security_id: &str) -> Result<Vec<Candle>> {
        let rows = self
            .client
            .query(
                "SELECT security_id, ts, open, high, low, close, volume
                 FROM candles
                 WHERE security_id = $1
                 ORDER BY ts",
                &[&security_id],
            )
            .await
            .with_context(|| format!("failed to load candles for {}", security_id))?;

        let mut candles = Vec::with_capacity(rows.len());
        for row in rows {
            candles.push(Candle {
                security_id: row.get(0),
                timestamp: row.get(1),
                open: row.get(2),
                high: row.get(3),
                low: row.get(4),
                close: row.get(5),
                volume: row.get(6),
            });
        }
        Ok(candles)
    }

    /// Upserts one derived summary row; a recomputed summary replaces the
    /// stored one for the same (security, date).
    pub async fn upsert_daily_summary(&self, summary: &DailySummary) -> Result<()> {
        self.client
            .execute(
                "INSERT INTO daily_summaries
                     (security_id, date, open, close, daily_high, daily_low, total_volume)
                 VALUES ($1, $2, $3, $4, $5, $6, $7)
                 ON CONFLICT (security_id, date) DO UPDATE SET
                     open = EXCLUDED.open,
                     close = EXCLUDED.close,
                     daily_high = EXCLUDED.daily_high,
                     daily_low = EXCLUDED.daily_low,
                     total_volume = EXCLUDED.total_volume",
                &[
                    &summary.security_id,
                    &summary.date,
                    &summary.open,
                    &summary.close,
                    &summary.daily_high,
                    &summary.daily_low,
                    &summary.total_volume,
                ],
            )
            .await
            .with_context(|| {
                format!(
                    "failed to upsert daily summary for {} on {}",
                    summary.security_id, summary.date
                )
            })?;
        Ok(())
    }

    /// All summaries for a security dated at or before `date`, ascending.
    /// Feeds the level book for a backtest window ending at `date`.
    pub async fn summaries_at_or_before(
        &self,
        security_id: &str,
        date: NaiveDate,
    ) -> Result<Vec<DailySummary>> {
        let rows = self
            .client
            .query(
                "SELECT security_id, date, open, close, daily_high, daily_low, total_volume
                 FROM daily_summaries
                 WHERE security_id = $1 AND date <= $2
                 ORDER BY date",
                &[&security_id, &date],
            )
            .await
            .with_context(|| format!("failed to load daily summaries for {}", security_id))?;

        let mut summaries = Vec::with_capacity(rows.len());
        for row in rows {
            summaries.push(DailySummary {
                security_id: row.get(0),
                date: row.get(1),
                open: row.get(2),
                close: row.get(3),
                daily_high: row.get(4),
                daily_low: row.get(5),
                total_volume: row.get(6),
            });
        }
        Ok(summaries)
    }
}
