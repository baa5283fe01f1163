use crate::config::ProviderSettings;
use crate::models::Candle;
use anyhow::{anyhow, Context, Result};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration as StdDuration;

const API_KEY_HEADER: &str = "X-API-KEY";
const CANDLE_INTERVAL_MINUTES: u32 = 1;
// The provider rejects minute-bar requests spanning more than a handful of
// days, so windows are chunked and paced.
const FETCH_SPAN_DAYS: i64 = 7;
pub const REQUEST_DELAY: StdDuration = StdDuration::from_millis(350);

pub struct MarketDataClient<'a> {
    http: &'a Client,
    base_url: String,
    headers: HeaderMap,
}

impl<'a> MarketDataClient<'a> {
    pub fn new(http: &'a Client, settings: &ProviderSettings) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            API_KEY_HEADER,
            HeaderValue::from_str(&settings.api_key).context("invalid market data API key")?,
        );

        Ok(Self {
            http,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            headers,
        })
    }

    /// Fetches one bounded window of minute candles, ascending by timestamp.
    /// The provider guarantees rows deduplicated by (security, interval,
    /// timestamp); ordering is re-asserted locally.
    pub async fn fetch_window(
        &self,
        security_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Candle>> {
        let from_instant = from.and_hms_opt(0, 0, 0).expect("midnight is valid");
        let to_instant = to.and_hms_opt(23, 59, 0).expect("23:59 is valid");
        let path = format!(
            "/v1/candles?symbol={}&interval={}&from={}&to={}",
            security_id,
            CANDLE_INTERVAL_MINUTES,
            from_instant.format("%Y-%m-%dT%H:%M:%S"),
            to_instant.format("%Y-%m-%dT%H:%M:%S"),
        );

        let payload: CandlePayload = self.get(&path).await?;
        let mut candles = Vec::with_capacity(payload.candles.len());
        for bar in payload.candles {
            candles.push(bar.into_candle(security_id)?);
        }
        candles.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        Ok(candles)
    }

    async fn get<T: DeserializeOwned>(&self, path_and_query: &str) -> Result<T> {
        let url = format!("{}{}", self.base_url, path_and_query);
        let response = self
            .http
            .get(&url)
            .headers(self.headers.clone())
            .send()
            .await
            .with_context(|| format!("market data request to {} failed", url))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(anyhow!("market data provider rate limited the request"));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!(
                "market data provider returned {} for {}: {}",
                status,
                url,
                body
            ));
        }

        response
            .json::<T>()
            .await
            .with_context(|| format!("failed to decode market data response from {}", url))
    }
}

/// Splits an inclusive date range into provider-sized request windows.
pub fn chunk_windows(from: NaiveDate, to: NaiveDate) -> Vec<(NaiveDate, NaiveDate)> {
    let mut windows = Vec::new();
    let mut cursor = from;
    while cursor <= to {
        let window_end = (cursor + Duration::days(FETCH_SPAN_DAYS - 1)).min(to);
        windows.push((cursor, window_end));
        cursor = window_end + Duration::days(1);
    }
    windows
}

#[derive(Debug, Deserialize)]
struct CandlePayload {
    candles: Vec<ProviderBar>,
}

#[derive(Debug, Deserialize)]
struct ProviderBar {
    #[serde(rename = "t")]
    timestamp: String,
    #[serde(rename = "o")]
    open: f64,
    #[serde(rename = "h")]
    high: f64,
    #[serde(rename = "l")]
    low: f64,
    #[serde(rename = "c")]
    close: f64,
    #[serde(rename = "v")]
    volume: i64,
}

impl ProviderBar {
    fn into_candle(self, security_id: &str) -> Result<Candle> {
        let timestamp = NaiveDateTime::parse_from_str(&self.timestamp, "%Y-%m-%dT%H:%M:%S")
            .with_context(|| format!("invalid candle timestamp {}", self.timestamp))?;
        Ok(Candle {
            security_id: security_id.to_string(),
            timestamp,
            open: self.open,
            high: self.high,
            low: self.low,
            close: self.close,
            volume: self.volume,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_windows_cover_range_without_overlap() {
        let from = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let to = NaiveDate::from_ymd_opt(2024, 5, 20).unwrap();

        let windows = chunk_windows(from, to);
        assert_eq!(windows.len(), 3);
        assert_eq!(windows[0].0, from);
        assert_eq!(
            windows[0].1,
            NaiveDate::from_ymd_opt(2024, 5, 7).unwrap()
        );
        assert_eq!(
            windows[1].0,
            NaiveDate::from_ymd_opt(2024, 5, 8).unwrap()
        );
        assert_eq!(windows[2].1, to);

        for pair in windows.windows(2) {
            assert_eq!(pair[0].1 + Duration::days(1), pair[1].0);
        }
    }

    #[test]
    fn single_day_range_is_one_window() {
        let day = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        assert_eq!(chunk_windows(day, day), vec![(day, day)]);
    }

    #[test]
    fn provider_bar_parses_local_timestamp() {
        let bar = ProviderBar {
            timestamp: "2024-05-08T09:15:00".to_string(),
            open: 100.0,
            high: 101.0,
            low: 99.5,
            close: 100.5,
            volume: 1_200,
        };
        let candle = bar.into_candle("AAA").expect("conversion failed");
        assert_eq!(candle.security_id, "AAA");
        assert_eq!(
            candle.timestamp,
            NaiveDate::from_ymd_opt(2024, 5, 8)
                .unwrap()
                .and_hms_opt(9, 15, 0)
                .unwrap()
        );
        assert_eq!(candle.volume, 1_200);
    }

    #[test]
    fn provider_bar_rejects_malformed_timestamp() {
        let bar = ProviderBar {
            timestamp: "08/05/2024 09:15".to_string(),
            open: 100.0,
            high: 101.0,
            low: 99.5,
            close: 100.5,
            volume: 1_200,
        };
        assert!(bar.into_candle("AAA").is_err());
    }
}
