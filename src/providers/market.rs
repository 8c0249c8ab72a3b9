use crate::core::config::MarketProviderConfig;
use crate::core::dataset::{FeaturePoint, FeatureTable};
use crate::core::feature::{EXCHANGE_RATE_FEATURE, MarketProvider};
use crate::providers::util::{build_url, get_text, or_empty};
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::instrument;

const QUERY_ENDPOINT: &str = "/query";
const FX_DAILY_FUNCTION: &str = "FX_DAILY";

// AlphaVantageProvider implementation for MarketProvider
pub struct AlphaVantageProvider {
    base_url: String,
    api_key: Option<String>,
}

impl AlphaVantageProvider {
    pub fn new(config: &MarketProviderConfig) -> Self {
        AlphaVantageProvider {
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
        }
    }

    async fn try_fetch(&self, pair: &str) -> Result<FeatureTable> {
        let (from, to) = split_pair(pair)?;
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| anyhow!("No market API key configured"))?;
        let url = build_url(
            &self.base_url,
            QUERY_ENDPOINT,
            &[
                ("function", FX_DAILY_FUNCTION),
                ("from_symbol", &from),
                ("to_symbol", &to),
                ("apikey", api_key),
            ],
        )?;

        let subject = format!("currency pair: {from}/{to}");
        let text = get_text(url, &subject).await?;
        let data: FxDailyResponse = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse JSON response for {subject}"))?;

        let series = match data.series {
            Some(series) => series,
            None => {
                let reason = data
                    .error_message
                    .or(data.note)
                    .or(data.information)
                    .unwrap_or_else(|| "no daily series in response".to_string());
                return Err(anyhow!("No rate data found for {}: {}", subject, reason));
            }
        };

        let points = series
            .into_iter()
            .map(|(day, bar)| {
                let date = NaiveDate::parse_from_str(&day, "%Y-%m-%d")
                    .with_context(|| format!("Invalid date '{day}' for {subject}"))?;
                let value = bar
                    .close
                    .trim()
                    .parse::<f64>()
                    .with_context(|| format!("Invalid close '{}' on {day}", bar.close))?;
                if !value.is_finite() {
                    return Err(anyhow!("Non-finite close '{}' on {day}", bar.close));
                }
                Ok(FeaturePoint { date, value })
            })
            .collect::<Result<Vec<_>>>()?;

        // FeatureTable::new sorts ascending by date.
        Ok(FeatureTable::new(EXCHANGE_RATE_FEATURE, points))
    }
}

#[derive(Debug, Deserialize)]
struct FxDailyResponse {
    #[serde(rename = "Time Series FX (Daily)")]
    series: Option<HashMap<String, FxDailyBar>>,
    #[serde(rename = "Error Message")]
    error_message: Option<String>,
    #[serde(rename = "Note")]
    note: Option<String>,
    #[serde(rename = "Information")]
    information: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FxDailyBar {
    #[serde(rename = "4. close")]
    close: String,
}

/// Accepts `EUR/USD`, `EUR-USD` and `EURUSD`.
fn split_pair(pair: &str) -> Result<(String, String)> {
    let pair = pair.trim();
    let (from, to) = match pair.split_once(['/', '-']) {
        Some((from, to)) => (from.trim(), to.trim()),
        None if pair.len() == 6 && pair.is_ascii() => pair.split_at(3),
        None => return Err(anyhow!("Invalid currency pair: '{}'", pair)),
    };

    let valid = |code: &str| code.len() == 3 && code.chars().all(|c| c.is_ascii_alphabetic());
    if !valid(from) || !valid(to) {
        return Err(anyhow!("Invalid currency pair: '{}'", pair));
    }
    Ok((from.to_ascii_uppercase(), to.to_ascii_uppercase()))
}

#[async_trait]
impl MarketProvider for AlphaVantageProvider {
    #[instrument(name = "MarketFetch", skip(self), fields(pair = %pair))]
    async fn fetch_market(&self, pair: &str) -> FeatureTable {
        or_empty(self.try_fetch(pair).await, EXCHANGE_RATE_FEATURE, pair)
    }
}
