use crate::core::config::WeatherProviderConfig;
use crate::core::dataset::{FeaturePoint, FeatureTable};
use crate::core::feature::{TEMPERATURE_FEATURE, WeatherProvider};
use crate::providers::util::{build_url, get_text, or_empty};
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::{debug, instrument};

const FORECAST_ENDPOINT: &str = "/data/2.5/forecast";
const READING_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// OpenWeatherProvider implementation for WeatherProvider
pub struct OpenWeatherProvider {
    base_url: String,
    api_key: Option<String>,
    units: String,
}

impl OpenWeatherProvider {
    pub fn new(config: &WeatherProviderConfig) -> Self {
        OpenWeatherProvider {
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
            units: config.units.clone(),
        }
    }

    async fn try_fetch(&self, location: &str) -> Result<FeatureTable> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| anyhow!("No weather API key configured"))?;
        let url = build_url(
            &self.base_url,
            FORECAST_ENDPOINT,
            &[("q", location), ("appid", api_key), ("units", &self.units)],
        )?;

        let subject = format!("location: {location}");
        let text = get_text(url, &subject).await?;
        let data: WeatherResponse = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse weather response for {subject}"))?;

        daily_mean_temperature(&data.list)
    }
}

#[derive(Debug, Deserialize)]
struct WeatherResponse {
    list: Vec<WeatherReading>,
}

#[derive(Debug, Deserialize)]
struct WeatherReading {
    dt_txt: String,
    main: WeatherMain,
}

#[derive(Debug, Deserialize)]
struct WeatherMain {
    temp: f64,
}

/// Averages the intraday readings of each calendar date.
fn daily_mean_temperature(readings: &[WeatherReading]) -> Result<FeatureTable> {
    let mut per_day: BTreeMap<NaiveDate, (f64, usize)> = BTreeMap::new();
    for reading in readings {
        let at = NaiveDateTime::parse_from_str(&reading.dt_txt, READING_TIME_FORMAT)
            .with_context(|| format!("Invalid reading timestamp '{}'", reading.dt_txt))?;
        if !reading.main.temp.is_finite() {
            return Err(anyhow!(
                "Non-finite temperature {} at {}",
                reading.main.temp,
                reading.dt_txt
            ));
        }
        let entry = per_day.entry(at.date()).or_insert((0.0, 0));
        entry.0 += reading.main.temp;
        entry.1 += 1;
    }

    debug!(
        readings = readings.len(),
        days = per_day.len(),
        "Aggregated weather readings"
    );
    let points = per_day
        .into_iter()
        .map(|(date, (sum, count))| {
            let value = sum / count as f64;
            if !value.is_finite() {
                return Err(anyhow!("Daily mean temperature overflowed on {date}"));
            }
            Ok(FeaturePoint { date, value })
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(FeatureTable::new(TEMPERATURE_FEATURE, points))
}

#[async_trait]
impl WeatherProvider for OpenWeatherProvider {
    #[instrument(name = "WeatherFetch", skip(self), fields(location = %location))]
    async fn fetch_weather(&self, location: &str) -> FeatureTable {
        or_empty(self.try_fetch(location).await, TEMPERATURE_FEATURE, location)
    }
}
