//! One forecasting request, end to end.
//!
//! ingest → fetch (weather and market concurrently) → merge → fit → extend
//! → predict. External fetch failures only remove enrichment; every other
//! failure aborts the request.

use crate::core::dataset::{FeatureTable, TimeSeriesRow};
use crate::core::error::Result;
use crate::core::feature::{MarketProvider, WeatherProvider};
use crate::core::forecast::Forecast;
use crate::core::regressor::Regressor;
use crate::extend::{extend, validate_horizon};
use crate::forecast::ForecastSession;
use crate::ingest::ingest_bytes;
use crate::merge::merge;
use tracing::{info, warn};

pub const PREVIEW_ROWS: usize = 5;

#[derive(Debug, Clone)]
pub struct PipelineRequest<'a> {
    pub input: &'a [u8],
    pub horizon_days: u32,
    pub default_delimiter: u8,
    pub location: Option<&'a str>,
    pub currency_pair: Option<&'a str>,
}

/// The enrichment collaborators; either may be absent.
#[derive(Clone, Copy, Default)]
pub struct Enrichment<'a> {
    pub weather: Option<&'a dyn WeatherProvider>,
    pub market: Option<&'a dyn MarketProvider>,
}

#[derive(Debug, Clone)]
pub struct PipelineReport {
    pub delimiter: u8,
    /// Columns of the upload, `ds` and `y` first
    pub columns: Vec<String>,
    pub preview: Vec<TimeSeriesRow>,
    /// External features that made it into the model
    pub enrichment: Vec<String>,
    pub forecast: Forecast,
}

pub async fn run_pipeline<R: Regressor>(
    request: &PipelineRequest<'_>,
    enrichment: Enrichment<'_>,
    regressor: R,
) -> Result<PipelineReport> {
    validate_horizon(request.horizon_days)?;

    let ingested = ingest_bytes(request.input, request.default_delimiter)?;
    let columns: Vec<String> = ingested
        .dataset
        .column_names()
        .into_iter()
        .map(str::to_string)
        .collect();
    let preview: Vec<TimeSeriesRow> = ingested.dataset.rows().take(PREVIEW_ROWS).collect();
    info!(rows = ingested.dataset.len(), columns = ?columns, "Ingested upload");

    let tables = fetch_tables(request, enrichment).await;
    let external: Vec<String> = tables.iter().map(|t| t.name().to_string()).collect();

    let mut dataset = merge(ingested.dataset, &tables)?;
    for dropped in dataset.drop_empty_features() {
        warn!(feature = %dropped, "Dropping feature column with no values");
    }
    let enrichment: Vec<String> = external
        .into_iter()
        .filter(|name| dataset.feature(name).is_some())
        .collect();

    let mut session = ForecastSession::new(regressor);
    session.fit(&dataset)?;
    let extended = extend(dataset, request.horizon_days)?;
    let forecast = session.predict(&extended)?;
    info!(
        horizon = forecast.horizon(),
        enrichment = ?enrichment,
        "Forecast ready"
    );

    Ok(PipelineReport {
        delimiter: ingested.delimiter,
        columns,
        preview,
        enrichment,
        forecast,
    })
}

async fn fetch_tables(
    request: &PipelineRequest<'_>,
    enrichment: Enrichment<'_>,
) -> Vec<FeatureTable> {
    let weather = async {
        match (enrichment.weather, request.location) {
            (Some(provider), Some(location)) => Some(provider.fetch_weather(location).await),
            _ => None,
        }
    };
    let market = async {
        match (enrichment.market, request.currency_pair) {
            (Some(provider), Some(pair)) => Some(provider.fetch_market(pair).await),
            _ => None,
        }
    };

    let (weather, market) = futures::join!(weather, market);
    weather.into_iter().chain(market).collect()
}
