//! External feature abstractions

use crate::core::dataset::FeatureTable;
use async_trait::async_trait;

pub const TEMPERATURE_FEATURE: &str = "temperature";
pub const EXCHANGE_RATE_FEATURE: &str = "exchange_rate";

/// Daily weather for a free-text location.
///
/// Never fails: when the service is unavailable the result is an empty
/// table named [`TEMPERATURE_FEATURE`].
#[async_trait]
pub trait WeatherProvider: Send + Sync {
    async fn fetch_weather(&self, location: &str) -> FeatureTable;
}

/// Daily closing rates for a currency pair such as `EUR/USD`.
///
/// Never fails: when the service is unavailable the result is an empty
/// table named [`EXCHANGE_RATE_FEATURE`].
#[async_trait]
pub trait MarketProvider: Send + Sync {
    async fn fetch_market(&self, pair: &str) -> FeatureTable;
}
