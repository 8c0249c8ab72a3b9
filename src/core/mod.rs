//! Core types and abstractions

pub mod config;
pub mod dataset;
pub mod error;
pub mod feature;
pub mod forecast;
pub mod log;
pub mod regressor;

// Re-export main types for cleaner imports
pub use dataset::{Dataset, FeatureColumn, FeaturePoint, FeatureTable, TimeSeriesRow};
pub use error::{ForecastError, Result};
pub use feature::{MarketProvider, WeatherProvider};
pub use forecast::{ComponentRow, Forecast, ForecastWindow};
pub use regressor::{ModelOutput, PredictionFrame, Regressor, RegressorColumn, TrainingFrame};
