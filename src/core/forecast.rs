//! Forecast output types

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A point estimate and its uncertainty interval for one horizon date.
///
/// Always `lower_bound <= point_estimate <= upper_bound`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastWindow {
    #[serde(rename = "ds")]
    pub date: NaiveDate,
    #[serde(rename = "yhat")]
    pub point_estimate: f64,
    #[serde(rename = "yhat_lower")]
    pub lower_bound: f64,
    #[serde(rename = "yhat_upper")]
    pub upper_bound: f64,
}

/// Additive decomposition of a prediction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ComponentRow {
    #[serde(rename = "ds")]
    pub date: NaiveDate,
    pub trend: f64,
    pub weekly: f64,
    pub yearly: f64,
    pub extra_regressors: f64,
}

/// Predictions restricted to the requested horizon.
#[derive(Debug, Clone, PartialEq)]
pub struct Forecast {
    pub windows: Vec<ForecastWindow>,
    pub components: Vec<ComponentRow>,
    /// Regressor columns the model was fit with
    pub regressors: Vec<String>,
}

impl Forecast {
    pub fn horizon(&self) -> usize {
        self.windows.len()
    }
}
