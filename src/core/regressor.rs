//! Capability interface for the regression engine.
//!
//! The orchestrator in [`crate::forecast`] only marshals data across this
//! boundary; trend, seasonality and interval estimation all live behind it.

use crate::core::error::Result;
use chrono::NaiveDate;

/// A dense exogenous input column.
#[derive(Debug, Clone, PartialEq)]
pub struct RegressorColumn {
    pub name: String,
    pub values: Vec<f64>,
}

/// Observed history handed to [`Regressor::fit`].
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingFrame {
    pub dates: Vec<NaiveDate>,
    pub target: Vec<f64>,
    pub regressors: Vec<RegressorColumn>,
}

/// History plus future dates handed to [`Regressor::predict`].
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionFrame {
    pub dates: Vec<NaiveDate>,
    pub regressors: Vec<RegressorColumn>,
}

/// One predicted row, in the same order as the [`PredictionFrame`] dates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelOutput {
    pub date: NaiveDate,
    pub yhat: f64,
    pub yhat_lower: f64,
    pub yhat_upper: f64,
    pub trend: f64,
    pub weekly: f64,
    pub yearly: f64,
    pub extra_regressors: f64,
}

pub trait Regressor {
    type Model;

    fn fit(&self, frame: &TrainingFrame) -> Result<Self::Model>;

    fn predict(&self, model: &Self::Model, frame: &PredictionFrame) -> Result<Vec<ModelOutput>>;
}
