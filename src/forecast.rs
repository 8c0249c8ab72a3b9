//! Orchestrates fitting and prediction across the [`Regressor`] boundary.
//!
//! A [`ForecastSession`] moves through `Unfit -> Fit -> Predicted`. It
//! registers every feature column of the training data as a regressor and
//! insists the prediction frame carries exactly the same set. Output is
//! cut down to the dates after the last training date.

use crate::core::dataset::{Dataset, FeatureColumn};
use crate::core::error::{ForecastError, Result};
use crate::core::forecast::{ComponentRow, Forecast, ForecastWindow};
use crate::core::regressor::{PredictionFrame, Regressor, RegressorColumn, TrainingFrame};
use crate::extend::MIN_HISTORY_ROWS;
use chrono::NaiveDate;
use std::collections::BTreeSet;
use std::fmt::Display;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Unfit,
    Fit,
    Predicted,
}

impl Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Phase::Unfit => "unfit",
                Phase::Fit => "fit",
                Phase::Predicted => "predicted",
            }
        )
    }
}

/// An engine model together with what it was trained on.
#[derive(Debug, Clone)]
pub struct FittedModel<M> {
    pub model: M,
    pub regressors: Vec<String>,
    pub last_training_date: NaiveDate,
}

pub struct ForecastSession<R: Regressor> {
    regressor: R,
    fitted: Option<FittedModel<R::Model>>,
    phase: Phase,
}

impl<R: Regressor> ForecastSession<R> {
    pub fn new(regressor: R) -> Self {
        Self {
            regressor,
            fitted: None,
            phase: Phase::Unfit,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn fitted(&self) -> Option<&FittedModel<R::Model>> {
        self.fitted.as_ref()
    }

    /// Fits the engine on the history rows of `dataset`.
    pub fn fit(&mut self, dataset: &Dataset) -> Result<()> {
        if self.phase != Phase::Unfit {
            return Err(ForecastError::State(format!(
                "fit requires an unfit session, session is {}",
                self.phase
            )));
        }

        let history_len = dataset.history_len();
        if history_len < MIN_HISTORY_ROWS {
            return Err(ForecastError::Validation(format!(
                "at least {MIN_HISTORY_ROWS} historical rows are required, got {history_len}"
            )));
        }
        let last_training_date = dataset.last_history_date().ok_or_else(|| {
            ForecastError::Validation("dataset has no historical rows".to_string())
        })?;

        let regressors = dense_columns(dataset.features(), history_len)?;
        let names: Vec<String> = regressors.iter().map(|c| c.name.clone()).collect();
        let frame = TrainingFrame {
            dates: dataset.dates()[..history_len].to_vec(),
            target: dataset.history_values(),
            regressors,
        };

        info!(rows = history_len, regressors = ?names, "Fitting model");
        let model = self.regressor.fit(&frame)?;

        self.fitted = Some(FittedModel {
            model,
            regressors: names,
            last_training_date,
        });
        self.phase = Phase::Fit;
        Ok(())
    }

    /// Predicts over every row of `extended` and returns the horizon part.
    pub fn predict(&mut self, extended: &Dataset) -> Result<Forecast> {
        let fitted = self.fitted.as_ref().ok_or_else(|| {
            ForecastError::State(format!(
                "predict requires a fit session, session is {}",
                self.phase
            ))
        })?;

        check_regressor_parity(&fitted.regressors, &extended.feature_names())?;

        let horizon = extended
            .dates()
            .iter()
            .filter(|date| **date > fitted.last_training_date)
            .count();
        if horizon == 0 {
            return Err(ForecastError::Validation(format!(
                "no dates after {} to predict",
                fitted.last_training_date
            )));
        }

        // Column order follows the fitted registration order.
        let mut regressors = Vec::with_capacity(fitted.regressors.len());
        for name in &fitted.regressors {
            let column = extended.feature(name).ok_or_else(|| {
                ForecastError::Schema(format!("missing regressor column '{name}'"))
            })?;
            regressors.push(dense_column(column, extended.len())?);
        }
        let frame = PredictionFrame {
            dates: extended.dates().to_vec(),
            regressors,
        };

        let outputs = self.regressor.predict(&fitted.model, &frame)?;
        if outputs.len() != frame.dates.len() {
            return Err(ForecastError::Model(format!(
                "engine returned {} rows for {} dates",
                outputs.len(),
                frame.dates.len()
            )));
        }

        let mut windows = Vec::with_capacity(horizon);
        let mut components = Vec::with_capacity(horizon);
        for output in outputs
            .iter()
            .filter(|o| o.date > fitted.last_training_date)
        {
            let ordered = output.yhat_lower <= output.yhat && output.yhat <= output.yhat_upper;
            if !ordered || !output.yhat.is_finite() {
                return Err(ForecastError::Model(format!(
                    "engine returned an invalid interval for {}: {} <= {} <= {}",
                    output.date, output.yhat_lower, output.yhat, output.yhat_upper
                )));
            }
            windows.push(ForecastWindow {
                date: output.date,
                point_estimate: output.yhat,
                lower_bound: output.yhat_lower,
                upper_bound: output.yhat_upper,
            });
            components.push(ComponentRow {
                date: output.date,
                trend: output.trend,
                weekly: output.weekly,
                yearly: output.yearly,
                extra_regressors: output.extra_regressors,
            });
        }
        debug!(horizon = windows.len(), "Prediction complete");

        let forecast = Forecast {
            windows,
            components,
            regressors: fitted.regressors.clone(),
        };
        self.phase = Phase::Predicted;
        Ok(forecast)
    }
}

fn check_regressor_parity(fitted: &[String], offered: &[&str]) -> Result<()> {
    let fitted: BTreeSet<&str> = fitted.iter().map(String::as_str).collect();
    let offered: BTreeSet<&str> = offered.iter().copied().collect();
    if fitted == offered {
        return Ok(());
    }

    let missing: Vec<&str> = fitted.difference(&offered).copied().collect();
    let unexpected: Vec<&str> = offered.difference(&fitted).copied().collect();
    let mut problems = Vec::new();
    if !missing.is_empty() {
        problems.push(format!("missing {}", missing.join(", ")));
    }
    if !unexpected.is_empty() {
        problems.push(format!("unexpected {}", unexpected.join(", ")));
    }
    Err(ForecastError::Schema(format!(
        "prediction regressors do not match fitted regressors: {}",
        problems.join("; ")
    )))
}

fn dense_columns(columns: &[FeatureColumn], len: usize) -> Result<Vec<RegressorColumn>> {
    columns.iter().map(|c| dense_column(c, len)).collect()
}

/// Gap-free copy of the first `len` values: gaps take the previous value,
/// leading gaps the first known one.
fn dense_column(column: &FeatureColumn, len: usize) -> Result<RegressorColumn> {
    let values = &column.values[..len.min(column.values.len())];
    let first = values.iter().find_map(|v| *v).ok_or_else(|| {
        ForecastError::Validation(format!("regressor '{}' has no values", column.name))
    })?;

    let mut last = first;
    let dense = values
        .iter()
        .map(|v| {
            if let Some(v) = v {
                last = *v;
            }
            last
        })
        .collect();

    Ok(RegressorColumn {
        name: column.name.clone(),
        values: dense,
    })
}
