//! Additive least-squares forecasting engine.
//!
//! `y(t) = trend(t) + weekly(t) + yearly(t) + Σ βᵢ·xᵢ(t)`
//!
//! - Trend is linear in time scaled to `[0, 1]` over the training span.
//! - Weekly seasonality uses a Fourier series of order 3. It needs two weeks
//!   of history, at least 14 rows and some rows less than a week apart.
//! - Yearly seasonality uses order 10 and needs two years of history with
//!   at least twice as many rows as model terms.
//! - Extra regressors are standardised with their training mean and
//!   deviation and enter linearly.
//!
//! Coefficients come from ridge-stabilised normal equations. The interval is
//! a normal band around the point estimate whose half-width grows with the
//! distance past the last training date.

use crate::core::error::{ForecastError, Result};
use crate::core::regressor::{ModelOutput, PredictionFrame, Regressor, TrainingFrame};
use chrono::{Datelike, NaiveDate};
use nalgebra::{DMatrix, DVector};
use statrs::distribution::{ContinuousCDF, Normal};
use std::f64::consts::PI;
use tracing::debug;

const WEEKLY_PERIOD: f64 = 7.0;
const WEEKLY_ORDER: usize = 3;
const YEARLY_PERIOD: f64 = 365.25;
const YEARLY_ORDER: usize = 10;

/// Minimum span (days) before each seasonality is estimated
const MIN_WEEKLY_SPAN_DAYS: i64 = 14;
const MIN_YEARLY_SPAN_DAYS: i64 = 730;
/// Minimum rows before weekly seasonality is estimated
const MIN_SEASONAL_ROWS: usize = 14;
/// Yearly terms need this many rows per model term
const YEARLY_ROWS_PER_TERM: usize = 2;

const RIDGE_PENALTY: f64 = 1e-6;
const SCALE_EPSILON: f64 = 1e-12;

pub const DEFAULT_INTERVAL_WIDTH: f64 = 0.80;

#[derive(Debug, Clone, Copy)]
pub struct AdditiveRegressor {
    interval_width: f64,
}

impl Default for AdditiveRegressor {
    fn default() -> Self {
        Self {
            interval_width: DEFAULT_INTERVAL_WIDTH,
        }
    }
}

impl AdditiveRegressor {
    pub fn new(interval_width: f64) -> Result<Self> {
        if !(interval_width > 0.0 && interval_width < 1.0) {
            return Err(ForecastError::Validation(format!(
                "interval width must be within (0, 1), got {interval_width}"
            )));
        }
        Ok(Self { interval_width })
    }

    pub fn interval_width(&self) -> f64 {
        self.interval_width
    }
}

#[derive(Debug, Clone)]
struct Standardizer {
    name: String,
    mean: f64,
    scale: f64,
}

#[derive(Debug, Clone)]
pub struct AdditiveModel {
    start: NaiveDate,
    last_date: NaiveDate,
    span_days: f64,
    weekly: bool,
    yearly: bool,
    regressors: Vec<Standardizer>,
    coefficients: Vec<f64>,
    y_scale: f64,
    sigma: f64,
    n_observations: usize,
    z: f64,
}

impl AdditiveModel {
    pub fn has_weekly(&self) -> bool {
        self.weekly
    }

    pub fn has_yearly(&self) -> bool {
        self.yearly
    }

    /// In-sample residual standard deviation, in target units
    pub fn sigma(&self) -> f64 {
        self.sigma * self.y_scale
    }

    fn seasonal_width(&self) -> usize {
        let weekly = if self.weekly { 2 * WEEKLY_ORDER } else { 0 };
        let yearly = if self.yearly { 2 * YEARLY_ORDER } else { 0 };
        weekly + yearly
    }

    fn n_features(&self) -> usize {
        2 + self.seasonal_width() + self.regressors.len()
    }

    /// Design row for `date`; `extra` holds raw regressor values in model order.
    fn design_row(&self, date: NaiveDate, extra: &[f64]) -> Vec<f64> {
        let mut row = Vec::with_capacity(self.n_features());
        row.push(1.0);
        row.push((date - self.start).num_days() as f64 / self.span_days);

        let day = f64::from(date.num_days_from_ce());
        if self.weekly {
            push_fourier(&mut row, day, WEEKLY_PERIOD, WEEKLY_ORDER);
        }
        if self.yearly {
            push_fourier(&mut row, day, YEARLY_PERIOD, YEARLY_ORDER);
        }
        for (std, value) in self.regressors.iter().zip(extra) {
            row.push((value - std.mean) / std.scale);
        }
        row
    }

    fn decompose(&self, row: &[f64]) -> (f64, f64, f64, f64) {
        let term = |range: std::ops::Range<usize>| -> f64 {
            range
                .map(|j| row[j] * self.coefficients[j])
                .sum::<f64>()
                * self.y_scale
        };

        let weekly_len = if self.weekly { 2 * WEEKLY_ORDER } else { 0 };
        let seasonal_end = 2 + self.seasonal_width();
        let trend = term(0..2);
        let weekly = term(2..2 + weekly_len);
        let yearly = term(2 + weekly_len..seasonal_end);
        let extra = term(seasonal_end..row.len());
        (trend, weekly, yearly, extra)
    }
}

fn push_fourier(row: &mut Vec<f64>, day: f64, period: f64, order: usize) {
    for k in 1..=order {
        let angle = 2.0 * PI * k as f64 * day / period;
        row.push(angle.sin());
        row.push(angle.cos());
    }
}

impl Regressor for AdditiveRegressor {
    type Model = AdditiveModel;

    fn fit(&self, frame: &TrainingFrame) -> Result<AdditiveModel> {
        let n = frame.target.len();
        if n < 2 || frame.dates.len() != n {
            return Err(ForecastError::Model(format!(
                "need at least 2 aligned observations, got {} dates and {n} targets",
                frame.dates.len()
            )));
        }
        if frame.target.iter().any(|y| !y.is_finite()) {
            return Err(ForecastError::Model("target contains non-finite values".to_string()));
        }
        if let Some(column) = frame.regressors.iter().find(|c| c.values.len() != n) {
            return Err(ForecastError::Model(format!(
                "regressor '{}' has {} values for {n} observations",
                column.name,
                column.values.len()
            )));
        }

        let (start, last_date) = frame
            .dates
            .iter()
            .fold((frame.dates[0], frame.dates[0]), |(lo, hi), d| {
                (lo.min(*d), hi.max(*d))
            });
        let span = (last_date - start).num_days();

        let regressors = frame
            .regressors
            .iter()
            .map(|column| {
                let mean = column.values.iter().sum::<f64>() / n as f64;
                let var = column.values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n as f64;
                let std = var.sqrt();
                Standardizer {
                    name: column.name.clone(),
                    mean,
                    scale: if std > SCALE_EPSILON { std } else { 1.0 },
                }
            })
            .collect();

        let weekly = span >= MIN_WEEKLY_SPAN_DAYS
            && n >= MIN_SEASONAL_ROWS
            && min_gap_days(&frame.dates) < WEEKLY_PERIOD as i64;
        let yearly_terms = 2
            + if weekly { 2 * WEEKLY_ORDER } else { 0 }
            + 2 * YEARLY_ORDER
            + frame.regressors.len();
        let yearly = span >= MIN_YEARLY_SPAN_DAYS && n >= YEARLY_ROWS_PER_TERM * yearly_terms;

        let interval_z = Normal::new(0.0, 1.0)
            .map_err(|e| ForecastError::Model(format!("standard normal unavailable: {e}")))?
            .inverse_cdf(0.5 + self.interval_width / 2.0);

        let max_abs = frame.target.iter().fold(0.0_f64, |m, y| m.max(y.abs()));
        let mut model = AdditiveModel {
            start,
            last_date,
            span_days: span.max(1) as f64,
            weekly,
            yearly,
            regressors,
            coefficients: Vec::new(),
            y_scale: if max_abs > 0.0 { max_abs } else { 1.0 },
            sigma: 0.0,
            n_observations: n,
            z: interval_z,
        };

        let p = model.n_features();
        let design_rows: Vec<f64> = (0..n)
            .flat_map(|i| {
                let extra: Vec<f64> = frame.regressors.iter().map(|c| c.values[i]).collect();
                model.design_row(frame.dates[i], &extra)
            })
            .collect();
        let design = DMatrix::from_row_slice(n, p, &design_rows);
        let targets = DVector::from_iterator(n, frame.target.iter().map(|y| y / model.y_scale));

        let coefficients = solve_ridge(&design, &targets)?;
        let ssr = (&targets - &design * &coefficients).norm_squared();
        model.coefficients = coefficients.iter().copied().collect();
        model.sigma = (ssr / n.saturating_sub(p).max(1) as f64).sqrt();

        debug!(
            observations = n,
            features = p,
            weekly = model.weekly,
            yearly = model.yearly,
            sigma = model.sigma(),
            "Fitted additive model"
        );
        Ok(model)
    }

    fn predict(&self, model: &AdditiveModel, frame: &PredictionFrame) -> Result<Vec<ModelOutput>> {
        let columns = model
            .regressors
            .iter()
            .map(|std| {
                frame
                    .regressors
                    .iter()
                    .find(|c| c.name == std.name)
                    .filter(|c| c.values.len() == frame.dates.len())
                    .ok_or_else(|| {
                        ForecastError::Schema(format!(
                            "regressor '{}' missing from prediction frame",
                            std.name
                        ))
                    })
            })
            .collect::<Result<Vec<_>>>()?;

        let outputs = frame
            .dates
            .iter()
            .enumerate()
            .map(|(i, date)| {
                let extra: Vec<f64> = columns.iter().map(|c| c.values[i]).collect();
                let row = model.design_row(*date, &extra);
                let (trend, weekly, yearly, extra_regressors) = model.decompose(&row);
                let yhat = trend + weekly + yearly + extra_regressors;

                let steps_ahead = (*date - model.last_date).num_days().max(0) as f64;
                let growth = (1.0 + steps_ahead / model.n_observations as f64).sqrt();
                let half_width = model.z * model.sigma * model.y_scale * growth;

                ModelOutput {
                    date: *date,
                    yhat,
                    yhat_lower: yhat - half_width,
                    yhat_upper: yhat + half_width,
                    trend,
                    weekly,
                    yearly,
                    extra_regressors,
                }
            })
            .collect();
        Ok(outputs)
    }
}

fn min_gap_days(dates: &[NaiveDate]) -> i64 {
    let mut sorted = dates.to_vec();
    sorted.sort_unstable();
    sorted
        .windows(2)
        .map(|pair| (pair[1] - pair[0]).num_days())
        .min()
        .unwrap_or(i64::MAX)
}

/// Solves `(XᵀX + λI')β = Xᵀy` where `I'` leaves the intercept unpenalised.
fn solve_ridge(design: &DMatrix<f64>, targets: &DVector<f64>) -> Result<DVector<f64>> {
    let p = design.ncols();
    let mut gram = design.transpose() * design;
    let penalty = RIDGE_PENALTY * design.nrows() as f64;
    for j in 1..p {
        gram[(j, j)] += penalty;
    }
    let rhs = design.transpose() * targets;

    let solution = match gram.clone().cholesky() {
        Some(cholesky) => Some(cholesky.solve(&rhs)),
        None => gram.lu().solve(&rhs),
    };
    solution
        .filter(|beta| beta.iter().all(|b| b.is_finite()))
        .ok_or_else(|| ForecastError::Model("design matrix is singular".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::regressor::RegressorColumn;
    use chrono::Days;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn daily(start: &str, n: usize) -> Vec<NaiveDate> {
        let start = date(start);
        (0..n as u64)
            .map(|i| start.checked_add_days(Days::new(i)).unwrap())
            .collect()
    }

    fn future(frame: &TrainingFrame, horizon: usize) -> Vec<NaiveDate> {
        let last = *frame.dates.last().unwrap();
        (1..=horizon as u64)
            .map(|i| last.checked_add_days(Days::new(i)).unwrap())
            .collect()
    }

    #[test]
    fn test_linear_series_extrapolates() {
        let frame = TrainingFrame {
            dates: daily("2024-01-01", 3),
            target: vec![100.0, 110.0, 120.0],
            regressors: vec![],
        };
        let engine = AdditiveRegressor::default();
        let model = engine.fit(&frame).unwrap();
        assert!(!model.has_weekly());

        let outputs = engine
            .predict(
                &model,
                &PredictionFrame {
                    dates: future(&frame, 2),
                    regressors: vec![],
                },
            )
            .unwrap();

        assert!((outputs[0].yhat - 130.0).abs() < 0.01);
        assert!((outputs[1].yhat - 140.0).abs() < 0.01);
        for out in &outputs {
            assert!(out.yhat_lower <= out.yhat && out.yhat <= out.yhat_upper);
        }
    }

    #[test]
    fn test_recovers_weekly_pattern() {
        let pattern = [10.0, 12.0, 14.0, 13.0, 11.0, 20.0, 25.0];
        let n = 56;
        let frame = TrainingFrame {
            dates: daily("2024-01-01", n),
            target: (0..n).map(|i| 100.0 + 0.5 * i as f64 + pattern[i % 7]).collect(),
            regressors: vec![],
        };
        let engine = AdditiveRegressor::default();
        let model = engine.fit(&frame).unwrap();
        assert!(model.has_weekly());
        assert!(!model.has_yearly());

        let dates = future(&frame, 7);
        let outputs = engine
            .predict(
                &model,
                &PredictionFrame {
                    dates,
                    regressors: vec![],
                },
            )
            .unwrap();

        for (h, out) in outputs.iter().enumerate() {
            let i = n + h;
            let expected = 100.0 + 0.5 * i as f64 + pattern[i % 7];
            assert!(
                (out.yhat - expected).abs() < 0.1,
                "day {i}: got {}, expected {expected}",
                out.yhat
            );
            assert!((out.trend + out.weekly - out.yhat).abs() < 1e-9);
        }
    }

    #[test]
    fn test_extra_regressor_contributes_linearly() {
        let x = [1.0, 5.0, 2.0, 8.0, 3.0, 7.0, 4.0, 6.0, 2.0, 9.0];
        let frame = TrainingFrame {
            dates: daily("2024-03-01", x.len()),
            target: x.iter().map(|v| 50.0 + 3.0 * v).collect(),
            regressors: vec![RegressorColumn {
                name: "promo".to_string(),
                values: x.to_vec(),
            }],
        };
        let engine = AdditiveRegressor::default();
        let model = engine.fit(&frame).unwrap();

        let outputs = engine
            .predict(
                &model,
                &PredictionFrame {
                    dates: future(&frame, 2),
                    regressors: vec![RegressorColumn {
                        name: "promo".to_string(),
                        values: vec![9.0, 9.0],
                    }],
                },
            )
            .unwrap();

        assert!((outputs[0].yhat - 77.0).abs() < 0.1);
        assert!(outputs[0].extra_regressors.abs() > 1.0);
    }

    #[test]
    fn test_interval_widens_with_horizon() {
        let noise = [0.0, 3.0, -2.0, 1.0, -4.0, 2.0, 0.5, -1.0, 2.5, -3.0];
        let frame = TrainingFrame {
            dates: daily("2024-01-01", noise.len()),
            target: noise.iter().enumerate().map(|(i, e)| 20.0 + i as f64 + e).collect(),
            regressors: vec![],
        };
        let engine = AdditiveRegressor::new(0.95).unwrap();
        let model = engine.fit(&frame).unwrap();
        assert!(model.sigma() > 0.0);

        let outputs = engine
            .predict(
                &model,
                &PredictionFrame {
                    dates: future(&frame, 30),
                    regressors: vec![],
                },
            )
            .unwrap();
        let width = |o: &ModelOutput| o.yhat_upper - o.yhat_lower;
        assert!(width(&outputs[29]) > width(&outputs[0]));
        assert!(outputs.iter().all(|o| o.yhat_lower < o.yhat && o.yhat < o.yhat_upper));
    }

    #[test]
    fn test_missing_regressor_in_prediction_frame() {
        let frame = TrainingFrame {
            dates: daily("2024-01-01", 3),
            target: vec![1.0, 2.0, 3.0],
            regressors: vec![RegressorColumn {
                name: "stock_on_hand".to_string(),
                values: vec![1.0, 2.0, 1.0],
            }],
        };
        let engine = AdditiveRegressor::default();
        let model = engine.fit(&frame).unwrap();
        let err = engine
            .predict(
                &model,
                &PredictionFrame {
                    dates: future(&frame, 1),
                    regressors: vec![],
                },
            )
            .unwrap_err();
        assert!(matches!(err, ForecastError::Schema(_)));
    }

    #[test]
    fn test_constant_series() {
        let frame = TrainingFrame {
            dates: daily("2024-01-01", 5),
            target: vec![0.0; 5],
            regressors: vec![],
        };
        let engine = AdditiveRegressor::default();
        let model = engine.fit(&frame).unwrap();
        let outputs = engine
            .predict(
                &model,
                &PredictionFrame {
                    dates: future(&frame, 1),
                    regressors: vec![],
                },
            )
            .unwrap();
        assert!(outputs[0].yhat.abs() < 1e-9);
        assert_eq!(outputs[0].yhat_lower, outputs[0].yhat_upper);
    }

    #[test]
    fn test_interval_width_bounds() {
        assert!(AdditiveRegressor::new(0.0).is_err());
        assert!(AdditiveRegressor::new(1.0).is_err());
        assert_eq!(AdditiveRegressor::new(0.9).unwrap().interval_width(), 0.9);
    }

    #[test]
    fn test_interval_quantile_matches_width() {
        let frame = TrainingFrame {
            dates: daily("2024-01-01", 3),
            target: vec![1.0, 2.0, 4.0],
            regressors: vec![],
        };
        let z = |width: f64| AdditiveRegressor::new(width).unwrap().fit(&frame).unwrap().z;
        assert!((z(0.80) - 1.2816).abs() < 1e-3);
        assert!((z(0.95) - 1.96).abs() < 1e-3);
    }

    #[test]
    fn test_sparse_rows_skip_weekly_seasonality() {
        let frame = TrainingFrame {
            dates: vec![date("2024-01-01"), date("2024-01-20")],
            target: vec![100.0, 120.0],
            regressors: vec![],
        };
        let engine = AdditiveRegressor::default();
        let model = engine.fit(&frame).unwrap();
        assert!(!model.has_weekly());
        assert!(!model.has_yearly());

        let outputs = engine
            .predict(
                &model,
                &PredictionFrame {
                    dates: future(&frame, 7),
                    regressors: vec![],
                },
            )
            .unwrap();
        for pair in outputs.windows(2) {
            assert_eq!(pair[0].weekly, 0.0);
            assert!(pair[1].yhat > pair[0].yhat, "trend-only forecast must rise");
        }
    }

    #[test]
    fn test_weekly_spacing_skips_weekly_seasonality() {
        let start = date("2024-01-01");
        let frame = TrainingFrame {
            dates: (0..20u64)
                .map(|i| start.checked_add_days(Days::new(7 * i)).unwrap())
                .collect(),
            target: (0..20).map(|i| 50.0 + i as f64).collect(),
            regressors: vec![],
        };
        let model = AdditiveRegressor::default().fit(&frame).unwrap();
        assert!(!model.has_weekly());
    }

    #[test]
    fn test_yearly_seasonality_needs_enough_rows() {
        let start = date("2022-01-01");
        let weekly_rows = |count: u64| TrainingFrame {
            dates: (0..count)
                .map(|i| start.checked_add_days(Days::new(7 * i)).unwrap())
                .collect(),
            target: (0..count).map(|i| 10.0 + (i % 52) as f64).collect(),
            regressors: vec![],
        };
        let monthly_rows = TrainingFrame {
            dates: (0..37u64)
                .map(|i| start.checked_add_days(Days::new(30 * i)).unwrap())
                .collect(),
            target: (0..37).map(|i| 10.0 + (i % 12) as f64).collect(),
            regressors: vec![],
        };

        let engine = AdditiveRegressor::default();
        let dense = engine.fit(&weekly_rows(110)).unwrap();
        assert!(dense.has_yearly());
        assert!(!dense.has_weekly());

        let sparse = engine.fit(&monthly_rows).unwrap();
        assert!(!sparse.has_yearly());
    }
}
