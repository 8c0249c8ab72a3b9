//! Tabular time series types shared across the pipeline.
//!
//! A [`Dataset`] is stored column-wise: one date column, one target column
//! and any number of exogenous feature columns. Rows up to
//! [`Dataset::history_len`] are observed history and always carry a target
//! value; rows after it are the out-of-sample frame appended by
//! [`crate::extend::extend`] and carry none.

use crate::core::error::{ForecastError, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Name of the mandatory date column.
pub const DATE_COLUMN: &str = "ds";
/// Name of the mandatory numeric target column.
pub const TARGET_COLUMN: &str = "y";

/// A single row view over a [`Dataset`].
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeriesRow {
    pub date: NaiveDate,
    pub value: Option<f64>,
    pub extra_features: Vec<(String, Option<f64>)>,
}

/// A named exogenous column; `None` marks a gap.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureColumn {
    pub name: String,
    pub values: Vec<Option<f64>>,
}

impl FeatureColumn {
    pub fn new(name: impl Into<String>, values: Vec<Option<f64>>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }

    pub fn is_all_null(&self) -> bool {
        self.values.iter().all(Option::is_none)
    }

    /// Last non-null value within the first `len` entries.
    pub fn last_known(&self, len: usize) -> Option<f64> {
        self.values.iter().take(len).rev().find_map(|v| *v)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeaturePoint {
    pub date: NaiveDate,
    pub value: f64,
}

/// A daily external feature, sorted ascending and unique by date.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureTable {
    name: String,
    points: Vec<FeaturePoint>,
}

impl FeatureTable {
    /// Builds a table, sorting by date and keeping the first point seen for a
    /// repeated date.
    pub fn new(name: impl Into<String>, mut points: Vec<FeaturePoint>) -> Self {
        points.sort_by_key(|p| p.date);
        points.dedup_by_key(|p| p.date);
        Self {
            name: name.into(),
            points,
        }
    }

    /// "No external data available". Merges as an all-null column.
    pub fn empty(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            points: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn points(&self) -> &[FeaturePoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn get(&self, date: NaiveDate) -> Option<f64> {
        self.points
            .binary_search_by_key(&date, |p| p.date)
            .ok()
            .map(|idx| self.points[idx].value)
    }
}

/// The primary series plus its exogenous columns, keyed by date.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    dates: Vec<NaiveDate>,
    values: Vec<Option<f64>>,
    features: Vec<FeatureColumn>,
    history_len: usize,
}

impl Dataset {
    /// Creates a dataset of observed history.
    ///
    /// Rows are reordered ascending by date. Fails with
    /// [`ForecastError::Validation`] on duplicate dates and with
    /// [`ForecastError::Schema`] on bad feature columns.
    pub fn new(
        dates: Vec<NaiveDate>,
        values: Vec<f64>,
        features: Vec<FeatureColumn>,
    ) -> Result<Self> {
        if dates.len() != values.len() {
            return Err(ForecastError::Schema(format!(
                "'{DATE_COLUMN}' has {} rows but '{TARGET_COLUMN}' has {}",
                dates.len(),
                values.len()
            )));
        }

        let mut seen = HashSet::new();
        for column in &features {
            if column.name == DATE_COLUMN || column.name == TARGET_COLUMN {
                return Err(ForecastError::Schema(format!(
                    "feature column cannot be named '{}'",
                    column.name
                )));
            }
            if !seen.insert(column.name.as_str()) {
                return Err(ForecastError::Schema(format!(
                    "duplicate feature column '{}'",
                    column.name
                )));
            }
            if column.values.len() != dates.len() {
                return Err(ForecastError::Schema(format!(
                    "feature column '{}' has {} rows, expected {}",
                    column.name,
                    column.values.len(),
                    dates.len()
                )));
            }
        }

        let mut order: Vec<usize> = (0..dates.len()).collect();
        order.sort_by_key(|&i| dates[i]);
        if let Some(pair) = order.windows(2).find(|w| dates[w[0]] == dates[w[1]]) {
            return Err(ForecastError::Validation(format!(
                "duplicate date {} in '{DATE_COLUMN}'",
                dates[pair[0]]
            )));
        }

        let history_len = dates.len();
        Ok(Self {
            dates: order.iter().map(|&i| dates[i]).collect(),
            values: order.iter().map(|&i| Some(values[i])).collect(),
            features: features
                .into_iter()
                .map(|column| FeatureColumn {
                    values: order.iter().map(|&i| column.values[i]).collect(),
                    name: column.name,
                })
                .collect(),
            history_len,
        })
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    /// Number of observed rows; the remainder is the future frame.
    pub fn history_len(&self) -> usize {
        self.history_len
    }

    pub fn future_len(&self) -> usize {
        self.dates.len() - self.history_len
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn values(&self) -> &[Option<f64>] {
        &self.values
    }

    /// Target values of the history rows.
    pub fn history_values(&self) -> Vec<f64> {
        self.values[..self.history_len]
            .iter()
            .map(|v| v.unwrap_or(f64::NAN))
            .collect()
    }

    pub fn last_history_date(&self) -> Option<NaiveDate> {
        self.history_len
            .checked_sub(1)
            .map(|idx| self.dates[idx])
    }

    pub fn features(&self) -> &[FeatureColumn] {
        &self.features
    }

    pub fn feature(&self, name: &str) -> Option<&FeatureColumn> {
        self.features.iter().find(|c| c.name == name)
    }

    pub fn feature_names(&self) -> Vec<&str> {
        self.features.iter().map(|c| c.name.as_str()).collect()
    }

    /// Full header in column order: `ds`, `y`, then features.
    pub fn column_names(&self) -> Vec<&str> {
        let mut names = vec![DATE_COLUMN, TARGET_COLUMN];
        names.extend(self.feature_names());
        names
    }

    pub fn row(&self, idx: usize) -> Option<TimeSeriesRow> {
        let date = *self.dates.get(idx)?;
        Some(TimeSeriesRow {
            date,
            value: self.values[idx],
            extra_features: self
                .features
                .iter()
                .map(|c| (c.name.clone(), c.values[idx]))
                .collect(),
        })
    }

    pub fn rows(&self) -> impl Iterator<Item = TimeSeriesRow> + '_ {
        (0..self.len()).filter_map(|idx| self.row(idx))
    }

    /// Appends a feature column. The name must be new.
    pub(crate) fn add_feature(&mut self, column: FeatureColumn) -> Result<()> {
        if column.name == DATE_COLUMN
            || column.name == TARGET_COLUMN
            || self.feature(&column.name).is_some()
        {
            return Err(ForecastError::Schema(format!(
                "feature name collision on '{}'",
                column.name
            )));
        }
        if column.values.len() != self.len() {
            return Err(ForecastError::Schema(format!(
                "feature column '{}' has {} rows, expected {}",
                column.name,
                column.values.len(),
                self.len()
            )));
        }
        self.features.push(column);
        Ok(())
    }

    pub(crate) fn features_mut(&mut self) -> &mut [FeatureColumn] {
        &mut self.features
    }

    /// Appends future rows with no target; each feature gets `fill(column)`.
    pub(crate) fn append_future(
        &mut self,
        dates: &[NaiveDate],
        fill: impl Fn(&FeatureColumn) -> Option<f64>,
    ) {
        self.dates.extend_from_slice(dates);
        self.values.extend(dates.iter().map(|_| None));
        for column in &mut self.features {
            let value = fill(column);
            column.values.extend(dates.iter().map(|_| value));
        }
    }

    /// Removes feature columns that hold no value at all, returning their
    /// names in original order.
    pub fn drop_empty_features(&mut self) -> Vec<String> {
        let (empty, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.features)
            .into_iter()
            .partition(FeatureColumn::is_all_null);
        self.features = kept;
        empty.into_iter().map(|c| c.name).collect()
    }
}
