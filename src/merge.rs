//! Left-joins external feature tables onto the primary series.

use crate::core::dataset::{Dataset, FeatureColumn, FeatureTable};
use crate::core::error::{ForecastError, Result};
use std::collections::HashSet;
use tracing::debug;

/// Joins each table onto `primary` by date, in the order given, then
/// forward-fills every feature column.
///
/// Every primary row is kept. Table names must be distinct from each other
/// and from the primary's own columns.
pub fn merge(mut primary: Dataset, tables: &[FeatureTable]) -> Result<Dataset> {
    let mut names: HashSet<&str> = primary.feature_names().into_iter().collect();
    for table in tables {
        if !names.insert(table.name()) {
            return Err(ForecastError::Schema(format!(
                "feature '{}' is supplied more than once",
                table.name()
            )));
        }
    }

    for table in tables {
        let values: Vec<Option<f64>> = primary
            .dates()
            .iter()
            .map(|date| table.get(*date))
            .collect();
        let matched = values.iter().filter(|v| v.is_some()).count();
        debug!(
            feature = table.name(),
            matched,
            rows = primary.len(),
            "Joined feature table"
        );
        primary.add_feature(FeatureColumn::new(table.name(), values))?;
    }

    forward_fill(&mut primary);
    Ok(primary)
}

/// Replaces each gap with the most recent earlier value in its column.
/// Leading gaps stay empty.
pub fn forward_fill(dataset: &mut Dataset) {
    for column in dataset.features_mut() {
        let mut last = None;
        for value in column.values.iter_mut() {
            if value.is_some() {
                last = *value;
            } else {
                *value = last;
            }
        }
    }
}
