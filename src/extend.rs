//! Builds the out-of-sample frame the model predicts over.

use crate::core::config::{MAX_HORIZON_DAYS, MIN_HORIZON_DAYS};
use crate::core::dataset::Dataset;
use crate::core::error::{ForecastError, Result};
use chrono::{Days, NaiveDate};
use tracing::debug;

/// Fewest history rows a model is fit on.
pub const MIN_HISTORY_ROWS: usize = 2;

/// Appends `horizon_days` consecutive dates after the last observed date.
///
/// History rows are kept; each feature column carries its last observed
/// value into the new rows without extrapolation.
pub fn extend(mut dataset: Dataset, horizon_days: u32) -> Result<Dataset> {
    validate_horizon(horizon_days)?;
    if dataset.future_len() > 0 {
        return Err(ForecastError::State(
            "dataset already has a future frame".to_string(),
        ));
    }
    if dataset.history_len() < MIN_HISTORY_ROWS {
        return Err(ForecastError::Validation(format!(
            "at least {MIN_HISTORY_ROWS} historical rows are required, got {}",
            dataset.history_len()
        )));
    }

    let last = dataset.last_history_date().ok_or_else(|| {
        ForecastError::Validation("dataset has no historical rows".to_string())
    })?;
    let dates = future_dates(last, horizon_days)?;
    debug!(
        from = %dates[0],
        to = %dates[dates.len() - 1],
        "Extending dataset"
    );

    let history_len = dataset.history_len();
    dataset.append_future(&dates, |column| column.last_known(history_len));
    Ok(dataset)
}

pub fn validate_horizon(horizon_days: u32) -> Result<()> {
    if (MIN_HORIZON_DAYS..=MAX_HORIZON_DAYS).contains(&horizon_days) {
        Ok(())
    } else {
        Err(ForecastError::Validation(format!(
            "horizon must be within [{MIN_HORIZON_DAYS}, {MAX_HORIZON_DAYS}] days, got {horizon_days}"
        )))
    }
}

fn future_dates(last: NaiveDate, horizon_days: u32) -> Result<Vec<NaiveDate>> {
    (1..=u64::from(horizon_days))
        .map(|offset| {
            last.checked_add_days(Days::new(offset)).ok_or_else(|| {
                ForecastError::Validation(format!("date overflow extending past {last}"))
            })
        })
        .collect()
}
