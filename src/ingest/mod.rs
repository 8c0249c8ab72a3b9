//! Turns an uploaded delimited text stream into a [`Dataset`].
//!
//! The upload must carry a `ds` column (calendar dates, `YYYY-MM-DD`) and a
//! numeric `y` column. Every other column is kept, in header order, as an
//! exogenous regressor; blank cells in those columns become gaps.

pub mod sniff;

use crate::core::dataset::{DATE_COLUMN, Dataset, FeatureColumn, TARGET_COLUMN};
use crate::core::error::{ForecastError, Result};
use chrono::NaiveDate;
use std::collections::HashSet;
use std::io::Read;
use tracing::debug;

pub use sniff::{SNIFF_SAMPLE_BYTES, sniff_delimiter};

pub const DATE_FORMAT: &str = "%Y-%m-%d";

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// A parsed upload together with the separator it was read with.
#[derive(Debug, Clone, PartialEq)]
pub struct Ingested {
    pub dataset: Dataset,
    pub delimiter: u8,
}

/// Reads the whole stream and ingests it. See [`ingest_bytes`].
pub fn ingest<R: Read>(mut reader: R, default_delimiter: u8) -> Result<Ingested> {
    let mut buf = Vec::new();
    reader
        .read_to_end(&mut buf)
        .map_err(|e| ForecastError::MalformedInput(format!("failed to read input: {e}")))?;
    ingest_bytes(&buf, default_delimiter)
}

/// Parses `input` into a dataset.
///
/// The separator is sniffed from the first [`SNIFF_SAMPLE_BYTES`] bytes and
/// falls back to `default_delimiter` when sniffing is inconclusive.
pub fn ingest_bytes(input: &[u8], default_delimiter: u8) -> Result<Ingested> {
    let input = input.strip_prefix(UTF8_BOM).unwrap_or(input);
    let text = std::str::from_utf8(input).map_err(|e| {
        ForecastError::MalformedInput(format!("input is not valid UTF-8 text: {e}"))
    })?;

    let sample = &input[..input.len().min(SNIFF_SAMPLE_BYTES)];
    let delimiter = match sniff_delimiter(sample) {
        Some(delimiter) => delimiter,
        None => {
            debug!(
                "Delimiter sniffing inconclusive, falling back to {:?}",
                default_delimiter as char
            );
            default_delimiter
        }
    };
    debug!("Reading input with delimiter {:?}", delimiter as char);

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    let (date_idx, target_idx) = locate_required_columns(&headers)?;
    let extra: Vec<(usize, &str)> = headers
        .iter()
        .enumerate()
        .filter(|(idx, _)| *idx != date_idx && *idx != target_idx)
        .map(|(idx, name)| (idx, name.as_str()))
        .collect();

    let mut dates = Vec::new();
    let mut values = Vec::new();
    let mut feature_values: Vec<Vec<Option<f64>>> = vec![Vec::new(); extra.len()];

    for (row_idx, record) in reader.records().enumerate() {
        let record = record?;
        let row = row_idx + 1;

        let raw_date = record.get(date_idx).unwrap_or_default();
        let date = NaiveDate::parse_from_str(raw_date, DATE_FORMAT).map_err(|_| {
            ForecastError::Schema(format!(
                "row {row}: cannot parse '{raw_date}' in '{DATE_COLUMN}' as a YYYY-MM-DD date"
            ))
        })?;
        dates.push(date);

        let raw_value = record.get(target_idx).unwrap_or_default();
        let value = parse_number(raw_value).ok_or_else(|| {
            ForecastError::Schema(format!(
                "row {row}: cannot parse '{raw_value}' in '{TARGET_COLUMN}' as a number"
            ))
        })?;
        values.push(value);

        for ((col_idx, name), column) in extra.iter().zip(feature_values.iter_mut()) {
            let raw = record.get(*col_idx).unwrap_or_default();
            if raw.is_empty() {
                column.push(None);
                continue;
            }
            let value = parse_number(raw).ok_or_else(|| {
                ForecastError::Schema(format!(
                    "row {row}: cannot parse '{raw}' in '{name}' as a number"
                ))
            })?;
            column.push(Some(value));
        }
    }

    let features = extra
        .iter()
        .zip(feature_values)
        .map(|((_, name), values)| FeatureColumn::new(*name, values))
        .collect();
    let dataset = Dataset::new(dates, values, features)?;
    debug!(
        rows = dataset.len(),
        columns = ?dataset.column_names(),
        "Ingested dataset"
    );

    Ok(Ingested { dataset, delimiter })
}

fn locate_required_columns(headers: &[String]) -> Result<(usize, usize)> {
    let mut seen = HashSet::new();
    if let Some(dup) = headers.iter().find(|h| !seen.insert(h.as_str())) {
        return Err(ForecastError::Schema(format!("duplicate column '{dup}'")));
    }

    let position = |name: &str| headers.iter().position(|h| h == name);
    match (position(DATE_COLUMN), position(TARGET_COLUMN)) {
        (Some(date_idx), Some(target_idx)) => Ok((date_idx, target_idx)),
        (date_idx, target_idx) => {
            let missing: Vec<&str> = [(DATE_COLUMN, date_idx), (TARGET_COLUMN, target_idx)]
                .into_iter()
                .filter(|(_, idx)| idx.is_none())
                .map(|(name, _)| name)
                .collect();
            Err(ForecastError::Schema(format!(
                "missing required column(s): {}",
                missing.join(", ")
            )))
        }
    }
}

fn parse_number(raw: &str) -> Option<f64> {
    raw.parse::<f64>().ok().filter(|v| v.is_finite())
}
