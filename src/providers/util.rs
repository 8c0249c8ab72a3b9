use crate::core::dataset::FeatureTable;
use crate::core::error::ForecastError;
use anyhow::Result;
use reqwest::Url;
use tracing::{debug, warn};

const USER_AGENT: &str = concat!("salecast/", env!("CARGO_PKG_VERSION"));

pub(crate) fn http_client() -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder().user_agent(USER_AGENT).build()?)
}

/// Joins `base_url` and `endpoint` and appends URL-encoded query pairs.
pub(crate) fn build_url(base_url: &str, endpoint: &str, params: &[(&str, &str)]) -> Result<Url> {
    let url = format!("{}{}", base_url.trim_end_matches('/'), endpoint);
    Ok(Url::parse_with_params(&url, params)?)
}

/// Sends a GET and returns the body of a successful response.
pub(crate) async fn get_text(url: Url, subject: &str) -> Result<String> {
    // Keys travel in the query string; keep them out of the logs.
    debug!("Requesting {}{}", url.origin().ascii_serialization(), url.path());

    let client = http_client()?;
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| anyhow::anyhow!("Request error: {} for {}", e.without_url(), subject))?;

    if !response.status().is_success() {
        anyhow::bail!("HTTP error: {} for {}", response.status(), subject);
    }

    Ok(response.text().await?)
}

/// Collapses a failed fetch into an empty, mergeable table.
pub(crate) fn or_empty(result: Result<FeatureTable>, feature: &str, query: &str) -> FeatureTable {
    match result {
        Ok(table) => {
            debug!(feature, query, points = table.len(), "Fetched feature table");
            table
        }
        Err(e) => {
            let err = ForecastError::ExternalServiceUnavailable(format!("{e:#}"));
            warn!(feature, query, error = %err, "Continuing without external feature");
            FeatureTable::empty(feature)
        }
    }
}
