//! REST snapshot client used by book reloads

use std::time::Duration;

use serde_json::Value;
use tracing::info;

use crate::error::{MarketDataError, Result};

const USER_AGENT: &str = concat!("feed-connector/", env!("CARGO_PKG_VERSION"));

/// Fetches order book snapshots over HTTP
#[derive(Debug, Clone)]
pub struct SnapshotClient {
    http: reqwest::Client,
}

impl SnapshotClient {
    pub fn new(request_timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(request_timeout)
            .build()?;

        Ok(Self { http })
    }

    /// GET a snapshot and decode it as JSON
    pub async fn fetch(&self, url: &str) -> Result<Value> {
        info!(url = %url, "Fetching order book snapshot");

        let response = self.http.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(MarketDataError::RestApiError(format!(
                "Snapshot HTTP error {} from {}",
                status, url
            )));
        }

        Ok(response.json::<Value>().await?)
    }
}
