use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::{
    config::WorkflowConfig,
    error::{Result, WorkflowError},
    models::{AnalysisResult, HistoryEntry, QueryRequest, Stats},
};

/// Outbound calls to the external analysis service
#[async_trait]
pub trait AnalysisService: Send + Sync {
    /// Submit one question for analysis
    async fn submit_query(&self, request: &QueryRequest) -> Result<AnalysisResult>;

    /// Most recent analyses, newest first
    async fn fetch_history(&self, limit: usize) -> Result<Vec<HistoryEntry>>;

    /// Aggregate counters across all analyses
    async fn fetch_stats(&self) -> Result<Stats>;
}

/// JSON-over-HTTP implementation of [`AnalysisService`].
pub struct HttpAnalysisService {
    client: Client,
    base_url: String,
}

impl HttpAnalysisService {
    /// `config.api_base` should be like `http://localhost:8001/api`; a trailing slash is ignored.
    pub fn new(config: &WorkflowConfig) -> Result<Self> {
        let client = Client::builder().timeout(config.request_timeout).build()?;
        Ok(Self {
            client,
            base_url: config.api_base.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(WorkflowError::Service {
            status: status.as_u16(),
            body,
        });
    }

    // Decode through serde_json so malformed bodies surface as serialization errors
    let bytes = response.bytes().await?;
    Ok(serde_json::from_slice(&bytes)?)
}

#[async_trait]
impl AnalysisService for HttpAnalysisService {
    async fn submit_query(&self, request: &QueryRequest) -> Result<AnalysisResult> {
        let url = self.url("query");
        info!(url = %url, user_id = %request.user_id, "Submitting query for analysis");

        let response = self.client.post(&url).json(request).send().await?;
        let result: AnalysisResult = decode(response).await?;

        info!(
            result_id = %result.id,
            risk = %result.risk_label(),
            citations = result.citations.len(),
            "Analysis received"
        );
        Ok(result)
    }

    async fn fetch_history(&self, limit: usize) -> Result<Vec<HistoryEntry>> {
        let url = self.url("history");
        debug!(url = %url, limit, "Fetching history");

        let response = self
            .client
            .get(&url)
            .query(&[("limit", limit)])
            .send()
            .await?;
        let history: Vec<HistoryEntry> = decode(response).await?;

        debug!(count = history.len(), "History fetched");
        Ok(history)
    }

    async fn fetch_stats(&self) -> Result<Stats> {
        let url = self.url("stats");
        debug!(url = %url, "Fetching stats");

        let response = self.client.get(&url).send().await?;
        decode(response).await
    }
}
