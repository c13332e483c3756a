//! WebSearch capability. Grounded in `serperapi.py`'s "extract from
//! structured JSON fields, never from formatted presentation text" rule
//! (the `organic_results[i].link` pattern) and the teacher's shared
//! connection-pool convention from `http_pool.py`.

use crate::config::EngineConfig;
use crate::error::CapabilityError;
use crate::types::{SearchHit, SearchResponse};
use async_trait::async_trait;
use std::time::Duration;
use tracing::warn;

#[async_trait]
pub trait WebSearch: Send + Sync {
    async fn query(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>, CapabilityError>;
}

pub struct HttpWebSearch {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl HttpWebSearch {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: "https://google.serper.dev/search".to_string(),
            api_key: config.chat_model_api_key.clone(),
            timeout: config.api_timeout,
        }
    }
}

#[async_trait]
impl WebSearch for HttpWebSearch {
    async fn query(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>, CapabilityError> {
        let mut req = self
            .client
            .post(&self.base_url)
            .json(&serde_json::json!({ "q": query, "num": max_results }))
            .timeout(self.timeout);
        if let Some(key) = &self.api_key {
            req = req.header("X-API-KEY", key);
        }

        let resp = tokio::time::timeout(self.timeout, req.send())
            .await
            .map_err(|_| CapabilityError::ProviderTimeout)?
            .map_err(|e| CapabilityError::ProviderError(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            warn!("web_search: upstream returned HTTP {}", status);
            return Err(CapabilityError::ProviderError(format!("HTTP {status}")));
        }

        let parsed: SearchResponse = resp
            .json()
            .await
            .map_err(|e| CapabilityError::ProviderError(e.to_string()))?;

        Ok(parsed.organic.into_iter().take(max_results).collect())
    }
}

/// Returns a fixed, query-independent result set for deterministic tests.
pub struct FakeWebSearch {
    hits: Vec<SearchHit>,
}

impl FakeWebSearch {
    pub fn new(hits: Vec<SearchHit>) -> Self {
        Self { hits }
    }

    pub fn empty() -> Self {
        Self { hits: Vec::new() }
    }
}

#[async_trait]
impl WebSearch for FakeWebSearch {
    async fn query(&self, _query: &str, max_results: usize) -> Result<Vec<SearchHit>, CapabilityError> {
        Ok(self.hits.iter().take(max_results).cloned().collect())
    }
}
