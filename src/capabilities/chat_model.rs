//! ChatModel capability: the one LLM-calling seam every component in C2-C9
//! depends on. Concrete `HttpChatModel` talks to an OpenAI-compatible chat
//! completions endpoint; `FakeChatModel` replays scripted responses for
//! deterministic tests.

use crate::config::{EngineConfig, ModelTier};
use crate::error::CapabilityError;
use async_trait::async_trait;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Issues a single-turn completion for `prompt` at the given tier and
    /// returns the raw text response. Callers are responsible for any JSON
    /// extraction from the returned text.
    async fn complete(&self, tier: ModelTier, prompt: &str) -> Result<String, CapabilityError>;
}

pub struct HttpChatModel {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    fast_model: String,
    quality_model: String,
    timeout: Duration,
}

impl HttpChatModel {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.chat_model_base_url.clone(),
            api_key: config.chat_model_api_key.clone(),
            fast_model: config.chat_model_fast.clone(),
            quality_model: config.chat_model_quality.clone(),
            timeout: config.api_timeout,
        }
    }

    fn model_for(&self, tier: ModelTier) -> &str {
        match tier {
            ModelTier::Fast => &self.fast_model,
            ModelTier::Quality => &self.quality_model,
        }
    }
}

#[async_trait]
impl ChatModel for HttpChatModel {
    async fn complete(&self, tier: ModelTier, prompt: &str) -> Result<String, CapabilityError> {
        let model = self.model_for(tier);
        let body = json!({
            "model": model,
            "messages": [{"role": "user", "content": prompt}],
        });

        let mut req = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .json(&body)
            .timeout(self.timeout);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        let resp = tokio::time::timeout(self.timeout, req.send())
            .await
            .map_err(|_| CapabilityError::ProviderTimeout)?
            .map_err(|e| CapabilityError::ProviderError(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            warn!("chat_model: upstream returned HTTP {}", status);
            return Err(CapabilityError::ProviderError(format!("HTTP {status}")));
        }

        let parsed: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| CapabilityError::ProviderError(e.to_string()))?;

        let text = parsed["choices"][0]["message"]["content"]
            .as_str()
            .unwrap_or_default()
            .to_string();

        debug!("chat_model: {} returned {} chars", model, text.len());
        Ok(text)
    }
}

/// Replays a fixed sequence of canned responses, cycling if exhausted.
/// Useful for deterministic multi-turn worker/clarifier tests.
pub struct FakeChatModel {
    responses: Vec<String>,
    call_count: AtomicUsize,
}

impl FakeChatModel {
    pub fn new(responses: Vec<String>) -> Self {
        Self {
            responses,
            call_count: AtomicUsize::new(0),
        }
    }

    pub fn single(response: impl Into<String>) -> Arc<Self> {
        Arc::new(Self::new(vec![response.into()]))
    }

    pub fn calls(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChatModel for FakeChatModel {
    async fn complete(&self, _tier: ModelTier, _prompt: &str) -> Result<String, CapabilityError> {
        let idx = self.call_count.fetch_add(1, Ordering::SeqCst);
        if self.responses.is_empty() {
            return Ok(String::new());
        }
        Ok(self.responses[idx % self.responses.len()].clone())
    }
}
