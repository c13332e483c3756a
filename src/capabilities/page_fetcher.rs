//! PageFetcher capability (the "deep fetch" / Jina-style reader). Grounded in
//! `jina.py::jina_read` for the header shape and in `jina.py::truncate_content`
//! for the 70%-head/30%-tail truncation policy, per spec §4.1's 3s hard
//! deadline with zero retries.

use crate::config::EngineConfig;
use crate::error::FetchError;
use async_trait::async_trait;
use std::time::Duration;
use tracing::warn;

#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn read(&self, url: &str, max_chars: usize) -> Result<String, FetchError>;
}

pub struct HttpPageFetcher {
    client: reqwest::Client,
    api_key: Option<String>,
    timeout: Duration,
    skip_domains: Vec<String>,
}

impl HttpPageFetcher {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: config.chat_model_api_key.clone(),
            timeout: config.jina_timeout,
            skip_domains: config.jina_skip_domains.clone(),
        }
    }

    fn is_skipped(&self, url: &str) -> bool {
        self.skip_domains.iter().any(|d| url.contains(d.as_str()))
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn read(&self, url: &str, max_chars: usize) -> Result<String, FetchError> {
        if self.is_skipped(url) {
            return Err(FetchError::Denylisted(url.to_string()));
        }

        let reader_url = format!("https://r.jina.ai/{url}");
        let mut req = self
            .client
            .get(&reader_url)
            .header("X-Engine", "browser")
            .header("X-Retain-Images", "none")
            .header("X-Return-Format", "markdown")
            .timeout(self.timeout);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        // Zero retries: a single attempt bounded by the 3s hard deadline.
        let resp = match tokio::time::timeout(self.timeout, req.send()).await {
            Ok(Ok(resp)) => resp,
            Ok(Err(e)) => return Err(FetchError::Transport(e.to_string())),
            Err(_) => return Err(FetchError::Timeout(self.timeout)),
        };

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            warn!("page_fetcher: {} returned HTTP {}", url, status);
            return Err(FetchError::HttpStatus(status));
        }

        let text = resp
            .text()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        Ok(truncate_content(&text, max_chars))
    }
}

/// 70% of the budget from the head, 30% from the tail, joined by a marker —
/// preserves lead and conclusion over a document's uninformative middle.
pub fn truncate_content(content: &str, max_chars: usize) -> String {
    if content.chars().count() <= max_chars {
        return content.to_string();
    }

    let head_len = (max_chars as f64 * 0.7) as usize;
    let tail_len = max_chars - head_len;

    let chars: Vec<char> = content.chars().collect();
    let head: String = chars[..head_len].iter().collect();
    let tail: String = chars[chars.len() - tail_len..].iter().collect();

    format!("{head}\n\n[... content truncated ...]\n\n{tail}")
}

/// Fixed, URL-independent content for deterministic tests.
pub struct FakePageFetcher {
    content: Result<String, String>,
}

impl FakePageFetcher {
    pub fn ok(content: impl Into<String>) -> Self {
        Self {
            content: Ok(content.into()),
        }
    }

    pub fn failing() -> Self {
        Self {
            content: Err("fake fetch failure".to_string()),
        }
    }
}

#[async_trait]
impl PageFetcher for FakePageFetcher {
    async fn read(&self, _url: &str, max_chars: usize) -> Result<String, FetchError> {
        match &self.content {
            Ok(c) => Ok(truncate_content(c, max_chars)),
            Err(_) => Err(FetchError::Transport("fake fetch failure".to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_leaves_short_content_untouched() {
        assert_eq!(truncate_content("short", 100), "short");
    }

    #[test]
    fn truncate_keeps_head_and_tail() {
        let content = "a".repeat(50) + &"b".repeat(50);
        let truncated = truncate_content(&content, 20);
        assert!(truncated.starts_with("aaaa"));
        assert!(truncated.ends_with("bbbb"));
        assert!(truncated.contains("truncated"));
    }
}
