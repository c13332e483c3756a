//! Research worker (C4): the tool-using agent loop.
//!
//! Grounded in `original_source/src/clarifyagent/agents/subagent.py`'s
//! `truncate_tool_output`/`MAX_TOOL_OUTPUT` convention (the only part of
//! that file that survived truncation in the retrieved sources) and in
//! `executor.py::allocate_resources` for the turn-budget widening rule
//! (§1B). The three nested deadlines and the `should_stop`/"HARD LIMIT 3
//! searches" quirks are carried exactly as specified in §4.4/§9.

use crate::capabilities::{ChatModel, PageFetcher, WebSearch};
use crate::confidence::{self, rule_score};
use crate::config::{EngineConfig, ModelTier};
use crate::scenario::{self, Scenario};
use crate::types::{Source, SourceType, Subtask, SubtaskResult};
use crate::url_validate;
use futures::stream::{self, StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

const TOOL_TIMEOUT: Duration = Duration::from_secs(20);
const MAX_TOOL_OUTPUT: usize = 2000;

/// An agent turn's parsed reply: either a tool invocation or a final answer.
#[derive(Deserialize)]
#[serde(untagged)]
enum AgentTurn {
    Tool {
        tool: ToolCall,
    },
    Final {
        findings: Vec<String>,
        #[serde(default)]
        sources: Vec<Source>,
        confidence: f64,
        #[serde(default)]
        should_stop: bool,
    },
}

#[derive(Deserialize)]
struct ToolCall {
    query: String,
    #[serde(default = "default_max_results")]
    max_results: usize,
}

fn default_max_results() -> usize {
    10
}

pub struct Worker {
    chat: Arc<dyn ChatModel>,
    search: Arc<dyn WebSearch>,
    fetcher: Arc<dyn PageFetcher>,
    config: EngineConfig,
}

impl Worker {
    pub fn new(
        chat: Arc<dyn ChatModel>,
        search: Arc<dyn WebSearch>,
        fetcher: Arc<dyn PageFetcher>,
        config: EngineConfig,
    ) -> Self {
        Self {
            chat,
            search,
            fetcher,
            config,
        }
    }

    /// Runs one subtask through the agent loop to completion or a placeholder.
    /// Never returns an error to its caller — every path is a well-formed
    /// `SubtaskResult` per §4.4's failure semantics.
    pub async fn run(&self, subtask: &Subtask, max_turns: u32) -> SubtaskResult {
        let hard = self.config.agent_execution_timeout;
        let soft = self.config.soft_exit_timeout;

        match tokio::time::timeout(hard, self.run_with_soft_exit(subtask, max_turns, soft)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(subtask_id = subtask.id, "worker hard timeout");
                SubtaskResult::placeholder(subtask.id, &subtask.focus, 0.3, "hard timeout")
            }
        }
    }

    async fn run_with_soft_exit(&self, subtask: &Subtask, max_turns: u32, soft: Duration) -> SubtaskResult {
        match tokio::time::timeout(soft, self.agent_loop(subtask, max_turns)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(subtask_id = subtask.id, "worker soft-exit deadline exceeded");
                SubtaskResult::placeholder(subtask.id, &subtask.focus, 0.5, "soft exit")
            }
        }
    }

    async fn agent_loop(&self, subtask: &Subtask, max_turns: u32) -> SubtaskResult {
        let mut transcript = build_initial_prompt(subtask);
        let mut last_tool_result: Option<SubtaskResult> = None;

        for turn in 0..max_turns {
            let reply = match self.chat.complete(ModelTier::Fast, &transcript).await {
                Ok(r) => r,
                Err(e) => {
                    warn!(subtask_id = subtask.id, "chat model error: {}", e);
                    return last_tool_result.unwrap_or_else(|| {
                        SubtaskResult::placeholder(subtask.id, &subtask.focus, 0.3, "provider error")
                    });
                }
            };

            let parsed: AgentTurn = match serde_json::from_str(&reply) {
                Ok(p) => p,
                Err(_) => {
                    debug!(subtask_id = subtask.id, turn, "agent reply not parseable, treating as final");
                    return last_tool_result.unwrap_or_else(|| {
                        SubtaskResult::placeholder(subtask.id, &subtask.focus, 0.4, "unparseable final reply")
                    });
                }
            };

            match parsed {
                AgentTurn::Final {
                    findings,
                    sources,
                    confidence,
                    should_stop: _,
                } => {
                    return self.finalize(subtask, findings, sources, confidence);
                }
                AgentTurn::Tool { tool } => {
                    let outcome = self.execute_tool(subtask, &tool.query, tool.max_results).await;
                    let truncated = truncate_tool_output(&outcome.summary_text);
                    transcript.push_str("\n\nTOOL RESULT:\n");
                    transcript.push_str(&truncated);

                    if outcome.should_stop {
                        return self.finalize(subtask, outcome.findings, outcome.sources, outcome.confidence);
                    }
                    last_tool_result = Some(SubtaskResult {
                        subtask_id: subtask.id,
                        focus: subtask.focus.clone(),
                        findings: outcome.findings,
                        sources: outcome.sources,
                        confidence: outcome.confidence,
                    });
                }
            }
        }

        warn!(subtask_id = subtask.id, "worker exhausted max_turns without finalizing");
        last_tool_result.unwrap_or_else(|| SubtaskResult::placeholder(subtask.id, &subtask.focus, 0.5, "max turns exhausted"))
    }

    fn finalize(&self, subtask: &Subtask, findings: Vec<String>, sources: Vec<Source>, confidence: f64) -> SubtaskResult {
        let mut valid_sources = Vec::new();
        let mut dropped = 0usize;
        for mut src in sources {
            match url_validate::validate_url(&src.url) {
                Ok(_) => {
                    src.url = url_validate::clean_url(&src.url);
                    valid_sources.push(src);
                }
                Err(_) => dropped += 1,
            }
        }
        if dropped > 0 {
            warn!(subtask_id = subtask.id, dropped, "discarded invalid source URLs");
        }

        let capped_findings: Vec<String> = findings
            .into_iter()
            .take(5)
            .map(|f| truncate_chars(&f, 300))
            .collect();

        SubtaskResult {
            subtask_id: subtask.id,
            focus: subtask.focus.clone(),
            findings: capped_findings,
            sources: valid_sources,
            confidence: confidence.clamp(0.0, 1.0),
        }
    }

    /// Runs one `enhanced_research` tool invocation under its own hard
    /// deadline. On timeout, returns the synthetic placeholder dictated by
    /// §4.4 step 3 — this path never propagates to the caller.
    async fn execute_tool(&self, subtask: &Subtask, query: &str, max_results: usize) -> ToolOutcome {
        match tokio::time::timeout(TOOL_TIMEOUT, self.search_and_fetch(query, max_results)).await {
            Ok(outcome) => outcome,
            Err(_) => {
                warn!(subtask_id = subtask.id, "tool call exceeded 20s deadline");
                ToolOutcome {
                    findings: vec!["timeout".to_string()],
                    sources: Vec::new(),
                    confidence: 0.3,
                    should_stop: true,
                    summary_text: "{\"findings\":[\"timeout\"],\"sources\":[],\"confidence\":0.3,\"should_stop\":true}".to_string(),
                }
            }
        }
    }

    async fn search_and_fetch(&self, query: &str, max_results: usize) -> ToolOutcome {
        let max_results = max_results.clamp(5, 25);
        let hits = match self.search.query(query, max_results).await {
            Ok(h) => h,
            Err(e) => {
                warn!("web search failed: {}", e);
                Vec::new()
            }
        };

        let scenario = scenario::classify(query);
        let targets = scenario::plan_deep_fetch(scenario, &hits, max_results);

        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_requests.min(targets.len().max(1))));
        let fetcher = &self.fetcher;
        let max_content_chars = self.config.max_content_chars;

        let deep_results: Vec<(String, Option<String>)> = stream::iter(targets.iter().cloned())
            .map(|t| {
                let sem = semaphore.clone();
                let url = t.hit.link.clone();
                async move {
                    let _permit = sem.acquire().await.ok();
                    let content = fetcher.read(&url, max_content_chars).await.ok();
                    (url, content)
                }
            })
            .buffer_unordered(self.config.max_concurrent_requests.max(1))
            .collect()
            .await;

        let deep_fetch_success = deep_results.iter().filter(|(_, c)| c.is_some()).count();
        let jina_failed = !targets.is_empty() && deep_fetch_success == 0;
        if jina_failed {
            debug!("deep-fetch yielded zero successes for query: {}", query);
        }

        let mut sources: Vec<Source> = Vec::new();
        let mut seen = std::collections::HashSet::new();
        let mut dropped = 0usize;

        for (url, content) in &deep_results {
            if content.is_none() {
                continue;
            }
            let Some(clean) = validate_and_clean(url) else {
                dropped += 1;
                continue;
            };
            if seen.insert(clean.clone()) {
                sources.push(Source {
                    title: query.to_string(),
                    url: clean,
                    snippet: content.clone(),
                    source_type: Some(SourceType::DetailedContent),
                });
            }
        }
        for hit in &hits {
            let Some(clean) = validate_and_clean(&hit.link) else {
                dropped += 1;
                continue;
            };
            if seen.insert(clean.clone()) {
                sources.push(Source {
                    title: hit.title.clone(),
                    url: clean,
                    snippet: Some(hit.snippet.clone()),
                    source_type: Some(SourceType::SearchResult),
                });
            }
        }
        if dropped > 0 {
            debug!(dropped, "discarded invalid source URLs at search/fetch ingress");
        }

        let findings: Vec<String> = deep_results
            .iter()
            .filter_map(|(_, c)| c.clone())
            .chain(hits.iter().map(|h| h.snippet.clone()))
            .filter(|s| !s.is_empty())
            .take(10)
            .collect();

        let rule = rule_score(scenario, sources.len(), deep_fetch_success);
        let model_conf = if self.config.enable_llm_confidence {
            let prompt = format!(
                "Rate the following findings on relevance, quality, completeness, consistency, and overall_confidence in [0,1] as JSON: {:?}",
                findings
            );
            confidence::model_score(self.chat.as_ref(), &prompt).await
        } else {
            None
        };
        let confidence = confidence::combine(rule, model_conf, self.config.llm_confidence_weight);

        let summary_text = serde_json::json!({
            "findings": findings,
            "source_count": sources.len(),
            "confidence": confidence,
            "jina_failed": jina_failed,
            "should_stop": confidence >= 0.7,
        })
        .to_string();

        ToolOutcome {
            findings,
            sources,
            confidence,
            should_stop: confidence >= 0.7,
            summary_text,
        }
    }
}

struct ToolOutcome {
    findings: Vec<String>,
    sources: Vec<Source>,
    confidence: f64,
    should_stop: bool,
    summary_text: String,
}

/// Validates and cleans a raw provider URL, returning `None` if it fails
/// validation. Applied at search/fetch ingress so every `Source` this worker
/// produces — including the max-turns-exhausted fallback, which never passes
/// through `finalize` — carries a valid URL.
fn validate_and_clean(raw: &str) -> Option<String> {
    url_validate::validate_url(raw).ok()?;
    Some(url_validate::clean_url(raw))
}

fn build_initial_prompt(subtask: &Subtask) -> String {
    format!(
        "You are a research worker. Focus: {}\nSuggested queries: {}\n\
         HARD LIMIT 3 searches. Call the enhanced_research tool with (query, max_results) \
         or emit a final JSON object {{findings, sources, confidence, should_stop}}.",
        subtask.focus,
        subtask.queries.join(", ")
    )
}

fn truncate_tool_output(text: &str) -> String {
    truncate_chars(text, MAX_TOOL_OUTPUT)
}

fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        text.chars().take(max).collect::<String>() + "…"
    }
}

#[allow(dead_code)]
fn elapsed_ms(start: Instant) -> u128 {
    start.elapsed().as_millis()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::{FakeChatModel, FakePageFetcher, FakeWebSearch};
    use crate::types::SearchHit;

    fn subtask() -> Subtask {
        Subtask {
            id: 1,
            focus: "renewable energy costs".to_string(),
            queries: vec!["renewable energy cost trends".to_string()],
            parallel: true,
        }
    }

    #[tokio::test]
    async fn worker_finalizes_on_well_formed_final_reply() {
        let reply = serde_json::json!({
            "findings": ["solar costs dropped 80% since 2010"],
            "sources": [{"title": "IEA", "url": "https://www.iea.org/reports/x", "source_type": "search_result"}],
            "confidence": 0.8,
            "should_stop": true,
        })
        .to_string();

        let chat = FakeChatModel::single(reply);
        let search = Arc::new(FakeWebSearch::empty());
        let fetcher = Arc::new(FakePageFetcher::ok("content"));
        let worker = Worker::new(chat, search, fetcher, EngineConfig::default());

        let result = worker.run(&subtask(), 2).await;
        assert_eq!(result.subtask_id, 1);
        assert!(result.confidence > 0.0);
        assert!(!result.findings.is_empty());
    }

    #[tokio::test]
    async fn worker_returns_placeholder_on_unparseable_reply() {
        let chat = FakeChatModel::single("not json at all");
        let search = Arc::new(FakeWebSearch::empty());
        let fetcher = Arc::new(FakePageFetcher::ok("content"));
        let worker = Worker::new(chat, search, fetcher, EngineConfig::default());

        let result = worker.run(&subtask(), 2).await;
        assert!(result.confidence <= 0.5);
        assert!(!result.findings.is_empty());
    }

    #[tokio::test]
    async fn worker_never_panics_on_provider_error() {
        let chat: Arc<dyn ChatModel> = Arc::new(FakeChatModelErroring);
        let search = Arc::new(FakeWebSearch::empty());
        let fetcher = Arc::new(FakePageFetcher::failing());
        let worker = Worker::new(chat, search, fetcher, EngineConfig::default());

        let result = worker.run(&subtask(), 2).await;
        assert!(result.confidence <= 0.5);
    }

    #[tokio::test]
    async fn tool_invocation_merges_deep_fetch_and_search_sources() {
        let tool_call = serde_json::json!({"tool": {"query": "solar panel efficiency", "max_results": 10}}).to_string();
        let final_reply = serde_json::json!({
            "findings": ["panels now exceed 22% efficiency"],
            "sources": [],
            "confidence": 0.6,
            "should_stop": false,
        })
        .to_string();

        let chat = std::sync::Arc::new(FakeChatModel::new(vec![tool_call, final_reply]));
        let hits = vec![SearchHit {
            title: "Solar panel study".to_string(),
            link: "https://arxiv.org/abs/2301.00001".to_string(),
            snippet: "panels now exceed 22 percent efficiency".to_string(),
        }];
        let search = Arc::new(FakeWebSearch::new(hits));
        let fetcher = Arc::new(FakePageFetcher::ok("full article content"));
        let worker = Worker::new(chat, search, fetcher, EngineConfig::default());

        let result = worker.run(&subtask(), 2).await;
        assert!(result.confidence > 0.0);
    }

    struct FakeChatModelErroring;

    #[async_trait::async_trait]
    impl ChatModel for FakeChatModelErroring {
        async fn complete(&self, _tier: ModelTier, _prompt: &str) -> Result<String, crate::error::CapabilityError> {
            Err(crate::error::CapabilityError::ProviderError("boom".to_string()))
        }
    }
}
