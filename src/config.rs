//! Layered engine configuration: explicit field → environment variable → default.
//!
//! Follows the same three-tier resolution chain as the teacher's
//! `ShadowDeepResearchConfig::resolve_*()` methods, plus an optional JSON
//! config file read once at startup (`load_engine_config`), matching the
//! teacher's `load_shadow_config()` silent-default-on-missing-file policy.

use serde::Deserialize;
use std::time::Duration;
use tracing::warn;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModelTier {
    Fast,
    Quality,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct EngineFileConfig {
    pub max_parallel_subagents: Option<usize>,
    pub max_concurrent_requests: Option<usize>,
    pub max_agent_turns: Option<u32>,
    pub agent_execution_timeout_secs: Option<u64>,
    pub soft_exit_timeout_secs: Option<u64>,
    pub api_timeout_secs: Option<u64>,
    pub jina_timeout_secs: Option<u64>,
    pub jina_skip_domains: Option<Vec<String>>,
    pub max_search_results: Option<usize>,
    pub max_content_chars: Option<usize>,
    pub max_snippet_chars: Option<usize>,
    pub max_tool_output: Option<usize>,
    pub enable_llm_confidence: Option<bool>,
    pub llm_confidence_weight: Option<f64>,
    pub chat_model_base_url: Option<String>,
    pub chat_model_api_key: Option<String>,
    pub chat_model_fast: Option<String>,
    pub chat_model_quality: Option<String>,
}

/// Try `./research-engine.json`, then `RESEARCH_ENGINE_CONFIG` if set.
/// Missing file → silent default. Parse error → warn + default.
pub fn load_engine_file_config() -> EngineFileConfig {
    let mut candidates = vec!["./research-engine.json".to_string()];
    if let Ok(p) = std::env::var("RESEARCH_ENGINE_CONFIG") {
        candidates.insert(0, p);
    }

    for path in candidates {
        if !std::path::Path::new(&path).exists() {
            continue;
        }
        match std::fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str::<EngineFileConfig>(&raw) {
                Ok(cfg) => return cfg,
                Err(e) => {
                    warn!("engine_config: failed to parse {}: {} — using defaults", path, e);
                    return EngineFileConfig::default();
                }
            },
            Err(e) => {
                warn!("engine_config: failed to read {}: {} — using defaults", path, e);
                return EngineFileConfig::default();
            }
        }
    }

    EngineFileConfig::default()
}

fn env_usize(key: &str) -> Option<usize> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

fn env_u32(key: &str) -> Option<u32> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

fn env_u64(key: &str) -> Option<u64> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

fn env_f64(key: &str) -> Option<f64> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

fn env_bool(key: &str) -> Option<bool> {
    std::env::var(key)
        .ok()
        .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|s| !s.trim().is_empty())
}

/// Fully resolved engine configuration — every field has a concrete value.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    pub max_parallel_subagents: usize,
    pub max_concurrent_requests: usize,
    pub max_agent_turns: u32,
    pub agent_execution_timeout: Duration,
    pub soft_exit_timeout: Duration,
    pub api_timeout: Duration,
    pub jina_timeout: Duration,
    pub jina_retries: u32,
    pub jina_skip_domains: Vec<String>,
    pub max_search_results: usize,
    pub max_content_chars: usize,
    pub max_snippet_chars: usize,
    pub max_tool_output: usize,
    pub enable_llm_confidence: bool,
    pub llm_confidence_weight: f64,
    pub chat_model_base_url: String,
    pub chat_model_api_key: Option<String>,
    pub chat_model_fast: String,
    pub chat_model_quality: String,
}

impl EngineConfig {
    /// Resolve file → env → hardcoded default, one field at a time.
    pub fn resolve(file: &EngineFileConfig) -> Self {
        let llm_confidence_weight = file
            .llm_confidence_weight
            .or_else(|| env_f64("LLM_CONFIDENCE_WEIGHT"))
            .unwrap_or(0.4);
        let llm_confidence_weight = if !(0.0..=1.0).contains(&llm_confidence_weight) {
            warn!(
                "engine_config: LLM_CONFIDENCE_WEIGHT={} out of [0,1] — clamping",
                llm_confidence_weight
            );
            llm_confidence_weight.clamp(0.0, 1.0)
        } else {
            llm_confidence_weight
        };

        Self {
            max_parallel_subagents: file
                .max_parallel_subagents
                .or_else(|| env_usize("MAX_PARALLEL_SUBAGENTS"))
                .unwrap_or(5),
            max_concurrent_requests: file
                .max_concurrent_requests
                .or_else(|| env_usize("MAX_CONCURRENT_REQUESTS"))
                .unwrap_or(4),
            max_agent_turns: file
                .max_agent_turns
                .or_else(|| env_u32("MAX_AGENT_TURNS"))
                .unwrap_or(2),
            agent_execution_timeout: Duration::from_secs(
                file.agent_execution_timeout_secs
                    .or_else(|| env_u64("AGENT_EXECUTION_TIMEOUT"))
                    .unwrap_or(180),
            ),
            soft_exit_timeout: Duration::from_secs(
                file.soft_exit_timeout_secs
                    .or_else(|| env_u64("SOFT_EXIT_TIMEOUT"))
                    .unwrap_or(90),
            ),
            api_timeout: Duration::from_secs(
                file.api_timeout_secs.or_else(|| env_u64("API_TIMEOUT")).unwrap_or(30),
            ),
            jina_timeout: Duration::from_secs(
                file.jina_timeout_secs.or_else(|| env_u64("JINA_TIMEOUT")).unwrap_or(3),
            ),
            jina_retries: 0,
            jina_skip_domains: file
                .jina_skip_domains
                .clone()
                .or_else(|| {
                    env_string("JINA_SKIP_DOMAINS")
                        .map(|s| s.split(',').map(|d| d.trim().to_string()).collect())
                })
                .unwrap_or_default(),
            max_search_results: file
                .max_search_results
                .or_else(|| env_usize("MAX_SEARCH_RESULTS"))
                .unwrap_or(15),
            max_content_chars: file
                .max_content_chars
                .or_else(|| env_usize("MAX_CONTENT_CHARS"))
                .unwrap_or(3000),
            max_snippet_chars: file
                .max_snippet_chars
                .or_else(|| env_usize("MAX_SNIPPET_CHARS"))
                .unwrap_or(200),
            max_tool_output: file
                .max_tool_output
                .or_else(|| env_usize("MAX_TOOL_OUTPUT"))
                .unwrap_or(2000),
            enable_llm_confidence: file
                .enable_llm_confidence
                .or_else(|| env_bool("ENABLE_LLM_CONFIDENCE"))
                .unwrap_or(false),
            llm_confidence_weight,
            chat_model_base_url: file
                .chat_model_base_url
                .clone()
                .or_else(|| env_string("CHAT_MODEL_BASE_URL"))
                .unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
            chat_model_api_key: file
                .chat_model_api_key
                .clone()
                .or_else(|| env_string("CHAT_MODEL_API_KEY")),
            chat_model_fast: file
                .chat_model_fast
                .clone()
                .or_else(|| env_string("CHAT_MODEL_FAST"))
                .unwrap_or_else(|| "gpt-4o-mini".to_string()),
            chat_model_quality: file
                .chat_model_quality
                .clone()
                .or_else(|| env_string("CHAT_MODEL_QUALITY"))
                .unwrap_or_else(|| "gpt-4o".to_string()),
        }
    }

    pub fn model_for_tier(&self, tier: ModelTier) -> &str {
        match tier {
            ModelTier::Fast => &self.chat_model_fast,
            ModelTier::Quality => &self.chat_model_quality,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::resolve(&EngineFileConfig::default())
    }
}
