//! Synthesizer (C8): folds subtask findings into one cited narrative.
//!
//! Structural requirements (numbered chapters, inline `[[site](url)]`
//! citations, mandatory tables for comparative content) are grounded in
//! `original_source/src/clarifyagent/prompts.py`'s `SYNTHESIZER_SYSTEM_PROMPT`
//! formatting rules, stripped of that prompt's domain-specific language per
//! the engine's domain-agnostic Non-goal. The post-generation citation
//! validation pass is a deliberate strengthening over that original (§4.8
//! Implementation note).

use crate::capabilities::ChatModel;
use crate::config::ModelTier;
use crate::error::SynthesizerError;
use crate::types::SubtaskResult;
use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;
use tracing::warn;

const PAYLOAD_LIMIT: usize = 20_000;

struct TruncationCaps {
    findings: usize,
    sources: usize,
    snippet_chars: usize,
}

const PRIMARY_CAPS: TruncationCaps = TruncationCaps {
    findings: 10,
    sources: 5,
    snippet_chars: 200,
};

const TIGHT_CAPS: TruncationCaps = TruncationCaps {
    findings: 3,
    sources: 2,
    snippet_chars: 200,
};

fn citation_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[\[([^\]]+)\]\(([^)]+)\)\]").unwrap())
}

fn build_payload(results: &[SubtaskResult], caps: &TruncationCaps) -> String {
    let mut payload = serde_json::json!({ "findings": [] });
    let array = payload["findings"].as_array_mut().unwrap();

    for r in results {
        let findings: Vec<&str> = r.findings.iter().take(caps.findings).map(|s| s.as_str()).collect();
        let sources: Vec<serde_json::Value> = r
            .sources
            .iter()
            .take(caps.sources)
            .map(|s| {
                let snippet = s
                    .snippet
                    .as_deref()
                    .map(|sn| truncate_chars(sn, caps.snippet_chars));
                serde_json::json!({ "title": s.title, "url": s.url, "snippet": snippet })
            })
            .collect();

        array.push(serde_json::json!({
            "focus": r.focus,
            "findings": findings,
            "sources": sources,
        }));
    }

    serde_json::to_string(&payload).unwrap_or_default()
}

fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        text.chars().take(max).collect::<String>() + "…"
    }
}

fn prompt_for(goal: &str, research_focus: &[String], payload: &str) -> String {
    format!(
        "Write a research report in markdown. Start with a top-level heading `# {goal}`. \
         Organize the body into 4 to 6 numbered chapters covering: {}. \
         Cite sources inline using the exact form [[site name](url)], using only URLs that \
         appear in the provided source data below — never invent a URL. Use a markdown table \
         whenever comparing 3 or more entities across 2 or more attributes.\n\nSource data:\n{payload}",
        research_focus.join(", ")
    )
}

fn source_url_set(results: &[SubtaskResult]) -> HashSet<String> {
    results
        .iter()
        .flat_map(|r| r.sources.iter().map(|s| s.url.clone()))
        .collect()
}

/// Scans the generated report and strips any `[[site](url)]` citation whose
/// `url` is not a member of the input source-URL union, replacing it with
/// plain text. Returns the cleaned report and the surviving citation URLs.
fn validate_citations(report: &str, allowed: &HashSet<String>) -> (String, Vec<String>) {
    let mut surviving = Vec::new();
    let cleaned = citation_regex().replace_all(report, |caps: &regex::Captures| {
        let site = &caps[1];
        let url = &caps[2];
        if allowed.contains(url) {
            surviving.push(url.to_string());
            format!("[[{site}]({url})]")
        } else {
            warn!("synthesizer: stripping citation to unknown URL: {}", url);
            site.to_string()
        }
    });
    (cleaned.into_owned(), surviving)
}

/// Synthesizes a cited markdown report. On persistent payload overflow,
/// falls back to a raw concatenation of findings per §7's recovery policy.
pub async fn synthesize(
    chat: &dyn ChatModel,
    goal: &str,
    research_focus: &[String],
    results: &[SubtaskResult],
) -> Result<(String, Vec<String>), SynthesizerError> {
    let mut payload = build_payload(results, &PRIMARY_CAPS);
    if payload.len() > PAYLOAD_LIMIT {
        payload = build_payload(results, &TIGHT_CAPS);
    }

    if payload.len() > PAYLOAD_LIMIT {
        warn!("synthesizer: payload still exceeds limit after retry, falling back to raw concatenation");
        let raw = results
            .iter()
            .flat_map(|r| r.findings.iter().cloned())
            .collect::<Vec<_>>()
            .join("\n\n");
        let report = format!("# {goal}\n\n{raw}");
        return Ok((report, Vec::new()));
    }

    let prompt = prompt_for(goal, research_focus, &payload);
    let report = chat
        .complete(ModelTier::Quality, &prompt)
        .await
        .map_err(|e| SynthesizerError::ModelError(anyhow::Error::from(e)))?;

    let allowed = source_url_set(results);
    let (cleaned, citations) = validate_citations(&report, &allowed);
    Ok((cleaned, citations))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::FakeChatModel;
    use crate::types::{Source, SourceType};

    fn result_with_source(url: &str) -> SubtaskResult {
        SubtaskResult {
            subtask_id: 1,
            focus: "costs".to_string(),
            findings: vec!["solar costs fell sharply".to_string()],
            sources: vec![Source {
                title: "IEA".to_string(),
                url: url.to_string(),
                snippet: Some("snippet".to_string()),
                source_type: Some(SourceType::SearchResult),
            }],
            confidence: 0.7,
        }
    }

    #[tokio::test]
    async fn strips_citation_to_unknown_url() {
        let report = "# Goal\n\n## 1. Costs\nSolar costs fell [[IEA](https://iea.org/report)] and also \
                       [[Fake](https://not-a-real-source.example/x)].";
        let chat = FakeChatModel::single(report.to_string());
        let results = vec![result_with_source("https://iea.org/report")];
        let (cleaned, citations) = synthesize(chat.as_ref(), "Goal", &["costs".to_string()], &results)
            .await
            .unwrap();
        assert!(cleaned.contains("[[IEA](https://iea.org/report)]"));
        assert!(!cleaned.contains("not-a-real-source"));
        assert_eq!(citations, vec!["https://iea.org/report".to_string()]);
    }

    #[tokio::test]
    async fn falls_back_to_raw_concatenation_when_payload_never_fits() {
        let huge_finding = "x".repeat(30_000);
        let results = vec![SubtaskResult {
            subtask_id: 1,
            focus: "f".to_string(),
            findings: vec![huge_finding.clone()],
            sources: vec![],
            confidence: 0.5,
        }];
        let chat = FakeChatModel::single("unused".to_string());
        let (report, citations) = synthesize(chat.as_ref(), "Goal", &[], &results).await.unwrap();
        assert!(report.contains(&huge_finding));
        assert!(citations.is_empty());
        assert_eq!(chat.calls(), 0);
    }
}
