//! Confidence scorer (C3).
//!
//! Grounded in the spec's own formula (§4.3); the three-tier JSON extraction
//! fallback (balanced-brace → whole-text → regex) mirrors `planner.py`'s
//! `_extract_json` bracket-matching helper, extended with a last-resort
//! regex per this spec's stricter robustness requirement.

use crate::capabilities::ChatModel;
use crate::config::ModelTier;
use crate::scenario::Scenario;
use regex::Regex;
use std::sync::OnceLock;
use tracing::warn;

/// Rule-based score: additive over source count and deep-fetch success,
/// scaled by the scenario weight, clamped to 0.95. A zero deep-fetch success
/// rate never penalizes — only a `jina_failed` flag is set by the caller.
pub fn rule_score(scenario: Scenario, total_sources: usize, deep_fetch_success: usize) -> f64 {
    let source_term = (0.1 * total_sources as f64).min(0.3);
    let deep_term = (0.15 * deep_fetch_success as f64).min(0.3);
    let base = 0.5 + source_term + deep_term;
    (base * scenario.weight()).min(0.95)
}

fn overall_confidence_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#""overall_confidence"\s*:\s*([0-9.]+)"#).unwrap())
}

/// Three-tier JSON extraction: balanced-brace scan, then whole-text parse,
/// then a targeted regex for the one field this caller needs.
fn extract_overall_confidence(text: &str) -> Option<f64> {
    if let Some(braced) = extract_balanced_braces(text) {
        if let Ok(v) = serde_json::from_str::<serde_json::Value>(&braced) {
            if let Some(n) = v.get("overall_confidence").and_then(|x| x.as_f64()) {
                return Some(n);
            }
        }
    }

    if let Ok(v) = serde_json::from_str::<serde_json::Value>(text) {
        if let Some(n) = v.get("overall_confidence").and_then(|x| x.as_f64()) {
            return Some(n);
        }
    }

    overall_confidence_regex()
        .captures(text)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok())
}

fn extract_balanced_braces(text: &str) -> Option<String> {
    let start = text.find('{')?;
    let mut depth = 0i32;
    for (i, ch) in text[start..].char_indices() {
        match ch {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(text[start..start + i + ch.len_utf8()].to_string());
                }
            }
            _ => {}
        }
    }
    None
}

/// Optional model-based score on [0,1]. Returns `None` on any failure —
/// callers fall back to the rule score.
pub async fn model_score(chat: &dyn ChatModel, prompt: &str) -> Option<f64> {
    let response = match chat.complete(ModelTier::Fast, prompt).await {
        Ok(r) => r,
        Err(e) => {
            warn!("confidence: model scoring call failed: {}", e);
            return None;
        }
    };

    match extract_overall_confidence(&response) {
        Some(v) => Some(v.clamp(0.0, 1.0)),
        None => {
            warn!("confidence: could not extract overall_confidence from model response");
            None
        }
    }
}

/// Combines rule and model scores with a clamped weight; `w=0` is rule-only.
pub fn combine(rule: f64, model: Option<f64>, weight: f64) -> f64 {
    let w = weight.clamp(0.0, 1.0);
    match model {
        Some(m) => rule * (1.0 - w) + m * w,
        None => rule,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rule_score_never_exceeds_cap() {
        let score = rule_score(Scenario::RegulatoryReview, 100, 100);
        assert!(score <= 0.95);
    }

    #[test]
    fn rule_score_zero_deep_fetch_is_not_penalized() {
        let with_deep = rule_score(Scenario::AcademicResearch, 5, 2);
        let without_deep = rule_score(Scenario::AcademicResearch, 5, 0);
        assert!(without_deep <= with_deep);
        assert!(without_deep >= 0.5 * Scenario::AcademicResearch.weight());
    }

    #[test]
    fn extracts_from_balanced_braces_embedded_in_prose() {
        let text = "Here is my analysis: {\"overall_confidence\": 0.82, \"notes\": \"ok\"} thanks.";
        assert_eq!(extract_overall_confidence(text), Some(0.82));
    }

    #[test]
    fn extracts_from_whole_text_json() {
        let text = r#"{"overall_confidence": 0.5}"#;
        assert_eq!(extract_overall_confidence(text), Some(0.5));
    }

    #[test]
    fn falls_back_to_regex_on_malformed_json() {
        let text = "overall_confidence: cannot parse but \"overall_confidence\": 0.33 is here";
        assert_eq!(extract_overall_confidence(text), Some(0.33));
    }

    #[test]
    fn combine_clamps_weight() {
        let combined = combine(0.9, Some(0.1), 5.0);
        assert!((combined - 0.1).abs() < f64::EPSILON);
    }

    #[test]
    fn combine_without_model_score_is_rule_only() {
        assert_eq!(combine(0.6, None, 0.8), 0.6);
    }
}
