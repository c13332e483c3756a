//! Scenario classifier + research planner (C2).
//!
//! Grounded in `original_source/src/clarifyagent/tools/serperapi.py`'s
//! JSON-field extraction convention (URLs come from structured data, never
//! parsed text) and in the teacher's domain-ranking style from
//! `tools/search/mod.rs`. The scenario keyword lists and high-value domain
//! table themselves have no single original-source file of record — they are
//! grounded directly in this spec's own rule text (§4.2).

use crate::types::SearchHit;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Scenario {
    Retrosynthesis,
    PipelineEvaluation,
    ClinicalPipeline,
    MarketAnalysis,
    RegulatoryReview,
    AcademicResearch,
    CompetitiveIntelligence,
}

impl Scenario {
    /// Per-scenario weight used by the confidence scorer (§4.3).
    pub fn weight(self) -> f64 {
        match self {
            Scenario::Retrosynthesis => 0.85,
            Scenario::PipelineEvaluation => 0.8,
            Scenario::ClinicalPipeline => 0.8,
            Scenario::MarketAnalysis => 0.75,
            Scenario::RegulatoryReview => 0.9,
            Scenario::AcademicResearch => 0.75,
            Scenario::CompetitiveIntelligence => 0.7,
        }
    }

    fn keywords(self) -> &'static [&'static str] {
        match self {
            Scenario::Retrosynthesis => &["retrosynthesis", "synthesis route", "synthetic pathway", "reagent", "precursor"],
            Scenario::PipelineEvaluation => &["pipeline", "asset", "phase 1", "phase 2", "phase 3", "portfolio"],
            Scenario::ClinicalPipeline => &["clinical trial", "clinical pipeline", "patient", "efficacy", "adverse event"],
            Scenario::MarketAnalysis => &["market size", "market share", "tam", "forecast", "revenue", "growth rate"],
            Scenario::RegulatoryReview => &["fda", "ema", "regulatory", "approval", "submission", "compliance"],
            Scenario::AcademicResearch => &["study", "paper", "journal", "research", "literature", "hypothesis"],
            Scenario::CompetitiveIntelligence => &["competitor", "competitive landscape", "market position", "benchmark"],
        }
    }

    /// All scenarios in the fixed enum order used for tie-breaking.
    fn all() -> [Scenario; 7] {
        [
            Scenario::Retrosynthesis,
            Scenario::PipelineEvaluation,
            Scenario::ClinicalPipeline,
            Scenario::MarketAnalysis,
            Scenario::RegulatoryReview,
            Scenario::AcademicResearch,
            Scenario::CompetitiveIntelligence,
        ]
    }
}

/// Deterministic keyword-count classification; ties break by enum order,
/// defaulting to `AcademicResearch` when nothing scores above zero.
pub fn classify(query: &str) -> Scenario {
    let lower = query.to_lowercase();
    let mut best = Scenario::AcademicResearch;
    let mut best_score = 0usize;

    for scenario in Scenario::all() {
        let score = scenario
            .keywords()
            .iter()
            .filter(|kw| lower.contains(*kw))
            .count();
        if score > best_score {
            best_score = score;
            best = scenario;
        }
    }

    best
}

const HIGH_VALUE_DOMAINS: &[(&str, u8)] = &[
    ("ncbi.nlm.nih.gov", 5),
    ("pubmed.ncbi.nlm.nih.gov", 5),
    ("doi.org", 4),
    ("arxiv.org", 4),
    ("fda.gov", 5),
    ("ema.europa.eu", 5),
    ("clinicaltrials.gov", 4),
    ("nature.com", 4),
    ("sciencedirect.com", 3),
    ("springer.com", 3),
];

#[derive(Clone, Debug)]
pub struct DeepFetchTarget {
    pub rank: usize,
    pub hit: SearchHit,
    pub priority: u8,
    pub reason: String,
}

fn domain_of(url: &str) -> Option<String> {
    url::Url::parse(url).ok().and_then(|u| u.host_str().map(|h| h.to_string()))
}

fn scenario_keyword_priority(scenario: Scenario, hit: &SearchHit) -> Option<(u8, &'static str)> {
    let text = format!("{} {}", hit.title, hit.snippet).to_lowercase();
    let hits = scenario.keywords().iter().filter(|kw| text.contains(*kw)).count();
    if hits == 0 {
        None
    } else {
        Some((3, "matches scenario keywords"))
    }
}

/// Emits a research plan: each candidate ranked by priority in [1..5], capped
/// by the requested result-count tier, sorted `(priority desc, rank asc)`.
pub fn plan_deep_fetch(scenario: Scenario, hits: &[SearchHit], requested_results: usize) -> Vec<DeepFetchTarget> {
    let mut candidates: Vec<DeepFetchTarget> = hits
        .iter()
        .enumerate()
        .filter_map(|(rank, hit)| {
            let mut priority = 0u8;
            let mut reason = String::new();

            if let Some(domain) = domain_of(&hit.link) {
                if let Some((_, score)) = HIGH_VALUE_DOMAINS.iter().find(|(d, _)| domain.ends_with(*d)) {
                    priority = *score;
                    reason = format!("high-value domain ({domain})");
                }
            }

            if priority == 0 {
                if let Some((p, r)) = scenario_keyword_priority(scenario, hit) {
                    priority = p;
                    reason = r.to_string();
                }
            }

            if priority == 0 && hit.snippet.chars().count() < 300 {
                priority = 2;
                reason = "short snippet promoted for deeper context".to_string();
            }

            if priority == 0 {
                None
            } else {
                Some(DeepFetchTarget {
                    rank,
                    hit: hit.clone(),
                    priority,
                    reason,
                })
            }
        })
        .collect();

    candidates.sort_by(|a, b| b.priority.cmp(&a.priority).then(a.rank.cmp(&b.rank)));

    let cap = if requested_results <= 8 {
        3
    } else if requested_results <= 15 {
        3
    } else {
        5
    };

    candidates.truncate(cap);
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(title: &str, link: &str, snippet: &str) -> SearchHit {
        SearchHit {
            title: title.to_string(),
            link: link.to_string(),
            snippet: snippet.to_string(),
        }
    }

    #[test]
    fn classifies_by_keyword_count() {
        let scenario = classify("what is the FDA regulatory approval process for a new drug submission");
        assert_eq!(scenario, Scenario::RegulatoryReview);
    }

    #[test]
    fn defaults_to_academic_research_on_tie() {
        assert_eq!(classify("random unrelated query about nothing specific"), Scenario::AcademicResearch);
    }

    #[test]
    fn high_value_domain_gets_top_priority() {
        let hits = vec![hit("A", "https://pubmed.ncbi.nlm.nih.gov/12345/", "a long snippet ".repeat(40).as_str())];
        let plan = plan_deep_fetch(Scenario::AcademicResearch, &hits, 10);
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].priority, 5);
    }

    #[test]
    fn short_snippet_promoted_when_no_domain_match() {
        let hits = vec![hit("A", "https://example.org/x", "short")];
        let plan = plan_deep_fetch(Scenario::AcademicResearch, &hits, 10);
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].priority, 2);
    }

    #[test]
    fn cap_respects_result_count_tier() {
        let hits: Vec<SearchHit> = (0..20)
            .map(|i| hit(&format!("t{i}"), &format!("https://pubmed.ncbi.nlm.nih.gov/{i}/"), "x"))
            .collect();
        let plan_small = plan_deep_fetch(Scenario::AcademicResearch, &hits, 8);
        assert!(plan_small.len() <= 3);
        let plan_large = plan_deep_fetch(Scenario::AcademicResearch, &hits, 20);
        assert!(plan_large.len() <= 5);
    }

    #[test]
    fn sorted_by_priority_desc_then_rank_asc() {
        let hits = vec![
            hit("A", "https://example.org/a", "short"),
            hit("B", "https://pubmed.ncbi.nlm.nih.gov/1/", "x"),
        ];
        let plan = plan_deep_fetch(Scenario::AcademicResearch, &hits, 10);
        assert_eq!(plan[0].hit.link, "https://pubmed.ncbi.nlm.nih.gov/1/");
    }
}
