//! Clarifier (C7): five-dimension dialogue assessment.
//!
//! Grounded in `original_source/src/clarifyagent/dialog.py` (conversation
//! summary / follow-up detection) and the pre-clarification search +
//! domain-term extraction supplement from §1B, itself grounded in the
//! original clarifier's `pre_clarification_search`/`extract_domain_terms`.

use crate::capabilities::{ChatModel, WebSearch};
use crate::config::ModelTier;
use crate::session::SessionState;
use crate::types::{Clarification, NextAction, Plan, Task, TaskDraft};
use regex::Regex;
use serde::Deserialize;
use std::collections::HashSet;
use std::sync::OnceLock;
use tracing::{debug, warn};

const CONFIRM_THRESHOLD: f64 = 0.75;

#[derive(Clone, Copy, Debug, Default)]
pub struct Dimensions {
    pub what: f64,
    pub action: f64,
    pub constraint: f64,
    pub context: f64,
    pub output: f64,
}

impl Dimensions {
    fn lowest(&self) -> &'static str {
        let pairs = [
            ("what", self.what),
            ("action", self.action),
            ("constraint", self.constraint),
            ("context", self.context),
            ("output", self.output),
        ];
        pairs
            .iter()
            .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap())
            .map(|(name, _)| *name)
            .unwrap_or("what")
    }

    fn overall(&self) -> f64 {
        (self.what + self.action + self.constraint + self.context + self.output) / 5.0
    }
}

#[derive(Deserialize)]
struct ModelAssessment {
    what: f64,
    action: f64,
    constraint: f64,
    context: f64,
    output: f64,
    #[serde(default)]
    goal: String,
    #[serde(default)]
    research_focus: Vec<String>,
}

fn private_info_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\b(my|our|我们的|我的)\b|this project").unwrap())
}

fn acronym_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b[A-Z]{2,}[-]?[A-Z0-9]*\b").unwrap())
}

fn camel_case_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b[A-Z][a-z]+[A-Z][A-Za-z0-9]*\b").unwrap())
}

fn capitalized_phrase_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b([A-Z][a-z]+(?:\s+[A-Z][a-z]+)+)\b").unwrap())
}

const STOPLIST: &[&str] = &["AI", "OK", "API", "US", "UK", "EU", "IT", "ID"];

/// Extracts unfamiliar proper nouns/acronyms for the pre-clarification
/// search gate, capped at 5 terms, stoplist-filtered.
pub fn extract_domain_terms(query: &str) -> Vec<String> {
    let mut terms = HashSet::new();
    for m in acronym_regex().find_iter(query) {
        terms.insert(m.as_str().to_string());
    }
    for m in camel_case_regex().find_iter(query) {
        terms.insert(m.as_str().to_string());
    }
    for cap in capitalized_phrase_regex().captures_iter(query) {
        terms.insert(cap[1].to_string());
    }

    let mut filtered: Vec<String> = terms
        .into_iter()
        .filter(|t| !STOPLIST.contains(&t.as_str()))
        .collect();
    filtered.sort();
    filtered.truncate(5);
    filtered
}

fn has_private_info_signal(message: &str) -> bool {
    private_info_regex().is_match(message)
}

/// Builds a short recap of prior turns, including already-recorded
/// clarification Q&A pairs, so the model can detect a follow-up answer
/// instead of repeating a question (§4.7 + §1B).
fn conversation_summary(draft: &TaskDraft) -> String {
    if draft.clarification_responses.is_empty() {
        return String::new();
    }
    let mut summary = String::from("Prior clarifications:\n");
    for exchange in &draft.clarification_responses {
        summary.push_str(&format!("- Q: {}\n  A: {}\n", exchange.question, exchange.answer));
    }
    summary
}

fn assessment_prompt(message: &str, draft: &TaskDraft, extra_evidence: Option<&str>) -> String {
    let mut prompt = format!(
        "Assess this research request across five dimensions (what, action, constraint, context, output), each in [0,1]. \
         Message: {message}\n{}\n",
        conversation_summary(draft)
    );
    if let Some(evidence) = extra_evidence {
        prompt.push_str(&format!("Additional evidence from a preliminary search:\n{evidence}\n"));
    }
    prompt.push_str(
        "Return JSON: {\"what\":n,\"action\":n,\"constraint\":n,\"context\":n,\"output\":n,\"goal\":str,\"research_focus\":[str]}",
    );
    prompt
}

fn parse_assessment(reply: &str) -> Result<ModelAssessment, crate::error::ClarifierError> {
    serde_json::from_str(reply).map_err(|_| crate::error::ClarifierError::ParseError(reply.to_string()))
}

fn clarification_for(dimension: &'static str) -> Clarification {
    let (question, missing_info) = match dimension {
        "what" => ("Could you clarify exactly what you'd like researched?", "what"),
        "action" => ("What would you like me to do with the findings (summarize, compare, recommend)?", "action"),
        "constraint" => ("Are there any constraints I should respect (timeframe, geography, sources)?", "constraint"),
        "context" => ("Could you share a bit more background or context for this request?", "context"),
        _ => ("What output format would be most useful (report, bullet list, table)?", "output"),
    };
    Clarification {
        question: question.to_string(),
        options: Vec::new(),
        missing_info: missing_info.to_string(),
        open_ended: true,
    }
}

fn open_ended_private_clarification() -> Clarification {
    Clarification {
        question: "This sounds like it relates to a specific project of yours — could you tell me more about it?".to_string(),
        options: Vec::new(),
        missing_info: "project_details".to_string(),
        open_ended: true,
    }
}

/// Applies the decision table then the post-processing overrides exactly
/// as specified in §4.7.
fn decide(dims: Dimensions, task: Task) -> Plan {
    if dims.what < 0.4 {
        return need_clarification(task, dims.overall(), clarification_for("what"));
    }
    if dims.action < 0.4 {
        return need_clarification(task, dims.overall(), clarification_for("action"));
    }

    let confidence = dims.overall();
    let mut plan = if confidence >= CONFIRM_THRESHOLD {
        Plan {
            next_action: NextAction::StartResearch,
            task,
            confidence,
            assumptions: Vec::new(),
            clarification: None,
            confirm_prompt: None,
            unknown_topic: None,
            search_query: None,
            block: None,
            why: "confidence above proceed threshold".to_string(),
        }
    } else if confidence >= CONFIRM_THRESHOLD - 0.15 {
        Plan {
            next_action: NextAction::ConfirmPlan,
            task,
            confidence,
            assumptions: Vec::new(),
            clarification: None,
            confirm_prompt: Some("Here is my understanding of your request — should I proceed?".to_string()),
            unknown_topic: None,
            search_query: None,
            block: None,
            why: "confidence in confirm band".to_string(),
        }
    } else {
        return need_clarification(task, confidence, clarification_for(dims.lowest()));
    };

    // Post-processing overrides (§4.7).
    if plan.next_action == NextAction::StartResearch {
        plan.next_action = NextAction::ConfirmPlan;
        plan.confirm_prompt = Some("Here is my understanding of your request — should I proceed?".to_string());
    } else if plan.next_action == NextAction::ConfirmPlan && plan.confidence < 0.6 {
        return need_clarification(plan.task, plan.confidence, clarification_for(dims.lowest()));
    }

    plan
}

fn need_clarification(task: Task, confidence: f64, clarification: Clarification) -> Plan {
    Plan {
        next_action: NextAction::NeedClarification,
        task,
        confidence,
        assumptions: Vec::new(),
        clarification: Some(clarification),
        confirm_prompt: None,
        unknown_topic: None,
        search_query: None,
        block: None,
        why: "below clarification threshold".to_string(),
    }
}

/// Runs the full assessment: private-info pre-check, optional bounded
/// pre-clarification search, model call, decision table, overrides.
pub async fn assess(
    chat: &dyn ChatModel,
    search: Option<&dyn WebSearch>,
    message: &str,
    state: &SessionState,
) -> Plan {
    if has_private_info_signal(message) {
        let entity_named = capitalized_phrase_regex().is_match(message);
        if !entity_named {
            return need_clarification(
                Task {
                    goal: state.task_draft.goal.clone(),
                    research_focus: state.task_draft.research_focus.clone(),
                },
                0.2,
                open_ended_private_clarification(),
            );
        }
    }

    let prompt = assessment_prompt(message, &state.task_draft, None);
    let reply = match chat.complete(ModelTier::Fast, &prompt).await {
        Ok(r) => r,
        Err(e) => {
            warn!("clarifier: model call failed: {}", e);
            return need_clarification(
                Task {
                    goal: state.task_draft.goal.clone(),
                    research_focus: state.task_draft.research_focus.clone(),
                },
                0.0,
                clarification_for("what"),
            );
        }
    };

    let assessment = match parse_assessment(&reply) {
        Ok(a) => a,
        Err(_) => {
            return need_clarification(
                Task {
                    goal: state.task_draft.goal.clone(),
                    research_focus: state.task_draft.research_focus.clone(),
                },
                0.0,
                clarification_for("what"),
            );
        }
    };

    let mut dims = Dimensions {
        what: assessment.what,
        action: assessment.action,
        constraint: assessment.constraint,
        context: assessment.context,
        output: assessment.output,
    };

    // Pre-clarification search (§1B / §4.7 Expansion): only when `what` is
    // borderline and the query carries unfamiliar domain terms.
    if (0.35..=0.55).contains(&dims.what) {
        let terms = extract_domain_terms(message);
        if !terms.is_empty() {
            if let Some(search) = search {
                if let Ok(hits) = search.query(&terms.join(" "), 3).await {
                    if !hits.is_empty() {
                        debug!("clarifier: pre-clarification search found {} hits", hits.len());
                        dims.what = (dims.what + 0.15).min(1.0);
                    }
                }
                // Any search failure is swallowed — the clarifier proceeds
                // exactly as if it had not attempted the search.
            }
        }
    }

    let task = Task {
        goal: assessment.goal,
        research_focus: assessment.research_focus,
    };

    decide(dims, task)
}
