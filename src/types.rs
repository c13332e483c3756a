//! Plain-data types for the research orchestration engine's data model.
//!
//! Mirrors the teacher's `core/types.rs` convention: flat serde structs,
//! liberal `#[serde(default)]` so partially-populated payloads round-trip,
//! and no behavior attached to the types themselves.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClarificationExchange {
    pub question: String,
    pub answer: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TaskDraft {
    #[serde(default)]
    pub goal: String,
    #[serde(default)]
    pub research_focus: Vec<String>,
    #[serde(default)]
    pub project_info: Option<String>,
    #[serde(default)]
    pub clarification_responses: Vec<ClarificationExchange>,
    #[serde(default)]
    pub modification_notes: Vec<String>,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NextAction {
    StartResearch,
    NeedClarification,
    ConfirmPlan,
    VerifyTopic,
    CannotDo,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Task {
    #[serde(default)]
    pub goal: String,
    #[serde(default)]
    pub research_focus: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Clarification {
    pub question: String,
    #[serde(default)]
    pub options: Vec<String>,
    pub missing_info: String,
    pub open_ended: bool,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Block {
    pub reason: Option<String>,
    #[serde(default)]
    pub alternatives: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Plan {
    pub next_action: NextAction,
    #[serde(default)]
    pub task: Task,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub assumptions: Vec<String>,
    #[serde(default)]
    pub clarification: Option<Clarification>,
    #[serde(default)]
    pub confirm_prompt: Option<String>,
    #[serde(default)]
    pub unknown_topic: Option<String>,
    #[serde(default)]
    pub search_query: Option<String>,
    #[serde(default)]
    pub block: Option<Block>,
    #[serde(default)]
    pub why: String,
}

impl Plan {
    pub fn is_valid(&self) -> bool {
        if self.next_action == NextAction::NeedClarification {
            return self
                .clarification
                .as_ref()
                .map(|c| !c.question.is_empty())
                .unwrap_or(false);
        }
        true
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Subtask {
    pub id: u32,
    pub focus: String,
    #[serde(default)]
    pub queries: Vec<String>,
    #[serde(default = "default_true")]
    pub parallel: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    SearchResult,
    DetailedContent,
    Other,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Source {
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub snippet: Option<String>,
    #[serde(default)]
    pub source_type: Option<SourceType>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SubtaskResult {
    pub subtask_id: u32,
    pub focus: String,
    #[serde(default)]
    pub findings: Vec<String>,
    #[serde(default)]
    pub sources: Vec<Source>,
    #[serde(default)]
    pub confidence: f64,
}

impl SubtaskResult {
    /// A well-formed placeholder produced on any worker failure path.
    pub fn placeholder(subtask_id: u32, focus: impl Into<String>, confidence: f64, note: &str) -> Self {
        Self {
            subtask_id,
            focus: focus.into(),
            findings: vec![note.to_string()],
            sources: Vec::new(),
            confidence: confidence.clamp(0.0, 0.95),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ResearchResult {
    pub goal: String,
    pub research_focus: Vec<String>,
    pub findings: HashMap<String, SubtaskResult>,
    pub synthesis: String,
    #[serde(default)]
    pub citations: Vec<String>,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConversationMode {
    Research,
    Chat,
}

impl Default for ConversationMode {
    fn default() -> Self {
        ConversationMode::Research
    }
}

/// A single stage of orchestrator progress, delivered to an injected callback.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Progress {
    pub stage: ProgressStage,
    pub message: String,
    #[serde(default)]
    pub detail: Option<String>,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStage {
    Planning,
    Searching,
    Synthesizing,
    Complete,
    Error,
}

/// Raw search-provider result, before scenario ranking.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub link: String,
    #[serde(default)]
    pub snippet: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub organic: Vec<SearchHit>,
}
