//! Conversational session state (C10).
//!
//! Grounded in `original_source/src/clarifyagent/dialog.py`'s `SessionState`
//! dataclass and its `is_new_research_task` / `is_simple_followup` /
//! `start_new_research_session` helpers. The storage collaborator itself
//! (`SessionStore`) is an opaque trait per the spec's Non-goal excluding
//! durable storage from this engine's scope.

use crate::types::{ClarificationExchange, ConversationMode, Message, ResearchResult, TaskDraft};
use async_trait::async_trait;

/// Single-writer per-session state. A session is created on first request
/// and destroyed on explicit clear — there is no idle-timeout eviction here.
#[derive(Clone, Debug, Default)]
pub struct SessionState {
    pub messages: Vec<Message>,
    pub task_draft: TaskDraft,
    /// Clarification round-trips for the current draft (§3 expansion).
    pub asked: u32,
    pub last_research_result: Option<ResearchResult>,
    pub conversation_mode: ConversationMode,
    pub research_history: Vec<ResearchResult>,
}

impl SessionState {
    pub fn add_user(&mut self, content: impl Into<String>) {
        self.messages.push(Message::user(content));
    }

    pub fn add_assistant(&mut self, content: impl Into<String>) {
        self.messages.push(Message::assistant(content));
    }

    pub fn add_clarification(&mut self, question: impl Into<String>, answer: impl Into<String>) {
        self.asked += 1;
        self.task_draft
            .clarification_responses
            .push(ClarificationExchange {
                question: question.into(),
                answer: answer.into(),
            });
    }

    pub fn update_task_draft(&mut self, draft: TaskDraft) {
        self.task_draft = draft;
    }

    pub fn save_research_result(&mut self, result: ResearchResult) {
        self.last_research_result = Some(result);
        self.conversation_mode = ConversationMode::Chat;
    }
}

/// Snapshots the last result into history and resets the draft for a fresh task.
pub fn start_new_research_session(state: &mut SessionState) {
    if let Some(result) = state.last_research_result.take() {
        state.research_history.push(result);
    }
    state.task_draft = TaskDraft::default();
    state.asked = 0;
    state.conversation_mode = ConversationMode::Research;
}

const NEW_TASK_INDICATORS: &[&str] = &[
    "new research",
    "different topic",
    "start over",
    "forget that",
    "instead, research",
    "another topic",
    "switch to",
];

const DOMAIN_KEYWORDS: &[&str] = &[
    "research",
    "investigate",
    "analyze",
    "compare",
    "find out",
    "explore",
    "study",
];

/// Strong-indicator keyword match, or a long message that also carries a
/// domain keyword — both heuristics from `dialog.py::is_new_research_task`.
pub fn is_new_research_task(message: &str, _state: &SessionState) -> bool {
    let lower = message.to_lowercase();
    if NEW_TASK_INDICATORS.iter().any(|kw| lower.contains(kw)) {
        return true;
    }
    lower.split_whitespace().count() > 15 && DOMAIN_KEYWORDS.iter().any(|kw| lower.contains(kw))
}

const SIMPLE_QUESTION_WORDS: &[&str] = &["what", "why", "how", "when", "where", "who", "which"];

const FOLLOWUP_PATTERNS: &[&str] = &[
    "tell me more",
    "can you elaborate",
    "what about",
    "and what",
    "also,",
    "follow up",
    "expand on",
];

/// Gated on chat mode with a prior result present, per `dialog.py::is_simple_followup`.
pub fn is_simple_followup(message: &str, state: &SessionState) -> bool {
    if state.conversation_mode != ConversationMode::Chat || state.last_research_result.is_none() {
        return false;
    }
    if is_new_research_task(message, state) {
        return false;
    }

    let lower = message.to_lowercase();
    let word_count = lower.split_whitespace().count();

    if word_count <= 8 && SIMPLE_QUESTION_WORDS.iter().any(|w| lower.starts_with(w)) {
        return true;
    }

    FOLLOWUP_PATTERNS.iter().any(|p| lower.contains(p))
}

/// Opaque session storage collaborator. Durable persistence is out of scope
/// for this engine — callers supply whatever backing store fits their
/// deployment (in-memory map, Redis, etc).
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, session_id: &str) -> anyhow::Result<Option<SessionState>>;
    async fn put(&self, session_id: &str, state: SessionState) -> anyhow::Result<()>;
    async fn delete(&self, session_id: &str) -> anyhow::Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chat_state_with_result() -> SessionState {
        let mut state = SessionState::default();
        state.conversation_mode = ConversationMode::Chat;
        state.last_research_result = Some(ResearchResult {
            goal: "test".into(),
            research_focus: vec![],
            findings: Default::default(),
            synthesis: "done".into(),
            citations: vec![],
        });
        state
    }

    #[test]
    fn new_task_strong_indicator_detected() {
        let state = SessionState::default();
        assert!(is_new_research_task("let's start over with a new research topic", &state));
    }

    #[test]
    fn new_task_long_message_with_domain_keyword() {
        let state = SessionState::default();
        let msg = "I would like you to research the history and economic impact of renewable energy adoption across Europe";
        assert!(is_new_research_task(msg, &state));
    }

    #[test]
    fn short_unrelated_message_is_not_new_task() {
        let state = SessionState::default();
        assert!(!is_new_research_task("thanks, that helps", &state));
    }

    #[test]
    fn simple_followup_requires_chat_mode_and_prior_result() {
        let state = SessionState::default();
        assert!(!is_simple_followup("what about costs?", &state));
    }

    #[test]
    fn simple_followup_detects_short_question() {
        let state = chat_state_with_result();
        assert!(is_simple_followup("why is that?", &state));
    }

    #[test]
    fn simple_followup_detects_followup_pattern() {
        let state = chat_state_with_result();
        assert!(is_simple_followup("can you elaborate on the second point", &state));
    }

    #[test]
    fn new_task_overrides_followup_classification() {
        let state = chat_state_with_result();
        assert!(!is_simple_followup("actually, start over with a new research topic", &state));
    }

    #[test]
    fn start_new_research_session_snapshots_and_resets() {
        let mut state = chat_state_with_result();
        state.task_draft.goal = "old goal".into();
        start_new_research_session(&mut state);
        assert_eq!(state.research_history.len(), 1);
        assert!(state.last_research_result.is_none());
        assert_eq!(state.task_draft.goal, "");
        assert_eq!(state.conversation_mode, ConversationMode::Research);
    }
}
