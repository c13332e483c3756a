//! Planner (C6): task decomposition.
//!
//! Grounded in `original_source/src/clarifyagent/planner.py`'s
//! `decompose_task`/`_extract_json` (balanced-brace-then-whole-text JSON
//! extraction) and `[PLANNER] Created {n} subtasks` logging convention.

use crate::capabilities::ChatModel;
use crate::config::ModelTier;
use crate::error::PlannerError;
use crate::types::{Subtask, Task};
use serde::Deserialize;
use tracing::info;

#[derive(Deserialize)]
struct RawSubtask {
    #[serde(default)]
    id: Option<u32>,
    focus: String,
    #[serde(default)]
    queries: Vec<String>,
}

fn extract_json_array(text: &str) -> Option<String> {
    if let Ok(v) = serde_json::from_str::<serde_json::Value>(text) {
        if v.is_array() {
            return Some(text.to_string());
        }
    }
    let start = text.find('[')?;
    let end = text.rfind(']')?;
    if end < start {
        return None;
    }
    Some(text[start..=end].to_string())
}

fn prompt_for(task: &Task) -> String {
    format!(
        "Decompose this research goal into independent subtasks. Goal: {}\nFocus areas: {}\n\
         Return a JSON array of objects: [{{\"focus\": str, \"queries\": [str, ...]}}, ...]",
        task.goal,
        task.research_focus.join(", ")
    )
}

/// Decomposes `task` into subtasks via the chat model; falls back to one
/// subtask per `research_focus` entry on any validation failure or parse
/// error, per §4.6.
pub async fn decompose(chat: &dyn ChatModel, task: &Task) -> Vec<Subtask> {
    let prompt = prompt_for(task);
    let reply = match chat.complete(ModelTier::Quality, &prompt).await {
        Ok(r) => r,
        Err(e) => {
            info!("planner: model call failed ({}), falling back to one-per-focus", e);
            return fallback(task);
        }
    };

    match parse_and_validate(&reply) {
        Ok(subtasks) if !subtasks.is_empty() => {
            info!("[PLANNER] Created {} subtasks", subtasks.len());
            subtasks
        }
        Ok(_) => {
            info!("planner: model returned zero valid subtasks, falling back");
            fallback(task)
        }
        Err(e) => {
            info!("planner: {}, falling back to one-per-focus", e);
            fallback(task)
        }
    }
}

fn parse_and_validate(reply: &str) -> Result<Vec<Subtask>, PlannerError> {
    let json_text = extract_json_array(reply).ok_or_else(|| PlannerError::ParseError(reply.to_string()))?;
    let raw: Vec<RawSubtask> =
        serde_json::from_str(&json_text).map_err(|e| PlannerError::ParseError(e.to_string()))?;

    if raw.is_empty() {
        return Err(PlannerError::Empty);
    }

    let mut subtasks = Vec::new();
    for (idx, r) in raw.into_iter().enumerate() {
        if r.focus.trim().is_empty() || r.queries.is_empty() {
            continue;
        }
        subtasks.push(Subtask {
            id: r.id.unwrap_or(idx as u32),
            focus: r.focus,
            queries: r.queries,
            parallel: true,
        });
    }

    if subtasks.is_empty() {
        return Err(PlannerError::Empty);
    }
    Ok(subtasks)
}

fn fallback(task: &Task) -> Vec<Subtask> {
    task.research_focus
        .iter()
        .enumerate()
        .map(|(idx, focus)| Subtask {
            id: idx as u32,
            focus: focus.clone(),
            queries: vec![format!("{} {}", task.goal, focus)],
            parallel: true,
        })
        .collect()
}
