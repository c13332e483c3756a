//! Orchestrator (C9): drives Clarifier → Planner → Pool → Synthesizer with
//! progress callbacks, per the pipeline pseudocode in §4.9.

use crate::capabilities::{ChatModel, PageFetcher, WebSearch};
use crate::clarifier;
use crate::config::EngineConfig;
use crate::planner;
use crate::pool::Pool;
use crate::session::SessionState;
use crate::types::{NextAction, Plan, Progress, ProgressStage, ResearchResult};
use crate::worker::Worker;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info};

pub type ProgressCallback = Box<dyn Fn(Progress) + Send + Sync>;

/// Resource allocation by focus count (§1B), widening `max_turns` for
/// richer tasks without ever narrowing below the configured default.
fn allocate_max_turns(config: &EngineConfig, num_focus: usize) -> u32 {
    let widened = if num_focus <= 2 {
        config.max_agent_turns
    } else if num_focus <= 4 {
        config.max_agent_turns + 1
    } else {
        config.max_agent_turns + 2
    };
    widened.max(config.max_agent_turns)
}

fn emit(callback: Option<&ProgressCallback>, stage: ProgressStage, message: &str, detail: Option<String>) {
    if let Some(cb) = callback {
        cb(Progress {
            stage,
            message: message.to_string(),
            detail,
        });
    }
}

pub struct Engine {
    pub chat: Arc<dyn ChatModel>,
    pub search: Arc<dyn WebSearch>,
    pub fetcher: Arc<dyn PageFetcher>,
    pub config: EngineConfig,
}

impl Engine {
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

    /// Runs one conversational turn for a session, per the §4.9 pseudocode.
    /// Returns the clarifier's plan, and a research report when the
    /// pipeline reached `START_RESEARCH` and produced usable results.
    pub async fn run_turn(
        &self,
        message: &str,
        state: &mut SessionState,
        progress: Option<ProgressCallback>,
    ) -> (Plan, Option<ResearchResult>) {
        state.add_user(message);

        emit(progress.as_ref(), ProgressStage::Planning, "assessing request", None);
        let mut plan = clarifier::assess(self.chat.as_ref(), Some(self.search.as_ref()), message, state).await;

        match plan.next_action {
            NextAction::NeedClarification | NextAction::ConfirmPlan | NextAction::CannotDo => {
                return (plan, None);
            }
            NextAction::VerifyTopic => {
                if let Some(query) = plan.search_query.clone() {
                    if let Ok(hits) = self.search.query(&query, 5).await {
                        let evidence = hits
                            .iter()
                            .map(|h| format!("{}: {}", h.title, h.snippet))
                            .collect::<Vec<_>>()
                            .join("\n");
                        state.add_assistant(format!("(system evidence)\n{evidence}"));
                    }
                }
                plan = clarifier::assess(self.chat.as_ref(), Some(self.search.as_ref()), message, state).await;
                if plan.next_action != NextAction::StartResearch {
                    return (plan, None);
                }
            }
            NextAction::StartResearch => {}
        }

        emit(progress.as_ref(), ProgressStage::Searching, "decomposing and dispatching subtasks", None);

        let subtasks = planner::decompose(self.chat.as_ref(), &plan.task).await;
        if subtasks.is_empty() {
            error!("orchestrator: planner produced zero subtasks even after fallback");
            emit(progress.as_ref(), ProgressStage::Error, "no subtasks could be produced", None);
            return (plan, None);
        }

        let worker = Worker::new(self.chat.clone(), self.search.clone(), self.fetcher.clone(), self.config.clone());
        let pool = Pool::new(worker, &self.config);
        let max_turns = allocate_max_turns(&self.config, plan.task.research_focus.len());
        let results = pool.execute_parallel(&subtasks, max_turns).await;

        let usable: Vec<_> = results.iter().filter(|r| r.confidence > 0.0).cloned().collect();
        if usable.is_empty() {
            error!("orchestrator: all subtasks were dropped");
            emit(progress.as_ref(), ProgressStage::Error, "all research subtasks failed", None);
            return (plan, None);
        }

        emit(progress.as_ref(), ProgressStage::Synthesizing, "synthesizing findings", None);

        let synthesis_result = crate::synthesizer::synthesize(
            self.chat.as_ref(),
            &plan.task.goal,
            &plan.task.research_focus,
            &usable,
        )
        .await;

        let (synthesis, citations) = match synthesis_result {
            Ok(s) => s,
            Err(e) => {
                error!("orchestrator: synthesis failed: {}", e);
                emit(progress.as_ref(), ProgressStage::Error, "synthesis failed", Some(e.to_string()));
                return (plan, None);
            }
        };

        let findings: HashMap<String, crate::types::SubtaskResult> =
            usable.into_iter().map(|r| (r.focus.clone(), r)).collect();

        let research_result = ResearchResult {
            goal: plan.task.goal.clone(),
            research_focus: plan.task.research_focus.clone(),
            findings,
            synthesis,
            citations,
        };

        info!("orchestrator: research complete for goal '{}'", plan.task.goal);
        emit(progress.as_ref(), ProgressStage::Complete, "research complete", None);

        state.save_research_result(research_result.clone());
        (plan, Some(research_result))
    }
}
