//! Worker pool (C5): bounded parallel dispatch with partial-failure
//! isolation and an adaptive concurrency controller.
//!
//! Grounded in the teacher's `batch_scrape.rs` `buffer_unordered` batching
//! pattern and its wall-clock-timing log style, generalized from scrape
//! jobs to research subtasks.

use crate::config::EngineConfig;
use crate::types::{Subtask, SubtaskResult};
use crate::worker::Worker;
use futures::stream::{self, StreamExt};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{info, warn};

const ADAPT_WINDOW: usize = 50;
const ADAPT_INTERVAL: Duration = Duration::from_secs(30);
const FLOOR: usize = 1;
const CEILING: usize = 8;

#[derive(Default)]
struct Sample {
    elapsed: Duration,
    is_error: bool,
}

/// Rolling-window stats feeding the adaptive concurrency decision. Both
/// error-rate and latency are tracked over the same ≤50-sample window
/// (§4.5 Implementation note — resolves the source system's inconsistent
/// windowing of these two statistics).
struct AdaptiveState {
    samples: VecDeque<Sample>,
    max_parallel: usize,
    last_adjustment: Option<Instant>,
}

pub struct Pool {
    worker: Arc<Worker>,
    configured_max_parallel: usize,
    state: Mutex<AdaptiveState>,
}

impl Pool {
    pub fn new(worker: Worker, config: &EngineConfig) -> Self {
        Self {
            worker: Arc::new(worker),
            configured_max_parallel: config.max_parallel_subagents,
            state: Mutex::new(AdaptiveState {
                samples: VecDeque::with_capacity(ADAPT_WINDOW),
                max_parallel: config.max_parallel_subagents,
                last_adjustment: None,
            }),
        }
    }

    async fn current_max_parallel(&self) -> usize {
        self.state.lock().await.max_parallel
    }

    /// Dispatches all subtasks, gathering with partial-failure capture: a
    /// subtask whose worker task panics still yields a placeholder at its
    /// position (confidence 0.0), preserving order and never aborting its
    /// peers. Each dispatch runs in its own spawned task specifically so one
    /// worker panicking cannot unwind through the others.
    pub async fn execute_parallel(&self, subtasks: &[Subtask], max_turns: u32) -> Vec<SubtaskResult> {
        let max_parallel = self.current_max_parallel().await.max(1);
        let worker = self.worker.clone();

        let results: Vec<(usize, SubtaskResult, Duration, bool)> = stream::iter(subtasks.iter().cloned().enumerate())
            .map(|(idx, subtask)| {
                let worker = worker.clone();
                async move {
                    let start = Instant::now();
                    let subtask_id = subtask.id;
                    let focus = subtask.focus.clone();
                    let handle = tokio::spawn(async move { worker.run(&subtask, max_turns).await });
                    let elapsed_so_far = start.elapsed();

                    match handle.await {
                        Ok(result) => {
                            let elapsed = start.elapsed();
                            let is_error = result.confidence < 0.35;
                            info!(subtask_id, elapsed_ms = elapsed.as_millis() as u64, "worker dispatch complete");
                            (idx, result, elapsed, is_error)
                        }
                        Err(join_err) => {
                            warn!(subtask_id, "worker task panicked: {}", join_err);
                            let placeholder = SubtaskResult {
                                subtask_id,
                                focus,
                                findings: vec!["worker task panicked".to_string()],
                                sources: Vec::new(),
                                confidence: 0.0,
                            };
                            (idx, placeholder, elapsed_so_far, true)
                        }
                    }
                }
            })
            .buffer_unordered(max_parallel)
            .collect()
            .await;

        let mut ordered: Vec<Option<SubtaskResult>> = (0..subtasks.len()).map(|_| None).collect();
        for (idx, result, elapsed, is_error) in results {
            self.record_sample(elapsed, is_error).await;
            ordered[idx] = Some(result);
        }

        self.maybe_adjust().await;

        ordered
            .into_iter()
            .enumerate()
            .map(|(idx, r)| {
                r.unwrap_or_else(|| {
                    SubtaskResult::placeholder(subtasks[idx].id, &subtasks[idx].focus, 0.0, "worker dispatch failed")
                })
            })
            .collect()
    }

    async fn record_sample(&self, elapsed: Duration, is_error: bool) {
        let mut state = self.state.lock().await;
        if state.samples.len() >= ADAPT_WINDOW {
            state.samples.pop_front();
        }
        state.samples.push_back(Sample { elapsed, is_error });
    }

    async fn maybe_adjust(&self) {
        let mut state = self.state.lock().await;
        if state.samples.is_empty() {
            return;
        }
        if let Some(last) = state.last_adjustment {
            if last.elapsed() < ADAPT_INTERVAL {
                return;
            }
        }

        let n = state.samples.len() as f64;
        let error_rate = state.samples.iter().filter(|s| s.is_error).count() as f64 / n;
        let avg_latency = state.samples.iter().map(|s| s.elapsed.as_secs_f64()).sum::<f64>() / n;

        let before = state.max_parallel;
        if error_rate > 0.10 || avg_latency > 15.0 {
            state.max_parallel = state.max_parallel.saturating_sub(1).max(FLOOR);
        } else if error_rate < 0.05 && avg_latency < 5.0 {
            state.max_parallel = (state.max_parallel + 1).min(CEILING).min(self.configured_max_parallel);
        }

        if state.max_parallel != before {
            info!(
                before,
                after = state.max_parallel,
                error_rate,
                avg_latency,
                "adaptive concurrency controller adjusted max_parallel"
            );
        }
        state.last_adjustment = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::{FakeChatModel, FakePageFetcher, FakeWebSearch};
    use std::sync::Arc as StdArc;

    fn make_pool() -> Pool {
        let chat = FakeChatModel::single(
            serde_json::json!({"findings": ["f"], "sources": [], "confidence": 0.6, "should_stop": true}).to_string(),
        );
        let search = StdArc::new(FakeWebSearch::empty());
        let fetcher = StdArc::new(FakePageFetcher::ok("x"));
        let worker = Worker::new(chat, search, fetcher, EngineConfig::default());
        Pool::new(worker, &EngineConfig::default())
    }

    fn subtasks(n: u32) -> Vec<Subtask> {
        (0..n)
            .map(|id| Subtask {
                id,
                focus: format!("focus-{id}"),
                queries: vec!["q".to_string()],
                parallel: true,
            })
            .collect()
    }

    #[tokio::test]
    async fn preserves_positional_order_across_batch() {
        let pool = make_pool();
        let tasks = subtasks(4);
        let results = pool.execute_parallel(&tasks, 2).await;
        assert_eq!(results.len(), 4);
        for (i, r) in results.iter().enumerate() {
            assert_eq!(r.subtask_id, i as u32);
        }
    }

    #[tokio::test]
    async fn batches_larger_than_max_parallel() {
        let pool = make_pool();
        let tasks = subtasks(12);
        let results = pool.execute_parallel(&tasks, 2).await;
        assert_eq!(results.len(), 12);
    }
}
