//! Typed error enums at component boundaries.
//!
//! Every component that the spec's error taxonomy names converts its own
//! failures into a well-formed `Ok` result before they reach a caller — these
//! enums exist for logging and for the handful of call sites that genuinely
//! cannot proceed (malformed config, a capability missing entirely).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClarifierError {
    #[error("clarifier model did not return parseable JSON: {0}")]
    ParseError(String),
    #[error("chat model call failed: {0}")]
    ModelError(#[from] anyhow::Error),
}

#[derive(Debug, Error)]
pub enum PlannerError {
    #[error("planner returned zero subtasks")]
    Empty,
    #[error("planner model did not return parseable JSON: {0}")]
    ParseError(String),
    #[error("chat model call failed: {0}")]
    ModelError(#[from] anyhow::Error),
}

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("tool call exceeded its deadline")]
    ToolTimeout,
    #[error("worker exceeded soft-exit deadline")]
    SoftExit,
    #[error("worker exceeded hard timeout")]
    HardTimeout,
    #[error("worker exhausted max_turns without finalizing")]
    MaxTurns,
    #[error("upstream provider error: {0}")]
    ProviderError(String),
}

#[derive(Debug, Error)]
pub enum SynthesizerError {
    #[error("synthesis payload exceeded size limit even after retry")]
    PayloadTooLarge,
    #[error("chat model call failed: {0}")]
    ModelError(#[from] anyhow::Error),
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("host '{0}' is on the deny-list")]
    Denylisted(String),
    #[error("fetch timed out after {0:?}")]
    Timeout(std::time::Duration),
    #[error("upstream returned HTTP {0}")]
    HttpStatus(u16),
    #[error("transport error: {0}")]
    Transport(String),
}

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("url failed validation: {0}")]
    InvalidUrl(String),
}

#[derive(Debug, Error)]
pub enum CapabilityError {
    #[error("provider timed out")]
    ProviderTimeout,
    #[error("provider error: {0}")]
    ProviderError(String),
    #[error("context too large: {0} chars")]
    ContextTooLarge(usize),
}
