//! Core research orchestration engine.
//!
//! A deep-research assistant's clarification gate, planner, bounded worker
//! pool, and synthesizer — presentation-layer agnostic and capability
//! injected (`ChatModel`/`WebSearch`/`PageFetcher`). See `SPEC_FULL.md` and
//! `DESIGN.md` at the repository root for the requirements this crate
//! implements and the grounding behind each module.

pub mod capabilities;
pub mod clarifier;
pub mod confidence;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod planner;
pub mod pool;
pub mod scenario;
pub mod session;
pub mod synthesizer;
pub mod types;
pub mod url_validate;
pub mod worker;

pub use config::{EngineConfig, EngineFileConfig, ModelTier};
pub use orchestrator::{Engine, ProgressCallback};
pub use session::{SessionState, SessionStore};
