//! MARAG Context Engine
//!
//! Adaptive retrieval-and-generation:
//! - Routing between the document index and web search
//! - Per-passage relevance filtering
//! - Query rewriting and escalation to web search
//! - Answer synthesis with grounding and adequacy checks
//! - A bounded, cancellable state machine sequencing all of the above

pub mod grading;
pub mod judgment;
pub mod orchestrator;
pub mod policy;
pub mod rewriter;
pub mod router;
pub mod state;
pub mod synthesizer;
pub mod tool;

pub use judgment::{Judge, JudgmentRequest, JudgmentResponse, LlmJudge};
pub use orchestrator::{Answer, Orchestrator, RunOutcome};
pub use policy::{Phase, Transition};
pub use state::RunState;
pub use tool::ToolRegistry;
