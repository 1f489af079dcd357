//! Viva core — interview session orchestration and evaluation.
//!
//! Two components make up the core: the [`orchestrator::SessionOrchestrator`]
//! (the state machine that owns session lifecycle and is the only writer of
//! session status) and the [`evaluation::EvaluationPipeline`] (the multi-stage
//! LLM pipeline that scores competencies, generates feedback, and builds an
//! improvement plan at session end).
//!
//! Everything outside those two — media capture, resume extraction, the
//! presentation layer, storage mechanics — is reached through the narrow
//! traits in [`llm`], [`comms`], [`interviewer`], and [`store`]. Embedders
//! inject implementations; the in-memory store and the Anthropic gateway are
//! the batteries included here.

pub mod comms;
pub mod config;
pub mod errors;
pub mod evaluation;
pub mod interviewer;
pub mod json_extract;
pub mod llm;
pub mod models;
pub mod orchestrator;
pub mod retry;
pub mod store;

pub use config::Config;
pub use errors::CoreError;
pub use evaluation::EvaluationPipeline;
pub use orchestrator::SessionOrchestrator;
