// Evaluation pipeline: competency analysis, feedback generation, local
// communication-mode analysis, improvement plan. All LLM calls go through the
// gateway trait — no direct provider calls here.

pub mod modes;
pub mod pipeline;
pub mod prompts;

pub use pipeline::EvaluationPipeline;
