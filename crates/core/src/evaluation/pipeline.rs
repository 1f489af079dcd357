//! Evaluation pipeline — stateless function of a session id to a complete
//! `EvaluationReport`, in four stages:
//!
//! 1. competency analysis (LLM) → 2. feedback generation (LLM) →
//! 3. mode analysis (local, concurrent with 1–2) → 4. improvement plan (LLM).
//!
//! Each LLM stage retries with backoff through the shared utility and, on
//! exhaustion, substitutes its documented default and flags the report
//! degraded. The pipeline therefore always returns a complete report; only
//! store failures abort it. Persistence belongs to the orchestrator.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::comms::CommunicationCoordinator;
use crate::errors::CoreError;
use crate::evaluation::modes::analyze_modes;
use crate::evaluation::prompts::{
    COMPETENCY_PROMPT_TEMPLATE, COMPETENCY_SYSTEM, FEEDBACK_PROMPT_TEMPLATE, FEEDBACK_SYSTEM,
    PLAN_PROMPT_TEMPLATE, PLAN_SYSTEM,
};
use crate::json_extract::parse_json_object;
use crate::llm::{ChatMessage, LlmGateway};
use crate::models::report::overall_score;
use crate::models::{
    ActionItem, CommunicationMode, Competency, CompetencyScore, Confidence, ConversationTurn,
    EvaluationReport, FeedbackCategory, FeedbackItem, ImprovementPlan, ModeAnalysis, TurnRole,
};
use crate::retry::{retry_with_backoff, RetryPolicy};
use crate::store::DataStore;

/// How many of the lowest-scoring competencies the improvement plan targets.
const PLAN_FOCUS_COUNT: usize = 3;

// ────────────────────────────────────────────────────────────────────────────
// LLM response shapes
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct CompetencyAnalysisShape {
    scores: Vec<RawCompetencyScore>,
}

#[derive(Debug, Deserialize)]
struct RawCompetencyScore {
    competency: String,
    score: f64,
    confidence: Confidence,
    #[serde(default)]
    evidence: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct FeedbackShape {
    #[serde(default)]
    went_well: Vec<RawFeedbackItem>,
    #[serde(default)]
    went_okay: Vec<RawFeedbackItem>,
    #[serde(default)]
    needs_improvement: Vec<RawFeedbackItem>,
}

#[derive(Debug, Deserialize)]
struct RawFeedbackItem {
    description: String,
    #[serde(default)]
    evidence: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct PlanShape {
    steps: Vec<RawPlanStep>,
    #[serde(default)]
    general_resources: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawPlanStep {
    description: String,
    #[serde(default)]
    resources: Vec<String>,
}

// ────────────────────────────────────────────────────────────────────────────
// Pipeline
// ────────────────────────────────────────────────────────────────────────────

pub struct EvaluationPipeline {
    gateway: Arc<dyn LlmGateway>,
    store: Arc<dyn DataStore>,
    comms: Arc<dyn CommunicationCoordinator>,
    retry: RetryPolicy,
}

impl EvaluationPipeline {
    pub fn new(
        gateway: Arc<dyn LlmGateway>,
        store: Arc<dyn DataStore>,
        comms: Arc<dyn CommunicationCoordinator>,
    ) -> Self {
        EvaluationPipeline {
            gateway,
            store,
            comms,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Runs all four stages and assembles the report. Store failures abort;
    /// provider failures degrade.
    pub async fn run(&self, session_id: Uuid) -> Result<EvaluationReport, CoreError> {
        let session = self.store.get_session(session_id).await?;
        let turns = self.store.get_turns(session_id).await?;
        let transcript = format_transcript(&turns);

        info!(%session_id, turn_count = turns.len(), "evaluation pipeline started");

        // Stages 1→2 are chained; stage 3 has no data dependency on them.
        let llm_stages = async {
            let (scores, scores_degraded) = self.competency_stage(&transcript).await;
            let (feedback, feedback_degraded) = self.feedback_stage(&transcript, &scores).await;
            (scores, scores_degraded, feedback, feedback_degraded)
        };
        let mode_stage = self.mode_stage(session_id, &session.config.enabled_modes);

        let ((scores, scores_degraded, feedback, feedback_degraded), mode_analysis) =
            tokio::join!(llm_stages, mode_stage);

        let (plan, plan_degraded) = self.plan_stage(&scores).await;

        let degraded = scores_degraded || feedback_degraded || plan_degraded;
        if degraded {
            warn!(%session_id, "evaluation completed with degraded stages");
        } else {
            info!(%session_id, "evaluation completed");
        }

        let (went_well, went_okay, needs_improvement) = feedback;

        Ok(EvaluationReport {
            session_id,
            overall_score: overall_score(&scores),
            competency_scores: scores,
            went_well,
            went_okay,
            needs_improvement,
            improvement_plan: plan,
            mode_analysis,
            degraded,
            created_at: Utc::now(),
        })
    }

    // ── Stage 1: competency analysis ────────────────────────────────────────

    /// Returns the normalized 7-entry score list plus a degraded flag.
    async fn competency_stage(&self, transcript: &str) -> (Vec<CompetencyScore>, bool) {
        let prompt = COMPETENCY_PROMPT_TEMPLATE.replace("{transcript}", transcript);
        let result = self
            .call_stage::<CompetencyAnalysisShape>(COMPETENCY_SYSTEM, &prompt, "evaluation.competency")
            .await;

        match result {
            Ok(shape) => (normalize_scores(shape.scores), false),
            Err(e) => {
                warn!("competency analysis degraded to defaults: {e}");
                let fallback = Competency::ALL
                    .iter()
                    .map(|c| CompetencyScore::fallback(*c))
                    .collect();
                (fallback, true)
            }
        }
    }

    // ── Stage 2: feedback generation ────────────────────────────────────────

    async fn feedback_stage(
        &self,
        transcript: &str,
        scores: &[CompetencyScore],
    ) -> ((Vec<FeedbackItem>, Vec<FeedbackItem>, Vec<FeedbackItem>), bool) {
        let scores_json =
            serde_json::to_string_pretty(scores).unwrap_or_else(|_| "[]".to_string());
        let prompt = FEEDBACK_PROMPT_TEMPLATE
            .replace("{scores_json}", &scores_json)
            .replace("{transcript}", transcript);

        let result = self
            .call_stage::<FeedbackShape>(FEEDBACK_SYSTEM, &prompt, "evaluation.feedback")
            .await;

        match result {
            Ok(shape) => (
                (
                    materialize(shape.went_well, FeedbackCategory::WentWell),
                    materialize(shape.went_okay, FeedbackCategory::WentOkay),
                    materialize(shape.needs_improvement, FeedbackCategory::NeedsImprovement),
                ),
                false,
            ),
            Err(e) => {
                warn!("feedback generation degraded to defaults: {e}");
                (fallback_feedback(), true)
            }
        }
    }

    // ── Stage 3: communication-mode analysis (local) ────────────────────────

    async fn mode_stage(
        &self,
        session_id: Uuid,
        enabled: &[CommunicationMode],
    ) -> ModeAnalysis {
        let counts = match self.comms.get_artifact_counts(session_id).await {
            Ok(counts) => counts,
            Err(e) => {
                // Best-effort, like mode toggling: missing counts read as
                // zero rather than failing an otherwise-local stage.
                warn!(%session_id, "artifact counts unavailable, assuming zero: {e}");
                HashMap::new()
            }
        };
        analyze_modes(enabled, &counts)
    }

    // ── Stage 4: improvement plan ───────────────────────────────────────────

    async fn plan_stage(&self, scores: &[CompetencyScore]) -> (ImprovementPlan, bool) {
        let focus = lowest_competencies(scores, PLAN_FOCUS_COUNT);
        let focus_names: Vec<String> = focus.iter().map(|c| c.as_str().to_string()).collect();

        let scores_json =
            serde_json::to_string_pretty(scores).unwrap_or_else(|_| "[]".to_string());
        let prompt = PLAN_PROMPT_TEMPLATE
            .replace("{focus_areas}", &focus_names.join(", "))
            .replace("{scores_json}", &scores_json);

        let result = self
            .call_stage::<PlanShape>(PLAN_SYSTEM, &prompt, "evaluation.plan")
            .await;

        match result {
            Ok(shape) => {
                // Renumber whatever the model emitted: 1-based, contiguous.
                let steps = shape
                    .steps
                    .into_iter()
                    .enumerate()
                    .map(|(i, s)| ActionItem {
                        step: i as u32 + 1,
                        description: s.description,
                        resources: s.resources,
                    })
                    .collect();
                (
                    ImprovementPlan {
                        priority_areas: focus_names,
                        steps,
                        general_resources: shape.general_resources,
                    },
                    false,
                )
            }
            Err(e) => {
                warn!("improvement plan degraded to defaults: {e}");
                (fallback_plan(&focus_names), true)
            }
        }
    }

    /// One LLM-backed stage attempt chain: invoke → extract → parse, retried
    /// with backoff. The per-stage loop is sequential — a retry never starts
    /// while another attempt of the same stage is in flight.
    async fn call_stage<T: serde::de::DeserializeOwned>(
        &self,
        system: &str,
        prompt: &str,
        operation: &'static str,
    ) -> Result<T, CoreError> {
        let gateway = Arc::clone(&self.gateway);
        let messages = vec![ChatMessage::system(system), ChatMessage::user(prompt)];

        retry_with_backoff(self.retry, operation, move || {
            let gateway = Arc::clone(&gateway);
            let messages = messages.clone();
            async move {
                let reply = gateway.invoke(&messages, operation).await?;
                parse_json_object::<T>(&reply.text)
            }
        })
        .await
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Normalization and fallbacks
// ────────────────────────────────────────────────────────────────────────────

/// Formats the conversation as one prompt-ready transcript.
fn format_transcript(turns: &[ConversationTurn]) -> String {
    turns
        .iter()
        .map(|t| {
            let speaker = match t.role {
                TurnRole::Interviewer => "Interviewer",
                TurnRole::Candidate => "Candidate",
            };
            format!("{speaker}: {}", t.content)
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Normalizes parsed scores to exactly one entry per competency, in the
/// canonical order. Unknown competency names are dropped; missing ones are
/// filled with the default entry; scores are clamped to [0, 100].
fn normalize_scores(raw: Vec<RawCompetencyScore>) -> Vec<CompetencyScore> {
    let mut by_competency: HashMap<Competency, RawCompetencyScore> = HashMap::new();
    for entry in raw {
        match Competency::parse(&entry.competency) {
            Some(c) => {
                by_competency.entry(c).or_insert(entry);
            }
            None => warn!("dropping score for unknown competency '{}'", entry.competency),
        }
    }

    Competency::ALL
        .iter()
        .map(|c| match by_competency.remove(c) {
            Some(raw) => CompetencyScore {
                competency: *c,
                score: raw.score.clamp(0.0, 100.0),
                confidence: raw.confidence,
                evidence: raw.evidence,
            },
            None => {
                warn!("competency '{}' missing from analysis, using default", c.as_str());
                CompetencyScore::fallback(*c)
            }
        })
        .collect()
}

fn materialize(raw: Vec<RawFeedbackItem>, category: FeedbackCategory) -> Vec<FeedbackItem> {
    raw.into_iter()
        .map(|item| FeedbackItem {
            category,
            description: item.description,
            evidence: item.evidence,
        })
        .collect()
}

/// Documented default: one generic item per category.
fn fallback_feedback() -> (Vec<FeedbackItem>, Vec<FeedbackItem>, Vec<FeedbackItem>) {
    let item = |category, description: &str| {
        vec![FeedbackItem {
            category,
            description: description.to_string(),
            evidence: vec![],
        }]
    };
    (
        item(
            FeedbackCategory::WentWell,
            "Completed the interview and engaged with the problem end to end.",
        ),
        item(
            FeedbackCategory::WentOkay,
            "Responded to every interviewer prompt; depth varied across topics.",
        ),
        item(
            FeedbackCategory::NeedsImprovement,
            "Detailed feedback generation was unavailable for this session; review the transcript directly.",
        ),
    )
}

/// Documented default: a generic plan referencing the lowest-scored
/// competency names.
fn fallback_plan(focus_names: &[String]) -> ImprovementPlan {
    let steps = focus_names
        .iter()
        .enumerate()
        .map(|(i, name)| ActionItem {
            step: i as u32 + 1,
            description: format!(
                "Review the session transcript and identify where {name} fell short, then drill that area in your next practice session."
            ),
            resources: vec![],
        })
        .chain(std::iter::once(ActionItem {
            step: focus_names.len() as u32 + 1,
            description: "Schedule a follow-up mock interview focused on the areas above."
                .to_string(),
            resources: vec![],
        }))
        .collect();

    ImprovementPlan {
        priority_areas: focus_names.to_vec(),
        steps,
        general_resources: vec![
            "Designing Data-Intensive Applications (Kleppmann)".to_string(),
            "The System Design Primer (github.com/donnemartin/system-design-primer)".to_string(),
        ],
    }
}

/// The `count` lowest-scoring competencies, lowest first. Ties break on
/// canonical competency order for determinism.
fn lowest_competencies(scores: &[CompetencyScore], count: usize) -> Vec<Competency> {
    let mut sorted: Vec<&CompetencyScore> = scores.iter().collect();
    sorted.sort_by(|a, b| a.score.partial_cmp(&b.score).unwrap_or(std::cmp::Ordering::Equal));
    sorted.iter().take(count).map(|s| s.competency).collect()
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
