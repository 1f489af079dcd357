use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::session::CommunicationMode;

/// The fixed set of system-design skill dimensions scored per session.
/// Every evaluation carries exactly one score per competency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Competency {
    ProblemComprehension,
    RequirementsGathering,
    ArchitectureDesign,
    Scalability,
    TradeoffAnalysis,
    Communication,
    TechnicalDepth,
}

impl Competency {
    pub const ALL: [Competency; 7] = [
        Competency::ProblemComprehension,
        Competency::RequirementsGathering,
        Competency::ArchitectureDesign,
        Competency::Scalability,
        Competency::TradeoffAnalysis,
        Competency::Communication,
        Competency::TechnicalDepth,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Competency::ProblemComprehension => "problem_comprehension",
            Competency::RequirementsGathering => "requirements_gathering",
            Competency::ArchitectureDesign => "architecture_design",
            Competency::Scalability => "scalability",
            Competency::TradeoffAnalysis => "tradeoff_analysis",
            Competency::Communication => "communication",
            Competency::TechnicalDepth => "technical_depth",
        }
    }

    pub fn parse(s: &str) -> Option<Competency> {
        Competency::ALL.iter().copied().find(|c| c.as_str() == s)
    }
}

/// LLM self-reported confidence in a competency score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

/// Score for one competency. `score` is clamped to [0, 100] on construction
/// from LLM output; `evidence` holds verbatim transcript excerpts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompetencyScore {
    pub competency: Competency,
    pub score: f64,
    pub confidence: Confidence,
    pub evidence: Vec<String>,
}

impl CompetencyScore {
    /// The documented fallback entry: neutral score, low confidence, no
    /// evidence. Used when the analysis stage degrades or a parsed result
    /// omits a competency.
    pub fn fallback(competency: Competency) -> Self {
        CompetencyScore {
            competency,
            score: 50.0,
            confidence: Confidence::Low,
            evidence: vec![],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackCategory {
    WentWell,
    WentOkay,
    NeedsImprovement,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackItem {
    pub category: FeedbackCategory,
    pub description: String,
    pub evidence: Vec<String>,
}

/// One numbered step of the improvement plan. Step numbers are 1-based and
/// contiguous (renumbered after parsing, whatever the LLM emitted).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionItem {
    pub step: u32,
    pub description: String,
    pub resources: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImprovementPlan {
    /// Competency names, lowest scores first.
    pub priority_areas: Vec<String>,
    pub steps: Vec<ActionItem>,
    pub general_resources: Vec<String>,
}

/// Ordinal engagement assessment for one communication mode, derived locally
/// from persisted artifact counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngagementBand {
    None,
    Low,
    Present,
    Good,
    Excellent,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModeAssessment {
    pub mode: CommunicationMode,
    pub artifact_count: u32,
    pub band: EngagementBand,
    /// One descriptive string per mode, e.g. "no snapshots" or
    /// "excellent whiteboard engagement (12 snapshots)".
    pub assessment: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModeAnalysis {
    pub assessments: Vec<ModeAssessment>,
    pub summary: String,
}

/// The complete evaluation of one session. Created once per session; later
/// runs upsert over the same session id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub session_id: Uuid,
    /// Mean of the 7 competency scores, rounded to two decimals.
    pub overall_score: f64,
    pub competency_scores: Vec<CompetencyScore>,
    pub went_well: Vec<FeedbackItem>,
    pub went_okay: Vec<FeedbackItem>,
    pub needs_improvement: Vec<FeedbackItem>,
    pub improvement_plan: ImprovementPlan,
    pub mode_analysis: ModeAnalysis,
    /// True when at least one LLM stage exhausted its retries and fell back
    /// to documented defaults.
    pub degraded: bool,
    pub created_at: DateTime<Utc>,
}

/// Arithmetic mean of competency scores, rounded half-up to two decimals.
pub fn overall_score(scores: &[CompetencyScore]) -> f64 {
    if scores.is_empty() {
        return 0.0;
    }
    let mean = scores.iter().map(|s| s.score).sum::<f64>() / scores.len() as f64;
    (mean * 100.0).round() / 100.0
}
