pub mod conversation;
pub mod report;
pub mod session;

pub use conversation::{ConversationTurn, TurnRole};
pub use report::{
    ActionItem, Competency, CompetencyScore, Confidence, EngagementBand, EvaluationReport,
    FeedbackCategory, FeedbackItem, ImprovementPlan, ModeAnalysis, ModeAssessment,
};
pub use session::{CommunicationMode, Session, SessionConfig, SessionFilter, SessionStatus};
