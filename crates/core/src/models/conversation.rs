use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Who produced a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnRole {
    Interviewer,
    Candidate,
}

impl TurnRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            TurnRole::Interviewer => "interviewer",
            TurnRole::Candidate => "candidate",
        }
    }

    pub fn parse(s: &str) -> Option<TurnRole> {
        match s {
            "interviewer" => Some(TurnRole::Interviewer),
            "candidate" => Some(TurnRole::Candidate),
            _ => None,
        }
    }
}

/// One message exchange unit. Append-only; ordering by `created_at` is the
/// sole consistency requirement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub id: Uuid,
    pub session_id: Uuid,
    pub role: TurnRole,
    pub content: String,
    /// Optional attachment references, e.g. `{"attachments": ["wb:abc"]}`.
    pub metadata: Option<Value>,
    pub created_at: DateTime<Utc>,
}

impl ConversationTurn {
    pub fn new(session_id: Uuid, role: TurnRole, content: impl Into<String>) -> Self {
        ConversationTurn {
            id: Uuid::new_v4(),
            session_id,
            role,
            content: content.into(),
            metadata: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_attachments(mut self, attachments: &[String]) -> Self {
        if !attachments.is_empty() {
            self.metadata = Some(serde_json::json!({ "attachments": attachments }));
        }
        self
    }
}
