use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// One channel of candidate interaction, toggled per session. Closed set —
/// match exhaustiveness is the point, no open-ended mode strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommunicationMode {
    Text,
    Audio,
    Video,
    Whiteboard,
    Screen,
}

impl CommunicationMode {
    pub const ALL: [CommunicationMode; 5] = [
        CommunicationMode::Text,
        CommunicationMode::Audio,
        CommunicationMode::Video,
        CommunicationMode::Whiteboard,
        CommunicationMode::Screen,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CommunicationMode::Text => "text",
            CommunicationMode::Audio => "audio",
            CommunicationMode::Video => "video",
            CommunicationMode::Whiteboard => "whiteboard",
            CommunicationMode::Screen => "screen",
        }
    }
}

impl fmt::Display for CommunicationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Session lifecycle status. Transitions only through the orchestrator:
/// Created → Active → {Paused ↔ Active} → Completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Created,
    Active,
    Paused,
    Completed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Created => "created",
            SessionStatus::Active => "active",
            SessionStatus::Paused => "paused",
            SessionStatus::Completed => "completed",
        }
    }

    pub fn parse(s: &str) -> Option<SessionStatus> {
        match s {
            "created" => Some(SessionStatus::Created),
            "active" => Some(SessionStatus::Active),
            "paused" => Some(SessionStatus::Paused),
            "completed" => Some(SessionStatus::Completed),
            _ => None,
        }
    }

    /// Legal transition table. Completed is terminal.
    pub fn can_transition_to(&self, next: SessionStatus) -> bool {
        use SessionStatus::*;
        matches!(
            (self, next),
            (Created, Active)
                | (Active, Paused)
                | (Paused, Active)
                | (Active, Completed)
                | (Paused, Completed)
        )
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable configuration snapshot, frozen once the session leaves Created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    pub enabled_modes: Vec<CommunicationMode>,
    pub provider: String,
    pub model: String,
    /// Opaque reference to extracted resume text (extraction is external).
    pub resume_ref: Option<String>,
    pub target_duration_minutes: u32,
}

/// One complete interview attempt by one candidate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub status: SessionStatus,
    pub config: SessionConfig,
    /// Free-form metadata. The orchestrator records the post-enable active
    /// mode set here under `"active_modes"`.
    pub metadata: HashMap<String, Value>,
    pub created_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

/// Filter for `list_sessions`. Empty filter matches everything.
#[derive(Debug, Clone, Default)]
pub struct SessionFilter {
    pub owner_id: Option<Uuid>,
    pub status: Option<SessionStatus>,
}
