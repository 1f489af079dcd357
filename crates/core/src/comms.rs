//! Communication Coordinator seam. Media capture and storage live outside the
//! core; the orchestrator only toggles modes around session start/end, and
//! pipeline stage 3 reads persisted artifact counts per mode. Mode toggling is
//! best-effort at the call sites — a mode failing to enable is logged and
//! excluded from the active set, never fatal.

use std::collections::HashMap;

use async_trait::async_trait;
use uuid::Uuid;

use crate::errors::CoreError;
use crate::models::CommunicationMode;

#[async_trait]
pub trait CommunicationCoordinator: Send + Sync {
    async fn enable_mode(&self, session_id: Uuid, mode: CommunicationMode)
        -> Result<(), CoreError>;

    async fn disable_mode(
        &self,
        session_id: Uuid,
        mode: CommunicationMode,
    ) -> Result<(), CoreError>;

    /// Count of persisted artifacts per mode for one session. Modes absent
    /// from the map are treated as zero.
    async fn get_artifact_counts(
        &self,
        session_id: Uuid,
    ) -> Result<HashMap<CommunicationMode, u32>, CoreError>;
}
