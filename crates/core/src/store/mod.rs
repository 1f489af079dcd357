//! Data Store seam. The core only depends on this read/write contract;
//! storage mechanics (pooling, schema tuning, deletion/retention) stay with
//! the implementation. Two are bundled: [`memory::MemoryStore`] and the
//! sqlx-backed [`postgres::PgStore`].

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use uuid::Uuid;

use crate::errors::CoreError;
use crate::models::{ConversationTurn, EvaluationReport, Session, SessionFilter};

#[async_trait]
pub trait DataStore: Send + Sync {
    /// Insert-or-update keyed by session id.
    async fn save_session(&self, session: &Session) -> Result<(), CoreError>;

    async fn get_session(&self, id: Uuid) -> Result<Session, CoreError>;

    /// Sorted by creation time descending, paginated by offset/limit.
    async fn list_sessions(
        &self,
        filter: &SessionFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Session>, CoreError>;

    async fn append_turn(&self, turn: &ConversationTurn) -> Result<(), CoreError>;

    /// Sorted by timestamp ascending.
    async fn get_turns(&self, session_id: Uuid) -> Result<Vec<ConversationTurn>, CoreError>;

    /// Upsert keyed by session id — one report per session, ever.
    async fn save_evaluation(&self, report: &EvaluationReport) -> Result<(), CoreError>;

    async fn get_evaluation(&self, session_id: Uuid)
        -> Result<Option<EvaluationReport>, CoreError>;
}

pub use memory::MemoryStore;
pub use postgres::PgStore;
