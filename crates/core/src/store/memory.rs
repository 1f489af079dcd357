//! In-memory `DataStore`. The default for embedders that do not need
//! durability, and the backbone of the core's own tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;

use crate::errors::CoreError;
use crate::models::{ConversationTurn, EvaluationReport, Session, SessionFilter};
use crate::store::DataStore;

#[derive(Default)]
struct Inner {
    sessions: HashMap<Uuid, Session>,
    turns: HashMap<Uuid, Vec<ConversationTurn>>,
    evaluations: HashMap<Uuid, EvaluationReport>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DataStore for MemoryStore {
    async fn save_session(&self, session: &Session) -> Result<(), CoreError> {
        let mut inner = self.inner.lock().expect("store mutex poisoned");
        inner.sessions.insert(session.id, session.clone());
        Ok(())
    }

    async fn get_session(&self, id: Uuid) -> Result<Session, CoreError> {
        let inner = self.inner.lock().expect("store mutex poisoned");
        inner
            .sessions
            .get(&id)
            .cloned()
            .ok_or_else(|| CoreError::NotFound(format!("session {id}")))
    }

    async fn list_sessions(
        &self,
        filter: &SessionFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Session>, CoreError> {
        let inner = self.inner.lock().expect("store mutex poisoned");
        let mut sessions: Vec<Session> = inner
            .sessions
            .values()
            .filter(|s| filter.owner_id.map_or(true, |o| s.owner_id == o))
            .filter(|s| filter.status.map_or(true, |st| s.status == st))
            .cloned()
            .collect();
        sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(sessions
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn append_turn(&self, turn: &ConversationTurn) -> Result<(), CoreError> {
        let mut inner = self.inner.lock().expect("store mutex poisoned");
        inner
            .turns
            .entry(turn.session_id)
            .or_default()
            .push(turn.clone());
        Ok(())
    }

    async fn get_turns(&self, session_id: Uuid) -> Result<Vec<ConversationTurn>, CoreError> {
        let inner = self.inner.lock().expect("store mutex poisoned");
        let mut turns = inner.turns.get(&session_id).cloned().unwrap_or_default();
        turns.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(turns)
    }

    async fn save_evaluation(&self, report: &EvaluationReport) -> Result<(), CoreError> {
        let mut inner = self.inner.lock().expect("store mutex poisoned");
        inner.evaluations.insert(report.session_id, report.clone());
        Ok(())
    }

    async fn get_evaluation(
        &self,
        session_id: Uuid,
    ) -> Result<Option<EvaluationReport>, CoreError> {
        let inner = self.inner.lock().expect("store mutex poisoned");
        Ok(inner.evaluations.get(&session_id).cloned())
    }
}
