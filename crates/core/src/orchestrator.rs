//! Session Orchestrator — the state machine over session lifecycle and the
//! only component that mutates session status.
//!
//! Flow: create_session → start_session (opening prompt + mode enable) →
//! submit_turn xN → [pause/resume] → end_session (mode teardown + evaluation
//! pipeline + persist + complete).
//!
//! The orchestrator is a stateless service over the injected `DataStore` —
//! no ambient "current session"; every call carries a session id. Mutating
//! operations on one session are serialized through a per-session lock so
//! concurrent turns can never interleave; different sessions proceed in
//! parallel.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{info, warn};
use uuid::Uuid;

use crate::comms::CommunicationCoordinator;
use crate::errors::CoreError;
use crate::evaluation::EvaluationPipeline;
use crate::interviewer::Interviewer;
use crate::models::{
    CommunicationMode, ConversationTurn, EvaluationReport, Session, SessionConfig, SessionFilter,
    SessionStatus, TurnRole,
};
use crate::store::DataStore;

pub struct SessionOrchestrator {
    store: Arc<dyn DataStore>,
    interviewer: Arc<dyn Interviewer>,
    comms: Arc<dyn CommunicationCoordinator>,
    pipeline: EvaluationPipeline,
    /// Per-session serialization points, created lazily. Entries are never
    /// reaped — a completed session's lock is a few words and keeps the
    /// idempotence errors cheap.
    locks: Mutex<HashMap<Uuid, Arc<AsyncMutex<()>>>>,
}

impl SessionOrchestrator {
    pub fn new(
        store: Arc<dyn DataStore>,
        interviewer: Arc<dyn Interviewer>,
        comms: Arc<dyn CommunicationCoordinator>,
        pipeline: EvaluationPipeline,
    ) -> Self {
        SessionOrchestrator {
            store,
            interviewer,
            comms,
            pipeline,
            locks: Mutex::new(HashMap::new()),
        }
    }

    fn lock_for(&self, id: Uuid) -> Arc<AsyncMutex<()>> {
        let mut locks = self.locks.lock().expect("lock map poisoned");
        Arc::clone(locks.entry(id).or_default())
    }

    // ── Lifecycle ───────────────────────────────────────────────────────────

    /// Validates the configuration, persists a Created session, returns it.
    pub async fn create_session(
        &self,
        owner_id: Uuid,
        config: SessionConfig,
    ) -> Result<Session, CoreError> {
        let config = validate_config(config)?;

        let session = Session {
            id: Uuid::new_v4(),
            owner_id,
            status: SessionStatus::Created,
            config,
            metadata: HashMap::new(),
            created_at: Utc::now(),
            ended_at: None,
        };
        self.store.save_session(&session).await?;
        info!(session_id = %session.id, %owner_id, "session created");
        Ok(session)
    }

    /// Created → Active: opening prompt, best-effort mode enable.
    pub async fn start_session(&self, id: Uuid) -> Result<Session, CoreError> {
        let lock = self.lock_for(id);
        let _guard = lock.lock().await;

        let mut session = self.store.get_session(id).await?;
        require_status(&session, &[SessionStatus::Created], "start")?;

        let opening = self
            .interviewer
            .start_interview(&session, session.config.resume_ref.as_deref())
            .await?;
        self.store
            .append_turn(&ConversationTurn::new(id, TurnRole::Interviewer, opening))
            .await?;

        // Best-effort: a mode that fails to enable is logged and excluded
        // from the active set, never fatal.
        let mut active_modes: Vec<CommunicationMode> = Vec::new();
        for mode in &session.config.enabled_modes {
            match self.comms.enable_mode(id, *mode).await {
                Ok(()) => active_modes.push(*mode),
                Err(e) => warn!(session_id = %id, %mode, "failed to enable mode: {e}"),
            }
        }
        session
            .metadata
            .insert("active_modes".to_string(), serde_json::json!(active_modes));

        session.status = SessionStatus::Active;
        self.store.save_session(&session).await?;
        info!(session_id = %id, active_modes = active_modes.len(), "session started");
        Ok(session)
    }

    /// Appends the candidate turn, gets the interviewer's follow-up, appends
    /// and returns it. Serialized per session to preserve turn ordering.
    pub async fn submit_turn(
        &self,
        id: Uuid,
        candidate_text: &str,
        attachments: &[String],
    ) -> Result<String, CoreError> {
        if candidate_text.trim().is_empty() {
            return Err(CoreError::Validation("candidate text is empty".to_string()));
        }

        let lock = self.lock_for(id);
        let _guard = lock.lock().await;

        let session = self.store.get_session(id).await?;
        require_status(&session, &[SessionStatus::Active], "submit a turn to")?;

        let history = self.store.get_turns(id).await?;
        self.store
            .append_turn(
                &ConversationTurn::new(id, TurnRole::Candidate, candidate_text)
                    .with_attachments(attachments),
            )
            .await?;

        let reply = self
            .interviewer
            .process_response(&session, &history, candidate_text, attachments)
            .await?;
        self.store
            .append_turn(&ConversationTurn::new(id, TurnRole::Interviewer, reply.clone()))
            .await?;

        Ok(reply)
    }

    /// Active → Paused. No component teardown on pause.
    pub async fn pause_session(&self, id: Uuid) -> Result<Session, CoreError> {
        self.transition(id, SessionStatus::Active, SessionStatus::Paused, "pause")
            .await
    }

    /// Paused → Active.
    pub async fn resume_session(&self, id: Uuid) -> Result<Session, CoreError> {
        self.transition(id, SessionStatus::Paused, SessionStatus::Active, "resume")
            .await
    }

    async fn transition(
        &self,
        id: Uuid,
        from: SessionStatus,
        to: SessionStatus,
        verb: &str,
    ) -> Result<Session, CoreError> {
        let lock = self.lock_for(id);
        let _guard = lock.lock().await;

        let mut session = self.store.get_session(id).await?;
        require_status(&session, &[from], verb)?;
        session.status = to;
        self.store.save_session(&session).await?;
        info!(session_id = %id, status = %to, "session {verb}d");
        Ok(session)
    }

    /// {Active, Paused} → Completed: teardown, evaluate, persist.
    ///
    /// Teardown and evaluation are independent — both are attempted even if
    /// the other fails. On pipeline failure the session is still marked
    /// Completed (it must stop accepting input) and the caller gets a
    /// distinct `Evaluation` error; `regenerate_evaluation` is the retry
    /// path. A report-persist failure is likewise reported as the store
    /// error it is, with the session already Completed.
    pub async fn end_session(&self, id: Uuid) -> Result<EvaluationReport, CoreError> {
        let lock = self.lock_for(id);
        let _guard = lock.lock().await;

        let mut session = self.store.get_session(id).await?;
        require_status(
            &session,
            &[SessionStatus::Active, SessionStatus::Paused],
            "end",
        )?;

        for mode in &session.config.enabled_modes {
            if let Err(e) = self.comms.disable_mode(id, *mode).await {
                warn!(session_id = %id, %mode, "failed to disable mode: {e}");
            }
        }

        let report_result = self.pipeline.run(id).await;

        session.status = SessionStatus::Completed;
        session.ended_at = Some(Utc::now());

        match report_result {
            Ok(report) => {
                let persisted = self.store.save_evaluation(&report).await;
                self.store.save_session(&session).await?;
                persisted?;
                info!(session_id = %id, degraded = report.degraded, "session completed");
                Ok(report)
            }
            Err(e) => {
                self.store.save_session(&session).await?;
                warn!(session_id = %id, "session completed without evaluation: {e}");
                Err(CoreError::Evaluation {
                    session_id: id,
                    message: e.to_string(),
                })
            }
        }
    }

    /// Re-runs the evaluation pipeline for a Completed session and upserts
    /// the report — the retry path after a failed `end_session` evaluation,
    /// without re-running the interview.
    pub async fn regenerate_evaluation(&self, id: Uuid) -> Result<EvaluationReport, CoreError> {
        let lock = self.lock_for(id);
        let _guard = lock.lock().await;

        let session = self.store.get_session(id).await?;
        require_status(&session, &[SessionStatus::Completed], "re-evaluate")?;

        let report = self
            .pipeline
            .run(id)
            .await
            .map_err(|e| CoreError::Evaluation {
                session_id: id,
                message: e.to_string(),
            })?;
        self.store.save_evaluation(&report).await?;
        info!(session_id = %id, degraded = report.degraded, "evaluation regenerated");
        Ok(report)
    }

    // ── Reads ───────────────────────────────────────────────────────────────

    pub async fn get_session(&self, id: Uuid) -> Result<Session, CoreError> {
        self.store.get_session(id).await
    }

    pub async fn list_sessions(
        &self,
        filter: &SessionFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Session>, CoreError> {
        self.store.list_sessions(filter, limit, offset).await
    }

    pub async fn get_evaluation(&self, id: Uuid) -> Result<Option<EvaluationReport>, CoreError> {
        self.store.get_evaluation(id).await
    }
}

/// Forces the baseline text mode, deduplicates, and checks the provider and
/// model fields. Returns the normalized config.
fn validate_config(mut config: SessionConfig) -> Result<SessionConfig, CoreError> {
    if !config.enabled_modes.contains(&CommunicationMode::Text) {
        config.enabled_modes.push(CommunicationMode::Text);
    }
    let mut seen = Vec::new();
    config.enabled_modes.retain(|m| {
        if seen.contains(m) {
            false
        } else {
            seen.push(*m);
            true
        }
    });

    if config.provider.trim().is_empty() {
        return Err(CoreError::Validation("provider must not be empty".to_string()));
    }
    if config.model.trim().is_empty() {
        return Err(CoreError::Validation("model must not be empty".to_string()));
    }
    Ok(config)
}

fn require_status(
    session: &Session,
    allowed: &[SessionStatus],
    verb: &str,
) -> Result<(), CoreError> {
    if allowed.contains(&session.status) {
        Ok(())
    } else {
        Err(CoreError::InvalidState(format!(
            "cannot {verb} session {} in status '{}'",
            session.id, session.status
        )))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{ChatMessage, LlmGateway, LlmReply, TokenUsage};
    use crate::models::Competency;
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    // ── Fakes ───────────────────────────────────────────────────────────────

    /// Deterministic interviewer; optional per-reply delay for ordering tests.
    struct StubInterviewer {
        delay: Duration,
    }

    #[async_trait]
    impl Interviewer for StubInterviewer {
        async fn start_interview(
            &self,
            _session: &Session,
            _resume_ref: Option<&str>,
        ) -> Result<String, CoreError> {
            Ok("Welcome. Let's design a URL shortener.".to_string())
        }

        async fn process_response(
            &self,
            _session: &Session,
            _history: &[ConversationTurn],
            candidate_text: &str,
            _attachments: &[String],
        ) -> Result<String, CoreError> {
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            Ok(format!("Follow-up to: {candidate_text}"))
        }
    }

    struct TrackingComms {
        enabled: Mutex<Vec<CommunicationMode>>,
        disabled: Mutex<Vec<CommunicationMode>>,
        fail_enable: Option<CommunicationMode>,
        counts: HashMap<CommunicationMode, u32>,
    }

    impl TrackingComms {
        fn new() -> Self {
            TrackingComms {
                enabled: Mutex::new(vec![]),
                disabled: Mutex::new(vec![]),
                fail_enable: None,
                counts: HashMap::new(),
            }
        }
    }

    #[async_trait]
    impl CommunicationCoordinator for TrackingComms {
        async fn enable_mode(
            &self,
            _session_id: Uuid,
            mode: CommunicationMode,
        ) -> Result<(), CoreError> {
            if self.fail_enable == Some(mode) {
                return Err(CoreError::Provider(format!("{mode} handler offline")));
            }
            self.enabled.lock().unwrap().push(mode);
            Ok(())
        }

        async fn disable_mode(
            &self,
            _session_id: Uuid,
            mode: CommunicationMode,
        ) -> Result<(), CoreError> {
            self.disabled.lock().unwrap().push(mode);
            Ok(())
        }

        async fn get_artifact_counts(
            &self,
            _session_id: Uuid,
        ) -> Result<HashMap<CommunicationMode, u32>, CoreError> {
            Ok(self.counts.clone())
        }
    }

    /// Gateway returning valid stage JSON for every evaluation operation.
    struct HappyGateway;

    #[async_trait]
    impl LlmGateway for HappyGateway {
        async fn invoke(
            &self,
            _messages: &[ChatMessage],
            operation: &str,
        ) -> Result<LlmReply, CoreError> {
            let text = match operation {
                "evaluation.competency" => {
                    let scores: Vec<serde_json::Value> = Competency::ALL
                        .iter()
                        .map(|c| {
                            serde_json::json!({
                                "competency": c.as_str(),
                                "score": 72.0,
                                "confidence": "medium",
                                "evidence": []
                            })
                        })
                        .collect();
                    serde_json::json!({ "scores": scores }).to_string()
                }
                "evaluation.feedback" => serde_json::json!({
                    "went_well": [
                        {"description": "Asked about scale upfront", "evidence": []},
                        {"description": "Clean top-down structure", "evidence": []},
                        {"description": "Covered the data model", "evidence": []}
                    ],
                    "went_okay": [
                        {"description": "Caching shallow", "evidence": []},
                        {"description": "Latency budgets late", "evidence": []}
                    ],
                    "needs_improvement": [
                        {"description": "No failure-mode discussion", "evidence": []},
                        {"description": "Few trade-offs surfaced", "evidence": []}
                    ]
                })
                .to_string(),
                "evaluation.plan" => serde_json::json!({
                    "steps": [
                        {"description": "Practice capacity estimates", "resources": []},
                        {"description": "Design for failure", "resources": []},
                        {"description": "Drill trade-off framing", "resources": []},
                        {"description": "Peer mock interview", "resources": []},
                        {"description": "Review replication patterns", "resources": []}
                    ],
                    "general_resources": ["The System Design Primer"]
                })
                .to_string(),
                other => return Err(CoreError::Provider(format!("unexpected operation {other}"))),
            };
            Ok(LlmReply {
                text,
                usage: TokenUsage::default(),
            })
        }
    }

    /// MemoryStore wrapper whose `get_turns` can be made to fail, to force an
    /// evaluation failure without touching the provider path.
    struct FlakyStore {
        inner: MemoryStore,
        fail_get_turns: AtomicBool,
    }

    #[async_trait]
    impl DataStore for FlakyStore {
        async fn save_session(&self, session: &Session) -> Result<(), CoreError> {
            self.inner.save_session(session).await
        }
        async fn get_session(&self, id: Uuid) -> Result<Session, CoreError> {
            self.inner.get_session(id).await
        }
        async fn list_sessions(
            &self,
            filter: &SessionFilter,
            limit: i64,
            offset: i64,
        ) -> Result<Vec<Session>, CoreError> {
            self.inner.list_sessions(filter, limit, offset).await
        }
        async fn append_turn(&self, turn: &ConversationTurn) -> Result<(), CoreError> {
            self.inner.append_turn(turn).await
        }
        async fn get_turns(&self, session_id: Uuid) -> Result<Vec<ConversationTurn>, CoreError> {
            if self.fail_get_turns.load(Ordering::SeqCst) {
                return Err(CoreError::DataStore("turn index unavailable".to_string()));
            }
            self.inner.get_turns(session_id).await
        }
        async fn save_evaluation(&self, report: &EvaluationReport) -> Result<(), CoreError> {
            self.inner.save_evaluation(report).await
        }
        async fn get_evaluation(
            &self,
            session_id: Uuid,
        ) -> Result<Option<EvaluationReport>, CoreError> {
            self.inner.get_evaluation(session_id).await
        }
    }

    // ── Helpers ─────────────────────────────────────────────────────────────

    fn build(
        store: Arc<dyn DataStore>,
        comms: Arc<TrackingComms>,
        delay: Duration,
    ) -> SessionOrchestrator {
        let gateway: Arc<dyn LlmGateway> = Arc::new(HappyGateway);
        let pipeline = EvaluationPipeline::new(
            Arc::clone(&gateway),
            Arc::clone(&store),
            comms.clone() as Arc<dyn CommunicationCoordinator>,
        );
        SessionOrchestrator::new(store, Arc::new(StubInterviewer { delay }), comms, pipeline)
    }

    fn default_orchestrator() -> SessionOrchestrator {
        build(
            Arc::new(MemoryStore::new()),
            Arc::new(TrackingComms::new()),
            Duration::ZERO,
        )
    }

    fn config(modes: Vec<CommunicationMode>) -> SessionConfig {
        SessionConfig {
            enabled_modes: modes,
            provider: "anthropic".to_string(),
            model: "claude-sonnet-4-5".to_string(),
            resume_ref: None,
            target_duration_minutes: 45,
        }
    }

    // ── create_session ──────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_create_forces_baseline_text_mode() {
        let orch = default_orchestrator();
        let session = orch
            .create_session(Uuid::new_v4(), config(vec![CommunicationMode::Whiteboard]))
            .await
            .unwrap();
        assert!(session.config.enabled_modes.contains(&CommunicationMode::Text));
        assert_eq!(session.status, SessionStatus::Created);
    }

    #[tokio::test]
    async fn test_create_deduplicates_modes() {
        let orch = default_orchestrator();
        let session = orch
            .create_session(
                Uuid::new_v4(),
                config(vec![
                    CommunicationMode::Text,
                    CommunicationMode::Text,
                    CommunicationMode::Audio,
                ]),
            )
            .await
            .unwrap();
        assert_eq!(session.config.enabled_modes.len(), 2);
    }

    #[tokio::test]
    async fn test_create_rejects_empty_provider_and_model() {
        let orch = default_orchestrator();
        let mut bad = config(vec![CommunicationMode::Text]);
        bad.provider = "  ".to_string();
        let result = orch.create_session(Uuid::new_v4(), bad).await;
        assert!(matches!(result, Err(CoreError::Validation(_))));

        let mut bad = config(vec![CommunicationMode::Text]);
        bad.model = String::new();
        let result = orch.create_session(Uuid::new_v4(), bad).await;
        assert!(matches!(result, Err(CoreError::Validation(_))));
    }

    // ── Transitions ─────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_illegal_transitions_raise_invalid_state() {
        let orch = default_orchestrator();
        let session = orch
            .create_session(Uuid::new_v4(), config(vec![CommunicationMode::Text]))
            .await
            .unwrap();
        let id = session.id;

        // Created: cannot pause, resume, submit, or end.
        assert!(matches!(orch.pause_session(id).await, Err(CoreError::InvalidState(_))));
        assert!(matches!(orch.resume_session(id).await, Err(CoreError::InvalidState(_))));
        assert!(matches!(
            orch.submit_turn(id, "hello", &[]).await,
            Err(CoreError::InvalidState(_))
        ));
        assert!(matches!(orch.end_session(id).await, Err(CoreError::InvalidState(_))));

        // Active: cannot start again or resume.
        orch.start_session(id).await.unwrap();
        assert!(matches!(orch.start_session(id).await, Err(CoreError::InvalidState(_))));
        assert!(matches!(orch.resume_session(id).await, Err(CoreError::InvalidState(_))));

        // Paused: cannot submit or pause again.
        orch.pause_session(id).await.unwrap();
        assert!(matches!(
            orch.submit_turn(id, "hello", &[]).await,
            Err(CoreError::InvalidState(_))
        ));
        assert!(matches!(orch.pause_session(id).await, Err(CoreError::InvalidState(_))));

        // Paused sessions can end.
        orch.end_session(id).await.unwrap();
        assert!(matches!(orch.pause_session(id).await, Err(CoreError::InvalidState(_))));
    }

    #[tokio::test]
    async fn test_pause_and_resume_round_trip() {
        let orch = default_orchestrator();
        let session = orch
            .create_session(Uuid::new_v4(), config(vec![CommunicationMode::Text]))
            .await
            .unwrap();
        orch.start_session(session.id).await.unwrap();

        let paused = orch.pause_session(session.id).await.unwrap();
        assert_eq!(paused.status, SessionStatus::Paused);
        let resumed = orch.resume_session(session.id).await.unwrap();
        assert_eq!(resumed.status, SessionStatus::Active);
    }

    #[tokio::test]
    async fn test_unknown_session_is_not_found() {
        let orch = default_orchestrator();
        assert!(matches!(
            orch.start_session(Uuid::new_v4()).await,
            Err(CoreError::NotFound(_))
        ));
    }

    // ── start_session ───────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_start_appends_opening_and_enables_modes() {
        let store: Arc<dyn DataStore> = Arc::new(MemoryStore::new());
        let comms = Arc::new(TrackingComms::new());
        let orch = build(Arc::clone(&store), Arc::clone(&comms), Duration::ZERO);

        let session = orch
            .create_session(
                Uuid::new_v4(),
                config(vec![CommunicationMode::Text, CommunicationMode::Audio]),
            )
            .await
            .unwrap();
        let started = orch.start_session(session.id).await.unwrap();

        assert_eq!(started.status, SessionStatus::Active);
        let turns = store.get_turns(session.id).await.unwrap();
        assert_eq!(turns.len(), 1);
        assert_eq!(turns[0].role, TurnRole::Interviewer);

        let enabled = comms.enabled.lock().unwrap();
        assert_eq!(enabled.len(), 2);
    }

    #[tokio::test]
    async fn test_failed_mode_enable_is_excluded_from_active_set() {
        let store: Arc<dyn DataStore> = Arc::new(MemoryStore::new());
        let mut comms = TrackingComms::new();
        comms.fail_enable = Some(CommunicationMode::Whiteboard);
        let comms = Arc::new(comms);
        let orch = build(Arc::clone(&store), Arc::clone(&comms), Duration::ZERO);

        let session = orch
            .create_session(
                Uuid::new_v4(),
                config(vec![CommunicationMode::Text, CommunicationMode::Whiteboard]),
            )
            .await
            .unwrap();
        let started = orch.start_session(session.id).await.unwrap();

        let active = started.metadata.get("active_modes").unwrap();
        assert_eq!(active, &serde_json::json!(["text"]));
    }

    // ── Full scenario ───────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_full_session_scenario() {
        let store: Arc<dyn DataStore> = Arc::new(MemoryStore::new());
        let comms = Arc::new(TrackingComms::new());
        let orch = build(Arc::clone(&store), Arc::clone(&comms), Duration::ZERO);

        let session = orch
            .create_session(
                Uuid::new_v4(),
                config(vec![CommunicationMode::Text, CommunicationMode::Whiteboard]),
            )
            .await
            .unwrap();
        let id = session.id;

        orch.start_session(id).await.unwrap();
        for text in ["I'd clarify scale first.", "Hash-based short codes.", "Add a cache tier."] {
            let reply = orch.submit_turn(id, text, &[]).await.unwrap();
            assert!(reply.contains(text));
        }

        let report = orch.end_session(id).await.unwrap();

        // 1 opening + 3 × (candidate + reply) = 7 turns.
        let turns = store.get_turns(id).await.unwrap();
        assert_eq!(turns.len(), 7);

        let ended = orch.get_session(id).await.unwrap();
        assert_eq!(ended.status, SessionStatus::Completed);
        assert!(ended.ended_at.is_some());

        assert_eq!(report.competency_scores.len(), 7);
        assert!(!report.went_well.is_empty());
        assert!(!report.needs_improvement.is_empty());
        assert!(!report.degraded);

        // Teardown disabled every configured mode.
        assert_eq!(comms.disabled.lock().unwrap().len(), 2);

        // One persisted report, and ending again is an InvalidState, not a
        // second evaluation.
        assert!(store.get_evaluation(id).await.unwrap().is_some());
        assert!(matches!(orch.end_session(id).await, Err(CoreError::InvalidState(_))));
        assert!(matches!(
            orch.submit_turn(id, "one more thought", &[]).await,
            Err(CoreError::InvalidState(_))
        ));
    }

    #[tokio::test]
    async fn test_attachments_reach_the_candidate_turn() {
        let store: Arc<dyn DataStore> = Arc::new(MemoryStore::new());
        let comms = Arc::new(TrackingComms::new());
        let orch = build(Arc::clone(&store), comms, Duration::ZERO);

        let session = orch
            .create_session(Uuid::new_v4(), config(vec![CommunicationMode::Whiteboard]))
            .await
            .unwrap();
        orch.start_session(session.id).await.unwrap();
        orch.submit_turn(session.id, "See my diagram.", &["wb:snap-1".to_string()])
            .await
            .unwrap();

        let turns = store.get_turns(session.id).await.unwrap();
        let candidate = turns.iter().find(|t| t.role == TurnRole::Candidate).unwrap();
        assert_eq!(
            candidate.metadata.as_ref().unwrap()["attachments"][0],
            "wb:snap-1"
        );
    }

    #[tokio::test]
    async fn test_empty_candidate_text_is_rejected() {
        let orch = default_orchestrator();
        let session = orch
            .create_session(Uuid::new_v4(), config(vec![CommunicationMode::Text]))
            .await
            .unwrap();
        orch.start_session(session.id).await.unwrap();
        let result = orch.submit_turn(session.id, "   ", &[]).await;
        assert!(matches!(result, Err(CoreError::Validation(_))));
    }

    // ── Concurrency ─────────────────────────────────────────────────────────

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_turns_never_interleave() {
        let store: Arc<dyn DataStore> = Arc::new(MemoryStore::new());
        let comms = Arc::new(TrackingComms::new());
        let orch = Arc::new(build(
            Arc::clone(&store),
            comms,
            Duration::from_millis(20),
        ));

        let session = orch
            .create_session(Uuid::new_v4(), config(vec![CommunicationMode::Text]))
            .await
            .unwrap();
        let id = session.id;
        orch.start_session(id).await.unwrap();

        let a = tokio::spawn({
            let orch = Arc::clone(&orch);
            async move { orch.submit_turn(id, "A", &[]).await }
        });
        let b = tokio::spawn({
            let orch = Arc::clone(&orch);
            async move { orch.submit_turn(id, "B", &[]).await }
        });
        a.await.unwrap().unwrap();
        b.await.unwrap().unwrap();

        let turns = store.get_turns(id).await.unwrap();
        assert_eq!(turns.len(), 5);

        // After the opening, turns come in strict candidate→reply pairs, and
        // each reply answers the candidate turn directly before it.
        for pair in turns[1..].chunks(2) {
            assert_eq!(pair[0].role, TurnRole::Candidate);
            assert_eq!(pair[1].role, TurnRole::Interviewer);
            assert_eq!(pair[1].content, format!("Follow-up to: {}", pair[0].content));
        }
    }

    // ── Evaluation failure and regeneration ─────────────────────────────────

    #[tokio::test]
    async fn test_pipeline_failure_still_completes_session() {
        let flaky = Arc::new(FlakyStore {
            inner: MemoryStore::new(),
            fail_get_turns: AtomicBool::new(false),
        });
        let store: Arc<dyn DataStore> = flaky.clone();
        let comms = Arc::new(TrackingComms::new());
        let orch = build(Arc::clone(&store), Arc::clone(&comms), Duration::ZERO);

        let session = orch
            .create_session(Uuid::new_v4(), config(vec![CommunicationMode::Text]))
            .await
            .unwrap();
        let id = session.id;
        orch.start_session(id).await.unwrap();
        orch.submit_turn(id, "Sharded counters.", &[]).await.unwrap();

        // Break the turn index so the pipeline aborts.
        flaky.fail_get_turns.store(true, Ordering::SeqCst);
        let result = orch.end_session(id).await;
        assert!(matches!(result, Err(CoreError::Evaluation { session_id, .. }) if session_id == id));

        // Session no longer accepts input, modes were torn down, no report.
        let ended = orch.get_session(id).await.unwrap();
        assert_eq!(ended.status, SessionStatus::Completed);
        assert!(!comms.disabled.lock().unwrap().is_empty());
        assert!(store.get_evaluation(id).await.unwrap().is_none());

        // Retry path: regenerate once the store recovers.
        flaky.fail_get_turns.store(false, Ordering::SeqCst);
        let report = orch.regenerate_evaluation(id).await.unwrap();
        assert_eq!(report.competency_scores.len(), 7);
        assert!(store.get_evaluation(id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_regenerate_requires_completed_session() {
        let orch = default_orchestrator();
        let session = orch
            .create_session(Uuid::new_v4(), config(vec![CommunicationMode::Text]))
            .await
            .unwrap();
        orch.start_session(session.id).await.unwrap();
        assert!(matches!(
            orch.regenerate_evaluation(session.id).await,
            Err(CoreError::InvalidState(_))
        ));
    }

    // ── Reads ───────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_list_sessions_filters_by_owner() {
        let orch = default_orchestrator();
        let owner = Uuid::new_v4();
        orch.create_session(owner, config(vec![CommunicationMode::Text]))
            .await
            .unwrap();
        orch.create_session(Uuid::new_v4(), config(vec![CommunicationMode::Text]))
            .await
            .unwrap();

        let filter = SessionFilter {
            owner_id: Some(owner),
            status: None,
        };
        let listed = orch.list_sessions(&filter, 10, 0).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].owner_id, owner);
    }
}
