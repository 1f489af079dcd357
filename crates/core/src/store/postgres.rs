//! Postgres `DataStore` over sqlx. Schema is three tables: sessions,
//! conversation_turns, evaluations (one row per session, upserted).
//! Conflicting writes are serialized at the row level by Postgres itself; the
//! orchestrator adds no optimistic-concurrency check beyond its state guards.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use tracing::info;
use uuid::Uuid;

use crate::errors::CoreError;
use crate::models::{
    ConversationTurn, EvaluationReport, Session, SessionConfig, SessionFilter, SessionStatus,
    TurnRole,
};
use crate::store::DataStore;

/// Creates and returns a PostgreSQL connection pool.
pub async fn create_pool(database_url: &str) -> Result<PgPool> {
    info!("Connecting to PostgreSQL...");

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await?;

    info!("PostgreSQL connection pool established");
    Ok(pool)
}

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS sessions (
    id          UUID PRIMARY KEY,
    owner_id    UUID NOT NULL,
    status      TEXT NOT NULL,
    config      JSONB NOT NULL,
    metadata    JSONB NOT NULL DEFAULT '{}'::jsonb,
    created_at  TIMESTAMPTZ NOT NULL,
    ended_at    TIMESTAMPTZ
);
CREATE INDEX IF NOT EXISTS idx_sessions_owner_created
    ON sessions (owner_id, created_at DESC);

CREATE TABLE IF NOT EXISTS conversation_turns (
    id          UUID PRIMARY KEY,
    session_id  UUID NOT NULL REFERENCES sessions(id),
    role        TEXT NOT NULL,
    content     TEXT NOT NULL,
    metadata    JSONB,
    created_at  TIMESTAMPTZ NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_turns_session_created
    ON conversation_turns (session_id, created_at);

CREATE TABLE IF NOT EXISTS evaluations (
    session_id  UUID PRIMARY KEY REFERENCES sessions(id),
    report      JSONB NOT NULL,
    degraded    BOOLEAN NOT NULL,
    created_at  TIMESTAMPTZ NOT NULL
);
"#;

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        PgStore { pool }
    }

    /// Idempotent schema bootstrap.
    pub async fn ensure_schema(&self) -> Result<(), CoreError> {
        for statement in SCHEMA.split(';').filter(|s| !s.trim().is_empty()) {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    fn session_from_row(row: &sqlx::postgres::PgRow) -> Result<Session, CoreError> {
        let status_text: String = row.get("status");
        let status = SessionStatus::parse(&status_text)
            .ok_or_else(|| CoreError::DataStore(format!("unknown status '{status_text}'")))?;

        let config_value: Value = row.get("config");
        let config: SessionConfig = serde_json::from_value(config_value)
            .map_err(|e| CoreError::DataStore(format!("bad session config: {e}")))?;

        let metadata_value: Value = row.get("metadata");
        let metadata = serde_json::from_value(metadata_value)
            .map_err(|e| CoreError::DataStore(format!("bad session metadata: {e}")))?;

        Ok(Session {
            id: row.get("id"),
            owner_id: row.get("owner_id"),
            status,
            config,
            metadata,
            created_at: row.get::<DateTime<Utc>, _>("created_at"),
            ended_at: row.get::<Option<DateTime<Utc>>, _>("ended_at"),
        })
    }

    fn turn_from_row(row: &sqlx::postgres::PgRow) -> Result<ConversationTurn, CoreError> {
        let role_text: String = row.get("role");
        let role = TurnRole::parse(&role_text)
            .ok_or_else(|| CoreError::DataStore(format!("unknown turn role '{role_text}'")))?;
        Ok(ConversationTurn {
            id: row.get("id"),
            session_id: row.get("session_id"),
            role,
            content: row.get("content"),
            metadata: row.get::<Option<Value>, _>("metadata"),
            created_at: row.get::<DateTime<Utc>, _>("created_at"),
        })
    }
}

#[async_trait]
impl DataStore for PgStore {
    async fn save_session(&self, session: &Session) -> Result<(), CoreError> {
        let config = serde_json::to_value(&session.config)
            .map_err(|e| CoreError::DataStore(format!("serialize config: {e}")))?;
        let metadata = serde_json::to_value(&session.metadata)
            .map_err(|e| CoreError::DataStore(format!("serialize metadata: {e}")))?;

        sqlx::query(
            r#"
            INSERT INTO sessions (id, owner_id, status, config, metadata, created_at, ended_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (id) DO UPDATE SET
                status = EXCLUDED.status,
                metadata = EXCLUDED.metadata,
                ended_at = EXCLUDED.ended_at
            "#,
        )
        .bind(session.id)
        .bind(session.owner_id)
        .bind(session.status.as_str())
        .bind(&config)
        .bind(&metadata)
        .bind(session.created_at)
        .bind(session.ended_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_session(&self, id: Uuid) -> Result<Session, CoreError> {
        let row = sqlx::query("SELECT * FROM sessions WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("session {id}")))?;
        Self::session_from_row(&row)
    }

    async fn list_sessions(
        &self,
        filter: &SessionFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Session>, CoreError> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM sessions
            WHERE ($1::uuid IS NULL OR owner_id = $1)
              AND ($2::text IS NULL OR status = $2)
            ORDER BY created_at DESC
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(filter.owner_id)
        .bind(filter.status.map(|s| s.as_str().to_string()))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::session_from_row).collect()
    }

    async fn append_turn(&self, turn: &ConversationTurn) -> Result<(), CoreError> {
        sqlx::query(
            r#"
            INSERT INTO conversation_turns (id, session_id, role, content, metadata, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(turn.id)
        .bind(turn.session_id)
        .bind(turn.role.as_str())
        .bind(&turn.content)
        .bind(&turn.metadata)
        .bind(turn.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_turns(&self, session_id: Uuid) -> Result<Vec<ConversationTurn>, CoreError> {
        let rows = sqlx::query(
            "SELECT * FROM conversation_turns WHERE session_id = $1 ORDER BY created_at ASC",
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::turn_from_row).collect()
    }

    async fn save_evaluation(&self, report: &EvaluationReport) -> Result<(), CoreError> {
        let body = serde_json::to_value(report)
            .map_err(|e| CoreError::DataStore(format!("serialize report: {e}")))?;

        sqlx::query(
            r#"
            INSERT INTO evaluations (session_id, report, degraded, created_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (session_id) DO UPDATE SET
                report = EXCLUDED.report,
                degraded = EXCLUDED.degraded,
                created_at = EXCLUDED.created_at
            "#,
        )
        .bind(report.session_id)
        .bind(&body)
        .bind(report.degraded)
        .bind(report.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_evaluation(
        &self,
        session_id: Uuid,
    ) -> Result<Option<EvaluationReport>, CoreError> {
        let row = sqlx::query("SELECT report FROM evaluations WHERE session_id = $1")
            .bind(session_id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let body: Value = row.get("report");
                let report = serde_json::from_value(body)
                    .map_err(|e| CoreError::DataStore(format!("bad evaluation report: {e}")))?;
                Ok(Some(report))
            }
            None => Ok(None),
        }
    }
}
