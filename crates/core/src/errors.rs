use thiserror::Error;
use uuid::Uuid;

/// Core error taxonomy.
///
/// `Validation` and `InvalidState` are usage errors — surfaced immediately,
/// never retried. `Provider` failures are assumed transient and are the only
/// retryable kind; pipeline stages retry them with backoff and fall back to
/// documented defaults on exhaustion. `DataStore` failures are infrastructure
/// errors and always propagate. `Evaluation` wraps a pipeline failure during
/// `end_session` so callers can tell it apart from the session transition
/// itself (the session is still marked completed).
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Data store error: {0}")]
    DataStore(String),

    #[error("Evaluation failed for session {session_id}: {message}")]
    Evaluation { session_id: Uuid, message: String },
}

impl CoreError {
    /// Retry classifier used by the shared backoff utility. Only provider
    /// failures (HTTP errors, timeouts, malformed LLM output) are transient.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CoreError::Provider(_))
    }
}

impl From<sqlx::Error> for CoreError {
    fn from(e: sqlx::Error) -> Self {
        CoreError::DataStore(e.to_string())
    }
}
