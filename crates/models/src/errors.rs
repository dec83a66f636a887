use chrono::{DateTime, Utc};
use thiserror::Error;

/// Arena core errors
#[derive(Error, Debug)]
pub enum ArenaError {
    #[error("execution service unavailable (circuit open)")]
    ServiceUnavailable {
        last_failure_at: Option<DateTime<Utc>>,
    },

    #[error("submission queue overloaded: {backlog} pending (limit {limit})")]
    Overloaded { backlog: usize, limit: usize },

    #[error("submission timed out after {timeout_ms} ms")]
    Timeout { timeout_ms: u64 },

    #[error("submission failed: {reason}")]
    SubmissionFailed { reason: String },

    #[error("reservation expired or already consumed")]
    ReservationExpired,

    #[error("room not found: {code}")]
    RoomNotFound { code: String },

    #[error("room already full: {code}")]
    RoomFull { code: String },

    #[error("invalid match data: {reason}")]
    InvalidMatchData { reason: String },

    #[error("guest already played: {guest_id}")]
    AlreadyPlayed { guest_id: String },

    #[error("internal error: {reason}")]
    Internal { reason: String },
}

impl ArenaError {
    /// Get HTTP status code for the error
    pub fn status_code(&self) -> u16 {
        match self {
            ArenaError::ServiceUnavailable { .. } => 503,
            ArenaError::Overloaded { .. } => 429,
            ArenaError::Timeout { .. } => 408,
            ArenaError::SubmissionFailed { .. } => 502,
            ArenaError::ReservationExpired => 410,
            ArenaError::RoomNotFound { .. } => 404,
            ArenaError::RoomFull { .. } => 409,
            ArenaError::InvalidMatchData { .. } => 400,
            ArenaError::AlreadyPlayed { .. } => 403,
            ArenaError::Internal { .. } => 500,
        }
    }

    /// Check if error is retryable with caller-side backoff.
    ///
    /// Nothing in the core retries automatically; this only informs
    /// user-facing messaging upstream.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ArenaError::ServiceUnavailable { .. }
                | ArenaError::Overloaded { .. }
                | ArenaError::Timeout { .. }
        )
    }

    /// Get error category
    pub fn category(&self) -> &'static str {
        match self {
            ArenaError::ServiceUnavailable { .. } => "circuit_breaker",
            ArenaError::Overloaded { .. } => "backpressure",
            ArenaError::Timeout { .. } => "timeout",
            ArenaError::SubmissionFailed { .. } => "submission",
            ArenaError::ReservationExpired => "reservation",
            ArenaError::RoomNotFound { .. } => "room",
            ArenaError::RoomFull { .. } => "room",
            ArenaError::InvalidMatchData { .. } => "handoff",
            ArenaError::AlreadyPlayed { .. } => "guest",
            ArenaError::Internal { .. } => "internal",
        }
    }
}

/// Result type alias for arena core operations
pub type ArenaResult<T> = Result<T, ArenaError>;

impl From<anyhow::Error> for ArenaError {
    fn from(err: anyhow::Error) -> Self {
        ArenaError::Internal {
            reason: err.to_string(),
        }
    }
}
