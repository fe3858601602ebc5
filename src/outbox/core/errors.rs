// ============================================================================
// Store Errors
// ============================================================================
//
// Everything here is surfaced synchronously to whoever opened the unit of
// work; none of it is retried behind the caller's back.
//
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A concurrent writer won the version race (or the row was created by
    /// someone else first). The caller may reload and retry.
    #[error("concurrency conflict on aggregate {aggregate_id} (expected version {expected_version:?})")]
    ConcurrencyConflict {
        aggregate_id: String,
        expected_version: Option<i64>,
    },

    #[error("persistence failure: {0}")]
    Persistence(#[from] sqlx::Error),

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("failed to serialize {event_type} event: {source}")]
    Serialization {
        event_type: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("corrupt row in {table}: {reason}")]
    Corrupt { table: &'static str, reason: String },
}

impl StoreError {
    /// Store unreachable or write rejected.
    pub fn is_persistence_failure(&self) -> bool {
        matches!(self, StoreError::Persistence(_) | StoreError::Unavailable(_))
    }
}
