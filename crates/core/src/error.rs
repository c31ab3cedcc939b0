//! Shared error type for the domain crates.

/// Errors produced by core domain logic.
///
/// Outer layers (engine tasks, HTTP handlers) map these onto their own
/// envelopes; `core` never aborts the process.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// A query, job, or asset id that nothing matches.
    #[error("{entity} '{id}' does not exist")]
    NotFound { entity: &'static str, id: String },

    /// Caller input failed a domain rule. The message is safe to echo back.
    #[error("invalid input: {0}")]
    Validation(String),

    /// The operation is legal in some state, just not the current one.
    #[error("conflicting state: {0}")]
    Conflict(String),

    /// A bug or broken invariant. Callers log the message and hide it.
    #[error("internal failure: {0}")]
    Internal(String),
}
