pub mod random;
pub mod repository;

/// Engine-wide failure taxonomy. Every user-visible failure carries a
/// human-readable reason; internal detail stays in logs.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("insufficient inventory: requested {requested}, available {available}")]
    InsufficientInventory { requested: i64, available: i64 },

    /// Reserved for identifier-collision exhaustion. The PNR allocator
    /// currently surfaces its high-entropy fallback instead of returning
    /// this, so no live path constructs it.
    #[error("identifier conflict: {0}")]
    Conflict(String),

    #[error("store error: {0}")]
    Store(String),
}

pub type EngineResult<T> = Result<T, EngineError>;
