use thiserror::Error;

/// Domain errors returned to the IPC layer as typed results. Each variant
/// maps to a stable error code the frontend renders differently, so none of
/// these are collapsed into a generic failure.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A driver or supervisor is already referenced by another vehicle.
    /// Carries the occupying vehicle's number for the operator message.
    #[error("already assigned to vehicle {occupied_by}")]
    Conflict { occupied_by: String },

    /// A decision was attempted on a request that already left `pending`.
    /// Indicates a stale client view; the caller should refresh.
    #[error("request is {status}, expected {expected}")]
    InvalidStateTransition {
        status: String,
        expected: &'static str,
    },

    /// Verification code mismatch, or an already-consumed code.
    #[error("verification code does not match")]
    InvalidCode,

    /// No pricing entry for the transport/subscription pair. A configuration
    /// gap, never shown to end users verbatim.
    #[error("no pricing tier for {transport}/{subscription}")]
    UnknownPricingTier {
        transport: String,
        subscription: String,
    },

    /// The student holds no active enrollment on any vehicle.
    #[error("student has no active enrollment")]
    NotOnRoster,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    BadInput(String),

    /// Stored payload that no longer deserializes. Data corruption, not a
    /// caller mistake.
    #[error("malformed request payload")]
    Payload(#[from] serde_json::Error),

    #[error(transparent)]
    Store(#[from] rusqlite::Error),
}
