//! Bottle Ledger — Error Kinds
//!
//! Every rejection is detected before any mutation. Callers branch on the
//! variant; the message text is stable but not a contract.

use thiserror::Error;

/// Validation failures of the record lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BottleError {
    #[error("The message is too long.")]
    MessageTooLong { len: usize },

    #[error("The maximum number of bottles that can be thrown or retrieved each day has been exceeded.")]
    DailyLimitExceeded,

    #[error("The same person cannot retrieve their own bottle.")]
    SelfRetrievalForbidden,

    #[error("This bottle has already been retrieved.")]
    AlreadyRetrieved,

    #[error("The bottle does not exist.")]
    RecordNotFound,

    #[error("The bottle record is malformed: {reason}")]
    MalformedRecord { reason: &'static str },

    #[error("The asset reference does not match the bottle.")]
    AssetReferenceMismatch,
}

/// Engine-level failures: a rejected transaction or a broken sequence.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error(transparent)]
    Rejected(#[from] BottleError),

    #[error("Sequence violation: expected {expected}, got {got}")]
    SequenceViolation { expected: u64, got: u64 },
}

impl EngineError {
    /// The domain rejection, if this is one.
    pub fn bottle_error(&self) -> Option<&BottleError> {
        match self {
            EngineError::Rejected(err) => Some(err),
            EngineError::SequenceViolation { .. } => None,
        }
    }
}
