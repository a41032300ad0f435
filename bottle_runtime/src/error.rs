//! Runtime errors.
//!
//! Kernel rejections pass through untouched inside `Engine`, so callers can
//! still branch on the `BottleError` kind.

use std::io;

use thiserror::Error;

use bottle_kernel::error::{BottleError, EngineError};

use crate::snapshot_codec::SnapshotError;

/// A protobuf frame decoded but does not describe a valid transaction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BridgeError {
    #[error("transaction {sequence} has no instruction")]
    MissingInstruction { sequence: u64 },
    #[error("transaction {sequence}: {field} must be 32 bytes, got {len}")]
    BadKey {
        sequence: u64,
        field: &'static str,
        len: usize,
    },
}

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("transaction log is corrupt: {0}")]
    Decode(#[from] BridgeError),

    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    #[error("config error: {0}")]
    Config(String),

    #[error("determinism failure: replay produced {first} then {second}")]
    Determinism { first: String, second: String },

    #[error("ledger lock poisoned")]
    LockPoisoned,
}

impl From<BottleError> for RuntimeError {
    fn from(err: BottleError) -> Self {
        RuntimeError::Engine(EngineError::Rejected(err))
    }
}

impl RuntimeError {
    /// The kernel rejection behind this error, if any.
    pub fn bottle_error(&self) -> Option<&BottleError> {
        match self {
            RuntimeError::Engine(err) => err.bottle_error(),
            _ => None,
        }
    }
}

pub type Result<T, E = RuntimeError> = std::result::Result<T, E>;
