//! Bottle Ledger — Engine
//!
//! Top-level orchestrator. Enforces strict transaction ordering,
//! delegates mutation to `operations`, and hard-fails on a broken
//! invariant after a commit.

use tracing::debug;

use crate::domain::TransactionOutcome;
use crate::error::EngineError;
use crate::instruction::Transaction;
use crate::invariants::validate_bottle;
use crate::operations::apply_transaction;
use crate::state::{create_initial_state, LedgerState};

/// Stateful engine over a single ledger.
#[derive(Debug, Clone, Default)]
pub struct BottleEngine {
    state: LedgerState,
    last_sequence: u64,
}

impl BottleEngine {
    /// Create an engine over an empty ledger.
    pub fn new() -> Self {
        Self {
            state: create_initial_state(),
            last_sequence: 0,
        }
    }

    /// Resume from a restored state, e.g. a snapshot taken at `last_sequence`.
    pub fn from_state(state: LedgerState, last_sequence: u64) -> Self {
        Self {
            state,
            last_sequence,
        }
    }

    pub fn state(&self) -> &LedgerState {
        &self.state
    }

    pub fn into_state(self) -> LedgerState {
        self.state
    }

    pub fn last_sequence(&self) -> u64 {
        self.last_sequence
    }

    /// Apply a single transaction:
    ///   1. Validate sequence (strictly increasing, no gaps)
    ///   2. Delegate to `operations::apply_transaction`
    ///   3. Validate invariants on the touched bottle
    ///
    /// A rejected transaction still leaves the sequence unconsumed, so the
    /// caller may reuse the number for the next attempt.
    pub fn apply(&mut self, tx: &Transaction) -> Result<TransactionOutcome, EngineError> {
        let expected = self.last_sequence + 1;
        if tx.sequence != expected {
            return Err(EngineError::SequenceViolation {
                expected,
                got: tx.sequence,
            });
        }

        let outcome = apply_transaction(&mut self.state, tx).map_err(|err| {
            debug!(
                sequence = tx.sequence,
                instruction = tx.instruction.name(),
                signer = %tx.signer,
                error = %err,
                "transaction rejected"
            );
            err
        })?;

        let address = outcome.address();
        if let Some(bottle) = self.state.bottle(address) {
            validate_bottle(address, bottle);
        }
        self.last_sequence = tx.sequence;

        Ok(outcome)
    }

    /// Apply an ordered sequence, stopping at the first failure.
    pub fn apply_sequence(&mut self, txs: &[Transaction]) -> Result<&LedgerState, EngineError> {
        for tx in txs {
            self.apply(tx)?;
        }
        Ok(self.state())
    }

    /// Event-sourced reconstruction: reset and replay.
    pub fn replay(&mut self, txs: &[Transaction]) -> Result<&LedgerState, EngineError> {
        *self = Self::new();
        self.apply_sequence(txs)
    }
}
