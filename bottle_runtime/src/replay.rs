//! Replay orchestrator — rebuild ledger state from the transaction log.
//!
//! Delegates every decision to the kernel engine. No cached state.

use bottle_kernel::engine::BottleEngine;
use bottle_kernel::error::EngineError;
use bottle_kernel::hashing::canonical_hash;
use bottle_kernel::instruction::Transaction;
use bottle_kernel::state::LedgerState;
use tracing::debug;

use crate::error::Result;
use crate::proto_bridge::proto_to_kernel;
use crate::proto_types::ProtoTransaction;

/// Rebuild the ledger from a sequence of committed transactions.
///
/// Returns `(final_state, canonical_hash)`. A logged transaction that the
/// kernel now rejects means the log and the kernel disagree; it surfaces as
/// an `EngineError` rather than being skipped.
pub fn rebuild_state(txs: &[Transaction]) -> Result<(LedgerState, String), EngineError> {
    let mut engine = BottleEngine::new();
    engine.apply_sequence(txs)?;
    let state = engine.into_state();
    let hash = canonical_hash(&state);
    debug!(transactions = txs.len(), %hash, "ledger rebuilt");
    Ok((state, hash))
}

/// Rebuild and return only the canonical hash.
pub fn rebuild_hash(txs: &[Transaction]) -> Result<String, EngineError> {
    rebuild_state(txs).map(|(_, hash)| hash)
}

/// Resume `engine` with logged frames, skipping any at or below its sequence.
pub fn replay_onto(engine: &mut BottleEngine, frames: &[ProtoTransaction]) -> Result<usize> {
    let start = engine.last_sequence();
    let mut applied = 0;
    for frame in frames.iter().filter(|f| f.sequence > start) {
        engine.apply(&proto_to_kernel(frame)?)?;
        applied += 1;
    }
    Ok(applied)
}

/// Decode every frame, failing on the first malformed one.
pub fn decode_all(frames: &[ProtoTransaction]) -> Result<Vec<Transaction>> {
    frames
        .iter()
        .map(|f| proto_to_kernel(f).map_err(Into::into))
        .collect()
}
