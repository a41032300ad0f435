//! Bottle Ledger — Throw and Retrieve
//!
//! ALL ledger mutation lives here. Each operation runs every fallible
//! check first and mutates last, so a rejection leaves the ledger exactly
//! as it was.

use crate::domain::{
    ActorId, AssetRef, Bottle, BottleState, RecordAddress, TransactionOutcome, MAX_MESSAGE_BYTES,
};
use crate::error::BottleError;
use crate::instruction::{Instruction, Transaction};
use crate::state::LedgerState;

// ---------------------------------------------------------------------------
// Public dispatcher
// ---------------------------------------------------------------------------

/// Execute `tx` against `state`. Sequence checks belong to the engine.
pub fn apply_transaction(
    state: &mut LedgerState,
    tx: &Transaction,
) -> Result<TransactionOutcome, BottleError> {
    match &tx.instruction {
        Instruction::Throw {
            id,
            amount,
            message,
        } => throw_bottle(state, &tx.signer, tx.timestamp, *id, *amount, message),
        Instruction::Retrieve { record, asset } => {
            retrieve_bottle(state, &tx.signer, tx.timestamp, *record, asset)
        }
    }
}

// ---------------------------------------------------------------------------
// Throw
// ---------------------------------------------------------------------------

/// Create a new Drifting bottle and consume one of the sender's actions.
///
/// 1. message ≤ 400 bytes, else `MessageTooLong`
/// 2. quota for `(sender, day)`, else `DailyLimitExceeded`
/// 3. store the bottle under a fresh address
pub fn throw_bottle(
    state: &mut LedgerState,
    sender: &ActorId,
    timestamp: i64,
    id: u64,
    amount: u64,
    message: &str,
) -> Result<TransactionOutcome, BottleError> {
    if message.len() > MAX_MESSAGE_BYTES {
        return Err(BottleError::MessageTooLong { len: message.len() });
    }

    let quota_used = state.quota.try_consume(sender, timestamp)?;

    let address = state.allocate_address();
    let bottle = Bottle {
        id,
        thrown_at: timestamp,
        sender: *sender,
        message: message.to_string(),
        state: BottleState::Drifting,
        asset: AssetRef::for_bottle(sender, id, amount),
    };
    state.bottles.insert(address, bottle);

    Ok(TransactionOutcome::Thrown {
        address,
        quota_used,
    })
}

// ---------------------------------------------------------------------------
// Retrieve
// ---------------------------------------------------------------------------

/// Claim a Drifting bottle for `retrievee`.
///
/// Check order is fixed: existence, asset reference, state, ownership,
/// quota. Ownership precedes quota so a self-retrieval never spends an
/// action.
pub fn retrieve_bottle(
    state: &mut LedgerState,
    retrievee: &ActorId,
    timestamp: i64,
    address: RecordAddress,
    asset: &AssetRef,
) -> Result<TransactionOutcome, BottleError> {
    let bottle = state
        .bottles
        .get(&address)
        .ok_or(BottleError::RecordNotFound)?;

    if bottle.asset != *asset {
        return Err(BottleError::AssetReferenceMismatch);
    }
    if !bottle.state.is_drifting() {
        return Err(BottleError::AlreadyRetrieved);
    }
    if bottle.sender == *retrievee {
        return Err(BottleError::SelfRetrievalForbidden);
    }

    let quota_used = state.quota.try_consume(retrievee, timestamp)?;

    let bottle = state
        .bottles
        .get_mut(&address)
        .ok_or(BottleError::RecordNotFound)?;
    mark_retrieved(bottle, *retrievee, timestamp)?;

    Ok(TransactionOutcome::Retrieved {
        address,
        quota_used,
    })
}

/// Compare-and-swap on the state: only Drifting may become Retrieved.
fn mark_retrieved(
    bottle: &mut Bottle,
    retrievee: ActorId,
    retrieved_at: i64,
) -> Result<(), BottleError> {
    match bottle.state {
        BottleState::Drifting => {
            bottle.state = BottleState::Retrieved {
                retrievee,
                retrieved_at,
            };
            Ok(())
        }
        BottleState::Retrieved { .. } => Err(BottleError::AlreadyRetrieved),
    }
}
