//! Bottle Ledger — Invariant Checks
//!
//! Whole-ledger validation. `try_validate_invariants` is used when state
//! comes from outside (snapshot restore); `validate_bottle` hard-fails the
//! engine after each committed transaction.

use std::fmt;

use crate::domain::{Bottle, RecordAddress, MAX_DAILY_ACTIONS, MAX_MESSAGE_BYTES};
use crate::state::LedgerState;

/// A violated ledger invariant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvariantViolation {
    pub invariant: &'static str,
    pub detail: String,
}

impl fmt::Display for InvariantViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[INVARIANT:{}] {}", self.invariant, self.detail)
    }
}

impl std::error::Error for InvariantViolation {}

fn violation(invariant: &'static str, detail: String) -> InvariantViolation {
    InvariantViolation { invariant, detail }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Run every check. Returns the first failure.
pub fn try_validate_invariants(state: &LedgerState) -> Result<(), InvariantViolation> {
    for (address, bottle) in state.bottles() {
        check_address_allocated(state, address)?;
        check_bottle(address, bottle)?;
    }
    check_quota_bound(state)?;
    Ok(())
}

/// Hard-fail check of a single bottle. Panics on violation.
pub fn validate_bottle(address: RecordAddress, bottle: &Bottle) {
    if let Err(v) = check_bottle(address, bottle) {
        panic!("Invariant violation: {}", v);
    }
}

// ---------------------------------------------------------------------------
// Individual checks
// ---------------------------------------------------------------------------

fn check_bottle(address: RecordAddress, bottle: &Bottle) -> Result<(), InvariantViolation> {
    check_message_length(address, bottle)?;
    check_not_self_retrieved(address, bottle)?;
    Ok(())
}

fn check_message_length(address: RecordAddress, bottle: &Bottle) -> Result<(), InvariantViolation> {
    if bottle.message.len() > MAX_MESSAGE_BYTES {
        return Err(violation(
            "message_length",
            format!(
                "Bottle {} carries a {}-byte message, limit is {}",
                address,
                bottle.message.len(),
                MAX_MESSAGE_BYTES
            ),
        ));
    }
    Ok(())
}

fn check_not_self_retrieved(
    address: RecordAddress,
    bottle: &Bottle,
) -> Result<(), InvariantViolation> {
    if bottle.retrievee() == Some(bottle.sender) {
        return Err(violation(
            "self_retrieval",
            format!("Bottle {} was retrieved by its own sender", address),
        ));
    }
    Ok(())
}

fn check_address_allocated(
    state: &LedgerState,
    address: RecordAddress,
) -> Result<(), InvariantViolation> {
    if address >= state.next_address() {
        return Err(violation(
            "address_allocation",
            format!(
                "Bottle {} is at or beyond the next free address {}",
                address,
                state.next_address()
            ),
        ));
    }
    Ok(())
}

fn check_quota_bound(state: &LedgerState) -> Result<(), InvariantViolation> {
    for (day, actor, count) in state.quota().entries() {
        if count > MAX_DAILY_ACTIONS {
            return Err(violation(
                "quota_bound",
                format!(
                    "Actor {} has {} actions on day {}, limit is {}",
                    actor, count, day, MAX_DAILY_ACTIONS
                ),
            ));
        }
    }
    Ok(())
}
