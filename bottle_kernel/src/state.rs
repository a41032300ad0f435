//! Bottle Ledger — Ledger State
//!
//! The store that owns every bottle and every quota counter. Mutation is
//! crate-private: only the operations in `operations` change it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::{ActorId, Bottle, RecordAddress};
use crate::error::BottleError;
use crate::layout;
use crate::quota::QuotaTracker;

/// Complete ledger contents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LedgerState {
    pub(crate) bottles: BTreeMap<RecordAddress, Bottle>,
    pub(crate) quota: QuotaTracker,
    /// Next address handed out. Addresses are never reused.
    pub(crate) next_address: u64,
}

/// Create a fresh, empty ledger.
pub fn create_initial_state() -> LedgerState {
    LedgerState::default()
}

impl LedgerState {
    pub fn bottle(&self, address: RecordAddress) -> Option<&Bottle> {
        self.bottles.get(&address)
    }

    pub fn bottles(&self) -> impl Iterator<Item = (RecordAddress, &Bottle)> + '_ {
        self.bottles.iter().map(|(a, b)| (*a, b))
    }

    pub fn len(&self) -> usize {
        self.bottles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bottles.is_empty()
    }

    pub fn drifting_count(&self) -> usize {
        self.bottles.values().filter(|b| b.state.is_drifting()).count()
    }

    pub fn retrieved_count(&self) -> usize {
        self.len() - self.drifting_count()
    }

    pub fn quota(&self) -> &QuotaTracker {
        &self.quota
    }

    pub fn next_address(&self) -> RecordAddress {
        RecordAddress(self.next_address)
    }

    /// Actions `actor` has left on the day containing `timestamp`.
    pub fn remaining_actions(&self, actor: &ActorId, timestamp: i64) -> u8 {
        self.quota.remaining(actor, timestamp)
    }

    /// Every bottle in its on-ledger byte form, in address order.
    /// This is what an indexer scanning the ledger sees.
    pub fn encoded_accounts(&self) -> Result<Vec<(RecordAddress, Vec<u8>)>, BottleError> {
        self.bottles
            .iter()
            .map(|(address, bottle)| Ok((*address, layout::encode_padded(bottle)?)))
            .collect()
    }

    pub(crate) fn allocate_address(&mut self) -> RecordAddress {
        let address = RecordAddress(self.next_address);
        self.next_address += 1;
        address
    }
}
