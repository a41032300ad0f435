//! Audit — determinism verification and ledger comparison.
//!
//! All counts are i64 so deltas can go negative.

use std::collections::BTreeSet;

use bottle_kernel::domain::RecordAddress;
use bottle_kernel::hashing::canonical_hash;
use bottle_kernel::instruction::Transaction;
use bottle_kernel::state::LedgerState;

use crate::error::{Result, RuntimeError};
use crate::ledger::Ledger;
use crate::replay;
use crate::snapshot;

/// Replay the same transactions twice and require identical hashes.
/// Returns the hash.
pub fn verify_determinism(txs: &[Transaction]) -> Result<String> {
    let first = replay::rebuild_hash(txs)?;
    let second = replay::rebuild_hash(txs)?;
    if first != second {
        return Err(RuntimeError::Determinism { first, second });
    }
    Ok(first)
}

/// Structured difference between two ledgers, `a` taken as the baseline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerDiff {
    pub bottle_count_a: i64,
    pub bottle_count_b: i64,
    pub bottle_count_delta: i64,
    pub drifting_a: i64,
    pub drifting_b: i64,
    pub drifting_delta: i64,
    pub retrieved_a: i64,
    pub retrieved_b: i64,
    pub retrieved_delta: i64,
    /// Present in `b` only.
    pub added: Vec<RecordAddress>,
    /// Present in `a` only.
    pub removed: Vec<RecordAddress>,
    /// Drifting in `a`, Retrieved in `b`.
    pub newly_retrieved: Vec<RecordAddress>,
    /// Present in both with contents that differ in any other way.
    pub diverged: Vec<RecordAddress>,
    pub quota_matches: bool,
}

impl LedgerDiff {
    pub fn is_identical(&self) -> bool {
        self.added.is_empty()
            && self.removed.is_empty()
            && self.newly_retrieved.is_empty()
            && self.diverged.is_empty()
            && self.quota_matches
    }
}

pub fn compare_ledgers(a: &LedgerState, b: &LedgerState) -> LedgerDiff {
    let addrs_a: BTreeSet<RecordAddress> = a.bottles().map(|(addr, _)| addr).collect();
    let addrs_b: BTreeSet<RecordAddress> = b.bottles().map(|(addr, _)| addr).collect();

    let added = addrs_b.difference(&addrs_a).copied().collect();
    let removed = addrs_a.difference(&addrs_b).copied().collect();

    let mut newly_retrieved = Vec::new();
    let mut diverged = Vec::new();
    for addr in addrs_a.intersection(&addrs_b) {
        let (Some(before), Some(after)) = (a.bottle(*addr), b.bottle(*addr)) else {
            continue;
        };
        if before == after {
            continue;
        }
        let only_state_changed = before.state.is_drifting()
            && !after.state.is_drifting()
            && before.id == after.id
            && before.sender == after.sender
            && before.thrown_at == after.thrown_at
            && before.message == after.message
            && before.asset == after.asset;
        if only_state_changed {
            newly_retrieved.push(*addr);
        } else {
            diverged.push(*addr);
        }
    }

    let count = |n: usize| n as i64;
    LedgerDiff {
        bottle_count_a: count(a.len()),
        bottle_count_b: count(b.len()),
        bottle_count_delta: count(b.len()) - count(a.len()),
        drifting_a: count(a.drifting_count()),
        drifting_b: count(b.drifting_count()),
        drifting_delta: count(b.drifting_count()) - count(a.drifting_count()),
        retrieved_a: count(a.retrieved_count()),
        retrieved_b: count(b.retrieved_count()),
        retrieved_delta: count(b.retrieved_count()) - count(a.retrieved_count()),
        added,
        removed,
        newly_retrieved,
        diverged,
        quota_matches: a.quota() == b.quota(),
    }
}

/// Latest snapshot checked against a replay of the log prefix it covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotCheck {
    pub sequence: u64,
    /// Envelope passed hash, layout and invariant checks.
    pub restorable: bool,
    /// Canonical hash equals the replayed prefix.
    pub matches_replay: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditReport {
    pub transactions: usize,
    pub replay_hash: String,
    pub live_hash: String,
    /// Live state against full replay; empty when they agree.
    pub live_vs_replay: LedgerDiff,
    pub snapshot: Option<SnapshotCheck>,
}

impl AuditReport {
    pub fn is_clean(&self) -> bool {
        self.replay_hash == self.live_hash
            && self.snapshot.as_ref().map_or(true, |s| s.restorable && s.matches_replay)
    }
}

/// Full audit of an open ledger: double replay, live-state comparison and
/// latest-snapshot parity.
pub fn audit_ledger(ledger: &Ledger) -> Result<AuditReport> {
    let txs = ledger.transactions()?;
    let replay_hash = verify_determinism(&txs)?;
    let (replayed, _) = replay::rebuild_state(&txs)?;

    let snapshot = match snapshot::load_latest_snapshot(&ledger.snapshot_dir())? {
        Some(snap) => {
            let covered = txs
                .iter()
                .take_while(|tx| tx.sequence <= snap.sequence)
                .cloned()
                .collect::<Vec<_>>();
            let prefix_hash = replay::rebuild_hash(&covered)?;
            Some(SnapshotCheck {
                sequence: snap.sequence,
                restorable: snapshot::restore_from_snapshot(&snap).is_ok(),
                matches_replay: covered.len() as u64 == snap.sequence
                    && prefix_hash == snap.canonical_hash,
            })
        }
        None => None,
    };

    Ok(AuditReport {
        transactions: txs.len(),
        replay_hash,
        live_hash: canonical_hash(ledger.state()),
        live_vs_replay: compare_ledgers(ledger.state(), &replayed),
        snapshot,
    })
}
