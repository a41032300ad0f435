//! Snapshot layer — periodic ledger snapshots.
//!
//! A snapshot carries the codec encoding of the state, its integrity hash
//! and the kernel's canonical hash. No timestamps in snapshot content.
//!
//! A snapshot that fails any check is ignored and the ledger falls back to
//! full replay.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use bottle_kernel::hashing::canonical_hash;
use bottle_kernel::state::LedgerState;
use bottle_kernel::LAYOUT_VERSION;

use crate::snapshot_codec::{encode_snapshot, restore_snapshot, SnapshotError};

/// Snapshot on-disk format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Snapshot {
    /// Last transaction sequence folded into this state.
    pub sequence: u64,
    /// Record layout the state was produced under.
    pub layout_version: u32,
    /// `snapshot_codec` encoding of the state.
    pub state_json: String,
    /// SHA-256 of `state_json`.
    pub hash: String,
    /// Kernel canonical hash of the state, comparable with replay.
    pub canonical_hash: String,
}

fn snapshot_path(dir: &Path, sequence: u64) -> PathBuf {
    dir.join(format!("snapshot_{:06}.json", sequence))
}

/// Build the envelope for `state` at `sequence` without touching disk.
pub fn make_snapshot(sequence: u64, state: &LedgerState) -> Result<Snapshot, SnapshotError> {
    let state_json = encode_snapshot(state)?;
    let hash = hex::encode(Sha256::digest(state_json.as_bytes()));
    Ok(Snapshot {
        sequence,
        layout_version: LAYOUT_VERSION,
        state_json,
        hash,
        canonical_hash: canonical_hash(state),
    })
}

/// Write a snapshot of `state` taken at `sequence`. fsyncs before returning.
pub fn save_snapshot(
    dir: &Path,
    sequence: u64,
    state: &LedgerState,
) -> Result<PathBuf, SnapshotError> {
    fs::create_dir_all(dir)?;

    let snap = make_snapshot(sequence, state)?;
    let content =
        serde_json::to_string(&snap).map_err(|e| SnapshotError::Serialization(e.to_string()))?;

    let path = snapshot_path(dir, sequence);
    let mut file = File::create(&path)?;
    file.write_all(content.as_bytes())?;
    file.sync_all()?;

    Ok(path)
}

/// Load the snapshot at `sequence`, if one exists.
pub fn load_snapshot(dir: &Path, sequence: u64) -> Result<Option<Snapshot>, SnapshotError> {
    let path = snapshot_path(dir, sequence);
    if !path.exists() {
        return Ok(None);
    }

    let content = fs::read_to_string(&path)?;
    let snap = serde_json::from_str(&content)
        .map_err(|e| SnapshotError::Deserialization(format!("Bad snapshot: {}", e)))?;
    Ok(Some(snap))
}

/// Scan for `snapshot_NNNNNN.json` and load the highest sequence.
pub fn load_latest_snapshot(dir: &Path) -> Result<Option<Snapshot>, SnapshotError> {
    match latest_snapshot_sequence(dir)? {
        Some(seq) => load_snapshot(dir, seq),
        None => Ok(None),
    }
}

pub fn latest_snapshot_sequence(dir: &Path) -> Result<Option<u64>, SnapshotError> {
    if !dir.exists() {
        return Ok(None);
    }

    let mut best: Option<u64> = None;
    for entry in fs::read_dir(dir)? {
        let name = entry?.file_name();
        let seq = name
            .to_str()
            .and_then(|n| n.strip_prefix("snapshot_"))
            .and_then(|n| n.strip_suffix(".json"))
            .and_then(|n| n.parse::<u64>().ok());
        if let Some(seq) = seq {
            best = Some(best.map_or(seq, |b| b.max(seq)));
        }
    }
    Ok(best)
}

/// True when `hash` matches the SHA-256 of `state_json`.
pub fn verify_snapshot_hash(snap: &Snapshot) -> bool {
    hex::encode(Sha256::digest(snap.state_json.as_bytes())) == snap.hash
}

/// Check every envelope field and decode the state with invariant checks.
pub fn restore_from_snapshot(snap: &Snapshot) -> Result<LedgerState, SnapshotError> {
    if snap.layout_version != LAYOUT_VERSION {
        return Err(SnapshotError::LayoutVersion {
            found: snap.layout_version,
            expected: LAYOUT_VERSION,
        });
    }
    if !verify_snapshot_hash(snap) {
        return Err(SnapshotError::HashMismatch {
            sequence: snap.sequence,
        });
    }
    let state = restore_snapshot(&snap.state_json)?;
    if canonical_hash(&state) != snap.canonical_hash {
        return Err(SnapshotError::HashMismatch {
            sequence: snap.sequence,
        });
    }
    Ok(state)
}
