//! Snapshot Codec — LedgerState encoder/decoder.
//!
//! Pure codec layer. No side-effects, no timestamps, no envelope.
//!
//! - `encode_snapshot`:  LedgerState → JSON string
//! - `decode_snapshot`:  JSON string → LedgerState (strict, no defaults)
//! - `restore_snapshot`: decode + invariant validation
//! - `export_snapshot_to_file` / `import_snapshot_from_file`: file I/O
//! - `snapshot_hash`:    SHA-256 of the JSON encoding (lowercase hex)

use std::fs;
use std::io;
use std::path::Path;

use sha2::{Digest, Sha256};
use thiserror::Error;

use bottle_kernel::invariants::{try_validate_invariants, InvariantViolation};
use bottle_kernel::state::LedgerState;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("SerializationError: {0}")]
    Serialization(String),
    /// Malformed JSON, missing fields or unknown fields.
    #[error("DeserializationError: {0}")]
    Deserialization(String),
    #[error("InvariantViolation: {0}")]
    Invariant(#[from] InvariantViolation),
    #[error("IoError: {0}")]
    Io(#[from] io::Error),
    /// Envelope hash does not match its content.
    #[error("snapshot at sequence {sequence} failed hash verification")]
    HashMismatch { sequence: u64 },
    #[error("snapshot layout version {found} is not supported (expected {expected})")]
    LayoutVersion { found: u32, expected: u32 },
}

// ---------------------------------------------------------------------------
// Encoder / decoder
// ---------------------------------------------------------------------------

/// Encode a LedgerState to JSON. BTreeMaps keep the output ordered, so
/// identical states produce identical bytes.
pub fn encode_snapshot(state: &LedgerState) -> Result<String, SnapshotError> {
    serde_json::to_string(state).map_err(|e| SnapshotError::Serialization(e.to_string()))
}

/// Strict decode: unknown and missing fields both fail. No invariant
/// checks; use `restore_snapshot` for untrusted input.
pub fn decode_snapshot(json: &str) -> Result<LedgerState, SnapshotError> {
    serde_json::from_str::<LedgerState>(json)
        .map_err(|e| SnapshotError::Deserialization(e.to_string()))
}

/// Decode and validate ledger invariants.
pub fn restore_snapshot(json: &str) -> Result<LedgerState, SnapshotError> {
    let state = decode_snapshot(json)?;
    try_validate_invariants(&state)?;
    Ok(state)
}

// ---------------------------------------------------------------------------
// File I/O
// ---------------------------------------------------------------------------

pub fn export_snapshot_to_file(state: &LedgerState, path: &Path) -> Result<(), SnapshotError> {
    let json = encode_snapshot(state)?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, json.as_bytes())?;
    Ok(())
}

pub fn import_snapshot_from_file(path: &Path) -> Result<LedgerState, SnapshotError> {
    let content = fs::read_to_string(path)?;
    restore_snapshot(&content)
}

// ---------------------------------------------------------------------------
// Hash
// ---------------------------------------------------------------------------

/// SHA-256 of the serde encoding, for file integrity.
///
/// NOTE: not the kernel's `canonical_hash`, which has its own field order
/// and carries the layout version.
pub fn snapshot_hash(state: &LedgerState) -> Result<String, SnapshotError> {
    let json = encode_snapshot(state)?;
    Ok(hex::encode(Sha256::digest(json.as_bytes())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bottle_kernel::domain::ActorId;
    use bottle_kernel::engine::BottleEngine;
    use bottle_kernel::instruction::Transaction;

    const ALICE: ActorId = ActorId::new([1; 32]);
    const BOB: ActorId = ActorId::new([2; 32]);

    fn make_test_state() -> LedgerState {
        let mut engine = BottleEngine::new();
        let first = engine
            .apply(&Transaction::throw(1, 1_000, ALICE, 7, "first"))
            .unwrap()
            .address();
        engine
            .apply(&Transaction::throw(2, 2_000, BOB, 7, "second"))
            .unwrap();
        let asset = engine.state().bottle(first).unwrap().asset;
        engine
            .apply(&Transaction::retrieve(3, 3_000, BOB, first, asset))
            .unwrap();
        engine.into_state()
    }

    #[test]
    fn roundtrip_produces_identical_json() {
        let state = make_test_state();
        let json1 = encode_snapshot(&state).unwrap();
        let decoded = decode_snapshot(&json1).unwrap();
        assert_eq!(decoded, state);
        assert_eq!(json1, encode_snapshot(&decoded).unwrap());
    }

    #[test]
    fn self_retrieved_bottle_fails_restore() {
        let state = make_test_state();
        let bob = BOB.to_string();
        let alice = ALICE.to_string();
        // Hand the retrieved bottle back to its own sender.
        let json = encode_snapshot(&state).unwrap().replacen(
            &format!("\"retrievee\":\"{bob}\""),
            &format!("\"retrievee\":\"{alice}\""),
            1,
        );

        match restore_snapshot(&json).unwrap_err() {
            SnapshotError::Invariant(v) => assert_eq!(v.invariant, "self_retrieval"),
            other => panic!("Expected Invariant, got: {:?}", other),
        }
    }

    #[test]
    fn unknown_field_is_rejected() {
        let json = r#"{"bottles":{},"quota":{"counters":{}},"next_address":0,"extra":1}"#;
        assert!(matches!(
            decode_snapshot(json),
            Err(SnapshotError::Deserialization(_))
        ));
    }

    #[test]
    fn missing_field_is_rejected() {
        assert!(matches!(
            decode_snapshot(r#"{"bottles":{}}"#),
            Err(SnapshotError::Deserialization(_))
        ));
    }

    #[test]
    fn file_roundtrip_and_hash_parity() {
        let state = make_test_state();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("state.json");

        export_snapshot_to_file(&state, &path).unwrap();
        assert_eq!(import_snapshot_from_file(&path).unwrap(), state);

        let file_hash = hex::encode(Sha256::digest(std::fs::read(&path).unwrap()));
        assert_eq!(snapshot_hash(&state).unwrap(), file_hash);
    }

    #[test]
    fn corrupted_file_returns_deserialization_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, b"{ not valid json !!!}").unwrap();
        assert!(matches!(
            import_snapshot_from_file(&path),
            Err(SnapshotError::Deserialization(_))
        ));
    }
}
