//! Bottle Ledger — Core Domain Types
//!
//! Pure data. No behaviour beyond accessors and conversions.
//! Timestamps are i64 unix seconds as reported by the ledger clock.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

// ── Fixed limits ───────────────────────────────────────────────────

/// Longest message a bottle may carry, in UTF-8 bytes.
pub const MAX_MESSAGE_BYTES: usize = 400;

/// Throw + retrieve actions allowed per actor per day.
pub const MAX_DAILY_ACTIONS: u8 = 3;

pub const SECONDS_PER_DAY: i64 = 86_400;

/// Seed for escrow key derivation.
pub const BOTTLE_ASSET_SEED: &str = "bottle_asset";

pub const KEY_LEN: usize = 32;

// ── Identifiers ────────────────────────────────────────────────────

/// Identifier of a party that throws or retrieves bottles.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActorId(#[serde(with = "hex_key")] pub [u8; KEY_LEN]);

impl ActorId {
    pub const fn new(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; KEY_LEN]
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ActorId({})", &hex::encode(self.0)[..12])
    }
}

impl FromStr for ActorId {
    type Err = ParseKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_key(s).map(Self)
    }
}

/// Account holding the asset deposited with a bottle.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EscrowKey(#[serde(with = "hex_key")] pub [u8; KEY_LEN]);

impl EscrowKey {
    /// Derive the escrow account for `(sender, id)`.
    ///
    /// `SHA-256("bottle_asset" || sender || id.to_le_bytes())`
    pub fn derive(sender: &ActorId, id: u64) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(BOTTLE_ASSET_SEED.as_bytes());
        hasher.update(sender.as_bytes());
        hasher.update(id.to_le_bytes());
        Self(hasher.finalize().into())
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl fmt::Display for EscrowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for EscrowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EscrowKey({})", &hex::encode(self.0)[..12])
    }
}

impl FromStr for EscrowKey {
    type Err = ParseKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_key(s).map(Self)
    }
}

/// Store-assigned address of a bottle. Never reused.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordAddress(pub u64);

impl fmt::Display for RecordAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RecordAddress {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<u64>().map(Self)
    }
}

/// Text that is not a 32-byte hex key.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("key `{raw}` is not 32 hex-encoded bytes")]
pub struct ParseKeyError {
    pub raw: String,
}

fn parse_key(s: &str) -> Result<[u8; KEY_LEN], ParseKeyError> {
    let invalid = || ParseKeyError { raw: s.to_string() };
    let bytes = hex::decode(s).map_err(|_| invalid())?;
    bytes.try_into().map_err(|_| invalid())
}

mod hex_key {
    use serde::{de, Deserialize, Deserializer, Serializer};

    use super::KEY_LEN;

    pub fn serialize<S: Serializer>(key: &[u8; KEY_LEN], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&hex::encode(key))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<[u8; KEY_LEN], D::Error> {
        let raw = String::deserialize(d)?;
        let bytes = hex::decode(&raw).map_err(de::Error::custom)?;
        bytes
            .try_into()
            .map_err(|_| de::Error::custom(format!("expected {} key bytes", KEY_LEN)))
    }
}

// ── Asset reference ────────────────────────────────────────────────

/// Opaque handle to the external asset deposited with a bottle.
/// Set at creation; a retrieve must present the identical reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AssetRef {
    pub escrow: EscrowKey,
    pub amount: u64,
}

impl AssetRef {
    pub fn for_bottle(sender: &ActorId, id: u64, amount: u64) -> Self {
        Self {
            escrow: EscrowKey::derive(sender, id),
            amount,
        }
    }
}

// ── Bottle ─────────────────────────────────────────────────────────

/// Lifecycle state. Drifting → Retrieved is the only transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BottleState {
    Drifting,
    Retrieved { retrievee: ActorId, retrieved_at: i64 },
}

impl BottleState {
    pub const DRIFTING_BYTE: u8 = 0;
    pub const RETRIEVED_BYTE: u8 = 1;

    /// The single state byte stored at the layout's state offset.
    pub fn as_byte(&self) -> u8 {
        match self {
            BottleState::Drifting => Self::DRIFTING_BYTE,
            BottleState::Retrieved { .. } => Self::RETRIEVED_BYTE,
        }
    }

    pub fn is_drifting(&self) -> bool {
        matches!(self, BottleState::Drifting)
    }
}

/// A thrown message and its claim status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Bottle {
    pub id: u64,
    pub thrown_at: i64,
    pub sender: ActorId,
    pub message: String,
    pub state: BottleState,
    pub asset: AssetRef,
}

impl Bottle {
    pub fn retrievee(&self) -> Option<ActorId> {
        match self.state {
            BottleState::Retrieved { retrievee, .. } => Some(retrievee),
            BottleState::Drifting => None,
        }
    }

    pub fn retrieved_at(&self) -> Option<i64> {
        match self.state {
            BottleState::Retrieved { retrieved_at, .. } => Some(retrieved_at),
            BottleState::Drifting => None,
        }
    }
}

// ── Transaction outcome ────────────────────────────────────────────

/// Structured result of a committed transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransactionOutcome {
    Thrown {
        address: RecordAddress,
        /// Actions used by the sender today, including this one.
        quota_used: u8,
    },
    Retrieved {
        address: RecordAddress,
        quota_used: u8,
    },
}

impl TransactionOutcome {
    pub fn address(&self) -> RecordAddress {
        match self {
            TransactionOutcome::Thrown { address, .. }
            | TransactionOutcome::Retrieved { address, .. } => *address,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn actor_parses_from_hex_and_displays_back() {
        let raw = "ab".repeat(KEY_LEN);
        let actor: ActorId = raw.parse().unwrap();
        assert_eq!(actor, ActorId::new([0xab; KEY_LEN]));
        assert_eq!(actor.to_string(), raw);
    }

    #[test]
    fn bad_keys_are_parse_errors() {
        for raw in ["zz".repeat(KEY_LEN), "ab".repeat(KEY_LEN - 1), String::new()] {
            assert_eq!(
                raw.parse::<EscrowKey>(),
                Err(ParseKeyError { raw: raw.clone() })
            );
        }
    }
}
