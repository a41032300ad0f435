//! Bottle Ledger — Canonical Hashing
//!
//! Deterministic canonical serialization + SHA-256 of ledger state.
//!
//! Rules:
//!   - Bottles ordered by address
//!   - Quota counters ordered by (day, actor)
//!   - Keys as lowercase hex, integers as JSON numbers
//!   - UTF-8 JSON, no whitespace, fixed field order

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::domain::{Bottle, BottleState, RecordAddress};
use crate::state::LedgerState;
use crate::LAYOUT_VERSION;

/// Canonical serialization of the ledger to UTF-8 JSON bytes.
/// `layout_version` comes first and binds the hash to the record layout.
pub fn canonical_serialize(state: &LedgerState) -> Vec<u8> {
    build_canonical_value(state).to_string().into_bytes()
}

/// SHA-256 of the canonical serialization. Lowercase hex.
pub fn canonical_hash(state: &LedgerState) -> String {
    hex::encode(Sha256::digest(canonical_serialize(state)))
}

fn build_canonical_value(state: &LedgerState) -> Value {
    let bottles: Vec<Value> = state
        .bottles()
        .map(|(address, bottle)| bottle_value(address, bottle))
        .collect();

    let quota: Vec<Value> = state
        .quota()
        .entries()
        .map(|(day, actor, count)| {
            let mut m = Map::new();
            m.insert("day".to_string(), Value::from(day));
            m.insert("actor".to_string(), Value::String(actor.to_string()));
            m.insert("count".to_string(), Value::from(count));
            Value::Object(m)
        })
        .collect();

    let mut root = Map::new();
    root.insert("layout_version".to_string(), Value::from(LAYOUT_VERSION));
    root.insert("bottles".to_string(), Value::Array(bottles));
    root.insert("quota".to_string(), Value::Array(quota));
    root.insert(
        "next_address".to_string(),
        Value::from(state.next_address().0),
    );
    Value::Object(root)
}

fn bottle_value(address: RecordAddress, bottle: &Bottle) -> Value {
    let mut m = Map::new();
    m.insert("address".to_string(), Value::from(address.0));
    m.insert("id".to_string(), Value::from(bottle.id));
    m.insert("sender".to_string(), Value::String(bottle.sender.to_string()));
    m.insert("thrown_at".to_string(), Value::from(bottle.thrown_at));
    m.insert("state".to_string(), Value::from(bottle.state.as_byte()));
    match bottle.state {
        BottleState::Drifting => {
            m.insert("retrievee".to_string(), Value::Null);
            m.insert("retrieved_at".to_string(), Value::Null);
        }
        BottleState::Retrieved {
            retrievee,
            retrieved_at,
        } => {
            m.insert("retrievee".to_string(), Value::String(retrievee.to_string()));
            m.insert("retrieved_at".to_string(), Value::from(retrieved_at));
        }
    }
    m.insert("message".to_string(), Value::String(bottle.message.clone()));
    m.insert(
        "asset_escrow".to_string(),
        Value::String(bottle.asset.escrow.to_string()),
    );
    m.insert("asset_amount".to_string(), Value::from(bottle.asset.amount));
    Value::Object(m)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ActorId;
    use crate::operations::{retrieve_bottle, throw_bottle};
    use crate::state::create_initial_state;

    #[test]
    fn empty_ledger_serialization_is_fixed() {
        let bytes = canonical_serialize(&create_initial_state());
        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            r#"{"layout_version":1,"bottles":[],"quota":[],"next_address":0}"#
        );
    }

    #[test]
    fn hash_tracks_state_changes() {
        let alice = ActorId::new([1; 32]);
        let bob = ActorId::new([2; 32]);
        let mut state = create_initial_state();
        let h0 = canonical_hash(&state);

        let address = throw_bottle(&mut state, &alice, 10, 1, 0, "hi")
            .unwrap()
            .address();
        let h1 = canonical_hash(&state);
        assert_ne!(h0, h1);
        assert_eq!(h1, canonical_hash(&state.clone()));

        let asset = state.bottle(address).unwrap().asset;
        retrieve_bottle(&mut state, &bob, 20, address, &asset).unwrap();
        let h2 = canonical_hash(&state);
        assert_ne!(h1, h2);
        assert_eq!(h2.len(), 64);
    }
}
