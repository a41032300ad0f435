//! Bottle Ledger — Record Layout
//!
//! Fixed-offset binary encoding of a bottle. Indexers filter on these
//! offsets without decoding, so every offset below is part of the public
//! contract. All integers little-endian.
//!
//! ```text
//!   0  discriminator   8
//!   8  id              8
//!  16  sender         32
//!  48  thrown_at       8
//!  56  state           1   0 = Drifting, 1 = Retrieved
//!  57  retrievee      32   zero while Drifting
//!  89  retrieved_at    8   zero while Drifting
//!  97  message         4 + len (u32 length prefix)
//!   .  asset escrow   32
//!   .  asset amount    8
//! ```

use std::sync::OnceLock;

use sha2::{Digest, Sha256};

use crate::domain::{
    ActorId, AssetRef, Bottle, BottleState, EscrowKey, KEY_LEN, MAX_MESSAGE_BYTES,
};
use crate::error::BottleError;

pub const DISCRIMINATOR_SIZE: usize = 8;
pub const ID_SIZE: usize = 8;
pub const TIMESTAMP_SIZE: usize = 8;
pub const STATE_SIZE: usize = 1;
pub const STRING_PREFIX_SIZE: usize = 4;
pub const AMOUNT_SIZE: usize = 8;

pub const DISCRIMINATOR_OFFSET: usize = 0;
pub const ID_OFFSET: usize = DISCRIMINATOR_OFFSET + DISCRIMINATOR_SIZE;
pub const SENDER_OFFSET: usize = ID_OFFSET + ID_SIZE;
pub const THROWN_AT_OFFSET: usize = SENDER_OFFSET + KEY_LEN;
pub const STATE_OFFSET: usize = THROWN_AT_OFFSET + TIMESTAMP_SIZE;
pub const RETRIEVEE_OFFSET: usize = STATE_OFFSET + STATE_SIZE;
pub const RETRIEVED_AT_OFFSET: usize = RETRIEVEE_OFFSET + KEY_LEN;
pub const MESSAGE_OFFSET: usize = RETRIEVED_AT_OFFSET + TIMESTAMP_SIZE;

/// Size of the trailing asset reference.
pub const ASSET_SIZE: usize = KEY_LEN + AMOUNT_SIZE;

/// Shortest valid record: empty message.
pub const MIN_RECORD_SIZE: usize = MESSAGE_OFFSET + STRING_PREFIX_SIZE + ASSET_SIZE;

/// Space allocated for every record account: longest message.
pub const ACCOUNT_SPACE: usize = MIN_RECORD_SIZE + MAX_MESSAGE_BYTES;

/// Stable type identifier the discriminator is derived from.
pub const BOTTLE_TYPE_NAME: &str = "Bottle";

// Compile-time guard on the indexer-facing offsets.
const _: () = {
    assert!(ID_OFFSET == 8);
    assert!(SENDER_OFFSET == 16);
    assert!(THROWN_AT_OFFSET == 48);
    assert!(STATE_OFFSET == 56);
    assert!(RETRIEVEE_OFFSET == 57);
    assert!(RETRIEVED_AT_OFFSET == 89);
    assert!(MESSAGE_OFFSET == 97);
};

static BOTTLE_DISCRIMINATOR: OnceLock<[u8; DISCRIMINATOR_SIZE]> = OnceLock::new();

/// First 8 bytes of `SHA-256("account:<type_name>")`.
pub fn discriminator_for(type_name: &str) -> [u8; DISCRIMINATOR_SIZE] {
    let digest = Sha256::digest(format!("account:{}", type_name).as_bytes());
    let mut out = [0u8; DISCRIMINATOR_SIZE];
    out.copy_from_slice(&digest[..DISCRIMINATOR_SIZE]);
    out
}

/// The bottle discriminator. Computed once per process.
pub fn bottle_discriminator() -> [u8; DISCRIMINATOR_SIZE] {
    *BOTTLE_DISCRIMINATOR.get_or_init(|| discriminator_for(BOTTLE_TYPE_NAME))
}

/// Encoded length of `bottle`.
pub fn encoded_len(bottle: &Bottle) -> usize {
    MIN_RECORD_SIZE + bottle.message.len()
}

// ---------------------------------------------------------------------------
// Encoder
// ---------------------------------------------------------------------------

/// Encode a bottle at the canonical offsets.
///
/// The message length is checked before any buffer is produced.
pub fn encode(bottle: &Bottle) -> Result<Vec<u8>, BottleError> {
    let len = bottle.message.len();
    if len > MAX_MESSAGE_BYTES {
        return Err(BottleError::MessageTooLong { len });
    }

    let mut buf = Vec::with_capacity(MIN_RECORD_SIZE + len);
    buf.extend_from_slice(&bottle_discriminator());
    buf.extend_from_slice(&bottle.id.to_le_bytes());
    buf.extend_from_slice(bottle.sender.as_bytes());
    buf.extend_from_slice(&bottle.thrown_at.to_le_bytes());
    buf.push(bottle.state.as_byte());

    let (retrievee, retrieved_at) = match bottle.state {
        BottleState::Drifting => (ActorId::default(), 0i64),
        BottleState::Retrieved {
            retrievee,
            retrieved_at,
        } => (retrievee, retrieved_at),
    };
    buf.extend_from_slice(retrievee.as_bytes());
    buf.extend_from_slice(&retrieved_at.to_le_bytes());

    buf.extend_from_slice(&(len as u32).to_le_bytes());
    buf.extend_from_slice(bottle.message.as_bytes());

    buf.extend_from_slice(bottle.asset.escrow.as_bytes());
    buf.extend_from_slice(&bottle.asset.amount.to_le_bytes());

    debug_assert_eq!(buf.len(), encoded_len(bottle));
    Ok(buf)
}

/// Encode into a zero-padded buffer of exactly `ACCOUNT_SPACE` bytes.
pub fn encode_padded(bottle: &Bottle) -> Result<Vec<u8>, BottleError> {
    let mut buf = encode(bottle)?;
    buf.resize(ACCOUNT_SPACE, 0);
    Ok(buf)
}

// ---------------------------------------------------------------------------
// Decoder
// ---------------------------------------------------------------------------

/// Decode a bottle from `data`.
///
/// Trailing bytes after the asset reference are ignored (padded
/// accounts). Any structural problem is `MalformedRecord`.
pub fn decode(data: &[u8]) -> Result<Bottle, BottleError> {
    if data.len() < MIN_RECORD_SIZE {
        return Err(malformed("buffer shorter than the fixed fields"));
    }
    if !is_bottle(data) {
        return Err(malformed("discriminator mismatch"));
    }

    let id = read_u64(data, ID_OFFSET);
    let sender = ActorId::new(read_key(data, SENDER_OFFSET));
    let thrown_at = read_i64(data, THROWN_AT_OFFSET);
    let state_byte = data[STATE_OFFSET];
    let retrievee = ActorId::new(read_key(data, RETRIEVEE_OFFSET));
    let retrieved_at = read_i64(data, RETRIEVED_AT_OFFSET);

    let len = read_u32(data, MESSAGE_OFFSET) as usize;
    if len > MAX_MESSAGE_BYTES {
        return Err(malformed("message length prefix exceeds the limit"));
    }
    let body_start = MESSAGE_OFFSET + STRING_PREFIX_SIZE;
    let asset_start = body_start + len;
    if data.len() < asset_start + ASSET_SIZE {
        return Err(malformed("message length prefix exceeds the buffer"));
    }
    let message = std::str::from_utf8(&data[body_start..asset_start])
        .map_err(|_| malformed("message is not valid UTF-8"))?
        .to_string();

    let asset = AssetRef {
        escrow: EscrowKey(read_key(data, asset_start)),
        amount: read_u64(data, asset_start + KEY_LEN),
    };

    let state = match state_byte {
        BottleState::DRIFTING_BYTE => {
            if !retrievee.is_zero() || retrieved_at != 0 {
                return Err(malformed("drifting record carries retrieval fields"));
            }
            BottleState::Drifting
        }
        BottleState::RETRIEVED_BYTE => {
            if retrievee == sender {
                return Err(malformed("record retrieved by its own sender"));
            }
            BottleState::Retrieved {
                retrievee,
                retrieved_at,
            }
        }
        _ => return Err(malformed("unknown state byte")),
    };

    Ok(Bottle {
        id,
        thrown_at,
        sender,
        message,
        state,
        asset,
    })
}

/// True if `data` starts with the bottle discriminator.
pub fn is_bottle(data: &[u8]) -> bool {
    data.len() >= DISCRIMINATOR_SIZE && data[..DISCRIMINATOR_SIZE] == bottle_discriminator()
}

fn malformed(reason: &'static str) -> BottleError {
    BottleError::MalformedRecord { reason }
}

fn read_key(data: &[u8], offset: usize) -> [u8; KEY_LEN] {
    let mut out = [0u8; KEY_LEN];
    out.copy_from_slice(&data[offset..offset + KEY_LEN]);
    out
}

fn read_u64(data: &[u8], offset: usize) -> u64 {
    let mut out = [0u8; 8];
    out.copy_from_slice(&data[offset..offset + 8]);
    u64::from_le_bytes(out)
}

pub(crate) fn read_i64(data: &[u8], offset: usize) -> i64 {
    let mut out = [0u8; 8];
    out.copy_from_slice(&data[offset..offset + 8]);
    i64::from_le_bytes(out)
}

fn read_u32(data: &[u8], offset: usize) -> u32 {
    let mut out = [0u8; 4];
    out.copy_from_slice(&data[offset..offset + 4]);
    u32::from_le_bytes(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drifting(message: &str) -> Bottle {
        let sender = ActorId::new([7; 32]);
        Bottle {
            id: 1,
            thrown_at: 1_000,
            sender,
            message: message.to_string(),
            state: BottleState::Drifting,
            asset: AssetRef::for_bottle(&sender, 1, 0),
        }
    }

    #[test]
    fn discriminator_is_sha256_prefix_of_account_name() {
        let digest = Sha256::digest(b"account:Bottle");
        assert_eq!(bottle_discriminator()[..], digest[..8]);
        assert_eq!(bottle_discriminator(), discriminator_for("Bottle"));
        assert_ne!(bottle_discriminator(), discriminator_for("Bag"));
    }

    #[test]
    fn fields_land_at_fixed_offsets() {
        let mut bottle = drifting("Hello Bottle");
        bottle.id = 0x0102_0304_0506_0708;
        bottle.thrown_at = -5;
        let buf = encode(&bottle).unwrap();

        assert_eq!(buf.len(), MIN_RECORD_SIZE + 12);
        assert_eq!(&buf[0..8], &bottle_discriminator());
        assert_eq!(&buf[8..16], &bottle.id.to_le_bytes());
        assert_eq!(&buf[16..48], bottle.sender.as_bytes());
        assert_eq!(&buf[48..56], &(-5i64).to_le_bytes());
        assert_eq!(buf[56], 0);
        assert!(buf[57..97].iter().all(|b| *b == 0));
        assert_eq!(&buf[97..101], &12u32.to_le_bytes());
        assert_eq!(&buf[101..113], b"Hello Bottle");
        assert_eq!(&buf[113..145], bottle.asset.escrow.as_bytes());
        assert_eq!(&buf[145..153], &0u64.to_le_bytes());
    }

    #[test]
    fn retrieved_record_roundtrips() {
        let mut bottle = drifting("found me");
        bottle.asset.amount = 42;
        bottle.state = BottleState::Retrieved {
            retrievee: ActorId::new([9; 32]),
            retrieved_at: 90_000,
        };
        let buf = encode(&bottle).unwrap();
        assert_eq!(buf[STATE_OFFSET], 1);
        assert_eq!(decode(&buf).unwrap(), bottle);
    }

    #[test]
    fn padded_buffer_decodes_and_has_account_space() {
        let bottle = drifting("pad");
        let buf = encode_padded(&bottle).unwrap();
        assert_eq!(buf.len(), ACCOUNT_SPACE);
        assert_eq!(decode(&buf).unwrap(), bottle);
    }

    #[test]
    fn message_at_limit_encodes_over_limit_fails() {
        let ok = drifting(&"A".repeat(MAX_MESSAGE_BYTES));
        assert_eq!(encode(&ok).unwrap().len(), ACCOUNT_SPACE);

        let too_long = drifting(&"A".repeat(MAX_MESSAGE_BYTES + 1));
        assert_eq!(
            encode(&too_long).unwrap_err(),
            BottleError::MessageTooLong { len: 401 }
        );
    }

    #[test]
    fn multibyte_message_is_measured_in_bytes() {
        // 134 * 3 bytes = 402 bytes, only 134 chars.
        let bottle = drifting(&"€".repeat(134));
        assert!(matches!(
            encode(&bottle),
            Err(BottleError::MessageTooLong { len: 402 })
        ));
    }

    #[test]
    fn corrupted_discriminator_is_malformed() {
        let mut buf = encode(&drifting("x")).unwrap();
        buf[0] ^= 0xff;
        assert!(matches!(
            decode(&buf),
            Err(BottleError::MalformedRecord { .. })
        ));
        assert!(!is_bottle(&buf));
    }

    #[test]
    fn short_buffer_is_malformed() {
        let buf = encode(&drifting("")).unwrap();
        assert_eq!(buf.len(), MIN_RECORD_SIZE);
        assert!(decode(&buf).is_ok());
        assert!(matches!(
            decode(&buf[..MIN_RECORD_SIZE - 1]),
            Err(BottleError::MalformedRecord { .. })
        ));
    }

    #[test]
    fn bad_state_and_length_prefix_are_malformed() {
        let buf = encode(&drifting("abc")).unwrap();

        let mut bad_state = buf.clone();
        bad_state[STATE_OFFSET] = 2;
        assert!(matches!(
            decode(&bad_state),
            Err(BottleError::MalformedRecord { reason: "unknown state byte" })
        ));

        let mut bad_len = buf.clone();
        bad_len[MESSAGE_OFFSET..MESSAGE_OFFSET + 4].copy_from_slice(&60u32.to_le_bytes());
        assert!(matches!(
            decode(&bad_len),
            Err(BottleError::MalformedRecord { .. })
        ));

        let mut huge_len = buf;
        huge_len[MESSAGE_OFFSET..MESSAGE_OFFSET + 4].copy_from_slice(&401u32.to_le_bytes());
        assert!(matches!(
            decode(&huge_len),
            Err(BottleError::MalformedRecord { .. })
        ));
    }

    #[test]
    fn drifting_with_retrievee_is_malformed() {
        let mut buf = encode(&drifting("abc")).unwrap();
        buf[RETRIEVEE_OFFSET] = 1;
        assert!(matches!(
            decode(&buf),
            Err(BottleError::MalformedRecord { .. })
        ));
    }

    #[test]
    fn self_retrieved_record_is_malformed() {
        let mut buf = encode(&drifting("abc")).unwrap();
        let sender = buf[SENDER_OFFSET..THROWN_AT_OFFSET].to_vec();
        buf[STATE_OFFSET] = 1;
        buf[RETRIEVEE_OFFSET..RETRIEVED_AT_OFFSET].copy_from_slice(&sender);
        assert!(matches!(
            decode(&buf),
            Err(BottleError::MalformedRecord { .. })
        ));
    }
}
