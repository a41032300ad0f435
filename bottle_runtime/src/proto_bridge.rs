//! Proto ↔ Kernel conversion bridge.
//!
//! `kernel_to_proto` is total. `proto_to_kernel` is fallible: a frame read
//! back from disk may decode as protobuf and still lack an instruction or
//! carry a key of the wrong width.

use bottle_kernel::domain::{ActorId, AssetRef, EscrowKey, RecordAddress, KEY_LEN};
use bottle_kernel::instruction::{Instruction, Transaction};

use crate::error::BridgeError;
use crate::proto_types::*;

/// Convert a kernel transaction to its log representation.
pub fn kernel_to_proto(tx: &Transaction) -> ProtoTransaction {
    let kind = match &tx.instruction {
        Instruction::Throw {
            id,
            amount,
            message,
        } => InstructionKind::Throw(ThrowBottle {
            id: *id,
            amount: *amount,
            message: message.clone(),
        }),
        Instruction::Retrieve { record, asset } => InstructionKind::Retrieve(RetrieveBottle {
            record: record.0,
            asset: Some(ProtoAssetRef {
                escrow: asset.escrow.as_bytes().to_vec(),
                amount: asset.amount,
            }),
        }),
    };

    ProtoTransaction {
        sequence: tx.sequence,
        timestamp: tx.timestamp,
        signer: tx.signer.as_bytes().to_vec(),
        instruction: Some(ProtoInstruction { kind: Some(kind) }),
    }
}

/// Convert a logged transaction back to the kernel's form.
pub fn proto_to_kernel(proto: &ProtoTransaction) -> Result<Transaction, BridgeError> {
    let sequence = proto.sequence;
    let kind = proto
        .instruction
        .as_ref()
        .and_then(|i| i.kind.as_ref())
        .ok_or(BridgeError::MissingInstruction { sequence })?;

    let instruction = match kind {
        InstructionKind::Throw(t) => Instruction::Throw {
            id: t.id,
            amount: t.amount,
            message: t.message.clone(),
        },
        InstructionKind::Retrieve(r) => {
            let asset = r
                .asset
                .as_ref()
                .ok_or(BridgeError::MissingInstruction { sequence })?;
            Instruction::Retrieve {
                record: RecordAddress(r.record),
                asset: AssetRef {
                    escrow: EscrowKey(key(sequence, "asset.escrow", &asset.escrow)?),
                    amount: asset.amount,
                },
            }
        }
    };

    Ok(Transaction {
        sequence,
        timestamp: proto.timestamp,
        signer: ActorId::new(key(sequence, "signer", &proto.signer)?),
        instruction,
    })
}

fn key(sequence: u64, field: &'static str, raw: &[u8]) -> Result<[u8; KEY_LEN], BridgeError> {
    raw.try_into().map_err(|_| BridgeError::BadKey {
        sequence,
        field,
        len: raw.len(),
    })
}
