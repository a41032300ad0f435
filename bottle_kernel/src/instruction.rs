//! Bottle Ledger — Transactions
//!
//! Transactions are pure data: who signed, when the ledger clock says it
//! ran, and which instruction to execute. They carry no logic.

use serde::{Deserialize, Serialize};

use crate::domain::{ActorId, AssetRef, RecordAddress};

/// One unit of work against the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Transaction {
    /// Strictly increasing, starting at 1.
    pub sequence: u64,
    /// Ledger clock at execution, unix seconds.
    pub timestamp: i64,
    /// The caller: sender of a throw, retrievee of a retrieve.
    pub signer: ActorId,
    pub instruction: Instruction,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Instruction {
    /// Deposit a new bottle.
    Throw {
        id: u64,
        /// Asset deposited alongside the message; 0 for none.
        amount: u64,
        message: String,
    },
    /// Claim a drifting bottle. `asset` must equal the stored reference.
    Retrieve {
        record: RecordAddress,
        asset: AssetRef,
    },
}

impl Instruction {
    pub fn name(&self) -> &'static str {
        match self {
            Instruction::Throw { .. } => "throw",
            Instruction::Retrieve { .. } => "retrieve",
        }
    }
}

impl Transaction {
    pub fn throw(
        sequence: u64,
        timestamp: i64,
        sender: ActorId,
        id: u64,
        message: impl Into<String>,
    ) -> Self {
        Self {
            sequence,
            timestamp,
            signer: sender,
            instruction: Instruction::Throw {
                id,
                amount: 0,
                message: message.into(),
            },
        }
    }

    pub fn retrieve(
        sequence: u64,
        timestamp: i64,
        retrievee: ActorId,
        record: RecordAddress,
        asset: AssetRef,
    ) -> Self {
        Self {
            sequence,
            timestamp,
            signer: retrievee,
            instruction: Instruction::Retrieve { record, asset },
        }
    }
}
