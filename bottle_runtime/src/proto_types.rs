//! Hand-written protobuf types for the transaction log.
//!
//! Uses prost derive macros for encode/decode without prost-build.
//! Field numbers are part of the on-disk format; never renumber.

use prost::Message;

// ── Transaction Envelope ───────────────────────────────────────

#[derive(Clone, PartialEq, Message)]
pub struct ProtoTransaction {
    #[prost(uint64, tag = "1")]
    pub sequence: u64,
    #[prost(int64, tag = "2")]
    pub timestamp: i64,
    /// 32-byte public key of the signer.
    #[prost(bytes = "vec", tag = "3")]
    pub signer: Vec<u8>,
    #[prost(message, optional, tag = "4")]
    pub instruction: Option<ProtoInstruction>,
}

#[derive(Clone, PartialEq, Message)]
pub struct ProtoInstruction {
    #[prost(oneof = "InstructionKind", tags = "1, 2")]
    pub kind: Option<InstructionKind>,
}

#[derive(Clone, PartialEq, prost::Oneof)]
pub enum InstructionKind {
    #[prost(message, tag = "1")]
    Throw(ThrowBottle),
    #[prost(message, tag = "2")]
    Retrieve(RetrieveBottle),
}

// ── Instructions ───────────────────────────────────────────────

#[derive(Clone, PartialEq, Message)]
pub struct ThrowBottle {
    #[prost(uint64, tag = "1")]
    pub id: u64,
    #[prost(uint64, tag = "2")]
    pub amount: u64,
    #[prost(string, tag = "3")]
    pub message: String,
}

#[derive(Clone, PartialEq, Message)]
pub struct RetrieveBottle {
    #[prost(uint64, tag = "1")]
    pub record: u64,
    #[prost(message, optional, tag = "2")]
    pub asset: Option<ProtoAssetRef>,
}

#[derive(Clone, PartialEq, Message)]
pub struct ProtoAssetRef {
    #[prost(bytes = "vec", tag = "1")]
    pub escrow: Vec<u8>,
    #[prost(uint64, tag = "2")]
    pub amount: u64,
}
