#![forbid(unsafe_code)]

//! Bottle Ledger — Runtime
//!
//! Wraps the kernel with persistence, replay, snapshots, a shared
//! ledger handle, configuration and telemetry.
//!
//! No lifecycle rules live here. Every throw and retrieve is decided
//! by the kernel.

pub mod error;
pub mod config;
pub mod telemetry;
pub mod proto_types;
pub mod proto_bridge;
pub mod tx_log;
pub mod replay;
pub mod snapshot;
pub mod snapshot_codec;
pub mod ledger;
pub mod audit;
