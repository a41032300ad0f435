#![forbid(unsafe_code)]

//! Bottle Ledger — Kernel
//!
//! Deterministic record lifecycle for the "message in a bottle" exchange:
//! fixed binary layout, per-actor daily quotas, and the throw/retrieve
//! operations that move a bottle from Drifting to Retrieved exactly once.

/// Layout v1. The byte offsets in `layout` are a public contract.
/// Any change to them requires a new layout version.
pub const LAYOUT_VERSION: u32 = 1;

pub mod domain;
pub mod error;
pub mod layout;
pub mod quota;
pub mod instruction;
pub mod state;
pub mod operations;
pub mod invariants;
pub mod hashing;
pub mod query;
pub mod engine;
