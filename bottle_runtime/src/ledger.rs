//! Ledger manager — one persistent bottle ledger with apply-then-persist
//! semantics.
//!
//! Each ledger gets its own directory with a transaction log and snapshots.
//! Concurrency: `SharedLedger` serializes every transaction behind a Mutex,
//! so the quota check-and-increment and the Drifting → Retrieved transition
//! are each observed by exactly one caller.
//!
//! Order per transaction:
//!   1. engine.apply(tx)   rejected transactions stop here, nothing persists
//!   2. tx_log.append(tx)  on failure the engine returns to its checkpoint
//!   3. snapshot if the interval is reached

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use tracing::{debug, info, warn};

use bottle_kernel::domain::{ActorId, AssetRef, Bottle, RecordAddress, TransactionOutcome};
use bottle_kernel::engine::BottleEngine;
use bottle_kernel::error::BottleError;
use bottle_kernel::hashing::canonical_hash;
use bottle_kernel::instruction::{Instruction, Transaction};
use bottle_kernel::query::{self, Candidate, MemcmpFilter};
use bottle_kernel::state::LedgerState;

use crate::config::RuntimeConfig;
use crate::error::{Result, RuntimeError};
use crate::proto_bridge::kernel_to_proto;
use crate::replay;
use crate::snapshot;
use crate::tx_log::TxLog;

const LOG_FILE: &str = "tx.log";
const SNAPSHOT_DIR: &str = "snapshots";

/// A persistent ledger with its own transaction log and snapshots.
#[derive(Debug)]
pub struct Ledger {
    name: String,
    dir: PathBuf,
    engine: BottleEngine,
    tx_log: TxLog,
    snapshot_interval: u64,
}

impl Ledger {
    /// Open or create a ledger under `base_dir`.
    ///
    /// Directory structure:
    ///   <base_dir>/<name>/tx.log
    ///   <base_dir>/<name>/snapshots/
    pub fn open(base_dir: &Path, name: &str, snapshot_interval: u64) -> Result<Self> {
        let dir = base_dir.join(name);
        let tx_log = TxLog::open(&dir.join(LOG_FILE))?;
        let engine = recover(&dir.join(SNAPSHOT_DIR), &tx_log)?;

        info!(
            ledger = name,
            sequence = engine.last_sequence(),
            bottles = engine.state().len(),
            "ledger opened"
        );

        Ok(Self {
            name: name.to_string(),
            dir,
            engine,
            tx_log,
            snapshot_interval,
        })
    }

    pub fn open_with(config: &RuntimeConfig) -> Result<Self> {
        Self::open(&config.data_dir, &config.ledger_name, config.snapshot_interval)
    }

    /// Assign the next sequence number to `instruction` and commit it.
    pub fn submit(
        &mut self,
        signer: ActorId,
        timestamp: i64,
        instruction: Instruction,
    ) -> Result<TransactionOutcome> {
        let tx = Transaction {
            sequence: self.engine.last_sequence() + 1,
            timestamp,
            signer,
            instruction,
        };

        let checkpoint = self.engine.clone();
        let outcome = match self.engine.apply(&tx) {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!(
                    ledger = %self.name,
                    sequence = tx.sequence,
                    instruction = tx.instruction.name(),
                    signer = %tx.signer,
                    error = %err,
                    "transaction rejected"
                );
                return Err(err.into());
            }
        };

        if let Err(err) = self.tx_log.append(&kernel_to_proto(&tx)) {
            warn!(
                ledger = %self.name,
                sequence = tx.sequence,
                error = %err,
                "transaction log append failed, rolling back"
            );
            self.engine = checkpoint;
            return Err(err.into());
        }

        let (instruction, quota_used) = match outcome {
            TransactionOutcome::Thrown { quota_used, .. } => ("throw", quota_used),
            TransactionOutcome::Retrieved { quota_used, .. } => ("retrieve", quota_used),
        };
        info!(
            ledger = %self.name,
            sequence = tx.sequence,
            instruction,
            address = %outcome.address(),
            signer = %tx.signer,
            quota_used,
            "transaction committed"
        );

        self.maybe_snapshot(tx.sequence);
        Ok(outcome)
    }

    pub fn throw(
        &mut self,
        sender: ActorId,
        timestamp: i64,
        id: u64,
        amount: u64,
        message: impl Into<String>,
    ) -> Result<TransactionOutcome> {
        self.submit(
            sender,
            timestamp,
            Instruction::Throw {
                id,
                amount,
                message: message.into(),
            },
        )
    }

    pub fn retrieve(
        &mut self,
        retrievee: ActorId,
        timestamp: i64,
        record: RecordAddress,
        asset: AssetRef,
    ) -> Result<TransactionOutcome> {
        self.submit(retrievee, timestamp, Instruction::Retrieve { record, asset })
    }

    /// Retrieve `record`, presenting the asset reference stored with it.
    pub fn retrieve_record(
        &mut self,
        retrievee: ActorId,
        timestamp: i64,
        record: RecordAddress,
    ) -> Result<TransactionOutcome> {
        let asset = self
            .engine
            .state()
            .bottle(record)
            .map(|b| b.asset)
            .ok_or(BottleError::RecordNotFound)?;
        self.retrieve(retrievee, timestamp, record, asset)
    }

    /// Retrieve the most recent Drifting bottle not thrown by `retrievee`.
    pub fn retrieve_latest(
        &mut self,
        retrievee: ActorId,
        timestamp: i64,
    ) -> Result<TransactionOutcome> {
        let candidate = self
            .candidates(&query::drifting_filters(), Some(&retrievee))?
            .into_iter()
            .next()
            .ok_or(BottleError::RecordNotFound)?;
        self.retrieve_record(retrievee, timestamp, candidate.address)
    }

    /// Run the indexer query over the ledger's encoded accounts.
    pub fn candidates(
        &self,
        filters: &[MemcmpFilter],
        exclude_sender: Option<&ActorId>,
    ) -> Result<Vec<Candidate>> {
        let accounts = self.engine.state().encoded_accounts()?;
        Ok(query::scan(
            accounts.iter().map(|(a, data)| (*a, data.as_slice())),
            filters,
            exclude_sender,
        ))
    }

    /// Reset the engine and replay the whole log.
    pub fn replay_full(&mut self) -> Result<(LedgerState, String)> {
        let txs = self.transactions()?;
        let (state, hash) = replay::rebuild_state(&txs)?;
        let last = txs.last().map(|tx| tx.sequence).unwrap_or(0);
        self.engine = BottleEngine::from_state(state.clone(), last);
        debug!(ledger = %self.name, sequence = last, %hash, "full replay");
        Ok((state, hash))
    }

    /// Snapshot the current state regardless of the interval.
    pub fn snapshot_now(&self) -> Result<PathBuf> {
        let path = snapshot::save_snapshot(
            &self.snapshot_dir(),
            self.engine.last_sequence(),
            self.engine.state(),
        )?;
        Ok(path)
    }

    /// Every committed transaction, decoded.
    pub fn transactions(&self) -> Result<Vec<Transaction>> {
        replay::decode_all(&self.tx_log.load_all()?)
    }

    pub fn state(&self) -> &LedgerState {
        self.engine.state()
    }

    pub fn bottle(&self, address: RecordAddress) -> Option<&Bottle> {
        self.engine.state().bottle(address)
    }

    pub fn remaining_actions(&self, actor: &ActorId, timestamp: i64) -> u8 {
        self.engine.state().remaining_actions(actor, timestamp)
    }

    pub fn current_hash(&self) -> String {
        canonical_hash(self.engine.state())
    }

    pub fn current_sequence(&self) -> u64 {
        self.engine.last_sequence()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn snapshot_dir(&self) -> PathBuf {
        self.dir.join(SNAPSHOT_DIR)
    }

    fn maybe_snapshot(&self, sequence: u64) {
        if self.snapshot_interval == 0 || sequence % self.snapshot_interval != 0 {
            return;
        }
        // The transaction is already durable; a failed snapshot only costs
        // a longer replay on the next open.
        match snapshot::save_snapshot(&self.snapshot_dir(), sequence, self.engine.state()) {
            Ok(path) => debug!(ledger = %self.name, sequence, path = %path.display(), "snapshot saved"),
            Err(err) => warn!(ledger = %self.name, sequence, error = %err, "snapshot failed"),
        }
    }
}

/// Rebuild an engine from the newest usable snapshot plus the log tail.
/// A snapshot that fails verification is skipped in favour of full replay.
fn recover(snapshot_dir: &Path, tx_log: &TxLog) -> Result<BottleEngine> {
    let mut engine = match snapshot::load_latest_snapshot(snapshot_dir) {
        Ok(Some(snap)) if snap.sequence > tx_log.last_sequence() => {
            warn!(
                snapshot = snap.sequence,
                log = tx_log.last_sequence(),
                "snapshot is ahead of the log, replaying from scratch"
            );
            BottleEngine::new()
        }
        Ok(Some(snap)) => match snapshot::restore_from_snapshot(&snap) {
            Ok(state) => {
                debug!(sequence = snap.sequence, "restored from snapshot");
                BottleEngine::from_state(state, snap.sequence)
            }
            Err(err) => {
                warn!(sequence = snap.sequence, error = %err, "unusable snapshot, replaying from scratch");
                BottleEngine::new()
            }
        },
        Ok(None) => BottleEngine::new(),
        Err(err) => {
            warn!(error = %err, "could not read snapshots, replaying from scratch");
            BottleEngine::new()
        }
    };

    let frames = tx_log.load_after(engine.last_sequence())?;
    let applied = replay::replay_onto(&mut engine, &frames)?;
    debug!(applied, sequence = engine.last_sequence(), "log replayed");
    Ok(engine)
}

/// Thread-safe ledger handle.
#[derive(Debug)]
pub struct SharedLedger {
    inner: Mutex<Ledger>,
}

impl SharedLedger {
    pub fn new(ledger: Ledger) -> Self {
        Self {
            inner: Mutex::new(ledger),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Ledger>> {
        self.inner.lock().map_err(|_| RuntimeError::LockPoisoned)
    }

    pub fn throw(
        &self,
        sender: ActorId,
        timestamp: i64,
        id: u64,
        amount: u64,
        message: impl Into<String>,
    ) -> Result<TransactionOutcome> {
        self.lock()?.throw(sender, timestamp, id, amount, message)
    }

    pub fn retrieve(
        &self,
        retrievee: ActorId,
        timestamp: i64,
        record: RecordAddress,
        asset: AssetRef,
    ) -> Result<TransactionOutcome> {
        self.lock()?.retrieve(retrievee, timestamp, record, asset)
    }

    pub fn retrieve_latest(&self, retrievee: ActorId, timestamp: i64) -> Result<TransactionOutcome> {
        self.lock()?.retrieve_latest(retrievee, timestamp)
    }

    /// Run `f` against the ledger under the lock.
    pub fn with<R>(&self, f: impl FnOnce(&Ledger) -> R) -> Result<R> {
        Ok(f(&*self.lock()?))
    }

    pub fn current_hash(&self) -> Result<String> {
        self.with(Ledger::current_hash)
    }

    pub fn current_sequence(&self) -> Result<u64> {
        self.with(Ledger::current_sequence)
    }

    pub fn into_inner(self) -> Result<Ledger> {
        self.inner.into_inner().map_err(|_| RuntimeError::LockPoisoned)
    }
}
