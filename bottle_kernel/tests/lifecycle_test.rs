//! Lifecycle tests. Drive the engine through the public API and check
//! the observable guarantees of throw, retrieve and the record layout.

use bottle_kernel::domain::{ActorId, BottleState, RecordAddress, MAX_MESSAGE_BYTES};
use bottle_kernel::engine::BottleEngine;
use bottle_kernel::error::{BottleError, EngineError};
use bottle_kernel::hashing::canonical_hash;
use bottle_kernel::instruction::Transaction;
use bottle_kernel::layout;
use bottle_kernel::query;
use bottle_kernel::LAYOUT_VERSION;

const ALICE: ActorId = ActorId::new([0xA1; 32]);
const BOB: ActorId = ActorId::new([0xB0; 32]);

struct Harness {
    engine: BottleEngine,
}

impl Harness {
    fn new() -> Self {
        Self {
            engine: BottleEngine::new(),
        }
    }

    fn next_seq(&self) -> u64 {
        self.engine.last_sequence() + 1
    }

    fn throw(&mut self, who: ActorId, t: i64, id: u64, msg: &str) -> Result<RecordAddress, EngineError> {
        let tx = Transaction::throw(self.next_seq(), t, who, id, msg);
        self.engine.apply(&tx).map(|o| o.address())
    }

    fn retrieve(&mut self, who: ActorId, t: i64, address: RecordAddress) -> Result<(), EngineError> {
        let asset = self
            .engine
            .state()
            .bottle(address)
            .map(|b| b.asset)
            .expect("test retrieves an existing bottle");
        let tx = Transaction::retrieve(self.next_seq(), t, who, address, asset);
        self.engine.apply(&tx).map(|_| ())
    }
}

fn rejected(result: Result<impl std::fmt::Debug, EngineError>) -> BottleError {
    match result.unwrap_err() {
        EngineError::Rejected(err) => err,
        other => panic!("expected a rejection, got {:?}", other),
    }
}

#[test]
fn every_message_up_to_the_limit_is_accepted() {
    for len in [0usize, 1, 12, 200, 399, MAX_MESSAGE_BYTES] {
        let mut h = Harness::new();
        let address = h.throw(ALICE, 1_000, 1, &"m".repeat(len)).unwrap();
        let state = h.engine.state();
        assert_eq!(state.len(), 1);
        assert_eq!(state.bottle(address).unwrap().state, BottleState::Drifting);
    }
}

#[test]
fn message_of_401_bytes_is_rejected_without_effect() {
    let mut h = Harness::new();
    let err = rejected(h.throw(ALICE, 1_000, 1, &"A".repeat(401)));
    assert_eq!(err.to_string(), "The message is too long.");
    assert!(h.engine.state().is_empty());
    assert_eq!(h.engine.state().quota().count(&ALICE, 1_000), 0);
}

#[test]
fn hello_bottle() {
    let mut h = Harness::new();
    let address = h.throw(ALICE, 1000, 1, "Hello Bottle").unwrap();
    let bottle = h.engine.state().bottle(address).unwrap().clone();
    assert_eq!(bottle.state, BottleState::Drifting);
    assert_eq!(h.engine.state().quota().count(&ALICE, 1000), 1);

    let encoded = layout::encode(&bottle).unwrap();
    assert_eq!(layout::decode(&encoded).unwrap(), bottle);
}

#[test]
fn three_throws_then_daily_limit() {
    let mut h = Harness::new();
    for id in 1..=3 {
        h.throw(ALICE, 1_000 + id as i64, id, "bottle").unwrap();
    }
    let before = canonical_hash(h.engine.state());
    let err = rejected(h.throw(ALICE, 1_004, 4, "My 4th bottle."));
    assert_eq!(err, BottleError::DailyLimitExceeded);
    assert_eq!(
        err.to_string(),
        "The maximum number of bottles that can be thrown or retrieved each day has been exceeded."
    );
    assert_eq!(canonical_hash(h.engine.state()), before);
    assert_eq!(h.engine.state().len(), 3);
}

#[test]
fn mixed_actions_share_the_daily_limit() {
    let mut h = Harness::new();
    let a = h.throw(ALICE, 10, 1, "a").unwrap();
    let b = h.throw(ALICE, 11, 2, "b").unwrap();
    let c = h.throw(ALICE, 12, 3, "c").unwrap();

    h.throw(BOB, 20, 1, "bob").unwrap();
    h.retrieve(BOB, 21, a).unwrap();
    h.retrieve(BOB, 22, b).unwrap();
    assert_eq!(rejected(h.retrieve(BOB, 23, c)), BottleError::DailyLimitExceeded);

    let state = h.engine.state();
    assert_eq!(state.retrieved_count(), 2);
    assert!(state.bottle(c).unwrap().state.is_drifting());
}

#[test]
fn self_retrieval_is_forbidden_regardless_of_quota() {
    let mut h = Harness::new();
    let a = h.throw(ALICE, 10, 1, "mine").unwrap();
    assert_eq!(
        rejected(h.retrieve(ALICE, 11, a)),
        BottleError::SelfRetrievalForbidden
    );
    assert_eq!(h.engine.state().quota().count(&ALICE, 11), 1);

    h.throw(ALICE, 12, 2, "two").unwrap();
    h.throw(ALICE, 13, 3, "three").unwrap();
    let err = rejected(h.retrieve(ALICE, 14, a));
    assert_eq!(err, BottleError::SelfRetrievalForbidden);
    assert_eq!(err.to_string(), "The same person cannot retrieve their own bottle.");
}

#[test]
fn retrieved_bottle_cannot_be_retrieved_again() {
    let mut h = Harness::new();
    let a = h.throw(ALICE, 10, 1, "once").unwrap();
    h.retrieve(BOB, 20, a).unwrap();

    let carol = ActorId::new([0xC0; 32]);
    let err = rejected(h.retrieve(carol, 30, a));
    assert_eq!(err, BottleError::AlreadyRetrieved);
    assert_eq!(err.to_string(), "This bottle has already been retrieved.");

    let bottle = h.engine.state().bottle(a).unwrap();
    assert_eq!(bottle.retrievee(), Some(BOB));
    assert_eq!(bottle.retrieved_at(), Some(20));
}

#[test]
fn ledger_accounts_decode_and_filter() {
    let mut h = Harness::new();
    let a = h.throw(ALICE, 10, 1, "drifting").unwrap();
    let b = h.throw(ALICE, 20, 2, "claimed").unwrap();
    h.retrieve(BOB, 30, b).unwrap();

    let accounts = h.engine.state().encoded_accounts().unwrap();
    for (address, data) in &accounts {
        assert_eq!(data.len(), layout::ACCOUNT_SPACE);
        assert_eq!(
            &layout::decode(data).unwrap(),
            h.engine.state().bottle(*address).unwrap()
        );
    }

    let drifting = query::scan(
        accounts.iter().map(|(a, d)| (*a, d.as_slice())),
        &query::drifting_filters(),
        None,
    );
    assert_eq!(drifting.len(), 1);
    assert_eq!(drifting[0].address, a);
}

#[test]
fn layout_version_is_one() {
    assert_eq!(LAYOUT_VERSION, 1, "LAYOUT_VERSION must be 1 and never change");
}
