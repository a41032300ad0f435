//! Bottle Ledger — Query Contract
//!
//! What an indexer must do to list candidate bottles without decoding
//! them: match the discriminator at offset 0, match the single state byte
//! at offset 56, then rank by `thrown_at` (offset 48) descending.
//!
//! The state filter is always exactly one byte. An empty pattern would
//! match every record and select nothing.

use crate::domain::{ActorId, BottleState, RecordAddress, KEY_LEN};
use crate::layout::{
    bottle_discriminator, read_i64, DISCRIMINATOR_OFFSET, SENDER_OFFSET, STATE_OFFSET,
    THROWN_AT_OFFSET, TIMESTAMP_SIZE,
};

/// Byte-pattern comparison at a fixed offset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemcmpFilter {
    pub offset: usize,
    pub bytes: Vec<u8>,
}

impl MemcmpFilter {
    pub fn new(offset: usize, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            offset,
            bytes: bytes.into(),
        }
    }

    pub fn matches(&self, data: &[u8]) -> bool {
        self.offset
            .checked_add(self.bytes.len())
            .and_then(|end| data.get(self.offset..end))
            .is_some_and(|window| window == self.bytes.as_slice())
    }
}

/// Partial read of an account: `length` bytes starting at `offset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataSlice {
    pub offset: usize,
    pub length: usize,
}

impl DataSlice {
    pub fn apply<'a>(&self, data: &'a [u8]) -> Option<&'a [u8]> {
        let end = self.offset.checked_add(self.length)?;
        data.get(self.offset..end)
    }
}

/// The slice an indexer fetches to rank candidates.
pub const THROWN_AT_SLICE: DataSlice = DataSlice {
    offset: THROWN_AT_OFFSET,
    length: TIMESTAMP_SIZE,
};

pub fn discriminator_filter() -> MemcmpFilter {
    MemcmpFilter::new(DISCRIMINATOR_OFFSET, bottle_discriminator().to_vec())
}

pub fn state_filter(state_byte: u8) -> MemcmpFilter {
    MemcmpFilter::new(STATE_OFFSET, vec![state_byte])
}

/// Filters selecting Drifting bottles.
pub fn drifting_filters() -> Vec<MemcmpFilter> {
    vec![
        discriminator_filter(),
        state_filter(BottleState::DRIFTING_BYTE),
    ]
}

/// Filters selecting Retrieved bottles.
pub fn retrieved_filters() -> Vec<MemcmpFilter> {
    vec![
        discriminator_filter(),
        state_filter(BottleState::RETRIEVED_BYTE),
    ]
}

pub fn matches_all(filters: &[MemcmpFilter], data: &[u8]) -> bool {
    filters.iter().all(|f| f.matches(data))
}

/// `thrown_at` read straight from the account bytes.
pub fn thrown_at_of(data: &[u8]) -> Option<i64> {
    THROWN_AT_SLICE.apply(data)?;
    Some(read_i64(data, THROWN_AT_OFFSET))
}

/// Sender read straight from the account bytes.
pub fn sender_of(data: &[u8]) -> Option<ActorId> {
    let raw = data.get(SENDER_OFFSET..SENDER_OFFSET + KEY_LEN)?;
    let mut key = [0u8; KEY_LEN];
    key.copy_from_slice(raw);
    Some(ActorId::new(key))
}

/// A filtered account, ranked by its sliced timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
    pub address: RecordAddress,
    pub thrown_at: i64,
}

/// Most recent first; ties broken by lower address.
pub fn rank_most_recent(candidates: &mut [Candidate]) {
    candidates.sort_by(|a, b| {
        b.thrown_at
            .cmp(&a.thrown_at)
            .then_with(|| a.address.cmp(&b.address))
    });
}

/// Scan raw accounts the way an indexer does and rank the matches.
/// Accounts whose sender equals `exclude_sender` are skipped, so a caller
/// is never offered its own bottle.
pub fn scan<'a, I>(
    accounts: I,
    filters: &[MemcmpFilter],
    exclude_sender: Option<&ActorId>,
) -> Vec<Candidate>
where
    I: IntoIterator<Item = (RecordAddress, &'a [u8])>,
{
    let mut out: Vec<Candidate> = accounts
        .into_iter()
        .filter(|(_, data)| matches_all(filters, data))
        .filter(|(_, data)| match exclude_sender {
            Some(excluded) => sender_of(data).as_ref() != Some(excluded),
            None => true,
        })
        .filter_map(|(address, data)| {
            thrown_at_of(data).map(|thrown_at| Candidate { address, thrown_at })
        })
        .collect();
    rank_most_recent(&mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operations::{retrieve_bottle, throw_bottle};
    use crate::state::create_initial_state;

    const ALICE: ActorId = ActorId::new([1; 32]);
    const BOB: ActorId = ActorId::new([2; 32]);

    #[test]
    fn empty_pattern_would_not_discriminate() {
        // The state filter must carry one byte; an empty one matches anything.
        let empty = MemcmpFilter::new(STATE_OFFSET, Vec::new());
        let data = vec![0u8; 100];
        assert!(empty.matches(&data));
        assert_eq!(state_filter(0).bytes.len(), 1);
    }

    #[test]
    fn filter_out_of_range_does_not_match() {
        let f = MemcmpFilter::new(STATE_OFFSET, vec![0]);
        assert!(!f.matches(&[0u8; 10]));
    }

    #[test]
    fn offsets_near_usize_max_do_not_match() {
        let data = [0u8; 64];
        assert!(!MemcmpFilter::new(usize::MAX, vec![0]).matches(&data));
        assert!(!MemcmpFilter::new(usize::MAX - 1, vec![0, 0, 0]).matches(&data));
        let slice = DataSlice {
            offset: usize::MAX,
            length: 8,
        };
        assert_eq!(slice.apply(&data), None);
    }

    #[test]
    fn drifting_and_retrieved_are_separated_and_ranked() {
        let mut state = create_initial_state();
        let old = throw_bottle(&mut state, &ALICE, 100, 1, 0, "old").unwrap().address();
        let new = throw_bottle(&mut state, &ALICE, 300, 2, 0, "new").unwrap().address();
        let mid = throw_bottle(&mut state, &BOB, 200, 1, 0, "mid").unwrap().address();
        let claimed = throw_bottle(&mut state, &BOB, 400, 2, 0, "gone").unwrap().address();
        let asset = state.bottle(claimed).unwrap().asset;
        retrieve_bottle(&mut state, &ALICE, 500, claimed, &asset).unwrap();

        let accounts = state.encoded_accounts().unwrap();
        let mut unrelated = vec![0xAAu8; 600];
        unrelated[STATE_OFFSET] = 0;
        let mut all: Vec<(RecordAddress, &[u8])> = accounts
            .iter()
            .map(|(a, d)| (*a, d.as_slice()))
            .collect();
        all.push((RecordAddress(1_000), unrelated.as_slice()));

        let drifting = scan(all.clone(), &drifting_filters(), None);
        let order: Vec<RecordAddress> = drifting.iter().map(|c| c.address).collect();
        assert_eq!(order, vec![new, mid, old]);

        let retrieved = scan(all.clone(), &retrieved_filters(), None);
        assert_eq!(retrieved.len(), 1);
        assert_eq!(retrieved[0].address, claimed);

        let for_alice = scan(all, &drifting_filters(), Some(&ALICE));
        assert_eq!(for_alice.len(), 1);
        assert_eq!(for_alice[0].address, mid);
    }

    #[test]
    fn ties_break_by_address() {
        let mut c = vec![
            Candidate { address: RecordAddress(5), thrown_at: 10 },
            Candidate { address: RecordAddress(2), thrown_at: 10 },
            Candidate { address: RecordAddress(9), thrown_at: 11 },
        ];
        rank_most_recent(&mut c);
        let order: Vec<u64> = c.iter().map(|x| x.address.0).collect();
        assert_eq!(order, vec![9, 2, 5]);
    }
}
