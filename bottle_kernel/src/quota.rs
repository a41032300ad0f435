//! Bottle Ledger — Daily Quota Tracker
//!
//! Counters keyed by `(day, actor)`. A throw and a retrieve draw from the
//! same budget. Days are derived from the transaction timestamp with floor
//! division, so the counter for a new day starts lazily at zero.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{ActorId, MAX_DAILY_ACTIONS, SECONDS_PER_DAY};
use crate::error::BottleError;

/// Day bucket of a timestamp. `floor(timestamp / 86400)`.
pub fn day_of(timestamp: i64) -> i64 {
    timestamp.div_euclid(SECONDS_PER_DAY)
}

/// The actor already used every action for this day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("actor {actor} used {used} of {limit} actions on day {day}")]
pub struct QuotaExceeded {
    pub actor: ActorId,
    pub day: i64,
    pub used: u8,
    pub limit: u8,
}

impl From<QuotaExceeded> for BottleError {
    fn from(_: QuotaExceeded) -> Self {
        BottleError::DailyLimitExceeded
    }
}

/// Per-actor, per-day action counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QuotaTracker {
    counters: BTreeMap<i64, BTreeMap<ActorId, u8>>,
}

impl QuotaTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check-and-increment in one step.
    ///
    /// Returns the count after the increment. When the actor already has
    /// `MAX_DAILY_ACTIONS` for the day the counter is left untouched.
    pub fn try_consume(&mut self, actor: &ActorId, timestamp: i64) -> Result<u8, QuotaExceeded> {
        let day = day_of(timestamp);
        let used = self.used_on(actor, day);
        if used >= MAX_DAILY_ACTIONS {
            return Err(QuotaExceeded {
                actor: *actor,
                day,
                used,
                limit: MAX_DAILY_ACTIONS,
            });
        }
        let count = self
            .counters
            .entry(day)
            .or_default()
            .entry(*actor)
            .or_insert(0);
        *count += 1;
        Ok(*count)
    }

    /// Actions used by `actor` on the day containing `timestamp`.
    pub fn count(&self, actor: &ActorId, timestamp: i64) -> u8 {
        self.used_on(actor, day_of(timestamp))
    }

    /// Actions still available to `actor` on the day containing `timestamp`.
    pub fn remaining(&self, actor: &ActorId, timestamp: i64) -> u8 {
        MAX_DAILY_ACTIONS.saturating_sub(self.count(actor, timestamp))
    }

    /// Iterate `(day, actor, count)` in key order.
    pub fn entries(&self) -> impl Iterator<Item = (i64, &ActorId, u8)> + '_ {
        self.counters.iter().flat_map(|(day, actors)| {
            actors.iter().map(move |(actor, count)| (*day, actor, *count))
        })
    }

    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }

    fn used_on(&self, actor: &ActorId, day: i64) -> u8 {
        self.counters
            .get(&day)
            .and_then(|actors| actors.get(actor))
            .copied()
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn actor(b: u8) -> ActorId {
        ActorId::new([b; 32])
    }

    #[test]
    fn day_of_uses_floor_division() {
        assert_eq!(day_of(0), 0);
        assert_eq!(day_of(86_399), 0);
        assert_eq!(day_of(86_400), 1);
        assert_eq!(day_of(-1), -1);
        assert_eq!(day_of(-86_400), -1);
        assert_eq!(day_of(-86_401), -2);
    }

    #[test]
    fn fourth_action_same_day_is_rejected() {
        let mut q = QuotaTracker::new();
        let a = actor(1);
        assert_eq!(q.try_consume(&a, 1_000).unwrap(), 1);
        assert_eq!(q.try_consume(&a, 2_000).unwrap(), 2);
        assert_eq!(q.try_consume(&a, 86_399).unwrap(), 3);

        let err = q.try_consume(&a, 50_000).unwrap_err();
        assert_eq!(err.used, 3);
        assert_eq!(err.day, 0);
        assert_eq!(q.count(&a, 1_000), 3, "rejection must not change the counter");
        assert_eq!(q.remaining(&a, 1_000), 0);
    }

    #[test]
    fn next_day_starts_fresh() {
        let mut q = QuotaTracker::new();
        let a = actor(1);
        for t in [10, 20, 30] {
            q.try_consume(&a, t).unwrap();
        }
        assert!(q.try_consume(&a, 40).is_err());
        assert_eq!(q.try_consume(&a, 86_400).unwrap(), 1);
    }

    #[test]
    fn actors_do_not_share_counters() {
        let mut q = QuotaTracker::new();
        for t in [1, 2, 3] {
            q.try_consume(&actor(1), t).unwrap();
        }
        assert_eq!(q.try_consume(&actor(2), 4).unwrap(), 1);
        assert_eq!(q.remaining(&actor(2), 4), 2);
    }

    #[test]
    fn entries_are_ordered_by_day_then_actor() {
        let mut q = QuotaTracker::new();
        q.try_consume(&actor(2), SECONDS_PER_DAY).unwrap();
        q.try_consume(&actor(2), 0).unwrap();
        q.try_consume(&actor(1), 0).unwrap();

        let seen: Vec<(i64, u8)> = q.entries().map(|(d, a, _)| (d, a.as_bytes()[0])).collect();
        assert_eq!(seen, vec![(0, 1), (0, 2), (1, 2)]);
    }

    #[test]
    fn quota_error_maps_to_daily_limit() {
        let mut q = QuotaTracker::new();
        let a = actor(9);
        for t in [1, 2, 3] {
            q.try_consume(&a, t).unwrap();
        }
        let err: BottleError = q.try_consume(&a, 4).unwrap_err().into();
        assert_eq!(err, BottleError::DailyLimitExceeded);
    }
}
