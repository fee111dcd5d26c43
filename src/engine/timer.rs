//! Timer service - keyed, cancel-and-replace deadlines
//!
//! Every debounce, cooldown release, ack timeout, settle window and resync
//! delay in the engine is a deadline stored under a key. Scheduling a key
//! that is already armed replaces the old deadline, so a key never has more
//! than one outstanding timer. The owner drains `pop_next_due` whenever the clock
//! moves and sleeps until `next_deadline` in between.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::Instant;

use super::types::{DeviceId, LogicalControl};

/// Timers armed by the engine
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TimerKey {
    /// Release valve for an unconfirmed momentary command
    AckTimeout(LogicalControl),
    /// End of a feedback burst for one control
    Settle(LogicalControl),
    /// Forced resync of a device's command page
    Resync(DeviceId),
    /// Track name debounce
    TrackName,
    /// Track colour debounce
    TrackColor,
    /// Note Off for a pressed articulation
    NoteRelease(u8),
}

#[derive(Debug, Clone, Copy)]
struct Armed {
    deadline: Instant,
    seq: u64,
}

/// Deadline store with per-key cancel-and-replace semantics
#[derive(Debug)]
pub struct TimerService<K> {
    armed: HashMap<K, Armed>,
    next_seq: u64,
}

impl<K: Clone + Eq + Hash> TimerService<K> {
    pub fn new() -> Self {
        Self {
            armed: HashMap::new(),
            next_seq: 0,
        }
    }

    /// Arm `key` to expire at `deadline`, replacing any pending deadline
    ///
    /// Returns true if a previous deadline was replaced.
    pub fn schedule(&mut self, key: K, deadline: Instant) -> bool {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.armed.insert(key, Armed { deadline, seq }).is_some()
    }

    /// Cancel a pending deadline; returns true if one was armed
    pub fn cancel(&mut self, key: &K) -> bool {
        self.armed.remove(key).is_some()
    }

    /// Cancel every pending deadline whose key matches the predicate
    pub fn cancel_where(&mut self, mut predicate: impl FnMut(&K) -> bool) -> usize {
        let before = self.armed.len();
        self.armed.retain(|key, _| !predicate(key));
        before - self.armed.len()
    }

    pub fn is_scheduled(&self, key: &K) -> bool {
        self.armed.contains_key(key)
    }

    pub fn deadline(&self, key: &K) -> Option<Instant> {
        self.armed.get(key).map(|armed| armed.deadline)
    }

    /// Earliest pending deadline, if any
    pub fn next_deadline(&self) -> Option<Instant> {
        self.armed.values().map(|armed| armed.deadline).min()
    }

    /// Remove and return the earliest key whose deadline is at or before `now`
    ///
    /// Ties are broken by the order the keys were armed. The key's deadline
    /// is returned alongside it so handlers can act at the scheduled time.
    pub fn pop_next_due(&mut self, now: Instant) -> Option<(K, Instant)> {
        let (key, armed) = self
            .armed
            .iter()
            .filter(|(_, armed)| armed.deadline <= now)
            .min_by(|(_, a), (_, b)| a.deadline.cmp(&b.deadline).then(a.seq.cmp(&b.seq)))
            .map(|(key, armed)| (key.clone(), *armed))?;

        self.armed.remove(&key);
        Some((key, armed.deadline))
    }

    pub fn len(&self) -> usize {
        self.armed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.armed.is_empty()
    }
}

impl<K: Clone + Eq + Hash> Default for TimerService<K> {
    fn default() -> Self {
        Self::new()
    }
}
