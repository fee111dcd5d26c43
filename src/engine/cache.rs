//! Per-track state cache
//!
//! Last known on/off state per logical control, stored twice: once globally
//! and once under the lowercased name of the track that was selected when
//! the feedback arrived. Per-track entries never leak to another track.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use super::types::LogicalControl;

/// Cache scoping policy, fixed at startup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
    /// Only per-track entries are consulted on lookup
    pub per_track: bool,
    /// The global scope is wiped on every track change
    pub clear_on_track_change: bool,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            per_track: true,
            clear_on_track_change: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheEntry {
    pub state: bool,
    pub recorded_at: Instant,
}

impl CacheEntry {
    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.recorded_at)
    }

    pub fn is_stale(&self, now: Instant, stale_after: Duration) -> bool {
        self.age(now) > stale_after
    }
}

#[derive(Debug)]
pub struct StateCache {
    policy: CachePolicy,
    global: HashMap<LogicalControl, CacheEntry>,
    per_track: HashMap<(String, LogicalControl), CacheEntry>,
}

/// Normalized per-track scope key
pub fn track_scope(track_name: &str) -> String {
    track_name.trim().to_lowercase()
}

impl StateCache {
    pub fn new(policy: CachePolicy) -> Self {
        Self {
            policy,
            global: HashMap::new(),
            per_track: HashMap::new(),
        }
    }

    pub fn policy(&self) -> CachePolicy {
        self.policy
    }

    /// Record a confirmed state in both scopes
    pub fn record(&mut self, track_name: &str, control: LogicalControl, state: bool, now: Instant) {
        let entry = CacheEntry {
            state,
            recorded_at: now,
        };
        self.global.insert(control, entry);
        self.per_track.insert((track_scope(track_name), control), entry);
    }

    /// Best entry for a control on the given track
    ///
    /// The per-track entry is preferred. The global entry is only a fallback
    /// when per-track scoping is disabled; otherwise absence means unknown.
    pub fn lookup(&self, track_name: &str, control: &LogicalControl) -> Option<CacheEntry> {
        if let Some(entry) = self.per_track.get(&(track_scope(track_name), *control)) {
            return Some(*entry);
        }
        if self.policy.per_track {
            return None;
        }
        self.global.get(control).copied()
    }

    /// Apply the track-change policy
    pub fn on_track_changed(&mut self) {
        if self.policy.clear_on_track_change {
            self.global.clear();
        }
    }

    pub fn global_len(&self) -> usize {
        self.global.len()
    }

    pub fn per_track_len(&self) -> usize {
        self.per_track.len()
    }
}
