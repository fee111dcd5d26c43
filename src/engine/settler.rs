//! Inbound feedback settler
//!
//! Feedback for a control is buffered and only committed to the UI once no
//! newer value has arrived for a full settle window. A burst of contradictory
//! edges (automation ramps, self-echo) therefore produces one visual update
//! reflecting the last value.

use std::collections::HashMap;
use std::time::Instant;

use tracing::{debug, trace, warn};

use super::timer::TimerKey;
use super::types::{Effect, LogicalControl, StateSource, ACTIVE_THRESHOLD, VALUE_ON};
use super::SyncEngine;

/// Most recent uncommitted feedback for a control
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingFeedback {
    pub active: bool,
    pub received_at: Instant,
}

#[derive(Debug, Default)]
pub struct FeedbackSettler {
    pending: HashMap<LogicalControl, PendingFeedback>,
}

impl FeedbackSettler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Buffer a value; returns true if it superseded an uncommitted one
    pub fn buffer(&mut self, control: LogicalControl, active: bool, now: Instant) -> bool {
        self.pending
            .insert(
                control,
                PendingFeedback {
                    active,
                    received_at: now,
                },
            )
            .is_some()
    }

    pub fn take(&mut self, control: &LogicalControl) -> Option<PendingFeedback> {
        self.pending.remove(control)
    }

    pub fn pending(&self, control: &LogicalControl) -> Option<PendingFeedback> {
        self.pending.get(control).copied()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

impl SyncEngine {
    pub(super) fn on_feedback(&mut self, channel: u8, controller: u8, value: u8, now: Instant) {
        let Some(control) = LogicalControl::checked(channel, controller) else {
            warn!(channel, controller, value, "ignoring out-of-range feedback");
            return;
        };
        let value = if value > VALUE_ON {
            warn!(%control, value, "clamping out-of-range feedback value");
            VALUE_ON
        } else {
            value
        };
        let active = value >= ACTIVE_THRESHOLD;

        if self.dispatcher.resolve_ack(&control) {
            self.timers.cancel(&TimerKey::AckTimeout(control));
            debug!(%control, "ack resolved by feedback");
        }

        self.cache.record(&self.track.current, control, active, now);

        if !self.registry.is_bound(&control) {
            trace!(%control, active, "cached feedback for unbound control");
            return;
        }

        if self.settler.buffer(control, active, now) {
            trace!(%control, active, "feedback superseded pending value");
        }
        self.timers
            .schedule(TimerKey::Settle(control), now + self.config.timing.settle);
    }

    /// Settle window expired: commit the last buffered value to every bound context
    pub(super) fn commit_settled(&mut self, control: LogicalControl) {
        let Some(pending) = self.settler.take(&control) else {
            return;
        };
        let force = self.config.force_resync_after_settle;

        for context_id in self.registry.contexts_for(&control) {
            let Some(ctx) = self.registry.get_mut(&context_id) else {
                continue;
            };
            let changed = ctx.active != pending.active;
            ctx.active = pending.active;
            ctx.source = StateSource::Feedback;

            if changed || force {
                debug!(%context_id, %control, active = pending.active, changed, "settled");
                self.outbox.push(Effect::SetVisualState {
                    context_id,
                    active: pending.active,
                });
            }
        }
    }
}
