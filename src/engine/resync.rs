//! Resync coordinator
//!
//! Drives cached state into the UI when buttons become visible and when the
//! selected track changes. Three outcomes per context:
//!
//! - no cache entry: neutralize to off
//! - stale entry on a non-forced restore: leave the context alone
//! - otherwise: restore the cached state
//!
//! Visibility edges come from the tracker; only the 0 -> 1 edge of a
//! device's command page schedules a (forced) resync.

use std::time::Instant;

use tracing::{debug, info, trace};

use super::registry::RemovedContext;
use super::timer::TimerKey;
use super::types::{ButtonKind, ContextId, DeviceId, Effect, StateSource};
use super::visibility::{Page, VisibilityEdge};
use super::SyncEngine;

/// What a restore did to a context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreOutcome {
    UnknownContext,
    Neutralized,
    SkippedStale,
    Restored(bool),
}

impl SyncEngine {
    /// Apply the cached state of the context's control to the context
    ///
    /// `force_age` bypasses the staleness threshold.
    pub fn restore_context(&mut self, context_id: &str, force_age: bool, now: Instant) -> RestoreOutcome {
        let Some(control) = self.registry.get(context_id).map(|ctx| ctx.control) else {
            return RestoreOutcome::UnknownContext;
        };

        let (active, source, outcome) = match self.cache.lookup(&self.track.current, &control) {
            None => (false, StateSource::Neutralized, RestoreOutcome::Neutralized),
            Some(entry) if !force_age && entry.is_stale(now, self.config.timing.stale_after) => {
                trace!(%context_id, %control, age_ms = entry.age(now).as_millis() as u64, "stale cache, skipping restore");
                return RestoreOutcome::SkippedStale;
            }
            Some(entry) => (
                entry.state,
                StateSource::Restored,
                RestoreOutcome::Restored(entry.state),
            ),
        };

        if let Some(ctx) = self.registry.get_mut(context_id) {
            ctx.active = active;
            ctx.source = source;
        }
        self.outbox.push(Effect::SetVisualState {
            context_id: context_id.to_string(),
            active,
        });
        outcome
    }

    /// Forced restore of every command context on a device
    pub(super) fn resync_device(&mut self, device_id: &str, now: Instant) {
        let contexts = self.registry.command_contexts_on(device_id);
        debug!(%device_id, contexts = contexts.len(), "resyncing command page");
        for context_id in contexts {
            self.restore_context(&context_id, true, now);
        }
    }

    pub(super) fn schedule_resync(&mut self, device_id: &str, now: Instant) {
        let deadline = now + self.config.timing.resync_delay;
        self.timers
            .schedule(TimerKey::Resync(device_id.to_string()), deadline);
    }

    pub(super) fn on_device_connected(&mut self, device_id: &str) {
        info!(%device_id, "device connected");
        self.visibility.ensure_device(device_id);
    }

    pub(super) fn on_device_disconnected(&mut self, device_id: &str) {
        let removed = self.registry.remove_device(device_id);
        for context in &removed {
            if let RemovedContext::Command(ctx) = context {
                self.dispatcher.forget_context(&ctx.context_id);
            }
        }
        self.visibility.remove_device(device_id);
        self.track.selected.remove(device_id);
        self.timers.cancel(&TimerKey::Resync(device_id.to_string()));
        info!(%device_id, contexts = removed.len(), "device disconnected");
    }

    pub(super) fn on_context_appeared(
        &mut self,
        device_id: DeviceId,
        context_id: ContextId,
        kind: ButtonKind,
        now: Instant,
    ) {
        let previous = match kind {
            ButtonKind::Command(binding) => {
                self.registry
                    .insert_command(device_id.clone(), context_id.clone(), binding)
            }
            ButtonKind::Articulation => self
                .registry
                .insert_articulation(device_id.clone(), context_id.clone()),
        };
        // Same control: the key keeps showing what it showed before
        let carried = match (&previous, kind) {
            (Some(RemovedContext::Command(old)), ButtonKind::Command(binding)) if old.control == binding.control => {
                Some((old.active, old.source))
            }
            _ => None,
        };
        let rebound = previous.is_some();
        if let Some(previous) = previous {
            trace!(%context_id, "context rebound");
            self.release_context(&previous);
        }

        match kind {
            ButtonKind::Command(binding) => {
                trace!(%device_id, %context_id, control = %binding.control, "command context appeared");
                match carried {
                    Some((active, source)) => {
                        if let Some(ctx) = self.registry.get_mut(&context_id) {
                            ctx.active = active;
                            ctx.source = source;
                        }
                        self.outbox.push(Effect::SetVisualState {
                            context_id: context_id.clone(),
                            active,
                        });
                    }
                    // A rebound key may already be on screen, so staleness does not apply
                    None => {
                        self.restore_context(&context_id, rebound, now);
                    }
                }
                if self.visibility.appear(&device_id, Page::Command) == Some(VisibilityEdge::BecameVisible) {
                    debug!(%device_id, "command page visible, scheduling resync");
                    self.schedule_resync(&device_id, now);
                }
            }
            ButtonKind::Articulation => {
                if self.visibility.appear(&device_id, Page::Articulation)
                    == Some(VisibilityEdge::BecameVisible)
                {
                    debug!(%device_id, "articulation page visible");
                    self.render_profile(device_id);
                }
            }
        }
    }

    pub(super) fn on_context_disappeared(&mut self, context_id: &str) {
        match self.registry.remove(context_id) {
            Some(removed) => self.release_context(&removed),
            None => trace!(%context_id, "unknown context disappeared"),
        }
    }

    /// Undo the visibility contribution of a removed context
    ///
    /// Ack and cooldown state of the control survive; only the context's tap
    /// history goes with it.
    fn release_context(&mut self, removed: &RemovedContext) {
        match removed {
            RemovedContext::Command(ctx) => {
                self.dispatcher.forget_context(&ctx.context_id);
                if self.visibility.disappear(&ctx.device_id, Page::Command)
                    == Some(VisibilityEdge::BecameHidden)
                {
                    debug!(device_id = %ctx.device_id, "command page hidden");
                    self.timers.cancel(&TimerKey::Resync(ctx.device_id.clone()));
                }
            }
            RemovedContext::Articulation(device_id) => {
                if self.visibility.disappear(device_id, Page::Articulation)
                    == Some(VisibilityEdge::BecameHidden)
                {
                    debug!(%device_id, "articulation page hidden");
                }
            }
        }
    }

    /// Commit a track change
    ///
    /// Clears the track-scoped dispatcher state, applies the cache policy and
    /// schedules a forced resync on every device showing command buttons.
    pub(super) fn apply_track_change(&mut self, name: &str, now: Instant) {
        let name = name.trim().to_string();
        info!(track = %name, "🔄 track changed");

        let released = self.dispatcher.clear();
        self.timers
            .cancel_where(|key| matches!(key, TimerKey::AckTimeout(_)));
        if released > 0 {
            debug!(released, "released pending acks on track change");
        }

        self.track.current = name.clone();
        self.track.last_received = name.clone();
        self.track.selected.clear();
        self.cache.on_track_changed();

        self.outbox.push(Effect::TrackChanged { name });
        for device_id in self.visibility.devices_showing(Page::Articulation) {
            self.render_profile(device_id);
        }
        for device_id in self.visibility.devices_showing(Page::Command) {
            self.schedule_resync(&device_id, now);
        }
    }
}
