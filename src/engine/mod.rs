//! Command feedback synchronization engine
//!
//! Keeps a grid of two-state buttons in sync with host-reported state over a
//! lossy MIDI transport. The engine is a synchronous state machine: every
//! call takes an explicit `now`, mutates owned state and appends [`Effect`]s
//! to an outbox that the caller drains with [`SyncEngine::take_effects`].
//!
//! ```text
//!  press ──► dispatcher ──► SendControl ─────► host
//!                                               │
//!  UI ◄── SetVisualState ◄── settler ◄── feedback
//!                  ▲            │
//!                  │            ▼
//!  appear/track ──► resync ◄── cache
//! ```
//!
//! Timers never run callbacks. They are keyed deadlines in a
//! [`TimerService`]; the owner calls [`SyncEngine::advance`] whenever time
//! passes and sleeps until [`SyncEngine::next_deadline`] in between.

pub mod cache;
pub mod dispatcher;
pub mod registry;
pub mod resync;
pub mod settler;
pub mod timer;
pub mod track;
pub mod types;
pub mod visibility;

#[cfg(test)]
mod tests;

use std::time::{Duration, Instant};

use tracing::trace;

pub use cache::{CacheEntry, CachePolicy, StateCache};
pub use dispatcher::{CommandDispatcher, PressRejected};
pub use registry::{ButtonContext, KeyRegistry};
pub use resync::RestoreOutcome;
pub use timer::{TimerKey, TimerService};
pub use types::*;
pub use visibility::{Page, VisibilityTracker};

use settler::FeedbackSettler;
use track::TrackState;

/// Timing constants of the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    pub tap_debounce: Duration,
    pub key_cooldown: Duration,
    pub ack_timeout: Duration,
    pub settle: Duration,
    pub resync_delay: Duration,
    pub stale_after: Duration,
    pub track_debounce: Duration,
    pub color_debounce: Duration,
    pub note_length: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            tap_debounce: Duration::from_millis(220),
            key_cooldown: Duration::from_millis(220),
            ack_timeout: Duration::from_millis(900),
            settle: Duration::from_millis(160),
            resync_delay: Duration::from_millis(260),
            stale_after: Duration::from_millis(3500),
            track_debounce: Duration::from_millis(120),
            color_debounce: Duration::from_millis(25),
            note_length: Duration::from_millis(110),
        }
    }
}

/// Startup configuration of the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub timing: Timing,
    pub cache: CachePolicy,
    /// Push a UI commit after settle even when the state did not change
    pub force_resync_after_settle: bool,
    /// MIDI channel of articulation notes
    pub articulation_channel: u8,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            timing: Timing::default(),
            cache: CachePolicy::default(),
            force_resync_after_settle: true,
            articulation_channel: 0,
        }
    }
}

/// Point-in-time view of the engine, for diagnostics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSnapshot {
    pub track: String,
    pub contexts: Vec<ContextSnapshot>,
    pub pending_acks: usize,
    pub pending_settles: usize,
    pub armed_timers: usize,
    pub cached_controls: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextSnapshot {
    pub context_id: ContextId,
    pub device_id: DeviceId,
    pub control: LogicalControl,
    pub active: bool,
    pub source: StateSource,
}

/// The synchronization engine
///
/// One instance per session. All maps are owned here and handed to the
/// component handlers (`impl SyncEngine` blocks in the sibling modules).
#[derive(Debug)]
pub struct SyncEngine {
    config: EngineConfig,
    registry: KeyRegistry,
    visibility: VisibilityTracker,
    dispatcher: CommandDispatcher,
    settler: FeedbackSettler,
    cache: StateCache,
    timers: TimerService<TimerKey>,
    track: TrackState,
    outbox: Vec<Effect>,
}

impl SyncEngine {
    pub fn new(config: EngineConfig) -> Self {
        let cache = StateCache::new(config.cache);
        Self {
            config,
            registry: KeyRegistry::new(),
            visibility: VisibilityTracker::new(),
            dispatcher: CommandDispatcher::new(),
            settler: FeedbackSettler::new(),
            cache,
            timers: TimerService::new(),
            track: TrackState::default(),
            outbox: Vec::new(),
        }
    }

    /// Process one inbound event
    ///
    /// Timers due at or before `now` fire first, so the event observes the
    /// same state it would have if the owner had woken up on time.
    pub fn handle(&mut self, event: EngineEvent, now: Instant) {
        self.advance(now);
        trace!(?event, "engine event");

        match event {
            EngineEvent::DeviceConnected { device_id } => self.on_device_connected(&device_id),
            EngineEvent::DeviceDisconnected { device_id } => self.on_device_disconnected(&device_id),
            EngineEvent::ContextAppeared {
                device_id,
                context_id,
                kind,
            } => self.on_context_appeared(device_id, context_id, kind, now),
            EngineEvent::ContextDisappeared { context_id } => self.on_context_disappeared(&context_id),
            EngineEvent::PressIntent { context_id } => self.on_press_intent(&context_id, now),
            EngineEvent::ArticulationPressed {
                device_id,
                index,
                note,
            } => self.on_articulation_pressed(device_id, index, note, now),
            EngineEvent::Feedback {
                channel,
                controller,
                value,
            } => self.on_feedback(channel, controller, value, now),
            EngineEvent::TrackNameReceived { name } => self.on_track_name_received(&name, now),
            EngineEvent::TrackChanged { name } => {
                self.timers.cancel(&TimerKey::TrackName);
                self.track.last_received = name.trim().to_string();
                self.apply_track_change(&name, now)
            }
            EngineEvent::TrackColorComponent { component, value } => {
                self.on_track_color_component(component, value, now)
            }
        }
    }

    /// Fire every timer due at or before `now`, earliest first
    pub fn advance(&mut self, now: Instant) {
        while let Some((key, deadline)) = self.timers.pop_next_due(now) {
            trace!(?key, "timer fired");
            self.fire(key, deadline);
        }
    }

    fn fire(&mut self, key: TimerKey, at: Instant) {
        match key {
            TimerKey::AckTimeout(control) => self.on_ack_timeout(control),
            TimerKey::Settle(control) => self.commit_settled(control),
            TimerKey::Resync(device_id) => self.resync_device(&device_id, at),
            TimerKey::TrackName => self.commit_track_name(at),
            TimerKey::TrackColor => self.commit_track_color(),
            TimerKey::NoteRelease(note) => self.release_note(note),
        }
    }

    /// Earliest pending timer deadline
    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.next_deadline()
    }

    /// Drain the effects produced since the last call
    pub fn take_effects(&mut self) -> Vec<Effect> {
        std::mem::take(&mut self.outbox)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn context(&self, context_id: &str) -> Option<&ButtonContext> {
        self.registry.get(context_id)
    }

    pub fn current_track(&self) -> &str {
        &self.track.current
    }

    pub fn selected_articulation(&self, device_id: &str) -> Option<usize> {
        self.track.selected(device_id)
    }

    pub fn is_awaiting_ack(&self, control: &LogicalControl) -> bool {
        self.dispatcher.is_awaiting_ack(control)
    }

    pub fn is_timer_scheduled(&self, key: &TimerKey) -> bool {
        self.timers.is_scheduled(key)
    }

    pub fn timer_deadline(&self, key: &TimerKey) -> Option<Instant> {
        self.timers.deadline(key)
    }

    pub fn visible_count(&self, device_id: &str, page: Page) -> u32 {
        self.visibility.count(device_id, page)
    }

    pub fn cached(&self, control: &LogicalControl) -> Option<CacheEntry> {
        self.cache.lookup(&self.track.current, control)
    }

    pub fn snapshot(&self) -> EngineSnapshot {
        let mut contexts: Vec<ContextSnapshot> = self
            .registry
            .command_contexts()
            .map(|ctx| ContextSnapshot {
                context_id: ctx.context_id.clone(),
                device_id: ctx.device_id.clone(),
                control: ctx.control,
                active: ctx.active,
                source: ctx.source,
            })
            .collect();
        contexts.sort_by(|a, b| a.context_id.cmp(&b.context_id));

        EngineSnapshot {
            track: self.track.current.clone(),
            contexts,
            pending_acks: self.dispatcher.pending_acks(),
            pending_settles: self.settler.len(),
            armed_timers: self.timers.len(),
            cached_controls: self.cache.global_len(),
        }
    }
}

impl Default for SyncEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}
