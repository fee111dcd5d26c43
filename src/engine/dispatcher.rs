//! Outbound command dispatcher
//!
//! Turns a press intent into an outbound control message. Three gates run in
//! order and any of them can drop the press:
//!
//! 1. Tap debounce, per context
//! 2. Key cooldown, per logical control (shared by every context bound to it)
//! 3. Ack gate, per logical control, momentary buttons only
//!
//! At most one unconfirmed momentary send exists per control. Toggle sends
//! are rate limited by the cooldown but never held back by the ack gate.

use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, info};

use super::timer::TimerKey;
use super::types::{ButtonMode, ContextId, Effect, LogicalControl, StateSource, VALUE_OFF, VALUE_ON};
use super::SyncEngine;

/// Reason a press produced no outbound message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PressRejected {
    #[error("context is not registered")]
    UnknownContext,
    #[error("tap debounced ({since_ms}ms since previous tap)")]
    TapDebounce { since_ms: u64 },
    #[error("control cooling down for another {remaining_ms}ms")]
    Cooldown { remaining_ms: u64 },
    #[error("previous command still awaiting host confirmation")]
    AwaitingAck,
}

/// Last value sent on a control
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LastSent {
    pub at: Instant,
    pub value: u8,
}

/// Gate state of the dispatcher
///
/// All of it is track scoped and wiped by [`CommandDispatcher::clear`].
#[derive(Debug, Default)]
pub struct CommandDispatcher {
    last_tap: HashMap<ContextId, Instant>,
    next_allowed: HashMap<LogicalControl, Instant>,
    awaiting_ack: HashSet<LogicalControl>,
    last_sent: HashMap<LogicalControl, LastSent>,
}

impl CommandDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tap debounce gate; records the tap only when it passes
    pub fn check_tap(
        &mut self,
        context_id: &str,
        now: Instant,
        debounce: Duration,
    ) -> Result<(), PressRejected> {
        if let Some(last) = self.last_tap.get(context_id) {
            let since = now.saturating_duration_since(*last);
            if since < debounce {
                return Err(PressRejected::TapDebounce {
                    since_ms: since.as_millis() as u64,
                });
            }
        }
        self.last_tap.insert(context_id.to_string(), now);
        Ok(())
    }

    pub fn check_cooldown(&self, control: &LogicalControl, now: Instant) -> Result<(), PressRejected> {
        match self.next_allowed.get(control) {
            Some(next) if now < *next => Err(PressRejected::Cooldown {
                remaining_ms: next.duration_since(now).as_millis() as u64,
            }),
            _ => Ok(()),
        }
    }

    pub fn check_ack(&self, control: &LogicalControl) -> Result<(), PressRejected> {
        if self.awaiting_ack.contains(control) {
            Err(PressRejected::AwaitingAck)
        } else {
            Ok(())
        }
    }

    /// Record an outbound send and start the control's cooldown
    pub fn record_send(&mut self, control: LogicalControl, value: u8, now: Instant, cooldown: Duration) {
        self.last_sent.insert(control, LastSent { at: now, value });
        self.next_allowed.insert(control, now + cooldown);
    }

    pub fn await_ack(&mut self, control: LogicalControl) {
        self.awaiting_ack.insert(control);
    }

    /// Clear a pending ack; returns true if one was pending
    pub fn resolve_ack(&mut self, control: &LogicalControl) -> bool {
        self.awaiting_ack.remove(control)
    }

    pub fn is_awaiting_ack(&self, control: &LogicalControl) -> bool {
        self.awaiting_ack.contains(control)
    }

    pub fn last_sent(&self, control: &LogicalControl) -> Option<LastSent> {
        self.last_sent.get(control).copied()
    }

    /// Forget the tap history of a context that went away
    pub fn forget_context(&mut self, context_id: &str) {
        self.last_tap.remove(context_id);
    }

    /// Drop every debounce, cooldown and ack; returns the number of acks released
    pub fn clear(&mut self) -> usize {
        let released = self.awaiting_ack.len();
        self.last_tap.clear();
        self.next_allowed.clear();
        self.awaiting_ack.clear();
        released
    }

    pub fn pending_acks(&self) -> usize {
        self.awaiting_ack.len()
    }
}

impl SyncEngine {
    pub(super) fn on_press_intent(&mut self, context_id: &str, now: Instant) {
        match self.try_press(context_id, now) {
            Ok(value) => debug!(%context_id, value, "command sent"),
            Err(reason) => debug!(%context_id, %reason, "press dropped"),
        }
    }

    /// Run the gates for one press and emit the resulting effects
    pub(super) fn try_press(&mut self, context_id: &str, now: Instant) -> Result<u8, PressRejected> {
        let (control, mode, active) = self
            .registry
            .get(context_id)
            .map(|ctx| (ctx.control, ctx.mode, ctx.active))
            .ok_or(PressRejected::UnknownContext)?;
        let timing = self.config.timing;

        self.dispatcher.check_tap(context_id, now, timing.tap_debounce)?;
        self.dispatcher.check_cooldown(&control, now)?;

        let (value, optimistic) = match mode {
            ButtonMode::Momentary => {
                self.dispatcher.check_ack(&control)?;
                self.dispatcher.await_ack(control);
                self.timers
                    .schedule(TimerKey::AckTimeout(control), now + timing.ack_timeout);
                (VALUE_ON, None)
            }
            ButtonMode::Toggle => {
                let next = !active;
                if let Some(ctx) = self.registry.get_mut(context_id) {
                    ctx.active = next;
                    ctx.source = StateSource::Optimistic;
                }
                (if next { VALUE_ON } else { VALUE_OFF }, Some(next))
            }
        };

        self.outbox.push(Effect::SendControl { control, value });
        if let Some(active) = optimistic {
            self.outbox.push(Effect::SetVisualState {
                context_id: context_id.to_string(),
                active,
            });
        }
        self.dispatcher
            .record_send(control, value, now, timing.key_cooldown);

        Ok(value)
    }

    pub(super) fn on_ack_timeout(&mut self, control: LogicalControl) {
        if self.dispatcher.resolve_ack(&control) {
            info!(%control, "no confirmation from host, releasing ack gate");
        }
    }
}
