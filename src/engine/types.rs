//! Engine type definitions
//!
//! Defines the identities, inbound events and outbound effects that flow
//! through the synchronization engine.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of one visible button instance on the control surface
pub type ContextId = String;

/// Identifier of a connected control-surface device
pub type DeviceId = String;

/// Threshold above which a 7-bit feedback value reads as "on"
pub const ACTIVE_THRESHOLD: u8 = 64;

/// Value sent for "on" commands
pub const VALUE_ON: u8 = 127;

/// Value sent for "off" commands
pub const VALUE_OFF: u8 = 0;

/// One control-surface feedback loop, addressed by MIDI channel and CC number
///
/// This is the unit of cooldown, ack tracking and cached state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LogicalControl {
    /// MIDI channel (0-15)
    pub channel: u8,
    /// Controller number (0-127)
    pub controller: u8,
}

impl LogicalControl {
    pub fn new(channel: u8, controller: u8) -> Self {
        Self {
            channel,
            controller,
        }
    }

    /// Build a control from raw transport values, rejecting out-of-range input
    pub fn checked(channel: u8, controller: u8) -> Option<Self> {
        (channel <= 15 && controller <= 127).then_some(Self {
            channel,
            controller,
        })
    }
}

impl fmt::Display for LogicalControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ch{}/cc{}", self.channel, self.controller)
    }
}

/// Button behavior mode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ButtonMode {
    /// One pulse per press; state comes from host feedback
    #[default]
    Momentary,
    /// Flips local state optimistically on each press
    Toggle,
}

/// Binding of a command button to its logical control
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandBinding {
    pub control: LogicalControl,
    pub mode: ButtonMode,
}

/// Kind of button that became visible
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonKind {
    /// Command page button bound to a logical control
    Command(CommandBinding),
    /// Articulation page button (rendered from the track profile)
    Articulation,
}

/// Where the current `active` value of a context came from
///
/// Optimistic toggle writes and settled feedback are two writers to the same
/// cell; the settled feedback commit always overwrites the optimistic value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateSource {
    /// Never written since the context appeared
    Initial,
    /// Local toggle press, not yet confirmed
    Optimistic,
    /// Committed from settled host feedback
    Feedback,
    /// Restored from the state cache
    Restored,
    /// Forced off because nothing was known about the control
    Neutralized,
}

/// Track colour component carried on its own CC
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorComponent {
    Red,
    Green,
    Blue,
}

/// Inbound events consumed by the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    DeviceConnected {
        device_id: DeviceId,
    },
    DeviceDisconnected {
        device_id: DeviceId,
    },
    ContextAppeared {
        device_id: DeviceId,
        context_id: ContextId,
        kind: ButtonKind,
    },
    ContextDisappeared {
        context_id: ContextId,
    },
    /// User pressed a command button
    PressIntent {
        context_id: ContextId,
    },
    /// User pressed an articulation button resolved to a note
    ArticulationPressed {
        device_id: DeviceId,
        /// Position of the key on the articulation page
        index: usize,
        note: u8,
    },
    /// Raw CC feedback from the host (values are validated by the engine)
    Feedback {
        channel: u8,
        controller: u8,
        value: u8,
    },
    /// Track name as reported by the host, before debouncing
    TrackNameReceived {
        name: String,
    },
    /// Committed track change
    TrackChanged {
        name: String,
    },
    TrackColorComponent {
        component: ColorComponent,
        value: u8,
    },
}

/// Side effects produced by the engine, applied by the bridge actor
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Outbound CC to the host
    SendControl { control: LogicalControl, value: u8 },
    /// Outbound note to the host (velocity 0 releases the note)
    SendNote { channel: u8, note: u8, velocity: u8 },
    /// Idempotent UI commit for one button
    SetVisualState { context_id: ContextId, active: bool },
    /// Full articulation page render for a device, highlighting the selected key
    RenderProfile {
        device_id: DeviceId,
        selected: Option<usize>,
    },
    /// Committed track change, for profile lookup
    TrackChanged { name: String },
    /// Committed track colour as `#rrggbb`
    TrackColor { hex: String },
}
