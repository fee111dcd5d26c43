//! Commands accepted by the bridge actor
//!
//! Hot path commands carry engine events and expect no answer. Queries carry
//! a oneshot sender for the response.

use std::fmt;

use tokio::sync::oneshot;

use super::profile::TrackProfile;
use crate::engine::{DeviceId, EngineEvent, EngineSnapshot};

pub enum BridgeCommand {
    // -------------------------------------------------------------------------
    // Hot path commands (no response)
    // -------------------------------------------------------------------------
    /// Forward an event to the engine
    Event(EngineEvent),

    /// Articulation key pressed, resolved against the current profile
    ArticulationPressed {
        device_id: DeviceId,
        /// Position of the key on the articulation page
        index: usize,
    },

    // -------------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------------
    Snapshot {
        response: oneshot::Sender<EngineSnapshot>,
    },

    CurrentProfile {
        response: oneshot::Sender<TrackProfile>,
    },

    // -------------------------------------------------------------------------
    // Lifecycle
    // -------------------------------------------------------------------------
    Shutdown,
}

impl fmt::Debug for BridgeCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BridgeCommand::Event(event) => f.debug_tuple("Event").field(event).finish(),
            BridgeCommand::ArticulationPressed { device_id, index } => f
                .debug_struct("ArticulationPressed")
                .field("device_id", device_id)
                .field("index", index)
                .finish(),
            BridgeCommand::Snapshot { .. } => f.debug_struct("Snapshot").finish_non_exhaustive(),
            BridgeCommand::CurrentProfile { .. } => {
                f.debug_struct("CurrentProfile").finish_non_exhaustive()
            }
            BridgeCommand::Shutdown => write!(f, "Shutdown"),
        }
    }
}
