//! BridgeHandle - public API of the bridge actor
//!
//! Cloneable and cheap. Event methods are fire-and-forget and safe to call
//! from non-async contexts such as MIDI input callbacks; queries go through
//! a oneshot channel.

use tokio::sync::{mpsc, oneshot};

use super::commands::BridgeCommand;
use super::profile::TrackProfile;
use crate::engine::{ButtonKind, ColorComponent, EngineEvent, EngineSnapshot};

#[derive(Clone, Debug)]
pub struct BridgeHandle {
    cmd_tx: mpsc::UnboundedSender<BridgeCommand>,
}

impl BridgeHandle {
    pub fn new(cmd_tx: mpsc::UnboundedSender<BridgeCommand>) -> Self {
        Self { cmd_tx }
    }

    // =========================================================================
    // Hot path (fire-and-forget)
    // =========================================================================

    /// Forward a raw engine event
    ///
    /// Returns false once the actor has stopped.
    pub fn send_event(&self, event: EngineEvent) -> bool {
        self.cmd_tx.send(BridgeCommand::Event(event)).is_ok()
    }

    pub fn device_connected(&self, device_id: impl Into<String>) {
        self.send_event(EngineEvent::DeviceConnected {
            device_id: device_id.into(),
        });
    }

    pub fn device_disconnected(&self, device_id: impl Into<String>) {
        self.send_event(EngineEvent::DeviceDisconnected {
            device_id: device_id.into(),
        });
    }

    pub fn context_appeared(&self, device_id: impl Into<String>, context_id: impl Into<String>, kind: ButtonKind) {
        self.send_event(EngineEvent::ContextAppeared {
            device_id: device_id.into(),
            context_id: context_id.into(),
            kind,
        });
    }

    pub fn context_disappeared(&self, context_id: impl Into<String>) {
        self.send_event(EngineEvent::ContextDisappeared {
            context_id: context_id.into(),
        });
    }

    pub fn press(&self, context_id: impl Into<String>) {
        self.send_event(EngineEvent::PressIntent {
            context_id: context_id.into(),
        });
    }

    pub fn articulation_pressed(&self, device_id: impl Into<String>, index: usize) {
        let _ = self.cmd_tx.send(BridgeCommand::ArticulationPressed {
            device_id: device_id.into(),
            index,
        });
    }

    pub fn feedback(&self, channel: u8, controller: u8, value: u8) {
        self.send_event(EngineEvent::Feedback {
            channel,
            controller,
            value,
        });
    }

    pub fn track_name(&self, name: impl Into<String>) {
        self.send_event(EngineEvent::TrackNameReceived { name: name.into() });
    }

    pub fn track_color(&self, component: ColorComponent, value: u8) {
        self.send_event(EngineEvent::TrackColorComponent { component, value });
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub async fn snapshot(&self) -> Option<EngineSnapshot> {
        let (response_tx, response_rx) = oneshot::channel();
        self.cmd_tx
            .send(BridgeCommand::Snapshot {
                response: response_tx,
            })
            .ok()?;
        response_rx.await.ok()
    }

    pub async fn current_profile(&self) -> Option<TrackProfile> {
        let (response_tx, response_rx) = oneshot::channel();
        self.cmd_tx
            .send(BridgeCommand::CurrentProfile {
                response: response_tx,
            })
            .ok()?;
        response_rx.await.ok()
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    pub fn shutdown(&self) {
        let _ = self.cmd_tx.send(BridgeCommand::Shutdown);
    }

    pub fn is_closed(&self) -> bool {
        self.cmd_tx.is_closed()
    }
}
