//! Host event translation
//!
//! Maps surface-host events to bridge calls. Which page a key belongs to is
//! decided by its action identifier; command keys are bound to a logical
//! control from their settings, or from their grid slot when no CC is set.

use tracing::{debug, trace, warn};

use super::protocol::{ActionEvent, Coordinates, HostEvent};
use crate::bridge::BridgeHandle;
use crate::config::{HostConfig, SurfaceConfig};
use crate::engine::{ButtonKind, CommandBinding, EngineEvent, LogicalControl};

/// What a host event asks the bridge to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Routed {
    Event(EngineEvent),
    ArticulationPressed { device_id: String, index: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Page {
    Command,
    Articulation,
}

pub struct HostTranslator {
    host: HostConfig,
    surface: SurfaceConfig,
}

impl HostTranslator {
    pub fn new(host: HostConfig, surface: SurfaceConfig) -> Self {
        Self { host, surface }
    }

    pub fn translate(&self, event: HostEvent) -> Option<Routed> {
        match event {
            HostEvent::DeviceDidConnect { device } => {
                Some(Routed::Event(EngineEvent::DeviceConnected { device_id: device }))
            }
            HostEvent::DeviceDidDisconnect { device } => {
                Some(Routed::Event(EngineEvent::DeviceDisconnected { device_id: device }))
            }
            // A settings change rebinds the key in place
            HostEvent::WillAppear(event) | HostEvent::DidReceiveSettings(event) => self.appear(event),
            HostEvent::WillDisappear(event) => {
                self.page(&event.action)?;
                Some(Routed::Event(EngineEvent::ContextDisappeared {
                    context_id: event.context,
                }))
            }
            HostEvent::KeyDown(event) => self.key_down(event),
            HostEvent::KeyUp(_) => None,
            HostEvent::Unknown => None,
        }
    }

    fn page(&self, action: &str) -> Option<Page> {
        if action == self.host.command_action {
            Some(Page::Command)
        } else if action == self.host.articulation_action {
            Some(Page::Articulation)
        } else {
            trace!("Ignoring unknown action '{}'", action);
            None
        }
    }

    fn appear(&self, event: ActionEvent) -> Option<Routed> {
        let kind = match self.page(&event.action)? {
            Page::Command => match self.binding(&event) {
                Some(binding) => ButtonKind::Command(binding),
                // Drop whatever the key was bound to before
                None => {
                    warn!(context = %event.context, settings = ?event.payload.settings, "Command key has no valid binding, unbinding it");
                    return Some(Routed::Event(EngineEvent::ContextDisappeared {
                        context_id: event.context,
                    }));
                }
            },
            Page::Articulation => ButtonKind::Articulation,
        };
        Some(Routed::Event(EngineEvent::ContextAppeared {
            device_id: event.device,
            context_id: event.context,
            kind,
        }))
    }

    fn key_down(&self, event: ActionEvent) -> Option<Routed> {
        match self.page(&event.action)? {
            Page::Command => Some(Routed::Event(EngineEvent::PressIntent {
                context_id: event.context,
            })),
            Page::Articulation => {
                let index = self.articulation_index(event.payload.coordinates?)?;
                Some(Routed::ArticulationPressed {
                    device_id: event.device,
                    index,
                })
            }
        }
    }

    /// Logical control of a command key
    pub fn binding(&self, event: &ActionEvent) -> Option<CommandBinding> {
        let settings = event.payload.settings;
        let channel = settings.channel.unwrap_or(self.surface.command_channel);

        let controller = match settings.cc {
            Some(cc) => cc,
            None => {
                let coordinates = event.payload.coordinates?;
                let slot = coordinates.row as usize * self.host.columns as usize + coordinates.column as usize;
                match self.surface.slot_cc(slot) {
                    Some(cc) => cc,
                    None => {
                        debug!(context = %event.context, slot, "No command CC for grid slot");
                        return None;
                    }
                }
            }
        };

        let Some(control) = LogicalControl::checked(channel, controller) else {
            debug!(context = %event.context, channel, controller, "Invalid command binding");
            return None;
        };

        Some(CommandBinding {
            control,
            mode: settings.mode.unwrap_or_default(),
        })
    }

    /// Articulation slot under a key; rows above the start row hold none
    pub fn articulation_index(&self, coordinates: Coordinates) -> Option<usize> {
        let row = coordinates.row.checked_sub(self.host.articulation_start_row)?;
        Some(row as usize * self.host.columns as usize + coordinates.column as usize)
    }
}

/// Hand a routed event to the bridge
pub fn dispatch(routed: Routed, bridge: &BridgeHandle) {
    match routed {
        Routed::Event(event) => {
            bridge.send_event(event);
        }
        Routed::ArticulationPressed { device_id, index } => bridge.articulation_pressed(device_id, index),
    }
}
