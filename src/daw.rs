//! DAW transport over MIDI ports
//!
//! Inbound bytes from the DAW remote script are parsed and classified into
//! engine events on the MIDI callback thread, then handed to the bridge
//! without blocking. Outbound commands and keyswitch notes go through a
//! [`MidiDawOutput`] owned by the bridge actor.

use anyhow::{Context, Result};
use midir::{MidiIO, MidiInput, MidiInputConnection, MidiOutput, MidiOutputConnection};
use tracing::{debug, info, trace};

use crate::bridge::{BridgeHandle, DawOutput, TransportError};
use crate::config::SurfaceConfig;
use crate::engine::{ColorComponent, EngineEvent, LogicalControl};
use crate::midi::{format_hex, sysex_text, MidiMessage};

const CLIENT_NAME: &str = "Deck-Bridge";

/// Case-insensitive substring match of a port name
pub fn port_matches(name: &str, pattern: &str) -> bool {
    name.to_lowercase().contains(&pattern.to_lowercase())
}

/// Find a port by substring match
fn find_port<T: MidiIO>(io: &T, pattern: &str) -> Option<(T::Port, String)> {
    io.ports().into_iter().find_map(|port| {
        let name = io.port_name(&port).ok()?;
        if port_matches(&name, pattern) {
            debug!("Found port '{}' matching pattern '{}'", name, pattern);
            Some((port, name))
        } else {
            None
        }
    })
}

/// Map a parsed DAW message to an engine event
///
/// CCs on the colour channel carrying a colour CC become colour components;
/// every other CC is command feedback. SysEx carries the track name.
pub fn classify(message: &MidiMessage, surface: &SurfaceConfig) -> Option<EngineEvent> {
    match *message {
        MidiMessage::ControlChange { channel, cc, value } => {
            if channel == surface.color_channel {
                let component = match cc {
                    cc if cc == surface.color_cc.r => Some(ColorComponent::Red),
                    cc if cc == surface.color_cc.g => Some(ColorComponent::Green),
                    cc if cc == surface.color_cc.b => Some(ColorComponent::Blue),
                    _ => None,
                };
                if let Some(component) = component {
                    return Some(EngineEvent::TrackColorComponent { component, value });
                }
            }
            Some(EngineEvent::Feedback {
                channel,
                controller: cc,
                value,
            })
        }
        MidiMessage::SysEx { ref data } => Some(EngineEvent::TrackNameReceived {
            name: sysex_text(data),
        }),
        _ => None,
    }
}

/// Live input connection; dropping it closes the port
pub struct DawInput {
    _conn: MidiInputConnection<()>,
    pub port_name: String,
}

/// Open the DAW input port and forward classified events to the bridge
pub fn connect_input(pattern: &str, surface: SurfaceConfig, bridge: BridgeHandle) -> Result<DawInput> {
    let midi_in = MidiInput::new(&format!("{CLIENT_NAME}-Input")).context("Failed to create MIDI input")?;
    debug!("Found {} MIDI input ports", midi_in.port_count());

    let (port, port_name) = find_port(&midi_in, pattern)
        .ok_or_else(|| anyhow::anyhow!("Input port '{}' not found", pattern))?;

    info!("Connecting to DAW input port: {}", port_name);

    let conn = midi_in
        .connect(
            &port,
            CLIENT_NAME,
            move |_timestamp, data, _| match MidiMessage::parse(data) {
                Some(message) => match classify(&message, &surface) {
                    Some(event) => {
                        trace!("DAW -> {}", message);
                        bridge.send_event(event);
                    }
                    None => trace!("Ignoring DAW message: {}", message),
                },
                None => debug!("Failed to parse MIDI: {}", format_hex(data)),
            },
            (),
        )
        .map_err(|e| anyhow::anyhow!("Failed to connect to input port '{}': {}", port_name, e))?;

    Ok(DawInput {
        _conn: conn,
        port_name,
    })
}

/// Outbound MIDI connection to the DAW
pub struct MidiDawOutput {
    conn: MidiOutputConnection,
    pub port_name: String,
}

impl MidiDawOutput {
    pub fn connect(pattern: &str) -> Result<Self> {
        let midi_out =
            MidiOutput::new(&format!("{CLIENT_NAME}-Output")).context("Failed to create MIDI output")?;
        debug!("Found {} MIDI output ports", midi_out.port_count());

        let (port, port_name) = find_port(&midi_out, pattern)
            .ok_or_else(|| anyhow::anyhow!("Output port '{}' not found", pattern))?;

        info!("Connecting to DAW output port: {}", port_name);

        let conn = midi_out
            .connect(&port, CLIENT_NAME)
            .map_err(|e| anyhow::anyhow!("Failed to connect to output port '{}': {}", port_name, e))?;

        Ok(Self { conn, port_name })
    }

    fn send(&mut self, message: MidiMessage) -> Result<(), TransportError> {
        let data = message.encode();
        self.conn
            .send(&data)
            .map_err(|e| TransportError::Send(e.to_string()))?;
        trace!("Sent: {} | {}", format_hex(&data), message);
        Ok(())
    }
}

impl DawOutput for MidiDawOutput {
    fn send_control(&mut self, control: LogicalControl, value: u8) -> Result<(), TransportError> {
        self.send(MidiMessage::ControlChange {
            channel: control.channel,
            cc: control.controller,
            value,
        })
    }

    fn send_note(&mut self, channel: u8, note: u8, velocity: u8) -> Result<(), TransportError> {
        self.send(MidiMessage::note(channel, note, velocity))
    }
}

/// Print available MIDI ports
pub fn list_ports(input_pattern: &str, output_pattern: &str) -> Result<()> {
    use colored::*;

    let midi_in = MidiInput::new(&format!("{CLIENT_NAME}-List")).context("Failed to create MIDI input")?;
    let midi_out = MidiOutput::new(&format!("{CLIENT_NAME}-List")).context("Failed to create MIDI output")?;

    println!("\n{}", "=== Available MIDI Ports ===".bold().cyan());
    print_section("Input Ports:", &port_names(&midi_in), input_pattern);
    print_section("Output Ports:", &port_names(&midi_out), output_pattern);
    println!();

    Ok(())
}

fn port_names<T: MidiIO>(io: &T) -> Vec<String> {
    io.ports()
        .iter()
        .filter_map(|port| io.port_name(port).ok())
        .collect()
}

fn print_section(title: &str, names: &[String], pattern: &str) {
    use colored::*;

    println!("\n{}", title.bold());
    if names.is_empty() {
        println!("  {}", "No ports found".dimmed());
        return;
    }
    for name in names {
        if port_matches(name, pattern) {
            println!("  {} {}", "[MATCH]".bright_green(), name.bright_white());
        } else {
            println!("          {}", name);
        }
    }
}
