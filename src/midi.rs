//! MIDI message codec
//!
//! Only the messages the bridge exchanges with the DAW are modelled: notes
//! for articulation keyswitches, control changes for commands, feedback and
//! track colour, and SysEx for the track name. Everything else parses to
//! [`MidiMessage::Other`] so callers can log and skip it.

use std::fmt;

use tracing::trace;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MidiMessage {
    /// Note Off: channel (0-15), note (0-127), velocity (0-127)
    NoteOff { channel: u8, note: u8, velocity: u8 },

    /// Note On: channel (0-15), note (0-127), velocity (1-127)
    NoteOn { channel: u8, note: u8, velocity: u8 },

    /// Control Change: channel (0-15), cc (0-127), value (0-127)
    ControlChange { channel: u8, cc: u8, value: u8 },

    /// System Exclusive payload, without the F0/F7 framing
    SysEx { data: Vec<u8> },

    /// Any other well-formed message, by status byte
    Other { status: u8 },
}

impl MidiMessage {
    /// Parse one message from raw bytes
    ///
    /// Returns None for running status, truncated messages and unterminated
    /// SysEx.
    pub fn parse(data: &[u8]) -> Option<Self> {
        let (&status, rest) = data.split_first()?;

        if status < 0x80 {
            return None;
        }

        if status == 0xF0 {
            let end = rest.iter().position(|&b| b == 0xF7)?;
            return Some(MidiMessage::SysEx {
                data: rest[..end].to_vec(),
            });
        }

        if status >= 0xF0 {
            return Some(MidiMessage::Other { status });
        }

        let channel = status & 0x0F;
        match status & 0xF0 {
            0x80 => {
                let [note, velocity] = two_data_bytes(rest)?;
                Some(MidiMessage::NoteOff {
                    channel,
                    note,
                    velocity,
                })
            }
            0x90 => {
                let [note, velocity] = two_data_bytes(rest)?;
                // Note On with velocity 0 is a Note Off
                if velocity == 0 {
                    Some(MidiMessage::NoteOff {
                        channel,
                        note,
                        velocity: 0,
                    })
                } else {
                    Some(MidiMessage::NoteOn {
                        channel,
                        note,
                        velocity,
                    })
                }
            }
            0xB0 => {
                let [cc, value] = two_data_bytes(rest)?;
                Some(MidiMessage::ControlChange { channel, cc, value })
            }
            _ => Some(MidiMessage::Other { status }),
        }
    }

    /// Encode the message to MIDI bytes
    pub fn encode(&self) -> Vec<u8> {
        match *self {
            MidiMessage::NoteOff {
                channel,
                note,
                velocity,
            } => vec![0x80 | (channel & 0x0F), note & 0x7F, velocity & 0x7F],
            MidiMessage::NoteOn {
                channel,
                note,
                velocity,
            } => vec![0x90 | (channel & 0x0F), note & 0x7F, velocity & 0x7F],
            MidiMessage::ControlChange { channel, cc, value } => {
                vec![0xB0 | (channel & 0x0F), cc & 0x7F, value & 0x7F]
            }
            MidiMessage::SysEx { ref data } => {
                let mut bytes = Vec::with_capacity(data.len() + 2);
                bytes.push(0xF0);
                bytes.extend(data.iter().map(|b| b & 0x7F));
                bytes.push(0xF7);
                bytes
            }
            MidiMessage::Other { status } => vec![status],
        }
    }

    /// Note message for a keyswitch; velocity 0 encodes as a Note Off
    pub fn note(channel: u8, note: u8, velocity: u8) -> Self {
        if velocity == 0 {
            MidiMessage::NoteOff {
                channel,
                note,
                velocity: 0,
            }
        } else {
            MidiMessage::NoteOn {
                channel,
                note,
                velocity,
            }
        }
    }
}

fn two_data_bytes(rest: &[u8]) -> Option<[u8; 2]> {
    match rest {
        [a, b, ..] => Some([a & 0x7F, b & 0x7F]),
        _ => None,
    }
}

/// Decode a SysEx payload carrying 7-bit ASCII text
///
/// Non-printable bytes are dropped and the result is trimmed.
pub fn sysex_text(data: &[u8]) -> String {
    let text: String = data
        .iter()
        .map(|&b| b & 0x7F)
        .filter(|b| (0x20..0x7F).contains(b))
        .map(char::from)
        .collect();

    let dropped = data.len() - text.len();
    if dropped > 0 {
        trace!(dropped, raw = %format_hex(data), "dropped non-printable SysEx bytes");
    }

    text.trim().to_string()
}

impl fmt::Display for MidiMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            MidiMessage::NoteOff {
                channel,
                note,
                velocity,
            } => write!(f, "NoteOff ch:{} n:{} v:{}", channel + 1, note, velocity),
            MidiMessage::NoteOn {
                channel,
                note,
                velocity,
            } => write!(f, "NoteOn ch:{} n:{} v:{}", channel + 1, note, velocity),
            MidiMessage::ControlChange { channel, cc, value } => {
                write!(f, "CC ch:{} cc:{} v:{}", channel + 1, cc, value)
            }
            MidiMessage::SysEx { ref data } => write!(f, "SysEx {} bytes", data.len()),
            MidiMessage::Other { status } => write!(f, "Other {:02X}", status),
        }
    }
}

/// Format MIDI bytes as hex string for debugging
pub fn format_hex(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}
