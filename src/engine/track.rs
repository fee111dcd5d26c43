//! Track context: name, colour and articulation notes
//!
//! The host reports the selected track name and colour as bursts of
//! messages. Names are deduplicated and debounced before a track change is
//! committed; colour components are coalesced into a single `#rrggbb`.
//! Each device remembers its last pressed articulation until the track
//! changes.

use std::collections::HashMap;
use std::time::Instant;

use tracing::{debug, trace, warn};

use super::timer::TimerKey;
use super::types::{ColorComponent, DeviceId, Effect, VALUE_OFF, VALUE_ON};
use super::visibility::Page;
use super::SyncEngine;

#[derive(Debug, Default)]
pub struct TrackState {
    /// Name of the committed track (cache scope)
    pub current: String,
    /// Last name received from the host, committed or not
    pub last_received: String,
    /// Selected articulation key per device
    pub selected: HashMap<DeviceId, usize>,
    pending_name: Option<String>,
    color: [Option<u8>; 3],
}

impl TrackState {
    pub fn pending_name(&self) -> Option<&str> {
        self.pending_name.as_deref()
    }

    pub fn selected(&self, device_id: &str) -> Option<usize> {
        self.selected.get(device_id).copied()
    }

    fn set_component(&mut self, component: ColorComponent, value: u8) {
        let slot = match component {
            ColorComponent::Red => 0,
            ColorComponent::Green => 1,
            ColorComponent::Blue => 2,
        };
        self.color[slot] = Some(value);
    }

    /// Current colour as `#rrggbb`, once all three components are known
    pub fn color_hex(&self) -> Option<String> {
        let [r, g, b] = self.color;
        Some(format!(
            "#{:02x}{:02x}{:02x}",
            scale_component(r?),
            scale_component(g?),
            scale_component(b?)
        ))
    }
}

/// Scale a 7-bit colour component to 8 bits
pub fn scale_component(value: u8) -> u8 {
    let value = value.min(VALUE_ON) as f32;
    (value / 127.0 * 255.0).round() as u8
}

impl SyncEngine {
    pub(super) fn on_track_name_received(&mut self, name: &str, now: Instant) {
        let name = name.trim();
        if name.is_empty() {
            trace!("ignoring empty track name");
            return;
        }
        if name.to_lowercase() == self.track.last_received.to_lowercase() {
            trace!(track = %name, "duplicate track name");
            return;
        }

        self.track.last_received = name.to_string();
        self.track.pending_name = Some(name.to_string());
        self.timers
            .schedule(TimerKey::TrackName, now + self.config.timing.track_debounce);
    }

    pub(super) fn commit_track_name(&mut self, now: Instant) {
        if let Some(name) = self.track.pending_name.take() {
            self.apply_track_change(&name, now);
        }
    }

    pub(super) fn on_track_color_component(&mut self, component: ColorComponent, value: u8, now: Instant) {
        let value = if value > VALUE_ON {
            warn!(?component, value, "clamping out-of-range colour component");
            VALUE_ON
        } else {
            value
        };
        self.track.set_component(component, value);
        self.timers
            .schedule(TimerKey::TrackColor, now + self.config.timing.color_debounce);
    }

    pub(super) fn commit_track_color(&mut self) {
        let Some(hex) = self.track.color_hex() else {
            trace!("colour incomplete, waiting for remaining components");
            return;
        };
        debug!(%hex, "track colour");
        self.outbox.push(Effect::TrackColor { hex });
        for device_id in self.visibility.devices_showing(Page::Articulation) {
            self.render_profile(device_id);
        }
    }

    /// Render a device's articulation page with its current selection
    pub(super) fn render_profile(&mut self, device_id: DeviceId) {
        let selected = self.track.selected(&device_id);
        self.outbox.push(Effect::RenderProfile { device_id, selected });
    }

    pub(super) fn on_articulation_pressed(&mut self, device_id: DeviceId, index: usize, note: u8, now: Instant) {
        if note > 127 {
            warn!(%device_id, note, "ignoring out-of-range articulation note");
            return;
        }
        let channel = self.config.articulation_channel;

        // A second press while the note still sounds ends the first one
        if self.timers.cancel(&TimerKey::NoteRelease(note)) {
            self.outbox.push(Effect::SendNote {
                channel,
                note,
                velocity: VALUE_OFF,
            });
        }

        debug!(%device_id, note, "articulation");
        self.outbox.push(Effect::SendNote {
            channel,
            note,
            velocity: VALUE_ON,
        });
        self.timers
            .schedule(TimerKey::NoteRelease(note), now + self.config.timing.note_length);

        let previous = self.track.selected.insert(device_id.clone(), index);
        trace!(%device_id, index, ?previous, "articulation selected");
        self.render_profile(device_id);
    }

    pub(super) fn release_note(&mut self, note: u8) {
        self.outbox.push(Effect::SendNote {
            channel: self.config.articulation_channel,
            note,
            velocity: VALUE_OFF,
        });
    }
}
