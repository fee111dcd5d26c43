//! Configuration management for Deck Bridge
//!
//! Handles loading, parsing and validation of the YAML configuration file.
//! Every section is optional; missing values fall back to the defaults the
//! DAW remote script expects. Configuration is read once at startup.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tokio::fs;
use tracing::info;

use crate::engine::{CachePolicy, EngineConfig, Timing};

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    pub midi: MidiConfig,
    pub host: HostConfig,
    pub surface: SurfaceConfig,
    pub engine: EngineSection,
}

/// MIDI port configuration (matched by case-insensitive substring)
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct MidiConfig {
    #[serde(default = "default_input_port")]
    pub input_port: String,
    #[serde(default = "default_output_port")]
    pub output_port: String,
}

/// Control-surface host configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct HostConfig {
    /// Action identifier of command buttons
    #[serde(default = "default_command_action")]
    pub command_action: String,
    /// Action identifier of articulation buttons
    #[serde(default = "default_articulation_action")]
    pub articulation_action: String,
    /// Keys per row on the device
    #[serde(default = "default_columns")]
    pub columns: u8,
    /// First row of the articulation page
    #[serde(default = "default_articulation_start_row")]
    pub articulation_start_row: u8,
}

/// MIDI layout shared with the DAW remote script
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SurfaceConfig {
    /// Channel of command CCs (zero-based)
    #[serde(default = "default_command_channel")]
    pub command_channel: u8,
    /// First command slot CC
    #[serde(default = "default_cc_first")]
    pub cc_first: u8,
    /// Last command slot CC
    #[serde(default = "default_cc_last")]
    pub cc_last: u8,
    /// Channel carrying the track colour
    #[serde(default = "default_color_channel")]
    pub color_channel: u8,
    #[serde(default)]
    pub color_cc: ColorCc,
    /// Channel of articulation keyswitch notes
    #[serde(default)]
    pub articulation_channel: u8,
}

/// Track colour CC numbers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct ColorCc {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

/// Synchronization engine settings
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct EngineSection {
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default = "default_true")]
    pub force_resync_after_settle: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct CacheConfig {
    #[serde(default = "default_true")]
    pub per_track: bool,
    #[serde(default)]
    pub clear_on_track_change: bool,
}

/// Timing constants in milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct TimingConfig {
    pub tap_debounce_ms: u64,
    pub key_cooldown_ms: u64,
    pub ack_timeout_ms: u64,
    pub settle_ms: u64,
    pub resync_delay_ms: u64,
    pub stale_after_ms: u64,
    pub track_debounce_ms: u64,
    pub color_debounce_ms: u64,
    pub note_length_ms: u64,
}

impl Default for MidiConfig {
    fn default() -> Self {
        Self {
            input_port: default_input_port(),
            output_port: default_output_port(),
        }
    }
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            command_action: default_command_action(),
            articulation_action: default_articulation_action(),
            columns: default_columns(),
            articulation_start_row: default_articulation_start_row(),
        }
    }
}

impl Default for SurfaceConfig {
    fn default() -> Self {
        Self {
            command_channel: default_command_channel(),
            cc_first: default_cc_first(),
            cc_last: default_cc_last(),
            color_channel: default_color_channel(),
            color_cc: ColorCc::default(),
            articulation_channel: 0,
        }
    }
}

impl Default for ColorCc {
    fn default() -> Self {
        Self { r: 20, g: 21, b: 22 }
    }
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            timing: TimingConfig::default(),
            force_resync_after_settle: true,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            per_track: true,
            clear_on_track_change: false,
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            tap_debounce_ms: 220,
            key_cooldown_ms: 220,
            ack_timeout_ms: 900,
            settle_ms: 160,
            resync_delay_ms: 260,
            stale_after_ms: 3500,
            track_debounce_ms: 120,
            color_debounce_ms: 25,
            note_length_ms: 110,
        }
    }
}

impl TimingConfig {
    pub fn to_timing(&self) -> Timing {
        Timing {
            tap_debounce: Duration::from_millis(self.tap_debounce_ms),
            key_cooldown: Duration::from_millis(self.key_cooldown_ms),
            ack_timeout: Duration::from_millis(self.ack_timeout_ms),
            settle: Duration::from_millis(self.settle_ms),
            resync_delay: Duration::from_millis(self.resync_delay_ms),
            stale_after: Duration::from_millis(self.stale_after_ms),
            track_debounce: Duration::from_millis(self.track_debounce_ms),
            color_debounce: Duration::from_millis(self.color_debounce_ms),
            note_length: Duration::from_millis(self.note_length_ms),
        }
    }
}

impl SurfaceConfig {
    /// CC of the command slot at a grid position, if the slot exists
    pub fn slot_cc(&self, index: usize) -> Option<u8> {
        let cc = self.cc_first as usize + index;
        (cc <= self.cc_last as usize).then_some(cc as u8)
    }
}

impl AppConfig {
    /// Load configuration from file with validation
    pub async fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config = Self::from_yaml(&contents)
            .with_context(|| format!("Invalid config file: {}", path.display()))?;

        Ok(config)
    }

    /// Load the file if it exists, otherwise use defaults
    ///
    /// A file that exists but does not parse or validate is still an error.
    pub async fn load_or_default(path: &Path) -> Result<Self> {
        if fs::try_exists(path).await.unwrap_or(false) {
            Self::load(path).await
        } else {
            info!("No config file at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Parse and validate YAML
    pub fn from_yaml(contents: &str) -> Result<Self> {
        // An empty file is a valid, all-defaults config
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: AppConfig =
            serde_yaml::from_str(contents).context("Failed to parse YAML config")?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration for correctness and consistency
    pub fn validate(&self) -> Result<()> {
        if self.midi.input_port.trim().is_empty() {
            anyhow::bail!("midi.input_port cannot be empty");
        }
        if self.midi.output_port.trim().is_empty() {
            anyhow::bail!("midi.output_port cannot be empty");
        }

        if self.host.command_action.is_empty() || self.host.articulation_action.is_empty() {
            anyhow::bail!("host action identifiers cannot be empty");
        }
        if self.host.columns == 0 {
            anyhow::bail!("host.columns must be at least 1");
        }

        let surface = &self.surface;
        for (field, channel) in [
            ("surface.command_channel", surface.command_channel),
            ("surface.color_channel", surface.color_channel),
            ("surface.articulation_channel", surface.articulation_channel),
        ] {
            if channel > 15 {
                anyhow::bail!("{} has invalid channel {} (must be 0-15)", field, channel);
            }
        }
        for (field, cc) in [
            ("surface.cc_first", surface.cc_first),
            ("surface.cc_last", surface.cc_last),
            ("surface.color_cc.r", surface.color_cc.r),
            ("surface.color_cc.g", surface.color_cc.g),
            ("surface.color_cc.b", surface.color_cc.b),
        ] {
            if cc > 127 {
                anyhow::bail!("{} has invalid CC number {} (must be 0-127)", field, cc);
            }
        }
        if surface.cc_first > surface.cc_last {
            anyhow::bail!(
                "surface.cc_first ({}) must not exceed surface.cc_last ({})",
                surface.cc_first,
                surface.cc_last
            );
        }

        if self.engine.timing.ack_timeout_ms == 0 {
            anyhow::bail!("engine.timing.ack_timeout_ms must be greater than 0");
        }

        Ok(())
    }

    /// Engine settings derived from this configuration
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            timing: self.engine.timing.to_timing(),
            cache: CachePolicy {
                per_track: self.engine.cache.per_track,
                clear_on_track_change: self.engine.cache.clear_on_track_change,
            },
            force_resync_after_settle: self.engine.force_resync_after_settle,
            articulation_channel: self.surface.articulation_channel,
        }
    }
}

fn default_input_port() -> String { "CubaseToNode".to_string() }
fn default_output_port() -> String { "NodeToCubase".to_string() }
fn default_command_action() -> String { "com.deckbridge.command".to_string() }
fn default_articulation_action() -> String { "com.deckbridge.articulation".to_string() }
fn default_columns() -> u8 { 8 }
fn default_articulation_start_row() -> u8 { 1 }
fn default_command_channel() -> u8 { 13 }
fn default_cc_first() -> u8 { 10 }
fn default_cc_last() -> u8 { 41 }
fn default_color_channel() -> u8 { 14 }
fn default_true() -> bool { true }
