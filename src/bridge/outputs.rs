//! Output seams of the bridge actor
//!
//! The actor never touches a port or socket directly. Outbound MIDI goes
//! through a [`DawOutput`], UI commits through a [`SurfaceOutput`]. Both are
//! best effort: failures come back as [`TransportError`] and are logged by
//! the actor, never retried.

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

use super::profile::TrackProfile;
use crate::engine::LogicalControl;

/// Failure of a best-effort send
#[derive(Debug, Error)]
pub enum TransportError {
    /// No connection has been established (yet)
    #[error("transport unavailable: {0}")]
    Unavailable(String),
    /// The connection went away
    #[error("transport closed")]
    Closed,
    /// The underlying send call failed
    #[error("send failed: {0}")]
    Send(String),
}

/// Outbound side of the DAW transport
///
/// Owned by the actor, so implementations may hold a plain `&mut` connection.
pub trait DawOutput: Send {
    fn send_control(&mut self, control: LogicalControl, value: u8) -> Result<(), TransportError>;

    /// Velocity 0 releases the note
    fn send_note(&mut self, channel: u8, note: u8, velocity: u8) -> Result<(), TransportError>;
}

/// Outbound side of the control-surface host
#[async_trait]
pub trait SurfaceOutput: Send + Sync {
    /// Idempotent on/off commit for one button
    async fn set_visual_state(&self, context_id: &str, active: bool) -> Result<(), TransportError>;

    /// Render the articulation page of a device from the current profile
    ///
    /// `selected` is the key index last pressed on that device.
    /// Default implementation: log only (artwork is rendered elsewhere).
    async fn render_profile(
        &self,
        device_id: &str,
        profile: &TrackProfile,
        selected: Option<usize>,
    ) -> Result<(), TransportError> {
        debug!(
            %device_id,
            title = %profile.title,
            articulations = profile.articulations.len(),
            color = ?profile.color,
            ?selected,
            "render profile"
        );
        Ok(())
    }
}

/// Output that drops everything, for when a transport is not connected
#[derive(Debug, Default)]
pub struct DisconnectedDaw;

impl DawOutput for DisconnectedDaw {
    fn send_control(&mut self, control: LogicalControl, _value: u8) -> Result<(), TransportError> {
        Err(TransportError::Unavailable(format!("no DAW output for {control}")))
    }

    fn send_note(&mut self, _channel: u8, note: u8, _velocity: u8) -> Result<(), TransportError> {
        Err(TransportError::Unavailable(format!("no DAW output for note {note}")))
    }
}
