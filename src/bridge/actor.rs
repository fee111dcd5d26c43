//! BridgeActor - single task owning the synchronization engine
//!
//! All inbound events (surface host and DAW) are multiplexed onto one
//! command channel. The actor runs every handler to completion, sleeps until
//! the engine's next timer deadline in between, and applies the effects the
//! engine produced after each step.
//!
//! ```text
//!  host ws ──┐                                  ┌──► DawOutput (MIDI)
//!            ├─► command_rx ─► SyncEngine ─► effects
//!  midi in ──┘        ▲                         └──► SurfaceOutput (UI)
//!                     │
//!              sleep_until(next_deadline)
//! ```

use std::sync::Arc;

use futures_util::future::join_all;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use super::commands::BridgeCommand;
use super::handle::BridgeHandle;
use super::outputs::{DawOutput, SurfaceOutput};
use super::profile::{TrackProfile, TrackProfiles};
use crate::engine::{Effect, EngineEvent, SyncEngine};

pub struct BridgeActor {
    engine: SyncEngine,
    daw: Box<dyn DawOutput>,
    surface: Arc<dyn SurfaceOutput>,
    profiles: Box<dyn TrackProfiles>,
    /// Profile of the committed track
    profile: TrackProfile,
    command_rx: mpsc::UnboundedReceiver<BridgeCommand>,
    /// Total effects applied, for the shutdown log
    effect_count: u64,
}

/// Current time on the tokio clock, as used by the engine
fn now() -> std::time::Instant {
    tokio::time::Instant::now().into_std()
}

async fn sleep_until_deadline(deadline: Option<std::time::Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)).await,
        None => std::future::pending().await,
    }
}

impl BridgeActor {
    pub fn new(
        engine: SyncEngine,
        daw: Box<dyn DawOutput>,
        surface: Arc<dyn SurfaceOutput>,
        profiles: Box<dyn TrackProfiles>,
    ) -> (Self, BridgeHandle) {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let actor = Self {
            engine,
            daw,
            surface,
            profiles,
            profile: TrackProfile::default(),
            command_rx: cmd_rx,
            effect_count: 0,
        };
        (actor, BridgeHandle::new(cmd_tx))
    }

    /// Create the actor and spawn its run loop
    pub fn spawn(
        engine: SyncEngine,
        daw: Box<dyn DawOutput>,
        surface: Arc<dyn SurfaceOutput>,
        profiles: Box<dyn TrackProfiles>,
    ) -> (BridgeHandle, JoinHandle<()>) {
        let (actor, handle) = Self::new(engine, daw, surface, profiles);
        let task = tokio::spawn(actor.run());
        info!("Bridge actor spawned");
        (handle, task)
    }

    /// Run until shutdown or until every handle is dropped
    pub async fn run(mut self) {
        debug!("Bridge actor run loop started");

        loop {
            let deadline = self.engine.next_deadline();

            tokio::select! {
                cmd = self.command_rx.recv() => match cmd {
                    Some(BridgeCommand::Shutdown) => {
                        info!("Bridge actor received shutdown command");
                        break;
                    }
                    Some(cmd) => self.handle_command(cmd),
                    None => {
                        debug!("All bridge handles dropped");
                        break;
                    }
                },
                _ = sleep_until_deadline(deadline) => {
                    self.engine.advance(now());
                }
            }

            self.flush_effects().await;
        }

        info!(effects = self.effect_count, "Bridge actor stopped");
    }

    fn handle_command(&mut self, cmd: BridgeCommand) {
        trace!(?cmd, "Processing command");

        match cmd {
            BridgeCommand::Event(event) => self.engine.handle(event, now()),
            BridgeCommand::ArticulationPressed { device_id, index } => {
                match self.profile.note_at(index) {
                    Some(note) => self.engine.handle(
                        EngineEvent::ArticulationPressed {
                            device_id,
                            index,
                            note,
                        },
                        now(),
                    ),
                    None => debug!(%device_id, index, track = %self.profile.title, "no articulation at key"),
                }
            }
            BridgeCommand::Snapshot { response } => {
                self.engine.advance(now());
                let _ = response.send(self.engine.snapshot());
            }
            BridgeCommand::CurrentProfile { response } => {
                let _ = response.send(self.profile.clone());
            }
            // Handled by the run loop
            BridgeCommand::Shutdown => {}
        }
    }

    /// Apply pending engine effects
    ///
    /// MIDI goes out immediately in engine order. UI commits and profile
    /// renders are batched: all of them are started, then all awaited.
    async fn flush_effects(&mut self) {
        let effects = self.engine.take_effects();
        if effects.is_empty() {
            return;
        }
        self.effect_count += effects.len() as u64;

        let mut commits = Vec::new();
        let mut renders = Vec::new();

        for effect in effects {
            match effect {
                Effect::SendControl { control, value } => {
                    if let Err(e) = self.daw.send_control(control, value) {
                        warn!(%control, value, error = %e, "Dropping outbound command");
                    }
                }
                Effect::SendNote {
                    channel,
                    note,
                    velocity,
                } => {
                    if let Err(e) = self.daw.send_note(channel, note, velocity) {
                        warn!(channel, note, velocity, error = %e, "Dropping outbound note");
                    }
                }
                Effect::SetVisualState { context_id, active } => commits.push((context_id, active)),
                Effect::RenderProfile { device_id, selected } => renders.push((device_id, selected)),
                Effect::TrackChanged { name } => {
                    let color = self.profile.color.take();
                    self.profile = self.profiles.on_track_changed(&name);
                    if self.profile.color.is_none() {
                        self.profile.color = color;
                    }
                    info!(
                        title = %self.profile.title,
                        articulations = self.profile.articulations.len(),
                        "✅ Profile loaded"
                    );
                }
                Effect::TrackColor { hex } => self.profile.color = Some(hex),
            }
        }

        let surface = &self.surface;
        let results = join_all(
            commits
                .iter()
                .map(|(context_id, active)| surface.set_visual_state(context_id, *active)),
        )
        .await;
        for ((context_id, active), result) in commits.iter().zip(results) {
            if let Err(e) = result {
                warn!(%context_id, active, error = %e, "UI commit failed");
            }
        }

        let profile = &self.profile;
        let results = join_all(
            renders
                .iter()
                .map(|(device_id, selected)| surface.render_profile(device_id, profile, *selected)),
        )
        .await;
        for ((device_id, _), result) in renders.iter().zip(results) {
            if let Err(e) = result {
                warn!(%device_id, error = %e, "Profile render failed");
            }
        }
    }
}
