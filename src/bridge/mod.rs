//! Bridge between the engine and its transports
//!
//! The engine itself is synchronous. The bridge actor owns it on a single
//! tokio task, feeds it events from the surface host and the DAW, wakes it
//! on timer deadlines and applies its effects through the output seams.

pub mod actor;
pub mod commands;
pub mod handle;
pub mod outputs;
pub mod profile;

pub use actor::BridgeActor;
pub use commands::BridgeCommand;
pub use handle::BridgeHandle;
pub use outputs::{DawOutput, DisconnectedDaw, SurfaceOutput, TransportError};
pub use profile::{Articulation, ProfileLibrary, TrackProfile, TrackProfiles};
