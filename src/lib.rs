#![doc = include_str!("../README.md")]

// private mods (will be partly re-exported)
mod error;
mod gesture;
mod glass;
mod grain;
mod host;
mod output;
mod physics;
mod player;
mod reverse;
mod speed;
mod transport;

// public, flat re-exports
pub use error::Error;

pub use glass::{Chamber, GlassGeometry};
pub use grain::{Grain, GrainState};
pub use physics::{GrainEngine, StaticFill};

pub use gesture::{RotationController, ShakeDetector};
pub use speed::{playback_speed, SHAKE_BOOST_FACTOR};

pub use host::{AudioHandle, SurfaceInfo};
pub use output::{default_graph, AudioGraph, SilentGraph};
#[cfg(feature = "cpal-output")]
pub use output::cpal::CpalGraph;

pub use reverse::{ReverseBuffer, ReverseEngine, MAX_PLAYBACK_RATE, MIN_PLAYBACK_RATE};
pub use transport::{TransportClock, TransportMode};

pub use player::{create_player, PlayerSession, STALL_TIMEOUT};

// public mods
pub mod utils;
