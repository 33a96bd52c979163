//! Playback engine adapter and the built-in local engine.

pub mod engine;
pub mod local;

pub use engine::{EngineEvent, PlaybackEngine};
pub use local::LocalEngine;
