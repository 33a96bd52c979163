//! The contract the control layer drives and observes.
//!
//! The real decode/render pipeline lives outside this crate; everything the
//! controller needs from it fits behind [`PlaybackEngine`]. Implementations
//! queue lifecycle events internally and hand them over through [`poll`],
//! which the controller calls from its own loop. Engine-internal threads
//! never touch shared state directly.
//!
//! [`poll`]: PlaybackEngine::poll

use crate::protocol::PlaybackState;

/// Asynchronous lifecycle notification from the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// The pipeline transitioned on its own (not via a direct call).
    StateChanged(PlaybackState),
    /// Playback ran off the end of the stream.
    EndOfStream,
    /// The pipeline failed; the controller forces a stop in response.
    Error(String),
}

/// Playback primitives consumed by the controller.
pub trait PlaybackEngine: Send {
    /// Set the media URI. Does not start playback on its own.
    fn load(&mut self, uri: &str);

    /// Transition to playing. Idempotent.
    fn play(&mut self);

    /// Transition to paused. Idempotent.
    fn pause(&mut self);

    /// Transition to stopped. Idempotent.
    fn stop(&mut self);

    /// Seek to an absolute position in seconds, clamped to the engine's own
    /// bounds.
    fn seek_to(&mut self, seconds: f64);

    fn state(&self) -> PlaybackState;

    /// Current position in seconds, if one can be queried.
    fn position(&self) -> Option<f64>;

    /// Stream duration in seconds, if known since the last load.
    fn duration(&self) -> Option<f64>;

    /// The URI last given to [`load`](PlaybackEngine::load).
    fn current_uri(&self) -> Option<String>;

    /// Drain pending lifecycle events.
    fn poll(&mut self) -> Vec<EngineEvent>;
}
