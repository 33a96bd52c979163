//! Built-in playback engine.
//!
//! Tracks position against the monotonic clock and probes durations from
//! the media file itself, so the control surface is fully exercisable
//! without a render pipeline attached. A deployment with a real video
//! engine replaces this with its own [`PlaybackEngine`] implementation.

use std::path::Path;
use std::time::Instant;

use lofty::file::AudioFile;

use crate::protocol::PlaybackState;

use super::{EngineEvent, PlaybackEngine};

/// Clock-driven engine state machine.
pub struct LocalEngine {
    state: PlaybackState,
    uri: Option<String>,
    duration: Option<f64>,
    /// Position at the last anchor point (pause, seek, play).
    base_position: f64,
    /// Set while playing; elapsed time since the anchor.
    playing_since: Option<Instant>,
    pending: Vec<EngineEvent>,
    eos_reached: bool,
}

/// Probe the stream duration of a local file.
fn probe_duration(path: &Path) -> Option<f64> {
    let tagged_file = lofty::read_from_path(path).ok()?;
    Some(tagged_file.properties().duration().as_secs_f64())
}

/// Strip the `file://` scheme a load URI carries.
fn uri_to_path(uri: &str) -> &str {
    uri.strip_prefix("file://").unwrap_or(uri)
}

impl LocalEngine {
    pub fn new() -> Self {
        Self {
            state: PlaybackState::Stopped,
            uri: None,
            duration: None,
            base_position: 0.0,
            playing_since: None,
            pending: Vec::new(),
            eos_reached: false,
        }
    }

    /// Freeze the clock, folding elapsed play time into the base position.
    fn anchor(&mut self) {
        if let Some(since) = self.playing_since.take() {
            self.base_position += since.elapsed().as_secs_f64();
        }
    }

    fn current_position(&self) -> f64 {
        let elapsed = self
            .playing_since
            .map(|since| since.elapsed().as_secs_f64())
            .unwrap_or(0.0);
        self.base_position + elapsed
    }

    #[cfg(test)]
    pub(crate) fn set_duration(&mut self, duration: Option<f64>) {
        self.duration = duration;
    }
}

impl Default for LocalEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl PlaybackEngine for LocalEngine {
    fn load(&mut self, uri: &str) {
        let path = uri_to_path(uri);

        self.uri = Some(uri.to_string());
        self.base_position = 0.0;
        self.playing_since = None;
        self.eos_reached = false;

        if !Path::new(path).exists() {
            self.duration = None;
            self.pending
                .push(EngineEvent::Error(format!("cannot open {}", path)));
            return;
        }

        // May fail for containers we cannot parse; playback then proceeds
        // with an unknown duration.
        self.duration = probe_duration(Path::new(path));
    }

    fn play(&mut self) {
        if self.uri.is_none() {
            return;
        }
        if self.state != PlaybackState::Playing {
            self.state = PlaybackState::Playing;
            self.playing_since = Some(Instant::now());
            self.pending
                .push(EngineEvent::StateChanged(PlaybackState::Playing));
        }
    }

    fn pause(&mut self) {
        if self.uri.is_none() {
            return;
        }
        if self.state != PlaybackState::Paused {
            self.anchor();
            self.state = PlaybackState::Paused;
            self.pending
                .push(EngineEvent::StateChanged(PlaybackState::Paused));
        }
    }

    fn stop(&mut self) {
        if self.state != PlaybackState::Stopped {
            self.pending
                .push(EngineEvent::StateChanged(PlaybackState::Stopped));
        }
        self.state = PlaybackState::Stopped;
        self.base_position = 0.0;
        self.playing_since = None;
        self.eos_reached = false;
    }

    fn seek_to(&mut self, seconds: f64) {
        if self.uri.is_none() {
            return;
        }

        let mut target = seconds.max(0.0);
        if let Some(duration) = self.duration {
            target = target.min(duration);
        }

        let was_playing = self.playing_since.is_some();
        self.base_position = target;
        self.playing_since = was_playing.then(Instant::now);
        self.eos_reached = false;
    }

    fn state(&self) -> PlaybackState {
        self.state
    }

    fn position(&self) -> Option<f64> {
        match self.state {
            PlaybackState::Stopped => None,
            _ => Some(self.current_position()),
        }
    }

    fn duration(&self) -> Option<f64> {
        self.duration
    }

    fn current_uri(&self) -> Option<String> {
        self.uri.clone()
    }

    fn poll(&mut self) -> Vec<EngineEvent> {
        if self.state == PlaybackState::Playing && !self.eos_reached {
            if let Some(duration) = self.duration {
                if self.current_position() >= duration {
                    self.eos_reached = true;
                    self.anchor();
                    self.base_position = duration;
                    self.pending.push(EngineEvent::EndOfStream);
                }
            }
        }

        std::mem::take(&mut self.pending)
    }
}
