//! The control loop: one actor owning the playback engine and the session
//! registry.
//!
//! Every source of mutation (inbound WebSocket frames, session lifecycle,
//! engine events) funnels through this task's channel, so playback state
//! and broadcasts are serialized without locks and every session observes
//! statuses in the order they were produced. Engine events are picked up on
//! a periodic pump tick, at the refresh cadence the kiosk display uses.

use std::time::Duration;

use tokio::sync::mpsc;

use crate::listing;
use crate::player::{EngineEvent, PlaybackEngine};
use crate::protocol::{Command, PlaybackStatus, ServerMessage, UNKNOWN_LENGTH};
use crate::registry::{SessionId, SessionRegistry};

/// How often the engine is pumped for lifecycle events.
const ENGINE_PUMP_INTERVAL: Duration = Duration::from_millis(120);

/// Message consumed by the control loop.
enum ControlMessage {
    /// A WebSocket finished its upgrade; `tx` is its outbound channel.
    Connect {
        id: SessionId,
        tx: mpsc::UnboundedSender<String>,
    },
    /// A WebSocket closed or failed.
    Disconnect { id: SessionId },
    /// One inbound text frame, still raw.
    Frame { id: SessionId, text: String },
    /// Stop the engine and end the loop.
    Shutdown,
}

/// Cloneable handle for talking to the control loop.
///
/// All methods are fire-and-forget; once the loop has shut down they turn
/// into no-ops.
#[derive(Clone)]
pub struct ControllerHandle {
    tx: mpsc::UnboundedSender<ControlMessage>,
}

impl ControllerHandle {
    pub fn connect(&self, id: SessionId, tx: mpsc::UnboundedSender<String>) {
        let _ = self.tx.send(ControlMessage::Connect { id, tx });
    }

    pub fn disconnect(&self, id: SessionId) {
        let _ = self.tx.send(ControlMessage::Disconnect { id });
    }

    pub fn frame(&self, id: SessionId, text: String) {
        let _ = self.tx.send(ControlMessage::Frame { id, text });
    }

    pub fn shutdown(&self) {
        let _ = self.tx.send(ControlMessage::Shutdown);
    }
}

/// The control loop state. See the module docs for the threading model.
pub struct Controller {
    engine: Box<dyn PlaybackEngine>,
    registry: SessionRegistry,
    media_root: String,
    fullscreen: bool,
}

impl Controller {
    pub fn new(engine: Box<dyn PlaybackEngine>, media_root: String) -> Self {
        Self {
            engine,
            registry: SessionRegistry::new(),
            media_root,
            fullscreen: false,
        }
    }

    /// Start the control loop on the current runtime.
    pub fn spawn(engine: Box<dyn PlaybackEngine>, media_root: String) -> ControllerHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        let controller = Self::new(engine, media_root);

        tokio::spawn(controller.run(rx));

        ControllerHandle { tx }
    }

    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<ControlMessage>) {
        let mut pump = tokio::time::interval(ENGINE_PUMP_INTERVAL);
        pump.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                message = rx.recv() => match message {
                    Some(ControlMessage::Shutdown) | None => break,
                    Some(message) => self.handle(message),
                },
                _ = pump.tick() => self.pump_engine(),
            }
        }

        self.engine.stop();
        tracing::info!("Control loop stopped");
    }

    fn handle(&mut self, message: ControlMessage) {
        match message {
            ControlMessage::Connect { id, tx } => {
                self.registry.add(id, tx);
                tracing::info!(session = %id, sessions = self.registry.len(), "Session opened");

                // A fresh session gets the current status and an implicit
                // browse of the media root.
                self.send_status_to(id);
                match listing::scan(&self.media_root) {
                    Ok(result) => self.send_to(id, &ServerMessage::Browse(result)),
                    Err(err) => {
                        tracing::error!(error = %err, path = %self.media_root, "Cannot list media root")
                    }
                }
            }
            ControlMessage::Disconnect { id } => {
                if self.registry.remove(id) {
                    tracing::info!(session = %id, sessions = self.registry.len(), "Session closed");
                }
            }
            ControlMessage::Frame { id, text } => {
                self.dispatch(id, &text);
                // Commands may fail asynchronously (e.g. loading a missing
                // file); surface those right away instead of waiting for
                // the next pump tick.
                self.pump_engine();
            }
            ControlMessage::Shutdown => unreachable!("handled by the run loop"),
        }
    }

    /// Parse and execute one inbound frame.
    ///
    /// Malformed JSON, unknown command types and missing or mistyped fields
    /// are logged and discarded without a reply; the connection stays open.
    fn dispatch(&mut self, id: SessionId, text: &str) {
        let command: Command = match serde_json::from_str(text) {
            Ok(command) => command,
            Err(err) => {
                tracing::warn!(session = %id, error = %err, frame = %text, "Discarding bad frame");
                return;
            }
        };

        match command {
            Command::Browse { path } => {
                tracing::info!(session = %id, path = %path, "browse");
                match listing::scan(&path) {
                    Ok(result) => self.send_to(id, &ServerMessage::Browse(result)),
                    Err(err) => tracing::error!(error = %err, path = %path, "Browse failed"),
                }
            }
            Command::Load { path } => {
                tracing::info!(session = %id, path = %path, "load");
                let uri = format!("file://{}", path);
                self.engine.stop();
                self.engine.load(&uri);
                self.engine.play();
                self.broadcast_status();
            }
            Command::Play => {
                tracing::info!(session = %id, "play");
                self.engine.play();
                self.broadcast_status();
            }
            Command::Pause => {
                tracing::info!(session = %id, "pause");
                self.engine.pause();
                self.broadcast_status();
            }
            Command::Stop => {
                tracing::info!(session = %id, "stop");
                self.engine.stop();
                self.broadcast_status();
            }
            Command::Fullscreen => {
                tracing::info!(session = %id, "fullscreen");
                self.fullscreen = true;
                self.broadcast_status();
            }
            Command::Seek { percent } => {
                tracing::info!(session = %id, percent, "seek");
                // With an unknown duration this degenerates to a seek to 0,
                // matching the behavior remote clients already rely on.
                let duration = self.engine.duration().unwrap_or(0.0);
                self.engine.seek_to(percent / 100.0 * duration);
                self.broadcast_status();
            }
            Command::Jump { ms } => {
                tracing::info!(session = %id, ms, "jump");
                if let Some(position) = self.engine.position() {
                    self.engine.seek_to(position + ms as f64 / 1000.0);
                    self.broadcast_status();
                }
            }
        }
    }

    /// React to engine lifecycle events, re-broadcasting status on each.
    fn pump_engine(&mut self) {
        for event in self.engine.poll() {
            match event {
                EngineEvent::StateChanged(state) => {
                    tracing::debug!(state = ?state, "Engine state changed");
                }
                EngineEvent::EndOfStream => {
                    tracing::info!("End of stream");
                    self.engine.stop();
                }
                EngineEvent::Error(message) => {
                    tracing::error!(error = %message, "Engine error, stopping playback");
                    self.engine.stop();
                }
            }
            self.broadcast_status();
        }
    }

    /// Snapshot engine state into the wire representation.
    fn compose_status(&self) -> PlaybackStatus {
        PlaybackStatus {
            length: self.engine.duration().unwrap_or(UNKNOWN_LENGTH),
            state: self.engine.state(),
            position: self.engine.position().unwrap_or(0.0),
            filename: self.engine.current_uri().unwrap_or_default(),
        }
    }

    fn broadcast_status(&mut self) {
        let status = ServerMessage::Status(self.compose_status());
        match serde_json::to_string(&status) {
            Ok(encoded) => self.registry.broadcast(&encoded),
            Err(err) => tracing::error!(error = %err, "Cannot encode status"),
        }
    }

    fn send_status_to(&mut self, id: SessionId) {
        let status = ServerMessage::Status(self.compose_status());
        self.send_to(id, &status);
    }

    fn send_to(&mut self, id: SessionId, message: &ServerMessage) {
        match serde_json::to_string(message) {
            Ok(encoded) => self.registry.send_to(id, &encoded),
            Err(err) => tracing::error!(error = %err, "Cannot encode message"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::PlaybackState;
    use uuid::Uuid;

    use std::sync::{Arc, Mutex};

    /// Observable state shared between a [`MockEngine`] and its test.
    struct Probe {
        state: PlaybackState,
        uri: Option<String>,
        duration: Option<f64>,
        position: Option<f64>,
        /// Duration "reported" once a load happens.
        duration_after_load: Option<f64>,
        seeks: Vec<f64>,
        calls: Vec<&'static str>,
        pending: Vec<EngineEvent>,
    }

    impl Probe {
        fn new() -> Arc<Mutex<Self>> {
            Arc::new(Mutex::new(Self {
                state: PlaybackState::Stopped,
                uri: None,
                duration: None,
                position: None,
                duration_after_load: None,
                seeks: Vec::new(),
                calls: Vec::new(),
                pending: Vec::new(),
            }))
        }
    }

    /// Scripted engine recording every call the dispatcher makes.
    struct MockEngine {
        probe: Arc<Mutex<Probe>>,
    }

    impl PlaybackEngine for MockEngine {
        fn load(&mut self, uri: &str) {
            let mut p = self.probe.lock().unwrap();
            p.calls.push("load");
            p.uri = Some(uri.to_string());
            p.duration = p.duration_after_load;
            p.position = Some(0.0);
        }

        fn play(&mut self) {
            let mut p = self.probe.lock().unwrap();
            p.calls.push("play");
            if p.uri.is_some() {
                p.state = PlaybackState::Playing;
            }
        }

        fn pause(&mut self) {
            let mut p = self.probe.lock().unwrap();
            p.calls.push("pause");
            p.state = PlaybackState::Paused;
        }

        fn stop(&mut self) {
            let mut p = self.probe.lock().unwrap();
            p.calls.push("stop");
            p.state = PlaybackState::Stopped;
            p.position = None;
        }

        fn seek_to(&mut self, seconds: f64) {
            let mut p = self.probe.lock().unwrap();
            p.calls.push("seek");
            p.seeks.push(seconds);
            p.position = Some(seconds.max(0.0));
        }

        fn state(&self) -> PlaybackState {
            self.probe.lock().unwrap().state
        }

        fn position(&self) -> Option<f64> {
            self.probe.lock().unwrap().position
        }

        fn duration(&self) -> Option<f64> {
            self.probe.lock().unwrap().duration
        }

        fn current_uri(&self) -> Option<String> {
            self.probe.lock().unwrap().uri.clone()
        }

        fn poll(&mut self) -> Vec<EngineEvent> {
            std::mem::take(&mut self.probe.lock().unwrap().pending)
        }
    }

    struct Harness {
        controller: Controller,
        probe: Arc<Mutex<Probe>>,
    }

    impl Harness {
        fn new() -> Self {
            let probe = Probe::new();
            let engine = MockEngine {
                probe: probe.clone(),
            };
            let root = format!("{}/", std::env::temp_dir().display());
            Self {
                controller: Controller::new(Box::new(engine), root),
                probe,
            }
        }

        fn open_session(&mut self) -> (SessionId, mpsc::UnboundedReceiver<String>) {
            let id = Uuid::new_v4();
            let (tx, mut rx) = mpsc::unbounded_channel();
            self.controller.handle(ControlMessage::Connect { id, tx });
            // Drain the initial status + root listing.
            while rx.try_recv().is_ok() {}
            (id, rx)
        }

        fn frame(&mut self, id: SessionId, text: &str) {
            self.controller.handle(ControlMessage::Frame {
                id,
                text: text.to_string(),
            });
        }
    }

    fn recv_json(rx: &mut mpsc::UnboundedReceiver<String>) -> serde_json::Value {
        serde_json::from_str(&rx.try_recv().expect("expected a message")).unwrap()
    }

    #[test]
    fn test_connect_sends_status_then_listing() {
        let mut harness = Harness::new();

        let id = Uuid::new_v4();
        let (tx, mut rx) = mpsc::unbounded_channel();
        harness.controller.handle(ControlMessage::Connect { id, tx });

        let first = recv_json(&mut rx);
        assert_eq!(first["type"], "status");
        assert_eq!(first["state"], "stopped");
        assert_eq!(first["length"], -1.0);
        assert_eq!(first["filename"], "");

        let second = recv_json(&mut rx);
        assert_eq!(second["type"], "browse");
    }

    #[test]
    fn test_load_then_seek_uses_reported_duration() {
        let mut harness = Harness::new();
        harness.probe.lock().unwrap().duration_after_load = Some(120.0);
        let (id, mut rx) = harness.open_session();

        harness.frame(id, r#"{"type":"load","path":"/a.mp4"}"#);
        harness.frame(id, r#"{"type":"seek","percent":50}"#);

        {
            let probe = harness.probe.lock().unwrap();
            assert_eq!(probe.seeks, vec![60.0]);
            assert_eq!(probe.uri.as_deref(), Some("file:///a.mp4"));
        }

        let after_load = recv_json(&mut rx);
        assert_eq!(after_load["state"], "playing");

        let after_seek = recv_json(&mut rx);
        assert_eq!(after_seek["position"], 60.0);
    }

    #[test]
    fn test_seek_with_unknown_duration_degenerates_to_zero() {
        let mut harness = Harness::new();
        let (id, _rx) = harness.open_session();

        harness.frame(id, r#"{"type":"load","path":"/a.mp4"}"#);
        harness.frame(id, r#"{"type":"seek","percent":75}"#);

        assert_eq!(harness.probe.lock().unwrap().seeks, vec![0.0]);
    }

    #[test]
    fn test_pause_broadcasts_to_all_sessions() {
        let mut harness = Harness::new();
        let (id_a, mut rx_a) = harness.open_session();
        let (_id_b, mut rx_b) = harness.open_session();

        harness.frame(id_a, r#"{"type":"pause"}"#);

        let status_a = recv_json(&mut rx_a);
        let status_b = recv_json(&mut rx_b);
        assert_eq!(status_a["state"], "paused");
        assert_eq!(status_a, status_b);
    }

    #[test]
    fn test_browse_answers_only_the_requester() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::File::create(dir.path().join("movie.mkv")).unwrap();

        let mut harness = Harness::new();
        let (id_a, mut rx_a) = harness.open_session();
        let (_id_b, mut rx_b) = harness.open_session();

        let path = format!("{}/", dir.path().display());
        harness.frame(id_a, &format!(r#"{{"type":"browse","path":"{}"}}"#, path));

        let reply = recv_json(&mut rx_a);
        assert_eq!(reply["type"], "browse");
        assert_eq!(reply["path"], path.as_str());
        assert_eq!(reply["files"][0]["name"], "movie.mkv");

        assert!(rx_b.try_recv().is_err());
    }

    #[test]
    fn test_bad_frames_change_nothing() {
        let mut harness = Harness::new();
        let (id, mut rx) = harness.open_session();

        harness.frame(id, "garbage{{{");
        harness.frame(id, r#"{"no_type":"here"}"#);
        harness.frame(id, r#"{"type":"warp_speed"}"#);
        harness.frame(id, r#"{"type":"seek"}"#);
        harness.frame(id, r#"{"type":"seek","percent":"high"}"#);
        harness.frame(id, r#"{"type":"jump","ms":1.5}"#);

        assert!(harness.probe.lock().unwrap().calls.is_empty());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_jump_without_position_is_a_noop() {
        let mut harness = Harness::new();
        let (id, mut rx) = harness.open_session();

        harness.frame(id, r#"{"type":"jump","ms":-5000}"#);

        assert!(harness.probe.lock().unwrap().seeks.is_empty());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_jump_moves_relative_to_position() {
        let mut harness = Harness::new();
        harness.probe.lock().unwrap().duration_after_load = Some(600.0);
        let (id, _rx) = harness.open_session();

        harness.frame(id, r#"{"type":"load","path":"/a.mp4"}"#);
        harness.frame(id, r#"{"type":"seek","percent":10}"#);
        harness.frame(id, r#"{"type":"jump","ms":-5000}"#);

        assert_eq!(harness.probe.lock().unwrap().seeks, vec![60.0, 55.0]);
    }

    #[test]
    fn test_engine_error_forces_stop_and_broadcast() {
        let mut harness = Harness::new();
        {
            let mut probe = harness.probe.lock().unwrap();
            probe.uri = Some("file:///a.mp4".to_string());
            probe.state = PlaybackState::Playing;
            probe.position = Some(3.0);
            probe
                .pending
                .push(EngineEvent::Error("decode failed".to_string()));
        }
        let (_id, mut rx) = harness.open_session();

        harness.controller.pump_engine();

        let status = recv_json(&mut rx);
        assert_eq!(status["type"], "status");
        assert_eq!(status["state"], "stopped");
    }

    #[test]
    fn test_end_of_stream_broadcasts_stopped() {
        let mut harness = Harness::new();
        {
            let mut probe = harness.probe.lock().unwrap();
            probe.uri = Some("file:///a.mp4".to_string());
            probe.state = PlaybackState::Playing;
            probe.pending.push(EngineEvent::EndOfStream);
        }
        let (_id, mut rx) = harness.open_session();

        harness.controller.pump_engine();

        let status = recv_json(&mut rx);
        assert_eq!(status["state"], "stopped");
    }

    #[test]
    fn test_fullscreen_still_broadcasts() {
        let mut harness = Harness::new();
        let (id, mut rx) = harness.open_session();

        harness.frame(id, r#"{"type":"fullscreen"}"#);

        assert!(harness.controller.fullscreen);
        let status = recv_json(&mut rx);
        assert_eq!(status["type"], "status");
    }

    #[test]
    fn test_disconnected_session_gets_no_more_broadcasts() {
        let mut harness = Harness::new();
        let (id_a, mut rx_a) = harness.open_session();
        let (id_b, mut rx_b) = harness.open_session();

        harness
            .controller
            .handle(ControlMessage::Disconnect { id: id_a });
        harness.frame(id_b, r#"{"type":"pause"}"#);

        assert!(rx_a.try_recv().is_err());
        assert_eq!(recv_json(&mut rx_b)["state"], "paused");
    }
}
