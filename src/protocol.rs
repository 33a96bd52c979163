//! Wire types for the WebSocket control channel.
//!
//! Inbound frames are JSON objects tagged by `type`; outbound pushes reuse
//! the same tagging so clients can switch on a single field.

use serde::{Deserialize, Serialize};

/// Sentinel reported as `length` while the engine has no known duration.
pub const UNKNOWN_LENGTH: f64 = -1.0;

/// A parsed, validated inbound request.
///
/// Anything that fails to deserialize into one of these variants (unknown
/// `type`, missing or mistyped fields, malformed JSON) is discarded by the
/// dispatcher without a reply.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Command {
    /// List a directory; answered only to the requesting session.
    Browse { path: String },
    /// Stop, load `path` as a local file URI, start playing.
    Load { path: String },
    Play,
    Pause,
    Stop,
    /// Put the display into fullscreen.
    Fullscreen,
    /// Seek to `percent` (0..100) of the known duration.
    Seek { percent: f64 },
    /// Jump relative to the current position by `ms` milliseconds.
    Jump { ms: i64 },
}

/// Playback state as reported to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
    Stopped,
    Paused,
    Playing,
}

/// Snapshot of engine state, built fresh for every send.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlaybackStatus {
    /// Duration in seconds, or [`UNKNOWN_LENGTH`].
    pub length: f64,
    pub state: PlaybackState,
    /// Position in seconds.
    pub position: f64,
    /// Current URI, empty when nothing has been loaded.
    pub filename: String,
}

/// A file entry inside a [`Listing`]; directories carry no size.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileEntry {
    pub name: String,
    pub size: u64,
}

/// Result of browsing a directory, sorted and filtered per [`crate::listing`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Listing {
    pub path: String,
    pub directories: Vec<String>,
    pub files: Vec<FileEntry>,
}

/// Server-to-client push, tagged like the inbound commands.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerMessage {
    Status(PlaybackStatus),
    Browse(Listing),
}
