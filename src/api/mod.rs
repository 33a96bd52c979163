//! HTTP and WebSocket surface.

pub mod files;
pub mod ws;

use std::path::PathBuf;

use crate::controller::ControllerHandle;

/// Shared state handed to every worker.
#[derive(Clone)]
pub struct AppState {
    /// Handle into the control loop.
    pub controller: ControllerHandle,
    /// Root of the static assets served by [`files`].
    pub public_dir: PathBuf,
}
