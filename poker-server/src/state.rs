//! Shared application state for the API server.

use std::path::PathBuf;

use poker::view::EngineView;

/// Shared state accessible from all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Read-only projection of the running engine.
    pub view: EngineView,
    /// Declared configuration file new services are appended to.
    pub config_file: PathBuf,
}

impl AppState {
    pub fn new(view: EngineView, config_file: PathBuf) -> Self {
        Self { view, config_file }
    }
}
