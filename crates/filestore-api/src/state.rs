//! Application state.

use crate::file_handler::FileHandler;

/// Shared state for all handlers. Built once at startup; everything in it
/// is read-only afterwards.
pub struct AppState {
    pub handler: FileHandler,
}
