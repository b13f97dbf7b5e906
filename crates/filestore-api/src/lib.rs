//! Filestore API Library
//!
//! This crate provides the HTTP handlers, the file handler orchestration
//! layer, and application setup.

mod handlers;
pub mod setup;
pub mod telemetry;

pub mod error;
pub mod file_handler;
pub mod state;

pub use error::FileError;
pub use file_handler::FileHandler;
pub use state::AppState;
