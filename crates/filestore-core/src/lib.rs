//! Filestore Core Library
//!
//! This crate provides configuration and shared types used across all
//! filestore components: the backend selector enum and the env-driven
//! `Config`.

pub mod backend;
pub mod config;
pub mod models;

// Re-export commonly used types
pub use backend::StorageBackend;
pub use config::Config;
pub use models::{ConversionOptions, ConversionStyle};
