//! HTTP handlers: a thin adapter between axum and the file handler.

pub mod files;
pub mod range;
