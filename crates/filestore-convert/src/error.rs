//! Conversion error types.

use thiserror::Error;

/// Errors from subprocess-backed conversion.
#[derive(Debug, Error)]
pub enum ConvertError {
    /// Global kill-switch: all subprocess execution is disabled by
    /// configuration.
    #[error("Conversions are disabled")]
    Disabled,

    #[error("Invalid conversion format: {0}")]
    InvalidFormat(String),

    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    /// The binary could not be started (e.g. not installed); the source
    /// carries the OS error kind.
    #[error("Failed to spawn command: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("exit status {status}")]
    ExitStatus {
        status: i32,
        stdout: String,
        stderr: String,
    },

    /// The subprocess exceeded its deadline and was killed.
    #[error("Command timed out, killed with {signal}")]
    TimedOut { signal: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type ConvertResult<T> = Result<T, ConvertError>;
