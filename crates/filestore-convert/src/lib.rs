//! Filestore Conversion Library
//!
//! Subprocess-backed derivation of alternate representations: format
//! conversion, thumbnails and previews via ImageMagick, plus PNG
//! optimisation. All execution goes through [`SafeExec`], which enforces
//! the configured timeout and the global conversion kill-switch.

pub mod converter;
pub mod error;
pub mod optimiser;
pub mod safe_exec;

// Re-export commonly used types
pub use converter::{Converter, ImageConverter, APPROVED_FORMATS};
pub use error::{ConvertError, ConvertResult};
pub use optimiser::ImageOptimiser;
pub use safe_exec::{CommandOutput, CommandRunner, SafeExec};
