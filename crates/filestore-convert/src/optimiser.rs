//! Post-conversion raster optimisation.

use crate::error::{ConvertError, ConvertResult};
use crate::safe_exec::CommandRunner;
use std::path::Path;
use std::sync::Arc;

/// Compresses converted PNGs in place via `optipng`. A no-op when disabled
/// by configuration.
pub struct ImageOptimiser {
    runner: Arc<dyn CommandRunner>,
    enabled: bool,
}

impl ImageOptimiser {
    pub fn new(runner: Arc<dyn CommandRunner>, enabled: bool) -> Self {
        ImageOptimiser { runner, enabled }
    }

    /// Compress the PNG at `path` in place.
    ///
    /// An optimisation failure is reported, not hidden; callers decide
    /// whether a non-optimised asset is still acceptable.
    pub async fn compress_png(&self, path: &Path) -> ConvertResult<()> {
        if !self.enabled {
            return Ok(());
        }

        let argv = vec!["optipng".to_string(), path.display().to_string()];

        match self.runner.run(&argv).await {
            Ok(_) => {
                tracing::debug!(path = %path.display(), "Optimised png");
                Ok(())
            }
            // Conversions disabled entirely: serve the unoptimised asset
            Err(ConvertError::Disabled) => Ok(()),
            Err(e) => Err(e),
        }
    }
}
