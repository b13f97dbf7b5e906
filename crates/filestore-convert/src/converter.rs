//! Format and thumbnail conversion.
//!
//! Builds validated ImageMagick command lines and delegates execution to
//! the bounded runner. The output format allow-list is checked before any
//! subprocess work; `[0]` selects the first page or frame of the source.

use crate::error::{ConvertError, ConvertResult};
use crate::safe_exec::CommandRunner;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Output formats the converter will produce. Anything else fails fast.
pub const APPROVED_FORMATS: &[&str] = &["png", "jpg", "pdf"];

const THUMBNAIL_SIZE: &str = "260x300>";
const PREVIEW_SIZE: &str = "600x849>";

/// Derivation operations used by the orchestration layer. `ImageConverter`
/// is the real implementation; tests substitute counting mocks.
#[async_trait]
pub trait Converter: Send + Sync {
    /// Convert the first page/frame of `source` to `format`, returning the
    /// derived file's path (`{source}.{format}`).
    async fn convert(&self, source: &Path, format: &str) -> ConvertResult<PathBuf>;

    /// Fixed-size thumbnail of the first page/frame, as png.
    async fn thumbnail(&self, source: &Path) -> ConvertResult<PathBuf>;

    /// Fixed-size preview of the first page/frame, as png.
    async fn preview(&self, source: &Path) -> ConvertResult<PathBuf>;
}

/// ImageMagick-backed converter.
pub struct ImageConverter {
    runner: Arc<dyn CommandRunner>,
    command_prefix: Vec<String>,
}

impl ImageConverter {
    pub fn new(runner: Arc<dyn CommandRunner>, command_prefix: Vec<String>) -> Self {
        ImageConverter {
            runner,
            command_prefix,
        }
    }

    fn first_page(source: &Path) -> String {
        format!("{}[0]", source.display())
    }

    fn with_extension(source: &Path, extension: &str) -> PathBuf {
        PathBuf::from(format!("{}.{}", source.display(), extension))
    }

    async fn run_convert(&self, args: Vec<String>, destination: PathBuf) -> ConvertResult<PathBuf> {
        let mut argv = self.command_prefix.clone();
        argv.push("convert".to_string());
        argv.extend(args);
        argv.push(destination.display().to_string());

        let start = std::time::Instant::now();
        self.runner.run(&argv).await?;

        tracing::debug!(
            destination = %destination.display(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Conversion completed"
        );

        Ok(destination)
    }
}

#[async_trait]
impl Converter for ImageConverter {
    async fn convert(&self, source: &Path, format: &str) -> ConvertResult<PathBuf> {
        if !APPROVED_FORMATS.contains(&format) {
            return Err(ConvertError::InvalidFormat(format.to_string()));
        }

        let args = vec![
            "-define".to_string(),
            "pdf:fit-page=A4".to_string(),
            "-flatten".to_string(),
            "-density".to_string(),
            "300".to_string(),
            Self::first_page(source),
        ];
        self.run_convert(args, Self::with_extension(source, format))
            .await
    }

    async fn thumbnail(&self, source: &Path) -> ConvertResult<PathBuf> {
        let args = vec![
            "-flatten".to_string(),
            "-background".to_string(),
            "white".to_string(),
            "-density".to_string(),
            "300".to_string(),
            "-resize".to_string(),
            THUMBNAIL_SIZE.to_string(),
            Self::first_page(source),
        ];
        self.run_convert(args, Self::with_extension(source, "png"))
            .await
    }

    async fn preview(&self, source: &Path) -> ConvertResult<PathBuf> {
        let args = vec![
            "-flatten".to_string(),
            "-background".to_string(),
            "white".to_string(),
            "-density".to_string(),
            "300".to_string(),
            "-resize".to_string(),
            PREVIEW_SIZE.to_string(),
            Self::first_page(source),
        ];
        self.run_convert(args, Self::with_extension(source, "png"))
            .await
    }
}
