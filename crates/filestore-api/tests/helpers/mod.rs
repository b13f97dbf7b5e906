//! Test helpers: build AppState and router for integration tests.
//!
//! The storage backend is a real filesystem persistor in a temp
//! directory. Conversion goes through a counting stub so the tests do
//! not need ImageMagick on the host.

use async_trait::async_trait;
use axum_test::TestServer;
use filestore_api::setup::routes;
use filestore_api::state::AppState;
use filestore_api::FileHandler;
use filestore_convert::{CommandRunner, ConvertResult, Converter, ImageOptimiser, SafeExec};
use filestore_storage::{FsPersistor, LocalFileWriter};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

pub const DERIVED_BODY: &[u8] = b"derived bytes";

/// Converter stub that records calls and writes a fixed derived file.
pub struct StubConverter {
    calls: AtomicUsize,
}

impl StubConverter {
    fn new() -> Arc<Self> {
        Arc::new(StubConverter {
            calls: AtomicUsize::new(0),
        })
    }

    pub fn count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn write_derived(&self, source: &Path, extension: &str) -> ConvertResult<PathBuf> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let dest = PathBuf::from(format!("{}.{}", source.display(), extension));
        tokio::fs::write(&dest, DERIVED_BODY).await?;
        Ok(dest)
    }
}

#[async_trait]
impl Converter for StubConverter {
    async fn convert(&self, source: &Path, format: &str) -> ConvertResult<PathBuf> {
        self.write_derived(source, format).await
    }

    async fn thumbnail(&self, source: &Path) -> ConvertResult<PathBuf> {
        self.write_derived(source, "png").await
    }

    async fn preview(&self, source: &Path) -> ConvertResult<PathBuf> {
        self.write_derived(source, "png").await
    }
}

/// Test application: server plus owned resources.
pub struct TestApp {
    pub server: TestServer,
    pub converter: Arc<StubConverter>,
    pub _temp_dir: TempDir,
}

impl TestApp {
    pub fn client(&self) -> &TestServer {
        &self.server
    }
}

pub async fn setup_test_app() -> TestApp {
    let temp_dir = TempDir::new().expect("create temp dir");
    let root = temp_dir.path();

    let writer = LocalFileWriter::new(Some(root.join(".staging")))
        .await
        .expect("create staging dir");
    let persistor: Arc<dyn filestore_storage::Persistor> = Arc::new(
        FsPersistor::new(root.join("store"), writer.clone())
            .await
            .expect("create fs persistor"),
    );

    let converter = StubConverter::new();
    let runner: Arc<dyn CommandRunner> = Arc::new(SafeExec::new(
        false,
        Duration::from_secs(5),
        "SIGTERM".to_string(),
    ));
    let optimiser = Arc::new(ImageOptimiser::new(runner, false));

    let handler = FileHandler::new(persistor, converter.clone(), optimiser, writer);
    let state = Arc::new(AppState { handler });

    let server = TestServer::new(routes::setup_routes(state)).expect("start test server");

    TestApp {
        server,
        converter,
        _temp_dir: temp_dir,
    }
}
