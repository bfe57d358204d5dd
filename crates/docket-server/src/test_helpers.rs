use std::sync::Arc;

use axum::Router;
use docket_db::SqliteDatabase;
use docket_service::render::MockRasterizer;
use docket_service::{LocalService, RenderPolicy};
use docket_store::LocalStore;
use tempfile::TempDir;
use tokio::net::TcpListener;

use crate::routes::{build_router, InnerAppState};

/// Upload limit used by test routers.
pub const TEST_MAX_UPLOAD_BYTES: usize = 8 * 1024 * 1024;

/// A router over in-memory SQLite, a temp storage root and a mock
/// rasterizer that renders every PDF as two pages. Keep the `TempDir`
/// alive for as long as the router is used.
pub fn test_router() -> (Router, TempDir) {
    test_router_with(MockRasterizer::with_pages(2), RenderPolicy::Lenient)
}

pub fn test_router_with(rasterizer: MockRasterizer, policy: RenderPolicy) -> (Router, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let db = Arc::new(SqliteDatabase::open_in_memory().unwrap());
    let store = Arc::new(LocalStore::open(dir.path().join("uploads")).unwrap());
    let service = LocalService::new(db, store, Arc::new(rasterizer), policy);
    let state = Arc::new(InnerAppState {
        service,
        max_upload_bytes: TEST_MAX_UPLOAD_BYTES,
    });
    (build_router(state), dir)
}

/// A running test server with base_url and background task handle.
pub struct TestServer {
    pub base_url: String,
    _dir: TempDir,
    _handle: tokio::task::JoinHandle<()>,
}

/// Spawn an axum test server on a random port. Returns the TestServer
/// with the `base_url` (e.g. "http://127.0.0.1:12345").
pub async fn spawn_test_server() -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let base_url = format!("http://{addr}");
    let (app, dir) = test_router();
    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    TestServer {
        base_url,
        _dir: dir,
        _handle: handle,
    }
}
