// Shared fixtures for the service integration tests: an in-memory record
// store, a temp storage root and a mock rasterizer.

use std::sync::Arc;

use docket_core::task::CreateTask;
use docket_db::{Database, SqliteDatabase};
use docket_service::render::MockRasterizer;
use docket_service::{LocalService, PageRasterizer, RenderPolicy};
use docket_store::LocalStore;

pub struct Fixture {
    pub db: Arc<dyn Database>,
    pub service: LocalService,
    pub store: Arc<LocalStore>,
    // Keeps the storage root alive for the test.
    pub _dir: tempfile::TempDir,
}

pub fn fixture_with(rasterizer: impl PageRasterizer + 'static, policy: RenderPolicy) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let db: Arc<dyn Database> = Arc::new(SqliteDatabase::open_in_memory().unwrap());
    let store = Arc::new(LocalStore::open(dir.path().join("uploads")).unwrap());
    let service = LocalService::new(db.clone(), store.clone(), Arc::new(rasterizer), policy);
    Fixture {
        db,
        service,
        store,
        _dir: dir,
    }
}

pub fn fixture() -> Fixture {
    fixture_with(MockRasterizer::with_pages(2), RenderPolicy::Lenient)
}

pub fn new_task(title: &str) -> CreateTask {
    CreateTask {
        title: title.to_string(),
        description: String::new(),
        category_id: None,
        tag_id: None,
    }
}

pub const FAKE_PDF: &[u8] = b"%PDF-1.7\n% fake document\n%%EOF\n";
