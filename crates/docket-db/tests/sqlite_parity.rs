// Integration tests that exercise every Database trait method against the
// in-memory SQLite backend.  The test logic lives in `common/mod.rs`.

mod common;

use std::sync::Arc;
use docket_db::Database;

async fn make_db() -> Arc<dyn Database> {
    Arc::new(docket_db::SqliteDatabase::open_in_memory().unwrap())
}

#[tokio::test]
async fn category_crud() {
    let db = make_db().await;
    common::test_category_crud(&*db).await;
}

#[tokio::test]
async fn tag_crud() {
    let db = make_db().await;
    common::test_tag_crud(&*db).await;
}

#[tokio::test]
async fn task_crud() {
    let db = make_db().await;
    common::test_task_crud(&*db).await;
}

#[tokio::test]
async fn task_listing() {
    let db = make_db().await;
    common::test_task_listing(&*db).await;
}

#[tokio::test]
async fn attachments() {
    let db = make_db().await;
    common::test_attachments(&*db).await;
}

#[tokio::test]
async fn attachment_cascade() {
    let db = make_db().await;
    common::test_attachment_cascade(&*db).await;
}

#[tokio::test]
async fn attachment_path_references() {
    let db = make_db().await;
    common::test_attachment_path_references(&*db).await;
}

#[tokio::test]
async fn attachment_requires_task() {
    let db = make_db().await;
    common::test_attachment_requires_task(&*db).await;
}

#[tokio::test]
async fn file_backed_database_persists_between_opens() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("docket.db");
    {
        let db = docket_db::SqliteDatabase::open_path(&path).unwrap();
        db.create_task(&docket_core::task::CreateTask {
            title: "persisted".into(),
            description: String::new(),
            category_id: None,
            tag_id: None,
        })
        .await
        .unwrap();
    }
    let db = docket_db::SqliteDatabase::open_path(&path).unwrap();
    let tasks = db
        .list_tasks(&docket_core::task::TaskFilter::default())
        .await
        .unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].title, "persisted");
}
