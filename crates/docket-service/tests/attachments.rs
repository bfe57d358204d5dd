mod common;

use std::io::Read;

use docket_core::media;
use docket_service::render::MockRasterizer;
use docket_service::{AttachmentError, Download, RenderPolicy, ServiceError, TaskService, Upload};
use tokio::io::AsyncReadExt;

use common::{fixture, fixture_with, new_task, FAKE_PDF};

async fn read_all(mut file: tokio::fs::File) -> Vec<u8> {
    let mut out = Vec::new();
    file.read_to_end(&mut out).await.unwrap();
    out
}

#[tokio::test]
async fn text_upload_round_trips() {
    let fx = fixture();
    let task = fx.db.create_task(&new_task("Notes")).await.unwrap();
    let store = fx.service.attachments();

    let saved = store
        .save_attachment(Upload::from_bytes("notes.txt", "text/plain", "hello"), &task.id)
        .await
        .unwrap();
    assert_eq!(saved.file_name(), "notes.txt");
    assert_eq!(saved.media_type, "text/plain");
    assert!(saved.is_derivation_root());

    let bytes = read_all(store.load_attachment_bytes("notes.txt").await.unwrap()).await;
    assert_eq!(bytes, b"hello");
}

#[tokio::test]
async fn upload_name_is_reduced_to_leaf() {
    let fx = fixture();
    let task = fx.db.create_task(&new_task("Leaf")).await.unwrap();
    let store = fx.service.attachments();

    let saved = store
        .save_attachment(
            Upload::from_bytes("../../outside.txt", "text/plain", "x"),
            &task.id,
        )
        .await
        .unwrap();
    assert_eq!(saved.file_name(), "outside.txt");
    assert!(std::path::Path::new(&saved.storage_path).starts_with(fx.store.root()));

    let err = store
        .save_attachment(Upload::from_bytes("..", "text/plain", "x"), &task.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AttachmentError::InvalidName(_)));
}

#[tokio::test]
async fn upload_for_missing_task_is_not_found() {
    let fx = fixture();
    let err = fx
        .service
        .attachments()
        .save_attachment(Upload::from_bytes("a.txt", "text/plain", "x"), "nope")
        .await
        .unwrap_err();
    assert!(matches!(err, AttachmentError::NotFound(_)));
}

#[tokio::test]
async fn pdf_upload_creates_page_images() {
    let fx = fixture();
    let task = fx.db.create_task(&new_task("Report")).await.unwrap();
    let store = fx.service.attachments();

    let pdf = store
        .save_attachment(Upload::from_bytes("report.pdf", media::PDF, FAKE_PDF), &task.id)
        .await
        .unwrap();
    assert!(pdf.is_pdf());
    assert!(pdf.is_derivation_root());

    let pages = store.derived_images(&pdf.id).await.unwrap();
    let names: Vec<String> = pages.iter().map(|p| p.file_name()).collect();
    assert_eq!(names, vec!["report-page-0.png", "report-page-1.png"]);
    for page in &pages {
        assert_eq!(page.media_type, media::PNG);
        assert_eq!(page.derived_from_id.as_deref(), Some(pdf.id.as_str()));
        assert_eq!(page.task_id, task.id);
    }

    // the pdf itself is never written
    assert!(!fx.store.root().join("report.pdf").exists());
    let page0 = read_all(store.load_attachment_bytes("report-page-0.png").await.unwrap()).await;
    assert_eq!(page0, MockRasterizer::page_bytes(0));
}

#[tokio::test]
async fn pdf_download_is_zip_of_pages() {
    let fx = fixture();
    let task = fx.db.create_task(&new_task("Report")).await.unwrap();
    let store = fx.service.attachments();
    let pdf = store
        .save_attachment(Upload::from_bytes("report.pdf", media::PDF, FAKE_PDF), &task.id)
        .await
        .unwrap();

    let download = fx.service.download_attachment(&pdf.id).await.unwrap();
    assert_eq!(download.file_name(), "converted-report.pdf.zip");
    assert_eq!(download.media_type(), media::ZIP);
    assert!(matches!(download, Download::Zip { .. }));

    let bytes = read_all(download.into_file()).await;
    let mut zip = zip::ZipArchive::new(std::io::Cursor::new(bytes)).unwrap();
    assert_eq!(zip.len(), 2);
    let mut names = Vec::new();
    for i in 0..zip.len() {
        let mut entry = zip.by_index(i).unwrap();
        names.push(entry.name().to_string());
        let mut content = Vec::new();
        entry.read_to_end(&mut content).unwrap();
        assert_eq!(content, MockRasterizer::page_bytes(i));
    }
    assert_eq!(names, vec!["report-page-0.png", "report-page-1.png"]);
}

#[tokio::test]
async fn plain_download_streams_stored_bytes() {
    let fx = fixture();
    let task = fx.db.create_task(&new_task("Notes")).await.unwrap();
    let saved = fx
        .service
        .attachments()
        .save_attachment(Upload::from_bytes("notes.txt", "text/plain", "hello"), &task.id)
        .await
        .unwrap();

    let download = fx.service.download_attachment(&saved.id).await.unwrap();
    assert_eq!(download.file_name(), "notes.txt");
    assert_eq!(download.media_type(), "text/plain");
    assert_eq!(download.len(), 5);
    assert_eq!(read_all(download.into_file()).await, b"hello");
}

#[tokio::test]
async fn download_of_missing_bytes_is_not_found() {
    let fx = fixture();
    let task = fx.db.create_task(&new_task("Gone")).await.unwrap();
    let saved = fx
        .service
        .attachments()
        .save_attachment(Upload::from_bytes("gone.txt", "text/plain", "bye"), &task.id)
        .await
        .unwrap();
    std::fs::remove_file(&saved.storage_path).unwrap();

    let err = fx.service.download_attachment(&saved.id).await.unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));
    let err = fx.service.download_attachment("no-such-id").await.unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));
}

#[tokio::test]
async fn lenient_render_failure_keeps_pdf_without_pages() {
    let fx = fixture_with(MockRasterizer::failing(), RenderPolicy::Lenient);
    let task = fx.db.create_task(&new_task("Broken")).await.unwrap();
    let store = fx.service.attachments();

    let pdf = store
        .save_attachment(Upload::from_bytes("broken.pdf", media::PDF, FAKE_PDF), &task.id)
        .await
        .unwrap();
    assert!(store.derived_images(&pdf.id).await.unwrap().is_empty());
    assert_eq!(store.list_attachments(&task.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn strict_render_failure_is_surfaced() {
    let fx = fixture_with(MockRasterizer::failing(), RenderPolicy::Strict);
    let task = fx.db.create_task(&new_task("Broken")).await.unwrap();
    let store = fx.service.attachments();

    let err = store
        .save_attachment(Upload::from_bytes("broken.pdf", media::PDF, FAKE_PDF), &task.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AttachmentError::Derivation(_)));
    assert!(store.list_attachments(&task.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn each_upload_fails_independently() {
    let fx = fixture_with(MockRasterizer::failing(), RenderPolicy::Strict);
    let uploads = vec![
        Upload::from_bytes("a.txt", "text/plain", "a"),
        Upload::from_bytes("broken.pdf", media::PDF, FAKE_PDF),
        Upload::from_bytes("b.txt", "text/plain", "b"),
    ];
    let saved = fx
        .service
        .create_task(&new_task("Mixed"), uploads)
        .await
        .unwrap();

    let names: Vec<String> = saved.attachments.iter().map(|a| a.file_name()).collect();
    assert_eq!(names, vec!["a.txt", "b.txt"]);
    assert_eq!(saved.failures.len(), 1);
    assert_eq!(saved.failures[0].file_name, "broken.pdf");
}

#[tokio::test]
async fn deleting_task_removes_files_and_records() {
    let fx = fixture();
    let saved = fx
        .service
        .create_task(
            &new_task("Cleanup"),
            vec![
                Upload::from_bytes("keep.txt", "text/plain", "k"),
                Upload::from_bytes("scan.pdf", media::PDF, FAKE_PDF),
            ],
        )
        .await
        .unwrap();
    assert_eq!(saved.attachments.len(), 4);
    let root = fx.store.root().to_path_buf();
    assert!(root.join("keep.txt").exists());
    assert!(root.join("scan-page-1.png").exists());

    fx.service.delete_task(&saved.task.id).await.unwrap();
    assert!(!root.join("keep.txt").exists());
    assert!(!root.join("scan-page-0.png").exists());
    assert!(!root.join("scan-page-1.png").exists());
    for a in &saved.attachments {
        assert!(fx.db.get_attachment(&a.id).await.is_err());
    }
    assert!(matches!(
        fx.service.delete_task(&saved.task.id).await,
        Err(ServiceError::NotFound(_))
    ));
}

#[tokio::test]
async fn create_task_validates_input() {
    let fx = fixture();
    let mut long = new_task("x");
    long.title = "t".repeat(101);
    assert!(matches!(
        fx.service.create_task(&long, vec![]).await,
        Err(ServiceError::InvalidInput(_))
    ));

    let mut dangling = new_task("Dangling");
    dangling.category_id = Some("missing".into());
    assert!(matches!(
        fx.service.create_task(&dangling, vec![]).await,
        Err(ServiceError::InvalidInput(_))
    ));
}
