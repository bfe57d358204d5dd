// Backend-agnostic integration tests for the Database trait.
//
// Each public async function accepts `&dyn Database` so the same assertions
// can be reused by any backend.

use docket_core::attachment::NewAttachment;
use docket_core::category::{CreateCategory, UpdateCategory};
use docket_core::tag::{CreateTag, UpdateTag};
use docket_core::task::{CreateTask, TaskFilter, TaskSort, UpdateTask};
use docket_db::{Database, DbError};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn make_task(title: &str) -> CreateTask {
    CreateTask {
        title: title.to_string(),
        description: String::new(),
        category_id: None,
        tag_id: None,
    }
}

fn original(task_id: &str, path: &str, media_type: &str) -> NewAttachment {
    NewAttachment {
        task_id: task_id.to_string(),
        storage_path: path.to_string(),
        media_type: media_type.to_string(),
        derived_from_id: None,
    }
}

// ---------------------------------------------------------------------------
// Category / tag tests
// ---------------------------------------------------------------------------

/// Category CRUD plus lookup by name and unique names.
pub async fn test_category_crud(db: &dyn Database) {
    let c = db
        .create_category(&CreateCategory {
            name: "Home".into(),
            description: "household".into(),
        })
        .await
        .unwrap();
    assert_eq!(c.name, "Home");
    assert_eq!(c.description, "household");

    let fetched = db.get_category(&c.id).await.unwrap();
    assert_eq!(fetched.id, c.id);

    let by_name = db.find_category_by_name("Home").await.unwrap();
    assert_eq!(by_name.map(|c| c.id), Some(c.id.clone()));
    assert!(db.find_category_by_name("Work").await.unwrap().is_none());

    let dup = db
        .create_category(&CreateCategory {
            name: "Home".into(),
            description: String::new(),
        })
        .await;
    assert!(matches!(dup, Err(DbError::Conflict(_))));

    let updated = db
        .update_category(
            &c.id,
            &UpdateCategory {
                description: Some("chores".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.name, "Home");
    assert_eq!(updated.description, "chores");

    // no-op update returns the current row
    let same = db
        .update_category(&c.id, &UpdateCategory::default())
        .await
        .unwrap();
    assert_eq!(same.description, "chores");

    assert_eq!(db.list_categories().await.unwrap().len(), 1);
    db.delete_category(&c.id).await.unwrap();
    assert!(db.list_categories().await.unwrap().is_empty());
    assert!(matches!(
        db.delete_category(&c.id).await,
        Err(DbError::NotFound(_))
    ));
}

/// Tag CRUD plus lookup by name.
pub async fn test_tag_crud(db: &dyn Database) {
    let a = db
        .create_tag(&CreateTag {
            name: "urgent".into(),
            description: String::new(),
        })
        .await
        .unwrap();
    db.create_tag(&CreateTag {
        name: "later".into(),
        description: String::new(),
    })
    .await
    .unwrap();

    let names: Vec<String> = db
        .list_tags()
        .await
        .unwrap()
        .into_iter()
        .map(|t| t.name)
        .collect();
    assert_eq!(names, vec!["later", "urgent"]);

    let renamed = db
        .update_tag(
            &a.id,
            &UpdateTag {
                name: Some("asap".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(renamed.name, "asap");
    assert!(db.find_tag_by_name("urgent").await.unwrap().is_none());
    assert!(db.find_tag_by_name("asap").await.unwrap().is_some());

    assert!(matches!(
        db.get_tag("missing").await,
        Err(DbError::NotFound(_))
    ));
}

// ---------------------------------------------------------------------------
// Task tests
// ---------------------------------------------------------------------------

/// Task CRUD with category and tag references.
pub async fn test_task_crud(db: &dyn Database) {
    let category = db
        .create_category(&CreateCategory {
            name: "Shopping".into(),
            description: String::new(),
        })
        .await
        .unwrap();
    let tag = db
        .create_tag(&CreateTag {
            name: "weekly".into(),
            description: String::new(),
        })
        .await
        .unwrap();

    let task = db
        .create_task(&CreateTask {
            title: "Groceries".into(),
            description: "milk, eggs".into(),
            category_id: Some(category.id.clone()),
            tag_id: Some(tag.id.clone()),
        })
        .await
        .unwrap();
    assert_eq!(task.title, "Groceries");
    assert_eq!(task.category_id.as_deref(), Some(category.id.as_str()));
    assert_eq!(task.tag_id.as_deref(), Some(tag.id.as_str()));

    let fetched = db.get_task(&task.id).await.unwrap();
    assert_eq!(fetched.id, task.id);
    assert_eq!(fetched.created_at, task.created_at);

    let updated = db
        .update_task(
            &task.id,
            &UpdateTask {
                title: Some("Groceries (Sat)".into()),
                tag_id: Some(None),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.title, "Groceries (Sat)");
    assert_eq!(updated.tag_id, None);
    assert_eq!(updated.category_id.as_deref(), Some(category.id.as_str()));
    assert_eq!(updated.created_at, task.created_at);

    // deleting a category unlinks tasks instead of removing them
    db.delete_category(&category.id).await.unwrap();
    let unlinked = db.get_task(&task.id).await.unwrap();
    assert_eq!(unlinked.category_id, None);

    db.delete_task(&task.id).await.unwrap();
    assert!(matches!(
        db.get_task(&task.id).await,
        Err(DbError::NotFound(_))
    ));
    assert!(matches!(
        db.delete_task(&task.id).await,
        Err(DbError::NotFound(_))
    ));
    assert!(matches!(
        db.update_task(&task.id, &UpdateTask::default()).await,
        Err(DbError::NotFound(_))
    ));
}

/// Substring search, tag filter, both sort orders and limit.
pub async fn test_task_listing(db: &dyn Database) {
    let tag = db
        .create_tag(&CreateTag {
            name: "home".into(),
            description: String::new(),
        })
        .await
        .unwrap();

    let mut with_tag = make_task("paint fence");
    with_tag.tag_id = Some(tag.id.clone());
    db.create_task(&make_task("Walk dog")).await.unwrap();
    db.create_task(&with_tag).await.unwrap();
    db.create_task(&make_task("buy Paint")).await.unwrap();

    let created: Vec<String> = db
        .list_tasks(&TaskFilter::default())
        .await
        .unwrap()
        .into_iter()
        .map(|t| t.title)
        .collect();
    assert_eq!(created, vec!["Walk dog", "paint fence", "buy Paint"]);

    let by_title: Vec<String> = db
        .list_tasks(&TaskFilter {
            sort: TaskSort::Title,
            ..Default::default()
        })
        .await
        .unwrap()
        .into_iter()
        .map(|t| t.title)
        .collect();
    assert_eq!(by_title, vec!["buy Paint", "paint fence", "Walk dog"]);

    let search = db
        .list_tasks(&TaskFilter {
            title: Some("PAINT".into()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(search.len(), 2);

    let tagged = db
        .list_tasks(&TaskFilter {
            tag_id: Some(tag.id.clone()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(tagged.len(), 1);
    assert_eq!(tagged[0].title, "paint fence");

    let limited = db
        .list_tasks(&TaskFilter {
            limit: Some(1),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(limited.len(), 1);
}

// ---------------------------------------------------------------------------
// Attachment tests
// ---------------------------------------------------------------------------

/// Two-phase create, insertion order, derivation lookup and delete.
pub async fn test_attachments(db: &dyn Database) {
    let task = db.create_task(&make_task("Attach task")).await.unwrap();

    let pdf = db
        .create_attachment(&original(&task.id, "/data/report.pdf", "application/pdf"))
        .await
        .unwrap();
    assert_eq!(pdf.task_id, task.id);
    assert_eq!(pdf.derived_from_id, None);

    let pdf = db.set_derived_from(&pdf.id, &pdf.id).await.unwrap();
    assert_eq!(pdf.derived_from_id.as_deref(), Some(pdf.id.as_str()));
    assert!(pdf.is_derivation_root());

    let mut pages = Vec::new();
    for i in 0..3 {
        let page = db
            .create_attachment(&NewAttachment {
                task_id: task.id.clone(),
                storage_path: format!("/data/report-page-{i}.png"),
                media_type: "image/png".into(),
                derived_from_id: Some(pdf.id.clone()),
            })
            .await
            .unwrap();
        pages.push(page.id);
    }

    let listed: Vec<String> = db
        .list_attachments(&task.id)
        .await
        .unwrap()
        .into_iter()
        .map(|a| a.id)
        .collect();
    assert_eq!(listed.len(), 4);
    assert_eq!(listed[0], pdf.id);
    assert_eq!(&listed[1..], pages.as_slice());

    // the root itself also matches derived_from_id = its own id
    let derived: Vec<String> = db
        .list_derived_attachments(&pdf.id)
        .await
        .unwrap()
        .into_iter()
        .map(|a| a.id)
        .collect();
    assert_eq!(derived.len(), 4);
    assert_eq!(&derived[1..], pages.as_slice());

    let deleted = db.delete_attachment(&pages[0]).await.unwrap();
    assert_eq!(deleted.storage_path, "/data/report-page-0.png");
    assert!(matches!(
        db.get_attachment(&pages[0]).await,
        Err(DbError::NotFound(_))
    ));
    assert!(matches!(
        db.set_derived_from("missing", "missing").await,
        Err(DbError::NotFound(_))
    ));
}

/// Deleting a task cascades to its attachment records.
pub async fn test_attachment_cascade(db: &dyn Database) {
    let task = db.create_task(&make_task("Cascade")).await.unwrap();
    let a = db
        .create_attachment(&original(&task.id, "/data/notes.txt", "text/plain"))
        .await
        .unwrap();

    db.delete_task(&task.id).await.unwrap();
    assert!(db.list_attachments(&task.id).await.unwrap().is_empty());
    assert!(db.get_attachment(&a.id).await.is_err());
}

/// Shared paths are counted per other task, never the excluded one.
pub async fn test_attachment_path_references(db: &dyn Database) {
    let first = db.create_task(&make_task("First")).await.unwrap();
    let second = db.create_task(&make_task("Second")).await.unwrap();
    db.create_attachment(&original(&first.id, "/data/list.txt", "text/plain"))
        .await
        .unwrap();

    assert_eq!(
        db.count_attachments_by_path("/data/list.txt", &first.id)
            .await
            .unwrap(),
        0
    );
    assert_eq!(
        db.count_attachments_by_path("/data/list.txt", &second.id)
            .await
            .unwrap(),
        1
    );

    db.create_attachment(&original(&second.id, "/data/list.txt", "text/plain"))
        .await
        .unwrap();
    assert_eq!(
        db.count_attachments_by_path("/data/list.txt", &first.id)
            .await
            .unwrap(),
        1
    );
    assert_eq!(
        db.count_attachments_by_path("/data/other.txt", &first.id)
            .await
            .unwrap(),
        0
    );
}

/// An attachment must reference an existing task.
pub async fn test_attachment_requires_task(db: &dyn Database) {
    let result = db
        .create_attachment(&original("no-such-task", "/data/x.txt", "text/plain"))
        .await;
    assert!(matches!(result, Err(DbError::Internal(_))));
}
