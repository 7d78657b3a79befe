mod helpers;

use std::sync::Arc;

use sqlx::Row;

use trackway::domain::models::{
    Device, ResourceType, Review, ReviewRequirement, ReviewerType, Task,
};
use trackway::domain::ports::{ReviewStore, TaskFilter, TaskRow, TaskStore};
use trackway::infrastructure::credentials::CredentialVault;
use trackway::infrastructure::database::{SqliteReviewStore, SqliteTaskStore};

use helpers::database::setup_test_db;

fn vault() -> Arc<CredentialVault> {
    Arc::new(CredentialVault::from_key([7u8; 32]))
}

fn task_with(description: &str, owner: &str) -> Task {
    Task::new(description, Some(owner.to_string()))
}

#[tokio::test]
async fn test_upsert_and_get_round_trip() {
    let (pool, _dir) = setup_test_db().await;
    let store = SqliteTaskStore::new(pool, vault());

    let mut task = task_with("Round trip", "owner@x.com");
    task.tags = vec!["smoke".into(), "web".into()];
    task.labels.insert("env".into(), "prod".into());
    task.parameters.insert("site".into(), serde_json::json!("example.com"));

    let row = TaskRow::from_task(&task);
    store.upsert(&row).await.expect("failed to upsert task");

    let loaded = store
        .get(&task.id)
        .await
        .expect("failed to get task")
        .expect("task should exist");
    assert_eq!(loaded.id, task.id);
    assert_eq!(loaded.description.as_deref(), Some("Round trip"));
    assert_eq!(loaded.tags, vec!["smoke".to_string(), "web".to_string()]);
    assert_eq!(loaded.labels.get("env").map(String::as_str), Some("prod"));
    assert_eq!(loaded.parameters.get("site"), task.parameters.get("site"));
    assert_eq!(loaded.thread_ids.len(), 1);
    assert_eq!(loaded.episode_id.as_deref(), Some(task.episode.id.as_str()));
}

#[tokio::test]
async fn test_device_column_is_encrypted_at_rest() {
    let (pool, _dir) = setup_test_db().await;
    let store = SqliteTaskStore::new(pool.clone(), vault());

    let mut task = task_with("Secret device", "owner@x.com");
    task.device = Some(Device {
        name: "desktop-1".into(),
        provider: Some("qemu".into()),
        config: [("password".to_string(), serde_json::json!("hunter2"))].into(),
    });
    store.upsert(&TaskRow::from_task(&task)).await.unwrap();

    // The raw column never carries the plaintext secret.
    let raw: Option<String> = sqlx::query("SELECT device FROM tasks WHERE id = ?")
        .bind(&task.id)
        .fetch_one(&pool)
        .await
        .unwrap()
        .try_get("device")
        .unwrap();
    let raw = raw.expect("device column should be set");
    assert!(!raw.contains("hunter2"));
    assert!(!raw.contains("desktop-1"));

    // The store decrypts transparently on load.
    let loaded = store.get(&task.id).await.unwrap().unwrap();
    assert_eq!(loaded.device, task.device);
}

#[tokio::test]
async fn test_find_orders_newest_first_and_scopes_owner() {
    let (pool, _dir) = setup_test_db().await;
    let store = SqliteTaskStore::new(pool, vault());

    let mut older = task_with("older", "owner@x.com");
    older.created = 100.0;
    let mut newer = task_with("newer", "owner@x.com");
    newer.created = 200.0;
    let foreign = task_with("foreign", "somebody@else.com");

    for task in [&older, &newer, &foreign] {
        store.upsert(&TaskRow::from_task(task)).await.unwrap();
    }

    let filter = TaskFilter {
        owners: vec!["owner@x.com".into()],
        ..TaskFilter::default()
    };
    let rows = store.find(&filter).await.unwrap();
    let descriptions: Vec<_> = rows.iter().map(|r| r.description.clone().unwrap()).collect();
    assert_eq!(descriptions, vec!["newer".to_string(), "older".to_string()]);
}

#[tokio::test]
async fn test_tag_and_label_filters_are_conjunctive() {
    let (pool, _dir) = setup_test_db().await;
    let store = SqliteTaskStore::new(pool, vault());

    let mut both = task_with("both", "o@x.com");
    both.tags = vec!["smoke".into(), "web".into()];
    both.labels.insert("env".into(), "prod".into());

    let mut tag_only = task_with("tag only", "o@x.com");
    tag_only.tags = vec!["smoke".into()];

    let mut label_only = task_with("label only", "o@x.com");
    label_only.labels.insert("env".into(), "prod".into());

    for task in [&both, &tag_only, &label_only] {
        store.upsert(&TaskRow::from_task(task)).await.unwrap();
    }

    let filter = TaskFilter {
        owners: vec!["o@x.com".into()],
        tags: vec!["smoke".into(), "web".into()],
        labels: [("env".to_string(), "prod".to_string())].into(),
        ..TaskFilter::default()
    };
    let rows = store.find(&filter).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].id, both.id);

    // A label with the right key but wrong value matches nothing.
    let filter = TaskFilter {
        owners: vec!["o@x.com".into()],
        labels: [("env".to_string(), "staging".to_string())].into(),
        ..TaskFilter::default()
    };
    assert!(store.find(&filter).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_find_many_lite_batches_children() {
    let (pool, _dir) = setup_test_db().await;
    let store = SqliteTaskStore::new(pool.clone(), vault());
    let reviews = SqliteReviewStore::new(pool);

    let a = task_with("a", "o@x.com");
    let b = task_with("b", "o@x.com");
    for task in [&a, &b] {
        store.upsert(&TaskRow::from_task(task)).await.unwrap();
    }

    reviews
        .upsert_review(&Review::new(
            "r@x.com",
            ReviewerType::Human,
            true,
            ResourceType::Task,
            a.id.clone(),
        ))
        .await
        .unwrap();
    reviews
        .upsert_requirement(
            &ReviewRequirement::new(a.id.clone(), 1).with_users(vec!["r@x.com".into()]),
        )
        .await
        .unwrap();

    let ids = vec![a.id.clone(), b.id.clone(), "missing".to_string()];
    let lite = store.find_many_lite(&ids).await.unwrap();

    // Exactly the existing ids come back.
    assert_eq!(lite.len(), 2);
    let for_a = lite.iter().find(|l| l.row.id == a.id).unwrap();
    assert_eq!(for_a.reviews.len(), 1);
    assert_eq!(for_a.review_requirements.len(), 1);
    let for_b = lite.iter().find(|l| l.row.id == b.id).unwrap();
    assert!(for_b.reviews.is_empty());
    assert!(for_b.review_requirements.is_empty());
}

#[tokio::test]
async fn test_delete_drops_row_and_associations() {
    let (pool, _dir) = setup_test_db().await;
    let store = SqliteTaskStore::new(pool.clone(), vault());

    let mut task = task_with("doomed", "o@x.com");
    task.tags = vec!["gone".into()];
    store.upsert(&TaskRow::from_task(&task)).await.unwrap();

    store.delete(&task.id).await.unwrap();
    assert!(store.get(&task.id).await.unwrap().is_none());

    let associations: i64 = sqlx::query("SELECT COUNT(*) AS n FROM task_tag_association WHERE task_id = ?")
        .bind(&task.id)
        .fetch_one(&pool)
        .await
        .unwrap()
        .try_get("n")
        .unwrap();
    assert_eq!(associations, 0);
}
