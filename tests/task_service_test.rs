mod helpers;

use std::time::Duration;

use trackway::domain::errors::TrackerError;
use trackway::domain::models::wire::{
    V1ActionEvent, V1PostMessage, V1Prompt, V1SearchTask, V1Task, V1TaskUpdate,
};
use trackway::domain::models::{Action, OrgRole, Principal, TaskStatus, ToolRef};

use helpers::test_state_as;

fn v1_task(description: &str) -> V1Task {
    serde_json::from_value(serde_json::json!({ "description": description }))
        .expect("valid task body")
}

fn action_event(name: &str) -> V1ActionEvent {
    serde_json::from_value(serde_json::json!({
        "action": { "name": name },
        "tool": { "name": "desktop" },
    }))
    .expect("valid action body")
}

#[tokio::test]
async fn test_create_sets_feed_thread_episode_and_version() {
    let (state, _dir) = test_state_as("tom@myspace.com").await;
    let principal = Principal::new("tom@myspace.com");

    let task = state.tasks.create(v1_task("create me"), &principal).await.unwrap();
    assert_eq!(task.owner_id.as_deref(), Some("tom@myspace.com"));
    assert_eq!(task.created_by.as_deref(), Some("tom@myspace.com"));
    assert_eq!(task.status, TaskStatus::Created);
    assert!(task.thread("feed").is_some());

    let reloaded = state.tasks.get(&task.id, &principal).await.unwrap();
    assert_eq!(reloaded.version, task.version);
    assert_eq!(
        reloaded.version.as_deref(),
        Some(reloaded.compute_version().unwrap().as_str())
    );
    assert_eq!(reloaded.episode.id, task.episode.id);
}

#[tokio::test]
async fn test_create_without_description_or_remote_is_rejected() {
    let (state, _dir) = test_state_as("tom@myspace.com").await;
    let principal = Principal::new("tom@myspace.com");

    let result = state.tasks.create(v1_task(""), &principal).await;
    assert!(matches!(result, Err(TrackerError::Validation { .. })));
}

#[tokio::test]
async fn test_set_labels_merges_into_existing() {
    let (state, _dir) = test_state_as("tom@myspace.com").await;
    let principal = Principal::new("tom@myspace.com");

    let mut v1 = v1_task("label me");
    v1.labels = [("test".to_string(), "true".to_string())].into();
    let task = state.tasks.create(v1, &principal).await.unwrap();

    let update = V1TaskUpdate {
        set_labels: Some([("test_set".to_string(), "true".to_string())].into()),
        ..V1TaskUpdate::default()
    };
    state.tasks.update(&task.id, update, &principal).await.unwrap();

    let reloaded = state.tasks.get(&task.id, &principal).await.unwrap();
    assert_eq!(reloaded.labels.get("test").map(String::as_str), Some("true"));
    assert_eq!(reloaded.labels.get("test_set").map(String::as_str), Some("true"));
    assert_eq!(reloaded.labels.len(), 2);
}

#[tokio::test]
async fn test_update_recomputes_version_only_on_change() {
    let (state, _dir) = test_state_as("tom@myspace.com").await;
    let principal = Principal::new("tom@myspace.com");

    let task = state.tasks.create(v1_task("versioned"), &principal).await.unwrap();
    let original = task.version.clone();

    // A no-op patch leaves the version alone.
    let unchanged = state
        .tasks
        .update(&task.id, V1TaskUpdate::default(), &principal)
        .await
        .unwrap();
    assert_eq!(unchanged.version, original);

    let update = V1TaskUpdate {
        status: Some("in progress".into()),
        ..V1TaskUpdate::default()
    };
    let changed = state.tasks.update(&task.id, update, &principal).await.unwrap();
    assert_eq!(changed.status, TaskStatus::InProgress);
    assert_ne!(changed.version, original);
}

#[tokio::test]
async fn test_prompt_round_trip_and_approve() {
    let (state, _dir) = test_state_as("tom@myspace.com").await;
    let principal = Principal::new("tom@myspace.com");

    let mut task = state.tasks.create(v1_task("prompted"), &principal).await.unwrap();

    let prompt: V1Prompt = serde_json::from_value(serde_json::json!({
        "response": { "role": "assistant", "text": "clicked the duck" },
    }))
    .unwrap();
    let prompt_id = state.tasks.store_prompt(&mut task, prompt).await.unwrap();
    assert!(task.prompts.contains(&prompt_id));

    let prompts = state.tasks.get_prompts(&task).await.unwrap();
    assert_eq!(prompts.len(), 1);
    assert!(!prompts[0].approved);

    state.tasks.review_prompt(&task, &prompt_id, true).await.unwrap();
    let prompts = state.tasks.get_prompts(&task).await.unwrap();
    assert!(prompts[0].approved);
}

#[tokio::test]
async fn test_approve_all_prompts() {
    let (state, _dir) = test_state_as("tom@myspace.com").await;
    let principal = Principal::new("tom@myspace.com");

    let mut task = state.tasks.create(v1_task("prompted"), &principal).await.unwrap();
    for text in ["one", "two"] {
        let prompt: V1Prompt = serde_json::from_value(serde_json::json!({
            "response": { "role": "assistant", "text": text },
        }))
        .unwrap();
        state.tasks.store_prompt(&mut task, prompt).await.unwrap();
    }

    state.tasks.review_prompt(&task, "all", true).await.unwrap();
    let prompts = state.tasks.get_prompts(&task).await.unwrap();
    assert_eq!(prompts.len(), 2);
    assert!(prompts.iter().all(|p| p.approved));
}

#[tokio::test]
async fn test_action_ordering_with_end_rule() {
    let (state, _dir) = test_state_as("tom@myspace.com").await;
    let principal = Principal::new("tom@myspace.com");

    let mut task = state.tasks.create(v1_task("ordered"), &principal).await.unwrap();
    for name in ["click", "mouse_move", "end"] {
        state
            .tasks
            .record_action_event(&mut task, action_event(name))
            .await
            .unwrap();
    }

    // The trailing mouse_move is dropped when the end event lands.
    let mut reloaded = state.tasks.get(&task.id, &principal).await.unwrap();
    let names: Vec<_> = reloaded
        .episode
        .actions
        .iter()
        .map(|a| a.action.name.clone())
        .collect();
    assert_eq!(names, vec!["click".to_string(), "end".to_string()]);

    // Recording after end is a no-op.
    state
        .tasks
        .record_action_event(&mut reloaded, action_event("click"))
        .await
        .unwrap();
    let again = state.tasks.get(&task.id, &principal).await.unwrap();
    assert_eq!(again.episode.actions.len(), 2);
}

#[tokio::test]
async fn test_episode_is_append_only_in_order() {
    let (state, _dir) = test_state_as("tom@myspace.com").await;
    let principal = Principal::new("tom@myspace.com");

    let mut task = state.tasks.create(v1_task("appended"), &principal).await.unwrap();
    let names = ["open", "click", "type", "scroll"];
    for name in names {
        state
            .tasks
            .record_action_event(&mut task, action_event(name))
            .await
            .unwrap();
    }

    let reloaded = state.tasks.get(&task.id, &principal).await.unwrap();
    let loaded_names: Vec<_> = reloaded
        .episode
        .actions
        .iter()
        .map(|a| a.action.name.as_str().to_string())
        .collect();
    assert_eq!(loaded_names, names.map(String::from).to_vec());
}

#[tokio::test]
async fn test_hide_and_delete_actions() {
    let (state, _dir) = test_state_as("tom@myspace.com").await;
    let principal = Principal::new("tom@myspace.com");

    let mut task = state.tasks.create(v1_task("hidden"), &principal).await.unwrap();
    for name in ["a", "b"] {
        state
            .tasks
            .record_action_event(&mut task, action_event(name))
            .await
            .unwrap();
    }
    let first = task.episode.actions[0].id.clone();

    state.tasks.hide_action(&mut task, &first, true).await.unwrap();
    let reloaded = state.tasks.get(&task.id, &principal).await.unwrap();
    assert!(reloaded.episode.find_action(&first).unwrap().hidden);

    state.tasks.delete_action(&mut task, &first).await.unwrap();
    let reloaded = state.tasks.get(&task.id, &principal).await.unwrap();
    assert_eq!(reloaded.episode.actions.len(), 1);

    state.tasks.delete_all_actions(&mut task).await.unwrap();
    let reloaded = state.tasks.get(&task.id, &principal).await.unwrap();
    assert!(reloaded.episode.actions.is_empty());
}

#[tokio::test]
async fn test_post_message_lands_in_feed() {
    let (state, _dir) = test_state_as("tom@myspace.com").await;
    let principal = Principal::new("tom@myspace.com");

    let task = state.tasks.create(v1_task("chatty"), &principal).await.unwrap();
    state
        .tasks
        .post_message(
            &task,
            V1PostMessage {
                role: "assistant".into(),
                msg: "hello".into(),
                images: vec![],
                thread: None,
            },
        )
        .await
        .unwrap();

    let messages = state.tasks.messages(&task, None).await.unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].text, "hello");

    // Posting into a missing thread is NotFound.
    let result = state
        .tasks
        .post_message(
            &task,
            V1PostMessage {
                role: "user".into(),
                msg: "lost".into(),
                images: vec![],
                thread: Some("nope".into()),
            },
        )
        .await;
    assert!(matches!(result, Err(TrackerError::NotFound(_))));
}

#[tokio::test]
async fn test_find_visibility_matches_get() {
    let (state, _dir) = test_state_as("tom@myspace.com").await;
    let tom = Principal::new("tom@myspace.com");
    let org_member = Principal::new("member@corp.com").with_org("corp", OrgRole::Member);

    let own = state.tasks.create(v1_task("mine"), &tom).await.unwrap();
    let mut org_v1 = v1_task("org task");
    org_v1.owner_id = Some("corp".into());
    let org_task = state.tasks.create(org_v1, &org_member).await.unwrap();

    // Every id visible through find succeeds through get, and vice versa.
    for (principal, visible, hidden) in [
        (&tom, &own, &org_task),
        (&org_member, &org_task, &own),
    ] {
        let found = state
            .tasks
            .find(&V1SearchTask::default(), principal)
            .await
            .unwrap();
        let found_ids: Vec<_> = found.iter().map(|t| t.id.clone()).collect();
        assert!(found_ids.contains(&visible.id));
        assert!(!found_ids.contains(&hidden.id));

        assert!(state.tasks.get(&visible.id, principal).await.is_ok());
        assert!(matches!(
            state.tasks.get(&hidden.id, principal).await,
            Err(TrackerError::NotFound(_))
        ));
    }
}

#[tokio::test]
async fn test_org_viewer_reads_but_cannot_update() {
    let (state, _dir) = test_state_as("member@corp.com").await;
    let member = Principal::new("member@corp.com").with_org("corp", OrgRole::Member);
    let viewer = Principal::new("viewer@corp.com").with_org("corp", OrgRole::Viewer);

    let mut v1 = v1_task("org owned");
    v1.owner_id = Some("corp".into());
    let task = state.tasks.create(v1, &member).await.unwrap();

    assert!(state.tasks.get(&task.id, &viewer).await.is_ok());

    let update = V1TaskUpdate {
        output: Some("sneaky".into()),
        ..V1TaskUpdate::default()
    };
    // Do-not-leak: the viewer sees NotFound, not a permission error.
    assert!(matches!(
        state.tasks.update(&task.id, update, &viewer).await,
        Err(TrackerError::NotFound(_))
    ));

    let update = V1TaskUpdate {
        output: Some("legit".into()),
        ..V1TaskUpdate::default()
    };
    assert!(state.tasks.update(&task.id, update, &member).await.is_ok());
}

#[tokio::test]
async fn test_copy_persists_a_detached_clone() {
    let (state, _dir) = test_state_as("tom@myspace.com").await;
    let principal = Principal::new("tom@myspace.com");

    let mut task = state.tasks.create(v1_task("copy me"), &principal).await.unwrap();
    state
        .tasks
        .record_action_event(&mut task, action_event("click"))
        .await
        .unwrap();

    let copied = state.tasks.copy(&task).await.unwrap();
    assert_ne!(copied.id, task.id);
    assert_eq!(copied.status, TaskStatus::Defined);
    assert!(copied.episode.actions.is_empty());

    // Both tasks remain independently loadable.
    let original = state.tasks.get(&task.id, &principal).await.unwrap();
    assert_eq!(original.episode.actions.len(), 1);
    let clone = state.tasks.get(&copied.id, &principal).await.unwrap();
    assert!(clone.episode.actions.is_empty());
}

#[tokio::test]
async fn test_delete_removes_task_but_not_collaborator_entities() {
    let (state, _dir) = test_state_as("tom@myspace.com").await;
    let principal = Principal::new("tom@myspace.com");

    let mut task = state.tasks.create(v1_task("doomed"), &principal).await.unwrap();
    let prompt: V1Prompt = serde_json::from_value(serde_json::json!({
        "response": { "role": "assistant", "text": "kept" },
    }))
    .unwrap();
    state.tasks.store_prompt(&mut task, prompt).await.unwrap();

    state.tasks.delete(&task.id, &principal).await.unwrap();
    assert!(matches!(
        state.tasks.get(&task.id, &principal).await,
        Err(TrackerError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_wait_for_done_times_out_and_completes() {
    let (state, _dir) = test_state_as("tom@myspace.com").await;
    let principal = Principal::new("tom@myspace.com");

    let mut task = state.tasks.create(v1_task("pending"), &principal).await.unwrap();
    let result = state
        .tasks
        .wait_for_done(
            &mut task,
            Duration::from_millis(50),
            Duration::from_millis(10),
        )
        .await;
    assert!(matches!(result, Err(TrackerError::Timeout(_))));

    let update = V1TaskUpdate {
        status: Some("finished".into()),
        ..V1TaskUpdate::default()
    };
    state.tasks.update(&task.id, update, &principal).await.unwrap();
    state
        .tasks
        .wait_for_done(
            &mut task,
            Duration::from_millis(200),
            Duration::from_millis(10),
        )
        .await
        .unwrap();
    assert!(task.is_done());
}
