mod helpers;

use trackway::domain::models::wire::{
    V1ActionEvent, V1CreateReview, V1ReviewMany, V1ReviewRequirement, V1Task,
};
use trackway::domain::models::{
    recompute_pending, Action, Principal, ReviewRequirement, ToolRef,
};
use trackway::domain::ports::ReviewStore;
use trackway::infrastructure::database::SqliteReviewStore;

use helpers::database::setup_test_db;
use helpers::test_state_as;

/// A minimal V1 task body, the way a client would send it.
fn v1_task(description: &str) -> V1Task {
    serde_json::from_value(serde_json::json!({ "description": description }))
        .expect("valid task body")
}

fn requirement(number_required: u32, users: &[&str], agents: &[&str]) -> V1ReviewRequirement {
    V1ReviewRequirement {
        users: users.iter().map(ToString::to_string).collect(),
        agents: agents.iter().map(ToString::to_string).collect(),
        number_required,
        ..V1ReviewRequirement::default()
    }
}

fn approve() -> V1CreateReview {
    V1CreateReview {
        approved: true,
        reviewer_type: None,
        reason: None,
        reviewer: None,
        correction: None,
    }
}

fn approve_as_agent(agent: &str) -> V1CreateReview {
    V1CreateReview {
        approved: true,
        reviewer_type: Some("agent".into()),
        reason: None,
        reviewer: Some(agent.to_string()),
        correction: None,
    }
}

#[tokio::test]
async fn test_create_and_review_clears_pending_parties() {
    let (state, _dir) = test_state_as("tom@myspace.com").await;
    let principal = Principal::new("tom@myspace.com");

    let mut v1 = v1_task("Search for french ducks");
    v1.assigned_to = Some("tom@myspace.com".into());
    v1.labels = [("test".to_string(), "true".to_string())].into();
    v1.review_requirements = vec![
        requirement(2, &["anonymous@agentsea.ai"], &["agent1", "agent2"]),
        requirement(1, &["tom@myspace.com", "anonymous@agentsea.ai"], &["agent3"]),
    ];
    let mut task = state.tasks.create(v1, &principal).await.unwrap();

    let pending = state.reviews.pending_reviewers(&task.id).await.unwrap();
    assert_eq!(pending.users.len() + pending.agents.len(), 5);

    state
        .reviews
        .review_task(&mut task, approve(), &principal)
        .await
        .unwrap();
    state
        .reviews
        .review_task(&mut task, approve_as_agent("agent1"), &principal)
        .await
        .unwrap();

    let pending = state.reviews.pending_reviewers(&task.id).await.unwrap();
    assert_eq!(
        pending.users.len() + pending.agents.len(),
        3,
        "expected anonymous, agent2, agent3 pending; got {pending:?}"
    );
    assert!(pending.users.contains(&"anonymous@agentsea.ai".to_string()));
    assert!(pending.agents.contains(&"agent2".to_string()));
    assert!(pending.agents.contains(&"agent3".to_string()));

    let toms = state
        .reviews
        .pending_reviews(Some("tom@myspace.com"), None)
        .await
        .unwrap();
    assert!(toms.tasks.is_empty());

    let anons = state
        .reviews
        .pending_reviews(Some("anonymous@agentsea.ai"), None)
        .await
        .unwrap();
    assert_eq!(anons.tasks, vec![task.id.clone()]);
}

#[tokio::test]
async fn test_unreviewed_actions_keep_the_party_pending() {
    let (state, _dir) = test_state_as("lead@x.com").await;
    let principal = Principal::new("lead@x.com");

    let mut v1 = v1_task("step heavy");
    v1.review_requirements = vec![requirement(1, &["lead@x.com"], &[])];
    let mut task = state.tasks.create(v1, &principal).await.unwrap();

    for name in ["open", "click"] {
        let event = V1ActionEvent {
            id: None,
            action: Action::new(name),
            tool: ToolRef::new("desktop"),
            state: None,
            end_state: None,
            result: None,
            prompt_id: None,
            namespace: "default".into(),
            metadata: Default::default(),
            owner_id: None,
            model: None,
            agent_id: None,
            hidden: false,
            created: None,
        };
        state.tasks.record_action_event(&mut task, event).await.unwrap();
    }

    // A task-level review alone does not satisfy the requirement while
    // actions are unreviewed.
    state
        .reviews
        .review_task(&mut task, approve(), &principal)
        .await
        .unwrap();
    let pending = state.reviews.pending_reviewers(&task.id).await.unwrap();
    assert_eq!(pending.users, vec!["lead@x.com".to_string()]);

    // Reviewing every action completes the obligation.
    state
        .reviews
        .review_all(&mut task, true, V1ReviewMany::default(), &principal)
        .await
        .unwrap();
    let pending = state.reviews.pending_reviewers(&task.id).await.unwrap();
    assert!(pending.users.is_empty() && pending.agents.is_empty());
}

#[tokio::test]
async fn test_action_review_upsert_does_not_duplicate() {
    let (state, _dir) = test_state_as("lead@x.com").await;
    let principal = Principal::new("lead@x.com");

    let v1 = v1_task("upsert");
    let mut task = state.tasks.create(v1, &principal).await.unwrap();

    let event = V1ActionEvent {
        id: Some("a1".into()),
        action: Action::new("click"),
        tool: ToolRef::new("desktop"),
        state: None,
        end_state: None,
        result: None,
        prompt_id: None,
        namespace: "default".into(),
        metadata: Default::default(),
        owner_id: None,
        model: None,
        agent_id: None,
        hidden: false,
        created: None,
    };
    state.tasks.record_action_event(&mut task, event).await.unwrap();

    state
        .reviews
        .review_action(&mut task, "a1", true, approve(), &principal)
        .await
        .unwrap();
    state
        .reviews
        .review_action(&mut task, "a1", false, approve(), &principal)
        .await
        .unwrap();

    state.tasks.refresh(&mut task).await.unwrap();
    let action = task.episode.find_action("a1").unwrap();
    assert_eq!(action.reviews.len(), 1);
    assert!(!action.reviews[0].approved);
    assert!(action.reviews[0].updated.is_some());
}

#[tokio::test]
async fn test_sync_pending_is_idempotent() {
    let (pool, _dir) = setup_test_db().await;
    let store = SqliteReviewStore::new(pool);

    let requirement = ReviewRequirement::new("t1", 2)
        .with_users(vec!["a@x.com".into()])
        .with_agents(vec!["agent9".into()]);
    let target = recompute_pending("t1", std::slice::from_ref(&requirement), &[], &[]);
    assert_eq!(target.len(), 2);

    store.sync_pending("t1", &target).await.unwrap();
    let first: Vec<_> = store
        .pending_for_task("t1")
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.id)
        .collect();

    // A second reconcile with a freshly computed (new row ids, same keys)
    // target leaves the stored rows untouched.
    let target_again = recompute_pending("t1", std::slice::from_ref(&requirement), &[], &[]);
    store.sync_pending("t1", &target_again).await.unwrap();
    let second: Vec<_> = store
        .pending_for_task("t1")
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.id)
        .collect();

    let mut first_sorted = first.clone();
    first_sorted.sort();
    let mut second_sorted = second;
    second_sorted.sort();
    assert_eq!(first_sorted, second_sorted);
}
