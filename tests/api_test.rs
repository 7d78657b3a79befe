mod helpers;

use std::sync::Arc;

use serde_json::{json, Value};
use tempfile::TempDir;

use trackway::api::{build_router, AppState};
use trackway::domain::models::{OrgRole, Principal};
use trackway::infrastructure::auth::StaticAuthProvider;

use helpers::test_state;

async fn spawn_app() -> (String, TempDir) {
    let auth = Arc::new(
        StaticAuthProvider::new(Principal::new("anonymous@local"))
            .with_token("tom-token", Principal::new("tom@myspace.com"))
            .with_org_token("member-token", "member@corp.com", "corp", OrgRole::Member)
            .with_org_token("viewer-token", "viewer@corp.com", "corp", OrgRole::Viewer),
    );
    let (state, dir): (AppState, TempDir) = test_state(auth).await;

    let router = build_router(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("failed to bind test listener");
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("server crashed");
    });
    (format!("http://{addr}"), dir)
}

fn client() -> reqwest::Client {
    reqwest::Client::new()
}

#[tokio::test]
async fn test_health() {
    let (base, _dir) = spawn_app().await;
    let body: Value = client()
        .get(format!("{base}/health"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body, json!({ "status": "ok" }));
}

#[tokio::test]
async fn test_create_and_review_workflow() {
    let (base, _dir) = spawn_app().await;
    let http = client();

    let created: Value = http
        .post(format!("{base}/v1/tasks"))
        .bearer_auth("tom-token")
        .json(&json!({
            "description": "Search for french ducks",
            "assigned_to": "tom@myspace.com",
            "labels": { "test": "true" },
            "review_requirements": [
                { "number_required": 2, "users": ["anonymous@agentsea.ai"], "agents": ["agent1", "agent2"] },
                { "number_required": 1, "users": ["tom@myspace.com", "anonymous@agentsea.ai"], "agents": ["agent3"] },
            ],
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let task_id = created["id"].as_str().unwrap().to_string();
    assert_eq!(created["owner_id"], "tom@myspace.com");

    let pending: Value = http
        .get(format!("{base}/v1/tasks/{task_id}/pending_reviewers"))
        .bearer_auth("tom-token")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let count = pending["users"].as_array().unwrap().len()
        + pending["agents"].as_array().unwrap().len();
    assert_eq!(count, 5);

    // tom approves, then agent1 approves.
    let response = http
        .put(format!("{base}/v1/tasks/{task_id}/review"))
        .bearer_auth("tom-token")
        .json(&json!({ "approved": true }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let response = http
        .put(format!("{base}/v1/tasks/{task_id}/review"))
        .bearer_auth("tom-token")
        .json(&json!({ "approved": true, "reviewer": "agent1", "reviewer_type": "agent" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let pending: Value = http
        .get(format!("{base}/v1/tasks/{task_id}/pending_reviewers"))
        .bearer_auth("tom-token")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let count = pending["users"].as_array().unwrap().len()
        + pending["agents"].as_array().unwrap().len();
    assert_eq!(count, 3, "pending after two reviews: {pending}");

    let toms_pending: Value = http
        .get(format!("{base}/v1/pending_reviews"))
        .bearer_auth("tom-token")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(toms_pending["tasks"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_label_update_merges() {
    let (base, _dir) = spawn_app().await;
    let http = client();

    let created: Value = http
        .post(format!("{base}/v1/tasks"))
        .bearer_auth("tom-token")
        .json(&json!({ "description": "labelled", "labels": { "test": "true" } }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let task_id = created["id"].as_str().unwrap();

    let response = http
        .put(format!("{base}/v1/tasks/{task_id}"))
        .bearer_auth("tom-token")
        .json(&json!({ "set_labels": { "test_set": "true" } }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let task: Value = http
        .get(format!("{base}/v1/tasks/{task_id}"))
        .bearer_auth("tom-token")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(task["labels"], json!({ "test": "true", "test_set": "true" }));
}

#[tokio::test]
async fn test_prompt_round_trip() {
    let (base, _dir) = spawn_app().await;
    let http = client();

    let created: Value = http
        .post(format!("{base}/v1/tasks"))
        .bearer_auth("tom-token")
        .json(&json!({ "description": "prompted" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let task_id = created["id"].as_str().unwrap();

    let stored: Value = http
        .post(format!("{base}/v1/tasks/{task_id}/prompts"))
        .bearer_auth("tom-token")
        .json(&json!({ "response": { "role": "assistant", "text": "found them" } }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let prompt_id = stored["id"].as_str().unwrap().to_string();

    let prompts: Value = http
        .get(format!("{base}/v1/tasks/{task_id}/prompts"))
        .bearer_auth("tom-token")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let ids: Vec<&str> = prompts["prompts"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["id"].as_str().unwrap())
        .collect();
    assert!(ids.contains(&prompt_id.as_str()));

    let response = http
        .post(format!("{base}/v1/tasks/{task_id}/prompts/{prompt_id}/approve"))
        .bearer_auth("tom-token")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let prompts: Value = http
        .get(format!("{base}/v1/tasks/{task_id}/prompts"))
        .bearer_auth("tom-token")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(prompts["prompts"][0]["approved"], json!(true));
}

#[tokio::test]
async fn test_action_ordering_end_rule() {
    let (base, _dir) = spawn_app().await;
    let http = client();

    let created: Value = http
        .post(format!("{base}/v1/tasks"))
        .bearer_auth("tom-token")
        .json(&json!({ "description": "ordered" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let task_id = created["id"].as_str().unwrap();

    for name in ["click", "mouse_move", "end"] {
        let response = http
            .post(format!("{base}/v1/tasks/{task_id}/actions"))
            .bearer_auth("tom-token")
            .json(&json!({
                "action": { "name": name },
                "tool": { "name": "desktop" },
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
    }

    let actions: Value = http
        .get(format!("{base}/v1/tasks/{task_id}/actions"))
        .bearer_auth("tom-token")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let names: Vec<&str> = actions["events"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["action"]["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["click", "end"]);
}

#[tokio::test]
async fn test_benchmark_to_eval() {
    let (base, _dir) = spawn_app().await;
    let http = client();

    let created: Value = http
        .post(format!("{base}/v1/benchmarks"))
        .bearer_auth("tom-token")
        .json(&json!({
            "name": "test-bench",
            "description": "two surfaces",
            "tasks": [
                { "description": "desktop" },
                { "description": "mobile" },
            ],
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let benchmark_id = created["id"].as_str().unwrap();

    let eval: Value = http
        .post(format!("{base}/v1/benchmarks/{benchmark_id}/eval"))
        .bearer_auth("tom-token")
        .json(&json!({ "assigned_to": "test_agent", "assigned_type": "pizza" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let tasks = eval["tasks"].as_array().unwrap();
    assert_eq!(tasks.len(), 2);
    for task in tasks {
        assert_eq!(task["assigned_to"], "test_agent");
        assert_eq!(task["labels"]["benchmark"], "test-bench");
    }
}

#[tokio::test]
async fn test_org_authz_does_not_leak() {
    let (base, _dir) = spawn_app().await;
    let http = client();

    let created: Value = http
        .post(format!("{base}/v1/tasks"))
        .bearer_auth("member-token")
        .json(&json!({ "description": "org owned", "owner_id": "corp" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let task_id = created["id"].as_str().unwrap();

    // The viewer can read the org task.
    let response = http
        .get(format!("{base}/v1/tasks/{task_id}"))
        .bearer_auth("viewer-token")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    // A viewer mutation reads as missing, not as forbidden.
    let response = http
        .put(format!("{base}/v1/tasks/{task_id}"))
        .bearer_auth("viewer-token")
        .json(&json!({ "output": "sneaky" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);

    let response = http
        .put(format!("{base}/v1/tasks/{task_id}"))
        .bearer_auth("member-token")
        .json(&json!({ "output": "legit" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn test_validation_errors_render_as_422_field_list() {
    let (base, _dir) = spawn_app().await;
    let http = client();

    // No description and no remote endpoint.
    let response = http
        .post(format!("{base}/v1/tasks"))
        .bearer_auth("tom-token")
        .json(&json!({ "description": "" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 422);
    let body: Value = response.json().await.unwrap();
    let detail = body["detail"].as_array().unwrap();
    assert_eq!(detail[0]["type"], "validation_error");
    assert!(detail[0]["field"].is_string());

    // Unknown status values are rejected the same way.
    let created: Value = http
        .post(format!("{base}/v1/tasks"))
        .bearer_auth("tom-token")
        .json(&json!({ "description": "ok" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let task_id = created["id"].as_str().unwrap();
    let response = http
        .put(format!("{base}/v1/tasks/{task_id}"))
        .bearer_auth("tom-token")
        .json(&json!({ "status": "exploded" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 422);
}
