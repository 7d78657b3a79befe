//! Task routes: lifecycle, threads, prompts, actions, reviews, and the
//! pending-review projections.

use std::collections::BTreeMap;

use axum::extract::{Path, Query, State};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::api::error::ApiError;
use crate::api::extract::{ApiJson, Caller};
use crate::api::state::AppState;
use crate::domain::errors::TrackerError;
use crate::domain::models::wire::{
    V1ActionEvent, V1ActionEvents, V1AddThread, V1AnnotationReviewable, V1CreateReview,
    V1PostMessage, V1Prompt, V1Prompts, V1RemoveThread, V1ReviewMany, V1SearchTask, V1Task,
    V1TaskUpdate, V1Tasks, V1Threads,
};
use crate::domain::models::{Episode, RoleThread};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/tasks", post(create_task).get(get_tasks))
        .route("/v1/tasks/search", post(search_tasks))
        .route(
            "/v1/tasks/{id}",
            get(get_task).put(update_task).delete(delete_task),
        )
        .route("/v1/tasks/{id}/review", put(review_task))
        .route("/v1/tasks/{id}/msg", post(post_task_msg))
        .route("/v1/tasks/{id}/prompts", post(store_prompt).get(get_prompts))
        .route("/v1/tasks/{id}/prompts/{pid}/approve", post(approve_prompt))
        .route("/v1/tasks/{id}/prompts/{pid}/fail", post(fail_prompt))
        .route(
            "/v1/tasks/{id}/actions",
            post(record_action).get(get_actions).delete(delete_actions),
        )
        .route("/v1/tasks/{id}/actions/{aid}/approve", post(approve_action))
        .route("/v1/tasks/{id}/actions/{aid}/fail", post(fail_action))
        .route("/v1/tasks/{id}/actions/{aid}/approve_prior", post(approve_prior))
        .route("/v1/tasks/{id}/approve_actions", post(approve_all_actions))
        .route("/v1/tasks/{id}/fail_actions", post(fail_all_actions))
        .route("/v1/tasks/{id}/actions/{aid}/hide", put(hide_action))
        .route("/v1/tasks/{id}/actions/{aid}/unhide", put(unhide_action))
        .route(
            "/v1/tasks/{id}/actions/{aid}/annotations",
            post(create_annotation),
        )
        .route("/v1/annotations/{aid}/review", post(review_annotation))
        .route(
            "/v1/tasks/{id}/threads",
            get(get_threads).post(create_thread).delete(remove_thread),
        )
        .route("/v1/tasks/{id}/threads/{tid}", get(get_thread))
        .route("/v1/tasks/{id}/episode", get(get_episode))
        .route("/v1/pending_reviews", get(get_pending_reviews))
        .route("/v1/tasks/{id}/pending_reviewers", get(get_pending_reviewers))
}

async fn create_task(
    State(state): State<AppState>,
    Caller(principal): Caller,
    ApiJson(data): ApiJson<V1Task>,
) -> Result<Json<V1Task>, ApiError> {
    let task = state.tasks.create(data, &principal).await?;
    Ok(Json(task.to_v1()))
}

#[derive(Debug, Deserialize)]
struct TasksQuery {
    tags: Option<String>,
    labels: Option<String>,
    assigned_to: Option<String>,
    assigned_type: Option<String>,
    device: Option<String>,
    device_type: Option<String>,
    parent_id: Option<String>,
    status: Option<String>,
    task_id: Option<String>,
    owners: Option<String>,
}

impl TasksQuery {
    fn into_search(self) -> Result<V1SearchTask, ApiError> {
        let labels: Option<BTreeMap<String, String>> = match self.labels.as_deref() {
            None | Some("") => None,
            Some(raw) => Some(
                serde_json::from_str(raw)
                    .map_err(|e| ApiError::validation("labels", e.to_string()))?,
            ),
        };
        let split = |raw: Option<String>| {
            raw.map(|s| {
                s.split(',')
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
            })
            .filter(|v| !v.is_empty())
        };
        Ok(V1SearchTask {
            task_id: self.task_id,
            status: self.status,
            assigned_to: self.assigned_to,
            assigned_type: self.assigned_type,
            device: self.device,
            device_type: self.device_type,
            parent_id: self.parent_id,
            project: None,
            skill: None,
            tags: split(self.tags),
            labels,
            owners: split(self.owners),
        })
    }
}

async fn get_tasks(
    State(state): State<AppState>,
    Caller(principal): Caller,
    Query(query): Query<TasksQuery>,
) -> Result<Json<V1Tasks>, ApiError> {
    let search = query.into_search()?;
    let tasks = state.tasks.find(&search, &principal).await?;
    Ok(Json(V1Tasks {
        tasks: tasks.iter().map(|t| t.to_v1()).collect(),
    }))
}

async fn search_tasks(
    State(state): State<AppState>,
    Caller(principal): Caller,
    ApiJson(search): ApiJson<V1SearchTask>,
) -> Result<Json<V1Tasks>, ApiError> {
    let tasks = state.tasks.find(&search, &principal).await?;
    Ok(Json(V1Tasks {
        tasks: tasks.iter().map(|t| t.to_v1()).collect(),
    }))
}

async fn get_task(
    State(state): State<AppState>,
    Caller(principal): Caller,
    Path(id): Path<String>,
) -> Result<Json<V1Task>, ApiError> {
    let task = state.tasks.get(&id, &principal).await?;
    Ok(Json(task.to_v1()))
}

async fn update_task(
    State(state): State<AppState>,
    Caller(principal): Caller,
    Path(id): Path<String>,
    ApiJson(update): ApiJson<V1TaskUpdate>,
) -> Result<Json<V1Task>, ApiError> {
    let task = state.tasks.update(&id, update, &principal).await?;
    Ok(Json(task.to_v1()))
}

async fn delete_task(
    State(state): State<AppState>,
    Caller(principal): Caller,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    state.tasks.delete(&id, &principal).await?;
    Ok(Json(json!({ "message": "Task deleted successfully" })))
}

async fn review_task(
    State(state): State<AppState>,
    Caller(principal): Caller,
    Path(id): Path<String>,
    ApiJson(data): ApiJson<V1CreateReview>,
) -> Result<Json<V1Task>, ApiError> {
    let mut task = state.tasks.get_mut(&id, &principal).await?;
    state.reviews.review_task(&mut task, data, &principal).await?;
    Ok(Json(task.to_v1()))
}

async fn post_task_msg(
    State(state): State<AppState>,
    Caller(principal): Caller,
    Path(id): Path<String>,
    ApiJson(data): ApiJson<V1PostMessage>,
) -> Result<Json<Value>, ApiError> {
    let task = state.tasks.get_mut(&id, &principal).await?;
    state.tasks.post_message(&task, data).await?;
    Ok(Json(json!({})))
}

#[derive(Debug, Deserialize)]
struct PendingReviewsQuery {
    agent_id: Option<String>,
}

async fn get_pending_reviews(
    State(state): State<AppState>,
    Caller(principal): Caller,
    Query(query): Query<PendingReviewsQuery>,
) -> Result<Json<Value>, ApiError> {
    let pending = match query.agent_id.as_deref() {
        Some(agent) => state.reviews.pending_reviews(None, Some(agent)).await?,
        None => state
            .reviews
            .pending_reviews(Some(principal.email.as_str()), None)
            .await?,
    };
    Ok(Json(serde_json::to_value(pending).map_err(TrackerError::from)?))
}

async fn get_pending_reviewers(
    State(state): State<AppState>,
    Caller(principal): Caller,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    // Visibility follows the task itself.
    state.tasks.get(&id, &principal).await?;
    let pending = state.reviews.pending_reviewers(&id).await?;
    Ok(Json(serde_json::to_value(pending).map_err(TrackerError::from)?))
}

async fn store_prompt(
    State(state): State<AppState>,
    Caller(principal): Caller,
    Path(id): Path<String>,
    ApiJson(data): ApiJson<V1Prompt>,
) -> Result<Json<Value>, ApiError> {
    let mut task = state.tasks.get_mut(&id, &principal).await?;
    let prompt_id = state.tasks.store_prompt(&mut task, data).await?;
    Ok(Json(json!({ "id": prompt_id })))
}

async fn approve_prompt(
    State(state): State<AppState>,
    Caller(principal): Caller,
    Path((id, pid)): Path<(String, String)>,
) -> Result<Json<Value>, ApiError> {
    let task = state.tasks.get_mut(&id, &principal).await?;
    state.tasks.review_prompt(&task, &pid, true).await?;
    Ok(Json(json!({})))
}

async fn fail_prompt(
    State(state): State<AppState>,
    Caller(principal): Caller,
    Path((id, pid)): Path<(String, String)>,
) -> Result<Json<Value>, ApiError> {
    let task = state.tasks.get_mut(&id, &principal).await?;
    state.tasks.review_prompt(&task, &pid, false).await?;
    Ok(Json(json!({})))
}

async fn get_prompts(
    State(state): State<AppState>,
    Caller(principal): Caller,
    Path(id): Path<String>,
) -> Result<Json<V1Prompts>, ApiError> {
    let task = state.tasks.get(&id, &principal).await?;
    let prompts = state.tasks.get_prompts(&task).await?;
    Ok(Json(V1Prompts { prompts }))
}

async fn record_action(
    State(state): State<AppState>,
    Caller(principal): Caller,
    Path(id): Path<String>,
    ApiJson(data): ApiJson<V1ActionEvent>,
) -> Result<Json<Value>, ApiError> {
    let mut task = state.tasks.get_mut(&id, &principal).await?;
    state.tasks.record_action_event(&mut task, data).await?;
    Ok(Json(json!({})))
}

async fn get_actions(
    State(state): State<AppState>,
    Caller(principal): Caller,
    Path(id): Path<String>,
) -> Result<Json<V1ActionEvents>, ApiError> {
    let task = state.tasks.get(&id, &principal).await?;
    let events = state.tasks.get_actions(&task).await?;
    Ok(Json(V1ActionEvents { events }))
}

async fn delete_actions(
    State(state): State<AppState>,
    Caller(principal): Caller,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let mut task = state.tasks.get_mut(&id, &principal).await?;
    state.tasks.delete_all_actions(&mut task).await?;
    Ok(Json(json!({})))
}

async fn approve_action(
    State(state): State<AppState>,
    Caller(principal): Caller,
    Path((id, aid)): Path<(String, String)>,
    ApiJson(review): ApiJson<V1CreateReview>,
) -> Result<Json<Value>, ApiError> {
    let mut task = state.tasks.get_mut(&id, &principal).await?;
    state
        .reviews
        .review_action(&mut task, &aid, true, review, &principal)
        .await?;
    Ok(Json(json!({})))
}

async fn fail_action(
    State(state): State<AppState>,
    Caller(principal): Caller,
    Path((id, aid)): Path<(String, String)>,
    ApiJson(review): ApiJson<V1CreateReview>,
) -> Result<Json<Value>, ApiError> {
    let mut task = state.tasks.get_mut(&id, &principal).await?;
    state
        .reviews
        .review_action(&mut task, &aid, false, review, &principal)
        .await?;
    Ok(Json(json!({})))
}

async fn approve_prior(
    State(state): State<AppState>,
    Caller(principal): Caller,
    Path((id, aid)): Path<(String, String)>,
    ApiJson(review): ApiJson<V1ReviewMany>,
) -> Result<Json<Value>, ApiError> {
    let mut task = state.tasks.get_mut(&id, &principal).await?;
    state
        .reviews
        .review_prior(&mut task, &aid, review, &principal)
        .await?;
    Ok(Json(json!({})))
}

async fn approve_all_actions(
    State(state): State<AppState>,
    Caller(principal): Caller,
    Path(id): Path<String>,
    ApiJson(review): ApiJson<V1ReviewMany>,
) -> Result<Json<Value>, ApiError> {
    let mut task = state.tasks.get_mut(&id, &principal).await?;
    state
        .reviews
        .review_all(&mut task, true, review, &principal)
        .await?;
    Ok(Json(json!({})))
}

async fn fail_all_actions(
    State(state): State<AppState>,
    Caller(principal): Caller,
    Path(id): Path<String>,
    ApiJson(review): ApiJson<V1ReviewMany>,
) -> Result<Json<Value>, ApiError> {
    let mut task = state.tasks.get_mut(&id, &principal).await?;
    state
        .reviews
        .review_all(&mut task, false, review, &principal)
        .await?;
    Ok(Json(json!({})))
}

async fn hide_action(
    State(state): State<AppState>,
    Caller(principal): Caller,
    Path((id, aid)): Path<(String, String)>,
) -> Result<Json<Value>, ApiError> {
    let mut task = state.tasks.get_mut(&id, &principal).await?;
    state.tasks.hide_action(&mut task, &aid, true).await?;
    Ok(Json(json!({})))
}

async fn unhide_action(
    State(state): State<AppState>,
    Caller(principal): Caller,
    Path((id, aid)): Path<(String, String)>,
) -> Result<Json<Value>, ApiError> {
    let mut task = state.tasks.get_mut(&id, &principal).await?;
    state.tasks.hide_action(&mut task, &aid, false).await?;
    Ok(Json(json!({})))
}

async fn create_annotation(
    State(state): State<AppState>,
    Caller(principal): Caller,
    Path((id, aid)): Path<(String, String)>,
    ApiJson(data): ApiJson<V1AnnotationReviewable>,
) -> Result<Json<Value>, ApiError> {
    let mut task = state.tasks.get_mut(&id, &principal).await?;
    let annotation_id = state.reviews.annotate_action(&mut task, &aid, data).await?;
    Ok(Json(json!({ "id": annotation_id })))
}

async fn review_annotation(
    State(state): State<AppState>,
    Caller(principal): Caller,
    Path(aid): Path<String>,
    ApiJson(data): ApiJson<V1CreateReview>,
) -> Result<Json<Value>, ApiError> {
    state.reviews.review_annotation(&aid, data, &principal).await?;
    Ok(Json(json!({})))
}

async fn get_threads(
    State(state): State<AppState>,
    Caller(principal): Caller,
    Path(id): Path<String>,
) -> Result<Json<V1Threads>, ApiError> {
    let task = state.tasks.get(&id, &principal).await?;
    Ok(Json(V1Threads {
        threads: task.threads,
    }))
}

async fn get_thread(
    State(state): State<AppState>,
    Caller(principal): Caller,
    Path((id, tid)): Path<(String, String)>,
) -> Result<Json<RoleThread>, ApiError> {
    let task = state.tasks.get(&id, &principal).await?;
    let thread = task
        .thread(&tid)
        .ok_or_else(|| TrackerError::NotFound(format!("thread {tid}")))?;
    Ok(Json(thread.clone()))
}

async fn create_thread(
    State(state): State<AppState>,
    Caller(principal): Caller,
    Path(id): Path<String>,
    ApiJson(data): ApiJson<V1AddThread>,
) -> Result<Json<Value>, ApiError> {
    let mut task = state.tasks.get_mut(&id, &principal).await?;
    state.tasks.create_thread(&mut task, data).await?;
    Ok(Json(json!({})))
}

async fn remove_thread(
    State(state): State<AppState>,
    Caller(principal): Caller,
    Path(id): Path<String>,
    ApiJson(data): ApiJson<V1RemoveThread>,
) -> Result<Json<Value>, ApiError> {
    let mut task = state.tasks.get_mut(&id, &principal).await?;
    state.tasks.remove_thread(&mut task, &data.id).await?;
    Ok(Json(json!({})))
}

async fn get_episode(
    State(state): State<AppState>,
    Caller(principal): Caller,
    Path(id): Path<String>,
) -> Result<Json<Episode>, ApiError> {
    let task = state.tasks.get(&id, &principal).await?;
    Ok(Json(task.episode))
}
