//! Review engine: task- and action-level reviews, annotation reviews, and
//! the pending-reviewers projection.
//!
//! Every mutation recomputes the projection for the affected task while
//! holding that task's advisory lock, so concurrent approvals serialise
//! and the stored rows always match the fixed-point of the requirements.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::debug;

use crate::domain::errors::{TrackerError, TrackerResult};
use crate::domain::models::episode::upsert_review_in;
use crate::domain::models::review::ResourceType;
use crate::domain::models::wire::{
    V1AnnotationReviewable, V1CreateReview, V1PendingReviewers, V1PendingReviews, V1ReviewMany,
};
use crate::domain::models::{recompute_pending, Principal, ReviewerType, Task, TaskBackend};
use crate::domain::ports::{EpisodeStore, ReviewStore, TaskRow, TaskStore};
use crate::infrastructure::remote::RemoteClient;
use crate::services::locks::TaskLocks;

/// Recompute the target pending set for `task` and reconcile the stored
/// rows. Shared by every operation that can change review state.
pub async fn sync_pending_projection(
    store: &dyn ReviewStore,
    task: &Task,
) -> TrackerResult<()> {
    let target = recompute_pending(
        &task.id,
        &task.review_requirements,
        &task.reviews,
        &task.episode.actions,
    );
    store.sync_pending(&task.id, &target).await
}

fn parse_reviewer_type(raw: Option<&str>) -> TrackerResult<ReviewerType> {
    match raw {
        None => Ok(ReviewerType::Human),
        Some(s) => ReviewerType::from_str(s).ok_or_else(|| {
            TrackerError::validation(
                "reviewer_type",
                "invalid reviewer type, can be 'human' or 'agent'",
            )
        }),
    }
}

pub struct ReviewService {
    tasks: Arc<dyn TaskStore>,
    episodes: Arc<dyn EpisodeStore>,
    reviews: Arc<dyn ReviewStore>,
    remote: Arc<RemoteClient>,
    locks: Arc<TaskLocks>,
}

impl ReviewService {
    pub fn new(
        tasks: Arc<dyn TaskStore>,
        episodes: Arc<dyn EpisodeStore>,
        reviews: Arc<dyn ReviewStore>,
        remote: Arc<RemoteClient>,
        locks: Arc<TaskLocks>,
    ) -> Self {
        Self {
            tasks,
            episodes,
            reviews,
            remote,
            locks,
        }
    }

    async fn persist_task(&self, task: &mut Task) -> TrackerResult<()> {
        task.refresh_version()?;
        self.tasks.upsert(&TaskRow::from_task(task)).await
    }

    /// Upsert a review on the task itself.
    pub async fn review_task(
        &self,
        task: &mut Task,
        data: V1CreateReview,
        principal: &Principal,
    ) -> TrackerResult<()> {
        if let TaskBackend::Remote { base_url, auth_token } = task.backend() {
            let refreshed = self
                .remote
                .review_task(&base_url, auth_token.as_deref(), &task.id, &data)
                .await?;
            return task.absorb_v1(refreshed);
        }

        let reviewer_type = parse_reviewer_type(data.reviewer_type.as_deref())?;
        let reviewer = data.reviewer.unwrap_or_else(|| principal.email.clone());

        let lock = self.locks.for_task(&task.id);
        let _guard = lock.lock().await;

        let task_id = task.id.clone();
        let review = upsert_review_in(
            &mut task.reviews,
            ResourceType::Task,
            &task_id,
            &reviewer,
            reviewer_type,
            data.approved,
            data.reason,
            data.correction,
        );
        debug!(task_id = %task.id, review_id = %review.id, %reviewer, "saving task review");
        self.reviews.upsert_review(&review).await?;
        self.persist_task(task).await?;
        sync_pending_projection(self.reviews.as_ref(), task).await
    }

    /// Upsert an approve/fail review on one action.
    pub async fn review_action(
        &self,
        task: &mut Task,
        action_id: &str,
        approved: bool,
        data: V1CreateReview,
        principal: &Principal,
    ) -> TrackerResult<()> {
        if let TaskBackend::Remote { base_url, auth_token } = task.backend() {
            return self
                .remote
                .review_action(&base_url, auth_token.as_deref(), &task.id, action_id, approved, &data)
                .await;
        }

        let reviewer_type = parse_reviewer_type(data.reviewer_type.as_deref())?;
        let reviewer = data.reviewer.unwrap_or_else(|| principal.email.clone());

        let lock = self.locks.for_task(&task.id);
        let _guard = lock.lock().await;

        if task.episode.actions.is_empty() {
            return Err(TrackerError::Precondition(format!(
                "task {} has no recorded actions",
                task.id
            )));
        }
        let review = task
            .episode
            .review_one(action_id, &reviewer, reviewer_type, approved, data.reason, data.correction)
            .ok_or_else(|| TrackerError::NotFound(format!("action {action_id}")))?;

        self.reviews.upsert_review(&review).await?;
        self.persist_task(task).await?;
        sync_pending_projection(self.reviews.as_ref(), task).await
    }

    /// Approve every action at or before `action_id`, inclusive.
    pub async fn review_prior(
        &self,
        task: &mut Task,
        action_id: &str,
        data: V1ReviewMany,
        principal: &Principal,
    ) -> TrackerResult<()> {
        if let TaskBackend::Remote { base_url, auth_token } = task.backend() {
            return self
                .remote
                .approve_prior(&base_url, auth_token.as_deref(), &task.id, action_id, &data)
                .await;
        }

        let reviewer_type = parse_reviewer_type(data.reviewer_type.as_deref())?;
        let reviewer = data.reviewer.clone().unwrap_or_else(|| principal.email.clone());

        let lock = self.locks.for_task(&task.id);
        let _guard = lock.lock().await;

        if task.episode.find_action(action_id).is_none() {
            return Err(TrackerError::NotFound(format!("action {action_id}")));
        }
        let reviewed =
            task.episode
                .review_prior(action_id, &reviewer, reviewer_type, true, data.hidden);
        for (_, review) in &reviewed {
            self.reviews.upsert_review(review).await?;
        }
        self.persist_task(task).await?;
        sync_pending_projection(self.reviews.as_ref(), task).await
    }

    /// Approve or fail every action in the episode.
    pub async fn review_all(
        &self,
        task: &mut Task,
        approved: bool,
        data: V1ReviewMany,
        principal: &Principal,
    ) -> TrackerResult<()> {
        if let TaskBackend::Remote { base_url, auth_token } = task.backend() {
            return self
                .remote
                .review_actions_bulk(&base_url, auth_token.as_deref(), &task.id, approved, &data)
                .await;
        }

        let reviewer_type = parse_reviewer_type(data.reviewer_type.as_deref())?;
        let reviewer = data.reviewer.clone().unwrap_or_else(|| principal.email.clone());

        let lock = self.locks.for_task(&task.id);
        let _guard = lock.lock().await;

        let reviewed = task
            .episode
            .review_all(&reviewer, reviewer_type, approved, data.hidden);
        for (_, review) in &reviewed {
            self.reviews.upsert_review(review).await?;
        }
        self.persist_task(task).await?;
        sync_pending_projection(self.reviews.as_ref(), task).await
    }

    /// Attach a typed annotation to an action. Returns the annotation id.
    pub async fn annotate_action(
        &self,
        task: &mut Task,
        action_id: &str,
        data: V1AnnotationReviewable,
    ) -> TrackerResult<String> {
        let annotation = data.into_annotation();
        let id = annotation.id.clone();

        let action = task
            .episode
            .find_action_mut(action_id)
            .ok_or_else(|| TrackerError::NotFound(format!("action {action_id}")))?;
        self.episodes.insert_annotation(action_id, &annotation).await?;
        action.reviewables.push(annotation);
        Ok(id)
    }

    /// Review an annotation with the same upsert policy as actions.
    pub async fn review_annotation(
        &self,
        annotation_id: &str,
        data: V1CreateReview,
        principal: &Principal,
    ) -> TrackerResult<()> {
        let reviewer_type = parse_reviewer_type(data.reviewer_type.as_deref())?;
        let reviewer = data.reviewer.unwrap_or_else(|| principal.email.clone());

        let (_, mut annotation) = self
            .episodes
            .get_annotation(annotation_id)
            .await?
            .ok_or_else(|| TrackerError::NotFound(format!("annotation {annotation_id}")))?;

        let review = upsert_review_in(
            &mut annotation.reviews,
            ResourceType::Annotation,
            annotation_id,
            &reviewer,
            reviewer_type,
            data.approved,
            data.reason,
            data.correction,
        );
        self.reviews.upsert_review(&review).await
    }

    /// Distinct users and agents currently pending on one task.
    pub async fn pending_reviewers(&self, task_id: &str) -> TrackerResult<V1PendingReviewers> {
        let rows = self.reviews.pending_for_task(task_id).await?;
        let users: BTreeSet<String> = rows.iter().filter_map(|r| r.user_id.clone()).collect();
        let agents: BTreeSet<String> = rows.iter().filter_map(|r| r.agent_id.clone()).collect();
        Ok(V1PendingReviewers {
            task_id: task_id.to_string(),
            users: users.into_iter().collect(),
            agents: agents.into_iter().collect(),
        })
    }

    /// Distinct task ids on which the given party is pending.
    pub async fn pending_reviews(
        &self,
        user: Option<&str>,
        agent: Option<&str>,
    ) -> TrackerResult<V1PendingReviews> {
        let tasks = self.reviews.pending_tasks_for(user, agent).await?;
        Ok(V1PendingReviews { tasks })
    }
}
