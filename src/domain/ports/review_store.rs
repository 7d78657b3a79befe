//! Review, requirement, and pending-projection persistence port.

use async_trait::async_trait;

use crate::domain::errors::TrackerResult;
use crate::domain::models::{PendingReviewer, ResourceType, Review, ReviewRequirement};

/// Repository interface for reviews (tasks, actions, annotations), review
/// requirements, and the derived pending-reviewers rows.
#[async_trait]
pub trait ReviewStore: Send + Sync {
    /// Insert or replace a review by id. The upsert-by-reviewer policy is
    /// applied at the domain level before this is called.
    async fn upsert_review(&self, review: &Review) -> TrackerResult<()>;

    /// Reviews attached to one resource.
    async fn reviews_for(
        &self,
        resource_type: ResourceType,
        resource_id: &str,
    ) -> TrackerResult<Vec<Review>>;

    /// Reviews attached to any of the given resources, one round-trip.
    async fn reviews_for_many(
        &self,
        resource_type: ResourceType,
        resource_ids: &[String],
    ) -> TrackerResult<Vec<Review>>;

    /// Drop all reviews for one resource.
    async fn delete_reviews_for(
        &self,
        resource_type: ResourceType,
        resource_id: &str,
    ) -> TrackerResult<()>;

    /// Insert or replace a review requirement.
    async fn upsert_requirement(&self, requirement: &ReviewRequirement) -> TrackerResult<()>;

    /// Requirements declared on one task.
    async fn requirements_for(&self, task_id: &str) -> TrackerResult<Vec<ReviewRequirement>>;

    /// Requirements declared on any of the given tasks, one round-trip.
    async fn requirements_for_many(
        &self,
        task_ids: &[String],
    ) -> TrackerResult<Vec<ReviewRequirement>>;

    /// Drop all requirements of one task.
    async fn delete_requirements_for(&self, task_id: &str) -> TrackerResult<()>;

    /// Reconcile the stored pending rows of one task with the target set,
    /// inside a single transaction. Matching rows are left untouched so the
    /// operation is idempotent.
    async fn sync_pending(
        &self,
        task_id: &str,
        target: &[PendingReviewer],
    ) -> TrackerResult<()>;

    /// Stored pending rows for one task.
    async fn pending_for_task(&self, task_id: &str) -> TrackerResult<Vec<PendingReviewer>>;

    /// Distinct task ids on which the given user or agent is pending.
    async fn pending_tasks_for(
        &self,
        user: Option<&str>,
        agent: Option<&str>,
    ) -> TrackerResult<Vec<String>>;

    /// Drop all pending rows of one task.
    async fn delete_pending_for(&self, task_id: &str) -> TrackerResult<()>;
}
