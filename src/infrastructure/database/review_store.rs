//! SQLite implementation of the review store: reviews, requirements, and
//! the pending-reviewers projection.
//!
//! `sync_pending` applies the diff between the stored rows and a freshly
//! computed target set inside one transaction; rows whose (requirement,
//! party) key already exists are left untouched, so a recompute with no
//! state change performs no writes.

use std::collections::HashSet;

use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};

use crate::domain::errors::{TrackerError, TrackerResult};
use crate::domain::models::review::ResourceType;
use crate::domain::models::{PendingReviewer, Review, ReviewRequirement, ReviewerType};
use crate::infrastructure::database::utils::{from_json_opt, from_json_or_default, to_json, to_json_opt};

pub struct SqliteReviewStore {
    pool: SqlitePool,
}

impl SqliteReviewStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

/// Map a reviews row. Shared with the task store's batch loader.
pub fn review_from_row(row: &SqliteRow) -> TrackerResult<Review> {
    let reviewer_type_raw: String = row.try_get("reviewer_type")?;
    let reviewer_type = ReviewerType::from_str(&reviewer_type_raw)
        .ok_or_else(|| TrackerError::Database(format!("unknown reviewer type '{reviewer_type_raw}'")))?;
    let resource_type_raw: String = row.try_get("resource_type")?;
    let resource_type = ResourceType::from_str(&resource_type_raw)
        .ok_or_else(|| TrackerError::Database(format!("unknown resource type '{resource_type_raw}'")))?;

    Ok(Review {
        id: row.try_get("id")?,
        reviewer: row.try_get("reviewer")?,
        reviewer_type,
        approved: row.try_get::<i64, _>("approved")? != 0,
        reason: row.try_get("reason")?,
        correction: from_json_opt(row.try_get("correction")?)?,
        resource_type,
        resource_id: row.try_get("resource_id")?,
        created: row.try_get("created")?,
        updated: row.try_get("updated")?,
    })
}

/// Map a review_requirements row. Shared with the task store's batch loader.
pub fn requirement_from_row(row: &SqliteRow) -> TrackerResult<ReviewRequirement> {
    Ok(ReviewRequirement {
        id: row.try_get("id")?,
        task_id: row.try_get("task_id")?,
        number_required: row.try_get::<i64, _>("number_required")? as u32,
        users: from_json_or_default(row.try_get("users")?)?,
        agents: from_json_or_default(row.try_get("agents")?)?,
        groups: from_json_or_default(row.try_get("groups")?)?,
        types: from_json_or_default(row.try_get("types")?)?,
        created: row.try_get("created")?,
        updated: row.try_get("updated")?,
    })
}

fn pending_from_row(row: &SqliteRow) -> TrackerResult<PendingReviewer> {
    Ok(PendingReviewer {
        id: row.try_get("id")?,
        task_id: row.try_get("task_id")?,
        user_id: row.try_get("user_id")?,
        agent_id: row.try_get("agent_id")?,
        requirement_id: row.try_get::<Option<String>, _>("requirement_id")?.unwrap_or_default(),
    })
}

#[async_trait]
impl crate::domain::ports::ReviewStore for SqliteReviewStore {
    async fn upsert_review(&self, review: &Review) -> TrackerResult<()> {
        let correction = to_json_opt(review.correction.as_ref())?;
        sqlx::query(
            "INSERT OR REPLACE INTO reviews (
                id, reviewer, reviewer_type, approved, reason, correction,
                resource_type, resource_id, created, updated
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&review.id)
        .bind(&review.reviewer)
        .bind(review.reviewer_type.as_str())
        .bind(i64::from(review.approved))
        .bind(&review.reason)
        .bind(&correction)
        .bind(review.resource_type.as_str())
        .bind(&review.resource_id)
        .bind(review.created)
        .bind(review.updated)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn reviews_for(
        &self,
        resource_type: ResourceType,
        resource_id: &str,
    ) -> TrackerResult<Vec<Review>> {
        let rows = sqlx::query(
            "SELECT * FROM reviews WHERE resource_type = ? AND resource_id = ? ORDER BY created",
        )
        .bind(resource_type.as_str())
        .bind(resource_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(review_from_row).collect()
    }

    async fn reviews_for_many(
        &self,
        resource_type: ResourceType,
        resource_ids: &[String],
    ) -> TrackerResult<Vec<Review>> {
        if resource_ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT * FROM reviews WHERE resource_type = ");
        qb.push_bind(resource_type.as_str());
        qb.push(" AND resource_id IN (");
        let mut sep = qb.separated(", ");
        for id in resource_ids {
            sep.push_bind(id);
        }
        qb.push(") ORDER BY created");
        let rows = qb.build().fetch_all(&self.pool).await?;
        rows.iter().map(review_from_row).collect()
    }

    async fn delete_reviews_for(
        &self,
        resource_type: ResourceType,
        resource_id: &str,
    ) -> TrackerResult<()> {
        sqlx::query("DELETE FROM reviews WHERE resource_type = ? AND resource_id = ?")
            .bind(resource_type.as_str())
            .bind(resource_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn upsert_requirement(&self, requirement: &ReviewRequirement) -> TrackerResult<()> {
        sqlx::query(
            "INSERT OR REPLACE INTO review_requirements (
                id, task_id, number_required, users, agents, \"groups\", types, created, updated
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&requirement.id)
        .bind(&requirement.task_id)
        .bind(i64::from(requirement.number_required))
        .bind(to_json(&requirement.users)?)
        .bind(to_json(&requirement.agents)?)
        .bind(to_json(&requirement.groups)?)
        .bind(to_json(&requirement.types)?)
        .bind(requirement.created)
        .bind(requirement.updated)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn requirements_for(&self, task_id: &str) -> TrackerResult<Vec<ReviewRequirement>> {
        let rows = sqlx::query("SELECT * FROM review_requirements WHERE task_id = ? ORDER BY created")
            .bind(task_id)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(requirement_from_row).collect()
    }

    async fn requirements_for_many(
        &self,
        task_ids: &[String],
    ) -> TrackerResult<Vec<ReviewRequirement>> {
        if task_ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT * FROM review_requirements WHERE task_id IN (");
        let mut sep = qb.separated(", ");
        for id in task_ids {
            sep.push_bind(id);
        }
        qb.push(")");
        let rows = qb.build().fetch_all(&self.pool).await?;
        rows.iter().map(requirement_from_row).collect()
    }

    async fn delete_requirements_for(&self, task_id: &str) -> TrackerResult<()> {
        sqlx::query("DELETE FROM review_requirements WHERE task_id = ?")
            .bind(task_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn sync_pending(
        &self,
        task_id: &str,
        target: &[PendingReviewer],
    ) -> TrackerResult<()> {
        let mut tx = self.pool.begin().await?;

        let existing_rows = sqlx::query("SELECT * FROM pending_reviewers WHERE task_id = ?")
            .bind(task_id)
            .fetch_all(&mut *tx)
            .await?;
        let existing: Vec<PendingReviewer> = existing_rows
            .iter()
            .map(pending_from_row)
            .collect::<TrackerResult<_>>()?;

        let target_keys: HashSet<_> = target.iter().map(PendingReviewer::key).collect();
        let existing_keys: HashSet<_> = existing.iter().map(PendingReviewer::key).collect();

        for stale in existing.iter().filter(|row| !target_keys.contains(&row.key())) {
            sqlx::query("DELETE FROM pending_reviewers WHERE id = ?")
                .bind(&stale.id)
                .execute(&mut *tx)
                .await?;
        }

        for fresh in target.iter().filter(|row| !existing_keys.contains(&row.key())) {
            sqlx::query(
                "INSERT INTO pending_reviewers (id, task_id, user_id, agent_id, requirement_id) \
                 VALUES (?, ?, ?, ?, ?)",
            )
            .bind(&fresh.id)
            .bind(&fresh.task_id)
            .bind(&fresh.user_id)
            .bind(&fresh.agent_id)
            .bind(&fresh.requirement_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn pending_for_task(&self, task_id: &str) -> TrackerResult<Vec<PendingReviewer>> {
        let rows = sqlx::query("SELECT * FROM pending_reviewers WHERE task_id = ?")
            .bind(task_id)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(pending_from_row).collect()
    }

    async fn pending_tasks_for(
        &self,
        user: Option<&str>,
        agent: Option<&str>,
    ) -> TrackerResult<Vec<String>> {
        let rows = match (user, agent) {
            (Some(user), _) => {
                sqlx::query("SELECT DISTINCT task_id FROM pending_reviewers WHERE user_id = ?")
                    .bind(user)
                    .fetch_all(&self.pool)
                    .await?
            }
            (None, Some(agent)) => {
                sqlx::query("SELECT DISTINCT task_id FROM pending_reviewers WHERE agent_id = ?")
                    .bind(agent)
                    .fetch_all(&self.pool)
                    .await?
            }
            (None, None) => return Ok(Vec::new()),
        };
        rows.iter()
            .map(|row| row.try_get::<String, _>("task_id").map_err(TrackerError::from))
            .collect()
    }

    async fn delete_pending_for(&self, task_id: &str) -> TrackerResult<()> {
        sqlx::query("DELETE FROM pending_reviewers WHERE task_id = ?")
            .bind(task_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
