//! SQLite implementation of the episode store.

use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};

use crate::domain::errors::TrackerResult;
use crate::domain::models::review::ResourceType;
use crate::domain::models::{ActionEvent, Annotation, Episode, Review};
use crate::domain::ports::EpisodeStore;
use crate::infrastructure::database::review_store::review_from_row;
use crate::infrastructure::database::utils::{from_json, from_json_opt, from_json_or_default, to_json, to_json_opt};

pub struct SqliteEpisodeStore {
    pool: SqlitePool,
}

impl SqliteEpisodeStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn action_from_row(row: &SqliteRow) -> TrackerResult<ActionEvent> {
        Ok(ActionEvent {
            id: row.try_get("id")?,
            action: from_json(row.try_get::<String, _>("action")?.as_str())?,
            tool: from_json(row.try_get::<String, _>("tool")?.as_str())?,
            state: from_json_opt(row.try_get("state")?)?,
            end_state: from_json_opt(row.try_get("end_state")?)?,
            result: from_json_opt(row.try_get("result")?)?,
            prompt_id: row.try_get("prompt_id")?,
            namespace: row.try_get("namespace")?,
            metadata: from_json_or_default(row.try_get("metadata")?)?,
            owner_id: row.try_get("owner_id")?,
            model: row.try_get("model")?,
            agent_id: row.try_get("agent_id")?,
            hidden: row.try_get::<i64, _>("hidden")? != 0,
            reviews: Vec::new(),
            reviewables: Vec::new(),
            created: row.try_get("created")?,
        })
    }

    fn annotation_from_row(row: &SqliteRow) -> TrackerResult<(String, Annotation)> {
        let action_id: String = row.try_get("action_id")?;
        Ok((
            action_id,
            Annotation {
                id: row.try_get("id")?,
                key: row.try_get("key")?,
                value: row.try_get("value")?,
                annotator: row.try_get("annotator")?,
                annotator_type: row.try_get("annotator_type")?,
                reviews: Vec::new(),
                created: row.try_get("created")?,
            },
        ))
    }

    async fn reviews_for_ids(
        &self,
        resource_type: ResourceType,
        ids: &[String],
    ) -> TrackerResult<HashMap<String, Vec<Review>>> {
        let mut grouped: HashMap<String, Vec<Review>> = HashMap::new();
        if ids.is_empty() {
            return Ok(grouped);
        }
        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT * FROM reviews WHERE resource_type = ");
        qb.push_bind(resource_type.as_str());
        qb.push(" AND resource_id IN (");
        let mut sep = qb.separated(", ");
        for id in ids {
            sep.push_bind(id);
        }
        qb.push(") ORDER BY created");
        let rows = qb.build().fetch_all(&self.pool).await?;
        for raw in &rows {
            let review = review_from_row(raw)?;
            grouped
                .entry(review.resource_id.clone())
                .or_default()
                .push(review);
        }
        Ok(grouped)
    }
}

#[async_trait]
impl EpisodeStore for SqliteEpisodeStore {
    async fn ensure_episode(&self, episode: &Episode) -> TrackerResult<()> {
        sqlx::query("INSERT OR IGNORE INTO episodes (id, owner_id, created) VALUES (?, ?, ?)")
            .bind(&episode.id)
            .bind(&episode.owner_id)
            .bind(episode.created)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn get_episode(&self, id: &str) -> TrackerResult<Option<Episode>> {
        let row = sqlx::query("SELECT * FROM episodes WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        let Some(row) = row else {
            return Ok(None);
        };

        let mut episode = Episode {
            id: row.try_get("id")?,
            owner_id: row.try_get("owner_id")?,
            actions: Vec::new(),
            created: row.try_get("created")?,
        };

        let action_rows =
            sqlx::query("SELECT * FROM action_events WHERE episode_id = ? ORDER BY event_order")
                .bind(id)
                .fetch_all(&self.pool)
                .await?;
        for raw in &action_rows {
            episode.actions.push(Self::action_from_row(raw)?);
        }

        let action_ids: Vec<String> = episode.actions.iter().map(|a| a.id.clone()).collect();
        let mut action_reviews = self.reviews_for_ids(ResourceType::Action, &action_ids).await?;

        let mut annotations_by_action: HashMap<String, Vec<Annotation>> = HashMap::new();
        if !action_ids.is_empty() {
            let mut qb: QueryBuilder<Sqlite> =
                QueryBuilder::new("SELECT * FROM annotations WHERE action_id IN (");
            let mut sep = qb.separated(", ");
            for id in &action_ids {
                sep.push_bind(id);
            }
            qb.push(") ORDER BY created");
            let rows = qb.build().fetch_all(&self.pool).await?;
            let mut annotation_ids = Vec::with_capacity(rows.len());
            let mut parsed = Vec::with_capacity(rows.len());
            for raw in &rows {
                let (action_id, annotation) = Self::annotation_from_row(raw)?;
                annotation_ids.push(annotation.id.clone());
                parsed.push((action_id, annotation));
            }
            let mut annotation_reviews = self
                .reviews_for_ids(ResourceType::Annotation, &annotation_ids)
                .await?;
            for (action_id, mut annotation) in parsed {
                annotation.reviews = annotation_reviews.remove(&annotation.id).unwrap_or_default();
                annotations_by_action
                    .entry(action_id)
                    .or_default()
                    .push(annotation);
            }
        }

        for action in &mut episode.actions {
            action.reviews = action_reviews.remove(&action.id).unwrap_or_default();
            action.reviewables = annotations_by_action.remove(&action.id).unwrap_or_default();
        }

        Ok(Some(episode))
    }

    async fn upsert_action(
        &self,
        episode_id: &str,
        event_order: u32,
        event: &ActionEvent,
    ) -> TrackerResult<()> {
        sqlx::query(
            "INSERT OR REPLACE INTO action_events (
                id, episode_id, event_order, action, tool, state, end_state,
                result, prompt_id, namespace, metadata, owner_id, model,
                agent_id, hidden, created
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&event.id)
        .bind(episode_id)
        .bind(i64::from(event_order))
        .bind(to_json(&event.action)?)
        .bind(to_json(&event.tool)?)
        .bind(to_json_opt(event.state.as_ref())?)
        .bind(to_json_opt(event.end_state.as_ref())?)
        .bind(to_json_opt(event.result.as_ref())?)
        .bind(&event.prompt_id)
        .bind(&event.namespace)
        .bind(to_json(&event.metadata)?)
        .bind(&event.owner_id)
        .bind(&event.model)
        .bind(&event.agent_id)
        .bind(i64::from(event.hidden))
        .bind(event.created)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_action(&self, action_id: &str) -> TrackerResult<()> {
        sqlx::query("DELETE FROM action_events WHERE id = ?")
            .bind(action_id)
            .execute(&self.pool)
            .await?;
        sqlx::query("DELETE FROM reviews WHERE resource_type = 'action' AND resource_id = ?")
            .bind(action_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_all_actions(&self, episode_id: &str) -> TrackerResult<()> {
        sqlx::query(
            "DELETE FROM reviews WHERE resource_type = 'action' AND resource_id IN \
             (SELECT id FROM action_events WHERE episode_id = ?)",
        )
        .bind(episode_id)
        .execute(&self.pool)
        .await?;
        sqlx::query("DELETE FROM action_events WHERE episode_id = ?")
            .bind(episode_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn set_hidden(&self, action_id: &str, hidden: bool) -> TrackerResult<()> {
        sqlx::query("UPDATE action_events SET hidden = ? WHERE id = ?")
            .bind(i64::from(hidden))
            .bind(action_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn insert_annotation(
        &self,
        action_id: &str,
        annotation: &Annotation,
    ) -> TrackerResult<()> {
        sqlx::query(
            "INSERT OR REPLACE INTO annotations (
                id, action_id, key, value, annotator, annotator_type, created
            ) VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&annotation.id)
        .bind(action_id)
        .bind(&annotation.key)
        .bind(&annotation.value)
        .bind(&annotation.annotator)
        .bind(&annotation.annotator_type)
        .bind(annotation.created)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_annotation(
        &self,
        annotation_id: &str,
    ) -> TrackerResult<Option<(String, Annotation)>> {
        let row = sqlx::query("SELECT * FROM annotations WHERE id = ?")
            .bind(annotation_id)
            .fetch_optional(&self.pool)
            .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        let (action_id, mut annotation) = Self::annotation_from_row(&row)?;
        let mut reviews = self
            .reviews_for_ids(ResourceType::Annotation, &[annotation.id.clone()])
            .await?;
        annotation.reviews = reviews.remove(&annotation.id).unwrap_or_default();
        Ok(Some((action_id, annotation)))
    }

    async fn delete_episode(&self, id: &str) -> TrackerResult<()> {
        self.delete_all_actions(id).await?;
        sqlx::query("DELETE FROM episodes WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
