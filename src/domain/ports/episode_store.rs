//! Episode and action-event persistence port.

use async_trait::async_trait;

use crate::domain::errors::TrackerResult;
use crate::domain::models::{ActionEvent, Annotation, Episode};

/// Repository interface for episodes, their action events, and the typed
/// annotations attached to actions. Loading an episode reassembles the
/// per-action reviews and annotations.
#[async_trait]
pub trait EpisodeStore: Send + Sync {
    /// Insert the episode row if it does not exist yet.
    async fn ensure_episode(&self, episode: &Episode) -> TrackerResult<()>;

    /// Load an episode with its ordered actions, reviews, and annotations.
    async fn get_episode(&self, id: &str) -> TrackerResult<Option<Episode>>;

    /// Insert or replace one action event at the given position.
    async fn upsert_action(
        &self,
        episode_id: &str,
        event_order: u32,
        event: &ActionEvent,
    ) -> TrackerResult<()>;

    /// Delete one action event.
    async fn delete_action(&self, action_id: &str) -> TrackerResult<()>;

    /// Delete every action event of an episode.
    async fn delete_all_actions(&self, episode_id: &str) -> TrackerResult<()>;

    /// Flip the hidden flag on one action event.
    async fn set_hidden(&self, action_id: &str, hidden: bool) -> TrackerResult<()>;

    /// Attach an annotation to an action event.
    async fn insert_annotation(&self, action_id: &str, annotation: &Annotation) -> TrackerResult<()>;

    /// Load an annotation and the id of the action it belongs to.
    async fn get_annotation(&self, annotation_id: &str)
        -> TrackerResult<Option<(String, Annotation)>>;

    /// Delete the episode row itself.
    async fn delete_episode(&self, id: &str) -> TrackerResult<()>;
}
