//! Task aggregate service.
//!
//! Implements the task lifecycle operations. Every mutation dispatches on
//! the task's backend: local tasks go through the stores, remote tasks are
//! forwarded verbatim to the peer tracker.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::domain::errors::{TrackerError, TrackerResult};
use crate::domain::models::wire::{
    V1ActionEvent, V1ActionRecorded, V1AddThread, V1PostMessage, V1Prompt, V1RemoveThread,
    V1SearchTask, V1Task, V1TaskUpdate,
};
use crate::domain::models::{
    ActionEvent, EnvState, Episode, OpKind, Principal, Prompt, RecordDecision, ResourceType,
    RoleMessage, RoleThread, Task, TaskBackend, TaskPatch, TaskStatus,
};
use crate::domain::ports::{
    EpisodeStore, ImageConverter, PromptStore, ReviewStore, TaskFilter, TaskRow, TaskStore,
    ThreadStore,
};
use crate::infrastructure::events::ActionRecordedPublisher;
use crate::infrastructure::remote::RemoteClient;
use crate::services::authz::{check_owner, resolve_create_owner, resolve_owner_filter};
use crate::services::locks::TaskLocks;
use crate::services::review_service::sync_pending_projection;

pub struct TaskService {
    tasks: Arc<dyn TaskStore>,
    threads: Arc<dyn ThreadStore>,
    prompts: Arc<dyn PromptStore>,
    episodes: Arc<dyn EpisodeStore>,
    reviews: Arc<dyn ReviewStore>,
    images: Arc<dyn ImageConverter>,
    publisher: Arc<ActionRecordedPublisher>,
    remote: Arc<RemoteClient>,
    locks: Arc<TaskLocks>,
}

impl TaskService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        tasks: Arc<dyn TaskStore>,
        threads: Arc<dyn ThreadStore>,
        prompts: Arc<dyn PromptStore>,
        episodes: Arc<dyn EpisodeStore>,
        reviews: Arc<dyn ReviewStore>,
        images: Arc<dyn ImageConverter>,
        publisher: Arc<ActionRecordedPublisher>,
        remote: Arc<RemoteClient>,
        locks: Arc<TaskLocks>,
    ) -> Self {
        Self {
            tasks,
            threads,
            prompts,
            episodes,
            reviews,
            images,
            publisher,
            remote,
            locks,
        }
    }

    /// Create a task from its wire form on behalf of a principal.
    pub async fn create(&self, mut v1: V1Task, principal: &Principal) -> TrackerResult<Task> {
        let owner = resolve_create_owner(principal, v1.owner_id.as_deref())?;
        if v1.status.as_deref().is_none_or(str::is_empty) {
            v1.status = Some(TaskStatus::Created.as_str().to_string());
        }
        let mut task = Task::from_v1(v1, Some(&owner))?;
        task.created_by = Some(principal.email.clone());
        self.persist_new(task).await
    }

    /// Persist a freshly built local task: episode, threads, requirements,
    /// version, row, pending projection.
    pub async fn persist_new(&self, mut task: Task) -> TrackerResult<Task> {
        task.validate()?;
        self.episodes.ensure_episode(&task.episode).await?;
        for thread in &task.threads {
            self.threads.upsert_thread(thread).await?;
        }
        for requirement in &task.review_requirements {
            self.reviews.upsert_requirement(requirement).await?;
        }
        task.refresh_version()?;
        self.tasks.upsert(&TaskRow::from_task(&task)).await?;
        sync_pending_projection(self.reviews.as_ref(), &task).await?;
        debug!(task_id = %task.id, "created task");
        Ok(task)
    }

    /// Load the full aggregate for one row.
    async fn assemble(&self, row: TaskRow) -> TrackerResult<Task> {
        let threads = self.threads.get_threads(&row.thread_ids).await?;

        let episode = match &row.episode_id {
            Some(id) => match self.episodes.get_episode(id).await? {
                Some(episode) => episode,
                None => {
                    // Episodes are created on demand; a dangling id gets a
                    // fresh empty episode under the same identity.
                    let mut episode = Episode::new(row.owner_id.clone());
                    episode.id = id.clone();
                    self.episodes.ensure_episode(&episode).await?;
                    episode
                }
            },
            None => {
                let episode = Episode::new(row.owner_id.clone());
                self.episodes.ensure_episode(&episode).await?;
                episode
            }
        };

        let reviews = self.reviews.reviews_for(ResourceType::Task, &row.id).await?;
        let requirements = self.reviews.requirements_for(&row.id).await?;
        Ok(row.into_task(threads, episode, reviews, requirements))
    }

    async fn get_for(&self, id: &str, principal: &Principal, op: OpKind) -> TrackerResult<Task> {
        let resource = format!("task {id}");
        let row = self
            .tasks
            .get(id)
            .await?
            .ok_or_else(|| TrackerError::NotFound(resource.clone()))?;
        check_owner(principal, op, row.owner_id.as_deref(), &resource)?;
        self.assemble(row).await
    }

    /// Fetch one task readable by the principal. Unknown and forbidden ids
    /// are indistinguishable.
    pub async fn get(&self, id: &str, principal: &Principal) -> TrackerResult<Task> {
        self.get_for(id, principal, OpKind::Read).await
    }

    /// Fetch one task the principal may mutate.
    pub async fn get_mut(&self, id: &str, principal: &Principal) -> TrackerResult<Task> {
        self.get_for(id, principal, OpKind::Mutate).await
    }

    /// Search tasks, newest first.
    pub async fn find(
        &self,
        search: &V1SearchTask,
        principal: &Principal,
    ) -> TrackerResult<Vec<Task>> {
        let owners = resolve_owner_filter(principal, OpKind::Read, search.owners.as_deref())?;
        let filter = TaskFilter {
            owners,
            id: search.task_id.clone(),
            status: search.status.clone(),
            assigned_to: search.assigned_to.clone(),
            assigned_type: search.assigned_type.clone(),
            device: search.device.clone(),
            device_type: search.device_type.clone(),
            parent_id: search.parent_id.clone(),
            project: search.project.clone(),
            skill: search.skill.clone(),
            tags: search.tags.clone().unwrap_or_default(),
            labels: search.labels.clone().unwrap_or_default(),
        };
        let rows = self.tasks.find(&filter).await?;
        let mut tasks = Vec::with_capacity(rows.len());
        for row in rows {
            tasks.push(self.assemble(row).await?);
        }
        Ok(tasks)
    }

    /// Apply an explicit patch. The version is recomputed only when an
    /// observable field changed; the pending projection always reconciles.
    pub async fn update(
        &self,
        id: &str,
        update: V1TaskUpdate,
        principal: &Principal,
    ) -> TrackerResult<Task> {
        let mut task = self.get_for(id, principal, OpKind::Mutate).await?;
        let patch = TaskPatch::from_v1(update)?;

        let lock = self.locks.for_task(id);
        let _guard = lock.lock().await;

        let changed = patch.apply(&mut task);
        if changed {
            task.refresh_version()?;
        }
        self.tasks.upsert(&TaskRow::from_task(&task)).await?;
        sync_pending_projection(self.reviews.as_ref(), &task).await?;
        Ok(task)
    }

    /// Delete a task: its row, requirements, pending rows, and task-level
    /// reviews. Threads, prompts, and the episode stay in their own stores;
    /// only the task's references to them die with the row.
    pub async fn delete(&self, id: &str, principal: &Principal) -> TrackerResult<()> {
        let resource = format!("task {id}");
        let row = self
            .tasks
            .get(id)
            .await?
            .ok_or_else(|| TrackerError::NotFound(resource.clone()))?;
        check_owner(principal, OpKind::Delete, row.owner_id.as_deref(), &resource)?;

        self.reviews.delete_reviews_for(ResourceType::Task, id).await?;
        self.reviews.delete_requirements_for(id).await?;
        self.reviews.delete_pending_for(id).await?;
        self.tasks.delete(id).await?;
        self.locks.forget(id);
        Ok(())
    }

    /// Persist the current state of a task, local or remote. For remote
    /// tasks an existence probe selects update-or-create; a version
    /// mismatch with the remote is tolerated and logged.
    pub async fn save(&self, task: &mut Task) -> TrackerResult<()> {
        match task.backend() {
            TaskBackend::Local => {
                self.episodes.ensure_episode(&task.episode).await?;
                for requirement in &task.review_requirements {
                    self.reviews.upsert_requirement(requirement).await?;
                }
                task.refresh_version()?;
                self.tasks.upsert(&TaskRow::from_task(task)).await
            }
            TaskBackend::Remote { base_url, auth_token } => {
                let existing = self
                    .remote
                    .try_get_task(&base_url, auth_token.as_deref(), &task.id)
                    .await?;
                match existing {
                    Some(remote_task) => {
                        if remote_task.version != task.version {
                            warn!(
                                task_id = %task.id,
                                "remote task version diverged; overriding remote changes"
                            );
                        }
                        task.refresh_version()?;
                        self.remote
                            .update_task(
                                &base_url,
                                auth_token.as_deref(),
                                &task.id,
                                &task.to_update_v1(),
                            )
                            .await?;
                    }
                    None => {
                        task.refresh_version()?;
                        self.remote
                            .create_task(&base_url, auth_token.as_deref(), &task.to_v1())
                            .await?;
                    }
                }
                Ok(())
            }
        }
    }

    /// Reload a task: remote tasks fetch the peer's projection and
    /// overwrite local fields, local tasks re-read the store.
    pub async fn refresh(&self, task: &mut Task) -> TrackerResult<()> {
        match task.backend() {
            TaskBackend::Remote { base_url, auth_token } => {
                let v1 = self
                    .remote
                    .get_task(&base_url, auth_token.as_deref(), &task.id)
                    .await?;
                task.absorb_v1(v1)
            }
            TaskBackend::Local => {
                let row = self
                    .tasks
                    .get(&task.id)
                    .await?
                    .ok_or_else(|| TrackerError::NotFound(format!("task {}", task.id)))?;
                *task = self.assemble(row).await?;
                Ok(())
            }
        }
    }

    /// Poll until the task reports a done status.
    pub async fn wait_for_done(
        &self,
        task: &mut Task,
        timeout: Duration,
        interval: Duration,
    ) -> TrackerResult<()> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            self.refresh(task).await?;
            if task.is_done() {
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(TrackerError::Timeout(format!(
                    "task {} not done within {timeout:?}",
                    task.id
                )));
            }
            tokio::time::sleep(interval).await;
        }
    }

    /// Post a message into one of the task's threads (default `feed`).
    pub async fn post_message(&self, task: &Task, data: V1PostMessage) -> TrackerResult<()> {
        if let TaskBackend::Remote { base_url, auth_token } = task.backend() {
            return self
                .remote
                .post_message(&base_url, auth_token.as_deref(), &task.id, &data)
                .await;
        }

        let target = data.thread.as_deref().unwrap_or("feed");
        let thread = task
            .thread(target)
            .ok_or_else(|| TrackerError::NotFound(format!("thread '{target}'")))?;
        let message =
            RoleMessage::new(thread.id.clone(), data.role, data.msg).with_images(data.images);
        self.threads.post_message(&message).await
    }

    /// Messages of one of the task's threads.
    pub async fn messages(
        &self,
        task: &Task,
        thread: Option<&str>,
    ) -> TrackerResult<Vec<RoleMessage>> {
        let target = thread.unwrap_or("feed");
        let thread = task
            .thread(target)
            .ok_or_else(|| TrackerError::NotFound(format!("thread '{target}'")))?;
        self.threads.messages(&thread.id).await
    }

    /// Add a new thread to the task.
    pub async fn create_thread(&self, task: &mut Task, data: V1AddThread) -> TrackerResult<()> {
        if let TaskBackend::Remote { base_url, auth_token } = task.backend() {
            return self
                .remote
                .create_thread(&base_url, auth_token.as_deref(), &task.id, &data)
                .await;
        }

        let mut thread =
            RoleThread::new(task.owner_id.clone(), data.name, data.public).with_metadata(data.metadata);
        if let Some(id) = data.id {
            thread = thread.with_id(id);
        }
        task.add_thread(thread.clone())?;
        self.threads.upsert_thread(&thread).await?;
        self.save(task).await
    }

    /// Create the named thread if absent. Idempotent by name.
    pub async fn ensure_thread(&self, task: &mut Task, name: &str) -> TrackerResult<()> {
        if task.thread(name).is_some() {
            return Ok(());
        }
        self.create_thread(
            task,
            V1AddThread {
                name: Some(name.to_string()),
                ..V1AddThread::default()
            },
        )
        .await
    }

    /// Drop a thread reference from the task.
    pub async fn remove_thread(&self, task: &mut Task, thread_id: &str) -> TrackerResult<()> {
        if let TaskBackend::Remote { base_url, auth_token } = task.backend() {
            return self
                .remote
                .remove_thread(
                    &base_url,
                    auth_token.as_deref(),
                    &task.id,
                    &V1RemoveThread {
                        id: thread_id.to_string(),
                    },
                )
                .await;
        }

        if !task.remove_thread(thread_id) {
            return Err(TrackerError::NotFound(format!("thread {thread_id}")));
        }
        self.save(task).await
    }

    /// Store a prompt and append its id to the task's prompt sequence.
    pub async fn store_prompt(&self, task: &mut Task, data: V1Prompt) -> TrackerResult<String> {
        if let TaskBackend::Remote { base_url, auth_token } = task.backend() {
            return self
                .remote
                .store_prompt(&base_url, auth_token.as_deref(), &task.id, &data)
                .await;
        }

        let mut prompt = data.into_prompt(&task.id);
        if prompt.owner_id.is_none() {
            prompt.owner_id = task.owner_id.clone();
        }
        let id = prompt.id.clone();
        self.prompts.upsert(&prompt).await?;
        task.prompts.push(id.clone());
        self.save(task).await?;
        Ok(id)
    }

    /// Approve or fail a prompt. `prompt_id` may be the literal `all`,
    /// which approves every prompt belonging to the task.
    pub async fn review_prompt(
        &self,
        task: &Task,
        prompt_id: &str,
        approved: bool,
    ) -> TrackerResult<()> {
        if let TaskBackend::Remote { base_url, auth_token } = task.backend() {
            return if approved {
                self.remote
                    .approve_prompt(&base_url, auth_token.as_deref(), &task.id, prompt_id)
                    .await
            } else {
                self.remote
                    .fail_prompt(&base_url, auth_token.as_deref(), &task.id, prompt_id)
                    .await
            };
        }

        if prompt_id == "all" && approved {
            let prompts = self.prompts.for_task(&task.id).await?;
            if prompts.is_empty() {
                return Err(TrackerError::NotFound("prompt".into()));
            }
            return self.prompts.approve_all_for_task(&task.id).await;
        }

        let prompt = self
            .prompts
            .get(prompt_id)
            .await?
            .ok_or_else(|| TrackerError::NotFound(format!("prompt {prompt_id}")))?;
        self.prompts.set_approved(&prompt.id, approved).await
    }

    /// Prompts belonging to the task.
    pub async fn get_prompts(&self, task: &Task) -> TrackerResult<Vec<Prompt>> {
        self.prompts.for_task(&task.id).await
    }

    async fn convert_state(&self, state: Option<EnvState>) -> TrackerResult<Option<EnvState>> {
        match state {
            None => Ok(None),
            Some(mut state) => {
                state.images = self.images.convert_images(state.images).await?;
                Ok(Some(state))
            }
        }
    }

    /// Append an action event to the task's episode.
    ///
    /// Images in both states are converted concurrently before persistence.
    /// The append itself runs under the task's advisory lock so the
    /// published `prev_action`/`event_number` are exact. A sealed episode
    /// (one carrying an `end` event) makes this a no-op.
    pub async fn record_action_event(
        &self,
        task: &mut Task,
        data: V1ActionEvent,
    ) -> TrackerResult<()> {
        if let TaskBackend::Remote { base_url, auth_token } = task.backend() {
            return self
                .remote
                .record_action(&base_url, auth_token.as_deref(), &task.id, &data)
                .await;
        }

        let mut event = data.into_event();
        if event.owner_id.is_none() {
            event.owner_id = task.owner_id.clone();
        }

        let (state, end_state) = tokio::join!(
            self.convert_state(event.state.take()),
            self.convert_state(event.end_state.take())
        );
        event.state = state?;
        event.end_state = end_state?;

        let lock = self.locks.for_task(&task.id);
        let _guard = lock.lock().await;

        match task.episode.record(event) {
            RecordDecision::AlreadyEnded => {
                debug!(task_id = %task.id, "episode already ended; dropping action event");
                Ok(())
            }
            RecordDecision::Recorded {
                dropped_action_id,
                event_number,
                prev_action,
            } => {
                if let Some(dropped) = dropped_action_id {
                    self.episodes.delete_action(&dropped).await?;
                }
                let episode_id = task.episode.id.clone();
                let order = task.episode.actions.len() as u32 - 1;
                let recorded = task
                    .episode
                    .actions
                    .last()
                    .cloned()
                    .ok_or_else(|| TrackerError::Precondition("episode empty after record".into()))?;
                self.episodes
                    .upsert_action(&episode_id, order, &recorded)
                    .await?;
                self.save(task).await?;

                let envelope = V1ActionRecorded {
                    prev_action,
                    action: recorded,
                    event_number,
                    task_snapshot: task.to_v1(),
                };
                self.publisher.publish(&envelope).await;
                Ok(())
            }
        }
    }

    /// Actions of the task's episode, in insertion order.
    pub async fn get_actions(&self, task: &Task) -> TrackerResult<Vec<ActionEvent>> {
        if let TaskBackend::Remote { base_url, auth_token } = task.backend() {
            let events = self
                .remote
                .get_actions(&base_url, auth_token.as_deref(), &task.id)
                .await?;
            return Ok(events.events);
        }
        Ok(task.episode.actions.clone())
    }

    /// Delete one action and its reviews, then reconcile the projection.
    pub async fn delete_action(&self, task: &mut Task, action_id: &str) -> TrackerResult<()> {
        let lock = self.locks.for_task(&task.id);
        let _guard = lock.lock().await;

        if !task.episode.delete_action(action_id) {
            return Err(TrackerError::NotFound(format!("action {action_id}")));
        }
        self.episodes.delete_action(action_id).await?;
        self.save(task).await?;
        sync_pending_projection(self.reviews.as_ref(), task).await
    }

    /// Delete every action of the task's episode.
    pub async fn delete_all_actions(&self, task: &mut Task) -> TrackerResult<()> {
        if let TaskBackend::Remote { base_url, auth_token } = task.backend() {
            return self
                .remote
                .delete_actions(&base_url, auth_token.as_deref(), &task.id)
                .await;
        }

        let lock = self.locks.for_task(&task.id);
        let _guard = lock.lock().await;

        self.episodes.delete_all_actions(&task.episode.id).await?;
        task.episode.actions.clear();
        self.save(task).await?;
        sync_pending_projection(self.reviews.as_ref(), task).await
    }

    /// Hide or unhide one action.
    pub async fn hide_action(
        &self,
        task: &mut Task,
        action_id: &str,
        hidden: bool,
    ) -> TrackerResult<()> {
        if let TaskBackend::Remote { base_url, auth_token } = task.backend() {
            return self
                .remote
                .hide_action(&base_url, auth_token.as_deref(), &task.id, action_id, hidden)
                .await;
        }

        let lock = self.locks.for_task(&task.id);
        let _guard = lock.lock().await;

        if !task.episode.set_hidden(action_id, hidden) {
            return Err(TrackerError::NotFound(format!("action {action_id}")));
        }
        self.episodes.set_hidden(action_id, hidden).await?;
        self.save(task).await?;
        sync_pending_projection(self.reviews.as_ref(), task).await
    }

    /// Persist a fresh deep copy of the task.
    pub async fn copy(&self, task: &Task) -> TrackerResult<Task> {
        self.persist_new(task.copy()).await
    }
}
