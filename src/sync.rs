//! Reconciliation engine for the task list.
//!
//! The engine owns the in-memory collection, keeps the local cache in step
//! with it, and reconciles local changes with the task service. Every
//! remote-backed change is a [`Mutation`] that goes through three steps:
//!
//! 1. `prepare_*` validates input, applies the change locally, writes the
//!    cache and records a pending [`SyncState`];
//! 2. [`Mutation::dispatch`] performs the single remote call;
//! 3. [`SyncEngine::settle`] reconciles with the server's answer, or marks
//!    the task as local-only and surfaces a notice.
//!
//! Validation failures stop at step 1. Network failures never undo a local
//! change.
use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use chrono::{NaiveDateTime, Utc};
use log::{debug, error, info, warn};
use tokio::sync::Mutex;

use crate::{
    due_soon, fresh_task_id, DeleteOutcome, LocalCache, Notice, NoticeKind, NoticeSender,
    Reminder, RemoteTask, Result, ServerStatus, SyncState, Task, TaskChanges, TaskDraft, TaskEdit,
    TaskId, TaskService, TodoError,
};

/// The engine shared between the presentation layer and the reminder task.
pub type SharedEngine = Arc<Mutex<SyncEngine>>;

/// A task together with its synchronization status.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedTask {
    pub task: Task,
    pub sync: SyncState,
}

/// A locally applied change waiting for the server.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    Create { task: Task },
    Update { id: TaskId, changes: TaskChanges },
    Delete { id: TaskId },
}

/// What the server said about a [`Mutation`].
#[derive(Debug)]
pub enum RemoteOutcome {
    Created(Task),
    Updated(Task),
    Deleted(DeleteOutcome),
    Failed(TodoError),
}

impl Mutation {
    pub fn task_id(&self) -> TaskId {
        match self {
            Mutation::Create { task } => task.id,
            Mutation::Update { id, .. } | Mutation::Delete { id } => *id,
        }
    }

    /// Performs the remote call for this mutation. Never retries.
    pub async fn dispatch(&self, service: &dyn TaskService) -> RemoteOutcome {
        let result = match self {
            Mutation::Create { task } => service.create_task(task).await.map(RemoteOutcome::Created),
            Mutation::Update { id, changes } => service
                .update_task(*id, changes)
                .await
                .map(RemoteOutcome::Updated),
            Mutation::Delete { id } => service.delete_task(*id).await.map(RemoteOutcome::Deleted),
        };
        result.unwrap_or_else(RemoteOutcome::Failed)
    }
}

/// Keeps the task list, the local cache and the task service reconciled.
pub struct SyncEngine {
    tasks: Vec<TrackedTask>,
    cache: LocalCache,
    service: Arc<dyn TaskService>,
    notices: NoticeSender,
    server_status: ServerStatus,
    /// Deletes waiting for the user to confirm or cancel
    awaiting_confirmation: HashSet<TaskId>,
    /// Deletes already applied locally and sent to the server
    deletes_in_flight: HashSet<TaskId>,
}

impl SyncEngine {
    pub fn new(cache: LocalCache, service: Arc<dyn TaskService>, notices: NoticeSender) -> Self {
        Self {
            tasks: Vec::new(),
            cache,
            service,
            notices,
            server_status: ServerStatus::Checking,
            awaiting_confirmation: HashSet::new(),
            deletes_in_flight: HashSet::new(),
        }
    }

    pub fn into_shared(self) -> SharedEngine {
        Arc::new(Mutex::new(self))
    }

    /// Startup sequence: clean the cache, probe the server, then load the list.
    pub async fn initialize(&mut self) -> Result<usize> {
        info!("Initializing task list");
        match self.cache.clean() {
            Ok(0) => {}
            Ok(repaired) => info!("Repaired {} cached records", repaired),
            Err(e) => warn!("Cache cleanup failed: {}", e),
        }

        self.check_server_status().await;
        self.refresh().await
    }

    pub async fn check_server_status(&mut self) -> ServerStatus {
        self.server_status = ServerStatus::Checking;
        self.server_status = self.service.ping().await;
        info!("Task service is {}", self.server_status.label());
        self.server_status
    }

    /// Fetches the remote list and merges it with the cache, or falls back
    /// to the cache alone when the server cannot be reached.
    pub async fn refresh(&mut self) -> Result<usize> {
        let cached = self.cache.load();
        match self.service.list_tasks().await {
            Ok(remote) => {
                self.server_status = ServerStatus::Online;
                let mut merged = merge_remote(remote, cached.as_deref().unwrap_or_default());
                merged.retain(|t| !self.deletes_in_flight.contains(&t.task.id));
                let local_only = merged
                    .iter()
                    .filter(|t| t.sync == SyncState::LocalOnly)
                    .count();
                if local_only > 0 {
                    info!("Keeping {} cached tasks the server does not list", local_only);
                }
                self.adopt(merged);
            }
            Err(e) => {
                error!("Error fetching tasks: {}", e);
                self.server_status = ServerStatus::Offline;
                let fallback = with_unique_ids(cached.unwrap_or_default())
                    .into_iter()
                    .map(|task| TrackedTask {
                        task,
                        sync: SyncState::LocalOnly,
                    })
                    .collect();
                self.adopt(fallback);
                self.notify(
                    NoticeKind::Error,
                    format!("Failed to fetch tasks: {}. Using local storage as fallback.", e),
                );
            }
        }
        self.persist();
        Ok(self.tasks.len())
    }

    pub fn server_status(&self) -> ServerStatus {
        self.server_status
    }

    pub fn service(&self) -> Arc<dyn TaskService> {
        Arc::clone(&self.service)
    }

    pub fn cache(&self) -> &LocalCache {
        &self.cache
    }

    /// Snapshot of the current collection.
    pub fn tasks(&self) -> Vec<Task> {
        self.tasks.iter().map(|t| t.task.clone()).collect()
    }

    pub fn get(&self, id: TaskId) -> Option<&Task> {
        self.position(id).map(|i| &self.tasks[i].task)
    }

    pub fn sync_state(&self, id: TaskId) -> Option<SyncState> {
        if self.deletes_in_flight.contains(&id) {
            return Some(SyncState::PendingDelete);
        }
        self.position(id).map(|i| self.tasks[i].sync)
    }

    pub fn is_awaiting_confirmation(&self, id: TaskId) -> bool {
        self.awaiting_confirmation.contains(&id)
    }

    /// Validates a new task and inserts it optimistically with a provisional id.
    pub fn prepare_add(&mut self, draft: &TaskDraft) -> Result<Mutation> {
        let text = draft.task.trim();
        if text.is_empty() {
            return Err(self.reject("Please enter a valid task."));
        }
        if self.tasks.iter().any(|t| t.task.matches_text(text)) {
            return Err(self.reject("This task already exists. Please enter a unique task."));
        }

        let taken: HashSet<TaskId> = self.tasks.iter().map(|t| t.task.id).collect();
        let task = Task::provisional(fresh_task_id(&taken), draft, Utc::now());
        info!("Adding task {} (provisional)", task.id);

        self.tasks.push(TrackedTask {
            task: task.clone(),
            sync: SyncState::PendingCreate,
        });
        self.persist();

        Ok(Mutation::Create { task })
    }

    /// Validates an edit and applies it locally right away.
    pub fn prepare_update(&mut self, id: TaskId, edit: &TaskEdit) -> Result<Mutation> {
        if edit.task.trim().is_empty() {
            return Err(self.reject("Please enter a valid task."));
        }
        let index = self.position(id).ok_or(TodoError::UnknownTask { id })?;

        let entry = &mut self.tasks[index];
        entry.task.apply_edit(edit);
        entry.sync = SyncState::PendingUpdate;
        let changes = TaskChanges {
            task: entry.task.task.clone(),
            due_date: entry.task.due_date,
            priority: entry.task.priority,
            completed: entry.task.completed,
        };
        debug!("Applied local edit to task {}", id);
        self.persist();

        Ok(Mutation::Update { id, changes })
    }

    /// Flips completion locally. Not sent to the server.
    pub fn toggle_completion(&mut self, id: TaskId) -> Result<bool> {
        let index = self.position(id).ok_or(TodoError::UnknownTask { id })?;
        let task = &mut self.tasks[index].task;
        task.completed = !task.completed;
        let completed = task.completed;
        debug!("Task {} completed={}", id, completed);
        self.persist();
        Ok(completed)
    }

    /// First half of a delete: asks the presentation layer for confirmation.
    pub fn request_delete(&mut self, id: TaskId) -> Result<()> {
        let task = self.get(id).ok_or(TodoError::UnknownTask { id })?;
        let message = format!("Delete \"{}\"? This action cannot be undone.", task.task);

        if !self.awaiting_confirmation.insert(id) {
            return Err(self.reject("This task is already waiting for delete confirmation."));
        }

        self.notices
            .show(Notice::new(NoticeKind::ConfirmDelete, message).for_task(id));
        Ok(())
    }

    pub fn cancel_delete(&mut self, id: TaskId) -> Result<()> {
        if !self.awaiting_confirmation.remove(&id) {
            return Err(TodoError::validation(format!(
                "No delete is waiting for confirmation on task {}",
                id
            )));
        }
        debug!("Delete of task {} cancelled", id);
        Ok(())
    }

    /// Second half of a delete: removes the task locally and returns the remote call.
    pub fn confirm_delete(&mut self, id: TaskId) -> Result<Mutation> {
        if !self.awaiting_confirmation.remove(&id) {
            return Err(TodoError::validation(format!(
                "No delete is waiting for confirmation on task {}",
                id
            )));
        }
        let index = self.position(id).ok_or(TodoError::UnknownTask { id })?;

        self.tasks.remove(index);
        self.deletes_in_flight.insert(id);
        info!("Removed task {} locally", id);
        self.persist();

        Ok(Mutation::Delete { id })
    }

    /// Reconciles a mutation with the server's answer.
    pub async fn settle(&mut self, mutation: Mutation, outcome: RemoteOutcome) -> Result<()> {
        match (mutation, outcome) {
            (Mutation::Create { task }, RemoteOutcome::Created(saved)) => {
                match self.position(task.id) {
                    Some(index) => {
                        info!("Task {} confirmed by server as {}", task.id, saved.id);
                        let entry = &mut self.tasks[index];
                        entry.task.adopt_server_fields(saved);
                        entry.sync = SyncState::Synced;
                        self.persist();
                    }
                    None => debug!("Provisional task {} is gone, ignoring server copy", task.id),
                }
            }
            (Mutation::Create { task }, RemoteOutcome::Failed(e)) => {
                error!("Error adding task: {}", e);
                self.mark(task.id, SyncState::LocalOnly);
                self.notices.show(
                    Notice::new(
                        NoticeKind::Error,
                        format!("Failed to sync task with server: {}. Saved locally only.", e),
                    )
                    .for_task(task.id),
                );
            }
            (Mutation::Update { id, .. }, RemoteOutcome::Updated(saved)) => {
                match self.position(id) {
                    Some(index) => {
                        let entry = &mut self.tasks[index];
                        entry.task.adopt_server_fields(saved);
                        entry.sync = SyncState::Synced;
                        self.persist();
                    }
                    None => debug!("Task {} was removed before its update settled", id),
                }
            }
            (Mutation::Update { id, .. }, RemoteOutcome::Failed(e)) => {
                error!("Error updating task: {}", e);
                self.mark(id, SyncState::LocalOnly);
                self.notices.show(
                    Notice::new(
                        NoticeKind::Error,
                        format!("Failed to update task on server: {}. Updated locally only.", e),
                    )
                    .for_task(id),
                );
            }
            (Mutation::Delete { id }, RemoteOutcome::Deleted(DeleteOutcome::Deleted)) => {
                self.deletes_in_flight.remove(&id);
                self.notices
                    .show(Notice::new(NoticeKind::Success, "Task deleted.").for_task(id));
            }
            (Mutation::Delete { id }, RemoteOutcome::Deleted(DeleteOutcome::AlreadyGone)) => {
                self.deletes_in_flight.remove(&id);
                self.refresh().await?;
                self.notices.show(
                    Notice::new(
                        NoticeKind::Info,
                        "This task may have been already deleted. The task list has been refreshed.",
                    )
                    .for_task(id),
                );
            }
            (Mutation::Delete { id }, RemoteOutcome::Failed(e)) => {
                error!("Error deleting task: {}", e);
                self.deletes_in_flight.remove(&id);
                self.notices.show(
                    Notice::new(
                        NoticeKind::Error,
                        format!("Failed to delete task on server. {} Deleted locally only.", e),
                    )
                    .for_task(id),
                );
            }
            (mutation, outcome) => {
                warn!(
                    "Mismatched outcome {:?} for mutation on task {}",
                    outcome,
                    mutation.task_id()
                );
            }
        }
        Ok(())
    }

    /// Adds a task and waits for the server. Returns the final id.
    pub async fn add(&mut self, draft: &TaskDraft) -> Result<TaskId> {
        let mutation = self.prepare_add(draft)?;
        let provisional = mutation.task_id();
        let outcome = mutation.dispatch(self.service.as_ref()).await;
        let confirmed = match &outcome {
            RemoteOutcome::Created(saved) => saved.id,
            _ => provisional,
        };
        self.settle(mutation, outcome).await?;
        Ok(confirmed)
    }

    pub async fn update(&mut self, id: TaskId, edit: &TaskEdit) -> Result<()> {
        let mutation = self.prepare_update(id, edit)?;
        let outcome = mutation.dispatch(self.service.as_ref()).await;
        self.settle(mutation, outcome).await
    }

    /// Confirms a requested delete and waits for the server.
    pub async fn delete(&mut self, id: TaskId) -> Result<()> {
        let mutation = self.confirm_delete(id)?;
        let outcome = mutation.dispatch(self.service.as_ref()).await;
        self.settle(mutation, outcome).await
    }

    /// Marks tasks entering the due-soon window as notified and returns
    /// the reminders to send.
    pub fn collect_reminders(
        &mut self,
        now: NaiveDateTime,
        window: chrono::Duration,
    ) -> Vec<Reminder> {
        let reminders = due_soon(&self.tasks(), now, window);
        if reminders.is_empty() {
            return reminders;
        }

        let due: HashSet<TaskId> = reminders.iter().map(|r| r.task_id).collect();
        for entry in self.tasks.iter_mut().filter(|t| due.contains(&t.task.id)) {
            entry.task.notified = true;
        }
        self.persist();
        reminders
    }

    fn position(&self, id: TaskId) -> Option<usize> {
        self.tasks.iter().position(|t| t.task.id == id)
    }

    fn mark(&mut self, id: TaskId, state: SyncState) {
        if let Some(index) = self.position(id) {
            self.tasks[index].sync = state;
        }
    }

    /// Installs a freshly loaded collection. Tasks with a mutation still in
    /// flight keep their pending state.
    fn adopt(&mut self, mut loaded: Vec<TrackedTask>) {
        for entry in &mut loaded {
            let current = self.position(entry.task.id).map(|i| self.tasks[i].sync);
            if let Some(pending @ (SyncState::PendingCreate | SyncState::PendingUpdate)) = current {
                entry.sync = pending;
            }
        }
        self.tasks = loaded;
    }

    /// Writes the whole collection to the cache. A failed write is reported
    /// but never blocks the action that caused it.
    fn persist(&self) {
        if let Err(e) = self.cache.save(&self.tasks()) {
            error!("Failed to write task cache: {}", e);
            self.notify(
                NoticeKind::Error,
                format!("Could not save tasks locally: {}", e),
            );
        }
    }

    fn reject(&self, message: &str) -> TodoError {
        self.notify(NoticeKind::Validation, message);
        TodoError::validation(message)
    }

    fn notify(&self, kind: NoticeKind, message: impl Into<String>) {
        self.notices.show(Notice::new(kind, message));
    }
}

/// Runs a prepared mutation against the shared engine. The remote call is
/// made without holding the engine lock.
pub async fn commit(engine: &SharedEngine, mutation: Mutation) -> Result<()> {
    let service = engine.lock().await.service();
    let outcome = mutation.dispatch(service.as_ref()).await;
    engine.lock().await.settle(mutation, outcome).await
}

/// Merges the server list with cached records.
///
/// A cached record with the same id wins as a whole; other server records
/// get client defaults. Cached records the server does not list are kept
/// at the end as local-only.
pub fn merge_remote(remote: Vec<RemoteTask>, cached: &[Task]) -> Vec<TrackedTask> {
    let by_id: HashMap<TaskId, &Task> = cached.iter().map(|t| (t.id, t)).collect();
    let listed: HashSet<TaskId> = remote.iter().map(|r| r.id).collect();

    let mut merged: Vec<TrackedTask> = remote
        .into_iter()
        .map(|r| {
            let task = match by_id.get(&r.id) {
                Some(local) => (*local).clone(),
                None => Task::from_remote(r),
            };
            TrackedTask {
                task,
                sync: SyncState::Synced,
            }
        })
        .collect();

    merged.extend(
        cached
            .iter()
            .filter(|t| !listed.contains(&t.id))
            .map(|t| TrackedTask {
                task: t.clone(),
                sync: SyncState::LocalOnly,
            }),
    );
    merged
}

fn with_unique_ids(tasks: Vec<Task>) -> Vec<Task> {
    let mut seen = HashSet::with_capacity(tasks.len());
    tasks
        .into_iter()
        .map(|mut task| {
            if task.id == 0 || seen.contains(&task.id) {
                task.id = fresh_task_id(&seen);
            }
            seen.insert(task.id);
            task
        })
        .collect()
}
