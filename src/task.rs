//! Core data structures for the todosync application.
//!
//! This module contains the task record exchanged with the task service and
//! kept in the local cache, along with the drafts used to create and edit it.
use std::fmt;

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::truncate_to_minute;

/// Identifier of a task. Provisional ids are creation timestamps in
/// milliseconds; confirmed ids are assigned by the server.
pub type TaskId = i64;

/// Task priority, ordered high to low for display.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

impl Priority {
    /// Sort weight: high=3, medium=2, low=1.
    pub fn weight(self) -> u8 {
        match self {
            Priority::High => 3,
            Priority::Medium => 2,
            Priority::Low => 1,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Priority::High => "High",
            Priority::Medium => "Medium",
            Priority::Low => "Low",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A single to-do item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Unique identifier for the task
    #[serde(deserialize_with = "task_id::deserialize")]
    pub id: TaskId,
    /// Display text
    pub task: String,
    #[serde(default)]
    pub completed: bool,
    /// Local wall-clock due time, minute precision
    #[serde(default, with = "due_date")]
    pub due_date: Option<NaiveDateTime>,
    #[serde(default)]
    pub priority: Priority,
    /// Set once a due-soon reminder has fired
    #[serde(default)]
    pub notified: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Task {
    /// Builds a provisional task from a draft. The id is replaced once the
    /// server confirms the task.
    pub fn provisional(id: TaskId, draft: &TaskDraft, created_at: DateTime<Utc>) -> Self {
        Task {
            id,
            task: draft.task.trim().to_string(),
            completed: false,
            due_date: draft.due_date,
            priority: draft.priority,
            notified: false,
            created_at: Some(created_at),
        }
    }

    /// Builds a task from the server-owned fields, with client-owned fields
    /// at their defaults.
    pub fn from_remote(remote: RemoteTask) -> Self {
        Task {
            id: remote.id,
            task: remote.task,
            completed: false,
            due_date: None,
            priority: Priority::Medium,
            notified: false,
            created_at: remote.created_at,
        }
    }

    pub fn apply_edit(&mut self, edit: &TaskEdit) {
        self.task = edit.task.trim().to_string();
        self.due_date = edit.due_date;
        self.priority = edit.priority;
    }

    /// Takes the server-owned fields (`id`, `task`, `createdAt`) from a
    /// server copy. Completion, due date, priority and `notified` stay local.
    pub fn adopt_server_fields(&mut self, saved: Task) {
        self.id = saved.id;
        self.task = saved.task;
        if saved.created_at.is_some() {
            self.created_at = saved.created_at;
        }
    }

    pub fn matches_text(&self, text: &str) -> bool {
        self.task.trim().to_lowercase() == text.trim().to_lowercase()
    }
}

/// The server-owned part of a task as listed by `GET /todos`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteTask {
    #[serde(deserialize_with = "task_id::deserialize")]
    pub id: TaskId,
    pub task: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Body of `PUT /todos/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskChanges {
    pub task: String,
    #[serde(with = "due_date")]
    pub due_date: Option<NaiveDateTime>,
    pub priority: Priority,
    pub completed: bool,
}

/// Synchronization status of a task with respect to the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// Matches the last server response
    Synced,
    /// Created locally, waiting for the server id
    PendingCreate,
    /// Edited locally, waiting for the server copy
    PendingUpdate,
    /// Removed locally, waiting for the server to confirm
    PendingDelete,
    /// The last remote call failed; the local copy is authoritative
    LocalOnly,
}

/// Form state for a new task
#[derive(Debug, Clone, PartialEq)]
pub struct TaskDraft {
    pub task: String,
    pub due_date: Option<NaiveDateTime>,
    pub priority: Priority,
}

impl TaskDraft {
    /// A blank draft due `now`, medium priority.
    pub fn new(now: NaiveDateTime) -> Self {
        TaskDraft {
            task: String::new(),
            due_date: Some(truncate_to_minute(now)),
            priority: Priority::Medium,
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.task = text.into();
        self
    }
}

/// Form state while editing an existing task
#[derive(Debug, Clone, PartialEq)]
pub struct TaskEdit {
    pub task: String,
    pub due_date: Option<NaiveDateTime>,
    pub priority: Priority,
}

impl From<&Task> for TaskEdit {
    fn from(task: &Task) -> Self {
        TaskEdit {
            task: task.task.clone(),
            due_date: task.due_date,
            priority: task.priority,
        }
    }
}

/// A canned task with a due date relative to today
#[derive(Debug, Clone, Copy)]
pub struct TaskTemplate {
    pub task: &'static str,
    pub priority: Priority,
    pub due_offset_days: i64,
}

pub const TASK_TEMPLATES: [TaskTemplate; 5] = [
    TaskTemplate {
        task: "Morning exercise",
        priority: Priority::High,
        due_offset_days: 1,
    },
    TaskTemplate {
        task: "Team meeting",
        priority: Priority::Medium,
        due_offset_days: 0,
    },
    TaskTemplate {
        task: "Project deadline",
        priority: Priority::High,
        due_offset_days: 7,
    },
    TaskTemplate {
        task: "Grocery shopping",
        priority: Priority::Low,
        due_offset_days: 2,
    },
    TaskTemplate {
        task: "Read a book",
        priority: Priority::Low,
        due_offset_days: 3,
    },
];

impl TaskTemplate {
    pub fn find(name: &str) -> Option<&'static TaskTemplate> {
        TASK_TEMPLATES
            .iter()
            .find(|t| t.task.eq_ignore_ascii_case(name.trim()))
    }

    pub fn draft(&self, now: NaiveDateTime) -> TaskDraft {
        TaskDraft {
            task: self.task.to_string(),
            due_date: Some(truncate_to_minute(now + Duration::days(self.due_offset_days))),
            priority: self.priority,
        }
    }
}

/// Serde format for due dates: `"YYYY-MM-DDTHH:MM"` local time, `""` when absent.
pub mod due_date {
    use chrono::{DateTime, Local, NaiveDateTime};
    use serde::{Deserialize, Deserializer, Serializer};

    pub const FORMAT: &str = "%Y-%m-%dT%H:%M";

    pub fn serialize<S>(value: &Option<NaiveDateTime>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(due) => serializer.serialize_str(&due.format(FORMAT).to_string()),
            None => serializer.serialize_str(""),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<NaiveDateTime>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        match raw.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(text) => parse(text).map(Some).map_err(serde::de::Error::custom),
        }
    }

    pub fn parse(text: &str) -> Result<NaiveDateTime, String> {
        for format in [FORMAT, "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M"] {
            if let Ok(parsed) = NaiveDateTime::parse_from_str(text, format) {
                return Ok(parsed);
            }
        }
        DateTime::parse_from_rfc3339(text)
            .map(|dt| dt.with_timezone(&Local).naive_local())
            .map_err(|_| format!("invalid due date: {text}"))
    }
}

/// Ids arrive as JSON numbers, or as numeric strings from older servers.
mod task_id {
    use serde::{Deserialize, Deserializer};

    use crate::TaskId;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Number(TaskId),
        Text(String),
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<TaskId, D::Error>
    where
        D: Deserializer<'de>,
    {
        match RawId::deserialize(deserializer)? {
            RawId::Number(id) => Ok(id),
            RawId::Text(text) => text
                .trim()
                .parse()
                .map_err(|_| serde::de::Error::custom(format!("invalid task id: {text}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::json;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 10)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn server_records_fill_client_defaults() {
        let task: Task = serde_json::from_value(json!({
            "id": 42,
            "task": "water plants"
        }))
        .unwrap();

        assert_eq!(task.id, 42);
        assert!(!task.completed);
        assert_eq!(task.due_date, None);
        assert_eq!(task.priority, Priority::Medium);
        assert!(!task.notified);
    }

    #[test]
    fn due_date_uses_minute_format_and_empty_string() {
        let mut task = Task::from_remote(RemoteTask {
            id: 7,
            task: "call mom".into(),
            created_at: None,
        });
        task.due_date = Some(at(9, 30));

        let value = serde_json::to_value(&task).unwrap();
        assert_eq!(value["dueDate"], "2024-03-10T09:30");
        assert_eq!(value["priority"], "medium");

        task.due_date = None;
        let value = serde_json::to_value(&task).unwrap();
        assert_eq!(value["dueDate"], "");
    }

    #[test]
    fn accepts_string_ids_and_second_precision_dates() {
        let task: Task = serde_json::from_value(json!({
            "id": "1700000000000",
            "task": "x",
            "dueDate": "2024-03-10T09:30:00",
            "priority": "high"
        }))
        .unwrap();

        assert_eq!(task.id, 1_700_000_000_000);
        assert_eq!(task.due_date, Some(at(9, 30)));
        assert_eq!(task.priority, Priority::High);
    }

    #[test]
    fn null_due_date_is_absent() {
        let task: Task =
            serde_json::from_value(json!({"id": 1, "task": "x", "dueDate": null})).unwrap();
        assert_eq!(task.due_date, None);
    }

    #[test]
    fn template_draft_offsets_due_date() {
        let template = TaskTemplate::find("project deadline").unwrap();
        let draft = template.draft(at(8, 15));

        assert_eq!(draft.priority, Priority::High);
        assert_eq!(draft.due_date, Some(at(8, 15) + Duration::days(7)));
    }

    #[test]
    fn server_copy_only_replaces_server_owned_fields() {
        let mut local = Task::provisional(
            1,
            &TaskDraft::new(at(9, 0)).with_text("file taxes"),
            Utc::now(),
        );
        local.priority = Priority::High;
        local.completed = true;
        local.notified = true;

        let echo: Task = serde_json::from_value(json!({
            "id": 310,
            "task": "File taxes",
            "createdAt": "2024-03-10T08:00:00Z"
        }))
        .unwrap();
        let created_at = echo.created_at;
        local.adopt_server_fields(echo);

        assert_eq!(local.id, 310);
        assert_eq!(local.task, "File taxes");
        assert_eq!(local.created_at, created_at);
        assert_eq!(local.due_date, Some(at(9, 0)));
        assert_eq!(local.priority, Priority::High);
        assert!(local.completed);
        assert!(local.notified);
    }

    #[test]
    fn duplicate_text_match_ignores_case_and_padding() {
        let task = Task::provisional(1, &TaskDraft::new(at(0, 0)).with_text("Buy Milk"), Utc::now());
        assert!(task.matches_text("  buy milk "));
        assert!(!task.matches_text("buy milk later"));
    }
}
