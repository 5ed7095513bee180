//! Error types for the todosync application.
//!
//! This module defines the failures that can occur while editing the task
//! list, talking to the task service, or touching the local cache.

use std::{io, path::PathBuf};

use thiserror::Error;

use crate::{NoticeKind, TaskId};

/// The main error type for the todosync application.
#[derive(Error, Debug)]
pub enum TodoError {
    /// Errors related to file I/O operations.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Errors related to serialization/deserialization operations.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// User input was rejected before anything was changed.
    #[error("{message}")]
    Validation { message: String },

    /// The task service could not be reached.
    #[error("Network error: {message}")]
    Transport { message: String },

    /// The task service answered with a non-success status.
    #[error("Server error ({status}){}", format_server_detail(.message))]
    Server { status: u16, message: String },

    /// The task service answered, but its body could not be decoded.
    #[error("Invalid response from server: {message}")]
    InvalidResponse { message: String },

    /// The task service does not know the task.
    #[error("Task {id} was not found on the server")]
    NotFound { id: TaskId },

    /// No task with this id exists in the local collection.
    #[error("No task with id {id}")]
    UnknownTask { id: TaskId },

    /// Errors related to configuration.
    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    /// Directory creation or access failed.
    #[error("Failed to create or access directory: {path}")]
    DirectoryError { path: PathBuf },

    /// The reminder scheduler could not be driven.
    #[error("Reminder scheduler error: {message}")]
    SchedulerError { message: String },
}

impl TodoError {
    pub fn validation(message: impl Into<String>) -> Self {
        TodoError::Validation {
            message: message.into(),
        }
    }

    /// Validation failures block the action and never touch the network.
    pub fn is_validation(&self) -> bool {
        matches!(self, TodoError::Validation { .. })
    }

    /// Failures that only report divergence from the server; the local
    /// change still goes through.
    pub fn is_sync_error(&self) -> bool {
        matches!(
            self,
            TodoError::Transport { .. }
                | TodoError::Server { .. }
                | TodoError::InvalidResponse { .. }
                | TodoError::NotFound { .. }
        )
    }

    /// How the presentation layer reports this error, if it reports it at
    /// all. Anything else is left to the process exit path.
    pub fn notice_kind(&self) -> Option<NoticeKind> {
        if self.is_validation() {
            Some(NoticeKind::Validation)
        } else if self.is_sync_error() {
            Some(NoticeKind::Error)
        } else {
            None
        }
    }
}

impl From<reqwest::Error> for TodoError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            return TodoError::InvalidResponse {
                message: err.to_string(),
            };
        }
        match err.status() {
            Some(status) => TodoError::Server {
                status: status.as_u16(),
                message: err.to_string(),
            },
            None => TodoError::Transport {
                message: err.to_string(),
            },
        }
    }
}

fn format_server_detail(message: &str) -> String {
    if message.is_empty() {
        String::new()
    } else {
        format!(": {}", message)
    }
}
