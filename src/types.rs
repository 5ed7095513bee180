//! Shared types for the todosync application.
//!
//! This module contains the crate-wide Result alias and the CLI subcommands.
use clap::{Subcommand, ValueEnum};

use crate::{DateFilter, FilterKind, Priority, PriorityFilter, StatusFilter, TaskId, TodoError};

/// A specialized Result type for todosync operations.
pub type Result<T> = std::result::Result<T, TodoError>;

/// Reachability of the task service, as last probed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerStatus {
    Checking,
    Online,
    Offline,
}

impl ServerStatus {
    pub fn label(self) -> &'static str {
        match self {
            ServerStatus::Checking => "checking",
            ServerStatus::Online => "online",
            ServerStatus::Offline => "offline",
        }
    }
}

/// Argument of the `theme` subcommand
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ThemeSetting {
    Dark,
    Light,
    Toggle,
    Show,
}

/// Available subcommands for the todo application
#[derive(Subcommand)]
pub enum Commands {
    /// Add a new task
    Add {
        /// Text of the task
        #[clap(required_unless_present = "template")]
        task: Option<String>,

        /// Due date (YYYY-MM-DD HH:MM); defaults to now
        #[clap(short, long, conflicts_with = "no_due")]
        due: Option<String>,

        /// Create the task without a due date
        #[clap(long)]
        no_due: bool,

        /// Priority of the task
        #[clap(short, long, value_enum)]
        priority: Option<Priority>,

        /// Start from a template (see `templates`)
        #[clap(short = 'T', long)]
        template: Option<String>,
    },

    /// List tasks grouped by due date
    List {
        /// Filter by completion status
        #[clap(short, long, value_enum, default_value_t = StatusFilter::All)]
        status: StatusFilter,

        /// Filter by priority
        #[clap(short, long, value_enum, default_value_t = PriorityFilter::All)]
        priority: PriorityFilter,

        /// Filter by due date window
        #[clap(short, long, value_enum, default_value_t = DateFilter::All)]
        date: DateFilter,

        /// Case-insensitive text search
        #[clap(short = 'q', long)]
        search: Option<String>,

        /// Drop one filter again, e.g. one baked into a shell alias (repeatable)
        #[clap(long, value_enum)]
        without: Vec<FilterKind>,

        /// Ignore every filter given above
        #[clap(long)]
        no_filters: bool,

        /// Show a single sorted list instead of date groups
        #[clap(long)]
        flat: bool,

        /// Format output as JSON
        #[clap(short, long)]
        json: bool,
    },

    /// Edit an existing task
    Edit {
        /// ID of the task to edit
        id: TaskId,

        /// New text for the task
        #[clap(short = 'T', long)]
        task: Option<String>,

        /// New due date (YYYY-MM-DD HH:MM)
        #[clap(short, long, conflicts_with = "clear_due")]
        due: Option<String>,

        /// Remove the due date
        #[clap(long)]
        clear_due: bool,

        /// New priority
        #[clap(short, long, value_enum)]
        priority: Option<Priority>,
    },

    /// Toggle completion of a task
    Toggle {
        /// ID of the task
        id: TaskId,
    },

    /// Delete a task by ID
    Delete {
        /// ID of the task to delete
        id: TaskId,

        /// Skip confirmation prompt
        #[clap(short, long)]
        force: bool,
    },

    /// Show server reachability and list progress
    Status,

    /// Stay running and send reminders for tasks due soon
    Watch,

    /// List the available task templates
    Templates,

    /// Show or change the dark-mode preference
    Theme {
        #[clap(value_enum, default_value_t = ThemeSetting::Show)]
        setting: ThemeSetting,
    },

    /// Configuration management
    Config {
        /// Show current configuration
        #[clap(short = 'S', long)]
        show: bool,

        /// Update a configuration setting (key=value)
        #[clap(short, long)]
        set: Option<String>,

        /// Reset configuration to defaults
        #[clap(short, long)]
        reset: bool,
    },
}
