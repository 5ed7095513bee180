//! CLI module for the todo application
//!
//! This module turns commands into engine operations and renders the
//! resulting task list and notices.
use std::{
    io::{stdin, stdout, Write},
    path::PathBuf,
    sync::Arc,
};

use chrono::NaiveDateTime;
use console::Style;
use log::{debug, info};

use crate::{
    commit, compare_tasks, derive_view, drain_notices, format_due, is_past_due, local_now,
    parse_due_input, progress, Commands, Config, ConsoleNotifier, LocalCache, Notice, NoticeKind,
    NoticeReceiver, Priority, ReminderScheduler, Result, ServerStatus, SharedEngine, SyncState,
    Task, TaskDraft, TaskEdit, TaskId, TaskTemplate, ThemeSetting, TodoError, ViewFilters,
    TASK_TEMPLATES,
};

/// CLI Application handler - processes CLI commands and interfaces with the engine
pub struct App {
    /// The reconciliation engine
    engine: SharedEngine,

    /// Notices emitted by the engine
    notices: NoticeReceiver,

    /// Local cache, also holding the theme preference
    cache: LocalCache,

    /// Effective configuration (file, env and flags combined)
    config: Config,

    /// Where `config --set` writes
    config_path: PathBuf,

    dark_mode: bool,
}

impl App {
    pub fn new(
        engine: SharedEngine,
        notices: NoticeReceiver,
        cache: LocalCache,
        config: Config,
        config_path: PathBuf,
    ) -> Self {
        let dark_mode = cache.dark_mode();
        Self {
            engine,
            notices,
            cache,
            config,
            config_path,
            dark_mode,
        }
    }

    /// Run the CLI application with the given command
    pub async fn run(&mut self, command: Commands) -> Result<()> {
        let result = match command {
            Commands::Add {
                task,
                due,
                no_due,
                priority,
                template,
            } => self.handle_add(task, due, no_due, priority, template).await,

            Commands::List {
                status,
                priority,
                date,
                search,
                without,
                no_filters,
                flat,
                json,
            } => {
                let mut filters = ViewFilters {
                    status,
                    priority,
                    date,
                    search: search.unwrap_or_default(),
                };
                for kind in without {
                    filters.remove(kind);
                }
                if no_filters {
                    filters.clear();
                }
                self.handle_list(filters, flat, json).await
            }

            Commands::Edit {
                id,
                task,
                due,
                clear_due,
                priority,
            } => self.handle_edit(id, task, due, clear_due, priority).await,

            Commands::Toggle { id } => self.handle_toggle(id).await,

            Commands::Delete { id, force } => self.handle_delete(id, force).await,

            Commands::Status => self.handle_status().await,

            Commands::Watch => self.handle_watch().await,

            Commands::Templates => {
                self.show_templates();
                Ok(())
            }

            Commands::Theme { setting } => self.handle_theme(setting),

            Commands::Config { show, set, reset } => self.handle_config(show, set, reset),
        };

        let shown_validation = self.render_notices();
        if let Err(e) = &result {
            match e.notice_kind() {
                Some(NoticeKind::Validation) if shown_validation => {}
                Some(kind) => self.render_notice(&Notice::new(kind, e.to_string())),
                None => {}
            }
        }
        result
    }

    /// Startup sequence against the server and cache
    async fn load(&mut self) -> Result<()> {
        let count = self.engine.lock().await.initialize().await?;
        debug!("Task list ready with {} tasks", count);
        Ok(())
    }

    async fn handle_add(
        &mut self,
        task: Option<String>,
        due: Option<String>,
        no_due: bool,
        priority: Option<Priority>,
        template: Option<String>,
    ) -> Result<()> {
        let now = local_now();
        let mut draft = match template {
            Some(name) => TaskTemplate::find(&name)
                .ok_or_else(|| TodoError::validation(format!("Unknown template: {name}")))?
                .draft(now),
            None => TaskDraft::new(now),
        };
        if let Some(text) = task {
            draft.task = text;
        }
        if no_due {
            draft.due_date = None;
        } else if let Some(due) = due {
            draft.due_date = Some(parse_due_input(&due)?);
        }
        if let Some(priority) = priority {
            draft.priority = priority;
        }

        self.load().await?;

        let mutation = self.engine.lock().await.prepare_add(&draft)?;
        let provisional = mutation.task_id();
        commit(&self.engine, mutation).await?;

        let engine = self.engine.lock().await;
        let saved = engine
            .tasks()
            .into_iter()
            .find(|t| t.matches_text(&draft.task));
        match saved {
            Some(task) if engine.sync_state(task.id) == Some(SyncState::Synced) => {
                println!("Task added with ID: {}", task.id);
            }
            _ => println!("Task saved locally with ID: {}", provisional),
        }
        Ok(())
    }

    async fn handle_list(&mut self, filters: ViewFilters, flat: bool, json: bool) -> Result<()> {
        self.load().await?;

        let now = local_now();
        let (tasks, states) = {
            let engine = self.engine.lock().await;
            let tasks = engine.tasks();
            let states: Vec<Option<SyncState>> =
                tasks.iter().map(|t| engine.sync_state(t.id)).collect();
            (tasks, states)
        };
        let groups = derive_view(&tasks, &filters, now);

        if json {
            let buckets: Vec<serde_json::Value> = groups
                .iter()
                .map(|(bucket, members)| {
                    serde_json::json!({
                        "bucket": bucket.label(),
                        "tasks": members,
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&buckets)?);
            return Ok(());
        }

        let chips = filters.active();
        if !chips.is_empty() {
            let labels: Vec<String> = chips.into_iter().map(|c| c.label).collect();
            println!("Filters: {}", console::style(labels.join(", ")).cyan());
        }

        if groups.is_empty() {
            println!("No tasks found matching the criteria.");
            return Ok(());
        }

        let state_of = |id: TaskId| {
            tasks
                .iter()
                .position(|t| t.id == id)
                .and_then(|i| states[i])
        };

        if flat {
            let mut visible: Vec<&Task> = groups.iter().flat_map(|(_, m)| m.iter()).collect();
            visible.sort_by(|a, b| compare_tasks(a, b));
            for task in visible {
                self.print_task(task, state_of(task.id), now);
            }
        } else {
            let width = terminal_width();
            for (bucket, members) in groups.iter().filter(|(_, m)| !m.is_empty()) {
                println!(
                    "\n{} ({})",
                    console::style(bucket.label()).bold().underlined(),
                    members.len()
                );
                println!("{}", "-".repeat(width.min(50)));
                for task in members {
                    self.print_task(task, state_of(task.id), now);
                }
            }
        }

        println!(
            "\n{} task{} shown, {}% of all tasks completed",
            groups.len(),
            if groups.len() == 1 { "" } else { "s" },
            progress(&tasks)
        );
        Ok(())
    }

    fn print_task(&self, task: &Task, state: Option<SyncState>, now: NaiveDateTime) {
        let check = if task.completed { "[x]" } else { "[ ]" };
        let text = if task.completed {
            console::style(task.task.as_str()).dim().strikethrough()
        } else {
            console::style(task.task.as_str())
        };
        let priority = self
            .priority_style(task.priority)
            .apply_to(format!("{:<6}", task.priority.label()));
        let due = match task.due_date {
            Some(due) if is_past_due(due, now) && !task.completed => {
                console::style(format!("due {}", format_due(due, now))).red().to_string()
            }
            Some(due) => format!("due {}", format_due(due, now)),
            None => String::new(),
        };
        let marker = match state {
            Some(SyncState::LocalOnly) => " (local only)",
            Some(SyncState::PendingCreate) | Some(SyncState::PendingUpdate) => " (syncing)",
            _ => "",
        };

        println!("{} {:>14}  {}  {}  {}{}", check, task.id, priority, text, due, marker);
    }

    fn priority_style(&self, priority: Priority) -> Style {
        let style = Style::new();
        match (priority, self.dark_mode) {
            (Priority::High, false) => style.red(),
            (Priority::High, true) => style.red().bright(),
            (Priority::Medium, false) => style.yellow(),
            (Priority::Medium, true) => style.yellow().bright(),
            (Priority::Low, false) => style.green(),
            (Priority::Low, true) => style.green().bright(),
        }
    }

    async fn handle_edit(
        &mut self,
        id: TaskId,
        task: Option<String>,
        due: Option<String>,
        clear_due: bool,
        priority: Option<Priority>,
    ) -> Result<()> {
        let new_due = due.as_deref().map(parse_due_input).transpose()?;

        self.load().await?;

        let mut edit = {
            let engine = self.engine.lock().await;
            let current = engine.get(id).ok_or(TodoError::UnknownTask { id })?;
            TaskEdit::from(current)
        };
        if let Some(text) = task {
            edit.task = text;
        }
        if clear_due {
            edit.due_date = None;
        } else if new_due.is_some() {
            edit.due_date = new_due;
        }
        if let Some(priority) = priority {
            edit.priority = priority;
        }

        let mutation = self.engine.lock().await.prepare_update(id, &edit)?;
        commit(&self.engine, mutation).await?;

        if self.engine.lock().await.sync_state(id) == Some(SyncState::Synced) {
            println!("Task {} updated successfully", id);
        }
        Ok(())
    }

    async fn handle_toggle(&mut self, id: TaskId) -> Result<()> {
        self.load().await?;
        let completed = self.engine.lock().await.toggle_completion(id)?;
        println!(
            "Task {} marked as {}",
            id,
            if completed { "completed" } else { "active" }
        );
        Ok(())
    }

    async fn handle_delete(&mut self, id: TaskId, force: bool) -> Result<()> {
        self.load().await?;

        // Step 1: ask the engine to open the confirmation dialog
        self.engine.lock().await.request_delete(id)?;
        let mut prompt = None;
        for notice in drain_notices(&mut self.notices) {
            if notice.kind == NoticeKind::ConfirmDelete && notice.task_id == Some(id) {
                prompt = Some(notice.message);
            } else {
                self.render_notice(&notice);
            }
        }

        // Step 2: resolve it
        let confirmed = force || self.prompt_confirmation(prompt.as_deref())?;
        if !confirmed {
            self.engine.lock().await.cancel_delete(id)?;
            println!("Deletion cancelled.");
            return Ok(());
        }

        // Step 3: remove locally, then tell the server
        let mutation = self.engine.lock().await.confirm_delete(id)?;
        commit(&self.engine, mutation).await
    }

    fn prompt_confirmation(&self, message: Option<&str>) -> Result<bool> {
        println!(
            "{}",
            message.unwrap_or("Are you sure you want to delete this task?")
        );
        print!("Continue? [y/N]: ");
        stdout().flush().map_err(TodoError::Io)?;

        let mut input = String::new();
        stdin().read_line(&mut input).map_err(TodoError::Io)?;

        let input = input.trim().to_lowercase();
        Ok(input == "y" || input == "yes")
    }

    async fn handle_status(&mut self) -> Result<()> {
        self.load().await?;
        let engine = self.engine.lock().await;
        let tasks = engine.tasks();
        let status = engine.server_status();
        let status_label = match status {
            ServerStatus::Online => console::style(status.label()).green(),
            ServerStatus::Offline => console::style(status.label()).red(),
            ServerStatus::Checking => console::style(status.label()).yellow(),
        };

        println!("Server:   {} ({})", status_label, self.config.api_url);
        println!("Cache:    {}", self.cache.dir().display());
        println!("Tasks:    {}", tasks.len());
        println!("Progress: {}% completed", progress(&tasks));
        println!("Theme:    {}", if self.dark_mode { "dark" } else { "light" });
        Ok(())
    }

    async fn handle_watch(&mut self) -> Result<()> {
        self.load().await?;
        let _ = self.render_notices();

        let mut scheduler = ReminderScheduler::new(self.config.clone(), Arc::new(ConsoleNotifier));
        scheduler.set_engine(&self.engine);
        scheduler.start().await?;
        if !self.config.reminders_enabled {
            println!("Reminders are disabled in the configuration.");
            return Ok(());
        }
        scheduler.check_now().await?;

        println!(
            "Watching {} tasks for reminders. Press Ctrl-C to stop.",
            self.engine.lock().await.tasks().len()
        );
        tokio::signal::ctrl_c().await?;

        scheduler.stop().await?;
        let status = scheduler.get_status().await;
        info!("Sent {} reminders this session", status.reminders_sent);
        println!("Stopped. {} reminders sent.", status.reminders_sent);
        Ok(())
    }

    fn show_templates(&self) {
        let now = local_now();
        for template in TASK_TEMPLATES.iter() {
            let draft = template.draft(now);
            let due = draft
                .due_date
                .map(|d| format_due(d, now))
                .unwrap_or_default();
            println!(
                "{:<18} {}  due {}",
                template.task,
                self.priority_style(template.priority)
                    .apply_to(format!("{:<6}", template.priority.label())),
                due
            );
        }
    }

    fn handle_theme(&mut self, setting: ThemeSetting) -> Result<()> {
        let enabled = match setting {
            ThemeSetting::Show => {
                println!("Dark mode is {}", if self.dark_mode { "on" } else { "off" });
                return Ok(());
            }
            ThemeSetting::Dark => true,
            ThemeSetting::Light => false,
            ThemeSetting::Toggle => !self.dark_mode,
        };
        self.cache.set_dark_mode(enabled)?;
        self.dark_mode = enabled;
        println!("Dark mode {}", if enabled { "enabled" } else { "disabled" });
        Ok(())
    }

    fn handle_config(&mut self, show: bool, set: Option<String>, reset: bool) -> Result<()> {
        if reset {
            Config::default().save(&self.config_path)?;
            println!("Configuration reset to defaults");
            return Ok(());
        }

        if let Some(assignment) = set {
            let (key, value) = assignment.split_once('=').ok_or_else(|| {
                TodoError::ConfigError {
                    message: format!("Expected key=value, got {assignment}"),
                }
            })?;
            let mut file_config = Config::load(&self.config_path)?;
            file_config.set(key, value)?;
            file_config.save(&self.config_path)?;
            println!("Set {} = {}", key.trim(), value.trim());
            return Ok(());
        }

        if !show {
            debug!("No config action given, showing configuration");
        }
        println!("# {}", self.config_path.display());
        println!("{}", serde_json::to_string_pretty(&self.config)?);
        Ok(())
    }

    /// Prints queued notices; returns whether any was a validation notice.
    fn render_notices(&mut self) -> bool {
        let mut validation = false;
        for notice in drain_notices(&mut self.notices) {
            validation |= notice.kind == NoticeKind::Validation;
            self.render_notice(&notice);
        }
        validation
    }

    fn render_notice(&self, notice: &Notice) {
        let (label, style) = match notice.kind {
            NoticeKind::Validation => ("Invalid", Style::new().yellow().bold()),
            NoticeKind::ConfirmDelete => ("Confirm", Style::new().magenta().bold()),
            NoticeKind::Success => ("Done", Style::new().green().bold()),
            NoticeKind::Error => ("Error", Style::new().red().bold()),
            NoticeKind::Info => ("Info", Style::new().cyan().bold()),
        };
        println!("{} {}", style.apply_to(format!("{label}:")), notice.message);
    }
}

fn terminal_width() -> usize {
    terminal_size::terminal_size()
        .map(|(w, _)| w.0 as usize)
        .unwrap_or(80)
}
