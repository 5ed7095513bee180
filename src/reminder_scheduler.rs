// src/reminder_scheduler.rs - Due-soon reminder scheduler
use std::sync::{Arc, Weak};

use chrono::{DateTime, NaiveDateTime, Utc};
use log::{debug, error, info};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time;

use crate::{capitalize_first_word, local_now, Config, Result, SyncEngine, Task, TaskId, TodoError};

/// A reminder for a task entering the due-soon window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reminder {
    pub task_id: TaskId,
    pub text: String,
    pub minutes_remaining: i64,
}

impl Reminder {
    pub fn message(&self) -> String {
        format!(
            "\"{}\" is due in {} minutes!",
            self.text, self.minutes_remaining
        )
    }
}

/// Selects open, not-yet-notified tasks with `0 < due - now <= window`.
pub fn due_soon(tasks: &[Task], now: NaiveDateTime, window: chrono::Duration) -> Vec<Reminder> {
    tasks
        .iter()
        .filter(|task| !task.completed && !task.notified)
        .filter_map(|task| {
            let remaining = task.due_date? - now;
            if remaining > chrono::Duration::zero() && remaining <= window {
                Some(Reminder {
                    task_id: task.id,
                    text: capitalize_first_word(&task.task),
                    minutes_remaining: remaining.num_minutes(),
                })
            } else {
                None
            }
        })
        .collect()
}

/// The host's notification facility.
pub trait Notifier: Send + Sync {
    fn notify(&self, reminder: &Reminder);
}

/// Prints reminders to the terminal.
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notify(&self, reminder: &Reminder) {
        info!("Reminder for task {}: {}", reminder.task_id, reminder.message());
        println!(
            "{} {}",
            console::style("Task Due Soon:").yellow().bold(),
            reminder.message()
        );
    }
}

#[derive(Debug, Clone)]
pub struct ReminderSchedulerStatus {
    /// Whether the scheduler is running
    pub is_running: bool,
    /// When the last scan ran
    pub last_check_time: Option<DateTime<Utc>>,
    /// Reminders sent since start
    pub reminders_sent: usize,
}

#[derive(Debug, Clone)]
pub enum ReminderCommand {
    /// Scan immediately
    CheckNow,
    /// Stop the reminder scheduler
    Stop,
}

pub struct ReminderScheduler {
    /// Configuration for the scheduler
    config: Config,

    /// Channel to send commands to the scheduler task
    command_tx: mpsc::Sender<ReminderCommand>,

    /// Handle to the scheduler task
    scheduler_task: Option<JoinHandle<()>>,

    /// Status shared with the scheduler task
    status: Arc<Mutex<ReminderSchedulerStatus>>,

    /// Weak reference to the engine
    engine: Option<Weak<Mutex<SyncEngine>>>,

    notifier: Arc<dyn Notifier>,
}

impl ReminderScheduler {
    /// Create a new reminder scheduler with the provided config
    pub fn new(config: Config, notifier: Arc<dyn Notifier>) -> Self {
        debug!(
            "Initializing reminder scheduler: every {}s, window {} min",
            config.reminder_interval_secs, config.due_soon_minutes
        );
        let (command_tx, _) = mpsc::channel(10);

        Self {
            config,
            command_tx,
            scheduler_task: None,
            status: Arc::new(Mutex::new(ReminderSchedulerStatus {
                is_running: false,
                last_check_time: None,
                reminders_sent: 0,
            })),
            engine: None,
            notifier,
        }
    }

    /// Set the weak reference to the engine
    pub fn set_engine(&mut self, engine: &Arc<Mutex<SyncEngine>>) {
        self.engine = Some(Arc::downgrade(engine));
    }

    /// Start the reminder scheduler
    pub async fn start(&mut self) -> Result<()> {
        if !self.config.reminders_enabled {
            info!("Reminders are disabled, scheduler not started");
            return Ok(());
        }
        if self.scheduler_task.is_some() {
            debug!("Reminder scheduler already running");
            return Ok(());
        }

        let engine = self
            .engine
            .as_ref()
            .ok_or_else(|| TodoError::SchedulerError {
                message: "ReminderScheduler does not have an engine reference.".to_string(),
            })?
            .clone();
        if engine.upgrade().is_none() {
            error!("Engine reference is no longer valid.");
            return Err(TodoError::SchedulerError {
                message: "Engine reference is no longer valid.".to_string(),
            });
        }

        let (command_tx, mut command_rx) = mpsc::channel(10);
        self.command_tx = command_tx;

        let period = self.config.reminder_interval();
        let window = self.config.due_soon_window();
        let notifier = Arc::clone(&self.notifier);
        let status = Arc::clone(&self.status);

        let task = tokio::spawn(async move {
            let mut interval = time::interval(period);
            interval.tick().await; // Initial tick

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        if !run_check(&engine, notifier.as_ref(), &status, window).await {
                            break;
                        }
                    }
                    Some(cmd) = command_rx.recv() => match cmd {
                        ReminderCommand::CheckNow => {
                            if !run_check(&engine, notifier.as_ref(), &status, window).await {
                                break;
                            }
                        }
                        ReminderCommand::Stop => {
                            info!("Reminder scheduler stopping...");
                            break;
                        }
                    }
                }
            }
        });

        self.scheduler_task = Some(task);
        self.status.lock().await.is_running = true;
        info!("Reminder scheduler started (every {}s)", period.as_secs());

        Ok(())
    }

    /// Stop the reminder scheduler if it's running
    pub async fn stop(&mut self) -> Result<()> {
        if let Some(task) = self.scheduler_task.take() {
            if let Err(e) = self.command_tx.send(ReminderCommand::Stop).await {
                debug!("Reminder task already finished: {}", e);
            }

            if let Err(e) = task.await {
                let error_msg = format!("Failed to stop reminder scheduler: {}", e);
                error!("{}", error_msg);
                return Err(TodoError::SchedulerError { message: error_msg });
            }

            self.status.lock().await.is_running = false;
            info!("Reminder scheduler stopped");
        } else {
            debug!("Reminder scheduler is not running");
        }

        Ok(())
    }

    /// Run a scan immediately, regardless of the schedule
    pub async fn check_now(&self) -> Result<()> {
        if self.scheduler_task.is_none() {
            return Err(TodoError::SchedulerError {
                message: "Reminder scheduler is not running".to_string(),
            });
        }

        self.command_tx
            .send(ReminderCommand::CheckNow)
            .await
            .map_err(|e| TodoError::SchedulerError {
                message: format!("Failed to send check command: {}", e),
            })
    }

    /// Get the current status of the reminder scheduler
    pub async fn get_status(&self) -> ReminderSchedulerStatus {
        self.status.lock().await.clone()
    }
}

/// One scan. Returns false once the engine has been dropped.
async fn run_check(
    engine: &Weak<Mutex<SyncEngine>>,
    notifier: &dyn Notifier,
    status: &Mutex<ReminderSchedulerStatus>,
    window: chrono::Duration,
) -> bool {
    let Some(engine) = engine.upgrade() else {
        info!("Task list is gone, reminder scheduler exiting");
        return false;
    };

    let reminders = engine.lock().await.collect_reminders(local_now(), window);
    for reminder in &reminders {
        notifier.notify(reminder);
    }

    let mut status = status.lock().await;
    status.last_check_time = Some(Utc::now());
    status.reminders_sent += reminders.len();
    true
}
