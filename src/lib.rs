//! To-do list client library
//!
//! This library keeps a task list reconciled between a remote REST task
//! service and a local JSON cache, derives filtered and date-grouped views
//! of it, and sends reminders for tasks that are due soon.

mod cli;
mod config;
mod errors;
mod helper;
mod notice;
mod reminder_scheduler;
mod remote;
mod storage;
mod sync;
mod task;
mod types;
mod view;

// Re-export key components
pub use cli::*;
pub use config::*;
pub use errors::*;
pub use helper::*;
pub use notice::*;
pub use reminder_scheduler::*;
pub use remote::*;
pub use storage::*;
pub use sync::*;
pub use task::*;
pub use types::*;
pub use view::*;
