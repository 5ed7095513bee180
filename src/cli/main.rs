use std::path::PathBuf;

use clap::Parser;

use crate::Commands;

/// Main CLI application arguments and command structure
#[derive(Parser)]
#[clap(
    name = "todo",
    version,
    about = "To-do list client with offline cache and due-date reminders"
)]
pub struct Cli {
    /// Path to the configuration file
    #[clap(short = 'c', long, value_parser)]
    pub config: Option<PathBuf>,

    /// Directory for the local task cache
    #[clap(long, value_parser)]
    pub data_dir: Option<PathBuf>,

    /// Base URL of the task service
    #[clap(long, value_parser)]
    pub api_url: Option<String>,

    /// Verbose output mode
    #[clap(short, long)]
    pub verbose: bool,

    /// Subcommands for the todo application
    #[clap(subcommand)]
    pub command: Commands,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FilterKind, StatusFilter};

    #[test]
    fn list_accepts_repeated_filter_removals() {
        let cli = Cli::try_parse_from([
            "todo", "list", "-s", "active", "-q", "milk", "--without", "status", "--without",
            "search",
        ])
        .unwrap();

        match cli.command {
            Commands::List {
                status,
                search,
                without,
                no_filters,
                ..
            } => {
                assert_eq!(status, StatusFilter::Active);
                assert_eq!(search.as_deref(), Some("milk"));
                assert_eq!(without, vec![FilterKind::Status, FilterKind::Search]);
                assert!(!no_filters);
            }
            _ => panic!("expected the list command"),
        }
    }
}
