//! View derivation: filtering, sorting and date grouping of the task list.
//!
//! Everything here is a pure function of the task slice, the active filters
//! and the reference time `now` (local wall-clock).
use std::cmp::Ordering;

use chrono::{Duration, NaiveDateTime, NaiveTime};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::{Priority, Task};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "camelCase")]
pub enum StatusFilter {
    #[default]
    All,
    Active,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "camelCase")]
pub enum PriorityFilter {
    #[default]
    All,
    High,
    Medium,
    Low,
}

impl PriorityFilter {
    fn matches(self, priority: Priority) -> bool {
        match self {
            PriorityFilter::All => true,
            PriorityFilter::High => priority == Priority::High,
            PriorityFilter::Medium => priority == Priority::Medium,
            PriorityFilter::Low => priority == Priority::Low,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "camelCase")]
pub enum DateFilter {
    #[default]
    All,
    Today,
    Tomorrow,
    ThisWeek,
    Overdue,
}

/// What the list is currently narrowed down to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewFilters {
    pub status: StatusFilter,
    pub priority: PriorityFilter,
    pub date: DateFilter,
    pub search: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FilterKind {
    Status,
    Priority,
    Date,
    Search,
}

/// A filter that differs from its default, with a display label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveFilter {
    pub kind: FilterKind,
    pub label: String,
}

impl ViewFilters {
    pub fn active(&self) -> Vec<ActiveFilter> {
        let mut filters = Vec::new();

        match self.status {
            StatusFilter::All => {}
            StatusFilter::Active => filters.push(chip(FilterKind::Status, "Active")),
            StatusFilter::Completed => filters.push(chip(FilterKind::Status, "Completed")),
        }

        let priority_label = match self.priority {
            PriorityFilter::All => None,
            PriorityFilter::High => Some(Priority::High.label()),
            PriorityFilter::Medium => Some(Priority::Medium.label()),
            PriorityFilter::Low => Some(Priority::Low.label()),
        };
        if let Some(label) = priority_label {
            filters.push(chip(FilterKind::Priority, label));
        }

        let date_label = match self.date {
            DateFilter::All => None,
            DateFilter::Today => Some("Today"),
            DateFilter::Tomorrow => Some("Tomorrow"),
            DateFilter::ThisWeek => Some("This Week"),
            DateFilter::Overdue => Some("Overdue"),
        };
        if let Some(label) = date_label {
            filters.push(chip(FilterKind::Date, label));
        }

        if !self.search.is_empty() {
            filters.push(chip(FilterKind::Search, &format!("Search: \"{}\"", self.search)));
        }

        filters
    }

    pub fn remove(&mut self, kind: FilterKind) {
        match kind {
            FilterKind::Status => self.status = StatusFilter::All,
            FilterKind::Priority => self.priority = PriorityFilter::All,
            FilterKind::Date => self.date = DateFilter::All,
            FilterKind::Search => self.search.clear(),
        }
    }

    pub fn clear(&mut self) {
        *self = ViewFilters::default();
    }
}

fn chip(kind: FilterKind, label: &str) -> ActiveFilter {
    ActiveFilter {
        kind,
        label: label.to_string(),
    }
}

/// Window boundaries derived from local midnight of `now`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindows {
    pub midnight: NaiveDateTime,
    pub tomorrow: NaiveDateTime,
    pub day_after: NaiveDateTime,
    pub next_week: NaiveDateTime,
}

impl DateWindows {
    pub fn new(now: NaiveDateTime) -> Self {
        let midnight = now.date().and_time(NaiveTime::MIN);
        let tomorrow = midnight + Duration::days(1);
        Self {
            midnight,
            tomorrow,
            day_after: tomorrow + Duration::hours(24),
            next_week: midnight + Duration::days(7),
        }
    }

    fn is_overdue(&self, task: &Task, due: NaiveDateTime) -> bool {
        due < self.midnight && !task.completed
    }

    fn is_today(&self, due: NaiveDateTime) -> bool {
        due >= self.midnight && due < self.tomorrow
    }

    fn is_tomorrow(&self, due: NaiveDateTime) -> bool {
        due >= self.tomorrow && due < self.day_after
    }

    fn matches(&self, filter: DateFilter, task: &Task) -> bool {
        if filter == DateFilter::All {
            return true;
        }
        let Some(due) = task.due_date else {
            return false;
        };
        match filter {
            DateFilter::All => true,
            DateFilter::Today => self.is_today(due),
            DateFilter::Tomorrow => self.is_tomorrow(due),
            DateFilter::ThisWeek => due >= self.midnight && due < self.next_week,
            DateFilter::Overdue => self.is_overdue(task, due),
        }
    }

    /// The bucket a task belongs in; total and mutually exclusive.
    pub fn bucket(&self, task: &Task) -> Bucket {
        let Some(due) = task.due_date else {
            return Bucket::NoDate;
        };
        if self.is_overdue(task, due) {
            Bucket::Overdue
        } else if self.is_today(due) {
            Bucket::Today
        } else if self.is_tomorrow(due) {
            Bucket::Tomorrow
        } else if due >= self.tomorrow && due < self.next_week {
            Bucket::ThisWeek
        } else {
            Bucket::Later
        }
    }
}

/// Applies status, priority, date window and text search, in that order.
pub fn filter_tasks(tasks: &[Task], filters: &ViewFilters, now: NaiveDateTime) -> Vec<Task> {
    let windows = DateWindows::new(now);
    let needle = filters.search.to_lowercase();

    tasks
        .iter()
        .filter(|task| match filters.status {
            StatusFilter::All => true,
            StatusFilter::Active => !task.completed,
            StatusFilter::Completed => task.completed,
        })
        .filter(|task| filters.priority.matches(task.priority))
        .filter(|task| windows.matches(filters.date, task))
        .filter(|task| needle.is_empty() || task.task.to_lowercase().contains(&needle))
        .cloned()
        .collect()
}

/// Priority descending, then due date ascending with undated tasks last.
pub fn compare_tasks(a: &Task, b: &Task) -> Ordering {
    b.priority
        .weight()
        .cmp(&a.priority.weight())
        .then_with(|| match (a.due_date, b.due_date) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
}

pub fn sort_tasks(tasks: &mut [Task]) {
    tasks.sort_by(compare_tasks);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bucket {
    Overdue,
    Today,
    Tomorrow,
    ThisWeek,
    Later,
    NoDate,
}

impl Bucket {
    pub const ALL: [Bucket; 6] = [
        Bucket::Overdue,
        Bucket::Today,
        Bucket::Tomorrow,
        Bucket::ThisWeek,
        Bucket::Later,
        Bucket::NoDate,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Bucket::Overdue => "Overdue",
            Bucket::Today => "Today",
            Bucket::Tomorrow => "Tomorrow",
            Bucket::ThisWeek => "This Week",
            Bucket::Later => "Later",
            Bucket::NoDate => "No Due Date",
        }
    }

    fn index(self) -> usize {
        match self {
            Bucket::Overdue => 0,
            Bucket::Today => 1,
            Bucket::Tomorrow => 2,
            Bucket::ThisWeek => 3,
            Bucket::Later => 4,
            Bucket::NoDate => 5,
        }
    }
}

/// The six date buckets, each keeping the order tasks were inserted in.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskGroups {
    buckets: [Vec<Task>; 6],
}

impl TaskGroups {
    pub fn get(&self, bucket: Bucket) -> &[Task] {
        &self.buckets[bucket.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = (Bucket, &[Task])> {
        Bucket::ALL.into_iter().map(move |b| (b, self.get(b)))
    }

    pub fn len(&self) -> usize {
        self.buckets.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub fn group_tasks(tasks: Vec<Task>, now: NaiveDateTime) -> TaskGroups {
    let windows = DateWindows::new(now);
    let mut groups = TaskGroups::default();
    for task in tasks {
        let bucket = windows.bucket(&task);
        groups.buckets[bucket.index()].push(task);
    }
    groups
}

/// Filter, sort, then group.
pub fn derive_view(tasks: &[Task], filters: &ViewFilters, now: NaiveDateTime) -> TaskGroups {
    let mut visible = filter_tasks(tasks, filters, now);
    sort_tasks(&mut visible);
    group_tasks(visible, now)
}

/// Percentage of completed tasks, rounded.
pub fn progress(tasks: &[Task]) -> u8 {
    if tasks.is_empty() {
        return 0;
    }
    let completed = tasks.iter().filter(|t| t.completed).count();
    ((completed as f64 / tasks.len() as f64) * 100.0).round() as u8
}

pub fn is_past_due(due: NaiveDateTime, now: NaiveDateTime) -> bool {
    due < now
}

/// "Today, 14:30", "Tomorrow, 09:00" or "2024-05-01 14:30".
pub fn format_due(due: NaiveDateTime, now: NaiveDateTime) -> String {
    let time = due.format("%H:%M");
    if due.date() == now.date() {
        format!("Today, {}", time)
    } else if Some(due.date()) == now.date().succ_opt() {
        format!("Tomorrow, {}", time)
    } else {
        due.format("%Y-%m-%d %H:%M").to_string()
    }
}
