use std::collections::HashSet;

use chrono::{Local, NaiveDateTime, Timelike, Utc};

use crate::{due_date, Result, TaskId, TodoError};

/// Current local wall-clock time, the reference for due dates.
pub fn local_now() -> NaiveDateTime {
    Local::now().naive_local()
}

/// Drops seconds and sub-seconds; due dates carry minute precision.
pub fn truncate_to_minute(value: NaiveDateTime) -> NaiveDateTime {
    value
        .with_second(0)
        .and_then(|v| v.with_nanosecond(0))
        .unwrap_or(value)
}

/// Parses a due date typed by the user ("2024-05-01T14:30" or "2024-05-01 14:30").
pub fn parse_due_input(input: &str) -> Result<NaiveDateTime> {
    due_date::parse(input.trim())
        .map(truncate_to_minute)
        .map_err(|message| TodoError::validation(format!("{message} (expected YYYY-MM-DD HH:MM)")))
}

/// Returns a timestamp-based id that is not in `taken`.
pub fn fresh_task_id(taken: &HashSet<TaskId>) -> TaskId {
    let mut id = Utc::now().timestamp_millis();
    while taken.contains(&id) {
        id += 1;
    }
    id
}

pub fn capitalize_first_word(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn parses_both_due_date_spellings() {
        let expected = NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_opt(14, 30, 0)
            .unwrap();
        assert_eq!(parse_due_input("2024-05-01T14:30").unwrap(), expected);
        assert_eq!(parse_due_input(" 2024-05-01 14:30 ").unwrap(), expected);
        assert_eq!(parse_due_input("2024-05-01T14:30:59").unwrap(), expected);
        assert!(parse_due_input("tomorrow").unwrap_err().is_validation());
    }

    #[test]
    fn fresh_id_skips_taken_values() {
        let first = fresh_task_id(&HashSet::new());
        let taken: HashSet<TaskId> = (first..first + 50).collect();
        let id = fresh_task_id(&taken);
        assert!(!taken.contains(&id));
        assert!(id >= first);
    }

    #[test]
    fn capitalizes_only_the_first_letter() {
        assert_eq!(capitalize_first_word("water the plants"), "Water the plants");
        assert_eq!(capitalize_first_word(""), "");
    }
}
