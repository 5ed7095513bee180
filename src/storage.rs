use std::{
    collections::HashSet,
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use log::{debug, error, info, trace, warn};
use serde_json::Value;
use tempfile::NamedTempFile;

use crate::{fresh_task_id, Result, Task, TaskId, TodoError};

/// Key under which the task collection is cached.
pub const TASKS_KEY: &str = "todos";

/// Key under which the dark-mode preference is stored.
pub const DARK_MODE_KEY: &str = "darkMode";

/// Persistent key-value store holding the offline copy of the task list.
///
/// Every key is one human-readable JSON file inside the cache directory.
/// Writes replace the whole value.
#[derive(Debug, Clone)]
pub struct LocalCache {
    dir: PathBuf,
}

impl LocalCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn key_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }

    /// Reads the raw value stored under `key`.
    pub fn get(&self, key: &str) -> Option<String> {
        let path = self.key_path(key);
        match fs::read_to_string(&path) {
            Ok(content) => Some(content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                warn!("Failed to read {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Stores `value` under `key` using an atomic replace.
    pub fn set(&self, key: &str, value: &str) -> Result<()> {
        if !self.dir.exists() {
            debug!("Creating cache directory: {}", self.dir.display());
            fs::create_dir_all(&self.dir).map_err(|e| {
                error!("Failed to create cache directory: {}", e);
                TodoError::DirectoryError {
                    path: self.dir.clone(),
                }
            })?;
        }

        let path = self.key_path(key);
        let mut temp_file = NamedTempFile::new_in(&self.dir).map_err(|e| {
            error!("Failed to create temporary file: {}", e);
            TodoError::Io(e)
        })?;

        trace!("Writing {} bytes for key {}", value.len(), key);
        temp_file.write_all(value.as_bytes())?;
        temp_file.flush()?;

        temp_file.persist(&path).map_err(|e| {
            error!("Failed to persist file {}: {}", path.display(), e.error);
            TodoError::Io(e.error)
        })?;

        Ok(())
    }

    /// Loads the cached collection; a missing or malformed cache is treated as absent.
    pub fn load(&self) -> Option<Vec<Task>> {
        let content = self.get(TASKS_KEY)?;
        match serde_json::from_str::<Vec<Task>>(&content) {
            Ok(tasks) => {
                debug!("Loaded {} tasks from cache", tasks.len());
                Some(tasks)
            }
            Err(e) => {
                warn!("Ignoring malformed task cache: {}", e);
                None
            }
        }
    }

    /// Overwrites the cached collection.
    pub fn save(&self, tasks: &[Task]) -> Result<()> {
        let json = serde_json::to_string_pretty(tasks)?;
        self.set(TASKS_KEY, &json)?;
        trace!("Cached {} tasks", tasks.len());
        Ok(())
    }

    /// Repairs the cached collection left by a previous run.
    ///
    /// Records without a usable id or that no longer parse are dropped, and
    /// colliding ids are replaced with fresh timestamp ids. Returns the
    /// number of records that were dropped or re-keyed.
    pub fn clean(&self) -> Result<usize> {
        let Some(content) = self.get(TASKS_KEY) else {
            return Ok(0);
        };

        let records: Vec<Value> = match serde_json::from_str(&content) {
            Ok(records) => records,
            Err(e) => {
                warn!("Task cache is not a JSON array, leaving it untouched: {}", e);
                return Ok(0);
            }
        };

        let total = records.len();
        let mut changed = 0;
        let mut seen: HashSet<TaskId> = HashSet::with_capacity(total);
        let mut cleaned = Vec::with_capacity(total);

        for record in records {
            if !has_usable_id(&record) {
                debug!("Dropping cached record without id");
                changed += 1;
                continue;
            }

            let mut task: Task = match serde_json::from_value(record) {
                Ok(task) => task,
                Err(e) => {
                    warn!("Dropping unreadable cached record: {}", e);
                    changed += 1;
                    continue;
                }
            };

            if seen.contains(&task.id) {
                let fallback = fresh_task_id(&seen);
                warn!("Cached id {} collides, re-keying as {}", task.id, fallback);
                task.id = fallback;
                changed += 1;
            }

            seen.insert(task.id);
            cleaned.push(task);
        }

        if changed > 0 {
            self.save(&cleaned)?;
            info!("Cleaned task cache: {} of {} records repaired", changed, total);
        }

        Ok(changed)
    }

    /// Dark-mode preference; false when never set.
    pub fn dark_mode(&self) -> bool {
        self.get(DARK_MODE_KEY)
            .and_then(|raw| serde_json::from_str::<bool>(&raw).ok())
            .unwrap_or(false)
    }

    pub fn set_dark_mode(&self, enabled: bool) -> Result<()> {
        self.set(DARK_MODE_KEY, &serde_json::to_string(&enabled)?)?;
        info!("Dark mode {}", if enabled { "enabled" } else { "disabled" });
        Ok(())
    }
}

fn has_usable_id(record: &Value) -> bool {
    match record.get("id") {
        Some(Value::Number(n)) => n.as_i64().is_some_and(|id| id != 0),
        Some(Value::String(s)) => !s.trim().is_empty(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Priority, RemoteTask};
    use serde_json::json;

    fn cache() -> (tempfile::TempDir, LocalCache) {
        let dir = tempfile::tempdir().unwrap();
        let cache = LocalCache::new(dir.path().join("store"));
        (dir, cache)
    }

    fn task(id: TaskId, text: &str) -> Task {
        Task::from_remote(RemoteTask {
            id,
            task: text.to_string(),
            created_at: None,
        })
    }

    #[test]
    fn absent_cache_loads_as_none() {
        let (_dir, cache) = cache();
        assert!(cache.load().is_none());
        assert_eq!(cache.clean().unwrap(), 0);
    }

    #[test]
    fn save_overwrites_whole_collection() {
        let (_dir, cache) = cache();
        cache.save(&[task(1, "a"), task(2, "b")]).unwrap();
        cache.save(&[task(3, "c")]).unwrap();

        let loaded = cache.load().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id, 3);
    }

    #[test]
    fn malformed_cache_is_treated_as_absent() {
        let (_dir, cache) = cache();
        cache.set(TASKS_KEY, "{not json").unwrap();
        assert!(cache.load().is_none());
    }

    #[test]
    fn clean_drops_missing_ids_and_rekeys_collisions() {
        let (_dir, cache) = cache();
        let raw = json!([
            {"id": 5, "task": "first", "priority": "high"},
            {"task": "no id"},
            {"id": null, "task": "null id"},
            {"id": 5, "task": "duplicate"},
            {"id": 9, "task": "second"}
        ]);
        cache.set(TASKS_KEY, &raw.to_string()).unwrap();

        let changed = cache.clean().unwrap();
        assert_eq!(changed, 3);

        let tasks = cache.load().unwrap();
        assert_eq!(tasks.len(), 3);
        assert_eq!(tasks[0].id, 5);
        assert_eq!(tasks[0].priority, Priority::High);
        assert_ne!(tasks[1].id, 5);
        assert_eq!(tasks[1].task, "duplicate");
        assert_eq!(tasks[2].id, 9);

        let ids: HashSet<TaskId> = tasks.iter().map(|t| t.id).collect();
        assert_eq!(ids.len(), 3);
    }

    #[test]
    fn dark_mode_defaults_off_and_persists() {
        let (_dir, cache) = cache();
        assert!(!cache.dark_mode());
        cache.set_dark_mode(true).unwrap();
        assert!(cache.dark_mode());
        assert_eq!(cache.get(DARK_MODE_KEY).unwrap(), "true");
    }
}
