use std::collections::HashMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{debug, info, instrument, warn};

use crate::error::{DocketError, Result};
use crate::render::Theme;
use crate::task::Task;

pub const TASKS_KEY: &str = "tasks";
pub const THEME_KEY: &str = "theme";
pub const LANGUAGE_KEY: &str = "language";

/// Durable key-value slot. Values are whole strings; `set` replaces.
pub trait SlotStore {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&mut self, key: &str, value: &str) -> Result<()>;
}

/// One file per key inside a data directory.
#[derive(Debug)]
pub struct DirSlotStore {
    pub data_dir: PathBuf,
}

impl DirSlotStore {
    #[instrument(skip(data_dir))]
    pub fn open(data_dir: &Path) -> Result<Self> {
        fs::create_dir_all(data_dir).map_err(|source| DocketError::Storage {
            key: data_dir.display().to_string(),
            source,
        })?;
        info!(data_dir = %data_dir.display(), "opened slot directory");
        Ok(Self {
            data_dir: data_dir.to_path_buf(),
        })
    }

    pub fn slot_path(&self, key: &str) -> PathBuf {
        self.data_dir.join(format!("{key}.data"))
    }
}

impl SlotStore for DirSlotStore {
    #[instrument(skip(self))]
    fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.slot_path(key);
        match fs::read_to_string(&path) {
            Ok(raw) => Ok(Some(raw)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!(file = %path.display(), "slot absent");
                Ok(None)
            }
            Err(source) => Err(DocketError::Storage {
                key: key.to_string(),
                source,
            }),
        }
    }

    #[instrument(skip(self, value), fields(bytes = value.len()))]
    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let path = self.slot_path(key);
        let storage_err = |source: io::Error| DocketError::Storage {
            key: key.to_string(),
            source,
        };

        let mut temp = NamedTempFile::new_in(&self.data_dir).map_err(storage_err)?;
        temp.write_all(value.as_bytes()).map_err(storage_err)?;
        temp.flush().map_err(storage_err)?;
        temp.persist(&path).map_err(|err| storage_err(err.error))?;

        debug!(file = %path.display(), "slot written");
        Ok(())
    }
}

#[derive(Debug, Default, Clone)]
pub struct MemorySlotStore {
    slots: HashMap<String, String>,
}

impl MemorySlotStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SlotStore for MemorySlotStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.slots.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.slots.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Reads and writes the task list and the session preferences through a
/// [`SlotStore`].
#[derive(Debug)]
pub struct TaskRepository<S> {
    slots: S,
}

impl<S: SlotStore> TaskRepository<S> {
    pub fn new(slots: S) -> Self {
        Self { slots }
    }

    pub fn slots(&self) -> &S {
        &self.slots
    }

    /// Never fails: an absent, unreadable or malformed slot reads as an
    /// empty list.
    #[instrument(skip(self))]
    pub fn load(&self) -> Vec<Task> {
        let raw = match self.slots.get(TASKS_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(err) => {
                warn!(error = %err, "task slot unreadable; starting empty");
                return Vec::new();
            }
        };

        match decode_tasks(&raw) {
            Ok(tasks) => {
                debug!(count = tasks.len(), "loaded tasks");
                tasks
            }
            Err(err) => {
                warn!(error = %err, "task slot malformed; starting empty");
                Vec::new()
            }
        }
    }

    #[instrument(skip(self, tasks), fields(count = tasks.len()))]
    pub fn save(&mut self, tasks: &[Task]) -> Result<()> {
        let serialized = serde_json::to_string(tasks)?;
        self.slots.set(TASKS_KEY, &serialized)
    }

    pub fn load_theme(&self) -> Theme {
        match self.slots.get(THEME_KEY) {
            Ok(Some(raw)) => Theme::from_storage(&raw),
            Ok(None) => Theme::default(),
            Err(err) => {
                warn!(error = %err, "theme slot unreadable");
                Theme::default()
            }
        }
    }

    pub fn save_theme(&mut self, theme: Theme) -> Result<()> {
        self.slots.set(THEME_KEY, theme.storage_value())
    }

    pub fn load_language(&self) -> Option<String> {
        match self.slots.get(LANGUAGE_KEY) {
            Ok(Some(raw)) => {
                let code = raw.trim();
                (!code.is_empty()).then(|| code.to_string())
            }
            Ok(None) => None,
            Err(err) => {
                warn!(error = %err, "language slot unreadable");
                None
            }
        }
    }

    pub fn save_language(&mut self, code: &str) -> Result<()> {
        self.slots.set(LANGUAGE_KEY, code)
    }
}

pub fn decode_tasks(raw: &str) -> Result<Vec<Task>> {
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(raw).map_err(|err| DocketError::PersistenceDecode {
        key: TASKS_KEY.to_string(),
        reason: err.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::{MemorySlotStore, SlotStore, TASKS_KEY, TaskRepository, decode_tasks};
    use crate::error::DocketError;
    use crate::render::Theme;

    #[test]
    fn malformed_slot_loads_empty() {
        let mut slots = MemorySlotStore::new();
        slots.set(TASKS_KEY, "{not json").expect("set");
        let repo = TaskRepository::new(slots);
        assert!(repo.load().is_empty());
    }

    #[test]
    fn decode_reports_persistence_error() {
        let err = decode_tasks("[{\"id\": \"x\"}]").expect_err("bad shape");
        assert!(matches!(err, DocketError::PersistenceDecode { .. }));
    }

    #[test]
    fn reads_legacy_iso_timestamps() {
        let raw = r#"[{
            "id": 1729000000000,
            "text": "Buy Milk",
            "category": "shopping",
            "priority": "low",
            "dueDate": "2024-05-01T00:00:00.000Z",
            "completed": false,
            "createdAt": "2024-04-28T10:15:30.123Z"
        }, {
            "id": 1729000000001,
            "text": "Report",
            "category": "work",
            "priority": "high",
            "dueDate": null,
            "completed": true,
            "createdAt": "2024-04-28T10:15:31.000Z"
        }]"#;
        let tasks = decode_tasks(raw).expect("decode");
        assert_eq!(tasks.len(), 2);
        assert_eq!(
            tasks[0].due_date.map(|d| d.to_string()).as_deref(),
            Some("2024-05-01")
        );
        assert!(tasks[1].due_date.is_none());
        assert!(tasks[1].completed);
    }

    #[test]
    fn theme_defaults_to_light() {
        let mut repo = TaskRepository::new(MemorySlotStore::new());
        assert_eq!(repo.load_theme(), Theme::Light);
        repo.save_theme(Theme::Dark).expect("save theme");
        assert_eq!(repo.load_theme(), Theme::Dark);
    }
}
