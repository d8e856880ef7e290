use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use anyhow::{Context, anyhow};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use serde_json::Value;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::datetime::{iso_timestamp_serde, parse_calendar_date};
use crate::task::Task;

/// Durable slot for one serialized document.
pub trait Storage {
    /// `Ok(None)` when nothing has been stored yet.
    fn load(&self) -> anyhow::Result<Option<Vec<u8>>>;

    fn save(&self, raw: &[u8]) -> anyhow::Result<()>;

    fn remove(&self) -> anyhow::Result<()>;
}

/// The data directory and the documents kept in it.
#[derive(Debug)]
pub struct DataStore {
    pub data_dir: PathBuf,
    pub tasks_path: PathBuf,
    pub profile_path: PathBuf,
}

impl DataStore {
    #[tracing::instrument(skip(data_dir))]
    pub fn open(data_dir: &Path) -> anyhow::Result<Self> {
        let data_dir = data_dir.to_path_buf();
        fs::create_dir_all(&data_dir)
            .with_context(|| format!("failed to create {}", data_dir.display()))?;

        let tasks_path = data_dir.join("tasks.json");
        let profile_path = data_dir.join("profile.json");

        info!(
            data_dir = %data_dir.display(),
            tasks = %tasks_path.display(),
            profile = %profile_path.display(),
            "opened datastore"
        );

        Ok(Self {
            data_dir,
            tasks_path,
            profile_path,
        })
    }

    pub fn task_storage(&self) -> FileStorage {
        FileStorage::new(self.tasks_path.clone())
    }

    pub fn profile_storage(&self) -> FileStorage {
        FileStorage::new(self.profile_path.clone())
    }
}

#[derive(Debug, Clone)]
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Storage for FileStorage {
    #[tracing::instrument(skip(self), fields(file = %self.path.display()))]
    fn load(&self) -> anyhow::Result<Option<Vec<u8>>> {
        if !self.path.exists() {
            debug!("no document on disk yet");
            return Ok(None);
        }

        let raw = fs::read(&self.path)
            .with_context(|| format!("failed reading {}", self.path.display()))?;
        if raw.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }

        debug!(bytes = raw.len(), "loaded document");
        Ok(Some(raw))
    }

    #[tracing::instrument(skip(self, raw), fields(file = %self.path.display(), bytes = raw.len()))]
    fn save(&self, raw: &[u8]) -> anyhow::Result<()> {
        debug!("saving document atomically");

        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        let mut temp = NamedTempFile::new_in(dir)
            .with_context(|| format!("failed to create temp file in {}", dir.display()))?;
        temp.write_all(raw)?;
        temp.flush()?;

        temp.persist(&self.path)
            .map_err(|err| anyhow!("failed to persist {}: {}", self.path.display(), err))?;

        Ok(())
    }

    #[tracing::instrument(skip(self), fields(file = %self.path.display()))]
    fn remove(&self) -> anyhow::Result<()> {
        if self.path.exists() {
            fs::remove_file(&self.path)
                .with_context(|| format!("failed removing {}", self.path.display()))?;
        }
        Ok(())
    }
}

/// In-memory document slot. Clones share contents, so a caller can keep a
/// handle to inspect what an owning store wrote.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    contents: Rc<RefCell<Option<Vec<u8>>>>,
    writes: Rc<Cell<usize>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_contents(raw: impl Into<Vec<u8>>) -> Self {
        let storage = Self::default();
        *storage.contents.borrow_mut() = Some(raw.into());
        storage
    }

    pub fn contents(&self) -> Option<Vec<u8>> {
        self.contents.borrow().clone()
    }

    /// Number of successful `save` calls.
    pub fn writes(&self) -> usize {
        self.writes.get()
    }
}

impl Storage for MemoryStorage {
    fn load(&self) -> anyhow::Result<Option<Vec<u8>>> {
        Ok(self.contents.borrow().clone())
    }

    fn save(&self, raw: &[u8]) -> anyhow::Result<()> {
        *self.contents.borrow_mut() = Some(raw.to_vec());
        self.writes.set(self.writes.get() + 1);
        Ok(())
    }

    fn remove(&self) -> anyhow::Result<()> {
        *self.contents.borrow_mut() = None;
        Ok(())
    }
}

/// A task record as it may appear on disk, including records written before
/// `scheduledDate` and `categoryId` existed.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PersistedTask {
    id: String,
    title: String,
    #[serde(default)]
    completed: bool,
    #[serde(default)]
    created_at: Option<String>,
    #[serde(default)]
    scheduled_date: Option<String>,
    #[serde(default)]
    category_id: Option<String>,
}

impl PersistedTask {
    /// Backfills absent or unreadable optional fields. Returns `None` for
    /// records that cannot satisfy the task invariants.
    fn migrate(self, now: DateTime<Utc>, today: NaiveDate) -> Option<Task> {
        if self.id.trim().is_empty() || self.title.trim().is_empty() {
            warn!(id = %self.id, "skipping record with blank id or title");
            return None;
        }

        let created_at = match self.created_at.as_deref() {
            Some(raw) => iso_timestamp_serde::parse(raw).unwrap_or_else(|err| {
                warn!(id = %self.id, error = %err, "unreadable createdAt; using now");
                now
            }),
            None => now,
        };

        let scheduled_date = match self.scheduled_date.as_deref() {
            Some(raw) => parse_calendar_date(raw).unwrap_or_else(|| {
                warn!(id = %self.id, value = %raw, "unreadable scheduledDate; using today");
                today
            }),
            None => today,
        };

        Some(Task {
            id: self.id,
            title: self.title,
            completed: self.completed,
            created_at,
            scheduled_date,
            category_id: self.category_id.filter(|id| !id.trim().is_empty()),
        })
    }
}

/// Reads a persisted task collection. Never fails: a document that is not a
/// JSON array yields an empty collection, and unreadable records are dropped.
#[tracing::instrument(skip(raw, now, today), fields(bytes = raw.len()))]
pub fn decode_tasks(raw: &[u8], now: DateTime<Utc>, today: NaiveDate) -> Vec<Task> {
    let items = match serde_json::from_slice::<Value>(raw) {
        Ok(Value::Array(items)) => items,
        Ok(other) => {
            warn!(kind = json_kind(&other), "persisted tasks are not a list; starting empty");
            return vec![];
        }
        Err(err) => {
            warn!(error = %err, "persisted tasks are not valid JSON; starting empty");
            return vec![];
        }
    };

    let mut seen = HashSet::with_capacity(items.len());
    let mut out = Vec::with_capacity(items.len());
    for (idx, item) in items.into_iter().enumerate() {
        let record = match serde_json::from_value::<PersistedTask>(item) {
            Ok(record) => record,
            Err(err) => {
                warn!(index = idx, error = %err, "skipping unreadable task record");
                continue;
            }
        };

        let Some(task) = record.migrate(now, today) else {
            continue;
        };

        if !seen.insert(task.id.clone()) {
            warn!(index = idx, id = %task.id, "skipping duplicate task id");
            continue;
        }
        out.push(task);
    }

    debug!(count = out.len(), "decoded tasks");
    out
}

pub fn encode_tasks(tasks: &[Task]) -> anyhow::Result<Vec<u8>> {
    serde_json::to_vec(tasks).context("failed to serialize tasks")
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
