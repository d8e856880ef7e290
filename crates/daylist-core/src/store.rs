use anyhow::Context;
use chrono::{NaiveDate, SubsecRound};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::clock::Clock;
use crate::datastore::{Storage, decode_tasks, encode_tasks};
use crate::datetime::has_calendar_form;
use crate::task::Task;

/// Owner of the canonical task collection, newest first.
///
/// Every mutation that changes the collection bumps [`TaskStore::version`]
/// and writes the whole collection to storage before returning. Mutations
/// report `Ok(false)` for rejected input and unknown ids. A failed write is
/// returned as an error, but the in-memory change is kept; the next
/// successful write (or [`TaskStore::flush`]) catches storage up.
#[derive(Debug)]
pub struct TaskStore<S, C> {
    storage: S,
    clock: C,
    tasks: Vec<Task>,
    version: u64,
}

impl<S: Storage, C: Clock> TaskStore<S, C> {
    #[instrument(skip_all)]
    pub fn open(storage: S, clock: C) -> Self {
        let tasks = match storage.load() {
            Ok(Some(raw)) => decode_tasks(&raw, clock.now(), clock.today()),
            Ok(None) => {
                debug!("no persisted tasks");
                vec![]
            }
            Err(err) => {
                warn!(error = %format!("{err:#}"), "failed reading persisted tasks; starting empty");
                vec![]
            }
        };

        info!(count = tasks.len(), "opened task store");
        Self {
            storage,
            clock,
            tasks,
            version: 0,
        }
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn get(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|task| task.id == id)
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    /// Returns the new task's id, or `None` when `title` is blank.
    #[instrument(skip(self, title), fields(title_len = title.len(), category = ?category_id))]
    pub fn add(&mut self, title: &str, category_id: Option<&str>) -> anyhow::Result<Option<String>> {
        let title = title.trim();
        if title.is_empty() {
            debug!("rejected blank title");
            return Ok(None);
        }

        let now = self.clock.now().trunc_subsecs(3);
        let mut task = Task::new_active(
            title.to_string(),
            normalize_category(category_id),
            now,
            self.clock.today(),
        );
        while self.position(&task.id).is_some() {
            task.id = Uuid::new_v4().to_string();
        }

        let id = task.id.clone();
        self.tasks.insert(0, task);
        self.commit("add")?;
        Ok(Some(id))
    }

    #[instrument(skip(self), fields(id = %id))]
    pub fn toggle(&mut self, id: &str) -> anyhow::Result<bool> {
        let Some(idx) = self.position(id) else {
            return Ok(false);
        };
        let task = &mut self.tasks[idx];
        task.completed = !task.completed;
        debug!(completed = task.completed, "toggled task");
        self.commit("toggle")?;
        Ok(true)
    }

    #[instrument(skip(self), fields(id = %id))]
    pub fn remove(&mut self, id: &str) -> anyhow::Result<bool> {
        let Some(idx) = self.position(id) else {
            return Ok(false);
        };
        self.tasks.remove(idx);
        self.commit("remove")?;
        Ok(true)
    }

    #[instrument(skip(self, title), fields(id = %id, title_len = title.len()))]
    pub fn rename_title(&mut self, id: &str, title: &str) -> anyhow::Result<bool> {
        let title = title.trim();
        if title.is_empty() {
            debug!("rejected blank title");
            return Ok(false);
        }
        let Some(idx) = self.position(id) else {
            return Ok(false);
        };
        if self.tasks[idx].title == title {
            return Ok(false);
        }
        self.tasks[idx].title = title.to_string();
        self.commit("rename")?;
        Ok(true)
    }

    #[instrument(skip(self), fields(id = %id, category = ?category_id))]
    pub fn recategorize(&mut self, id: &str, category_id: Option<&str>) -> anyhow::Result<bool> {
        let Some(idx) = self.position(id) else {
            return Ok(false);
        };
        let category_id = normalize_category(category_id);
        if self.tasks[idx].category_id == category_id {
            return Ok(false);
        }
        self.tasks[idx].category_id = category_id;
        self.commit("recategorize")?;
        Ok(true)
    }

    /// Dates outside years 0000..=9999 are rejected; they have no
    /// `YYYY-MM-DD` form to persist.
    #[instrument(skip(self), fields(id = %id, date = %date))]
    pub fn reschedule(&mut self, id: &str, date: NaiveDate) -> anyhow::Result<bool> {
        if !has_calendar_form(date) {
            debug!("rejected date outside four-digit years");
            return Ok(false);
        }
        let Some(idx) = self.position(id) else {
            return Ok(false);
        };
        if self.tasks[idx].scheduled_date == date {
            return Ok(false);
        }
        self.tasks[idx].scheduled_date = date;
        self.commit("reschedule")?;
        Ok(true)
    }

    /// Returns how many tasks were removed.
    #[instrument(skip(self))]
    pub fn clear_completed(&mut self) -> anyhow::Result<usize> {
        let before = self.tasks.len();
        self.tasks.retain(Task::is_active);
        let removed = before - self.tasks.len();
        if removed == 0 {
            return Ok(0);
        }

        info!(removed, remaining = self.tasks.len(), "cleared completed tasks");
        self.commit("clear-completed")?;
        Ok(removed)
    }

    /// Writes the current collection regardless of whether it changed.
    #[instrument(skip(self))]
    pub fn flush(&self) -> anyhow::Result<()> {
        let raw = encode_tasks(&self.tasks)?;
        self.storage
            .save(&raw)
            .context("failed to persist tasks")
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.tasks.iter().position(|task| task.id == id)
    }

    fn commit(&mut self, op: &'static str) -> anyhow::Result<()> {
        self.version += 1;
        debug!(op, version = self.version, count = self.tasks.len(), "collection changed");
        self.flush()
    }
}

/// Blank ids mean uncategorized.
fn normalize_category(category_id: Option<&str>) -> Option<String> {
    category_id
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
}
