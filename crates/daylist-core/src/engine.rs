use chrono::NaiveDate;
use tracing::debug;

use crate::clock::Clock;
use crate::datastore::Storage;
use crate::projector::{Projection, Projector};
use crate::selection::{CategoryScope, Selection, StatusFilter};
use crate::store::TaskStore;
use crate::task::Task;

/// What a presentation layer talks to: the task store, the current view
/// selection, and a projection recomputed whenever either (or the date)
/// moves.
#[derive(Debug)]
pub struct Engine<S, C> {
    store: TaskStore<S, C>,
    selection: Selection,
    projector: Projector,
}

impl<S: Storage, C: Clock> Engine<S, C> {
    pub fn open(storage: S, clock: C, selection: Selection) -> Self {
        Self {
            store: TaskStore::open(storage, clock),
            selection,
            projector: Projector::new(),
        }
    }

    pub fn store(&self) -> &TaskStore<S, C> {
        &self.store
    }

    pub fn tasks(&self) -> &[Task] {
        self.store.tasks()
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn today(&self) -> NaiveDate {
        self.store.today()
    }

    /// "Today" is read from the clock on every call, so a long-lived engine
    /// rolls over at midnight.
    pub fn projection(&mut self) -> &Projection {
        let today = self.store.today();
        self.projector.project(
            self.store.version(),
            self.store.tasks(),
            &self.selection,
            today,
        )
    }

    pub fn add(&mut self, title: &str, category_id: Option<&str>) -> anyhow::Result<Option<String>> {
        self.store.add(title, category_id)
    }

    pub fn toggle(&mut self, id: &str) -> anyhow::Result<bool> {
        self.store.toggle(id)
    }

    pub fn remove(&mut self, id: &str) -> anyhow::Result<bool> {
        self.store.remove(id)
    }

    pub fn rename_title(&mut self, id: &str, title: &str) -> anyhow::Result<bool> {
        self.store.rename_title(id, title)
    }

    pub fn recategorize(&mut self, id: &str, category_id: Option<&str>) -> anyhow::Result<bool> {
        self.store.recategorize(id, category_id)
    }

    pub fn reschedule(&mut self, id: &str, date: NaiveDate) -> anyhow::Result<bool> {
        self.store.reschedule(id, date)
    }

    pub fn clear_completed(&mut self) -> anyhow::Result<usize> {
        self.store.clear_completed()
    }

    pub fn set_status_filter(&mut self, status: StatusFilter) {
        debug!(%status, "status filter changed");
        self.selection.set_status_filter(status);
    }

    pub fn set_category_scope(&mut self, scope: CategoryScope) {
        debug!(%scope, "category scope changed");
        self.selection.set_category_scope(scope);
    }

    pub fn set_search_text(&mut self, search: impl Into<String>) {
        self.selection.set_search_text(search);
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::Engine;
    use crate::clock::FixedClock;
    use crate::datastore::MemoryStorage;
    use crate::selection::{CategoryScope, Selection, StatusFilter};

    #[test]
    fn projection_follows_mutations_and_selection() {
        let clock = FixedClock::new(
            Utc.with_ymd_and_hms(2026, 8, 3, 9, 0, 0)
                .single()
                .expect("valid now"),
        );
        let mut engine = Engine::open(MemoryStorage::new(), clock, Selection::default());

        engine.add("Water plants", None).expect("add");
        assert_eq!(engine.projection().tasks.len(), 1);

        engine.set_status_filter(StatusFilter::Completed);
        assert!(engine.projection().tasks.is_empty());

        let id = engine.tasks()[0].id.clone();
        engine.toggle(&id).expect("toggle");
        assert_eq!(engine.projection().tasks.len(), 1);
        assert_eq!(engine.projection().view_completed_count, 1);
    }

    #[test]
    fn today_scope_rolls_over_at_midnight() {
        let clock = FixedClock::new(
            Utc.with_ymd_and_hms(2026, 8, 3, 23, 50, 0)
                .single()
                .expect("valid now"),
        );
        let mut engine = Engine::open(MemoryStorage::new(), clock.clone(), Selection::default());
        engine.add("Late night", None).expect("add");
        assert_eq!(engine.projection().today_count, 1);

        clock.advance(Duration::minutes(20));

        let projection = engine.projection();
        assert!(projection.tasks.is_empty());
        assert_eq!(projection.today_count, 0);
        assert_eq!(projection.global_active_count, 1);

        engine.set_category_scope(CategoryScope::All);
        assert_eq!(engine.projection().tasks.len(), 1);
    }
}
