use std::collections::BTreeMap;

use chrono::NaiveDate;
use tracing::trace;

use crate::selection::{
  CategoryScope,
  Selection
};
use crate::task::Task;

/// Everything the interface renders
/// for one selection, derived from
/// the canonical collection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Projection {
  /// Scope, search and status
  /// filtered, in collection order.
  pub tasks:                Vec<Task>,
  pub view_active_count:    usize,
  pub view_completed_count: usize,
  /// Incomplete tasks, any scope.
  pub global_active_count:  usize,
  /// Incomplete tasks scheduled
  /// today, any scope.
  pub today_count:          usize,
  /// Incomplete tasks per category
  /// id; ids with none are absent.
  pub category_counts:
    BTreeMap<String, usize>
}

impl Projection {
  pub fn view_total(&self) -> usize {
    self.view_active_count
      + self.view_completed_count
  }

  pub fn category_count(
    &self,
    id: &str
  ) -> usize {
    self
      .category_counts
      .get(id)
      .copied()
      .unwrap_or(0)
  }
}

/// Derives the projection. Order:
/// scope, then search, then status;
/// view counts ignore the status step.
#[tracing::instrument(skip(
  tasks, selection
), fields(total = tasks.len()))]
pub fn project(
  tasks: &[Task],
  selection: &Selection,
  today: NaiveDate
) -> Projection {
  let needle = selection
    .search_needle()
    .map(str::to_lowercase);

  let mut out = Projection::default();

  for task in tasks {
    if task.is_active() {
      out.global_active_count += 1;
      if task.is_scheduled_on(today) {
        out.today_count += 1;
      }
      if let Some(id) =
        task.category_id.as_ref()
      {
        *out
          .category_counts
          .entry(id.clone())
          .or_insert(0) += 1;
      }
    }

    if !in_scope(
      task,
      &selection.scope,
      today
    ) || !matches_search(
      task,
      needle.as_deref()
    ) {
      continue;
    }

    if task.completed {
      out.view_completed_count += 1;
    } else {
      out.view_active_count += 1;
    }

    if selection
      .status
      .admits(task.completed)
    {
      out.tasks.push(task.clone());
    }
  }

  trace!(
    shown = out.tasks.len(),
    view_active = out.view_active_count,
    view_completed =
      out.view_completed_count,
    "projected tasks"
  );
  out
}

fn in_scope(
  task: &Task,
  scope: &CategoryScope,
  today: NaiveDate
) -> bool {
  match scope {
    | CategoryScope::Today => {
      task.is_scheduled_on(today)
    }
    | CategoryScope::All => true,
    | CategoryScope::Category(id) => {
      task.category_id.as_deref()
        == Some(id.as_str())
    }
  }
}

/// `needle` must already be
/// lower-cased.
fn matches_search(
  task: &Task,
  needle: Option<&str>
) -> bool {
  match needle {
    | Some(needle) => {
      task
        .title
        .to_lowercase()
        .contains(needle)
    }
    | None => true
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CacheKey {
  version:   u64,
  selection: Selection,
  today:     NaiveDate
}

/// Memoizes the last projection,
/// keyed on collection version,
/// selection and date.
#[derive(Debug, Default)]
pub struct Projector {
  cache: Option<(CacheKey, Projection)>
}

impl Projector {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn project(
    &mut self,
    version: u64,
    tasks: &[Task],
    selection: &Selection,
    today: NaiveDate
  ) -> &Projection {
    let key = CacheKey {
      version,
      selection: selection.clone(),
      today
    };

    let stale = self
      .cache
      .as_ref()
      .is_none_or(|(cached, _)| {
        *cached != key
      });
    if stale {
      trace!(
        version,
        %today,
        "recomputing projection"
      );
      self.cache = None;
    }

    let (_, projection) =
      self.cache.get_or_insert_with(
        || {
          (
            key,
            project(
              tasks, selection, today
            )
          )
        }
      );
    projection
  }
}
