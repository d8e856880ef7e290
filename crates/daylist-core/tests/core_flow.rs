use std::fs;

use chrono::{Duration, TimeZone, Utc};
use daylist_core::clock::{Clock, FixedClock};
use daylist_core::datastore::{DataStore, MemoryStorage};
use daylist_core::engine::Engine;
use daylist_core::selection::{CategoryScope, Selection, StatusFilter};
use daylist_core::store::TaskStore;
use tempfile::tempdir;

fn morning() -> FixedClock {
    FixedClock::new(
        Utc.with_ymd_and_hms(2026, 10, 18, 9, 0, 0)
            .single()
            .expect("valid now"),
    )
}

#[test]
fn completed_shopping_task_drops_out_of_active_view() {
    let mut engine = Engine::open(MemoryStorage::new(), morning(), Selection::default());

    let milk = engine
        .add("Buy milk", Some("shopping"))
        .expect("add milk")
        .expect("accepted");
    engine
        .add("Finish report", Some("work"))
        .expect("add report")
        .expect("accepted");
    engine.toggle(&milk).expect("toggle");

    engine.set_status_filter(StatusFilter::Active);
    engine.set_category_scope(CategoryScope::All);
    let projection = engine.projection();

    let titles: Vec<&str> = projection.tasks.iter().map(|t| t.title.as_str()).collect();
    assert_eq!(titles, vec!["Finish report"]);
    assert_eq!(projection.view_completed_count, 1);
    assert_eq!(projection.view_active_count, 1);
    assert_eq!(projection.category_counts.len(), 1);
    assert_eq!(projection.category_counts.get("work"), Some(&1));
}

#[test]
fn clear_completed_leaves_only_active_task() {
    let mut engine = Engine::open(MemoryStorage::new(), morning(), Selection::default());
    let first = engine.add("first", None).expect("add").expect("accepted");
    engine.add("second", None).expect("add");
    let third = engine.add("third", None).expect("add").expect("accepted");
    engine.toggle(&first).expect("toggle");
    engine.toggle(&third).expect("toggle");

    assert_eq!(engine.clear_completed().expect("clear"), 2);

    let titles: Vec<&str> = engine.tasks().iter().map(|t| t.title.as_str()).collect();
    assert_eq!(titles, vec!["second"]);
}

#[test]
fn view_counts_add_up_for_every_selection() {
    let clock = morning();
    let mut engine = Engine::open(MemoryStorage::new(), clock.clone(), Selection::default());
    let ids: Vec<String> = [
        ("Buy Milk", Some("shopping")),
        ("milk the cow", None),
        ("Gym", Some("health")),
        ("Read book", Some("learning")),
        ("Pay rent", Some("personal")),
    ]
    .into_iter()
    .map(|(title, category)| engine.add(title, category).expect("add").expect("accepted"))
    .collect();
    engine.toggle(&ids[0]).expect("toggle");
    engine.toggle(&ids[2]).expect("toggle");
    engine
        .reschedule(&ids[3], clock.today() - Duration::days(1))
        .expect("reschedule");

    let scopes = [
        CategoryScope::Today,
        CategoryScope::All,
        CategoryScope::category("shopping"),
        CategoryScope::category("unknown"),
    ];
    for scope in scopes {
        for search in ["", "MILK", "  gym ", "nothing"] {
            engine.set_category_scope(scope.clone());
            engine.set_search_text(search);

            engine.set_status_filter(StatusFilter::All);
            let all = engine.projection().clone();
            assert_eq!(all.view_active_count + all.view_completed_count, all.tasks.len());

            engine.set_status_filter(StatusFilter::Active);
            assert_eq!(engine.projection().tasks.len(), all.view_active_count);

            engine.set_status_filter(StatusFilter::Completed);
            assert_eq!(engine.projection().tasks.len(), all.view_completed_count);
        }
    }

    engine.set_category_scope(CategoryScope::All);
    engine.set_search_text("milk");
    engine.set_status_filter(StatusFilter::All);
    assert_eq!(engine.projection().tasks.len(), 2);

    let projection = engine.projection();
    assert_eq!(projection.global_active_count, 3);
    assert_eq!(projection.today_count, 2);
}

#[test]
fn file_backed_store_survives_reopen() {
    let temp = tempdir().expect("tempdir");
    let data = DataStore::open(temp.path()).expect("open datastore");
    let clock = morning();

    let mut store = TaskStore::open(data.task_storage(), clock.clone());
    let id = store.add("Call dentist", Some("health")).expect("add").expect("accepted");
    store.add("Stretch", None).expect("add");
    store.toggle(&id).expect("toggle");

    let reopened = TaskStore::open(data.task_storage(), clock);
    assert_eq!(reopened.tasks(), store.tasks());

    let raw = fs::read_to_string(&data.tasks_path).expect("read tasks.json");
    let value: serde_json::Value = serde_json::from_str(&raw).expect("valid json");
    assert_eq!(value[0]["title"], "Stretch");
    assert!(value[0]["categoryId"].is_null());
    assert_eq!(value[1]["scheduledDate"], "2026-10-18");
    assert_eq!(value[1]["completed"], true);
}

#[test]
fn legacy_file_is_migrated_on_open() {
    let temp = tempdir().expect("tempdir");
    let data = DataStore::open(temp.path()).expect("open datastore");
    fs::write(
        &data.tasks_path,
        r#"[{"id":"legacy-1","title":"Old task","completed":false,"createdAt":"2025-12-01T08:00:00.000Z"}]"#,
    )
    .expect("write legacy file");

    let mut engine = Engine::open(data.task_storage(), morning(), Selection::default());

    let task = &engine.tasks()[0];
    assert_eq!(task.category_id, None);
    assert_eq!(task.scheduled_date.to_string(), "2026-10-18");
    assert_eq!(engine.projection().tasks.len(), 1);
}

#[test]
fn garbage_file_opens_empty() {
    let temp = tempdir().expect("tempdir");
    let data = DataStore::open(temp.path()).expect("open datastore");
    fs::write(&data.tasks_path, "{\"not\": \"a list\"}").expect("write garbage");

    let store = TaskStore::open(data.task_storage(), morning());
    assert!(store.tasks().is_empty());
}
