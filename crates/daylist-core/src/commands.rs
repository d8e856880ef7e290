use anyhow::anyhow;
use tracing::{debug, info, instrument, warn};

use crate::cli::{Command, ListArgs, ProfileCommand};
use crate::clock::Clock;
use crate::config::Config;
use crate::datastore::Storage;
use crate::datetime::{format_date, has_calendar_form, parse_schedule_expr};
use crate::engine::Engine;
use crate::profile::{ProfileStore, ProfileUpdate};
use crate::render::{Renderer, short_id};
use crate::selection::{CategoryScope, Selection, StatusFilter};
use crate::task::{Task, find_category};

/// Builds the starting view from `default.status` / `default.scope`.
pub fn default_selection(cfg: &Config) -> anyhow::Result<Selection> {
    let status = match cfg.get("default.status") {
        Some(raw) => raw.parse::<StatusFilter>()?,
        None => StatusFilter::default(),
    };
    let scope = match cfg.get("default.scope") {
        Some(raw) => raw.parse::<CategoryScope>()?,
        None => CategoryScope::default(),
    };
    Ok(Selection::new(status, scope, ""))
}

/// Resolves a full id or a unique id prefix to the stored id.
pub fn resolve_task_id(tasks: &[Task], token: &str) -> anyhow::Result<String> {
    let token = token.trim();
    if token.is_empty() {
        return Err(anyhow!("task id cannot be empty"));
    }
    if let Some(task) = tasks.iter().find(|task| task.id == token) {
        return Ok(task.id.clone());
    }

    let mut matches = tasks.iter().filter(|task| task.id.starts_with(token));
    let first = matches
        .next()
        .ok_or_else(|| anyhow!("no task matches id '{token}'"))?;
    if matches.next().is_some() {
        return Err(anyhow!("id prefix '{token}' is ambiguous; use more characters"));
    }
    Ok(first.id.clone())
}

#[instrument(skip(engine, profiles, renderer, command))]
pub fn dispatch<S, C, P>(
    engine: &mut Engine<S, C>,
    profiles: &mut ProfileStore<P>,
    renderer: &mut Renderer,
    command: Command,
) -> anyhow::Result<()>
where
    S: Storage,
    C: Clock,
    P: Storage,
{
    debug!(?command, "dispatching command");

    match command {
        Command::Add { title, category } => cmd_add(engine, &title.join(" "), category.as_deref()),
        Command::List(args) => cmd_list(engine, renderer, args),
        Command::Toggle { id } => cmd_toggle(engine, &id),
        Command::Remove { id } => cmd_remove(engine, &id),
        Command::Rename { id, title } => cmd_rename(engine, &id, &title.join(" ")),
        Command::Categorize { id, category } => cmd_categorize(engine, &id, category.as_deref()),
        Command::Schedule { id, when } => cmd_schedule(engine, &id, &when),
        Command::ClearCompleted => cmd_clear_completed(engine),
        Command::Categories => renderer.print_categories(engine.projection()),
        Command::Summary => {
            let today = engine.today();
            renderer.print_summary(engine.projection(), today)
        }
        Command::Profile(sub) => cmd_profile(profiles, renderer, sub),
    }
}

#[instrument(skip(engine, title))]
fn cmd_add<S: Storage, C: Clock>(
    engine: &mut Engine<S, C>,
    title: &str,
    category: Option<&str>,
) -> anyhow::Result<()> {
    info!("command add");
    warn_unknown_category(category);

    match engine.add(title, category)? {
        Some(id) => println!("Created task {}.", short_id(&id)),
        None => println!("Nothing added: title is blank."),
    }
    Ok(())
}

#[instrument(skip(engine, renderer, args))]
fn cmd_list<S: Storage, C: Clock>(
    engine: &mut Engine<S, C>,
    renderer: &mut Renderer,
    args: ListArgs,
) -> anyhow::Result<()> {
    info!("command list");

    if let Some(status) = args.status {
        engine.set_status_filter(status);
    }
    if let Some(scope) = args.scope {
        engine.set_category_scope(scope);
    }
    if let Some(search) = args.search {
        engine.set_search_text(search);
    }

    let selection = engine.selection().clone();
    let today = engine.today();
    renderer.print_projection(engine.projection(), &selection, today)
}

#[instrument(skip(engine))]
fn cmd_toggle<S: Storage, C: Clock>(engine: &mut Engine<S, C>, token: &str) -> anyhow::Result<()> {
    info!("command toggle");
    let id = resolve_task_id(engine.tasks(), token)?;
    engine.toggle(&id)?;

    if let Some(task) = engine.store().get(&id) {
        let verb = if task.completed { "Completed" } else { "Reopened" };
        println!("{verb} task {} '{}'.", short_id(&id), task.title);
    }
    Ok(())
}

#[instrument(skip(engine))]
fn cmd_remove<S: Storage, C: Clock>(engine: &mut Engine<S, C>, token: &str) -> anyhow::Result<()> {
    info!("command remove");
    let id = resolve_task_id(engine.tasks(), token)?;
    engine.remove(&id)?;
    println!("Deleted task {}.", short_id(&id));
    Ok(())
}

#[instrument(skip(engine, title))]
fn cmd_rename<S: Storage, C: Clock>(
    engine: &mut Engine<S, C>,
    token: &str,
    title: &str,
) -> anyhow::Result<()> {
    info!("command rename");
    let id = resolve_task_id(engine.tasks(), token)?;
    if engine.rename_title(&id, title)? {
        println!("Renamed task {}.", short_id(&id));
    } else {
        println!("Task {} unchanged.", short_id(&id));
    }
    Ok(())
}

#[instrument(skip(engine))]
fn cmd_categorize<S: Storage, C: Clock>(
    engine: &mut Engine<S, C>,
    token: &str,
    category: Option<&str>,
) -> anyhow::Result<()> {
    info!("command categorize");
    warn_unknown_category(category);
    let id = resolve_task_id(engine.tasks(), token)?;
    engine.recategorize(&id, category)?;

    let stored = engine
        .store()
        .get(&id)
        .and_then(|task| task.category_id.clone());
    match stored {
        Some(category) => println!("Task {} is now in '{category}'.", short_id(&id)),
        None => println!("Task {} is now uncategorized.", short_id(&id)),
    }
    Ok(())
}

#[instrument(skip(engine))]
fn cmd_schedule<S: Storage, C: Clock>(
    engine: &mut Engine<S, C>,
    token: &str,
    when: &str,
) -> anyhow::Result<()> {
    info!("command schedule");
    let id = resolve_task_id(engine.tasks(), token)?;
    let date = parse_schedule_expr(when, engine.today())?;
    if !has_calendar_form(date) {
        return Err(anyhow!("cannot schedule for {date}: years must be 0000-9999"));
    }
    engine.reschedule(&id, date)?;
    println!("Task {} scheduled for {}.", short_id(&id), format_date(date));
    Ok(())
}

#[instrument(skip(engine))]
fn cmd_clear_completed<S: Storage, C: Clock>(engine: &mut Engine<S, C>) -> anyhow::Result<()> {
    info!("command clear-completed");
    let removed = engine.clear_completed()?;
    println!("Cleared {removed} completed task(s).");
    Ok(())
}

#[instrument(skip(profiles, renderer, sub))]
fn cmd_profile<P: Storage>(
    profiles: &mut ProfileStore<P>,
    renderer: &mut Renderer,
    sub: ProfileCommand,
) -> anyhow::Result<()> {
    match sub {
        ProfileCommand::Show => renderer.print_profile(profiles.current()),
        ProfileCommand::Login { email, password } => {
            if !profiles.sign_in(&email, &password)? {
                return Err(anyhow!("email and password are required"));
            }
            renderer.print_profile(profiles.current())
        }
        ProfileCommand::Logout => {
            profiles.sign_out()?;
            println!("Signed out.");
            Ok(())
        }
        ProfileCommand::Update {
            username,
            avatar,
            clear_avatar,
        } => {
            if !profiles.is_signed_in() {
                return Err(anyhow!("not signed in"));
            }
            let avatar_url = if clear_avatar { Some(None) } else { avatar.map(Some) };
            profiles.update(ProfileUpdate {
                username,
                avatar_url,
            })?;
            renderer.print_profile(profiles.current())
        }
    }
}

fn warn_unknown_category(category: Option<&str>) {
    if let Some(id) = category.map(str::trim)
        && !id.is_empty()
        && find_category(id).is_none()
    {
        warn!(category = %id, "category is not in the catalog; it will not match any category view");
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::{default_selection, resolve_task_id};
    use crate::config::Config;
    use crate::selection::{CategoryScope, StatusFilter};
    use crate::task::Task;

    fn task_with_id(id: &str) -> Task {
        let now = Utc
            .with_ymd_and_hms(2026, 1, 1, 0, 0, 0)
            .single()
            .expect("valid now");
        let mut task = Task::new_active("t".to_string(), None, now, now.date_naive());
        task.id = id.to_string();
        task
    }

    #[test]
    fn resolves_exact_and_unique_prefix() {
        let tasks = vec![task_with_id("abc123"), task_with_id("abd456"), task_with_id("ab")];

        assert_eq!(resolve_task_id(&tasks, "ab").expect("exact"), "ab");
        assert_eq!(resolve_task_id(&tasks, "abc").expect("prefix"), "abc123");
        assert!(resolve_task_id(&tasks, "a").is_err());
        assert!(resolve_task_id(&tasks, "zzz").is_err());
        assert!(resolve_task_id(&tasks, " ").is_err());
    }

    #[test]
    fn default_selection_reads_config() {
        let mut cfg = Config::default();
        assert_eq!(
            default_selection(&cfg).expect("defaults"),
            crate::selection::Selection::default()
        );

        cfg.apply_overrides(vec![
            ("default.status".to_string(), "completed".to_string()),
            ("default.scope".to_string(), "health".to_string()),
        ]);
        let selection = default_selection(&cfg).expect("overrides");
        assert_eq!(selection.status, StatusFilter::Completed);
        assert_eq!(selection.scope, CategoryScope::category("health"));

        cfg.apply_overrides(vec![("default.status".to_string(), "someday".to_string())]);
        assert!(default_selection(&cfg).is_err());
    }
}
