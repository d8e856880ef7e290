use std::io::{self, IsTerminal, Write};

use chrono::NaiveDate;
use chrono_tz::Tz;
use unicode_width::UnicodeWidthStr;

use crate::config::Config;
use crate::datetime::format_date;
use crate::profile::Profile;
use crate::projector::Projection;
use crate::selection::Selection;
use crate::task::{CATEGORIES, Task};

/// Width of the id prefix shown in tables; any unique prefix is accepted back.
pub const SHORT_ID_LEN: usize = 8;

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
    /// Same zone the clock uses for "today", so creation times line up.
    tz: Tz,
}

impl Renderer {
    pub fn new(cfg: &Config, tz: Tz) -> anyhow::Result<Self> {
        let color = cfg.get_bool("color")?.unwrap_or(true);
        Ok(Self { color, tz })
    }

    #[tracing::instrument(skip(self, projection, selection))]
    pub fn print_projection(
        &mut self,
        projection: &Projection,
        selection: &Selection,
        today: NaiveDate,
    ) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();

        if projection.tasks.is_empty() {
            writeln!(out, "No tasks in {} ({}).", selection.scope, selection.status)?;
        } else {
            let rows = projection
                .tasks
                .iter()
                .map(|task| self.task_row(task, today))
                .collect();
            write_table(&mut out, task_headers(), rows)?;
        }

        writeln!(out)?;
        writeln!(
            out,
            "{} active, {} completed",
            projection.view_active_count, projection.view_completed_count
        )?;
        Ok(())
    }

    #[tracing::instrument(skip(self, projection))]
    pub fn print_categories(&mut self, projection: &Projection) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        let headers = vec!["ID".to_string(), "Category".to_string(), "Open".to_string()];

        let rows = CATEGORIES
            .iter()
            .map(|category| {
                vec![
                    self.paint(category.id, "33"),
                    format!("{} {}", category.icon, category.name),
                    projection.category_count(category.id).to_string(),
                ]
            })
            .collect();

        write_table(&mut out, headers, rows)
    }

    #[tracing::instrument(skip(self, projection))]
    pub fn print_summary(&mut self, projection: &Projection, today: NaiveDate) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();

        writeln!(out, "today     {}  ({})", projection.today_count, format_date(today))?;
        writeln!(out, "all       {}", projection.global_active_count)?;
        for category in &CATEGORIES {
            writeln!(
                out,
                "{:<9} {}",
                category.id,
                projection.category_count(category.id)
            )?;
        }
        Ok(())
    }

    #[tracing::instrument(skip(self, profile))]
    pub fn print_profile(&mut self, profile: Option<&Profile>) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        let Some(profile) = profile else {
            writeln!(out, "Not signed in.")?;
            return Ok(());
        };

        writeln!(out, "id        {}", profile.id)?;
        writeln!(out, "username  {}", profile.username)?;
        writeln!(out, "email     {}", profile.email)?;
        writeln!(
            out,
            "avatar    {}",
            profile.avatar_url.clone().unwrap_or_default()
        )?;
        Ok(())
    }

    fn task_row(&self, task: &Task, today: NaiveDate) -> Vec<String> {
        let id = self.paint(short_id(&task.id), "33");
        let mark = if task.completed { "[x]" } else { "[ ]" };

        let date = format_date(task.scheduled_date);
        let date = if task.scheduled_date < today && !task.completed {
            self.paint(&date, "31")
        } else {
            date
        };

        let category = match (task.category(), task.category_id.as_deref()) {
            (Some(category), _) => format!("{} {}", category.icon, category.name),
            (None, Some(unknown)) => unknown.to_string(),
            (None, None) => String::new(),
        };

        let title = if task.completed {
            self.paint(&task.title, "2")
        } else {
            task.title.clone()
        };

        let created = task
            .created_at
            .with_timezone(&self.tz)
            .format("%Y-%m-%d %H:%M")
            .to_string();

        vec![id, mark.to_string(), date, category, title, created]
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color || !io::stdout().is_terminal() {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

pub fn short_id(id: &str) -> &str {
    match id.char_indices().nth(SHORT_ID_LEN) {
        Some((idx, _)) => &id[..idx],
        None => id,
    }
}

fn task_headers() -> Vec<String> {
    ["ID", "", "Date", "Category", "Title", "Created"]
        .into_iter()
        .map(str::to_string)
        .collect()
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    for idx in 0..column_count {
        write!(writer, "{:width$} ", headers[idx], width = widths[idx])?;
    }
    writeln!(writer)?;

    for idx in 0..column_count {
        write!(writer, "{:-<width$} ", "", width = widths[idx])?;
    }
    writeln!(writer)?;

    for row in rows {
        for idx in 0..column_count {
            let cell = &row[idx];
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = widths[idx].saturating_sub(visible_width);
            write!(writer, "{}{} ", cell, " ".repeat(padding))?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}
