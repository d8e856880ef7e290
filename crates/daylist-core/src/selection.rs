use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use serde::{Deserialize, Serialize};

pub const ALL_SCOPE: &str = "all";
pub const TODAY_SCOPE: &str = "today";

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum StatusFilter {
    All,
    #[default]
    Active,
    Completed,
}

impl StatusFilter {
    pub fn admits(self, completed: bool) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Active => !completed,
            StatusFilter::Completed => completed,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StatusFilter::All => "all",
            StatusFilter::Active => "active",
            StatusFilter::Completed => "completed",
        }
    }
}

impl FromStr for StatusFilter {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(StatusFilter::All),
            "active" | "pending" => Ok(StatusFilter::Active),
            "completed" | "done" => Ok(StatusFilter::Completed),
            other => Err(anyhow!(
                "invalid status filter '{other}'; expected all, active or completed"
            )),
        }
    }
}

impl fmt::Display for StatusFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Date/category dimension of the view.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub enum CategoryScope {
    /// Tasks scheduled for the current date.
    #[default]
    Today,
    All,
    /// Any string; ids outside the catalog simply match nothing.
    Category(String),
}

impl CategoryScope {
    pub fn category(id: impl Into<String>) -> Self {
        CategoryScope::Category(id.into())
    }
}

/// Mirrors the sentinel encoding: `None` is Today, `"all"` is All.
impl From<Option<&str>> for CategoryScope {
    fn from(value: Option<&str>) -> Self {
        match value {
            None => CategoryScope::Today,
            Some(ALL_SCOPE) => CategoryScope::All,
            Some(id) => CategoryScope::Category(id.to_string()),
        }
    }
}

impl FromStr for CategoryScope {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(anyhow!("scope cannot be empty"));
        }
        Ok(match trimmed {
            TODAY_SCOPE => CategoryScope::Today,
            other => CategoryScope::from(Some(other)),
        })
    }
}

impl fmt::Display for CategoryScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CategoryScope::Today => f.write_str(TODAY_SCOPE),
            CategoryScope::All => f.write_str(ALL_SCOPE),
            CategoryScope::Category(id) => f.write_str(id),
        }
    }
}

/// User-chosen view parameters. Holds no task data.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Selection {
    pub status: StatusFilter,
    pub scope: CategoryScope,
    /// Stored verbatim; trimmed when the projection reads it.
    pub search: String,
}

impl Selection {
    pub fn new(status: StatusFilter, scope: CategoryScope, search: impl Into<String>) -> Self {
        Self {
            status,
            scope,
            search: search.into(),
        }
    }

    pub fn set_status_filter(&mut self, status: StatusFilter) {
        self.status = status;
    }

    pub fn set_category_scope(&mut self, scope: CategoryScope) {
        self.scope = scope;
    }

    pub fn set_search_text(&mut self, search: impl Into<String>) {
        self.search = search.into();
    }

    /// The search needle, or `None` when the text is blank.
    pub fn search_needle(&self) -> Option<&str> {
        let trimmed = self.search.trim();
        (!trimmed.is_empty()).then_some(trimmed)
    }
}

#[cfg(test)]
mod tests {
    use super::{CategoryScope, Selection, StatusFilter};

    #[test]
    fn defaults_are_active_today_and_empty() {
        let selection = Selection::default();
        assert_eq!(selection.status, StatusFilter::Active);
        assert_eq!(selection.scope, CategoryScope::Today);
        assert!(selection.search.is_empty());
    }

    #[test]
    fn scope_sentinels() {
        assert_eq!(CategoryScope::from(None), CategoryScope::Today);
        assert_eq!(CategoryScope::from(Some("all")), CategoryScope::All);
        assert_eq!(
            "work".parse::<CategoryScope>().expect("parse scope"),
            CategoryScope::category("work")
        );
        assert_eq!(
            "today".parse::<CategoryScope>().expect("parse scope"),
            CategoryScope::Today
        );
        assert!("  ".parse::<CategoryScope>().is_err());
    }

    #[test]
    fn search_text_is_kept_verbatim_and_trimmed_on_read() {
        let mut selection = Selection::default();
        selection.set_search_text("  milk ");
        assert_eq!(selection.search, "  milk ");
        assert_eq!(selection.search_needle(), Some("milk"));

        selection.set_search_text("   ");
        assert_eq!(selection.search_needle(), None);
    }

    #[test]
    fn status_filter_parsing() {
        assert_eq!("ALL".parse::<StatusFilter>().expect("parse"), StatusFilter::All);
        assert_eq!(
            "completed".parse::<StatusFilter>().expect("parse"),
            StatusFilter::Completed
        );
        assert!("later".parse::<StatusFilter>().is_err());
    }
}
