use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::datetime::iso_timestamp_serde;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Category {
    pub id: &'static str,
    pub name: &'static str,
    pub icon: &'static str,
    pub color: &'static str,
}

pub static CATEGORIES: [Category; 5] = [
    Category {
        id: "personal",
        name: "Personal",
        icon: "👤",
        color: "blue",
    },
    Category {
        id: "work",
        name: "Work",
        icon: "💼",
        color: "purple",
    },
    Category {
        id: "shopping",
        name: "Shopping",
        icon: "🛒",
        color: "green",
    },
    Category {
        id: "health",
        name: "Health",
        icon: "❤️",
        color: "red",
    },
    Category {
        id: "learning",
        name: "Learning",
        icon: "📚",
        color: "yellow",
    },
];

pub fn find_category(id: &str) -> Option<&'static Category> {
    CATEGORIES.iter().find(|category| category.id == id)
}

/// A single tracked item.
///
/// Serialized field names follow the persisted layout (`createdAt`,
/// `scheduledDate`, `categoryId`); `categoryId` is always written, as
/// `null` when the task is uncategorized.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,

    pub title: String,

    pub completed: bool,

    #[serde(with = "iso_timestamp_serde")]
    pub created_at: DateTime<Utc>,

    pub scheduled_date: NaiveDate,

    pub category_id: Option<String>,
}

impl Task {
    /// Builds a fresh, incomplete task scheduled for `today`. The caller is
    /// responsible for trimming `title` and rejecting blank input.
    pub fn new_active(
        title: String,
        category_id: Option<String>,
        now: DateTime<Utc>,
        today: NaiveDate,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            title,
            completed: false,
            created_at: now,
            scheduled_date: today,
            category_id,
        }
    }

    pub fn is_active(&self) -> bool {
        !self.completed
    }

    pub fn is_scheduled_on(&self, date: NaiveDate) -> bool {
        self.scheduled_date == date
    }

    pub fn category(&self) -> Option<&'static Category> {
        self.category_id.as_deref().and_then(find_category)
    }
}
