use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::activity::ActivitySummary;

/// User-to-activity bookmark
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Favorite {
    pub id: Uuid,
    pub user_id: Uuid,
    pub activity_id: Uuid,
    pub created_at: NaiveDateTime,
}

/// Favorited activity as shown on the wishlist page
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct FavoriteActivity {
    pub favorite_id: Uuid,
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub summary: ActivitySummary,
}

/// Outcome of a toggle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FavoriteAction {
    Added,
    Removed,
}

impl FavoriteAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            FavoriteAction::Added => "added",
            FavoriteAction::Removed => "removed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FavoriteToggle {
    pub action: FavoriteAction,
    pub favorited: bool,
}

impl FavoriteToggle {
    pub fn added() -> Self {
        Self {
            action: FavoriteAction::Added,
            favorited: true,
        }
    }

    pub fn removed() -> Self {
        Self {
            action: FavoriteAction::Removed,
            favorited: false,
        }
    }
}
