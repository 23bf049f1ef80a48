use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A title or message carried in both platform languages.
/// `primary` is English, `secondary` is Arabic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bilingual {
    pub primary: String,
    pub secondary: String,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct NotificationTemplate {
    pub id: String,
    /// Identity of the template; immutable once created.
    pub notification_type: String,
    pub module: String,
    pub title_primary: String,
    pub title_secondary: String,
    pub message_primary: String,
    pub message_secondary: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl NotificationTemplate {
    pub fn title(&self) -> Bilingual {
        Bilingual {
            primary: self.title_primary.clone(),
            secondary: self.title_secondary.clone(),
        }
    }

    pub fn message(&self) -> Bilingual {
        Bilingual {
            primary: self.message_primary.clone(),
            secondary: self.message_secondary.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTemplate {
    pub notification_type: String,
    pub module: String,
    pub title_primary: String,
    pub title_secondary: String,
    pub message_primary: String,
    pub message_secondary: String,
}

/// Content update for an existing template. The type itself cannot change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateTemplateContent {
    pub title_primary: String,
    pub title_secondary: String,
    pub message_primary: String,
    pub message_secondary: String,
}
