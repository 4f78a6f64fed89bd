use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Donor comments start inactive and are promoted to active only when the
/// donation they rode in on is confirmed approved, so comments for unpaid
/// or failed donations are never displayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommentStatus {
    Inactive,
    Active,
}

impl CommentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inactive => "inactive",
            Self::Active => "active",
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Comment {
    pub id: Uuid,
    pub campaign_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub body: String,
    pub anonymous: bool,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewComment {
    pub campaign_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub body: String,
    pub anonymous: bool,
}
