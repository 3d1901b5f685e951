use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A directory entry. The user directory is owned by the external auth
/// layer; this core only reads it for sidebar candidates and stores the
/// few fields the sidebar needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub username: String,
    pub created_at: DateTime<Utc>,
}
