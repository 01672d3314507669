use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Proof of authenticated identity held by one client context.
/// Replaced on refresh, cleared on sign-out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub user_id: Uuid,
    pub token: String,
}

/// Application-level completion of a signed-in identity. Identities exist
/// without a profile until the user picks a username; forum features stay
/// locked until then.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub id: Uuid,
    pub username: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    /// Denormalized count of `user_votes` rows for this post.
    pub votes: i64,
    pub author_id: Uuid,
    pub author_username: String,
    pub created_at: DateTime<Utc>,
    pub tags: Vec<String>,
}

/// Comments are append-only; there is no edit or delete.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub id: Uuid,
    pub post_id: Uuid,
    pub user_id: Uuid,
    pub author_display: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}
