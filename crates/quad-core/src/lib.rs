pub mod access;
pub mod comments;
pub mod error;
pub mod posts;
pub mod session;
pub mod votes;

pub use access::AccessGate;
pub use comments::CommentService;
pub use error::CoreError;
pub use posts::PostRepository;
pub use session::{IdentityProvider, SessionStore};
pub use votes::{VoteOutcome, VoteService};

use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::warn;
use uuid::Uuid;

/// SQLite default timestamps are "YYYY-MM-DD HH:MM:SS" without timezone;
/// parse as naive UTC when the RFC 3339 form doesn't match.
pub(crate) fn parse_created_at(raw: &str, context: &str) -> DateTime<Utc> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            warn!("Corrupt created_at '{}' on {}: {}", raw, context, e);
            DateTime::default()
        })
}

pub(crate) fn parse_id(raw: &str, context: &str) -> Uuid {
    raw.parse().unwrap_or_else(|e| {
        warn!("Corrupt id '{}' on {}: {}", raw, context, e);
        Uuid::default()
    })
}

#[cfg(test)]
pub(crate) mod test_support {
    use quad_db::Database;
    use std::sync::Arc;
    use uuid::Uuid;

    pub fn test_db() -> Arc<Database> {
        Arc::new(Database::open_in_memory().unwrap())
    }

    /// Identity that finished sign-up: user row plus profile row.
    pub fn seed_member(db: &Database, username: &str) -> Uuid {
        let id = Uuid::new_v4();
        db.create_user(&id.to_string(), &format!("{}@quad.test", username), "hash")
            .unwrap();
        db.create_profile(&id.to_string(), username).unwrap();
        id
    }

    /// Identity that has not completed a profile.
    pub fn seed_identity(db: &Database, email: &str) -> Uuid {
        let id = Uuid::new_v4();
        db.create_user(&id.to_string(), email, "hash").unwrap();
        id
    }

    pub fn seed_post(db: &Database, author: Uuid, title: &str) -> Uuid {
        let id = Uuid::new_v4();
        db.insert_post(&id.to_string(), title, "content", &author.to_string(), &[])
            .unwrap();
        id
    }
}
