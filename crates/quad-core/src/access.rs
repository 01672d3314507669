use std::sync::Arc;

use tracing::warn;
use uuid::Uuid;

use quad_db::Database;

use crate::session::SessionStore;

/// Decides whether forum features (feed, posting, voting, commenting) are
/// enabled. The capability is derived on every read, nothing is cached,
/// so a sign-out is visible synchronously and can never leave a stale
/// "enabled" behind.
#[derive(Clone)]
pub struct AccessGate {
    db: Arc<Database>,
}

impl AccessGate {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// True iff the store holds a session and that identity has completed
    /// its profile.
    pub fn can_access_forum(&self, sessions: &SessionStore) -> bool {
        match sessions.current() {
            Some(session) => self.profile_complete(session.user_id),
            None => false,
        }
    }

    /// Same derivation for callers that carry an explicit user id per
    /// request. A lookup failure counts as no access (fail closed).
    pub fn profile_complete(&self, user_id: Uuid) -> bool {
        match self.db.get_profile(&user_id.to_string()) {
            Ok(profile) => profile.is_some(),
            Err(e) => {
                warn!("Profile lookup failed for {}: {}", user_id, e);
                false
            }
        }
    }
}
