use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Session transitions emitted by the session store. Delivered at most
/// once per transition to each subscriber; transitions from other
/// processes carry no ordering guarantee.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum SessionEvent {
    /// A session was established.
    SignedIn { user_id: Uuid },

    /// The session was cleared (explicit sign-out or failed refresh).
    SignedOut,

    /// The identity provider confirmed the session is still valid.
    Refreshed { user_id: Uuid },
}
