use std::sync::{Arc, RwLock};

use tokio::sync::broadcast;
use tracing::{debug, warn};

use quad_types::events::SessionEvent;
use quad_types::models::Session;

/// Seam to the identity service. `Ok(None)` means the token no longer
/// maps to a live identity; `Err` is a transport failure.
pub trait IdentityProvider: Send + Sync {
    fn validate(&self, token: &str) -> anyhow::Result<Option<Session>>;
}

/// Single source of truth for "who is signed in right now" in one client
/// context. Two states: signed out (`None`) and signed in; every
/// transition emits exactly one event to subscribers.
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<SessionStoreInner>,
}

struct SessionStoreInner {
    provider: Arc<dyn IdentityProvider>,
    current: RwLock<Option<Session>>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionStore {
    pub fn new(provider: Arc<dyn IdentityProvider>) -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            inner: Arc::new(SessionStoreInner {
                provider,
                current: RwLock::new(None),
                events,
            }),
        }
    }

    /// Last known session, straight from cache. Never round-trips.
    pub fn current(&self) -> Option<Session> {
        self.inner
            .current
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Change notifications: one event per transition, at most once per
    /// subscriber. No ordering guarantee against transitions made from
    /// other processes.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    pub fn sign_in(&self, session: Session) {
        let user_id = session.user_id;
        *self
            .inner
            .current
            .write()
            .unwrap_or_else(|e| e.into_inner()) = Some(session);

        debug!("Session established for {}", user_id);
        let _ = self.inner.events.send(SessionEvent::SignedIn { user_id });
    }

    pub fn sign_out(&self) {
        let previous = self
            .inner
            .current
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .take();

        // Only an actual transition emits an event.
        if previous.is_some() {
            debug!("Session cleared");
            let _ = self.inner.events.send(SessionEvent::SignedOut);
        }
    }

    /// Round trip to the identity provider to confirm the cached session
    /// is still valid. Any provider failure is treated as signed-out, not
    /// as an error: mount-time refresh is best-effort by contract.
    pub fn refresh(&self) -> Option<Session> {
        let token = match self.current() {
            Some(session) => session.token,
            None => return None,
        };

        match self.inner.provider.validate(&token) {
            Ok(Some(session)) => {
                let user_id = session.user_id;
                *self
                    .inner
                    .current
                    .write()
                    .unwrap_or_else(|e| e.into_inner()) = Some(session.clone());

                let _ = self.inner.events.send(SessionEvent::Refreshed { user_id });
                Some(session)
            }
            Ok(None) => {
                self.sign_out();
                None
            }
            Err(e) => {
                warn!("Session refresh failed: {}", e);
                self.sign_out();
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quad_types::events::SessionEvent;
    use tokio::sync::broadcast::error::TryRecvError;
    use uuid::Uuid;

    enum Behavior {
        Valid,
        Invalid,
        Fail,
    }

    struct StubProvider {
        user_id: Uuid,
        behavior: Behavior,
    }

    impl IdentityProvider for StubProvider {
        fn validate(&self, token: &str) -> anyhow::Result<Option<Session>> {
            match self.behavior {
                Behavior::Valid => Ok(Some(Session {
                    user_id: self.user_id,
                    token: token.to_string(),
                })),
                Behavior::Invalid => Ok(None),
                Behavior::Fail => Err(anyhow::anyhow!("network unreachable")),
            }
        }
    }

    fn store(behavior: Behavior) -> (SessionStore, Uuid) {
        let user_id = Uuid::new_v4();
        let store = SessionStore::new(Arc::new(StubProvider { user_id, behavior }));
        (store, user_id)
    }

    fn session(user_id: Uuid) -> Session {
        Session {
            user_id,
            token: "token".into(),
        }
    }

    #[test]
    fn starts_signed_out() {
        let (store, _) = store(Behavior::Valid);
        assert!(store.current().is_none());
        assert!(store.refresh().is_none());
    }

    #[test]
    fn sign_in_and_out_emit_one_event_each() {
        let (store, user_id) = store(Behavior::Valid);
        let mut events = store.subscribe();

        store.sign_in(session(user_id));
        assert_eq!(store.current().unwrap().user_id, user_id);
        assert!(matches!(
            events.try_recv().unwrap(),
            SessionEvent::SignedIn { user_id: id } if id == user_id
        ));

        store.sign_out();
        assert!(store.current().is_none());
        assert!(matches!(events.try_recv().unwrap(), SessionEvent::SignedOut));

        // Signing out while already signed out is not a transition.
        store.sign_out();
        assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));
    }

    #[test]
    fn refresh_confirms_valid_session() {
        let (store, user_id) = store(Behavior::Valid);
        store.sign_in(session(user_id));
        let mut events = store.subscribe();

        let refreshed = store.refresh().unwrap();
        assert_eq!(refreshed.user_id, user_id);
        assert!(matches!(
            events.try_recv().unwrap(),
            SessionEvent::Refreshed { user_id: id } if id == user_id
        ));
    }

    #[test]
    fn refresh_clears_invalidated_session() {
        let (store, user_id) = store(Behavior::Invalid);
        store.sign_in(session(user_id));

        assert!(store.refresh().is_none());
        assert!(store.current().is_none());
    }

    #[test]
    fn refresh_fails_silently_on_provider_error() {
        let (store, user_id) = store(Behavior::Fail);
        store.sign_in(session(user_id));

        // A network failure reads as signed-out, never as a panic or error.
        assert!(store.refresh().is_none());
        assert!(store.current().is_none());
    }
}
