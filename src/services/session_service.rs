use std::sync::{Arc, RwLock};
use tracing::{debug, error, info};

use crate::domain::errors::ClientResult;
use crate::domain::ports::{Clock, SessionStore, SESSION_TOKEN_KEY};
use crate::events::{EventBus, SessionEndReason, SyncEvent};
use crate::services::cache_coordinator::CacheCoordinator;

/// Invoked once whenever the session ends, so the host can return to the
/// unauthenticated flow.
pub type TeardownCallback = Arc<dyn Fn(SessionEndReason) + Send + Sync>;

/// The signed-in session: the opaque token and what to do when it goes away.
/// Passed explicitly to the gateway.
pub struct Session {
    store: Arc<dyn SessionStore>,
    token: RwLock<Option<String>>,
    on_teardown: Option<TeardownCallback>,
    event_bus: Option<EventBus>,
    clock: Option<Arc<dyn Clock>>,
    cache: Option<Arc<CacheCoordinator>>,
}

impl Session {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self {
            store,
            token: RwLock::new(None),
            on_teardown: None,
            event_bus: None,
            clock: None,
            cache: None,
        }
    }

    pub fn with_teardown(mut self, callback: TeardownCallback) -> Self {
        self.on_teardown = Some(callback);
        self
    }

    pub fn with_event_bus(mut self, event_bus: EventBus, clock: Arc<dyn Clock>) -> Self {
        self.event_bus = Some(event_bus);
        self.clock = Some(clock);
        self
    }

    /// Resets `cache` whenever the session ends, however it ends.
    pub fn with_cache(mut self, cache: Arc<CacheCoordinator>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Loads a previously persisted token. Returns whether one was found.
    pub async fn restore(&self) -> ClientResult<bool> {
        let token = self.store.load(SESSION_TOKEN_KEY).await?;
        let found = token.is_some();
        *self.write() = token;
        if found {
            info!("Restored persisted session");
        }
        Ok(found)
    }

    pub fn token(&self) -> Option<String> {
        self.token
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.token().is_some()
    }

    /// Stores a freshly issued token.
    pub async fn begin(&self, token: String) -> ClientResult<()> {
        self.store.save(SESSION_TOKEN_KEY, &token).await?;
        *self.write() = Some(token);
        info!("Session started");
        Ok(())
    }

    /// Explicit logout.
    pub async fn end(&self) -> ClientResult<()> {
        let had_token = self.write().take().is_some();
        self.store.remove(SESSION_TOKEN_KEY).await?;
        if had_token {
            self.notify(SessionEndReason::Logout);
        }
        Ok(())
    }

    /// The server rejected the token. Clears it and fires the teardown callback
    /// once, however many requests fail concurrently.
    pub async fn expire(&self) {
        let had_token = self.write().take().is_some();
        if had_token {
            self.tear_down_expired().await;
        }
    }

    /// Expires the session only if `token` is still the current one. A rejection
    /// of a token that was already replaced by a fresh login is ignored.
    pub async fn expire_if(&self, token: &str) -> bool {
        let matched = {
            let mut current = self.write();
            if current.as_deref() == Some(token) {
                *current = None;
                true
            } else {
                false
            }
        };
        if matched {
            self.tear_down_expired().await;
        } else {
            debug!("Ignoring rejection of a superseded token");
        }
        matched
    }

    async fn tear_down_expired(&self) {
        if let Err(e) = self.store.remove(SESSION_TOKEN_KEY).await {
            error!("Failed to clear persisted session token: {}", e);
        }
        info!("Session expired, tearing down");
        self.notify(SessionEndReason::Expired);
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Option<String>> {
        self.token
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn notify(&self, reason: SessionEndReason) {
        if let Some(cache) = &self.cache {
            cache.reset();
        }
        if let (Some(bus), Some(clock)) = (&self.event_bus, &self.clock) {
            bus.publish(SyncEvent::SessionEnded {
                reason,
                timestamp: clock.now().to_rfc3339(),
            });
        }
        if let Some(callback) = &self.on_teardown {
            callback(reason);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::persistence::session_store::InMemorySessionStore;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_session() -> (Session, Arc<InMemorySessionStore>, Arc<AtomicUsize>) {
        let store = Arc::new(InMemorySessionStore::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let session = Session::new(store.clone()).with_teardown(Arc::new(move |_: SessionEndReason| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        (session, store, calls)
    }

    #[tokio::test]
    async fn test_begin_persists_token() {
        let (session, store, _) = counting_session();
        session.begin("abc".to_string()).await.unwrap();

        assert_eq!(session.token().as_deref(), Some("abc"));
        assert_eq!(
            store.load(SESSION_TOKEN_KEY).await.unwrap().as_deref(),
            Some("abc")
        );
    }

    #[tokio::test]
    async fn test_expire_tears_down_once() {
        let (session, store, calls) = counting_session();
        session.begin("abc".to_string()).await.unwrap();

        session.expire().await;
        session.expire().await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!session.is_authenticated());
        assert_eq!(store.load(SESSION_TOKEN_KEY).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_rejected_old_token_leaves_new_session_intact() {
        let (session, store, calls) = counting_session();
        session.begin("old".to_string()).await.unwrap();
        session.begin("new".to_string()).await.unwrap();

        assert!(!session.expire_if("old").await);

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(session.token().as_deref(), Some("new"));
        assert_eq!(
            store.load(SESSION_TOKEN_KEY).await.unwrap().as_deref(),
            Some("new")
        );
    }

    #[tokio::test]
    async fn test_rejected_current_token_expires_once() {
        let (session, store, calls) = counting_session();
        session.begin("abc".to_string()).await.unwrap();

        assert!(session.expire_if("abc").await);
        assert!(!session.expire_if("abc").await);

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!session.is_authenticated());
        assert_eq!(store.load(SESSION_TOKEN_KEY).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_expiry_resets_cache() {
        use crate::infrastructure::runtime::clock::ManualClock;
        use crate::services::cache_coordinator::{CachePolicy, CollectionKey};
        use chrono::Utc;

        let clock = Arc::new(ManualClock::new(Utc::now()));
        let cache = Arc::new(CacheCoordinator::new(CachePolicy::default(), clock));
        let session = Session::new(Arc::new(InMemorySessionStore::new())).with_cache(cache.clone());
        session.begin("abc".to_string()).await.unwrap();
        cache.record_fetch(CollectionKey::CurrentUser, cache.begin_fetch());

        session.expire().await;

        assert!(cache.tracked_keys().is_empty());
    }

    #[tokio::test]
    async fn test_restore_reads_persisted_token() {
        let store = Arc::new(InMemorySessionStore::new());
        store.save(SESSION_TOKEN_KEY, "persisted").await.unwrap();

        let session = Session::new(store);
        assert!(session.restore().await.unwrap());
        assert_eq!(session.token().as_deref(), Some("persisted"));
    }
}
