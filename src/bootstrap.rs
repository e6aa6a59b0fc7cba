use crate::config::Config;
use crate::domain::errors::ClientResult;
use crate::domain::ports::{Clock, RemoteGateway, SessionStore, TaskSpawner};
use crate::events::EventBus;
use crate::infrastructure::http::HttpGateway;
use crate::infrastructure::persistence::FileSessionStore;
use crate::infrastructure::runtime::clock::SystemClock;
use crate::infrastructure::runtime::tokio::TokioTaskSpawner;
use crate::services::{
    AuthService, CacheCoordinator, CachePolicy, MutationService, QueryService, Session,
    TeardownCallback,
};
use std::sync::Arc;

/// Everything a host application needs, wired once at startup.
pub struct ClientContext {
    pub config: Config,
    pub session: Arc<Session>,
    pub event_bus: EventBus,
    pub clock: Arc<dyn Clock>,
    pub task_spawner: Arc<dyn TaskSpawner>,
    pub cache: Arc<CacheCoordinator>,
    pub gateway: Arc<dyn RemoteGateway>,
    pub queries: Arc<QueryService>,
    pub mutations: Arc<MutationService>,
    pub auth: AuthService,
}

/// Builds the client against the configured API and restores any persisted session.
pub async fn build_client(
    config: Config,
    on_teardown: Option<TeardownCallback>,
) -> ClientResult<ClientContext> {
    let store = Arc::new(FileSessionStore::new(config.session_file.clone())) as Arc<dyn SessionStore>;
    build_client_with_store(config, store, on_teardown).await
}

pub async fn build_client_with_store(
    config: Config,
    store: Arc<dyn SessionStore>,
    on_teardown: Option<TeardownCallback>,
) -> ClientResult<ClientContext> {
    let clock = Arc::new(SystemClock::new()) as Arc<dyn Clock>;
    let task_spawner = Arc::new(TokioTaskSpawner::new()) as Arc<dyn TaskSpawner>;

    let event_bus = EventBus::default();
    tracing::info!("Event bus initialized");

    let cache = Arc::new(
        CacheCoordinator::new(CachePolicy::new(config.collection_ttl()), clock.clone())
            .with_event_bus(event_bus.clone()),
    );

    let mut session = Session::new(store)
        .with_event_bus(event_bus.clone(), clock.clone())
        .with_cache(cache.clone());
    if let Some(callback) = on_teardown {
        session = session.with_teardown(callback);
    }
    let session = Arc::new(session);
    if session.restore().await? {
        tracing::info!("Resuming persisted session");
    }

    let gateway = Arc::new(HttpGateway::new(&config, session.clone())?) as Arc<dyn RemoteGateway>;
    tracing::info!("HTTP gateway initialized for {}", config.api_base_url);

    let queries = Arc::new(QueryService::new(
        gateway.clone(),
        cache.clone(),
        config.page_size,
    ));
    let mutations = Arc::new(MutationService::new(gateway.clone(), cache.clone()));
    let auth = AuthService::new(
        gateway.clone(),
        session.clone(),
        cache.clone(),
        queries.clone(),
    );

    Ok(ClientContext {
        config,
        session,
        event_bus,
        clock,
        task_spawner,
        cache,
        gateway,
        queries,
        mutations,
        auth,
    })
}
