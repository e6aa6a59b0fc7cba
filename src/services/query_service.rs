use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

use crate::domain::errors::ClientResult;
use crate::domain::ports::{PageFetcher, RemoteGateway};
use crate::infrastructure::http::GatewayPageFetcher;
use crate::models::{EntityId, Member, MemberScope, Project, Task, User};
use crate::services::cache_coordinator::{CacheCoordinator, CollectionKey};
use crate::services::paged_collection::PagedCollectionSync;

/// Single cached records (the current user, a project's details) keyed by
/// [`CollectionKey`], refetched when the coordinator says they are stale.
/// Records stored before a coordinator reset are never served.
pub struct RecordCache<T> {
    cache: Arc<CacheCoordinator>,
    records: Mutex<HashMap<CollectionKey, (T, u64)>>,
}

impl<T: Clone> RecordCache<T> {
    pub fn new(cache: Arc<CacheCoordinator>) -> Self {
        Self {
            cache,
            records: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<CollectionKey, (T, u64)>> {
        self.records.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub fn peek(&self, key: CollectionKey) -> Option<T> {
        let reset_mark = self.cache.reset_mark();
        self.lock()
            .get(&key)
            .filter(|(_, stored_under)| *stored_under == reset_mark)
            .map(|(record, _)| record.clone())
    }

    /// Returns the cached record if fresh, otherwise awaits `fetch` and caches the
    /// result. A failed fetch leaves the previous record in place.
    pub async fn get_or_fetch<F>(&self, key: CollectionKey, fetch: F) -> ClientResult<T>
    where
        F: Future<Output = ClientResult<T>>,
    {
        if !self.cache.needs_refetch(key) {
            if let Some(record) = self.peek(key) {
                return Ok(record);
            }
        }

        debug!("Fetching record {}", key);
        let reset_mark = self.cache.reset_mark();
        let mark = self.cache.begin_fetch();
        let record = fetch.await?;
        self.lock().insert(key, (record.clone(), reset_mark));
        self.cache.record_fetch(key, mark);
        Ok(record)
    }

    pub fn evict(&self, key: CollectionKey) {
        self.lock().remove(&key);
        self.cache.forget(key);
    }

    pub fn clear(&self) {
        self.lock().clear();
    }
}

/// Read side of the client: page fetchers for every paged resource and cached
/// single records.
pub struct QueryService {
    gateway: Arc<dyn RemoteGateway>,
    cache: Arc<CacheCoordinator>,
    page_size: u32,
    users: RecordCache<User>,
    projects: RecordCache<Project>,
}

impl QueryService {
    pub fn new(gateway: Arc<dyn RemoteGateway>, cache: Arc<CacheCoordinator>, page_size: u32) -> Self {
        Self {
            users: RecordCache::new(cache.clone()),
            projects: RecordCache::new(cache.clone()),
            gateway,
            cache,
            page_size,
        }
    }

    pub fn projects_fetcher(&self) -> Arc<dyn PageFetcher<Project>> {
        Arc::new(GatewayPageFetcher::new(self.gateway.clone(), "/projects"))
    }

    pub fn members_fetcher(&self, scope: MemberScope) -> Arc<dyn PageFetcher<Member>> {
        Arc::new(GatewayPageFetcher::new(
            self.gateway.clone(),
            scope.members_path(),
        ))
    }

    pub fn tasks_fetcher(&self, project_id: EntityId) -> Arc<dyn PageFetcher<Task>> {
        Arc::new(GatewayPageFetcher::new(
            self.gateway.clone(),
            format!("/projects/{}/tasks", project_id),
        ))
    }

    /// An empty collection slot sharing this client's cache and page size.
    pub fn collection<T>(&self) -> PagedCollectionSync<T>
    where
        T: crate::models::Identifiable + Clone + Send + Sync + 'static,
    {
        PagedCollectionSync::new(self.cache.clone(), self.page_size)
    }

    pub async fn current_user(&self) -> ClientResult<User> {
        self.users
            .get_or_fetch(CollectionKey::CurrentUser, self.fetch_json("/users/me"))
            .await
    }

    pub async fn project(&self, project_id: EntityId) -> ClientResult<Project> {
        let path = format!("/projects/{}", project_id);
        self.projects
            .get_or_fetch(CollectionKey::Project(project_id), self.fetch_json(&path))
            .await
    }

    /// Drops every cached record, e.g. after logout.
    pub fn clear(&self) {
        self.users.clear();
        self.projects.clear();
    }

    async fn fetch_json<T: DeserializeOwned>(&self, path: &str) -> ClientResult<T> {
        let value = self.gateway.get(path, &[]).await?;
        Ok(serde_json::from_value(value)?)
    }
}
