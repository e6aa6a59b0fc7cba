use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, warn};

use crate::domain::errors::{ClientError, ClientResult, ErrorKind};
use crate::domain::ports::PageFetcher;
use crate::infrastructure::observability::{PAGE_FETCHES, PAGE_FETCH_FAILURES};
use crate::models::{EntityId, Identifiable, Page};
use crate::services::cache_coordinator::{CacheCoordinator, CollectionKey, FetchMark};

/// Position of the next page to request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cursor {
    Next(u32),
    Exhausted,
}

/// Read-only snapshot handed to callers. Mutating it has no effect on the
/// collection.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionView<T> {
    pub items: Vec<T>,
    pub is_loading_more: bool,
    pub is_refreshing: bool,
    pub has_more: bool,
    /// Kind of the most recent absorbed fetch failure, cleared by the next success.
    pub last_error: Option<ErrorKind>,
}

impl<T> CollectionView<T> {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// True while any fetch for this collection is outstanding.
    pub fn is_fetching(&self) -> bool {
        self.is_loading_more || self.is_refreshing
    }
}

struct Binding<T> {
    key: CollectionKey,
    fetcher: Arc<dyn PageFetcher<T>>,
}

struct CollectionState<T> {
    binding: Option<Binding<T>>,
    items: Vec<T>,
    positions: HashMap<EntityId, usize>,
    cursor: Cursor,
    initialized: bool,
    page_in_flight: bool,
    refresh_in_flight: bool,
    /// Bumped on rebind and eviction. Arrivals from an older generation are dropped.
    generation: u64,
    /// Bumped when a refresh starts. Pages requested in an older epoch are dropped.
    epoch: u64,
    /// Coordinator reset mark the items were fetched under.
    reset_mark: u64,
    last_error: Option<ErrorKind>,
}

impl<T: Identifiable + Clone> CollectionState<T> {
    fn new() -> Self {
        Self {
            binding: None,
            items: Vec::new(),
            positions: HashMap::new(),
            cursor: Cursor::Next(0),
            initialized: false,
            page_in_flight: false,
            refresh_in_flight: false,
            generation: 0,
            epoch: 0,
            reset_mark: 0,
            last_error: None,
        }
    }

    fn reset(&mut self, binding: Option<Binding<T>>) {
        self.binding = binding;
        self.items.clear();
        self.positions.clear();
        self.cursor = Cursor::Next(0);
        self.initialized = false;
        self.page_in_flight = false;
        self.refresh_in_flight = false;
        self.generation += 1;
        self.last_error = None;
    }

    /// Same key overwrites in place, new keys append in arrival order.
    fn merge(&mut self, content: Vec<T>) {
        for item in content {
            let key = item.key();
            match self.positions.get(&key) {
                Some(&pos) => self.items[pos] = item,
                None => {
                    self.positions.insert(key, self.items.len());
                    self.items.push(item);
                }
            }
        }
    }

    fn view(&self) -> CollectionView<T> {
        CollectionView {
            items: self.items.clone(),
            is_loading_more: self.page_in_flight,
            is_refreshing: self.refresh_in_flight,
            has_more: self.initialized && matches!(self.cursor, Cursor::Next(_)),
            last_error: self.last_error,
        }
    }

    fn ticket(&self, page: u32, mark: FetchMark) -> Option<FetchTicket<T>> {
        self.binding.as_ref().map(|binding| FetchTicket {
            key: binding.key,
            fetcher: binding.fetcher.clone(),
            page,
            generation: self.generation,
            epoch: self.epoch,
            mark,
        })
    }
}

struct FetchTicket<T> {
    key: CollectionKey,
    fetcher: Arc<dyn PageFetcher<T>>,
    page: u32,
    generation: u64,
    epoch: u64,
    mark: FetchMark,
}

/// Incremental fetch-and-merge engine for one paged collection slot.
///
/// At most one page fetch and one refresh are in flight at a time. The merged
/// view holds each identifier at most once, in order of first arrival; only a
/// refresh re-establishes order. The state lock is never held across an await.
///
/// Transient fetch failures (network, server) leave the view untouched and are
/// reported through [`CollectionView::last_error`]. Session expiry and business
/// rule violations propagate as `Err`.
///
/// A reset of the [`CacheCoordinator`] (login, logout, expiry) empties the slot
/// on next access; the binding is kept so the next `load` refetches.
pub struct PagedCollectionSync<T> {
    state: Mutex<CollectionState<T>>,
    cache: Arc<CacheCoordinator>,
    page_size: u32,
}

impl<T> PagedCollectionSync<T>
where
    T: Identifiable + Clone + Send + Sync + 'static,
{
    pub fn new(cache: Arc<CacheCoordinator>, page_size: u32) -> Self {
        let mut state = CollectionState::new();
        state.reset_mark = cache.reset_mark();
        Self {
            state: Mutex::new(state),
            cache,
            page_size: page_size.max(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, CollectionState<T>> {
        let mut state = self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let mark = self.cache.reset_mark();
        if state.reset_mark != mark {
            if let Some(binding) = &state.binding {
                debug!("Cache reset, discarding {}", binding.key);
            }
            let binding = state.binding.take();
            state.reset(binding);
            state.reset_mark = mark;
        }
        state
    }

    pub fn view(&self) -> CollectionView<T> {
        self.lock().view()
    }

    pub fn identity(&self) -> Option<CollectionKey> {
        self.lock().binding.as_ref().map(|b| b.key)
    }

    pub fn cursor(&self) -> Cursor {
        self.lock().cursor
    }

    pub fn is_stale(&self) -> bool {
        match self.identity() {
            Some(key) => self.cache.is_stale(key),
            None => false,
        }
    }

    /// Binds the collection to `key` and makes sure page 0 is fetched once.
    ///
    /// A different key discards the current view. While the first page is in
    /// flight, further calls return the current view without a request. Once
    /// loaded, a call after the collection went stale refreshes it.
    pub async fn load(
        &self,
        key: CollectionKey,
        fetcher: Arc<dyn PageFetcher<T>>,
    ) -> ClientResult<CollectionView<T>> {
        let ticket = {
            let mut state = self.lock();
            let bound_key = state.binding.as_ref().map(|b| b.key);
            if bound_key != Some(key) {
                if let Some(previous) = bound_key {
                    debug!("Collection rebound from {} to {}", previous, key);
                }
                state.reset(Some(Binding { key, fetcher }));
            }

            if state.refresh_in_flight {
                return Ok(state.view());
            }
            if state.initialized && !self.cache.needs_refetch(key) {
                return Ok(state.view());
            }
            self.begin_refresh(&mut state)
        };

        match ticket {
            Some(ticket) => self.run_refresh(ticket).await,
            None => Ok(self.view()),
        }
    }

    /// Requests the next page. A no-op while any fetch is in flight, once the
    /// cursor is exhausted, or while the collection holds nothing.
    pub async fn load_more(&self) -> ClientResult<CollectionView<T>> {
        let ticket = {
            let mut state = self.lock();
            if state.binding.is_none()
                || state.page_in_flight
                || state.refresh_in_flight
                || !state.initialized
                || state.items.is_empty()
            {
                return Ok(state.view());
            }
            let page = match state.cursor {
                Cursor::Next(page) => page,
                Cursor::Exhausted => return Ok(state.view()),
            };
            state.page_in_flight = true;
            state.ticket(page, self.cache.begin_fetch())
        };

        let Some(ticket) = ticket else {
            return Ok(self.view());
        };

        debug!("Fetching page {} of {}", ticket.page, ticket.key);
        metrics::counter!(PAGE_FETCHES, "kind" => "more").increment(1);
        let result = ticket.fetcher.fetch_page(ticket.page, self.page_size).await;
        self.finish_page(ticket, result)
    }

    /// Re-fetches page 0 and replaces the merged view. A no-op while another
    /// refresh is outstanding. A page already in flight is discarded on arrival.
    pub async fn refresh(&self) -> ClientResult<CollectionView<T>> {
        let ticket = {
            let mut state = self.lock();
            if state.refresh_in_flight {
                return Ok(state.view());
            }
            self.begin_refresh(&mut state)
        };

        match ticket {
            Some(ticket) => self.run_refresh(ticket).await,
            None => Ok(self.view()),
        }
    }

    /// Discards the collection. Fetches still in flight are ignored on arrival.
    pub fn evict(&self) {
        let key = {
            let mut state = self.lock();
            let key = state.binding.as_ref().map(|b| b.key);
            state.reset(None);
            key
        };
        if let Some(key) = key {
            self.cache.forget(key);
            debug!("Evicted collection {}", key);
        }
    }

    fn begin_refresh(&self, state: &mut CollectionState<T>) -> Option<FetchTicket<T>> {
        state.binding.as_ref()?;
        state.refresh_in_flight = true;
        state.epoch += 1;
        state.ticket(0, self.cache.begin_fetch())
    }

    async fn run_refresh(&self, ticket: FetchTicket<T>) -> ClientResult<CollectionView<T>> {
        debug!("Refreshing {}", ticket.key);
        metrics::counter!(PAGE_FETCHES, "kind" => "refresh").increment(1);
        let result = ticket.fetcher.fetch_page(0, self.page_size).await;
        self.finish_refresh(ticket, result)
    }

    fn finish_refresh(
        &self,
        ticket: FetchTicket<T>,
        result: ClientResult<Page<T>>,
    ) -> ClientResult<CollectionView<T>> {
        let mut state = self.lock();
        if state.generation != ticket.generation {
            debug!("Dropping refresh of {} for a discarded collection", ticket.key);
            return Self::discard(&state, result);
        }
        state.refresh_in_flight = false;

        match result {
            Ok(page) => {
                state.items.clear();
                state.positions.clear();
                state.cursor = next_cursor(&page, 0);
                state.merge(page.content);
                state.initialized = true;
                state.last_error = None;
                self.cache.record_fetch(ticket.key, ticket.mark);
                debug!("Refreshed {}: {} items", ticket.key, state.items.len());
                Ok(state.view())
            }
            Err(err) => Self::absorb_failure(&mut state, ticket.key, err),
        }
    }

    fn finish_page(
        &self,
        ticket: FetchTicket<T>,
        result: ClientResult<Page<T>>,
    ) -> ClientResult<CollectionView<T>> {
        let mut state = self.lock();
        if state.generation != ticket.generation {
            debug!("Dropping page {} for a discarded collection", ticket.page);
            return Self::discard(&state, result);
        }
        state.page_in_flight = false;

        if state.epoch != ticket.epoch {
            debug!(
                "Dropping page {} of {}: a refresh started meanwhile",
                ticket.page, ticket.key
            );
            return Self::discard(&state, result);
        }

        match result {
            Ok(page) => {
                state.cursor = next_cursor(&page, ticket.page);
                state.merge(page.content);
                state.last_error = None;
                debug!(
                    "Merged page {} of {}: {} items",
                    ticket.page,
                    ticket.key,
                    state.items.len()
                );
                Ok(state.view())
            }
            Err(err) => Self::absorb_failure(&mut state, ticket.key, err),
        }
    }

    /// An arrival nobody waits for any more. Session expiry still surfaces.
    fn discard(
        state: &CollectionState<T>,
        result: ClientResult<Page<T>>,
    ) -> ClientResult<CollectionView<T>> {
        match result {
            Err(ClientError::AuthExpired) => Err(ClientError::AuthExpired),
            _ => Ok(state.view()),
        }
    }

    fn absorb_failure(
        state: &mut CollectionState<T>,
        key: CollectionKey,
        err: ClientError,
    ) -> ClientResult<CollectionView<T>> {
        state.last_error = Some(err.kind());
        if err.is_transient() {
            warn!("Fetch of {} failed, keeping current view: {}", key, err);
            metrics::counter!(PAGE_FETCH_FAILURES).increment(1);
            Ok(state.view())
        } else {
            Err(err)
        }
    }
}

fn next_cursor<T>(page: &Page<T>, requested: u32) -> Cursor {
    if page.last {
        Cursor::Exhausted
    } else {
        Cursor::Next(requested + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::runtime::clock::ManualClock;
    use crate::services::cache_coordinator::CachePolicy;
    use async_trait::async_trait;
    use chrono::Utc;

    #[derive(Debug, Clone, PartialEq)]
    struct Row {
        id: EntityId,
        label: &'static str,
    }

    impl Identifiable for Row {
        fn key(&self) -> EntityId {
            self.id
        }
    }

    struct StaticFetcher {
        pages: Vec<Vec<Row>>,
    }

    #[async_trait]
    impl PageFetcher<Row> for StaticFetcher {
        async fn fetch_page(&self, page: u32, size: u32) -> ClientResult<Page<Row>> {
            let index = page as usize;
            Ok(Page {
                content: self.pages.get(index).cloned().unwrap_or_default(),
                page,
                size,
                total_elements: self.pages.iter().map(Vec::len).sum::<usize>() as u64,
                total_pages: self.pages.len() as u32,
                last: index + 1 >= self.pages.len(),
            })
        }
    }

    fn sync() -> PagedCollectionSync<Row> {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let cache = Arc::new(CacheCoordinator::new(CachePolicy::default(), clock));
        PagedCollectionSync::new(cache, 2)
    }

    #[test]
    fn test_merge_overwrites_in_place() {
        let mut state = CollectionState::new();
        state.merge(vec![Row { id: 1, label: "a" }, Row { id: 2, label: "b" }]);
        state.merge(vec![Row { id: 1, label: "a2" }, Row { id: 3, label: "c" }]);

        let ids: Vec<_> = state.items.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(state.items[0].label, "a2");
    }

    #[test]
    fn test_view_before_load_is_empty() {
        let sync = sync();
        let view = sync.view();
        assert!(view.is_empty());
        assert!(!view.has_more);
        assert!(!view.is_fetching());
        assert_eq!(sync.identity(), None);
    }

    #[tokio::test]
    async fn test_load_more_before_load_is_noop() {
        let sync = sync();
        let view = sync.load_more().await.unwrap();
        assert!(view.is_empty());
        assert_eq!(sync.cursor(), Cursor::Next(0));
    }

    #[tokio::test]
    async fn test_evict_forgets_identity() {
        let sync = sync();
        let fetcher = Arc::new(StaticFetcher {
            pages: vec![vec![Row { id: 1, label: "a" }]],
        });
        sync.load(CollectionKey::ProjectList, fetcher).await.unwrap();
        assert_eq!(sync.view().len(), 1);

        sync.evict();
        assert!(sync.view().is_empty());
        assert_eq!(sync.identity(), None);
    }

    #[tokio::test]
    async fn test_cache_reset_empties_slot_but_keeps_identity() {
        let sync = sync();
        let fetcher = Arc::new(StaticFetcher {
            pages: vec![vec![Row { id: 1, label: "a" }]],
        });
        sync.load(CollectionKey::ProjectList, fetcher.clone()).await.unwrap();

        sync.cache.reset();
        assert!(sync.view().is_empty());
        assert_eq!(sync.identity(), Some(CollectionKey::ProjectList));

        let view = sync.load(CollectionKey::ProjectList, fetcher).await.unwrap();
        assert_eq!(view.len(), 1);
    }
}
