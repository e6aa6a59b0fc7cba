use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

use crate::domain::ports::Clock;
use crate::events::{EventBus, SyncEvent};
use crate::infrastructure::observability::CACHE_INVALIDATIONS;
use crate::models::{EntityId, MemberScope};

/// Identity of a cached collection or record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollectionKey {
    ProjectList,
    Project(EntityId),
    ProjectMembers(EntityId),
    TeamMembers(EntityId),
    ProjectTasks(EntityId),
    CurrentUser,
}

impl CollectionKey {
    pub fn kind(&self) -> CollectionKind {
        match self {
            CollectionKey::ProjectList => CollectionKind::ProjectList,
            CollectionKey::Project(_) => CollectionKind::Project,
            CollectionKey::ProjectMembers(_) => CollectionKind::ProjectMembers,
            CollectionKey::TeamMembers(_) => CollectionKind::TeamMembers,
            CollectionKey::ProjectTasks(_) => CollectionKind::ProjectTasks,
            CollectionKey::CurrentUser => CollectionKind::CurrentUser,
        }
    }

    pub fn members_of(scope: MemberScope) -> Self {
        match scope {
            MemberScope::Project(id) => CollectionKey::ProjectMembers(id),
            MemberScope::Team(id) => CollectionKey::TeamMembers(id),
        }
    }
}

impl fmt::Display for CollectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CollectionKey::ProjectList => write!(f, "projects"),
            CollectionKey::Project(id) => write!(f, "project:{}", id),
            CollectionKey::ProjectMembers(id) => write!(f, "project:{}:members", id),
            CollectionKey::TeamMembers(id) => write!(f, "team:{}:members", id),
            CollectionKey::ProjectTasks(id) => write!(f, "project:{}:tasks", id),
            CollectionKey::CurrentUser => write!(f, "me"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollectionKind {
    ProjectList,
    Project,
    ProjectMembers,
    TeamMembers,
    ProjectTasks,
    CurrentUser,
}

/// Mutations that may leave cached data stale once they commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutationKind {
    CreateProject,
    UpdateProject,
    DeleteProject,
    LeaveProject,
    UpdateMemberRole,
    RemoveMember,
    CreateTask,
    UpdateTaskStatus,
    UpdateTaskDetails,
    UpdateTaskDeadline,
    UpdateTaskAssignees,
    DeleteTask,
    UpdateProfile,
}

/// Ids the mutated entity hangs off. Only the ids an edge needs are read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AffectedIds {
    pub project_id: Option<EntityId>,
    pub team_id: Option<EntityId>,
}

impl AffectedIds {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn project(id: EntityId) -> Self {
        Self {
            project_id: Some(id),
            team_id: None,
        }
    }

    pub fn team(id: EntityId) -> Self {
        Self {
            project_id: None,
            team_id: Some(id),
        }
    }

    pub fn scope(scope: MemberScope) -> Self {
        match scope {
            MemberScope::Project(id) => Self::project(id),
            MemberScope::Team(id) => Self::team(id),
        }
    }
}

/// The invalidation edges: which cached collections a committed mutation affects.
pub fn invalidation_targets(kind: MutationKind, ids: AffectedIds) -> Vec<CollectionKey> {
    match kind {
        MutationKind::CreateProject => vec![CollectionKey::ProjectList],
        MutationKind::UpdateProject | MutationKind::DeleteProject | MutationKind::LeaveProject => {
            let mut keys = vec![CollectionKey::ProjectList];
            keys.extend(ids.project_id.map(CollectionKey::Project));
            keys
        }
        MutationKind::UpdateMemberRole | MutationKind::RemoveMember => {
            let mut keys = Vec::new();
            keys.extend(ids.project_id.map(CollectionKey::ProjectMembers));
            keys.extend(ids.team_id.map(CollectionKey::TeamMembers));
            keys
        }
        MutationKind::CreateTask
        | MutationKind::UpdateTaskStatus
        | MutationKind::UpdateTaskDetails
        | MutationKind::UpdateTaskDeadline
        | MutationKind::UpdateTaskAssignees
        | MutationKind::DeleteTask => ids
            .project_id
            .map(CollectionKey::ProjectTasks)
            .into_iter()
            .collect(),
        MutationKind::UpdateProfile => vec![CollectionKey::CurrentUser],
    }
}

/// How long fetched data stays fresh before the next access refetches it.
#[derive(Debug, Clone)]
pub struct CachePolicy {
    pub default_ttl: Duration,
    pub overrides: HashMap<CollectionKind, Duration>,
}

impl CachePolicy {
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            default_ttl,
            overrides: HashMap::new(),
        }
    }

    pub fn with_ttl(mut self, kind: CollectionKind, ttl: Duration) -> Self {
        self.overrides.insert(kind, ttl);
        self
    }

    pub fn ttl_for(&self, key: &CollectionKey) -> Duration {
        self.overrides
            .get(&key.kind())
            .copied()
            .unwrap_or(self.default_ttl)
    }
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self::new(Duration::minutes(5))
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Freshness {
    fetched_at: Option<DateTime<Utc>>,
    stale: bool,
    /// Sequence number of the last invalidation of this key.
    invalidated_at: u64,
}

#[derive(Debug, Default)]
struct Ledger {
    entries: HashMap<CollectionKey, Freshness>,
    /// Bumped by every invalidation and reset.
    sequence: u64,
    reset_at: u64,
}

/// Taken when a fetch starts and handed back to [`CacheCoordinator::record_fetch`]
/// when it lands. An invalidation or reset in between keeps the key stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchMark(u64);

/// Tracks freshness of every cached collection and record, and marks them stale
/// after mutations commit. Invalidation is never optimistic: nothing is written
/// locally, the next read simply refetches.
pub struct CacheCoordinator {
    policy: CachePolicy,
    clock: Arc<dyn Clock>,
    ledger: Mutex<Ledger>,
    event_bus: Option<EventBus>,
}

impl CacheCoordinator {
    pub fn new(policy: CachePolicy, clock: Arc<dyn Clock>) -> Self {
        Self {
            policy,
            clock,
            ledger: Mutex::new(Ledger::default()),
            event_bus: None,
        }
    }

    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    fn lock(&self) -> MutexGuard<'_, Ledger> {
        self.ledger.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn begin_fetch(&self) -> FetchMark {
        FetchMark(self.lock().sequence)
    }

    /// A successful fetch of `key`, started at `mark`, just landed. If `key` was
    /// invalidated (or everything was reset) while it was in flight, the data
    /// may predate the mutation and the key stays stale.
    pub fn record_fetch(&self, key: CollectionKey, mark: FetchMark) {
        let now = self.clock.now();
        let mut ledger = self.lock();
        let reset_at = ledger.reset_at;
        let entry = ledger.entries.entry(key).or_default();
        entry.fetched_at = Some(now);
        entry.stale = entry.invalidated_at.max(reset_at) > mark.0;
        if entry.stale {
            debug!("Fetch of {} overtaken by an invalidation, still stale", key);
        } else {
            debug!("Recorded fetch of {}", key);
        }
    }

    /// True if `key` was never fetched, was invalidated, or has outlived its TTL.
    pub fn needs_refetch(&self, key: CollectionKey) -> bool {
        let ledger = self.lock();
        match ledger.entries.get(&key) {
            None => true,
            Some(freshness) => self.is_expired(&key, freshness),
        }
    }

    /// True if `key` was fetched before but can no longer be trusted.
    pub fn is_stale(&self, key: CollectionKey) -> bool {
        let ledger = self.lock();
        ledger
            .entries
            .get(&key)
            .is_some_and(|freshness| self.is_expired(&key, freshness))
    }

    fn is_expired(&self, key: &CollectionKey, freshness: &Freshness) -> bool {
        if freshness.stale {
            return true;
        }
        match freshness.fetched_at {
            Some(at) => self.clock.now() - at >= self.policy.ttl_for(key),
            None => true,
        }
    }

    /// Marks `key` stale. Returns whether it had been fetched before.
    pub fn invalidate(&self, key: CollectionKey) -> bool {
        let mut ledger = self.lock();
        ledger.sequence += 1;
        let sequence = ledger.sequence;
        let entry = ledger.entries.entry(key).or_default();
        let was_fetched = entry.fetched_at.is_some();
        entry.stale = true;
        entry.invalidated_at = sequence;
        was_fetched
    }

    /// Applies the invalidation edges of a committed mutation. Returns the keys
    /// marked stale.
    pub fn on_mutation_success(&self, kind: MutationKind, ids: AffectedIds) -> Vec<CollectionKey> {
        let targets = invalidation_targets(kind, ids);
        if targets.is_empty() {
            warn!(
                "Mutation {:?} committed without the ids its invalidation needs: {:?}",
                kind, ids
            );
            return targets;
        }

        let timestamp = self.clock.now().to_rfc3339();
        for key in &targets {
            self.invalidate(*key);
            metrics::counter!(CACHE_INVALIDATIONS).increment(1);
            if let Some(bus) = &self.event_bus {
                bus.publish(SyncEvent::CollectionInvalidated {
                    key: *key,
                    cause: kind,
                    timestamp: timestamp.clone(),
                });
            }
        }

        info!("Mutation {:?} invalidated {:?}", kind, targets);
        targets
    }

    /// Stops tracking `key`, e.g. when its collection is evicted.
    pub fn forget(&self, key: CollectionKey) {
        self.lock().entries.remove(&key);
    }

    /// Drops all freshness state when the identity changes. Fetches in flight
    /// land stale, and data cached before the reset is no longer served.
    pub fn reset(&self) {
        let mut ledger = self.lock();
        ledger.entries.clear();
        ledger.sequence += 1;
        ledger.reset_at = ledger.sequence;
        info!("Cache reset");
    }

    /// Changes on every [`reset`](Self::reset). Holders of cached data compare it
    /// against the value seen when the data was stored.
    pub fn reset_mark(&self) -> u64 {
        self.lock().reset_at
    }

    pub fn tracked_keys(&self) -> Vec<CollectionKey> {
        self.lock().entries.keys().copied().collect()
    }
}
