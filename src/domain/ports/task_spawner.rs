use futures::future::BoxFuture;

/// Runs work detached from the caller, so a mutation started by a screen that is
/// navigated away from still completes and invalidates its caches.
pub trait TaskSpawner: Send + Sync {
    fn spawn(&self, future: BoxFuture<'static, ()>);
}
