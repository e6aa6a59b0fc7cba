use crate::domain::ports::TaskSpawner;
use futures::future::BoxFuture;

/// Spawns detached work onto the ambient Tokio runtime.
#[derive(Clone, Default)]
pub struct TokioTaskSpawner;

impl TokioTaskSpawner {
    pub fn new() -> Self {
        Self
    }
}

impl TaskSpawner for TokioTaskSpawner {
    fn spawn(&self, future: BoxFuture<'static, ()>) {
        tokio::spawn(future);
    }
}
