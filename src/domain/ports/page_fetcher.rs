use async_trait::async_trait;

use crate::domain::errors::ClientResult;
use crate::models::Page;

/// Fetches one page of a paged resource. Page indices start at 0.
#[async_trait]
pub trait PageFetcher<T>: Send + Sync {
    async fn fetch_page(&self, page: u32, size: u32) -> ClientResult<Page<T>>;
}
