use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::domain::errors::ClientResult;
use crate::domain::ports::{PageFetcher, RemoteGateway};
use crate::models::Page;

/// Fetches pages of `T` from a paged list endpoint via `page`/`size` query
/// parameters.
pub struct GatewayPageFetcher<T> {
    gateway: Arc<dyn RemoteGateway>,
    path: String,
    _marker: PhantomData<fn() -> T>,
}

impl<T> GatewayPageFetcher<T> {
    pub fn new(gateway: Arc<dyn RemoteGateway>, path: impl Into<String>) -> Self {
        Self {
            gateway,
            path: path.into(),
            _marker: PhantomData,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

#[async_trait]
impl<T> PageFetcher<T> for GatewayPageFetcher<T>
where
    T: DeserializeOwned + Send + 'static,
{
    async fn fetch_page(&self, page: u32, size: u32) -> ClientResult<Page<T>> {
        let query = [("page", page.to_string()), ("size", size.to_string())];
        let value = self.gateway.get(&self.path, &query).await?;
        Ok(serde_json::from_value(value)?)
    }
}
