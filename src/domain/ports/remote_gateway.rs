use async_trait::async_trait;
use serde_json::Value;
use std::fmt;

use crate::domain::errors::ClientResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Patch,
    Delete,
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HttpMethod::Get => write!(f, "GET"),
            HttpMethod::Post => write!(f, "POST"),
            HttpMethod::Patch => write!(f, "PATCH"),
            HttpMethod::Delete => write!(f, "DELETE"),
        }
    }
}

/// Authenticated access to the remote service.
///
/// Implementations attach the session token, classify failures into
/// [`crate::domain::errors::ClientError`] kinds and tear the session down when a
/// response reports an expired token. They never retry mutations.
#[async_trait]
pub trait RemoteGateway: Send + Sync {
    /// GET a JSON document.
    async fn get(&self, path: &str, query: &[(&str, String)]) -> ClientResult<Value>;

    /// Issue a mutation. Returns the response body, or `None` for an empty body.
    async fn send(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<Value>,
    ) -> ClientResult<Option<Value>>;
}
