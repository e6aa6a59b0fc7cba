use async_trait::async_trait;

use crate::domain::errors::ClientResult;

/// Fixed key the session token is persisted under.
pub const SESSION_TOKEN_KEY: &str = "session_token";

/// Small persistent key/value storage for opaque session state.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self, key: &str) -> ClientResult<Option<String>>;
    async fn save(&self, key: &str, value: &str) -> ClientResult<()>;
    async fn remove(&self, key: &str) -> ClientResult<()>;
}
