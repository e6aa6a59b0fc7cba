use std::sync::Arc;
use tracing::info;

use crate::domain::errors::{ClientError, ClientResult};
use crate::domain::ports::{HttpMethod, RemoteGateway};
use crate::models::{LoginRequest, SignupRequest, TokenResponse};
use crate::services::cache_coordinator::CacheCoordinator;
use crate::services::mutation_service::validate_email;
use crate::services::query_service::QueryService;
use crate::services::session_service::Session;

pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Obtains and discards session tokens.
pub struct AuthService {
    gateway: Arc<dyn RemoteGateway>,
    session: Arc<Session>,
    cache: Arc<CacheCoordinator>,
    queries: Arc<QueryService>,
}

impl AuthService {
    pub fn new(
        gateway: Arc<dyn RemoteGateway>,
        session: Arc<Session>,
        cache: Arc<CacheCoordinator>,
        queries: Arc<QueryService>,
    ) -> Self {
        Self {
            gateway,
            session,
            cache,
            queries,
        }
    }

    pub async fn login(&self, request: LoginRequest) -> ClientResult<()> {
        validate_email(&request.email)?;
        if request.password.is_empty() {
            return Err(ClientError::Validation("Password is required".to_string()));
        }
        self.authenticate("/auth/login", serde_json::to_value(&request)?)
            .await?;
        info!("Logged in as {}", request.email);
        Ok(())
    }

    pub async fn signup(&self, request: SignupRequest) -> ClientResult<()> {
        if request.username.trim().is_empty() {
            return Err(ClientError::Validation("Username is required".to_string()));
        }
        validate_email(&request.email)?;
        if request.password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(ClientError::Validation(format!(
                "Password must be at least {} characters",
                MIN_PASSWORD_LENGTH
            )));
        }
        self.authenticate("/auth/signup", serde_json::to_value(&request)?)
            .await?;
        info!("Signed up as {}", request.email);
        Ok(())
    }

    /// Drops the token and every cached record and freshness entry.
    pub async fn logout(&self) -> ClientResult<()> {
        self.session.end().await?;
        self.cache.reset();
        self.queries.clear();
        info!("Logged out");
        Ok(())
    }

    async fn authenticate(&self, path: &str, body: serde_json::Value) -> ClientResult<()> {
        let response = self
            .gateway
            .send(HttpMethod::Post, path, Some(body))
            .await?
            .ok_or_else(|| ClientError::server_fault("Missing token in response"))?;
        let TokenResponse { token } = serde_json::from_value(response)?;
        if token.is_empty() {
            return Err(ClientError::server_fault("Empty token in response"));
        }

        // A new identity never sees the previous one's cache.
        self.cache.reset();
        self.queries.clear();
        self.session.begin(token).await
    }
}
