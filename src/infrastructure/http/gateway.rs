use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::domain::errors::{ClientError, ClientResult};
use crate::domain::ports::{HttpMethod, RemoteGateway};
use crate::services::session_service::Session;

/// Error document returned by the service on 4xx responses.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    code: Option<String>,
    message: Option<String>,
    error: Option<String>,
}

/// [`RemoteGateway`] over HTTPS with bearer-token authentication.
pub struct HttpGateway {
    client: Client,
    base_url: String,
    session: Arc<Session>,
}

impl HttpGateway {
    pub fn new(config: &Config, session: Arc<Session>) -> ClientResult<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| ClientError::NetworkFailure(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.api_base_url.clone(),
            session,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn execute(
        &self,
        method: HttpMethod,
        path: &str,
        builder: RequestBuilder,
    ) -> ClientResult<Option<Value>> {
        let request_id = Uuid::new_v4();
        let mut builder = builder
            .header("Accept", "application/json")
            .header("X-Request-Id", request_id.to_string());
        let token = self.session.token();
        if let Some(token) = &token {
            builder = builder.bearer_auth(token);
        }

        debug!(%request_id, %method, path, "Sending request");

        let response = builder.send().await.map_err(|e| {
            let message = if e.is_timeout() {
                format!("Request timed out: {}", e)
            } else if e.is_connect() {
                format!("Connection failed: {}", e)
            } else {
                format!("Network error: {}", e)
            };
            warn!(%request_id, %method, path, "{}", message);
            ClientError::NetworkFailure(message)
        })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ClientError::NetworkFailure(format!("Failed to read response: {}", e)))?;

        if status.is_success() {
            debug!(%request_id, status = status.as_u16(), "Request succeeded");
            return parse_body(&body);
        }

        let err = classify_failure(status.as_u16(), &body);
        match &err {
            ClientError::AuthExpired => match &token {
                Some(sent) => {
                    info!(%request_id, path, "Token rejected, ending session");
                    self.session.expire_if(sent).await;
                }
                None => {
                    debug!(%request_id, path, "Unauthenticated request rejected");
                }
            },
            ClientError::BusinessRuleViolation { code, .. } => {
                debug!(%request_id, status = status.as_u16(), code = code.as_str(), "Business rule violation");
            }
            other => {
                warn!(%request_id, %method, path, "Request failed: {}", other);
            }
        }
        Err(err)
    }
}

fn to_reqwest(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Get => Method::GET,
        HttpMethod::Post => Method::POST,
        HttpMethod::Patch => Method::PATCH,
        HttpMethod::Delete => Method::DELETE,
    }
}

/// Empty bodies (204, void mutations) decode to `None`.
pub fn parse_body(body: &str) -> ClientResult<Option<Value>> {
    if body.trim().is_empty() {
        return Ok(None);
    }
    Ok(Some(serde_json::from_str(body)?))
}

/// Maps a non-success response to an error kind.
///
/// A 401 without an application error code means the token is no longer valid.
/// A 401 that carries a code (e.g. a wrong current password) is a business rule
/// violation like any other coded 4xx.
pub fn classify_failure(status: u16, body: &str) -> ClientError {
    let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
    let code = parsed.code.filter(|c| !c.trim().is_empty());

    match (status, code) {
        (401, None) => ClientError::AuthExpired,
        (400..=499, Some(code)) => {
            let message = parsed
                .message
                .or(parsed.error)
                .unwrap_or_else(|| code.clone());
            ClientError::BusinessRuleViolation {
                status,
                code,
                message,
            }
        }
        _ => ClientError::ServerFault {
            status: Some(status),
            message: parsed
                .message
                .or(parsed.error)
                .unwrap_or_else(|| format!("HTTP {}", status)),
        },
    }
}

#[async_trait]
impl RemoteGateway for HttpGateway {
    async fn get(&self, path: &str, query: &[(&str, String)]) -> ClientResult<Value> {
        let builder = self.client.get(self.url(path)).query(query);
        self.execute(HttpMethod::Get, path, builder)
            .await?
            .ok_or_else(|| ClientError::server_fault(format!("Empty response from GET {}", path)))
    }

    async fn send(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<Value>,
    ) -> ClientResult<Option<Value>> {
        let mut builder = self.client.request(to_reqwest(method), self.url(path));
        if let Some(body) = body {
            builder = builder.json(&body);
        }
        self.execute(method, path, builder).await
    }
}
