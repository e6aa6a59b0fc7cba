use thiserror::Error;

use crate::models::TaskStatus;

/// Coarse classification of a failed call, used by callers to pick between a
/// field-level message, a generic retry notice, or a silent sign-out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NetworkFailure,
    AuthExpired,
    BusinessRuleViolation,
    ServerFault,
    InvalidTransition,
    PermissionDenied,
    Validation,
    Storage,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// No response was received (connect failure, timeout, DNS).
    #[error("Network failure: {0}")]
    NetworkFailure(String),

    /// 401 without an application error code. The session has been torn down.
    #[error("Session expired")]
    AuthExpired,

    /// 4xx carrying an application error code, e.g. `USERNAME_ALREADY_EXISTS`.
    #[error("{message}")]
    BusinessRuleViolation {
        status: u16,
        code: String,
        message: String,
    },

    /// 5xx, an uncoded 4xx, or a payload that could not be decoded.
    #[error("Server fault ({status:?}): {message}")]
    ServerFault {
        status: Option<u16>,
        message: String,
    },

    #[error("Invalid status transition from {from:?} to {to}")]
    InvalidTransition { from: TaskStatus, to: String },

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Validation error: {0}")]
    Validation(String),

    /// Local session storage could not be read or written.
    #[error("Storage error: {0}")]
    Storage(String),
}

impl ClientError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ClientError::NetworkFailure(_) => ErrorKind::NetworkFailure,
            ClientError::AuthExpired => ErrorKind::AuthExpired,
            ClientError::BusinessRuleViolation { .. } => ErrorKind::BusinessRuleViolation,
            ClientError::ServerFault { .. } => ErrorKind::ServerFault,
            ClientError::InvalidTransition { .. } => ErrorKind::InvalidTransition,
            ClientError::PermissionDenied(_) => ErrorKind::PermissionDenied,
            ClientError::Validation(_) => ErrorKind::Validation,
            ClientError::Storage(_) => ErrorKind::Storage,
        }
    }

    pub fn is_business_rule(&self) -> bool {
        matches!(self, ClientError::BusinessRuleViolation { .. })
    }

    /// Failures a paged fetch absorbs locally; the caller may simply retry.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ClientError::NetworkFailure(_) | ClientError::ServerFault { .. }
        )
    }

    pub fn server_fault(message: impl Into<String>) -> Self {
        ClientError::ServerFault {
            status: None,
            message: message.into(),
        }
    }

    /// Text suitable for a dismissible notice. Business rule violations carry the
    /// server's reason; everything else gets a generic retry message.
    pub fn user_message(&self) -> String {
        match self {
            ClientError::BusinessRuleViolation { message, .. } => message.clone(),
            ClientError::Validation(msg) | ClientError::PermissionDenied(msg) => msg.clone(),
            ClientError::InvalidTransition { .. } => {
                "This status change is not allowed".to_string()
            }
            ClientError::AuthExpired => "Your session has expired".to_string(),
            ClientError::NetworkFailure(_)
            | ClientError::ServerFault { .. }
            | ClientError::Storage(_) => {
                "Something went wrong. Please try again.".to_string()
            }
        }
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        ClientError::server_fault(format!("Unexpected payload: {}", err))
    }
}

pub type ClientResult<T> = Result<T, ClientError>;
