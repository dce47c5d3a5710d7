use std::fmt;

use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{field} is required and must not be empty")]
    MissingField { field: &'static str },
    #[error("body id `{body}` does not match path id `{path}`; customer ids are immutable")]
    IdMismatch { path: String, body: String },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StorageErrorKind {
    /// Unique or primary-key constraint rejected the write.
    Constraint,
    Connection,
    Engine,
    /// A stored row could not be mapped back into a domain record.
    Decode,
}

impl StorageErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Constraint => "constraint",
            Self::Connection => "connection",
            Self::Engine => "engine",
            Self::Decode => "decode",
        }
    }
}

impl fmt::Display for StorageErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("storage {kind} failure: {message}")]
pub struct StorageError {
    kind: StorageErrorKind,
    message: String,
    #[source]
    source: Option<BoxError>,
}

impl StorageError {
    pub fn new(kind: StorageErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into(), source: None }
    }

    pub fn constraint(message: impl Into<String>) -> Self {
        Self::new(StorageErrorKind::Constraint, message)
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::new(StorageErrorKind::Decode, message)
    }

    pub fn with_source(mut self, source: impl Into<BoxError>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn kind(&self) -> StorageErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl ServiceError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        match self {
            Self::Validation(error) => {
                InterfaceError::BadRequest { message: error.to_string(), correlation_id }
            }
            Self::Storage(error) => match error.kind() {
                StorageErrorKind::Constraint => {
                    InterfaceError::Conflict { message: error.to_string(), correlation_id }
                }
                StorageErrorKind::Connection => {
                    InterfaceError::ServiceUnavailable { message: error.to_string(), correlation_id }
                }
                StorageErrorKind::Engine | StorageErrorKind::Decode => {
                    InterfaceError::Internal { message: error.to_string(), correlation_id }
                }
            },
        }
    }
}

/// Client-facing classification of a failed request.
///
/// `message` holds the diagnostic text for logs. Only `BadRequest` messages are safe to
/// show to clients; use [`InterfaceError::user_message`] for everything else.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("unauthorized: {message}")]
    Unauthorized { message: String, correlation_id: String },
    #[error("not found: {message}")]
    NotFound { message: String, correlation_id: String },
    #[error("conflict: {message}")]
    Conflict { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => "Validation Failed",
            Self::Unauthorized { .. } => "Unauthorized",
            Self::NotFound { .. } => "Not Found",
            Self::Conflict { .. } => "A customer with the same id or email already exists",
            Self::ServiceUnavailable { .. } => {
                "The service is temporarily unavailable. Please retry shortly."
            }
            Self::Internal { .. } => "Internal Server Error",
        }
    }

    /// Stable machine-readable code carried in failure envelopes.
    pub fn code(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => "validation_failed",
            Self::Unauthorized { .. } => "unauthorized",
            Self::NotFound { .. } => "not_found",
            Self::Conflict { .. } => "conflict",
            Self::ServiceUnavailable { .. } => "service_unavailable",
            Self::Internal { .. } => "internal_error",
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::BadRequest { correlation_id, .. }
            | Self::Unauthorized { correlation_id, .. }
            | Self::NotFound { correlation_id, .. }
            | Self::Conflict { correlation_id, .. }
            | Self::ServiceUnavailable { correlation_id, .. }
            | Self::Internal { correlation_id, .. } => correlation_id,
        }
    }

    /// Detail that may be returned to the caller verbatim.
    pub fn client_detail(&self) -> Option<&str> {
        match self {
            Self::BadRequest { message, .. } => Some(message),
            _ => None,
        }
    }
}
