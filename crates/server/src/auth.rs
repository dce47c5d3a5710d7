//! Pluggable request authentication keyed by a named security scheme.
//!
//! `anonymous` always succeeds with an empty principal. `bearer` compares the
//! `Authorization: Bearer <token>` header with the configured secret. Any scheme name
//! that is not registered fails closed.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use roster_core::config::{AuthConfig, AuthScheme};
use roster_core::InterfaceError;
use secrecy::{ExposeSecret, SecretString};
use subtle::ConstantTimeEq;
use thiserror::Error;
use tracing::{debug, warn};

use crate::envelope::ApiError;
use crate::middleware::CorrelationId;

const BEARER_PRINCIPAL: &str = "admin";

#[derive(Clone, Debug)]
pub enum SecurityScheme {
    Anonymous,
    Bearer { token: Arc<SecretString> },
}

impl SecurityScheme {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Anonymous => AuthScheme::Anonymous.as_str(),
            Self::Bearer { .. } => AuthScheme::Bearer.as_str(),
        }
    }

    fn authenticate(&self, headers: &HeaderMap) -> Result<Principal, AuthError> {
        match self {
            Self::Anonymous => Ok(Principal::anonymous()),
            Self::Bearer { token } => {
                let presented = bearer_token(headers).ok_or(AuthError::MissingCredentials)?;
                if tokens_match(presented, token.expose_secret()) {
                    Ok(Principal::named(BEARER_PRINCIPAL))
                } else {
                    Err(AuthError::InvalidCredentials)
                }
            }
        }
    }
}

/// Identity attached to an authenticated request. Anonymous callers carry no name.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Principal {
    pub name: Option<String>,
}

impl Principal {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self { name: Some(name.into()) }
    }

    pub fn is_anonymous(&self) -> bool {
        self.name.is_none()
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("unknown security scheme `{name}`")]
    UnknownScheme { name: String },
    #[error("security scheme `{scheme}` requires a configured secret")]
    MissingSecret { scheme: &'static str },
    #[error("missing bearer credentials")]
    MissingCredentials,
    #[error("invalid bearer credentials")]
    InvalidCredentials,
}

#[derive(Clone, Debug)]
pub struct Authenticator {
    schemes: Arc<HashMap<&'static str, SecurityScheme>>,
    required: &'static str,
}

impl Authenticator {
    pub fn anonymous() -> Self {
        let mut schemes = HashMap::new();
        schemes.insert(SecurityScheme::Anonymous.name(), SecurityScheme::Anonymous);
        Self { schemes: Arc::new(schemes), required: AuthScheme::Anonymous.as_str() }
    }

    pub fn from_config(config: &AuthConfig) -> Result<Self, AuthError> {
        let mut schemes = HashMap::new();
        schemes.insert(SecurityScheme::Anonymous.name(), SecurityScheme::Anonymous);

        if let Some(token) = config.bearer_token.as_ref() {
            if !token.expose_secret().trim().is_empty() {
                let bearer = SecurityScheme::Bearer {
                    token: Arc::new(SecretString::from(token.expose_secret().to_string())),
                };
                schemes.insert(bearer.name(), bearer);
            }
        }

        let required = config.scheme.as_str();
        if !schemes.contains_key(required) {
            return Err(AuthError::MissingSecret { scheme: required });
        }

        Ok(Self { schemes: Arc::new(schemes), required })
    }

    pub fn required_scheme(&self) -> &'static str {
        self.required
    }

    /// Authenticates against the scheme this service was configured to require.
    pub fn authenticate(&self, headers: &HeaderMap) -> Result<Principal, AuthError> {
        self.authenticate_named(self.required, headers)
    }

    pub fn authenticate_named(
        &self,
        scheme: &str,
        headers: &HeaderMap,
    ) -> Result<Principal, AuthError> {
        let Some(registered) = self.schemes.get(scheme) else {
            return Err(AuthError::UnknownScheme { name: scheme.to_string() });
        };
        registered.authenticate(headers)
    }
}

fn tokens_match(presented: &str, expected: &str) -> bool {
    presented.as_bytes().ct_eq(expected.as_bytes()).into()
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (kind, token) = value.split_once(' ')?;
    if !kind.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

pub async fn require_principal(
    State(authenticator): State<Authenticator>,
    correlation_id: CorrelationId,
    mut request: Request,
    next: Next,
) -> Response {
    match authenticator.authenticate(request.headers()) {
        Ok(principal) => {
            debug!(
                event_name = "auth.request.accepted",
                correlation_id = %correlation_id.as_str(),
                scheme = authenticator.required_scheme(),
                principal = principal.name.as_deref().unwrap_or("anonymous"),
                "request authenticated"
            );
            request.extensions_mut().insert(principal);
            next.run(request).await
        }
        Err(error) => {
            warn!(
                event_name = "auth.request.rejected",
                correlation_id = %correlation_id.as_str(),
                scheme = authenticator.required_scheme(),
                error = %error,
                "request rejected by authenticator"
            );
            ApiError(InterfaceError::Unauthorized {
                message: error.to_string(),
                correlation_id: correlation_id.0,
            })
            .into_response()
        }
    }
}
