//! Bearer-token authentication for the research gateway.

use crate::config::AuthConfig;
use crate::error::AuthError;
use axum::http::{HeaderMap, header};

const BEARER_PREFIX: &str = "Bearer ";

/// Validates `Authorization: Bearer <token>` against the configured secret.
#[derive(Clone)]
pub struct AuthGate {
    token: String,
}

impl std::fmt::Debug for AuthGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthGate")
            .field("token", &"[REDACTED]")
            .finish()
    }
}

impl AuthGate {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(config.token.clone())
    }

    /// Check a raw header value. The scheme prefix is case-sensitive.
    pub fn check(&self, header: Option<&str>) -> Result<(), AuthError> {
        let token = header
            .and_then(|h| h.strip_prefix(BEARER_PREFIX))
            .ok_or(AuthError::MissingOrMalformedHeader)?;
        if token != self.token {
            return Err(AuthError::InvalidToken);
        }
        Ok(())
    }

    /// Check the `Authorization` header of a request.
    ///
    /// A header that is not valid visible ASCII counts as malformed.
    pub fn check_headers(&self, headers: &HeaderMap) -> Result<(), AuthError> {
        match headers.get(header::AUTHORIZATION) {
            None => self.check(None),
            Some(value) => {
                let value = value
                    .to_str()
                    .map_err(|_| AuthError::MissingOrMalformedHeader)?;
                self.check(Some(value))
            }
        }
    }
}
