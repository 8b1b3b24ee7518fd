//! Bearer-token gate for the audio routes.
//!
//! The `Authorization` header carries `"<scheme> <token>"`; the scheme is
//! discarded and the token is verified as an HS256 JWT against the
//! process-wide secret. The middleware runs before any handler extractor,
//! so a rejected request never reaches storage.

use crate::errors::AppError;
use axum::{
    extract::{Request, State},
    http::{HeaderValue, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Identity attached to an authenticated request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub id: String,
}

/// Claims carried by an access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub id: String,
    pub exp: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<u64>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("Access Denied")]
    Missing,
    #[error("Invalid Token")]
    Invalid,
}

/// Verifies access tokens with a shared HMAC secret.
pub struct TokenVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl TokenVerifier {
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked against the exact verification time.
        validation.leeway = 0;
        Self {
            key: DecodingKey::from_secret(secret),
            validation,
        }
    }

    /// Verify a bare token (scheme already stripped).
    pub fn verify(&self, token: &str) -> Result<Principal, AuthError> {
        let data = decode::<Claims>(token, &self.key, &self.validation).map_err(|err| {
            debug!("token rejected: {}", err);
            AuthError::Invalid
        })?;
        if data.claims.id.is_empty() {
            return Err(AuthError::Invalid);
        }
        Ok(Principal {
            id: data.claims.id,
        })
    }

    /// Extract the token from an `Authorization` header value and verify it.
    pub fn authenticate(&self, header: Option<&HeaderValue>) -> Result<Principal, AuthError> {
        let value = header.ok_or(AuthError::Missing)?;
        let value = value.to_str().map_err(|_| AuthError::Invalid)?;
        let token = strip_scheme(value).ok_or(AuthError::Invalid)?;
        self.verify(token)
    }
}

/// `"<scheme> <token>"` → `token`.
fn strip_scheme(value: &str) -> Option<&str> {
    let (_scheme, token) = value.trim().split_once(' ')?;
    let token = token.trim();
    if token.is_empty() { None } else { Some(token) }
}

/// Axum middleware: verify the credential, attach the [`Principal`] to the
/// request extensions, or short-circuit with `401`.
pub async fn require_auth(
    State(verifier): State<Arc<TokenVerifier>>,
    mut request: Request,
    next: Next,
) -> Response {
    match verifier.authenticate(request.headers().get(header::AUTHORIZATION)) {
        Ok(principal) => {
            request.extensions_mut().insert(principal);
            next.run(request).await
        }
        Err(err) => {
            debug!(path = %request.uri().path(), "rejecting request: {}", err);
            (
                [(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"))],
                AppError::from(err),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{now_secs, sign_token};

    const SECRET: &[u8] = b"test-secret";

    fn bearer(token: &str) -> HeaderValue {
        HeaderValue::from_str(&format!("Bearer {}", token)).unwrap()
    }

    #[test]
    fn valid_token_yields_principal() {
        let verifier = TokenVerifier::new(SECRET);
        let token = sign_token(SECRET, "user-1", now_secs() + 3600);
        let principal = verifier.authenticate(Some(&bearer(&token))).unwrap();
        assert_eq!(principal.id, "user-1");
    }

    #[test]
    fn missing_header_is_missing() {
        let verifier = TokenVerifier::new(SECRET);
        assert_eq!(verifier.authenticate(None), Err(AuthError::Missing));
    }

    #[test]
    fn scheme_is_discarded_whatever_it_is() {
        let verifier = TokenVerifier::new(SECRET);
        let token = sign_token(SECRET, "user-1", now_secs() + 3600);
        let header = HeaderValue::from_str(&format!("Token {}", token)).unwrap();
        assert!(verifier.authenticate(Some(&header)).is_ok());
    }

    #[test]
    fn header_without_scheme_is_invalid() {
        let verifier = TokenVerifier::new(SECRET);
        let token = sign_token(SECRET, "user-1", now_secs() + 3600);
        let header = HeaderValue::from_str(&token).unwrap();
        assert_eq!(verifier.authenticate(Some(&header)), Err(AuthError::Invalid));
        let header = HeaderValue::from_static("Bearer ");
        assert_eq!(verifier.authenticate(Some(&header)), Err(AuthError::Invalid));
    }

    #[test]
    fn wrong_secret_is_invalid() {
        let verifier = TokenVerifier::new(SECRET);
        let token = sign_token(b"other-secret", "user-1", now_secs() + 3600);
        assert_eq!(
            verifier.authenticate(Some(&bearer(&token))),
            Err(AuthError::Invalid)
        );
    }

    #[test]
    fn expired_token_is_invalid() {
        let verifier = TokenVerifier::new(SECRET);
        let token = sign_token(SECRET, "user-1", now_secs() - 5);
        assert_eq!(
            verifier.authenticate(Some(&bearer(&token))),
            Err(AuthError::Invalid)
        );
    }

    #[test]
    fn garbage_token_is_invalid() {
        let verifier = TokenVerifier::new(SECRET);
        assert_eq!(
            verifier.authenticate(Some(&bearer("not.a.jwt"))),
            Err(AuthError::Invalid)
        );
    }
}
