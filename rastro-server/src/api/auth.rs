//! Bearer-token authentication
//!
//! Login issues an HS256 JWT carrying the user guid; the middleware
//! validates it on every protected route and hands the guid to handlers via
//! a request extension.

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::{ApiError, AppState};

/// Token lifetime (matches the login session length)
const TOKEN_TTL_SECS: i64 = 3600;

/// JWT claims
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// User guid
    pub sub: String,
    pub exp: i64,
    pub iat: i64,
}

/// Signing/verification key pair derived from the configured secret
#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl JwtKeys {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    /// Issue a token for the given user
    pub fn issue(&self, user_guid: &str) -> Result<String, jsonwebtoken::errors::Error> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_guid.to_string(),
            exp: (now + Duration::seconds(TOKEN_TTL_SECS)).timestamp(),
            iat: now.timestamp(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
    }

    /// Validate a token and return its claims
    pub fn verify(&self, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        let validation = Validation::new(Algorithm::HS256);
        decode::<Claims>(token, &self.decoding, &validation).map(|data| data.claims)
    }
}

/// Authenticated user, inserted into request extensions by the middleware
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_guid: String,
}

/// Authentication middleware
///
/// Expects `Authorization: Bearer <token>`. Returns 401 when the header is
/// missing, malformed, or carries an invalid/expired token.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::Unauthorized("Missing Authorization header".to_string()))?;

    let token = header
        .strip_prefix("Bearer ")
        .ok_or_else(|| ApiError::Unauthorized("Expected Bearer token".to_string()))?;

    let claims = state
        .jwt
        .verify(token)
        .map_err(|e| ApiError::Unauthorized(format!("Invalid token: {}", e)))?;

    request.extensions_mut().insert(AuthUser {
        user_guid: claims.sub,
    });

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_and_verify_round_trip() {
        let keys = JwtKeys::new("test-secret");
        let token = keys.issue("user-123").unwrap();

        let claims = keys.verify(&token).unwrap();
        assert_eq!(claims.sub, "user-123");
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let keys = JwtKeys::new("test-secret");
        let token = keys.issue("user-123").unwrap();

        let other = JwtKeys::new("other-secret");
        assert!(other.verify(&token).is_err());
    }

    #[test]
    fn test_expired_token_rejected() {
        let keys = JwtKeys::new("test-secret");
        let now = Utc::now();
        let claims = Claims {
            sub: "user-123".to_string(),
            exp: (now - Duration::seconds(100)).timestamp(),
            iat: (now - Duration::seconds(1000)).timestamp(),
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(b"test-secret"),
        )
        .unwrap();

        assert!(keys.verify(&token).is_err());
    }

    #[test]
    fn test_garbage_token_rejected() {
        let keys = JwtKeys::new("test-secret");
        assert!(keys.verify("not-a-token").is_err());
    }
}
