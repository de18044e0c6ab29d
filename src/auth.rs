use axum::extract::FromRef;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Token lifetime for minted tokens (30 days).
const TOKEN_TTL_SECS: i64 = 30 * 24 * 60 * 60;

/// JWT claims carried by a bearer token. `sub` is the user identity that
/// ownership checks compare against stored `author` fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: i64,
}

/// HS256 key pair derived from the shared `AUTH_SECRET`.
#[derive(Clone)]
pub struct AuthKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl AuthKeys {
    pub fn from_secret(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    /// Mint a token for the given identity. Used by tests and operational
    /// tooling; user management itself lives outside this service.
    pub fn issue_token(&self, user_id: &str) -> Result<String, AppError> {
        let claims = Claims {
            sub: user_id.to_string(),
            exp: Utc::now().timestamp() + TOKEN_TTL_SECS,
        };
        jsonwebtoken::encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| AppError::Internal(format!("Failed to sign token: {e}")))
    }

    pub fn verify_token(&self, token: &str) -> Result<Claims, AppError> {
        jsonwebtoken::decode::<Claims>(token, &self.decoding, &Validation::default())
            .map(|data| data.claims)
            .map_err(|_| AppError::Auth("Invalid or expired token".into()))
    }
}

/// The authenticated identity of a request, extracted from the
/// `Authorization: Bearer` header. Missing or invalid tokens reject with 401.
#[derive(Debug, Clone)]
pub struct Identity {
    pub user_id: String,
}

impl<S> FromRequestParts<S> for Identity
where
    AuthKeys: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::Auth("Missing Authorization header".into()))?;

        let token = header
            .strip_prefix("Bearer ")
            .ok_or_else(|| AppError::Auth("Expected a bearer token".into()))?;

        let keys = AuthKeys::from_ref(state);
        let claims = keys.verify_token(token)?;

        Ok(Identity {
            user_id: claims.sub,
        })
    }
}
