use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::AppState;

// Token issuance lives with the identity service; this module only
// validates bearer tokens on incoming requests.

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id.
    pub sub: String,
    #[serde(default)]
    pub role: Option<String>,
    pub exp: i64,
}

impl Claims {
    pub fn is_admin(&self) -> bool {
        self.role.as_deref() == Some("admin")
    }
}

pub fn decode_token(secret: &str, token: &str) -> AppResult<Claims> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )?;
    Ok(data.claims)
}

fn bearer_token(parts: &Parts) -> AppResult<&str> {
    let auth_header = parts
        .headers
        .get(http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            tracing::debug!("Missing or invalid Authorization header");
            AppError::Unauthorized
        })?;

    if !auth_header.to_ascii_lowercase().starts_with("bearer ") {
        tracing::debug!("Authorization header doesn't start with 'Bearer '");
        return Err(AppError::Unauthorized);
    }

    let token = auth_header[7..].trim();
    if token.is_empty() {
        return Err(AppError::Unauthorized);
    }

    Ok(token)
}

pub struct AuthUser(pub Claims);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?;
        let claims = decode_token(&state.config.auth.jwt_secret, token).map_err(|e| {
            tracing::debug!("Failed to validate bearer token: {:?}", e);
            e
        })?;
        Ok(AuthUser(claims))
    }
}

pub struct AdminUser(pub Claims);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let AuthUser(claims) = AuthUser::from_request_parts(parts, state).await?;
        if !claims.is_admin() {
            return Err(AppError::Forbidden);
        }
        Ok(AdminUser(claims))
    }
}

/// Mint a short-lived token for handler tests.
#[cfg(test)]
pub(crate) fn make_token(secret: &str, sub: &str, role: Option<&str>) -> String {
    use jsonwebtoken::{encode, EncodingKey, Header};

    let claims = Claims {
        sub: sub.to_string(),
        role: role.map(str::to_string),
        exp: (chrono::Utc::now() + chrono::Duration::hours(1)).timestamp(),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap()
}
