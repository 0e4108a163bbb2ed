// Authentication - HS256 bearer tokens issued by the platform's auth service

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::AppState;

/// JWT claims
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // User ID
    pub exp: i64,    // Expiration
}

/// Authenticated caller, extracted from `Authorization: Bearer <jwt>`
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub uid: String,
}

/// Verify an HS256 token and return its subject
pub fn verify_token(token: &str, secret: &str) -> Result<AuthUser, AppError> {
    if secret.is_empty() {
        return Err(AppError::Unauthorized("JWT_SECRET is not configured".to_string()));
    }

    let validation = Validation::new(Algorithm::HS256);
    let data = decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)
        .map_err(|e| AppError::Unauthorized(format!("invalid token: {}", e)))?;

    if data.claims.sub.is_empty() {
        return Err(AppError::Unauthorized("token has no subject".to_string()));
    }
    Ok(AuthUser {
        uid: data.claims.sub,
    })
}

#[axum::async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::Unauthorized("missing Authorization header".to_string()))?;

        let token = header
            .strip_prefix("Bearer ")
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AppError::Unauthorized("expected a Bearer token".to_string()))?;

        verify_token(token, &state.config.jwt_secret)
    }
}
