//! Bearer token authentication middleware.
//!
//! Extracts `Authorization: Bearer <token>`, hashes it, matches the
//! hash against `users.token_hash`, and injects the resulting
//! [`Caller`] into request extensions for downstream handlers.

use axum::http::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use rusqlite::{params, OptionalExtension};

use crate::api::error::ApiError;
use crate::api::types::{hash_token_hex, ApiContext};
use crate::directory::Caller;

/// Require a valid bearer token belonging to a known user.
///
/// Accesses `ApiContext` from request extensions (injected by the
/// Extension layer).
pub async fn require_auth(req: Request<axum::body::Body>, next: Next) -> Response {
    match require_auth_inner(req, next).await {
        Ok(resp) => resp,
        Err(err) => err.into_response(),
    }
}

async fn require_auth_inner(
    mut req: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let ctx: ApiContext = req
        .extensions()
        .get::<ApiContext>()
        .cloned()
        .ok_or(ApiError::Internal("missing API context".into()))?;

    let token = req
        .headers()
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(ApiError::Unauthorized)?
        .to_string();

    let conn = ctx.open_db()?;
    let token_hash = hash_token_hex(&token);
    let row: Option<(String, String)> = conn
        .query_row(
            "SELECT id, role FROM users WHERE token_hash = ?1",
            params![token_hash],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;

    let (user_id, role) = row.ok_or(ApiError::Unauthorized)?;
    let caller = Caller {
        user_id: user_id
            .parse()
            .map_err(|_| ApiError::Internal("malformed user id".into()))?,
        role: role
            .parse()
            .map_err(|_| ApiError::Internal("malformed user role".into()))?,
    };

    req.extensions_mut().insert(caller);
    Ok(next.run(req).await)
}
