//! API authentication and caller identity.
//!
//! Provides token generation, persistence, and middleware for validating
//! `Authorization: Bearer <token>` headers on protected endpoints, plus the
//! [`Caller`] extractor that reads the verified identity headers forwarded
//! by the front end.

use axum::extract::{FromRequestParts, Request, State};
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use rand::Rng;

use seatline_core::types::{Identity, Role, UserId};

use crate::error::ApiError;
use crate::state::AppState;

/// Header carrying the caller's user id.
pub const USER_ID_HEADER: &str = "x-user-id";
/// Header carrying the caller's role (`customer`, `manager` or `admin`).
pub const USER_ROLE_HEADER: &str = "x-user-role";

/// Generate a random 32-character hex token.
pub fn generate_token() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; 16] = rng.random();
    hex::encode(bytes)
}

/// Load token from file, or generate and save a new one.
pub fn load_or_generate_token(token_path: &std::path::Path) -> String {
    if let Ok(contents) = std::fs::read_to_string(token_path) {
        let token = contents.trim().to_string();
        if !token.is_empty() {
            tracing::info!("API token loaded from {}", token_path.display());
            return token;
        }
    }

    let token = generate_token();

    if let Some(parent) = token_path.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            tracing::warn!(error = %e, "Failed to create API token directory {}", parent.display());
        }
    }
    if let Err(e) = std::fs::write(token_path, &token) {
        tracing::warn!(error = %e, "Failed to save API token to {}", token_path.display());
    } else {
        // Owner-only.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Err(e) =
                std::fs::set_permissions(token_path, std::fs::Permissions::from_mode(0o600))
            {
                tracing::warn!(error = %e, "API token file {} may be readable by other users", token_path.display());
            }
        }
        tracing::info!("API token saved to {}", token_path.display());
    }

    token
}

fn unauthorized(message: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({
            "error": "unauthorized",
            "message": message
        })),
    )
        .into_response()
}

/// Middleware that validates Bearer token authentication.
///
/// Returns 401 if the header is missing or the token does not match
/// `AppState.api_token`.
pub async fn require_auth(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let Some(value) = req.headers().get("authorization") else {
        return unauthorized("Missing Authorization header");
    };
    let Ok(value) = value.to_str() else {
        return unauthorized("Invalid Authorization header encoding");
    };

    match value.strip_prefix("Bearer ") {
        Some(token) if token == state.api_token => next.run(req).await,
        _ => unauthorized("Invalid bearer token"),
    }
}

/// The verified caller of a protected route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller(pub Identity);

impl Caller {
    pub fn identity(&self) -> Identity {
        self.0
    }

    pub fn user_id(&self) -> UserId {
        self.0.user_id
    }

    /// Rejects callers that are neither managers nor admins.
    pub fn require_staff(&self) -> Result<(), ApiError> {
        if self.0.role.is_staff() {
            Ok(())
        } else {
            Err(ApiError::Forbidden(
                "Manager or admin role required".to_string(),
            ))
        }
    }
}

fn header<'a>(parts: &'a Parts, name: &str) -> Result<&'a str, ApiError> {
    parts
        .headers
        .get(name)
        .ok_or_else(|| ApiError::Unauthorized(format!("Missing {} header", name)))?
        .to_str()
        .map_err(|_| ApiError::Unauthorized(format!("Invalid {} header encoding", name)))
}

impl<S: Send + Sync> FromRequestParts<S> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id: i64 = header(parts, USER_ID_HEADER)?
            .trim()
            .parse()
            .map_err(|_| ApiError::Unauthorized(format!("Invalid {} header", USER_ID_HEADER)))?;
        let role: Role = header(parts, USER_ROLE_HEADER)?
            .trim()
            .parse()
            .map_err(ApiError::Unauthorized)?;

        Ok(Caller(Identity::new(UserId(user_id), role)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_token_is_hex() {
        let token = generate_token();
        assert_eq!(token.len(), 32);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(token, generate_token());
    }

    #[test]
    fn test_token_persisted_and_reloaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("api_token");

        let first = load_or_generate_token(&path);
        assert!(path.exists());
        assert_eq!(load_or_generate_token(&path), first);
    }

    #[cfg(unix)]
    #[test]
    fn test_token_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("api_token");

        load_or_generate_token(&path);
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_unwritable_token_dir_still_yields_token() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("data");
        std::fs::write(&blocker, "not a directory").unwrap();
        let path = blocker.join("api_token");

        let token = load_or_generate_token(&path);
        assert_eq!(token.len(), 32);
        assert!(!path.exists());
    }

    #[test]
    fn test_require_staff() {
        let customer = Caller(Identity::new(UserId(1), Role::Customer));
        let manager = Caller(Identity::new(UserId(2), Role::Manager));
        assert!(customer.require_staff().is_err());
        assert!(manager.require_staff().is_ok());
    }
}
