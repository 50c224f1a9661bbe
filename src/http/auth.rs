//! Bearer-token authentication.
//!
//! Keys are never stored; only their SHA-256 hashes are, either in a keys
//! file (`hash|name|created` lines, `#` comments) or in the
//! `RELAY_KEY_HASHES` environment variable as a comma-separated list.
//! Authentication is enforced only when at least one key source exists, so a
//! fresh install works without any setup.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{header, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::config::AuthConfig;

use super::models::ErrorBody;
use super::routes::AppState;

/// Environment variable holding comma-separated key hashes.
pub const KEY_HASHES_ENV: &str = "RELAY_KEY_HASHES";

/// SHA-256 hex digest of an API key.
#[must_use]
pub fn hash_key(key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Parse key hashes from the keys-file format.
///
/// One `hash|name|created` entry per line; blank lines and `#` comments are
/// skipped, and only the hash column is kept.
#[must_use]
pub fn parse_keys_file(contents: &str) -> HashSet<String> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| {
            let hash = line.split('|').next().unwrap_or_default().trim();
            (!hash.is_empty()).then(|| hash.to_owned())
        })
        .collect()
}

/// Load valid key hashes from the environment and the configured keys file.
#[must_use]
pub fn load_key_hashes(auth: &AuthConfig) -> HashSet<String> {
    let mut hashes = HashSet::new();

    if let Ok(env_hashes) = std::env::var(KEY_HASHES_ENV) {
        hashes.extend(
            env_hashes
                .split(',')
                .map(str::trim)
                .filter(|h| !h.is_empty())
                .map(str::to_owned),
        );
    }

    if let Some(path) = &auth.keys_file {
        match std::fs::read_to_string(path) {
            Ok(contents) => hashes.extend(parse_keys_file(&contents)),
            Err(err) => {
                warn!(path = %path.display(), %err, "keys file unreadable; skipping");
            }
        }
    }

    hashes
}

/// Whether authentication is enforced for protected routes.
///
/// True when at least one key source exists and auth is not disabled.
#[must_use]
pub fn auth_required(auth: &AuthConfig) -> bool {
    if auth.disabled {
        return false;
    }

    if std::env::var(KEY_HASHES_ENV).is_ok_and(|v| !v.trim().is_empty()) {
        return true;
    }

    auth.keys_file
        .as_deref()
        .is_some_and(Path::exists)
}

/// Extract the bearer token from an `Authorization` header value.
fn bearer_token(request: &Request) -> Option<&str> {
    request
        .headers()
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

fn unauthorized(detail: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        [(header::WWW_AUTHENTICATE, "Bearer")],
        Json(ErrorBody::new(detail)),
    )
        .into_response()
}

/// Middleware guarding the `/llm` and `/computer-use` routes.
///
/// A no-op when no key source is configured.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    if !auth_required(&state.config.auth) {
        return next.run(request).await;
    }

    let Some(token) = bearer_token(&request) else {
        return unauthorized("API key required. Use: Authorization: Bearer <api-key>");
    };

    let presented = hash_key(token);
    let valid = load_key_hashes(&state.config.auth);

    if !valid.contains(&presented) {
        debug!("rejected request with unknown API key");
        return unauthorized("Invalid API key");
    }

    next.run(request).await
}
