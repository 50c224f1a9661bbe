//! HTTP/SSE API surface.
//!
//! An axum router exposing the one-shot client and the streaming bridges:
//! health and model-catalog endpoints are open, everything under `/llm` and
//! `/computer-use` sits behind optional bearer-token authentication.

pub mod auth;
pub mod models;
pub mod routes;

pub use auth::{auth_required, hash_key, load_key_hashes};
pub use routes::{router, serve_http, AppState};
