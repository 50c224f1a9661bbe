//! Axum router and endpoint handlers.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::middleware;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures_util::Stream;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::bridge::{
    spawn_agent_loop, spawn_chat_stream, AgentConfig, ChatConfig, PlatformRunner,
};
use crate::client::ClaudeClient;
use crate::config::GlobalConfig;
use crate::{AppError, Result};

use super::auth::require_auth;
use super::models::{
    ChatRequest, ChatResponse, ComputerUseRequest, ErrorBody, HealthResponse, ModelsResponse,
    StatusResponse, AVAILABLE_MODELS,
};

const VERSION_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

/// Shared state for all handlers.
#[derive(Debug)]
pub struct AppState {
    /// Global configuration.
    pub config: Arc<GlobalConfig>,
    /// Cancelled on server shutdown; child tokens stop in-flight streams.
    pub shutdown: CancellationToken,
}

impl AppState {
    /// Build the shared state.
    #[must_use]
    pub fn new(config: Arc<GlobalConfig>, shutdown: CancellationToken) -> Self {
        Self { config, shutdown }
    }
}

/// Build the API router.
///
/// `/health` and `/llm/models` are open; everything else goes through the
/// bearer-token middleware.
#[must_use]
pub fn router(state: Arc<AppState>) -> Router {
    let protected = Router::new()
        .route("/llm/status", get(llm_status))
        .route("/llm/chat", post(llm_chat))
        .route("/llm/chat/stream", post(llm_chat_stream))
        .route("/llm/json", post(llm_json))
        .route("/computer-use/stream", post(computer_use_stream))
        .layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            require_auth,
        ));

    Router::new()
        .route("/health", get(health))
        .route("/llm/models", get(llm_models))
        .merge(protected)
        .with_state(state)
}

/// Serve the API on `config.http_port` until the token is cancelled.
///
/// # Errors
///
/// Returns `AppError::Config` if the listener fails to bind or the server
/// errors while running.
pub async fn serve_http(state: Arc<AppState>, ct: CancellationToken) -> Result<()> {
    let bind = SocketAddr::from(([0, 0, 0, 0], state.config.http_port));
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .map_err(|err| AppError::Config(format!("failed to bind HTTP on {bind}: {err}")))?;

    info!(%bind, "starting HTTP API");

    axum::serve(listener, app)
        .with_graceful_shutdown(ct.cancelled_owned())
        .await
        .map_err(|err| AppError::Config(format!("HTTP server error: {err}")))?;

    info!("HTTP API shut down");
    Ok(())
}

fn error_response(err: &AppError) -> Response {
    let status = match err {
        AppError::Spawn(_) => StatusCode::SERVICE_UNAVAILABLE,
        AppError::Config(_) | AppError::Stream(_) => StatusCode::UNPROCESSABLE_ENTITY,
        AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        AppError::Tool(_) | AppError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(ErrorBody::new(err.to_string()))).into_response()
}

/// `GET /health` — liveness probe with service identity.
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse::default())
}

/// `GET /llm/models` — static model catalog.
async fn llm_models() -> Json<ModelsResponse> {
    Json(ModelsResponse {
        models: AVAILABLE_MODELS,
    })
}

/// `GET /llm/status` — check the binary is installed and runnable.
async fn llm_status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    use crate::bridge::spawner::find_binary;

    let Some(binary_path) = find_binary(&state.config.binary) else {
        return Json(StatusResponse {
            available: false,
            binary_path: None,
            version: None,
        });
    };

    let probe = tokio::time::timeout(
        VERSION_CHECK_TIMEOUT,
        tokio::process::Command::new(&binary_path)
            .arg("--version")
            .output(),
    )
    .await;

    let version = match probe {
        Ok(Ok(output)) if output.status.success() => {
            Some(String::from_utf8_lossy(&output.stdout).trim().to_owned())
        }
        _ => None,
    };

    Json(StatusResponse {
        available: version.is_some(),
        binary_path: Some(binary_path.display().to_string()),
        version,
    })
}

/// `POST /llm/chat` — one-shot prompt, full text response.
async fn llm_chat(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ChatRequest>,
) -> Response {
    if let Err(err) = request.validate() {
        return error_response(&err);
    }

    let client = match ClaudeClient::new(
        &state.config,
        Some(request.model),
        Some(request.max_turns),
    ) {
        Ok(client) => client,
        Err(err) => return error_response(&err),
    };

    match client
        .chat(&request.prompt, request.system.as_deref())
        .await
    {
        Ok(result) => Json(ChatResponse {
            text: result.text,
            model: result.model,
            is_error: result.is_error,
            error_message: result.error_message,
        })
        .into_response(),
        Err(err) => error_response(&err),
    }
}

/// `POST /llm/json` — one-shot prompt, response parsed as JSON.
async fn llm_json(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ChatRequest>,
) -> Response {
    if let Err(err) = request.validate() {
        return error_response(&err);
    }

    let client = match ClaudeClient::new(
        &state.config,
        Some(request.model),
        Some(request.max_turns),
    ) {
        Ok(client) => client,
        Err(err) => return error_response(&err),
    };

    match client
        .chat_json(&request.prompt, request.system.as_deref())
        .await
    {
        Ok(value) => Json(value).into_response(),
        Err(err) => error_response(&err),
    }
}

/// `POST /llm/chat/stream` — SSE stream of chat chunks.
async fn llm_chat_stream(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ChatRequest>,
) -> Response {
    if let Err(err) = request.validate() {
        return error_response(&err);
    }

    let mut config = ChatConfig::from_global(&state.config);
    config.model = request.model;
    config.max_turns = request.max_turns;
    config.system_prompt = request.system;

    let events = spawn_chat_stream(config, request.prompt, state.shutdown.child_token());
    sse_from_receiver(events).into_response()
}

/// `POST /computer-use/stream` — SSE stream of agentic loop events.
async fn computer_use_stream(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ComputerUseRequest>,
) -> Response {
    if let Err(err) = request.validate() {
        return error_response(&err);
    }

    let mut config = AgentConfig::from_global(&state.config);
    config.model = request.model;
    config.max_turns = request.max_turns;
    config.system_prompt = request.system_prompt;
    if let Some(width) = request.display_width {
        config.display_width = width;
    }
    if let Some(height) = request.display_height {
        config.display_height = height;
    }

    let events = spawn_agent_loop(
        config,
        request.prompt,
        Arc::new(PlatformRunner),
        None,
        state.shutdown.child_token(),
    );
    sse_from_receiver(events).into_response()
}

/// Adapt an event channel into an SSE response.
///
/// Each event is serialized as one `data:` line; the stream ends when the
/// producer drops its sender.
fn sse_from_receiver<T>(
    events: mpsc::Receiver<T>,
) -> Sse<impl Stream<Item = std::result::Result<Event, Infallible>>>
where
    T: Serialize + Send + 'static,
{
    let stream = futures_util::stream::unfold(events, |mut events| async move {
        let event = events.recv().await?;
        let payload = serde_json::to_string(&event).unwrap_or_else(|_| "{}".into());
        Some((Ok(Event::default().data(payload)), events))
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
