use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use prometheus::{Encoder, Registry, TextEncoder};
use serde_json::{json, Value};
use std::net::SocketAddr;
use tokio::sync::broadcast;
use tower_http::cors::CorsLayer;
use tracing::{error, info};

/// Body of `GET /api`.
pub const API_MESSAGE: &str = "An API for use with your Dapp!";

#[derive(Clone)]
pub struct ApiState {
    registry: Registry,
}

impl ApiState {
    pub fn new(registry: Registry) -> Self {
        Self { registry }
    }
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/api", get(api_message))
        .route("/health", get(health_check))
        .route("/metrics", get(metrics))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn api_message() -> Json<Value> {
    Json(json!({ "message": API_MESSAGE }))
}

async fn health_check() -> &'static str {
    "OK"
}

async fn metrics(State(state): State<ApiState>) -> Response {
    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();
    match encoder.encode(&state.registry.gather(), &mut buffer) {
        Ok(()) => ([(header::CONTENT_TYPE, encoder.format_type().to_string())], buffer).into_response(),
        Err(e) => {
            error!(error = %e, "Failed to encode metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// The HTTP stub served beside the relay.
pub struct ApiServer {
    addr: SocketAddr,
    state: ApiState,
}

impl ApiServer {
    pub fn new(addr: SocketAddr, registry: Registry) -> Self {
        Self {
            addr,
            state: ApiState::new(registry),
        }
    }

    /// Serves until `shutdown` fires.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) -> std::io::Result<()> {
        let app = router(self.state);

        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        info!("HTTP API listening on http://{}", self.addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await
    }
}
