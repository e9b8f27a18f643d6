use crate::config::RelayConfig;
use crate::core::relay::{RelayBody, RelayResponse, RelayService};
use crate::domain::ports::ForwardRequest;
use crate::utils::error::{RelayError, Result};
use axum::body::{Body, Bytes};
use axum::extract::{DefaultBodyLimit, Request, State};
use axum::http::header::{ACCEPT, CONTENT_TYPE};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;

/// Chats may carry base64 images; the axum default of 2 MB is too small.
pub const MAX_BODY_BYTES: usize = 64 * 1024 * 1024;

type SharedRelay = Arc<RelayService>;

pub fn router(service: SharedRelay) -> Router {
    Router::new()
        .route("/api/version", get(version))
        .route("/api/tags", get(list_models))
        .route("/api/chat", post(chat))
        .route("/api/generate", post(generate))
        .fallback(forward)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(middleware::from_fn(log_requests))
        .with_state(service)
}

async fn log_requests(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let started = Instant::now();

    let response = next.run(request).await;
    tracing::info!(
        "{} {} -> {} ({:?} to first byte)",
        method,
        path,
        response.status().as_u16(),
        started.elapsed()
    );
    response
}

async fn version(State(service): State<SharedRelay>) -> Json<Value> {
    Json(service.version())
}

async fn list_models(State(service): State<SharedRelay>) -> Result<Json<Value>> {
    Ok(Json(service.list_models().await?))
}

async fn chat(State(service): State<SharedRelay>, body: Bytes) -> Result<Response> {
    Ok(into_http_response(service.chat(&body).await?))
}

async fn generate(State(service): State<SharedRelay>, body: Bytes) -> Result<Response> {
    Ok(into_http_response(service.generate(&body).await?))
}

async fn forward(State(service): State<SharedRelay>, request: Request) -> Result<Response> {
    let (parts, body) = request.into_parts();
    let body = axum::body::to_bytes(body, MAX_BODY_BYTES)
        .await
        .map_err(|e| RelayError::invalid_request(format!("could not read body: {}", e)))?;

    let path_and_query = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| parts.uri.path().to_string());

    let forwarded = ForwardRequest {
        method: parts.method.as_str().to_string(),
        path_and_query,
        content_type: header_string(&parts.headers, CONTENT_TYPE.as_str()),
        accept: header_string(&parts.headers, ACCEPT.as_str()),
        body,
    };

    Ok(into_http_response(service.forward(forwarded).await?))
}

fn header_string(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

fn into_http_response(relayed: RelayResponse) -> Response {
    let body = match relayed.body {
        RelayBody::Stream(stream) => Body::from_stream(stream),
        RelayBody::Full(bytes) => Body::from(bytes),
    };

    let mut response = Response::new(body);
    *response.status_mut() = StatusCode::from_u16(relayed.status).unwrap_or(StatusCode::BAD_GATEWAY);
    if let Some(content_type) = relayed
        .content_type
        .and_then(|value| HeaderValue::from_str(&value).ok())
    {
        response.headers_mut().insert(CONTENT_TYPE, content_type);
    }
    response
}

/// Serve on an already bound listener until `shutdown` resolves.
pub async fn serve_on<F>(listener: TcpListener, service: SharedRelay, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = listener.local_addr()?;
    tracing::info!("🚀 Relay listening on {}", addr);
    tracing::info!("➡️ Forwarding to inference server at {}", service.backend_url());

    axum::serve(listener, router(service))
        .with_graceful_shutdown(shutdown)
        .await?;

    tracing::info!("👋 Relay stopped");
    Ok(())
}

pub async fn serve(config: &RelayConfig) -> Result<()> {
    let service = Arc::new(RelayService::from_config(config)?);
    let listener = TcpListener::bind(config.listen_addr()).await?;

    tracing::info!(
        "💡 Point the chat frontend at the relay: OLLAMA_BASE_URL={}",
        config.frontend_base_url()
    );

    serve_on(listener, service, shutdown_signal()).await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("❌ Could not listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("🛑 Shutdown requested");
}
