//! HTTP ingestion server.
//!
//! | Route | Methods | Response |
//! |-------|---------|----------|
//! | `/api/accept?id=<int>[&endpoint=<tag>]` | GET, POST | `200 ok`, `200 failed` (store error), `400 failed` (bad id) |
//! | `/health` | GET | `200 ok` |
//!
//! Every response carries `x-request-id`, echoed from the request or
//! generated.

use crate::models::AcceptOutcome;
use crate::observability::{
    REQUEST_ID_HEADER, RequestContext, current_request_id, scope_request_context,
    spawn_blocking_in_context,
};
use crate::services::{RequestAcceptor, ShutdownSignal};
use crate::{Error, Result};
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, Request, State};
use axum::http::{HeaderValue, StatusCode, header};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

/// Query parameters of `/api/accept`.
///
/// `id` stays a string here so a malformed value reaches
/// [`RequestAcceptor::parse_identifier`] instead of axum's own rejection.
#[derive(Debug, Default, Deserialize)]
pub struct AcceptParams {
    /// Identifier to record.
    pub id: Option<String>,
    /// Informational caller tag.
    pub endpoint: Option<String>,
}

/// Builds the router.
pub fn router(acceptor: Arc<RequestAcceptor>) -> Router {
    Router::new()
        .route("/api/accept", get(accept).post(accept))
        .route("/health", get(health))
        .layer(middleware::from_fn(propagate_request_id))
        .layer(TraceLayer::new_for_http())
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ))
        .with_state(acceptor)
}

async fn accept(
    State(acceptor): State<Arc<RequestAcceptor>>,
    query: std::result::Result<Query<AcceptParams>, QueryRejection>,
) -> (StatusCode, &'static str) {
    let Ok(Query(params)) = query.inspect_err(|e| {
        tracing::debug!(error = %e, request_id = ?current_request_id(), "Rejected query string");
    }) else {
        return (StatusCode::BAD_REQUEST, AcceptOutcome::Failed.as_str());
    };

    let id = match RequestAcceptor::parse_identifier(params.id.as_deref()) {
        Ok(id) => id,
        Err(e) => {
            tracing::debug!(error = %e, request_id = ?current_request_id(), "Rejected request");
            return (StatusCode::BAD_REQUEST, AcceptOutcome::Failed.as_str());
        },
    };

    let tag = params.endpoint;
    match spawn_blocking_in_context(move || acceptor.accept(id, tag.as_deref())).await {
        Ok(outcome) => (StatusCode::OK, outcome.as_str()),
        Err(e) => {
            tracing::error!(error = %e, "Accept task panicked");
            (StatusCode::INTERNAL_SERVER_ERROR, AcceptOutcome::Failed.as_str())
        },
    }
}

async fn health() -> &'static str {
    "ok"
}

async fn propagate_request_id(request: Request, next: Next) -> Response {
    let context = RequestContext::from_header(
        request
            .headers()
            .get(REQUEST_ID_HEADER)
            .and_then(|value| value.to_str().ok()),
    );
    let header_value = HeaderValue::from_str(context.request_id()).ok();

    let mut response = scope_request_context(context, next.run(request)).await;
    if let Some(value) = header_value {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

/// Binds the HTTP listener.
///
/// # Errors
///
/// Returns an error if the address is invalid or already in use.
pub async fn bind(host: &str, port: u16) -> Result<TcpListener> {
    let addr = format!("{host}:{port}");
    TcpListener::bind(&addr)
        .await
        .map_err(|e| Error::OperationFailed {
            operation: "bind".to_string(),
            cause: format!("{addr}: {e}"),
        })
}

/// Serves `app` until `shutdown` fires, then drains in-flight requests.
///
/// # Errors
///
/// Returns an error if the server fails.
pub async fn serve(listener: TcpListener, app: Router, mut shutdown: ShutdownSignal) -> Result<()> {
    let addr: Option<SocketAddr> = listener.local_addr().ok();
    tracing::info!(addr = ?addr, "HTTP server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.wait().await })
        .await
        .map_err(|e| Error::OperationFailed {
            operation: "serve".to_string(),
            cause: e.to_string(),
        })
}
