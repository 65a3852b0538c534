//! Streamable HTTP transport for the MCP server.
//!
//! - GET /    - Landing page
//! - /mcp     - MCP streamable HTTP endpoint (one session per client)
//!
//! Everything except the landing page requires `Authorization: Bearer phx_...`.

use std::sync::Arc;

use axum::{
    extract::Request,
    http::{header::AUTHORIZATION, StatusCode},
    middleware::{self, Next},
    response::{Html, IntoResponse, Response},
    routing::get,
    Router,
};
use rmcp::transport::streamable_http_server::{
    session::local::LocalSessionManager, StreamableHttpService,
};
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer};
use tracing::{debug, error, info};

use crate::config::{Config, MCP_DOCS_URL, PERSONAL_API_KEY_PREFIX};
use crate::context::StateBacking;
use crate::mcp::{bearer_token, PostHogMcp};

const MAX_BODY_BYTES: usize = 4 * 1024 * 1024;

/// Why a request was turned away before reaching the MCP service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenRejection {
    Missing,
    Invalid,
}

impl TokenRejection {
    pub fn message(self) -> String {
        let reason = match self {
            Self::Missing => "No token provided",
            Self::Invalid => "Invalid token",
        };
        format!(
            "{}, please provide a valid API token. View the documentation for more information: {}",
            reason, MCP_DOCS_URL
        )
    }
}

/// Validate an `Authorization` header value.
pub fn check_token(header: Option<&str>) -> Result<&str, TokenRejection> {
    let token = header
        .and_then(bearer_token)
        .ok_or(TokenRejection::Missing)?;
    if !token.starts_with(PERSONAL_API_KEY_PREFIX) {
        return Err(TokenRejection::Invalid);
    }
    Ok(token)
}

async fn require_token(request: Request, next: Next) -> Response {
    if request.uri().path() == "/" {
        return next.run(request).await;
    }
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok());
    match check_token(header) {
        Ok(_) => next.run(request).await,
        Err(rejection) => {
            debug!(path = %request.uri().path(), ?rejection, "rejected request");
            (StatusCode::UNAUTHORIZED, rejection.message()).into_response()
        }
    }
}

async fn landing_handler() -> Html<String> {
    Html(format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head><meta charset="utf-8"><title>PostHog MCP Server</title></head>
<body>
  <h1>PostHog MCP Server</h1>
  <p>Connect your MCP client to <code>/mcp</code> with a personal API key as a Bearer token.</p>
  <p>See the <a href="{docs}">documentation</a> for setup instructions.</p>
</body>
</html>
"#,
        docs = MCP_DOCS_URL
    ))
}

async fn not_found_handler() -> (StatusCode, &'static str) {
    (StatusCode::NOT_FOUND, "Not found")
}

/// Build the full router. Each MCP session gets its own `PostHogMcp`.
pub fn router(config: Arc<Config>, backing: StateBacking) -> Router {
    let factory = move || Ok(PostHogMcp::new(config.clone(), backing.clone()));
    let mcp_service = StreamableHttpService::new(
        factory,
        LocalSessionManager::default().into(),
        Default::default(),
    );

    Router::new()
        .route("/", get(landing_handler))
        .route_service("/mcp", mcp_service)
        .fallback(not_found_handler)
        .layer(middleware::from_fn(require_token))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(CorsLayer::permissive())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}

pub async fn serve(bind: &str, config: Arc<Config>, backing: StateBacking) -> Result<(), String> {
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .map_err(|e| format!("Failed to bind to {}: {}", bind, e))?;
    info!(bind = %bind, "listening");

    axum::serve(listener, router(config, backing))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| format!("Server error: {}", e))
}
