//! Reverse proxy in front of a remote MCP server.
//!
//! Lets clients that cannot set headers reach a hosted MCP endpoint: the
//! configured credential is injected into every forwarded request and
//! responses (including event streams) are streamed back as they arrive.

use std::sync::{Arc, LazyLock};
use std::time::Duration;

use axum::{
    body::Body,
    extract::{Request, State},
    http::{
        header::{AUTHORIZATION, CONTENT_LENGTH, HOST},
        HeaderMap, HeaderName, HeaderValue, Method, StatusCode,
    },
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use regex::Regex;
use tracing::{debug, error, info};
use url::Url;

use crate::error::ProxyError;

pub const DEFAULT_REMOTE_MCP_URL: &str = "https://mcp.posthog.com/mcp";
pub const STATUS_LINE: &str = "PostHog MCP proxy is running. Use /mcp and /sse endpoints.";

const HOP_BY_HOP: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailers",
    "transfer-encoding",
    "upgrade",
];

const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

static MCP_SEGMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bmcp\b").expect("static regex is valid"));

/// `Authorization` value for the configured credential, `Bearer ` prefixed
/// unless it already is.
pub fn auth_header_value(input: &str) -> Option<String> {
    if input.is_empty() {
        return None;
    }
    if input.to_lowercase().starts_with("bearer ") {
        Some(input.to_string())
    } else {
        Some(format!("Bearer {}", input))
    }
}

/// Map an incoming path onto the remote server.
///
/// `/mcp...` goes to the remote MCP path, `/sse...` to the same path with its
/// `mcp` segment swapped for `sse` (or plain `/sse`). Anything else keeps its
/// path. The query string is carried over as is.
pub fn target_url(remote: &Url, path: &str, query: Option<&str>) -> Url {
    let target_path = if path.starts_with("/mcp") {
        remote.path().to_string()
    } else if path.starts_with("/sse") {
        let sse_path = MCP_SEGMENT.replace(remote.path(), "sse");
        if sse_path == remote.path() {
            "/sse".to_string()
        } else {
            sse_path.into_owned()
        }
    } else {
        path.to_string()
    };

    let mut target = remote.clone();
    target.set_path(&target_path);
    target.set_query(query.filter(|q| !q.is_empty()));
    target.set_fragment(None);
    target
}

pub fn is_hop_by_hop(name: &HeaderName) -> bool {
    HOP_BY_HOP.contains(&name.as_str())
}

pub fn filter_hop_by_hop(headers: &HeaderMap) -> HeaderMap {
    headers
        .iter()
        .filter(|(name, _)| !is_hop_by_hop(name))
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect()
}

fn host_of(url: &Url) -> String {
    match (url.host_str(), url.port()) {
        (Some(host), Some(port)) => format!("{}:{}", host, port),
        (Some(host), None) => host.to_string(),
        _ => String::new(),
    }
}

pub struct Proxy {
    remote: Url,
    auth: Option<HeaderValue>,
    http: reqwest::Client,
}

impl Proxy {
    pub fn new(remote_url: &str, auth_input: &str) -> Result<Self, ProxyError> {
        let remote = Url::parse(remote_url)?;
        let auth = auth_header_value(auth_input)
            .map(|v| HeaderValue::from_str(&v).map_err(|_| ProxyError::AuthHeader))
            .transpose()?;
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self { remote, auth, http })
    }

    pub fn remote(&self) -> &Url {
        &self.remote
    }

    fn outgoing_headers(&self, incoming: &HeaderMap, target: &Url) -> HeaderMap {
        let mut headers = filter_hop_by_hop(incoming);
        if let Some(auth) = &self.auth {
            headers.insert(AUTHORIZATION, auth.clone());
        }
        if let Ok(host) = HeaderValue::from_str(&host_of(target)) {
            headers.insert(HOST, host);
        }
        headers
    }

    async fn forward(&self, request: Request) -> Response {
        let (parts, body) = request.into_parts();
        let target = target_url(&self.remote, parts.uri.path(), parts.uri.query());
        debug!(method = %parts.method, target = %target, "forwarding");

        let mut outgoing = self
            .http
            .request(parts.method.clone(), target.clone())
            .headers(self.outgoing_headers(&parts.headers, &target));
        if parts.method != Method::GET && parts.method != Method::HEAD {
            match axum::body::to_bytes(body, MAX_BODY_BYTES).await {
                Ok(bytes) => outgoing = outgoing.body(bytes),
                Err(e) => {
                    debug!(error = %e, "unreadable request body");
                    return (StatusCode::BAD_REQUEST, "Bad request").into_response();
                }
            }
        }
        let upstream = match outgoing.send().await {
            Ok(upstream) => upstream,
            Err(e) => {
                error!(error = %e, target = %target, "proxy error");
                return bad_gateway();
            }
        };

        let mut response = Response::builder().status(upstream.status());
        if let Some(headers) = response.headers_mut() {
            for (name, value) in upstream.headers() {
                if name == CONTENT_LENGTH || is_hop_by_hop(name) {
                    continue;
                }
                headers.append(name.clone(), value.clone());
            }
        }
        let body = Body::from_stream(upstream.bytes_stream());
        response.body(body).unwrap_or_else(|_| bad_gateway())
    }
}

fn bad_gateway() -> Response {
    (StatusCode::BAD_GATEWAY, "Bad gateway").into_response()
}

async fn status_handler() -> impl IntoResponse {
    (
        [(axum::http::header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        STATUS_LINE,
    )
}

async fn forward_handler(State(proxy): State<Arc<Proxy>>, request: Request) -> Response {
    proxy.forward(request).await
}

pub fn router(proxy: Arc<Proxy>) -> Router {
    Router::new()
        .route("/", get(status_handler))
        .fallback(forward_handler)
        .with_state(proxy)
}

pub async fn serve(port: u16, proxy: Proxy) -> Result<(), String> {
    let bind = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .map_err(|e| format!("Failed to bind to {}: {}", bind, e))?;
    info!(bind = %bind, remote = %proxy.remote(), "proxy listening");

    axum::serve(listener, router(Arc::new(proxy)))
        .await
        .map_err(|e| format!("Proxy error: {}", e))
}
