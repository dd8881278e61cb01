use axum::{
    body::{Body, Bytes},
    extract::{RawQuery, Request, State},
    http::{header, HeaderMap, Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::error::ProxyError;
use crate::shared::{logic_proxy_request, InboundRequest, ProxyResponse, ProxyState};

// Middleware to log all incoming requests
async fn log_requests(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let uri = req.uri().clone();
    let response = next.run(req).await;
    tracing::info!(%method, %uri, status = %response.status(), "handled request");
    response
}

pub fn router(state: ProxyState) -> Router {
    let route = state.rewriter.endpoint().route().to_string();

    Router::new()
        .route("/healthz", get(|| async { "ok" }))
        .route(&route, get(proxy_resource_handler).post(proxy_resource_handler))
        .with_state(state)
        .layer(middleware::from_fn(log_requests))
        .layer(TraceLayer::new_for_http())
}

pub async fn serve(listener: TcpListener, state: ProxyState) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        tracing::info!(%addr, endpoint = state.rewriter.endpoint().as_str(), "proxy listening");
    }
    axum::serve(listener, router(state)).await
}

// Handler for proxying external resources via <endpoint>?url=...
//
// Dropping this future (client gone) drops the in-flight upstream request.
async fn proxy_resource_handler(
    State(state): State<ProxyState>,
    method: Method,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    body: Bytes,
) -> Result<ProxyResponse, ProxyError> {
    let request = InboundRequest {
        content_type: (method == Method::POST)
            .then(|| headers.get(header::CONTENT_TYPE).cloned())
            .flatten(),
        method,
        query,
        body,
    };

    logic_proxy_request(request, &state).await
}

/// Headers describing the upstream connection or framing, not the content.
fn is_framing_header(name: &header::HeaderName) -> bool {
    *name == header::CONTENT_LENGTH
        || *name == header::TRANSFER_ENCODING
        || *name == header::CONNECTION
}

impl IntoResponse for ProxyResponse {
    fn into_response(self) -> Response {
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status;

        let out = response.headers_mut();
        for (key, value) in self.headers {
            if !is_framing_header(&key) {
                out.append(key, value);
            }
        }

        if response.status() == StatusCode::NO_CONTENT {
            *response.body_mut() = Body::empty();
        }
        response
    }
}
