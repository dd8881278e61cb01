use std::sync::Arc;

use axum::http::{HeaderValue, Method, StatusCode};
use bytes::Bytes;

use crate::config::{ProxyConfig, ProxyEndpoint};
use crate::error::{FetchError, ProxyError};
use crate::fetch::{Fetcher, OutboundRequest, ReqwestFetcher};
use crate::headers::{filter_headers, HeaderList};
use crate::rewrite::Rewriter;
use crate::target::TargetRequest;

// State shared by every request handler. Read-only after startup.
#[derive(Clone)]
pub struct ProxyState {
    pub fetcher: Arc<dyn Fetcher>,
    pub rewriter: Arc<Rewriter>,
}

impl ProxyState {
    pub fn new(fetcher: Arc<dyn Fetcher>, rewriter: Rewriter) -> Self {
        Self {
            fetcher,
            rewriter: Arc::new(rewriter),
        }
    }

    pub fn from_config(config: &ProxyConfig, endpoint: ProxyEndpoint) -> Result<Self, FetchError> {
        let fetcher = ReqwestFetcher::new(config)?;
        Ok(Self::new(
            Arc::new(fetcher),
            Rewriter::new(endpoint, config.strategy),
        ))
    }
}

/// Inbound request reduced to what the pipeline needs.
#[derive(Debug, Clone)]
pub struct InboundRequest {
    pub method: Method,
    pub query: Option<String>,
    pub content_type: Option<HeaderValue>,
    pub body: Bytes,
}

/// Filtered headers and rewritten body, ready to be written out.
#[derive(Debug, Clone)]
pub struct ProxyResponse {
    pub status: StatusCode,
    pub headers: HeaderList,
    pub body: Bytes,
}

// --- Core Logic (transport agnostic) ---

pub async fn logic_proxy_request(
    request: InboundRequest,
    state: &ProxyState,
) -> Result<ProxyResponse, ProxyError> {
    let target = TargetRequest::from_query(request.query.as_deref())?;
    let base = target.base();
    tracing::debug!(url = %target.url(), %base, method = %request.method, "proxying");

    let outbound = OutboundRequest {
        method: request.method,
        url: target.url().clone(),
        content_type: request.content_type,
        body: request.body,
    };
    let fetched = state.fetcher.fetch(outbound).await?;

    if !fetched.status.is_success() {
        tracing::debug!(status = %fetched.status, "passing upstream error through");
    }

    let headers = filter_headers(&fetched.headers);
    let content_type = fetched.declared_content_type().map(str::to_owned);
    let body = state
        .rewriter
        .rewrite_body(fetched.body, content_type.as_deref(), &base);

    Ok(ProxyResponse {
        status: fetched.status,
        headers,
        body,
    })
}
