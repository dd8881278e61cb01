#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::{Body, Bytes};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Redirect};
use axum::routing::{get, post};
use axum::Router;
use embed_proxy::config::{ProxyConfig, ProxyEndpoint, RewriteStrategy};
use embed_proxy::error::FetchError;
use embed_proxy::fetch::{FetchResult, Fetcher, OutboundRequest};
use embed_proxy::rewrite::Rewriter;
use embed_proxy::shared::ProxyState;
use tokio::net::TcpListener;

pub const ENDPOINT: &str = "/proxy";

async fn spawn(app: Router) -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    port
}

/// Loopback site with the pages the proxy tests fetch.
pub async fn spawn_upstream() -> u16 {
    let app = Router::new()
        .route(
            "/",
            get(|| async {
                (
                    [
                        (header::CONTENT_TYPE, "text/html; charset=utf-8"),
                        (header::X_FRAME_OPTIONS, "DENY"),
                        (header::CONTENT_SECURITY_POLICY, "frame-ancestors 'none'"),
                        (header::CACHE_CONTROL, "max-age=60"),
                    ],
                    r#"<a href="/about">About</a><img src='//cdn.test/x.png'>"#,
                )
            }),
        )
        .route(
            "/app.js",
            get(|| async {
                (
                    [(header::CONTENT_TYPE, "application/javascript")],
                    r#"if (done) { window.location.href = "/next"; }"#,
                )
            }),
        )
        .route(
            "/missing",
            get(|| async {
                (
                    StatusCode::NOT_FOUND,
                    [(header::CONTENT_TYPE, "text/html")],
                    r#"<a href="/">home</a>"#,
                )
            }),
        )
        .route("/redirect", get(|| async { Redirect::temporary("/landing") }))
        .route(
            "/landing",
            get(|| async { ([(header::CONTENT_TYPE, "text/html")], "<p>landed</p>") }),
        )
        .route(
            "/slow",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                "late"
            }),
        )
        .route("/big", get(|| async { "x".repeat(4096) }))
        .route(
            "/stream",
            get(|| async {
                // No Content-Length: the size is only known once read.
                let chunks = (0..8).map(|_| Ok::<_, std::io::Error>(Bytes::from(vec![b'x'; 512])));
                Body::from_stream(futures_util::stream::iter(chunks))
            }),
        )
        .route(
            "/latin1",
            get(|| async {
                (
                    [(header::CONTENT_TYPE, "text/html; charset=iso-8859-1")],
                    b"<p>Caf\xe9</p><a href=\"/about\">About</a>".to_vec(),
                )
            }),
        )
        .route(
            "/image.png",
            get(|| async {
                (
                    [(header::CONTENT_TYPE, "image/png")],
                    b"\x89PNG\r\n\x1a\nsrc=\"/x\"".to_vec(),
                )
            }),
        )
        .route(
            "/echo",
            post(|headers: axum::http::HeaderMap, body: String| async move {
                let content_type = headers
                    .get(header::CONTENT_TYPE)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("none")
                    .to_string();
                ([(header::CONTENT_TYPE, "text/plain")], format!("{content_type}|{body}"))
                    .into_response()
            }),
        );

    spawn(app).await
}

pub fn test_config() -> ProxyConfig {
    ProxyConfig {
        endpoint: ENDPOINT.to_string(),
        timeout_secs: 1,
        connect_timeout_secs: 1,
        max_body_bytes: 1024,
        ..ProxyConfig::default()
    }
}

pub async fn spawn_proxy(config: ProxyConfig) -> u16 {
    let endpoint = config.validate().unwrap();
    let state = ProxyState::from_config(&config, endpoint).unwrap();
    spawn(embed_proxy::proxy::router(state)).await
}

pub async fn spawn_proxy_with(fetcher: Arc<dyn Fetcher>) -> u16 {
    let rewriter = Rewriter::new(ProxyEndpoint::parse(ENDPOINT).unwrap(), RewriteStrategy::Pattern);
    spawn(embed_proxy::proxy::router(ProxyState::new(fetcher, rewriter))).await
}

/// Fetcher double that counts calls and always serves the same raw response.
pub struct CountingFetcher {
    pub calls: AtomicUsize,
    raw: &'static [u8],
}

impl CountingFetcher {
    pub fn new(raw: &'static [u8]) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            raw,
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Fetcher for CountingFetcher {
    async fn fetch(&self, _request: OutboundRequest) -> Result<FetchResult, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(FetchResult::from_raw(self.raw).unwrap())
    }
}

pub fn proxied(proxy_port: u16, target: &str) -> String {
    format!(
        "http://127.0.0.1:{proxy_port}{ENDPOINT}?url={}",
        urlencoding::encode(target)
    )
}
