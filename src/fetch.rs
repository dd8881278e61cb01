//! Outbound fetching.
//!
//! `Fetcher` is the seam between the pipeline and the network. The real
//! implementation wraps a shared `reqwest::Client`.

use async_trait::async_trait;
use axum::http::{header, HeaderName, HeaderValue, Method, StatusCode};
use bytes::{Bytes, BytesMut};
use url::Url;

use crate::config::ProxyConfig;
use crate::error::FetchError;
use crate::headers::HeaderList;

/// What the proxy asks the upstream for.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub method: Method,
    pub url: Url,
    pub content_type: Option<HeaderValue>,
    pub body: Bytes,
}

/// Final upstream response after redirects.
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub status: StatusCode,
    pub headers: HeaderList,
    pub body: Bytes,
}

impl FetchResult {
    pub fn declared_content_type(&self) -> Option<&str> {
        self.headers
            .iter()
            .find(|(name, _)| *name == header::CONTENT_TYPE)
            .and_then(|(_, value)| value.to_str().ok())
    }

    /// Split a raw HTTP/1.x response into status, headers and body.
    ///
    /// The head may use CRLF or bare LF line endings. Body bytes are kept
    /// verbatim. Header lines that do not parse are skipped.
    pub fn from_raw(raw: &[u8]) -> Option<Self> {
        let (head, body) = split_head(raw)?;
        let head = std::str::from_utf8(head).ok()?;
        let mut lines = head.split('\n').map(|l| l.strip_suffix('\r').unwrap_or(l));

        let status_line = lines.next()?;
        let code = status_line.split_whitespace().nth(1)?;
        let status = StatusCode::from_bytes(code.as_bytes()).ok()?;

        let headers = lines
            .filter_map(|line| {
                let (name, value) = line.split_once(':')?;
                let name = HeaderName::from_bytes(name.trim().as_bytes()).ok()?;
                let value = HeaderValue::from_str(value.trim()).ok()?;
                Some((name, value))
            })
            .collect();

        Some(Self {
            status,
            headers,
            body: Bytes::copy_from_slice(body),
        })
    }
}

/// Find the blank line ending the head, whichever line ending comes first.
fn split_head(raw: &[u8]) -> Option<(&[u8], &[u8])> {
    let crlf = find(raw, b"\r\n\r\n").map(|i| (i, 4));
    let lf = find(raw, b"\n\n").map(|i| (i, 2));
    let (at, len) = match (crlf, lf) {
        (Some(a), Some(b)) => {
            if a.0 <= b.0 {
                a
            } else {
                b
            }
        }
        (a, b) => a.or(b)?,
    };
    Some((&raw[..at], &raw[at + len..]))
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, request: OutboundRequest) -> Result<FetchResult, FetchError>;
}

pub struct ReqwestFetcher {
    client: reqwest::Client,
    max_body_bytes: usize,
}

impl ReqwestFetcher {
    pub fn new(config: &ProxyConfig) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .timeout(config.timeout())
            .connect_timeout(config.connect_timeout())
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(FetchError::Client)?;

        Ok(Self {
            client,
            max_body_bytes: config.max_body_bytes,
        })
    }
}

#[async_trait]
impl Fetcher for ReqwestFetcher {
    async fn fetch(&self, request: OutboundRequest) -> Result<FetchResult, FetchError> {
        let mut builder = self
            .client
            .request(request.method.clone(), request.url.clone())
            .header(header::ACCEPT, "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8")
            .header(header::ACCEPT_LANGUAGE, "en-US,en;q=0.5");
        if let Some(content_type) = request.content_type {
            builder = builder.header(header::CONTENT_TYPE, content_type);
        }
        if request.method != Method::GET {
            builder = builder.body(request.body);
        }

        let mut response = builder.send().await?;
        tracing::debug!(
            url = %request.url,
            final_url = %response.url(),
            status = %response.status(),
            "upstream responded"
        );

        if response
            .content_length()
            .is_some_and(|len| len > self.max_body_bytes as u64)
        {
            return Err(FetchError::TooLarge {
                limit: self.max_body_bytes,
            });
        }

        let status = response.status();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();

        let mut body = BytesMut::new();
        while let Some(chunk) = response.chunk().await? {
            if body.len() + chunk.len() > self.max_body_bytes {
                return Err(FetchError::TooLarge {
                    limit: self.max_body_bytes,
                });
            }
            body.extend_from_slice(&chunk);
        }

        Ok(FetchResult {
            status,
            headers,
            body: body.freeze(),
        })
    }
}
