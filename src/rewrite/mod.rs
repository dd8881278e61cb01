//! Body rewriting: routes embedded references back through the proxy.
//!
//! Rewriting is not idempotent. Feeding rewritten output back in wraps the
//! already-proxied references a second time.

mod html;
mod js;
mod tokenizer;

use std::borrow::Cow;
use std::fmt::Write;

use bytes::Bytes;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::{ProxyEndpoint, RewriteStrategy};
use crate::target::BaseUrl;

pub use html::rewrite_html;
pub use js::rewrite_js;

/// Attributes whose quoted values are treated as URLs.
pub const URL_ATTRIBUTES: [&str; 4] = ["href", "src", "action", "url"];

static SCHEME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^([A-Za-z][A-Za-z0-9+.\-]*):").unwrap());

/// Body families the rewriter knows how to treat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Html,
    JavaScript,
    Other,
}

impl ContentKind {
    pub fn from_content_type(content_type: Option<&str>) -> Self {
        let Some(content_type) = content_type else {
            return ContentKind::Html;
        };
        let mime = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        if mime.contains("javascript") || mime.contains("ecmascript") {
            ContentKind::JavaScript
        } else if mime == "text/html" || mime.ends_with("/xml") || mime.ends_with("+xml") {
            ContentKind::Html
        } else {
            ContentKind::Other
        }
    }
}

/// Resolve an attribute value to the absolute URL that should be proxied.
///
/// `None` means the value is left alone: empty, a bare fragment, or a
/// scheme the proxy cannot fetch.
pub fn resolve_reference(value: &str, base: &BaseUrl) -> Option<String> {
    let value = value.trim();
    if value.is_empty() || value.starts_with('#') {
        return None;
    }

    if value.starts_with("//") {
        return Some(format!("{}:{}", base.scheme(), value));
    }

    match SCHEME.captures(value) {
        Some(caps) => {
            let scheme = caps[1].to_ascii_lowercase();
            (scheme == "http" || scheme == "https").then(|| value.to_string())
        }
        None => Some(base.join_literal(value)),
    }
}

/// Text of a raw attribute value, with HTML entities decoded.
///
/// Bytes that are not valid UTF-8 are percent-escaped one by one so a value
/// from a legacy-encoded page still resolves.
fn attribute_text(raw: &[u8]) -> String {
    let text = match std::str::from_utf8(raw) {
        Ok(text) => Cow::Borrowed(text),
        Err(_) => {
            let mut escaped = String::with_capacity(raw.len());
            for &b in raw {
                if b.is_ascii() {
                    escaped.push(char::from(b));
                } else {
                    let _ = write!(escaped, "%{b:02X}");
                }
            }
            Cow::Owned(escaped)
        }
    };
    html_escape::decode_html_entities(&text).into_owned()
}

/// Applies the configured strategy to one response body.
#[derive(Debug, Clone)]
pub struct Rewriter {
    endpoint: ProxyEndpoint,
    strategy: RewriteStrategy,
}

impl Rewriter {
    pub fn new(endpoint: ProxyEndpoint, strategy: RewriteStrategy) -> Self {
        Self { endpoint, strategy }
    }

    pub fn endpoint(&self) -> &ProxyEndpoint {
        &self.endpoint
    }

    pub fn rewrite_body(&self, body: Bytes, content_type: Option<&str>, base: &BaseUrl) -> Bytes {
        let kind = ContentKind::from_content_type(content_type);
        if kind == ContentKind::Other {
            return body;
        }

        let rewritten = match kind {
            ContentKind::JavaScript => rewrite_js(&body, base, &self.endpoint),
            ContentKind::Html => match self.strategy {
                RewriteStrategy::Pattern => rewrite_html(&body, base, &self.endpoint),
                RewriteStrategy::Tokenizer => {
                    let encoding = tokenizer::encoding_for(content_type);
                    match tokenizer::rewrite_html(&body, encoding, base, &self.endpoint) {
                        Ok(out) => out,
                        Err(e) => {
                            tracing::warn!(error = %e, "tokenizer rewrite failed, passing body through");
                            return body;
                        }
                    }
                }
            },
            ContentKind::Other => return body,
        };

        Bytes::from(rewritten)
    }
}
