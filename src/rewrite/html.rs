use once_cell::sync::Lazy;
use regex::bytes::{Captures, Regex};

use super::{attribute_text, resolve_reference};
use crate::config::ProxyEndpoint;
use crate::target::BaseUrl;

// Quoted values only; unquoted attributes are not matched. Unicode mode is
// off so that a value may hold bytes that are not UTF-8.
static ATTRIBUTE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i-u)\b(href|src|action|url)\s*=\s*(?:"([^"]*)"|'([^']*)')"#).unwrap()
});

/// Rewrite every quoted `href`/`src`/`action`/`url` value in `body`.
///
/// Works on raw bytes in any ASCII-compatible encoding, so matches inside
/// comments and script bodies are rewritten as well.
pub fn rewrite_html(body: &[u8], base: &BaseUrl, endpoint: &ProxyEndpoint) -> Vec<u8> {
    ATTRIBUTE
        .replace_all(body, |caps: &Captures| {
            let name = &caps[1];
            let value = caps
                .get(2)
                .or_else(|| caps.get(3))
                .map_or(&b""[..], |m| m.as_bytes());

            match resolve_reference(&attribute_text(value), base) {
                Some(absolute) => {
                    let mut out = name.to_vec();
                    out.extend_from_slice(b"=\"");
                    out.extend_from_slice(endpoint.proxied(&absolute).as_bytes());
                    out.push(b'"');
                    out
                }
                None => caps[0].to_vec(),
            }
        })
        .into_owned()
}
