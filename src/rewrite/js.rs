use once_cell::sync::Lazy;
use regex::bytes::{Captures, Regex};

use crate::config::ProxyEndpoint;
use crate::target::BaseUrl;

static NAVIGATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?-u)(window\.location\.href|document\.URL)\s*=\s*(?:"([^"]*)"|'([^']*)')(\s*;)?"#)
        .unwrap()
});

/// Rewrite `window.location.href = "..."` and `document.URL = "..."`.
///
/// The literal is appended to the encoded base as-is, without resolution,
/// so an absolute literal ends up nested under the base. The literal keeps
/// its original quote character.
pub fn rewrite_js(body: &[u8], base: &BaseUrl, endpoint: &ProxyEndpoint) -> Vec<u8> {
    let prefix = endpoint.with_param(&format!("{}/", urlencoding::encode(&base.to_string())));

    NAVIGATION
        .replace_all(body, |caps: &Captures| {
            let (quote, literal) = match (caps.get(2), caps.get(3)) {
                (Some(m), _) => (b'"', m.as_bytes()),
                (None, Some(m)) => (b'\'', m.as_bytes()),
                (None, None) => (b'"', &b""[..]),
            };
            let start = literal.iter().take_while(|&&b| b == b'/').count();
            let literal = &literal[start..];

            let mut out = caps[1].to_vec();
            out.push(b'=');
            out.push(quote);
            out.extend_from_slice(prefix.as_bytes());
            out.extend_from_slice(literal);
            out.push(quote);
            if caps.get(4).is_some() {
                out.push(b';');
            }
            out
        })
        .into_owned()
}
