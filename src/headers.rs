//! Upstream response header filtering.

use axum::http::{HeaderName, HeaderValue};

/// Ordered header list as received from, or sent to, a peer.
pub type HeaderList = Vec<(HeaderName, HeaderValue)>;

/// Directives browsers honor to refuse framing. Compared lowercase.
const FRAMING_BLOCKERS: [&[u8]; 2] = [b"x-frame-options", b"content-security-policy"];

/// Copy every header except those that mention a framing blocker in their
/// name or value.
pub fn filter_headers(headers: &[(HeaderName, HeaderValue)]) -> HeaderList {
    headers
        .iter()
        .filter(|(name, value)| {
            let blocked = mentions_blocker(name.as_str().as_bytes())
                || mentions_blocker(value.as_bytes());
            if blocked {
                tracing::debug!(header = %name, "dropping framing header");
            }
            !blocked
        })
        .cloned()
        .collect()
}

fn mentions_blocker(raw: &[u8]) -> bool {
    let lower = raw.to_ascii_lowercase();
    FRAMING_BLOCKERS
        .iter()
        .any(|needle| lower.windows(needle.len()).any(|w| w == *needle))
}
