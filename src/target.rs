//! Target URL validation and base URL derivation.

use std::fmt;

use url::{form_urlencoded, Url};

use crate::error::InvalidUrl;

/// A caller-supplied target that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetRequest {
    url: Url,
}

impl TargetRequest {
    /// Pull the `url` parameter out of a raw query string and validate it.
    ///
    /// The query is form-decoded, so `+` stands for a space. A stray `%`
    /// anywhere in the query, or a value that is not UTF-8 once decoded, is
    /// refused rather than repaired.
    pub fn from_query(query: Option<&str>) -> Result<Self, InvalidUrl> {
        let query = query.unwrap_or_default();
        check_escapes(query)?;

        let value = form_urlencoded::parse(query.as_bytes())
            .find(|(key, _)| key == "url")
            .map(|(_, value)| value)
            .ok_or(InvalidUrl::Empty)?;
        if value.contains(char::REPLACEMENT_CHARACTER) {
            return Err(InvalidUrl::BadEncoding);
        }

        Self::parse(&value)
    }

    pub fn parse(raw: &str) -> Result<Self, InvalidUrl> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(InvalidUrl::Empty);
        }

        let url = Url::parse(raw)?;
        match url.scheme() {
            "http" | "https" => {}
            other => return Err(InvalidUrl::UnsupportedScheme(other.to_string())),
        }
        if url.host_str().map_or(true, str::is_empty) {
            return Err(InvalidUrl::MissingHost);
        }

        Ok(Self { url })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn base(&self) -> BaseUrl {
        BaseUrl::from_url(&self.url)
    }
}

/// Every `%` must introduce two hex digits.
fn check_escapes(raw: &str) -> Result<(), InvalidUrl> {
    let bytes = raw.as_bytes();
    for (i, b) in bytes.iter().enumerate() {
        if *b == b'%' {
            let well_formed = bytes
                .get(i + 1..i + 3)
                .is_some_and(|hex| hex.iter().all(u8::is_ascii_hexdigit));
            if !well_formed {
                return Err(InvalidUrl::BadEncoding);
            }
        }
    }
    Ok(())
}

/// Scheme and authority of a target, used to resolve relative references.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseUrl {
    scheme: String,
    host: String,
}

impl BaseUrl {
    pub fn from_url(url: &Url) -> Self {
        let host = url.host_str().unwrap_or_default();
        let host = match url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        };

        Self {
            scheme: url.scheme().to_string(),
            host,
        }
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// `base + "/" + reference` with the slashes at the seam collapsed.
    pub fn join_literal(&self, reference: &str) -> String {
        format!("{}/{}", self, reference.trim_start_matches('/'))
    }
}

impl fmt::Display for BaseUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.scheme, self.host)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn accepts_http_and_https() {
        assert!(TargetRequest::parse("http://example.com").is_ok());
        assert!(TargetRequest::parse("https://example.com/a?b=c#d").is_ok());
    }

    #[test]
    fn rejects_empty_and_schemeless_input() {
        assert!(matches!(TargetRequest::parse(""), Err(InvalidUrl::Empty)));
        assert!(matches!(TargetRequest::parse("   "), Err(InvalidUrl::Empty)));
        assert!(matches!(
            TargetRequest::parse("example.com/page"),
            Err(InvalidUrl::Malformed(_))
        ));
        assert!(matches!(
            TargetRequest::parse("/relative/path"),
            Err(InvalidUrl::Malformed(_))
        ));
    }

    #[test]
    fn rejects_local_and_other_schemes() {
        assert!(matches!(
            TargetRequest::parse("file:///etc/passwd"),
            Err(InvalidUrl::UnsupportedScheme(s)) if s == "file"
        ));
        assert!(matches!(
            TargetRequest::parse("ftp://example.com/x"),
            Err(InvalidUrl::UnsupportedScheme(_))
        ));
        assert!(matches!(
            TargetRequest::parse("javascript:alert(1)"),
            Err(InvalidUrl::UnsupportedScheme(_))
        ));
    }

    #[test]
    fn rejects_missing_host() {
        assert!(TargetRequest::parse("http://").is_err());
    }

    #[test]
    fn query_extraction_decodes_value() {
        let target =
            TargetRequest::from_query(Some("url=https%3A%2F%2Fsite.test%2Fabout")).unwrap();
        assert_eq!(target.url().as_str(), "https://site.test/about");
    }

    #[test]
    fn query_extraction_finds_url_among_other_params() {
        let target = TargetRequest::from_query(Some("lang=en&url=https://site.test/")).unwrap();
        assert_eq!(target.url().host_str(), Some("site.test"));
    }

    #[test]
    fn query_is_form_decoded() {
        let target = TargetRequest::from_query(Some("u%72l=https%3A%2F%2Fsite.test%2Fs%3Fq%3Da%2Bb")).unwrap();
        assert_eq!(target.url().as_str(), "https://site.test/s?q=a+b");

        let target = TargetRequest::from_query(Some("&&url=https://site.test/a+b&url=https://other.test/")).unwrap();
        assert_eq!(target.url().as_str(), "https://site.test/a%20b");
    }

    #[test]
    fn query_without_url_is_empty() {
        assert!(matches!(TargetRequest::from_query(None), Err(InvalidUrl::Empty)));
        assert!(matches!(
            TargetRequest::from_query(Some("foo=bar")),
            Err(InvalidUrl::Empty)
        ));
        assert!(matches!(
            TargetRequest::from_query(Some("url=")),
            Err(InvalidUrl::Empty)
        ));
    }

    #[test]
    fn malformed_percent_encoding_is_rejected() {
        assert!(matches!(
            TargetRequest::from_query(Some("url=https%3A%2F%2Fsite.test%2")),
            Err(InvalidUrl::BadEncoding)
        ));
        assert!(matches!(
            TargetRequest::from_query(Some("url=https://site.test/%zz")),
            Err(InvalidUrl::BadEncoding)
        ));
        assert!(matches!(
            TargetRequest::from_query(Some("url=https://site.test/%FF%FE")),
            Err(InvalidUrl::BadEncoding)
        ));
    }

    #[test]
    fn base_strips_path_query_and_fragment() {
        let target = TargetRequest::parse("https://example.com/a/b?c=d#e").unwrap();
        assert_eq!(target.base().to_string(), "https://example.com");
    }

    #[test]
    fn base_keeps_non_default_port() {
        let target = TargetRequest::parse("http://127.0.0.1:8081/x").unwrap();
        assert_eq!(target.base().to_string(), "http://127.0.0.1:8081");

        let target = TargetRequest::parse("https://example.com:443/x").unwrap();
        assert_eq!(target.base().to_string(), "https://example.com");
    }

    #[test]
    fn join_literal_collapses_seam_slashes() {
        let base = TargetRequest::parse("https://example.com/").unwrap().base();
        assert_eq!(base.join_literal("/a/b"), "https://example.com/a/b");
        assert_eq!(base.join_literal("a/b"), "https://example.com/a/b");
        assert_eq!(base.join_literal("//a"), "https://example.com/a");
    }
}
