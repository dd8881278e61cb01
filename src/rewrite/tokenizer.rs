use encoding_rs::Encoding;
use lol_html::errors::RewritingError;
use lol_html::{element, AsciiCompatibleEncoding, HtmlRewriter, Settings};

use super::{attribute_text, resolve_reference, URL_ATTRIBUTES};
use crate::config::ProxyEndpoint;
use crate::target::BaseUrl;

/// Tokenizer-backed variant of [`super::rewrite_html`].
///
/// Only attributes of real elements are rewritten; comments, text and
/// script bodies are left alone. Output is in the same `encoding` as input.
pub fn rewrite_html(
    body: &[u8],
    encoding: AsciiCompatibleEncoding,
    base: &BaseUrl,
    endpoint: &ProxyEndpoint,
) -> Result<Vec<u8>, RewritingError> {
    let mut output = Vec::with_capacity(body.len());

    let element_content_handlers = URL_ATTRIBUTES
        .iter()
        .map(move |&attr| {
            let selector = format!("*[{attr}]");
            element!(selector, move |el| {
                if let Some(value) = el.get_attribute(attr) {
                    if let Some(absolute) = resolve_reference(&attribute_text(value.as_bytes()), base) {
                        el.set_attribute(attr, &endpoint.proxied(&absolute))?;
                    }
                }
                Ok(())
            })
        })
        .collect();

    let mut rewriter = HtmlRewriter::new(
        Settings {
            element_content_handlers,
            encoding,
            ..Settings::default()
        },
        |c: &[u8]| output.extend_from_slice(c),
    );

    rewriter.write(body)?;
    rewriter.end()?;

    Ok(output)
}

/// Encoding to tokenize with. Unknown labels and encodings that are not
/// ASCII-compatible fall back to UTF-8.
pub fn encoding_for(content_type: Option<&str>) -> AsciiCompatibleEncoding {
    charset(content_type)
        .and_then(AsciiCompatibleEncoding::new)
        .unwrap_or_else(AsciiCompatibleEncoding::utf_8)
}

/// Encoding named by the `charset` parameter of a content type.
fn charset(content_type: Option<&str>) -> Option<&'static Encoding> {
    let label = content_type?.split(';').skip(1).find_map(|param| {
        let (key, value) = param.split_once('=')?;
        key.trim()
            .eq_ignore_ascii_case("charset")
            .then(|| value.trim().trim_matches('"'))
    })?;
    Encoding::for_label(label.as_bytes())
}
