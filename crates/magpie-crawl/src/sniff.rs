//! Response-body mime sniffing and storage eligibility.
//!
//! The declared Content-Type header is recorded but never trusted; the
//! sniffed type drives parsing and storage decisions. Binary signatures
//! come from `infer`; HTML and plain text fall back to a first-512-bytes
//! heuristic.

const SNIFF_LEN: usize = 512;

/// Path extensions that name server-side page technology, not content.
const NOT_CONTENT_EXTENSIONS: &[&str] = &["asp", "aspx", "cfm", "html", "net", "php", "xhtml"];

/// Markup openers that mark a body as HTML.
const HTML_TOKENS: &[&str] = &[
    "<!doctype html", "<html", "<head", "<body", "<script", "<title", "<iframe", "<h1", "<div",
    "<p>", "<p ", "<a ", "<!--",
];

/// Sniff the mime type of a response body from its leading bytes.
pub fn sniff(body: &[u8]) -> String {
    if body.is_empty() {
        return "text/plain; charset=utf-8".to_string();
    }
    if let Some(kind) = infer::get(body) {
        return kind.mime_type().to_string();
    }

    let head = &body[..body.len().min(SNIFF_LEN)];
    let text = String::from_utf8_lossy(head);
    let stripped = text.trim_start_matches('\u{feff}').trim_start();
    let lowered = stripped.to_lowercase();
    if HTML_TOKENS.iter().any(|t| lowered.starts_with(t)) {
        return "text/html; charset=utf-8".to_string();
    }

    if is_mostly_text(head) {
        "text/plain; charset=utf-8".to_string()
    } else {
        "application/octet-stream".to_string()
    }
}

/// HTML candidates for parsing: sniffed html, plus utf-8 plain text (pages
/// served with a lazy Content-Type still get their links extracted).
pub fn is_html_like(mime: &str) -> bool {
    mime.starts_with("text/html") || mime.starts_with("text/plain")
}

/// Types that never go to blob storage.
pub fn is_unwanted_mime(mime: &str) -> bool {
    mime.starts_with("text/html")
        || mime.starts_with("text/plain")
        || mime.starts_with("text/xml")
        || mime.starts_with("application/xml")
}

/// Guess a downloadable file name from the URL path. Requires a final
/// path segment with an extension that `mime_guess` recognizes and that
/// is not a page-technology extension.
pub fn file_name_for(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    let segment = parsed.path_segments()?.next_back()?.to_string();
    let (_, ext) = segment.rsplit_once('.')?;
    let ext = ext.to_ascii_lowercase();
    if ext.is_empty() || NOT_CONTENT_EXTENSIONS.contains(&ext.as_str()) {
        return None;
    }
    if mime_guess::from_ext(&ext).first().is_none() {
        return None;
    }
    Some(segment)
}

/// Whether a body with this sniffed type, fetched from this URL, should
/// be stored. `allowed_types` narrows storage further when non-empty.
pub fn is_storable(content_sniff: &str, url: &str, allowed_types: &[String]) -> bool {
    if is_unwanted_mime(content_sniff) {
        return false;
    }
    if file_name_for(url).is_none() {
        return false;
    }
    allowed_types.is_empty()
        || allowed_types
            .iter()
            .any(|t| content_sniff.starts_with(t.as_str()))
}

fn is_mostly_text(head: &[u8]) -> bool {
    match std::str::from_utf8(head) {
        Ok(_) => true,
        // A multi-byte character cut off at the sniff boundary is fine
        Err(e) => e.error_len().is_none() && e.valid_up_to() + 4 >= head.len(),
    }
}
