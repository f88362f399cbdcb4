//! URL canonicalization.
//!
//! Every URL string entering the system passes through [`normalize`] so
//! that one page has exactly one record. The parser handles scheme/host
//! lowercasing, default-port removal, and dot-segment resolution; the
//! string pass afterwards collapses duplicate slashes, trims non-root
//! trailing slashes, and uppercases percent-escape hex. The function is
//! idempotent.

use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
#[error("could not parse url {url}: {source}")]
pub struct NormalizeError {
    /// The original input, returned alongside the parse failure.
    pub url: String,
    #[source]
    pub source: url::ParseError,
}

/// Canonicalize a raw URL string.
pub fn normalize(raw: &str) -> Result<String, NormalizeError> {
    let trimmed = raw.trim();
    let mut parsed = Url::parse(trimmed).map_err(|source| NormalizeError {
        url: raw.to_string(),
        source,
    })?;
    parsed.set_fragment(None);
    Ok(rewrite_path_and_query(parsed.as_str()))
}

/// Host component of a URL string; empty when absent or unparseable.
pub fn host_of(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_string()))
        .unwrap_or_default()
}

fn rewrite_path_and_query(serialized: &str) -> String {
    let authority_start = match serialized.find("://") {
        Some(i) => i + 3,
        None => return uppercase_escapes(serialized),
    };
    let path_start = match serialized[authority_start..].find('/') {
        Some(i) => authority_start + i,
        None => return uppercase_escapes(serialized),
    };
    let (head, rest) = serialized.split_at(path_start);
    let (raw_path, query) = match rest.find('?') {
        Some(i) => rest.split_at(i),
        None => (rest, ""),
    };

    let mut path = collapse_slashes(raw_path);
    if path.len() > 1 && path.ends_with('/') {
        path.pop();
    }

    format!(
        "{}{}{}",
        head,
        uppercase_escapes(&path),
        uppercase_escapes(query)
    )
}

fn collapse_slashes(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    let mut prev_slash = false;
    for c in path.chars() {
        if c == '/' {
            if prev_slash {
                continue;
            }
            prev_slash = true;
        } else {
            prev_slash = false;
        }
        out.push(c);
    }
    out
}

fn uppercase_escapes(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = String::with_capacity(s.len());
    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i] as char;
        if c == '%' && i + 2 < bytes.len() {
            let hi = bytes[i + 1] as char;
            let lo = bytes[i + 2] as char;
            if hi.is_ascii_hexdigit() && lo.is_ascii_hexdigit() {
                out.push('%');
                out.push(hi.to_ascii_uppercase());
                out.push(lo.to_ascii_uppercase());
                i += 3;
                continue;
            }
        }
        out.push(c);
        i += 1;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowercases_scheme_and_host() {
        assert_eq!(
            normalize("HTTP://Example.COM/Path").unwrap(),
            "http://example.com/Path"
        );
    }

    #[test]
    fn removes_default_port_and_fragment() {
        assert_eq!(
            normalize("http://example.com:80/a#section").unwrap(),
            "http://example.com/a"
        );
        assert_eq!(
            normalize("https://example.com:443/a").unwrap(),
            "https://example.com/a"
        );
        // Non-default ports survive
        assert_eq!(
            normalize("http://example.com:8080/a").unwrap(),
            "http://example.com:8080/a"
        );
    }

    #[test]
    fn collapses_duplicate_slashes() {
        assert_eq!(
            normalize("http://example.com//a///b").unwrap(),
            "http://example.com/a/b"
        );
    }

    #[test]
    fn trims_trailing_slash_but_keeps_root() {
        assert_eq!(
            normalize("http://example.com/a/").unwrap(),
            "http://example.com/a"
        );
        assert_eq!(normalize("http://example.com/").unwrap(), "http://example.com/");
        assert_eq!(normalize("http://example.com").unwrap(), "http://example.com/");
    }

    #[test]
    fn uppercases_percent_escapes() {
        assert_eq!(
            normalize("http://example.com/a%2fb?q=%3d").unwrap(),
            "http://example.com/a%2Fb?q=%3D"
        );
    }

    #[test]
    fn resolves_dot_segments() {
        assert_eq!(
            normalize("http://example.com/a/../b/./c").unwrap(),
            "http://example.com/b/c"
        );
    }

    #[test]
    fn is_idempotent() {
        let samples = [
            "HTTP://Example.COM:80//a//b/?q=%2f#frag",
            "http://example.com/",
            "https://example.com/a%20b/c/",
            "mailto:someone@example.com",
            "http://example.com/a/../b",
        ];
        for raw in samples {
            let once = normalize(raw).unwrap();
            let twice = normalize(&once).unwrap();
            assert_eq!(once, twice, "normalize not idempotent for {}", raw);
        }
    }

    #[test]
    fn unparseable_input_keeps_the_original() {
        let err = normalize("not a url at all").unwrap_err();
        assert_eq!(err.url, "not a url at all");
        assert!(normalize("example.com/no-scheme").is_err());
    }

    #[test]
    fn host_extraction() {
        assert_eq!(host_of("http://cdn.example.com/file.pdf"), "cdn.example.com");
        assert_eq!(host_of("mailto:foo@bar"), "");
        assert_eq!(host_of("garbage"), "");
    }
}
