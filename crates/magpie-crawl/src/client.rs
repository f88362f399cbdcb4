//! HTTP fetch client.
//!
//! Thin wrapper over reqwest that collects everything the response
//! handler needs into a plain [`Fetched`] value: status, ordered headers,
//! body bytes, and the wall-clock duration from request send to body-read
//! completion. Handlers and tests work with `Fetched` directly.

use std::time::{Duration, Instant};

use magpie::models::HeaderPairs;
use reqwest::Client;

/// Request method a queue task carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Head,
    Get,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Head => "HEAD",
            Self::Get => "GET",
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A completed fetch, ready for the response handler.
#[derive(Debug, Clone)]
pub struct Fetched {
    pub url: String,
    pub method: Method,
    pub status: i32,
    /// Response headers in arrival order.
    pub headers: HeaderPairs,
    /// Body bytes; `None` for HEAD.
    pub body: Option<Vec<u8>>,
    /// Request send to body-read completion.
    pub duration: Duration,
}

impl Fetched {
    /// Case-insensitive header lookup, first match wins.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn content_type(&self) -> &str {
        self.header("content-type").unwrap_or("")
    }

    /// Declared Content-Length; -1 when absent or unparseable.
    pub fn content_length(&self) -> i64 {
        self.header("content-length")
            .and_then(|v| v.parse().ok())
            .unwrap_or(-1)
    }
}

/// Fetch client shared by all queues.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .gzip(true)
            .brotli(true)
            .build()?;
        Ok(Self { client })
    }

    /// Perform one request and collect the response.
    pub async fn fetch(&self, url: &str, method: Method) -> Result<Fetched, reqwest::Error> {
        let request = match method {
            Method::Head => self.client.head(url),
            Method::Get => self.client.get(url),
        };

        let start = Instant::now();
        let response = request.send().await?;
        let status = response.status().as_u16() as i32;

        let mut headers = HeaderPairs::new();
        for (name, value) in response.headers() {
            if let Ok(v) = value.to_str() {
                headers.push((name.to_string(), v.to_string()));
            }
        }

        let body = match method {
            Method::Head => None,
            Method::Get => Some(response.bytes().await?.to_vec()),
        };
        let duration = start.elapsed();

        Ok(Fetched {
            url: url.to_string(),
            method,
            status,
            headers,
            body,
            duration,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fetched_with_headers(headers: HeaderPairs) -> Fetched {
        Fetched {
            url: "http://example.com/a".into(),
            method: Method::Get,
            status: 200,
            headers,
            body: Some(Vec::new()),
            duration: Duration::from_millis(1),
        }
    }

    #[test]
    fn header_lookup_is_case_insensitive() {
        let fetched = fetched_with_headers(vec![
            ("Content-Type".into(), "text/html".into()),
            ("Content-Length".into(), "42".into()),
        ]);
        assert_eq!(fetched.content_type(), "text/html");
        assert_eq!(fetched.content_length(), 42);
        assert_eq!(fetched.header("CONTENT-TYPE"), Some("text/html"));
    }

    #[test]
    fn missing_content_length_is_unknown() {
        let fetched = fetched_with_headers(Vec::new());
        assert_eq!(fetched.content_length(), -1);
        assert_eq!(fetched.content_type(), "");
    }
}
