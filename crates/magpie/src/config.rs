//! Application settings.
//!
//! Settings come from the environment (UPPER_SNAKE names); a `.env` file is
//! loaded by the binary before anything reads them. Every option has a
//! default so a bare environment still yields a runnable configuration.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Default staleness window before a URL is re-fetched.
const DEFAULT_STALE_HOURS: u64 = 72;

/// Application settings.
#[derive(Debug, Clone)]
pub struct Settings {
    /// HTTP listen port.
    pub port: u16,
    /// SQLite database URL or path.
    pub database_url: String,
    /// Whether to start the crawl scheduler at all.
    pub crawl: bool,
    /// Enforce the per-host delay between requests.
    pub polite: bool,
    /// Minimum delay between consecutive requests to one host.
    pub crawl_delay: Duration,
    /// Age of `last_get`/`last_head` after which a URL is re-enqueued.
    pub stale_duration: Duration,
    /// Sniffed content types eligible for blob storage. Empty allows all
    /// types that pass the unwanted-mime and extension filters.
    pub store_content_types: Vec<String>,
    /// Root directory of the filesystem blob store.
    pub blob_dir: PathBuf,
    /// Key prefix under which bodies are stored.
    pub bucket_path: String,
    /// Basic-auth credentials for admin endpoints; auth is enforced only
    /// when both are set.
    pub http_auth_username: Option<String>,
    pub http_auth_password: Option<String>,
    /// User agent for outgoing requests.
    pub user_agent: String,
    /// Client-wide request timeout.
    pub request_timeout: Duration,
    /// How many unfetched URLs each seeding pass enqueues.
    pub seed_batch_size: i64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            port: 3030,
            database_url: "magpie.db".to_string(),
            crawl: true,
            polite: true,
            crawl_delay: Duration::from_secs(2),
            stale_duration: Duration::from_secs(DEFAULT_STALE_HOURS * 3600),
            store_content_types: Vec::new(),
            blob_dir: PathBuf::from("blobs"),
            bucket_path: "content".to_string(),
            http_auth_username: None,
            http_auth_password: None,
            user_agent: format!("magpie/{} (web archiver)", env!("CARGO_PKG_VERSION")),
            request_timeout: Duration::from_secs(30),
            seed_batch_size: 100,
        }
    }
}

impl Settings {
    /// Build settings from the process environment, falling back to
    /// defaults for anything unset or unparseable.
    pub fn from_env() -> Self {
        let defaults = Settings::default();
        Self {
            port: env_parse("PORT", defaults.port),
            database_url: env::var("DATABASE_URL").unwrap_or(defaults.database_url),
            crawl: env_bool("CRAWL", defaults.crawl),
            polite: env_bool("POLITE", defaults.polite),
            crawl_delay: Duration::from_secs(env_parse(
                "CRAWL_DELAY_SECONDS",
                defaults.crawl_delay.as_secs(),
            )),
            stale_duration: Duration::from_secs(
                env_parse("STALE_DURATION_HOURS", DEFAULT_STALE_HOURS) * 3600,
            ),
            store_content_types: env::var("STORE_CONTENT_TYPES")
                .map(|v| parse_list(&v))
                .unwrap_or(defaults.store_content_types),
            blob_dir: env::var("BLOB_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.blob_dir),
            bucket_path: env::var("BUCKET_PATH").unwrap_or(defaults.bucket_path),
            http_auth_username: env::var("HTTP_AUTH_USERNAME").ok().filter(|v| !v.is_empty()),
            http_auth_password: env::var("HTTP_AUTH_PASSWORD").ok().filter(|v| !v.is_empty()),
            user_agent: env::var("USER_AGENT").unwrap_or(defaults.user_agent),
            request_timeout: Duration::from_secs(env_parse(
                "REQUEST_TIMEOUT_SECONDS",
                defaults.request_timeout.as_secs(),
            )),
            seed_batch_size: env_parse("SEED_BATCH_SIZE", defaults.seed_batch_size),
        }
    }

    /// Basic auth is enforced only when both credentials are configured.
    pub fn auth_credentials(&self) -> Option<(&str, &str)> {
        match (&self.http_auth_username, &self.http_auth_password) {
            (Some(user), Some(pass)) => Some((user.as_str(), pass.as_str())),
            _ => None,
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_bool(name: &str, default: bool) -> bool {
    match env::var(name) {
        Ok(v) => parse_bool(&v, default),
        Err(_) => default,
    }
}

fn parse_bool(value: &str, default: bool) -> bool {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        _ => default,
    }
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bool_parsing() {
        assert!(parse_bool("true", false));
        assert!(parse_bool("1", false));
        assert!(parse_bool("YES", false));
        assert!(!parse_bool("false", true));
        assert!(!parse_bool("0", true));
        assert!(parse_bool("garbage", true));
    }

    #[test]
    fn list_parsing() {
        assert_eq!(
            parse_list("application/pdf, image/png,"),
            vec!["application/pdf", "image/png"]
        );
        assert!(parse_list("").is_empty());
    }

    #[test]
    fn defaults_are_sane() {
        let settings = Settings::default();
        assert_eq!(settings.stale_duration, Duration::from_secs(72 * 3600));
        assert!(settings.polite);
        assert!(settings.auth_credentials().is_none());
    }
}
