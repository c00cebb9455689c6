use std::env;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8787";
pub const DEFAULT_READ_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_WRITE_TIMEOUT_MS: u64 = 8_000;
pub const DEFAULT_CACHE_TTL_MS: u64 = 5_000;

/// Client settings resolved once at startup. The base URL is immutable for
/// the process lifetime; call sites receive a constructed client by
/// reference instead of reading the environment themselves.
///
/// Timeout values below 250 ms are clamped up to 250 ms when the client is
/// constructed; an override that low cannot complete a round-trip and would
/// fail every request.
#[derive(Debug, Clone)]
pub struct ControlHubConfig {
    pub base_url: String,
    pub read_timeout_ms: u64,
    pub write_timeout_ms: u64,
    pub cache_ttl_ms: u64,
}

impl ControlHubConfig {
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: normalize_base_url(&base_url.into()),
            read_timeout_ms: DEFAULT_READ_TIMEOUT_MS,
            write_timeout_ms: DEFAULT_WRITE_TIMEOUT_MS,
            cache_ttl_ms: DEFAULT_CACHE_TTL_MS,
        }
    }

    /// Resolves the base URL from `API_BASE_URL`, then `CONTROL_CENTER_URL`,
    /// then the localhost default. Timeout and TTL overrides that fail to
    /// parse fall back to their defaults.
    #[must_use]
    pub fn from_env() -> Self {
        let explicit = env::var("API_BASE_URL").ok();
        let secondary = env::var("CONTROL_CENTER_URL").ok();
        Self {
            base_url: resolve_base_url(explicit.as_deref(), secondary.as_deref()),
            read_timeout_ms: env_u64("CONTROL_HUB_READ_TIMEOUT_MS", DEFAULT_READ_TIMEOUT_MS),
            write_timeout_ms: env_u64("CONTROL_HUB_WRITE_TIMEOUT_MS", DEFAULT_WRITE_TIMEOUT_MS),
            cache_ttl_ms: env_u64("CONTROL_HUB_CACHE_TTL_MS", DEFAULT_CACHE_TTL_MS),
        }
    }
}

/// First non-empty value wins; the result never carries a trailing slash.
#[must_use]
pub fn resolve_base_url(explicit: Option<&str>, secondary: Option<&str>) -> String {
    explicit
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .or_else(|| secondary.map(str::trim).filter(|value| !value.is_empty()))
        .unwrap_or(DEFAULT_BASE_URL)
        .trim_end_matches('/')
        .to_string()
}

fn normalize_base_url(raw: &str) -> String {
    resolve_base_url(Some(raw), None)
}

fn env_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|value| value.trim().parse::<u64>().ok())
        .unwrap_or(default)
}
