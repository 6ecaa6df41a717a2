use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;
use crate::extractor::{DEFAULT_MAX_PAGE_CHARS, DEFAULT_MIN_PAGE_CHARS};
use crate::llm::client::{DEFAULT_BASE_URL, DEFAULT_MODEL};
use crate::scrapers::types::{FetchRequest, RenderWait, DEFAULT_USER_AGENT};
use crate::store::DEFAULT_SEEN_PATH;

/// Application configuration
#[derive(Clone)]
pub struct Config {
    pub llm_token: String,
    pub llm_base_url: String,
    pub llm_model: String,
    pub llm_timeout: Duration,

    pub telegram_token: String,
    pub telegram_chat_id: String,
    pub telegram_timeout: Duration,

    pub search_url: String,
    pub search_query: String,
    pub user_agent: String,
    pub render_wait: RenderWait,
    pub fetch_timeout: Duration,

    pub seen_path: PathBuf,
    pub poll_interval: Duration,
    pub min_page_chars: usize,
    pub max_page_chars: usize,
    /// Consecutive failed cycles before an alert goes out; 0 disables
    pub failure_alert_threshold: u32,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup; blank values count as missing.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let required = |key: &'static str| get(key).ok_or(ConfigError::Missing(key));

        Ok(Self {
            llm_token: required("GITHUB_TOKEN")?,
            llm_base_url: get("LLM_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            llm_model: get("LLM_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            llm_timeout: Duration::from_secs(parse_or(&get, "LLM_TIMEOUT_SECS", 120)?),

            telegram_token: required("TELEGRAM_TOKEN")?,
            telegram_chat_id: required("TELEGRAM_CHAT_ID")?,
            telegram_timeout: Duration::from_secs(30),

            search_url: required("SEARCH_URL")?,
            search_query: required("SEARCH_QUERY")?,
            user_agent: get("USER_AGENT").unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
            render_wait: parse_or(&get, "RENDER_WAIT", RenderWait::default())?,
            fetch_timeout: Duration::from_secs(parse_or(&get, "FETCH_TIMEOUT_SECS", 90)?),

            seen_path: get("SEEN_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_SEEN_PATH)),
            poll_interval: poll_interval(parse_or(&get, "POLL_INTERVAL_MINUTES", 30)?)?,
            min_page_chars: parse_or(&get, "MIN_PAGE_CHARS", DEFAULT_MIN_PAGE_CHARS)?,
            max_page_chars: parse_or(&get, "MAX_PAGE_CHARS", DEFAULT_MAX_PAGE_CHARS)?,
            failure_alert_threshold: parse_or(&get, "FAILURE_ALERT_THRESHOLD", 3)?,
        })
    }

    pub fn fetch_request(&self) -> FetchRequest {
        FetchRequest {
            url: self.search_url.clone(),
            user_agent: self.user_agent.clone(),
            render_wait: self.render_wait,
            timeout: self.fetch_timeout,
        }
    }
}

/// Validate a polling interval given in minutes. Zero and values that
/// overflow a `Duration` of seconds are rejected.
pub fn poll_interval(minutes: u64) -> Result<Duration, ConfigError> {
    let invalid = |reason: &str| ConfigError::Invalid {
        name: "POLL_INTERVAL_MINUTES",
        value: minutes.to_string(),
        reason: reason.to_string(),
    };

    if minutes == 0 {
        return Err(invalid("must be at least 1"));
    }
    minutes
        .checked_mul(60)
        .map(Duration::from_secs)
        .ok_or_else(|| invalid("too large"))
}

fn parse_or<T, G>(get: &G, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            name: key,
            value: raw,
            reason: e.to_string(),
        }),
    }
}

// Tokens stay out of logs.
impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("llm_base_url", &self.llm_base_url)
            .field("llm_model", &self.llm_model)
            .field("telegram_chat_id", &self.telegram_chat_id)
            .field("search_url", &self.search_url)
            .field("search_query", &self.search_query)
            .field("render_wait", &self.render_wait)
            .field("seen_path", &self.seen_path)
            .field("poll_interval", &self.poll_interval)
            .field("failure_alert_threshold", &self.failure_alert_threshold)
            .finish_non_exhaustive()
    }
}
