use std::fmt;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// How the fetcher decides a rendered page is ready to read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderWait {
    /// Wait for the browser's navigation/DOM-ready signal. Some listing sites never send it.
    DomReady,
    /// Navigate, then sleep for a fixed delay before reading the DOM.
    Fixed(Duration),
}

impl Default for RenderWait {
    fn default() -> Self {
        RenderWait::Fixed(Duration::from_secs(8))
    }
}

impl fmt::Display for RenderWait {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderWait::DomReady => write!(f, "dom-ready"),
            RenderWait::Fixed(d) => write!(f, "fixed:{}", d.as_secs()),
        }
    }
}

impl FromStr for RenderWait {
    type Err = String;

    /// Accepts `dom-ready` or `fixed:<seconds>`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("dom-ready") {
            return Ok(RenderWait::DomReady);
        }
        match s.split_once(':') {
            Some((kind, secs)) if kind.eq_ignore_ascii_case("fixed") => secs
                .trim()
                .parse::<u64>()
                .map(|n| RenderWait::Fixed(Duration::from_secs(n)))
                .map_err(|e| format!("bad delay: {}", e)),
            _ => Err("expected `dom-ready` or `fixed:<seconds>`".to_string()),
        }
    }
}

/// Everything the fetcher needs for one page load
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub url: String,
    pub user_agent: String,
    pub render_wait: RenderWait,
    /// Hard upper bound on launch + navigation + render
    pub timeout: Duration,
}

impl FetchRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            render_wait: RenderWait::default(),
            timeout: Duration::from_secs(90),
        }
    }
}
