use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashSet;

/// A listing the model proposed as new and matching the search criteria
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Candidate {
    pub title: String,
    #[serde(deserialize_with = "string_or_number")]
    pub price: String,
    pub url: String,
    pub reason: String,
}

impl Candidate {
    /// Minimal link check: anything without a scheme marker is not deliverable.
    pub fn has_valid_url(&self) -> bool {
        self.url.contains("://")
    }
}

// Models often answer `"price": 32000` even when asked for a string.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Price {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(match Price::deserialize(deserializer)? {
        Price::Text(s) => s,
        Price::Number(n) => n.to_string(),
    })
}

/// Ordered set of listing URLs that already triggered a notification.
///
/// Persisted as a flat JSON array of strings; insertion order is preserved
/// and duplicates are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct SeenSet {
    urls: Vec<String>,
    #[serde(skip)]
    index: HashSet<String>,
}

impl SeenSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, url: &str) -> bool {
        self.index.contains(url)
    }

    /// Appends `url` unless it is already present. Returns whether it was added.
    pub fn insert(&mut self, url: impl Into<String>) -> bool {
        let url = url.into();
        if self.index.contains(&url) {
            return false;
        }
        self.index.insert(url.clone());
        self.urls.push(url);
        true
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.urls
    }
}

impl From<Vec<String>> for SeenSet {
    fn from(urls: Vec<String>) -> Self {
        let mut set = SeenSet::new();
        for url in urls {
            set.insert(url);
        }
        set
    }
}

impl From<SeenSet> for Vec<String> {
    fn from(set: SeenSet) -> Self {
        set.urls
    }
}

/// Per-cycle delivery counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub delivered: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// What a single successful cycle ended with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Fetcher returned nothing usable
    EmptyPage,
    /// Page was analyzed but nothing new matched
    NoMatches,
    Notified(DeliveryReport),
}

/// Logged summary of one cycle
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub started_at: DateTime<Utc>,
    pub duration_ms: i64,
    pub outcome: CycleOutcome,
}
