use crate::scrapers::types::FetchRequest;
use async_trait::async_trait;

/// Common trait for page fetchers.
///
/// Implementations never fail: any launch, navigation or render problem is
/// logged and reported as an empty string, which callers treat as "nothing to analyze".
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Render the page and return it as markdown text, or `""`
    async fn fetch(&self, request: &FetchRequest) -> String;

    /// Get the name of the fetcher backend
    fn name(&self) -> &'static str;
}
