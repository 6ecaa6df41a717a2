use crate::extractor::Extractor;
use crate::models::{CycleOutcome, CycleReport};
use crate::notify::Notifier;
use crate::scrapers::{FetchRequest, PageFetcher};
use crate::store::SeenStore;
use anyhow::Result;
use chrono::Utc;
use std::sync::Arc;
use tracing::info;

/// One search target wired to its collaborators: fetch → extract → notify.
pub struct Pipeline {
    fetcher: Arc<dyn PageFetcher>,
    extractor: Extractor,
    notifier: Notifier,
    store: Arc<dyn SeenStore>,
    request: FetchRequest,
    criteria: String,
}

impl Pipeline {
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        extractor: Extractor,
        notifier: Notifier,
        store: Arc<dyn SeenStore>,
        request: FetchRequest,
        criteria: impl Into<String>,
    ) -> Self {
        Self {
            fetcher,
            extractor,
            notifier,
            store,
            request,
            criteria: criteria.into(),
        }
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    /// Run a single cycle.
    ///
    /// The seen-set is loaded once here, read by extraction, updated by
    /// notification and saved once at the end of notification.
    pub async fn run_cycle(&self) -> Result<CycleReport> {
        let started_at = Utc::now();
        info!("⏰ Waking up, crawling with {}...", self.fetcher.name());

        let page = self.fetcher.fetch(&self.request).await;
        let outcome = if page.trim().is_empty() {
            info!("Fetcher returned no content, skipping analysis");
            CycleOutcome::EmptyPage
        } else {
            let mut seen = self.store.load().await;
            let candidates = self
                .extractor
                .extract(&page, &self.criteria, &seen)
                .await?;

            if candidates.is_empty() {
                info!("💤 No new matches.");
                CycleOutcome::NoMatches
            } else {
                let report = self
                    .notifier
                    .notify(&candidates, &mut seen, self.store.as_ref())
                    .await?;
                info!(
                    "Delivered {} alert(s), {} failed, {} skipped",
                    report.delivered, report.failed, report.skipped
                );
                CycleOutcome::Notified(report)
            }
        };

        Ok(CycleReport {
            started_at,
            duration_ms: (Utc::now() - started_at).num_milliseconds(),
            outcome,
        })
    }
}
