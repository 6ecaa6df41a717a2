pub mod telegram;

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::DeliveryError;
use crate::models::{Candidate, DeliveryReport, SeenSet};
use crate::store::SeenStore;

pub use telegram::TelegramSender;

/// Delivers one formatted message to the configured channel
#[async_trait]
pub trait MessageSender: Send + Sync {
    async fn send(&self, text: &str) -> Result<(), DeliveryError>;
}

/// Formats candidates, sends them one by one and records what got through.
pub struct Notifier {
    sender: Arc<dyn MessageSender>,
}

impl Notifier {
    pub fn new(sender: Arc<dyn MessageSender>) -> Self {
        Self { sender }
    }

    pub fn sender(&self) -> &Arc<dyn MessageSender> {
        &self.sender
    }

    /// Send every deliverable candidate, mark delivered URLs in `seen` and
    /// persist `seen` once at the end.
    ///
    /// A failed delivery leaves the URL unmarked so the next cycle retries it.
    /// A failed save is returned as an error even when messages went out, so
    /// the cycle counts as failed; those listings will be announced again.
    pub async fn notify(
        &self,
        candidates: &[Candidate],
        seen: &mut SeenSet,
        store: &dyn SeenStore,
    ) -> Result<DeliveryReport> {
        let mut report = DeliveryReport::default();

        for candidate in candidates {
            if !candidate.has_valid_url() {
                debug!(url = %candidate.url, "Skipping candidate without a usable link");
                report.skipped += 1;
                continue;
            }

            let message = format_message(candidate);
            match self.sender.send(&message).await {
                Ok(()) => {
                    info!(url = %candidate.url, "Sent alert for {}", candidate.title);
                    seen.insert(candidate.url.clone());
                    report.delivered += 1;
                }
                Err(e) => {
                    warn!(url = %candidate.url, "Failed to deliver alert: {}", e);
                    report.failed += 1;
                }
            }
        }

        store
            .save(seen)
            .await
            .context("Failed to persist seen listings")?;

        Ok(report)
    }
}

/// Telegram (legacy Markdown) message for one listing
pub fn format_message(candidate: &Candidate) -> String {
    format!(
        "🏠 *New match found!*\n\n{}\n💰 {}\n🔗 [Link]({})\n\n{}",
        emphasize(&candidate.title, '*'),
        escape_markdown(&candidate.price),
        candidate.url.replace(')', "%29"),
        emphasize(&format!("Why: {}", candidate.reason.trim()), '_'),
    )
}

fn is_reserved(c: char) -> bool {
    matches!(c, '_' | '*' | '`' | '[')
}

/// Escape the characters legacy Markdown treats as entity delimiters.
///
/// Only valid outside an entity; use [`emphasize`] for text inside one.
pub fn escape_markdown(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.trim().chars() {
        if is_reserved(c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Wrap `text` in a bold (`*`) or italic (`_`) entity.
///
/// Legacy Markdown does not allow escapes inside an entity, so the entity is
/// closed before each reserved character and reopened after it, e.g.
/// `near_metro` in italics becomes `_near_\__metro_`.
pub fn emphasize(text: &str, marker: char) -> String {
    let mut out = String::with_capacity(text.len() + 4);
    let mut run = String::new();

    let flush = |out: &mut String, run: &mut String| {
        if !run.is_empty() {
            out.push(marker);
            out.push_str(run);
            out.push(marker);
            run.clear();
        }
    };

    for c in text.trim().chars() {
        if is_reserved(c) {
            flush(&mut out, &mut run);
            out.push('\\');
            out.push(c);
        } else {
            run.push(c);
        }
    }
    flush(&mut out, &mut run);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MemoryStore, RecordingSender};

    fn candidate(url: &str) -> Candidate {
        Candidate {
            title: format!("Listing {}", url),
            price: "30,000".to_string(),
            url: url.to_string(),
            reason: "in budget".to_string(),
        }
    }

    #[tokio::test]
    async fn delivered_urls_are_marked_and_failures_are_not() {
        let sender = Arc::new(RecordingSender::new().failing_on("https://example.test/bad"));
        let notifier = Notifier::new(sender.clone());
        let store = MemoryStore::with_urls(&["https://example.test/old"]);
        let mut seen = store.load().await;

        let candidates = vec![
            candidate("https://example.test/good"),
            candidate("https://example.test/bad"),
        ];
        let report = notifier.notify(&candidates, &mut seen, &store).await.unwrap();

        assert_eq!(
            report,
            DeliveryReport {
                delivered: 1,
                failed: 1,
                skipped: 0
            }
        );
        assert_eq!(sender.attempts(), 2);
        assert_eq!(store.saves(), 1);

        let saved = store.snapshot();
        assert!(saved.contains("https://example.test/old"));
        assert!(saved.contains("https://example.test/good"));
        assert!(!saved.contains("https://example.test/bad"));
    }

    #[tokio::test]
    async fn invalid_links_are_skipped_without_delivery() {
        let sender = Arc::new(RecordingSender::new());
        let notifier = Notifier::new(sender.clone());
        let store = MemoryStore::new();
        let mut seen = SeenSet::new();

        let report = notifier
            .notify(&[candidate("not-a-link")], &mut seen, &store)
            .await
            .unwrap();

        assert_eq!(report.skipped, 1);
        assert_eq!(report.delivered, 0);
        assert_eq!(sender.attempts(), 0);
        assert!(seen.is_empty());
        assert!(store.snapshot().is_empty());
    }

    #[tokio::test]
    async fn messages_go_out_in_candidate_order() {
        let sender = Arc::new(RecordingSender::new());
        let notifier = Notifier::new(sender.clone());
        let store = MemoryStore::new();
        let mut seen = SeenSet::new();
        let candidates: Vec<_> = (1..=3)
            .map(|i| candidate(&format!("https://example.test/{}", i)))
            .collect();

        notifier.notify(&candidates, &mut seen, &store).await.unwrap();

        let sent = sender.sent();
        assert_eq!(sent.len(), 3);
        for (i, text) in sent.iter().enumerate() {
            assert!(text.contains(&format!("https://example.test/{}", i + 1)));
        }
        assert_eq!(
            seen.as_slice(),
            [
                "https://example.test/1",
                "https://example.test/2",
                "https://example.test/3"
            ]
        );
    }

    #[tokio::test]
    async fn failed_save_after_delivery_is_an_error() {
        let sender = Arc::new(RecordingSender::new());
        let notifier = Notifier::new(sender.clone());
        let store = MemoryStore::new().failing_saves();
        let mut seen = SeenSet::new();

        let err = notifier
            .notify(&[candidate("https://example.test/1")], &mut seen, &store)
            .await
            .unwrap_err();

        assert!(format!("{:#}", err).contains("Failed to persist seen listings"));
        assert_eq!(sender.sent().len(), 1);
        assert_eq!(store.saves(), 1);
        assert!(seen.contains("https://example.test/1"));
        assert!(store.snapshot().is_empty());
    }

    /// Telegram's legacy Markdown rule: `\\` escapes only outside an entity,
    /// and every `*`/`_` entity must be closed.
    fn parses_as_legacy_markdown(text: &str) -> bool {
        let mut open: Option<char> = None;
        let mut chars = text.chars();
        while let Some(c) = chars.next() {
            match (open, c) {
                (None, '\\') => {
                    chars.next();
                }
                (None, '*' | '_') => open = Some(c),
                (Some(m), c) if c == m => open = None,
                (Some(_), '\\') => return false,
                _ => {}
            }
        }
        open.is_none()
    }

    #[test]
    fn emphasis_is_reopened_around_reserved_characters() {
        assert_eq!(emphasize("near_metro", '_'), r"_near_\__metro_");
        assert_eq!(emphasize("2*2=4", '*'), r"*2*\**2=4*");
        assert_eq!(emphasize("2BHK*", '*'), r"*2BHK*\*");
        assert_eq!(emphasize("plain", '*'), "*plain*");
        assert_eq!(emphasize("", '*'), "");
    }

    #[test]
    fn message_escapes_model_text() {
        let c = Candidate {
            title: "2BHK *furnished* near_metro".to_string(),
            price: "₹32,000 `neg`".to_string(),
            url: "https://example.test/listing/(42)".to_string(),
            reason: "near_metro, has [balcony]".to_string(),
        };
        let msg = format_message(&c);

        assert!(msg.contains(r"*2BHK *\**furnished*\** near*\_*metro*"));
        assert!(msg.contains("[Link](https://example.test/listing/(42%29)"));
        assert!(msg.contains(r"_Why: near_\__metro, has _\[_balcony]_"));
        assert!(msg.contains(r"💰 ₹32,000 \`neg\`"));
        assert!(parses_as_legacy_markdown(&msg), "unbalanced: {}", msg);
    }

    #[test]
    fn plain_text_message_is_well_formed() {
        let msg = format_message(&candidate("https://example.test/7"));
        assert!(msg.contains("*Listing https://example.test/7*"));
        assert!(msg.contains("_Why: in budget_"));
        assert!(parses_as_legacy_markdown(&msg));
    }
}
