// Test doubles for the scout pipeline, one per trait boundary:
// - StubFetcher (PageFetcher): fixed page text, or a panic
// - ScriptedModel (CompletionModel): canned replies with a call counter
// - RecordingSender (MessageSender): records messages, fails on demand
// - MemoryStore (SeenStore): in-memory seen-set with a save counter, saves can fail

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::error::DeliveryError;
use crate::llm::CompletionModel;
use crate::models::SeenSet;
use crate::notify::MessageSender;
use crate::scrapers::{FetchRequest, PageFetcher};
use crate::store::SeenStore;

// ---------------------------------------------------------------------------
// StubFetcher
// ---------------------------------------------------------------------------

pub struct StubFetcher {
    page: String,
    panic: bool,
    calls: AtomicUsize,
}

impl StubFetcher {
    pub fn returning(page: impl Into<String>) -> Self {
        Self {
            page: page.into(),
            panic: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn empty() -> Self {
        Self::returning("")
    }

    pub fn panicking() -> Self {
        Self {
            page: String::new(),
            panic: true,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PageFetcher for StubFetcher {
    async fn fetch(&self, _request: &FetchRequest) -> String {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.panic {
            panic!("renderer crashed");
        }
        self.page.clone()
    }

    fn name(&self) -> &'static str {
        "stub"
    }
}

/// Listing-page filler of exactly `len` characters
pub fn page_of_len(len: usize) -> String {
    "listing page text ".chars().cycle().take(len).collect()
}

// ---------------------------------------------------------------------------
// ScriptedModel
// ---------------------------------------------------------------------------

/// Replies are consumed in order; the last one repeats.
/// A reply of `Err(msg)` simulates a transport failure.
pub struct ScriptedModel {
    replies: Mutex<VecDeque<Result<String, String>>>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedModel {
    pub fn replying(reply: &str) -> Self {
        Self::script(vec![Ok(reply.to_string())])
    }

    pub fn failing(message: &str) -> Self {
        Self::script(vec![Err(message.to_string())])
    }

    pub fn script(replies: Vec<Result<String, String>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.prompts.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl CompletionModel for ScriptedModel {
    async fn complete(&self, prompt: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());

        let mut replies = self.replies.lock().unwrap();
        let reply = if replies.len() > 1 {
            replies.pop_front()
        } else {
            replies.front().cloned()
        };

        match reply {
            Some(Ok(text)) => Ok(text),
            Some(Err(message)) => Err(anyhow!(message)),
            None => Ok("[]".to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// RecordingSender
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct RecordingSender {
    sent: Mutex<Vec<String>>,
    attempts: AtomicUsize,
    fail_containing: Vec<String>,
}

impl RecordingSender {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject any message whose text contains `needle`
    pub fn failing_on(mut self, needle: &str) -> Self {
        self.fail_containing.push(needle.to_string());
        self
    }

    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MessageSender for RecordingSender {
    async fn send(&self, text: &str) -> Result<(), DeliveryError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail_containing.iter().any(|needle| text.contains(needle)) {
            return Err(DeliveryError::Status {
                status: 400,
                body: "Bad Request: chat not found".to_string(),
            });
        }
        self.sent.lock().unwrap().push(text.to_string());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryStore {
    seen: Mutex<SeenSet>,
    loads: AtomicUsize,
    saves: AtomicUsize,
    fail_saves: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_urls(urls: &[&str]) -> Self {
        let seen = SeenSet::from(urls.iter().map(|u| u.to_string()).collect::<Vec<_>>());
        Self {
            seen: Mutex::new(seen),
            ..Default::default()
        }
    }

    /// Every `save` returns an error and leaves the stored set untouched
    pub fn failing_saves(mut self) -> Self {
        self.fail_saves = true;
        self
    }

    pub fn snapshot(&self) -> SeenSet {
        self.seen.lock().unwrap().clone()
    }

    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    pub fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SeenStore for MemoryStore {
    async fn load(&self) -> SeenSet {
        self.loads.fetch_add(1, Ordering::SeqCst);
        self.snapshot()
    }

    async fn save(&self, seen: &SeenSet) -> Result<()> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        if self.fail_saves {
            return Err(anyhow!("disk full"));
        }
        *self.seen.lock().unwrap() = seen.clone();
        Ok(())
    }
}
