use crate::scrapers::markdown::html_to_markdown;
use crate::scrapers::traits::PageFetcher;
use crate::scrapers::types::{FetchRequest, RenderWait};
use anyhow::{Context, Result};
use async_trait::async_trait;
use headless_chrome::{Browser, LaunchOptions};
use std::ffi::OsStr;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Social widgets and trackers that slow down listing pages without adding content
const BLOCKED_HOSTS: [&str; 10] = [
    "*.facebook.com",
    "*.facebook.net",
    "*.twitter.com",
    "*.instagram.com",
    "*.linkedin.com",
    "*.youtube.com",
    "*.doubleclick.net",
    "*.google-analytics.com",
    "*.googletagmanager.com",
    "*.hotjar.com",
];

/// Page fetcher backed by headless Chrome.
///
/// A fresh browser is launched per fetch so a wedged renderer never survives
/// into the next cycle.
#[derive(Clone)]
pub struct BrowserFetcher {
    window_size: (u32, u32),
}

impl BrowserFetcher {
    pub fn new() -> Self {
        Self {
            window_size: (1366, 900),
        }
    }

    fn launch(&self, request: &FetchRequest) -> Result<Browser> {
        info!("Launching headless Chrome...");

        let user_agent = format!("--user-agent={}", request.user_agent);
        let resolver_rules = format!("--host-resolver-rules={}", host_resolver_rules());
        let args: Vec<&OsStr> = vec![
            OsStr::new("--disable-dev-shm-usage"),
            OsStr::new("--disable-gpu"),
            OsStr::new("--blink-settings=imagesEnabled=false"),
            OsStr::new("--disable-blink-features=AutomationControlled"),
            OsStr::new(&user_agent),
            OsStr::new(&resolver_rules),
        ];

        let options = LaunchOptions::default_builder()
            .headless(true)
            .sandbox(false)
            .window_size(Some(self.window_size))
            .idle_browser_timeout(request.timeout)
            .args(args)
            .build()
            .context("Failed to build launch options")?;

        Browser::new(options).context("Failed to launch Chrome browser")
    }

    /// Blocking render; runs on a blocking thread.
    fn render(&self, request: &FetchRequest) -> Result<String> {
        let started = Instant::now();
        let browser = self.launch(request)?;
        let tab = browser.new_tab().context("Failed to open browser tab")?;
        tab.set_default_timeout(request.timeout);

        info!(url = %request.url, wait = %request.render_wait, "Opening search page...");
        tab.navigate_to(&request.url)
            .with_context(|| format!("Failed to navigate to {}", request.url))?;

        match request.render_wait {
            RenderWait::DomReady => {
                tab.wait_until_navigated()
                    .context("Page never signalled it was loaded")?;
            }
            RenderWait::Fixed(delay) => {
                debug!("Waiting {}s for client-side rendering", delay.as_secs());
                thread::sleep(delay);
            }
        }

        let html = tab.get_content().context("Failed to get page content")?;
        if let Err(e) = tab.close_target() {
            debug!("Failed to close browser tab: {}", e);
        }

        debug!(
            "Downloaded {} bytes of HTML in {}ms",
            html.len(),
            started.elapsed().as_millis()
        );

        Ok(html_to_markdown(&html))
    }
}

impl Default for BrowserFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PageFetcher for BrowserFetcher {
    async fn fetch(&self, request: &FetchRequest) -> String {
        let fetcher = self.clone();
        let owned = request.clone();
        let task = tokio::task::spawn_blocking(move || fetcher.render(&owned));

        // The blocking thread can outlive this timeout; its browser is dropped
        // (and Chrome killed) once it returns.
        let bound = request.timeout + Duration::from_secs(5);
        match tokio::time::timeout(bound, task).await {
            Ok(Ok(Ok(markdown))) => {
                info!("Fetched {} characters of markdown", markdown.chars().count());
                markdown
            }
            Ok(Ok(Err(e))) => {
                warn!(url = %request.url, "Fetch failed: {:#}", e);
                String::new()
            }
            Ok(Err(e)) => {
                warn!(url = %request.url, "Fetch task aborted: {}", e);
                String::new()
            }
            Err(_) => {
                warn!(url = %request.url, "Fetch timed out after {}s", bound.as_secs());
                String::new()
            }
        }
    }

    fn name(&self) -> &'static str {
        "headless-chrome"
    }
}

fn host_resolver_rules() -> String {
    BLOCKED_HOSTS
        .iter()
        .map(|host| format!("MAP {} ~NOTFOUND", host))
        .collect::<Vec<_>>()
        .join(", ")
}
