use crate::models::CycleReport;
use crate::notify::emphasize;
use crate::pipeline::Pipeline;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

/// Shortest period the loop will tick at
const MIN_INTERVAL: Duration = Duration::from_secs(60);

/// Runs the pipeline at start-up and then on every tick until shutdown.
pub struct Scheduler {
    pipeline: Arc<Pipeline>,
    interval: Duration,
    alert_threshold: u32,
    failure_streak: u32,
}

impl Scheduler {
    pub fn new(pipeline: Arc<Pipeline>, interval: Duration) -> Self {
        if interval < MIN_INTERVAL {
            warn!(
                "Polling interval of {}s is too short, using {}s",
                interval.as_secs(),
                MIN_INTERVAL.as_secs()
            );
        }
        Self {
            pipeline,
            interval: interval.max(MIN_INTERVAL),
            alert_threshold: 0,
            failure_streak: 0,
        }
    }

    /// Alert through the notification channel after `threshold` failed cycles in a row
    pub fn with_failure_alert(mut self, threshold: u32) -> Self {
        self.alert_threshold = threshold;
        self
    }

    pub fn failure_streak(&self) -> u32 {
        self.failure_streak
    }

    /// Loop until `shutdown` flips to `true` (or its sender goes away).
    ///
    /// A cycle that is already running is allowed to finish first.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            "🚀 Scheduler started, polling every {} minute(s)",
            self.interval.as_secs() / 60
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    self.run_once().await;
                }
            }
        }

        info!("Scheduler stopped");
    }

    /// Run one cycle in its own task so errors and panics stay contained.
    pub async fn run_once(&mut self) -> Option<CycleReport> {
        let pipeline = Arc::clone(&self.pipeline);
        let result = tokio::spawn(async move { pipeline.run_cycle().await }).await;

        let failure = match result {
            Ok(Ok(report)) => {
                info!(
                    outcome = ?report.outcome,
                    "Cycle finished in {}ms",
                    report.duration_ms
                );
                if self.failure_streak > 0 {
                    info!("Recovered after {} failed cycle(s)", self.failure_streak);
                }
                self.failure_streak = 0;
                return Some(report);
            }
            Ok(Err(e)) => format!("{:#}", e),
            Err(e) => format!("cycle task aborted: {}", e),
        };

        error!("❌ Cycle failed: {}", failure);
        self.failure_streak += 1;
        if self.alert_threshold > 0 && self.failure_streak == self.alert_threshold {
            self.send_failure_alert(&failure).await;
        }
        None
    }

    async fn send_failure_alert(&self, last_error: &str) {
        let text = format!(
            "⚠️ *Rental scout is failing*\n\n{} cycles in a row failed (last at {}).\n\n{}",
            self.failure_streak,
            Utc::now().format("%Y-%m-%d %H:%M UTC"),
            emphasize(&format!("Last error: {}", last_error), '_'),
        );

        match self.pipeline.notifier().sender().send(&text).await {
            Ok(()) => warn!("Sent failure alert after {} cycles", self.failure_streak),
            Err(e) => warn!("Could not send failure alert: {}", e),
        }
    }
}
