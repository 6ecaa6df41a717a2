use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use rental_scout::config::{poll_interval, Config};
use rental_scout::extractor::Extractor;
use rental_scout::llm::OpenAiCompatClient;
use rental_scout::notify::{Notifier, TelegramSender};
use rental_scout::scrapers::BrowserFetcher;
use rental_scout::store::JsonSeenStore;
use rental_scout::{Pipeline, Scheduler};
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Watch a rental search page and send new matches to Telegram
#[derive(Parser)]
#[command(author, version, about)]
struct Args {
    /// Run a single cycle and exit with its status
    #[arg(long)]
    once: bool,

    /// Seen-listings file (overrides SEEN_DB_PATH)
    #[arg(long)]
    seen_file: Option<PathBuf>,

    /// Minutes between cycles (overrides POLL_INTERVAL_MINUTES)
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    interval_minutes: Option<u64>,
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rental_scout=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn build_pipeline(config: &Config) -> Result<Pipeline> {
    let model = OpenAiCompatClient::new(&config.llm_token, &config.llm_model, config.llm_timeout)?
        .with_base_url(&config.llm_base_url);
    let sender = TelegramSender::new(
        &config.telegram_token,
        &config.telegram_chat_id,
        config.telegram_timeout,
    )?;

    Ok(Pipeline::new(
        Arc::new(BrowserFetcher::new()),
        Extractor::new(Arc::new(model)).with_limits(config.min_page_chars, config.max_page_chars),
        Notifier::new(Arc::new(sender)),
        Arc::new(JsonSeenStore::new(config.seen_path.clone())),
        config.fetch_request(),
        config.search_query.clone(),
    ))
}

async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = term.recv() => {}
                }
            }
            Err(_) => {
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    init_tracing();

    let args = Args::parse();

    let mut config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    if let Some(path) = args.seen_file {
        config.seen_path = path;
    }
    if let Some(n) = args.interval_minutes {
        config.poll_interval = match poll_interval(n) {
            Ok(interval) => interval,
            Err(e) => {
                error!("Configuration error: {}", e);
                return ExitCode::FAILURE;
            }
        };
    }
    info!("Configuration loaded: {:?}", config);

    let pipeline = match build_pipeline(&config) {
        Ok(pipeline) => Arc::new(pipeline),
        Err(e) => {
            error!("Failed to set up pipeline: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    let mut scheduler = Scheduler::new(pipeline, config.poll_interval)
        .with_failure_alert(config.failure_alert_threshold);

    if args.once {
        return match scheduler.run_once().await {
            Some(_) => ExitCode::SUCCESS,
            None => ExitCode::FAILURE,
        };
    }

    info!("🏠 Rental scout started for: {}", config.search_query);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let runner = tokio::spawn(scheduler.run(shutdown_rx));

    wait_for_signal().await;
    info!("Shutdown signal received, finishing current cycle...");
    let _ = shutdown_tx.send(true);

    if let Err(e) = runner.await {
        error!("Scheduler task failed: {}", e);
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
