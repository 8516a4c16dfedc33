use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context as _;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use payerline_core::Config;
use payerline_engine::{
    DispatchQueue, Dispatcher, NullExtractor, NullNotifier, PostCallWorkflow, RateLimiter,
    ScheduledCallPoller, WebhookIngestor,
};
use payerline_store::{MemCounters, MemStore, Store};
use payerline_voice::VoiceClient;

/// Payer call orchestrator: dispatch workers, follow-up poller, and webhook
/// ingestion over stdin (one provider event body per line).
#[derive(Parser)]
#[command(name = "payerline", version, about)]
struct Cli {
    /// Path to the TOML config file.
    #[arg(long, default_value = "payerline.toml")]
    config: PathBuf,

    /// Claim ids to queue for dispatch at startup, repeatable.
    #[arg(long = "dispatch", value_name = "CLAIM_ID")]
    dispatch: Vec<i64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    info!("payerline v{}", env!("CARGO_PKG_VERSION"));

    let cli = Cli::parse();
    let config = Config::load(&cli.config)
        .with_context(|| format!("loading config from {}", cli.config.display()))?;

    let store: Arc<dyn Store> = Arc::new(MemStore::new());
    let placer = Arc::new(VoiceClient::new(config.voice.clone())?);
    let limiter = RateLimiter::new(Arc::new(MemCounters::new()), config.rate_limit.clone());
    let dispatcher = Arc::new(Dispatcher::new(store.clone(), placer, limiter));
    let (queue, workers) = DispatchQueue::start(dispatcher, config.dispatch.clone());

    let workflow = Arc::new(PostCallWorkflow::new(
        store.clone(),
        Arc::new(NullExtractor),
        Arc::new(NullNotifier),
        config.notify.clone(),
    ));
    let ingestor = WebhookIngestor::new(store.clone(), workflow);

    let poller =
        ScheduledCallPoller::new(store.clone(), queue.clone(), config.scheduler.clone()).spawn();

    for claim_id in cli.dispatch {
        if !queue.enqueue(claim_id) {
            warn!(claim_id, "dispatch queue closed before startup enqueue");
        }
    }

    // Webhook bodies arrive as JSON lines on stdin until EOF; an HTTP front
    // end would hand bodies to `ingest` the same way.
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => match line? {
                Some(line) if line.trim().is_empty() => {}
                Some(line) => match serde_json::from_str(&line) {
                    Ok(body) => ingestor.ingest(&body).await,
                    Err(err) => warn!(error = %err, "skipping unparseable webhook line"),
                },
                None => break,
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    info!("shutting down");
    poller.abort();
    let _ = poller.await;
    // The poller held the last other queue handle; dropping ours closes the
    // channel and lets the workers drain out.
    drop(queue);
    for worker in workers {
        let _ = worker.await;
    }
    Ok(())
}
