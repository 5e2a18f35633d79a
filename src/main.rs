//! `gateway-request` - submit reading-room requests and drain the outbox.

use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use gateway_request::{
    AppConfig, CommandHandler, DispatcherThread, JsonFileStore, LogPublisher, OutboxDispatcher,
    OutboxStore, RequestQueries, SubmitEnvelope,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "gateway-request")]
#[command(about = "Reading-room request submission with outbox delivery")]
struct Cli {
    /// Store file (overrides GATEWAY_STORE_PATH)
    #[arg(long)]
    store: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit a JSON array of `{"message": {...}}` envelopes and publish them
    Submit {
        file: PathBuf,
        /// Seconds to wait for the outbox to drain
        #[arg(long, default_value_t = 30)]
        drain_timeout: u64,
    },

    /// Print a stored request as JSON
    Show { identifier: String },

    /// Publish whatever is still undelivered, then exit
    Drain {
        #[arg(long, default_value_t = 30)]
        drain_timeout: u64,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,gateway_request=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let mut config = AppConfig::from_env().context("Failed to load configuration")?;
    if let Some(store) = cli.store {
        config.store_path = store;
    }

    let store = JsonFileStore::open(&config.store_path)
        .with_context(|| format!("Failed to open store {}", config.store_path.display()))?;
    tracing::info!(path = %store.path().display(), "store opened");

    match cli.command {
        Commands::Submit {
            file,
            drain_timeout,
        } => {
            let raw = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let envelopes: Vec<SubmitEnvelope> =
                serde_json::from_str(&raw).context("Failed to parse submission envelopes")?;

            let worker = DispatcherThread::spawn(
                OutboxDispatcher::from_config(store.clone(), LogPublisher::new(), &config.dispatcher),
                &config.dispatcher,
            );
            let handler = CommandHandler::new(store.clone()).with_signal(worker.signal());

            let mut rejected = 0;
            for envelope in envelopes {
                match handler.submit(envelope.message) {
                    Ok(identifier) => println!("{identifier}"),
                    Err(err) => {
                        rejected += 1;
                        eprintln!("rejected: {err}");
                    }
                }
            }

            let drained = wait_for_drain(&store, Duration::from_secs(drain_timeout));
            let stats = worker.stop();
            tracing::info!(
                delivered = stats.delivered,
                failed = stats.failed,
                rejected,
                "submission run finished"
            );
            drained?;
        }
        Commands::Show { identifier } => {
            let view = RequestQueries::new(store)
                .get_request(&identifier)
                .with_context(|| format!("Failed to load request {identifier}"))?;
            println!("{}", serde_json::to_string_pretty(&view)?);
        }
        Commands::Drain { drain_timeout } => {
            let worker = DispatcherThread::spawn(
                OutboxDispatcher::from_config(store.clone(), LogPublisher::new(), &config.dispatcher),
                &config.dispatcher,
            );
            let drained = wait_for_drain(&store, Duration::from_secs(drain_timeout));
            let stats = worker.stop();
            tracing::info!(delivered = stats.delivered, failed = stats.failed, "drain finished");
            drained?;
        }
    }

    Ok(())
}

fn wait_for_drain(store: &JsonFileStore, timeout: Duration) -> Result<()> {
    let started = Instant::now();
    loop {
        let remaining = store
            .undelivered_count()
            .context("Failed to read outbox")?;
        if remaining == 0 {
            return Ok(());
        }
        if started.elapsed() >= timeout {
            bail!("{remaining} outbox entries still undelivered after {timeout:?}");
        }
        thread::sleep(Duration::from_millis(50));
    }
}
