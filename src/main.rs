//! EcoFleet relay service
//!
//! Wires the two pipeline stages to their collaborators and serves the
//! dashboard/operator API.
//!
//! # Usage
//!
//! ```bash
//! # Run with built-in defaults
//! cargo run --release
//!
//! # Run against a config file
//! cargo run --release -- --config /etc/ecofleet/ecofleet.toml
//!
//! # Drive it with the fleet simulator
//! cargo run --release --bin simulation
//! ```
//!
//! # Environment Variables
//!
//! - `ECOFLEET_CONFIG`: Path to the TOML configuration file
//! - `RUST_LOG`: Logging level (default: info)

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use ecofleet::advisor::{AdvisoryEngine, GenerativeBackend};
use ecofleet::api::{self, ApiState};
use ecofleet::config::EcoFleetConfig;
use ecofleet::feedback::FeedbackDispatcher;
use ecofleet::gateway::{DeviceGateway, HttpGateway, NullGateway};
use ecofleet::hub::TelemetryHub;
use ecofleet::queue::DurableQueue;
use ecofleet::relay::{run_enrichment_worker, EnrichmentStage, IngestStage};
use ecofleet::store::{DocumentStore, SledStore};

#[derive(Parser, Debug)]
#[command(name = "ecofleet")]
#[command(about = "EcoFleet vehicle telemetry relay")]
#[command(version)]
struct CliArgs {
    /// Path to a TOML configuration file
    #[arg(short, long, env = "ECOFLEET_CONFIG")]
    config: Option<PathBuf>,

    /// Override the HTTP bind address (default: "0.0.0.0:8080")
    #[arg(short, long)]
    addr: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = CliArgs::parse();
    let mut config =
        EcoFleetConfig::load(args.config.as_deref()).context("loading configuration")?;
    if let Some(addr) = args.addr {
        config.server.addr = addr;
    }

    // Collaborators are constructed once, up front. Anything optional that is
    // missing is logged here, not discovered mid-message.
    let store: Arc<dyn DocumentStore> = Arc::new(
        SledStore::open(&config.store.path, config.store.partition_key)
            .context("opening record store")?,
    );
    info!(
        path = %config.store.path.display(),
        partition_key = ?config.store.partition_key,
        "Record store ready"
    );

    let hub = TelemetryHub::default();
    let queue =
        Arc::new(DurableQueue::open(&config.queue.dir).context("opening advice queue")?);

    let engine = match &config.advisor.backend_url {
        Some(url) => {
            info!(url = %url, model = %config.advisor.model, "Generative advisory backend enabled");
            AdvisoryEngine::with_backend(
                GenerativeBackend::new(url, &config.advisor.model, config.advisor.timeout_secs)
                    .context("building advisory backend client")?,
            )
        }
        None => {
            info!("No advisory backend configured - using the rule table");
            AdvisoryEngine::rule_based()
        }
    };

    let gateway: Arc<dyn DeviceGateway> = match &config.feedback.gateway_url {
        Some(url) => {
            info!(url = %url, "Device gateway ready");
            Arc::new(
                HttpGateway::new(url, config.feedback.timeout_secs)
                    .context("building device gateway client")?,
            )
        }
        None => {
            warn!("No device gateway configured - downlink feedback disabled");
            Arc::new(NullGateway)
        }
    };
    let dispatcher = FeedbackDispatcher::new(gateway, config.feedback.policy);

    let ingest = Arc::new(IngestStage::new(
        store.clone(),
        Arc::new(hub.clone()),
        queue.clone(),
    ));
    let enrich = Arc::new(EnrichmentStage::new(
        engine,
        store.clone(),
        Arc::new(hub.clone()),
        dispatcher,
    ));

    let cancel = CancellationToken::new();
    let worker = tokio::spawn(run_enrichment_worker(
        queue.clone(),
        enrich,
        cancel.clone(),
    ));

    let state = Arc::new(ApiState::new(store, hub, ingest));
    let app = api::router(state);

    let listener = tokio::net::TcpListener::bind(&config.server.addr)
        .await
        .with_context(|| format!("binding {}", config.server.addr))?;
    info!(addr = %config.server.addr, "EcoFleet relay listening");

    let shutdown = cancel.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
            shutdown.cancel();
        })
        .await
        .context("server error")?;

    cancel.cancel();
    let _ = worker.await;
    info!("EcoFleet relay stopped");
    Ok(())
}
