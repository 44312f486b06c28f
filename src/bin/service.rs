use clap::Parser;
use network_service::{
    NetworkState,
    config::{Config, read_config_file},
    ingest::IngestHandle,
    registry::RegistryEvent,
    storage,
    topology::TopologyEvent,
};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, error, info, instrument, level_filters::LevelFilter, trace, warn};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Parser)]
struct Args {
    /// Config file (defaults are used when omitted)
    #[arg(short)]
    file: Option<String>,

    /// Verbose logging (trace level)
    #[arg(short, long)]
    verbose: bool,
}

fn init(verbose: bool) {
    let level = if verbose {
        LevelFilter::TRACE
    } else {
        LevelFilter::DEBUG
    };
    let filter = filter::Targets::new().with_targets(vec![
        ("network_service", level),
        ("service", level),
    ]);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .compact()
                .with_ansi(false),
        )
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    let args = Args::parse();
    init(args.verbose);
    trace!("started with args: {args:?}");

    let config = match &args.file {
        Some(file) => read_config_file(file)?,
        None => Config::default(),
    }
    .with_env_overrides();

    let store = storage::open(&config.storage);
    let state = NetworkState::new(config.slots, config.expected_range, store.clone());

    tokio::spawn(log_registry_events(state.subscribe_registry()));
    tokio::spawn(log_topology_events(state.subscribe_topology()));

    seed_entities(&state, &config).await;

    let ingest = IngestHandle::spawn(config.listen.socket_addr(), state.clone()).await?;

    tokio::signal::ctrl_c().await?;
    info!("shutting down");

    if let Some(stats) = ingest.stats().await {
        info!("ingest statistics: {}", serde_json::to_string(&stats)?);
    }
    ingest.shutdown().await;

    if let Err(e) = store.close().await {
        error!("failed to close measurement log: {e}");
    }

    Ok(())
}

async fn seed_entities(state: &NetworkState, config: &Config) {
    let Some(entities) = &config.entities else {
        return;
    };

    for new in entities {
        match state.create_entity(new.clone()).await {
            Ok(entity) => debug!("registered {} ({}) with id {}", entity.name, entity.address, entity.id),
            Err(e) => warn!("skipping configured server {:?}: {e}", new.name),
        }
    }
}

#[instrument(skip_all)]
async fn log_registry_events(mut rx: broadcast::Receiver<RegistryEvent>) {
    loop {
        match rx.recv().await {
            Ok(event) => match serde_json::to_string(&event) {
                Ok(json) => trace!("{json}"),
                Err(e) => error!("failed to serialize registry event: {e}"),
            },
            Err(RecvError::Lagged(skipped)) => warn!("registry event log lagged by {skipped} events"),
            Err(RecvError::Closed) => break,
        }
    }
}

#[instrument(skip_all)]
async fn log_topology_events(mut rx: broadcast::Receiver<TopologyEvent>) {
    loop {
        match rx.recv().await {
            Ok(event) => match serde_json::to_string(&event) {
                Ok(json) => debug!("{json}"),
                Err(e) => error!("failed to serialize topology event: {e}"),
            },
            Err(RecvError::Lagged(skipped)) => warn!("topology event log lagged by {skipped} events"),
            Err(RecvError::Closed) => break,
        }
    }
}
