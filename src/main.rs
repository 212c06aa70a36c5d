mod cli;

use std::{
    path::PathBuf,
    process::ExitCode,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use clap::Parser;
use thiserror::Error;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use lumberjack::{
    BuildError, ConfigError, Emitter, EmitterError, EmitterHandle, HarvestError, HarvestStats,
    Harvester, Settings, TunnelError, TunnelProcess, harvester::local_hostname, record_queue,
};

use crate::cli::Cli;

const SUPERVISE_INTERVAL: Duration = Duration::from_millis(200);

/// Anything that stops the shipper.
#[derive(Debug, Error)]
enum ShipperError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Build(#[from] BuildError),
    #[error(transparent)]
    Tunnel(#[from] TunnelError),
    #[error(transparent)]
    Emitter(#[from] EmitterError),
    #[error(transparent)]
    Harvest(#[from] HarvestError),
}

type HarvestThread = (PathBuf, Arc<AtomicBool>, JoinHandle<Result<HarvestStats, HarvestError>>);

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing();
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "lumberjack stopped");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if let Err(err) = tracing_subscriber::fmt().with_env_filter(filter).try_init() {
        eprintln!("failed to install log subscriber: {err}");
    }
}

fn run(cli: &Cli) -> Result<(), ShipperError> {
    let file_settings = match &cli.config {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };
    let settings = file_settings.merge(cli.settings());
    let mut config = settings.emitter_builder().build_config()?;

    // Kept alive until the emitter is done; dropping it stops the relay.
    let _tunnel = match settings.tunnel_builder().build(&config.address)? {
        Some(tunnel_config) => {
            let mut tunnel = TunnelProcess::start(tunnel_config)?;
            config.address = tunnel.wait_ready()?;
            info!(rendezvous = %config.address, "ssl relay ready");
            Some(tunnel)
        }
        None => None,
    };

    let (tx, rx) = record_queue(config.queue_capacity);
    let emitter = EmitterHandle::spawn(Emitter::from_config(&config), rx)?;
    info!(
        store = %config.address,
        list = %config.list_key,
        files = cli.paths.len(),
        "lumberjack starting"
    );

    let host = local_hostname();
    let mut harvesters: Vec<HarvestThread> = Vec::with_capacity(cli.paths.len());
    for path in &cli.paths {
        let harvester = Harvester::new(path, tx.clone())
            .with_host(host.clone())
            .with_fields(settings.fields.clone())
            .follow(!cli.once);
        let stop = harvester.stop_flag();
        harvesters.push((path.clone(), stop, harvester.spawn()?));
    }
    drop(tx);

    supervise(&emitter, &harvesters);
    for (path, _, handle) in harvesters {
        match handle.join() {
            Ok(Ok(stats)) => info!(file = %path.display(), lines = stats.lines, "harvester done"),
            Ok(Err(err)) => warn!(file = %path.display(), error = %err, "harvester failed"),
            Err(_) => warn!(file = %path.display(), "harvester panicked"),
        }
    }
    info!("all harvesters completed");

    let stats = emitter.join()?;
    info!(
        delivered = stats.delivered,
        bytes = stats.bytes,
        reconnects = stats.connects.saturating_sub(1),
        "emitter drained queue"
    );
    Ok(())
}

/// Wait for the harvesters, stopping them early if the emitter exits.
fn supervise(emitter: &EmitterHandle, harvesters: &[HarvestThread]) {
    while !harvesters.iter().all(|(_, _, handle)| handle.is_finished()) {
        if emitter.is_finished() {
            warn!("emitter exited; stopping harvesters");
            for (_, stop, _) in harvesters {
                stop.store(true, Ordering::Release);
            }
            return;
        }
        thread::sleep(SUPERVISE_INTERVAL);
    }
}
