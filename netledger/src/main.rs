mod api;
mod cli;
mod config;
mod entity;
mod error;
mod ledger;
mod recorder;
mod sampler;

use anyhow::{Context, Result};
use api::ApiServer;
use clap::Parser;
use config::LedgerConfig;
use ledger::UsageLedger;
use mimalloc::MiMalloc;
use sampler::{CounterSource, SystemCounters, UsageSampler};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

fn main() -> Result<()> {
    let args = cli::CliArgs::parse();
    let config_path = args.config.clone();

    let mut cfg = LedgerConfig::load_or_default(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path))?;
    args.apply(&mut cfg);
    cfg.validate()?;

    let _log_guard = common::init_tracing(cfg.log_dir.as_deref(), &cfg.log_file, &cfg.log_level)
        .context("Failed to initialize tracing")?;

    if !Path::new(&config_path).exists() {
        warn!("Config file {} not found, using defaults", config_path);
    }

    let mut builder = tokio::runtime::Builder::new_multi_thread();
    builder.enable_all();
    if let Some(threads) = cfg.runtime_threads {
        builder.worker_threads(threads);
    }
    let runtime = builder.build().context("Failed to build tokio runtime")?;

    runtime.block_on(run(cfg))
}

async fn run(cfg: LedgerConfig) -> Result<()> {
    info!("Starting netledger with configuration: {:?}", cfg);
    let cfg = Arc::new(cfg);

    let ledger = UsageLedger::connect(&cfg.database_path)
        .await
        .with_context(|| format!("Failed to open database {}", cfg.database_path))?;
    let ledger = Arc::new(ledger);

    // Without a baseline no rate can ever be computed.
    let source: Box<dyn CounterSource> = Box::new(SystemCounters::new());
    let sampler = UsageSampler::new(source).context("Failed to take baseline network sample")?;
    let sampler = Arc::new(sampler);

    let recorder = cfg.record_interval_secs.map(|secs| {
        tokio::spawn(recorder::run_periodic(
            sampler.clone(),
            ledger.clone(),
            Duration::from_secs(secs),
        ))
    });

    let api_server = {
        let server = ApiServer::new(cfg.clone(), sampler.clone(), ledger.clone());
        tokio::spawn(server.run())
    };

    info!("Server is running on http://{}", cfg.listen_addr);

    tokio::select! {
        result = api_server => {
            result
                .context("API server task failed")?
                .context("API server error")?;
            warn!("API server stopped");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
    }

    if let Some(recorder) = recorder {
        recorder.abort();
    }

    info!("Shutting down netledger");
    Ok(())
}
