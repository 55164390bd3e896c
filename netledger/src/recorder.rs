use crate::error::Result;
use crate::ledger::UsageLedger;
use crate::sampler::{CounterSource, UsageSampler};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Sample the counters and store today's totals. Same work as `/update`.
pub async fn record_once<S: CounterSource>(
    sampler: &UsageSampler<S>,
    ledger: &UsageLedger,
) -> Result<()> {
    let sample = sampler.sample()?;
    ledger.record_usage(sample.sent, sample.received).await?;
    debug!(
        sent = sample.sent,
        received = sample.received,
        "Periodic usage recorded"
    );
    Ok(())
}

/// Record usage every `interval` until the task is dropped. Failures are
/// logged and the next tick tries again with fresh counters.
pub async fn run_periodic<S: CounterSource>(
    sampler: Arc<UsageSampler<S>>,
    ledger: Arc<UsageLedger>,
    interval: Duration,
) {
    info!("Recording usage every {:?}", interval);

    let mut ticker = time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        if let Err(e) = record_once(&sampler, &ledger).await {
            warn!("Periodic usage recording failed: {}", e);
        }
    }
}
