use crate::error::{LedgerError, Result};
use parking_lot::Mutex;
use std::time::{Duration, Instant};
use sysinfo::Networks;
use tracing::{debug, warn};

/// Cumulative byte counters summed across every network interface.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counters {
    pub sent: u64,
    pub received: u64,
}

/// Where cumulative counters come from. Implementations must return an error
/// rather than zeros when the counters cannot be read.
pub trait CounterSource: Send {
    fn read_counters(&mut self) -> Result<Counters>;
}

impl<S: CounterSource + ?Sized> CounterSource for Box<S> {
    fn read_counters(&mut self) -> Result<Counters> {
        (**self).read_counters()
    }
}

/// Sampler over a type-erased source, as shared by the HTTP handlers.
pub type DynSampler = UsageSampler<Box<dyn CounterSource>>;

/// Host counters as reported by the OS through `sysinfo`.
pub struct SystemCounters {
    networks: Networks,
}

impl SystemCounters {
    pub fn new() -> Self {
        Self {
            networks: Networks::new_with_refreshed_list(),
        }
    }
}

impl Default for SystemCounters {
    fn default() -> Self {
        Self::new()
    }
}

impl CounterSource for SystemCounters {
    fn read_counters(&mut self) -> Result<Counters> {
        self.networks.refresh(true);

        let mut interfaces = 0usize;
        let mut counters = Counters::default();
        for (_name, data) in self.networks.iter() {
            interfaces += 1;
            counters.sent = counters.sent.saturating_add(data.total_transmitted());
            counters.received = counters.received.saturating_add(data.total_received());
        }

        if interfaces == 0 {
            return Err(LedgerError::CountersUnavailable(
                "no network interfaces reported by the OS".to_string(),
            ));
        }

        debug!(
            interfaces,
            sent = counters.sent,
            received = counters.received,
            "Read network counters"
        );
        Ok(counters)
    }
}

/// Result of one sampling call.
///
/// `sent` and `received` are the fresh cumulative totals. The rates are in
/// bytes per second over `elapsed`, the time since the previous call.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub sent: u64,
    pub received: u64,
    pub download_rate: f64,
    pub upload_rate: f64,
    pub elapsed: Duration,
    /// A counter went backwards since the previous call; the affected rate
    /// is reported as zero.
    pub counter_reset: bool,
}

struct PreviousSample {
    counters: Counters,
    captured_at: Instant,
}

struct SamplerState<S> {
    source: S,
    previous: PreviousSample,
}

/// Derives throughput from successive counter reads.
///
/// The source and the previous-sample slot live behind one lock. The read,
/// the timestamp, the rate computation and the slot replacement all happen
/// under it, so concurrent callers are fully serialized.
pub struct UsageSampler<S = SystemCounters> {
    state: Mutex<SamplerState<S>>,
}

impl<S: CounterSource> UsageSampler<S> {
    /// Take the baseline sample. Rates are only meaningful from the next call.
    pub fn new(mut source: S) -> Result<Self> {
        let counters = source.read_counters()?;
        Ok(Self::with_baseline(source, counters, Instant::now()))
    }

    pub fn new_at(mut source: S, now: Instant) -> Result<Self> {
        let counters = source.read_counters()?;
        Ok(Self::with_baseline(source, counters, now))
    }

    fn with_baseline(source: S, counters: Counters, captured_at: Instant) -> Self {
        debug!(
            sent = counters.sent,
            received = counters.received,
            "Baseline sample taken"
        );

        Self {
            state: Mutex::new(SamplerState {
                source,
                previous: PreviousSample {
                    counters,
                    captured_at,
                },
            }),
        }
    }

    /// Sample now. The instant is taken after the counters are read, under
    /// the lock.
    pub fn sample(&self) -> Result<Sample> {
        self.sample_with(Instant::now)
    }

    /// Sample against an explicit instant. An instant earlier than the
    /// previous sample is treated as zero elapsed time; the anchor never
    /// moves backwards.
    pub fn sample_at(&self, now: Instant) -> Result<Sample> {
        self.sample_with(|| now)
    }

    /// On a read failure the previous sample is kept, so the next successful
    /// call still has an anchor.
    fn sample_with(&self, clock: impl FnOnce() -> Instant) -> Result<Sample> {
        let mut state = self.state.lock();
        let current = state.source.read_counters()?;

        let previous = &state.previous;
        let captured_at = clock().max(previous.captured_at);
        let elapsed = captured_at.duration_since(previous.captured_at);
        let download_rate = rate(current.received, previous.counters.received, elapsed);
        let upload_rate = rate(current.sent, previous.counters.sent, elapsed);
        let counter_reset = download_rate.is_none() || upload_rate.is_none();

        if counter_reset {
            warn!(
                previous_sent = previous.counters.sent,
                previous_received = previous.counters.received,
                sent = current.sent,
                received = current.received,
                "Network counters went backwards, reporting zero rate"
            );
        }

        state.previous = PreviousSample {
            counters: current,
            captured_at,
        };

        Ok(Sample {
            sent: current.sent,
            received: current.received,
            download_rate: download_rate.unwrap_or(0.0),
            upload_rate: upload_rate.unwrap_or(0.0),
            elapsed,
            counter_reset,
        })
    }
}

/// `None` when the counter regressed.
fn rate(current: u64, previous: u64, elapsed: Duration) -> Option<f64> {
    let delta = current.checked_sub(previous)?;
    let secs = elapsed.as_secs_f64();
    if secs > 0.0 {
        Some(delta as f64 / secs)
    } else {
        Some(0.0)
    }
}
