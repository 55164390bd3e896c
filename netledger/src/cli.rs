use crate::config::LedgerConfig;
use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "netledger")]
#[command(author, version, about = "Network usage ledger - samples host counters and keeps daily totals", long_about = None)]
pub struct CliArgs {
    /// Path to configuration file (defaults are used if it does not exist)
    #[arg(short, long, default_value = "netledger.toml")]
    pub config: String,

    /// Override HTTP listen address
    #[arg(long, env = "NETLEDGER_LISTEN_ADDR")]
    pub listen_addr: Option<String>,

    /// Override SQLite database path
    #[arg(long, env = "NETLEDGER_DATABASE_PATH")]
    pub database_path: Option<String>,

    /// Override log level (trace, debug, info, warn, error)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Override log directory
    #[arg(long)]
    pub log_dir: Option<String>,

    /// Record usage every N seconds without waiting for /update
    #[arg(long)]
    pub record_interval_secs: Option<u64>,

    /// Override number of runtime worker threads
    #[arg(long)]
    pub runtime_threads: Option<usize>,
}

impl CliArgs {
    /// Apply command line overrides on top of the file configuration.
    pub fn apply(self, config: &mut LedgerConfig) {
        if let Some(listen_addr) = self.listen_addr {
            config.listen_addr = listen_addr;
        }
        if let Some(database_path) = self.database_path {
            config.database_path = database_path;
        }
        if let Some(log_level) = self.log_level {
            config.log_level = log_level;
        }
        if let Some(log_dir) = self.log_dir {
            config.log_dir = Some(log_dir);
        }
        if let Some(secs) = self.record_interval_secs {
            config.record_interval_secs = Some(secs);
        }
        if let Some(threads) = self.runtime_threads {
            config.runtime_threads = Some(threads);
        }
    }
}
