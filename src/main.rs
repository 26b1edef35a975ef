//! Chainbench Runner
//!
//! Generates timestamped samples, chain-validates them in parallel, and
//! repeats the cycle concurrently across cores.
//!
//! Usage:
//!   cargo run --release -- [OPTIONS]
//!
//! Environment:
//!   CHAINBENCH_CYCLES       - Concurrent cycles (default: clamp(cores / 2, 1, 4))
//!   CHAINBENCH_SAMPLES      - Samples per cycle (default: 222222)
//!   CHAINBENCH_START        - First sample timestamp (default: 1990-01-01T01:01:01.001)
//!   CHAINBENCH_INTERVAL_MS  - Sample interval in milliseconds (default: 300000)
//!   CHAINBENCH_LOG_DIR      - Directory for the report log file (default: logs)

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::TimeDelta;
use clap::Parser;
use tracing::{info, warn};

use chainbench::config::{BenchConfig, DEFAULT_SAMPLES_PER_CYCLE};
use chainbench::cycle::CycleRunner;
use chainbench::logging::{init_tracing, FileLogger};
use chainbench::time::parse_timestamp;

#[derive(Parser, Debug)]
#[command(name = "chainbench")]
#[command(about = "Generate and chain-validate timestamped samples across parallel cycles")]
struct Args {
    /// Concurrent cycles to run
    #[arg(long, env = "CHAINBENCH_CYCLES")]
    cycles: Option<usize>,

    /// Samples generated per cycle
    #[arg(long, env = "CHAINBENCH_SAMPLES", default_value_t = DEFAULT_SAMPLES_PER_CYCLE)]
    samples: usize,

    /// Timestamp of the first sample (%Y-%m-%dT%H:%M:%S%.f)
    #[arg(long, env = "CHAINBENCH_START", default_value = "1990-01-01T01:01:01.001")]
    start: String,

    /// Step between samples in milliseconds
    #[arg(long, env = "CHAINBENCH_INTERVAL_MS", default_value = "300000")]
    interval_ms: i64,

    /// Directory for the report log file
    #[arg(long, env = "CHAINBENCH_LOG_DIR", default_value = "logs")]
    log_dir: PathBuf,

    /// Also write the run report as JSON
    #[arg(long)]
    json: Option<PathBuf>,

    /// Break the sample chain in this cycle
    #[arg(long)]
    fault_cycle: Option<usize>,

    /// Sample index to corrupt in --fault-cycle
    #[arg(long, default_value = "1", requires = "fault_cycle")]
    fault_index: usize,

    /// Enable debug output
    #[arg(long, short)]
    verbose: bool,
}

impl Args {
    fn to_config(&self) -> Result<BenchConfig> {
        let start = parse_timestamp(&self.start)
            .with_context(|| format!("invalid --start timestamp: {}", self.start))?;

        let mut config = BenchConfig::default()
            .with_samples(self.samples)
            .with_start(start)
            .with_interval(TimeDelta::milliseconds(self.interval_ms));

        if let Some(cycles) = self.cycles {
            config = config.with_cycles(cycles);
        }
        if let Some(cycle) = self.fault_cycle {
            config = config.with_fault(cycle, self.fault_index);
        }
        Ok(config)
    }
}

fn main() -> Result<()> {
    let _ = dotenv::dotenv();

    let args = Args::parse();
    init_tracing(args.verbose);

    let config = args.to_config()?;
    let logger = Arc::new(FileLogger::open(&args.log_dir)?);
    info!(path = %logger.path().display(), "report log file");

    let report = CycleRunner::new(config, logger.clone()).run();

    if let Some(path) = &args.json {
        match report.write_json(path) {
            Ok(()) => info!(path = %path.display(), "run report written"),
            Err(e) => warn!("{:#}", e),
        }
    }

    if report.failed_count() > 0 {
        warn!(
            failed = report.failed_count(),
            cycles = report.cycles,
            "some cycles failed"
        );
    }

    logger.shutdown();
    Ok(())
}
