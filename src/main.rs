//! Run example:
//!
//! cargo mpirun --np 2 --bin spectral-hit --release -- run.toml
//!
//! Log level defaults to `info`, `RUST_LOG` takes precedence
//! over `--log-level`.
use clap::Parser;
use spectral_hit::comm::Comm;
use spectral_hit::config::RunConfig;
use spectral_hit::integrate;
use spectral_hit::navier_stokes::Navier3D;
use spectral_hit::Result;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Distributed pseudo-spectral solver for homogeneous isotropic turbulence
#[derive(Parser, Debug)]
#[command(name = "spectral-hit", version, about)]
struct Args {
    /// Run configuration (toml)
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn setup_logging(level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn run<C: Comm>(comm: C, path: &Path) -> Result<()> {
    let config = RunConfig::from_file(path)?;
    let (max_time, stats_every) = (config.time, config.stats_every);
    let mut navier = Navier3D::new(comm, config)?;

    let start = Instant::now();
    let steps = integrate(&mut navier, max_time, Some(stats_every))?;
    if navier.nrank() == 0 {
        tracing::info!(
            "{} steps in {:.2?} ({:.2?} per step)",
            steps,
            start.elapsed(),
            start.elapsed() / u32::try_from(steps.max(1)).unwrap_or(u32::MAX)
        );
    }
    navier.write_checkpoint()
}

fn main() {
    let args = Args::parse();
    setup_logging(&args.log_level);

    #[cfg(feature = "mpi")]
    let universe = match spectral_hit::mpi::initialize() {
        Ok(universe) => universe,
        Err(e) => {
            tracing::error!("{}", e);
            std::process::exit(1);
        }
    };
    #[cfg(feature = "mpi")]
    let comm = || spectral_hit::mpi::MpiComm::new(&universe);
    #[cfg(not(feature = "mpi"))]
    let comm = || spectral_hit::comm::SerialComm;

    let rank = comm().rank();
    if let Err(e) = run(comm(), &args.config) {
        tracing::error!("rank {}: {}", rank, e);
        comm().abort(1);
    }
}
