//! CLI binary for crimescrape batch lookups.

use std::path::PathBuf;

use clap::Parser;
use crimescrape::config::{AppConfig, Overrides};
use crimescrape::search::{CrimeScrape, sources};

/// crimescrape: look a person up across public watch lists.
#[derive(Parser)]
#[command(name = "crimescrape", version, about)]
struct Cli {
    /// Path to TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// JSON file containing the query (`{"fname": ..., "lname": ...}`).
    #[arg(short, long, value_name = "FILE")]
    query: PathBuf,

    /// Where to write the results. Removed first; only written on a match.
    #[arg(short, long, value_name = "FILE")]
    results: PathBuf,

    /// Run browser-backed modules without a visible window.
    #[arg(long, conflicts_with = "headed")]
    headless: bool,

    /// Show the browser window.
    #[arg(long)]
    headed: bool,

    /// Maximum number of modules running at once.
    #[arg(long)]
    threads: Option<usize>,

    /// Disable the result cache.
    #[arg(long)]
    nocache: bool,

    /// Overall deadline for one lookup, in seconds.
    #[arg(long)]
    timeout: Option<u64>,

    /// Log file, truncated at start.
    #[arg(short, long, value_name = "FILE")]
    logs: Option<PathBuf>,
}

impl Cli {
    fn overrides(&self) -> Overrides {
        let headless = match (self.headless, self.headed) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        };
        Overrides {
            headless,
            threads: self.threads,
            nocache: self.nocache,
            timeout: self.timeout,
            log_file: self.logs.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load(cli.config.as_deref())?;
    config.apply(&cli.overrides());
    let _log_guard = crimescrape::logging::init(&config.logging)?;

    let search = config.resolved_search()?;
    let registry = sources::default_registry(&search)?;
    let service = CrimeScrape::new(registry, &search)?;
    tracing::info!(
        modules = ?service.orchestrator().registry().names(),
        "crimescrape v{}",
        env!("CARGO_PKG_VERSION")
    );

    match crimescrape::run_standalone(&service, &cli.query, &cli.results).await? {
        Some(path) => println!("{}", path.display()),
        None => println!("No results found."),
    }
    Ok(())
}
