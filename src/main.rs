//! TravelSafe CLI
//!
//! Usage:
//!   travelsafe safety                     # data/processed.json
//!   travelsafe analysis                   # results/*.csv + summary
//!   travelsafe guide --country FR "my bag was stolen on the metro"
//!   travelsafe --config travelsafe.toml -v analysis

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;
use travelsafe_core::config::Config;
use travelsafe_core::pipeline;

#[derive(Parser, Debug)]
#[command(
    name = "travelsafe",
    about = "Build per-country travel safety data and the Travel Safety Index"
)]
struct Args {
    /// Run configuration (TOML); defaults are used when omitted
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fuse registry, advisories and presets into the safety JSON
    Safety,
    /// Score every country and write the analysis rows and summary
    Analysis,
    /// Scenario guidance for one country from the safety JSON
    Guide {
        /// ISO alpha-2 code
        #[arg(long)]
        country: String,
        /// What is happening, in your own words
        text: String,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging; RUST_LOG wins over --verbose
    let default_level = if args.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = Config::load_or_default(args.config.as_deref())
        .with_context(|| format!("loading config {:?}", args.config))?;

    match args.command {
        Command::Safety => {
            info!("{}", "=".repeat(60));
            info!("TravelSafe country safety build");
            info!("{}", "=".repeat(60));
            let report = pipeline::run_safety(&config)?;
            info!(
                "Done: {} countries, {} unmatched advisory names",
                report.records.len(),
                report.advisory_unmatched.len()
            );
        }
        Command::Analysis => {
            info!("{}", "=".repeat(60));
            info!("TravelSafe analysis");
            info!("{}", "=".repeat(60));
            let report = pipeline::run_analysis(&config)?;
            let s = &report.summary;
            info!("Total countries:        {}", s.total_countries);
            info!("With homicide data:     {}", s.countries_with_homicide_data);
            info!("With peace index data:  {}", s.countries_with_gpi_data);
            info!("With advisory data:     {}", s.countries_with_advisory_data);
            info!("Regions covered:        {}", s.regions_covered);
        }
        Command::Guide { country, text } => {
            let paragraph = pipeline::guide(&config, &country, &text)
                .with_context(|| format!("guidance for {country}"))?;
            println!("{paragraph}");
        }
    }

    Ok(())
}
