#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! `pulse`: scores identity-update activity for location-level anomalies
//! and sector governance risk.
//!
//! Uses `indicatif-log-bridge` (via [`pulse_cli_utils::init_logger`]) to
//! route `log` output through `indicatif::MultiProgress` so that log lines
//! and progress bars never fight for the terminal.

mod pipeline;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use pulse_analytics_models::PipelineConfig;

#[derive(Parser)]
#[command(
    name = "pulse",
    about = "Spatial and temporal anomaly scoring for identity-update counters"
)]
struct Cli {
    /// Log more detail (overridden by `RUST_LOG`)
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline and write every artifact
    Run {
        /// Enrolment counter CSV file or directory of CSV files
        #[arg(long)]
        enrolment: PathBuf,
        /// Demographic update CSV file or directory of CSV files
        #[arg(long)]
        demographic: PathBuf,
        /// Biometric update CSV file or directory of CSV files
        #[arg(long)]
        biometric: PathBuf,
        /// Location coordinate catalog CSV
        #[arg(long)]
        coordinates: PathBuf,
        /// Directory to write artifacts into (created if missing)
        #[arg(long)]
        output: PathBuf,
        /// TOML file overriding thresholds and weights
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Build the neighbor graph for a coordinate catalog and export it
    Neighbors {
        /// Location coordinate catalog CSV
        #[arg(long)]
        coordinates: PathBuf,
        /// CSV file to write
        #[arg(long)]
        output: PathBuf,
        /// Neighbors per location
        #[arg(long, default_value_t = pulse_spatial::DEFAULT_NEIGHBOR_COUNT)]
        k: usize,
    },
    /// Print the default configuration as TOML
    Config,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let default_level = if cli.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    let multi = pulse_cli_utils::init_logger(default_level);

    match cli.command {
        Commands::Run {
            enrolment,
            demographic,
            biometric,
            coordinates,
            output,
            config,
        } => {
            let config = pipeline::load_config(config.as_deref())?;
            pipeline::run(
                &multi,
                pipeline::Inputs {
                    enrolment,
                    demographic,
                    biometric,
                    coordinates,
                },
                &output,
                config,
            )
            .await?;
        }
        Commands::Neighbors {
            coordinates,
            output,
            k,
        } => {
            pipeline::export_neighbors(coordinates, output, k).await?;
        }
        Commands::Config => {
            print!("{}", PipelineConfig::default().to_toml_string()?);
        }
    }

    Ok(())
}
