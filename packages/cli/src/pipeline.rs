//! Orchestrates a full scoring run from the command line.
//!
//! Chains load -> score -> write with one `indicatif` bar per step plus an
//! overall step bar. Blocking file work runs on `spawn_blocking` so the
//! runtime stays free to drive the scoring stages.

use std::path::{Path, PathBuf};
use std::time::Instant;

use pulse_analytics::{GovernancePipeline, StageProgress};
use pulse_analytics_models::PipelineConfig;
use pulse_cli_utils::{IndicatifProgress, MultiProgress};
use pulse_ingest::CounterFeeds;
use pulse_spatial::GeoNeighborIndex;

const TOTAL_STEPS: u64 = 3;

/// Input locations for a run.
pub struct Inputs {
    pub enrolment: PathBuf,
    pub demographic: PathBuf,
    pub biometric: PathBuf,
    pub coordinates: PathBuf,
}

/// Reads the configuration file, or returns defaults when none is given.
///
/// # Errors
///
/// Returns an error if the file cannot be read or is not valid TOML.
pub fn load_config(path: Option<&Path>) -> Result<PipelineConfig, Box<dyn std::error::Error>> {
    let Some(path) = path else {
        return Ok(PipelineConfig::default());
    };

    let text = std::fs::read_to_string(path)?;
    let config = PipelineConfig::from_toml_str(&text)?;
    log::info!("Loaded configuration from {}", path.display());

    let weights = config.sector.composite_weights.total();
    if (weights - 1.0).abs() > 1e-9 {
        log::warn!("Sector composite weights sum to {weights:.3}, not 1.0");
    }

    Ok(config)
}

/// Runs the full pipeline and writes every artifact into `output`.
///
/// # Errors
///
/// Returns an error if an input cannot be loaded, the run has nothing to
/// score, or an artifact cannot be written.
pub async fn run(
    multi: &MultiProgress,
    inputs: Inputs,
    output: &Path,
    config: PipelineConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let start = Instant::now();
    let steps = IndicatifProgress::steps_bar(multi, "Pipeline", TOTAL_STEPS);

    // --- Load ---
    steps.set_message("[1/3] Loading inputs".to_string());
    let (feeds, catalog) = tokio::task::spawn_blocking(move || {
        let feeds = CounterFeeds::load(&inputs.enrolment, &inputs.demographic, &inputs.biometric)?;
        let catalog = pulse_ingest::load_coordinates(&inputs.coordinates)?;
        Ok::<_, pulse_ingest::IngestError>((feeds, catalog))
    })
    .await??;
    log::info!(
        "Loaded {} enrolment, {} demographic, {} biometric rows and {} coordinates",
        feeds.enrolment.len(),
        feeds.demographic.len(),
        feeds.biometric.len(),
        catalog.len()
    );
    steps.inc(1);

    // --- Score ---
    steps.set_message("[2/3] Scoring".to_string());
    let progress = StageProgress {
        spatial: IndicatifProgress::stage_bar(multi, "Spatial scoring"),
        temporal: IndicatifProgress::stage_bar(multi, "Temporal scoring"),
    };
    let pipeline = GovernancePipeline::new(config.clone(), feeds, catalog);
    let result = pipeline.run(&progress).await?;
    log_skips(&result.skips);
    steps.inc(1);

    // --- Write ---
    steps.set_message("[3/3] Writing artifacts".to_string());
    let files_bar = IndicatifProgress::files_bar(multi, "Writing artifacts");
    let dir = output.to_path_buf();
    let written = tokio::task::spawn_blocking(move || {
        pulse_generate::write_artifacts(&result, &config, &dir, files_bar.as_ref())
    })
    .await??;
    steps.inc(1);

    steps.finish(format!(
        "Wrote {} files to {} in {:.1}s",
        written.len(),
        output.display(),
        start.elapsed().as_secs_f64()
    ));

    Ok(())
}

/// Builds the neighbor graph for a catalog and writes it as CSV.
///
/// # Errors
///
/// Returns an error if the catalog cannot be loaded or the file cannot be
/// written.
pub async fn export_neighbors(
    coordinates: PathBuf,
    output: PathBuf,
    k: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    let start = Instant::now();

    let index = tokio::task::spawn_blocking(move || {
        let catalog = pulse_ingest::load_coordinates(&coordinates)?;
        let stats = catalog.stats();
        if stats.invalid_coordinates > 0 || stats.duplicates > 0 {
            log::warn!(
                "Skipped {} invalid and {} duplicate coordinate rows",
                stats.invalid_coordinates,
                stats.duplicates
            );
        }
        Ok::<_, pulse_ingest::IngestError>(GeoNeighborIndex::build(&catalog, k))
    })
    .await??;

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let path = pulse_generate::write_neighbors_csv(&index, &output)?;

    log::info!(
        "Wrote neighbors for {} locations to {} in {:.1}s",
        index.len(),
        path.display(),
        start.elapsed().as_secs_f64()
    );

    Ok(())
}

fn log_skips(skips: &pulse_ingest::SkipCounts) {
    if skips.malformed_rows > 0 {
        log::warn!("Skipped {} malformed counter rows", skips.malformed_rows);
    }
    if skips.unparsable_dates > 0 {
        log::warn!("Skipped {} records with unparsable dates", skips.unparsable_dates);
    }
    if skips.missing_coordinates > 0 {
        log::warn!(
            "Skipped {} records without catalog coordinates",
            skips.missing_coordinates
        );
    }
    if skips.invalid_coordinates > 0 || skips.duplicate_coordinates > 0 {
        log::warn!(
            "Ignored {} invalid and {} duplicate coordinate rows",
            skips.invalid_coordinates,
            skips.duplicate_coordinates
        );
    }
}
