#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Persists the results of a governance scoring run.
//!
//! Writes the governance table and its filtered views, the per-location
//! summary, per-sector priority lists, the neighbor graph, and a run
//! metadata file into one output directory. Each file is written to a
//! `.tmp` sibling first and renamed into place, so an interrupted run
//! never leaves a half-written artifact under the final name.
//!
//! Output is a pure function of the run: reruns over unchanged input
//! produce byte-identical files.

pub mod metadata;
pub mod rows;

use std::path::{Path, PathBuf};

use pulse_analytics::PipelineOutput;
use pulse_analytics_models::{LocationSummary, PipelineConfig, Sector};
use pulse_ingest::progress::ProgressCallback;
use pulse_spatial::GeoNeighborIndex;
use serde::Serialize;

use crate::metadata::RunMetadata;
use crate::rows::{GovernanceTableRow, LocationSummaryRow, PriorityRow, neighbor_rows};

/// Every scored (date, location) row.
pub const GOVERNANCE_TABLE_FILE: &str = "governance_table.csv";

/// Rows with a non-zero risk score.
pub const HIGH_RISK_FILE: &str = "high_risk_rows.csv";

/// Rows whose governance score exceeds the alert threshold.
pub const ALERTS_FILE: &str = "governance_alerts.csv";

/// One row per location.
pub const LOCATION_SUMMARY_FILE: &str = "location_summary.csv";

/// Neighbor graph edges.
pub const NEIGHBORS_FILE: &str = "neighbors.csv";

/// Run summary.
pub const METADATA_FILE: &str = "metadata.json";

/// Errors that can occur while writing artifacts.
#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    /// Filesystem error.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path that caused the error.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// CSV serialization error.
    #[error("CSV error writing {path}: {source}")]
    Csv {
        /// Path being written.
        path: String,
        /// Underlying CSV error.
        source: csv::Error,
    },

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// File name of the priority list for `sector`.
#[must_use]
pub fn priorities_file(sector: Sector) -> String {
    format!("priorities_{sector}.csv")
}

/// Writes every artifact of a run into `dir`, creating it if needed.
///
/// Returns the written paths in write order.
///
/// # Errors
///
/// Returns [`OutputError`] if the directory cannot be created or any file
/// cannot be written.
pub fn write_artifacts(
    output: &PipelineOutput,
    config: &PipelineConfig,
    dir: &Path,
    progress: &dyn ProgressCallback,
) -> Result<Vec<PathBuf>, OutputError> {
    std::fs::create_dir_all(dir).map_err(|e| io_error(dir, e))?;

    let total_files = 6 + Sector::ALL.len();
    progress.set_total(total_files as u64);
    let mut written = Vec::with_capacity(total_files);

    let mut step = |path: PathBuf, label: &str| {
        progress.set_message(format!("Wrote {label}"));
        progress.inc(1);
        written.push(path);
    };

    step(
        write_csv(
            &dir.join(GOVERNANCE_TABLE_FILE),
            output.rows.iter().map(GovernanceTableRow::from),
        )?,
        GOVERNANCE_TABLE_FILE,
    );

    step(
        write_csv(
            &dir.join(HIGH_RISK_FILE),
            output
                .rows
                .iter()
                .filter(|r| r.risk.risk_score > 0.0)
                .map(GovernanceTableRow::from),
        )?,
        HIGH_RISK_FILE,
    );

    let threshold = config.output.alert_threshold;
    step(
        write_csv(
            &dir.join(ALERTS_FILE),
            output
                .rows
                .iter()
                .filter(|r| r.sector.governance_risk_score > threshold)
                .map(GovernanceTableRow::from),
        )?,
        ALERTS_FILE,
    );

    step(
        write_csv(
            &dir.join(LOCATION_SUMMARY_FILE),
            output.summaries.iter().map(LocationSummaryRow::from),
        )?,
        LOCATION_SUMMARY_FILE,
    );

    for sector in Sector::ALL {
        let name = priorities_file(sector);
        let ranked = sector_priorities(&output.summaries, sector, config.output.priority_limit);
        step(
            write_csv(
                &dir.join(&name),
                ranked
                    .into_iter()
                    .enumerate()
                    .map(|(i, summary)| PriorityRow::new(i + 1, sector, summary)),
            )?,
            &name,
        );
    }

    step(
        write_neighbors_csv(&output.neighbors, &dir.join(NEIGHBORS_FILE))?,
        NEIGHBORS_FILE,
    );

    step(
        write_json(&dir.join(METADATA_FILE), &RunMetadata::new(output, config))?,
        METADATA_FILE,
    );

    progress.finish(format!("Wrote {} files to {}", written.len(), dir.display()));
    log::info!("Wrote {} artifacts to {}", written.len(), dir.display());

    Ok(written)
}

/// The `limit` locations with the highest mean index for `sector`, ties
/// broken by location code.
#[must_use]
pub fn sector_priorities(
    summaries: &[LocationSummary],
    sector: Sector,
    limit: usize,
) -> Vec<&LocationSummary> {
    let mut ranked: Vec<&LocationSummary> = summaries.iter().collect();
    ranked.sort_by(|a, b| {
        b.mean_indices
            .get(sector)
            .total_cmp(&a.mean_indices.get(sector))
            .then_with(|| a.location_code.cmp(&b.location_code))
    });
    ranked.truncate(limit);
    ranked
}

/// Writes the neighbor graph as `location_code, rank, neighbor_code,
/// distance_km` rows, locations in code order.
///
/// # Errors
///
/// Returns [`OutputError`] if the file cannot be written.
pub fn write_neighbors_csv(index: &GeoNeighborIndex, path: &Path) -> Result<PathBuf, OutputError> {
    write_csv(path, index.iter().flat_map(neighbor_rows))
}

fn write_csv<T: Serialize>(
    path: &Path,
    rows: impl IntoIterator<Item = T>,
) -> Result<PathBuf, OutputError> {
    let tmp_path = tmp_path(path);
    let csv_error = |source| OutputError::Csv {
        path: path.display().to_string(),
        source,
    };

    let mut writer = csv::Writer::from_path(&tmp_path).map_err(csv_error)?;
    let mut count = 0_u64;
    for row in rows {
        writer.serialize(row).map_err(csv_error)?;
        count += 1;
    }
    writer.flush().map_err(|e| io_error(path, e))?;
    drop(writer);

    std::fs::rename(&tmp_path, path).map_err(|e| io_error(path, e))?;
    log::debug!("Wrote {count} rows to {}", path.display());

    Ok(path.to_path_buf())
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<PathBuf, OutputError> {
    let tmp_path = tmp_path(path);
    let mut contents = serde_json::to_string_pretty(value)?;
    contents.push('\n');

    std::fs::write(&tmp_path, contents).map_err(|e| io_error(path, e))?;
    std::fs::rename(&tmp_path, path).map_err(|e| io_error(path, e))?;

    Ok(path.to_path_buf())
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

fn io_error(path: &Path, source: std::io::Error) -> OutputError {
    OutputError::Io {
        path: path.display().to_string(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulse_analytics::{GovernancePipeline, StageProgress};
    use pulse_ingest::CounterFeeds;
    use pulse_ingest::progress::NullProgress;
    use pulse_ingest::streams::CounterTable;
    use pulse_records_models::{
        BiometricCounts, Coordinate, CounterKey, DemographicCounts, EnrolmentCounts,
    };
    use pulse_spatial::GeoCoordinateCatalog;

    const CODES: [&str; 4] = ["700001", "700002", "700003", "700004"];

    fn key(day: u32, code: &str) -> CounterKey {
        CounterKey {
            date: format!("{day:02}-01-2026"),
            state: "West Bengal".to_string(),
            district: "Kolkata".to_string(),
            location_code: code.to_string(),
        }
    }

    fn run() -> (PipelineOutput, PipelineConfig) {
        let mut enrolment = Vec::new();
        let mut demographic = Vec::new();
        let mut biometric = Vec::new();
        for day in 1..=5 {
            for (i, code) in CODES.iter().enumerate() {
                let boost = if day == 5 && i == 0 { 900 } else { 0 };
                enrolment.push((
                    key(day, code),
                    EnrolmentCounts {
                        age_0_5: 2,
                        age_5_17: 3,
                        age_18_plus: 5 + boost,
                    },
                ));
                demographic.push((
                    key(day, code),
                    DemographicCounts {
                        age_5_17: 1,
                        age_17_plus: 40 + boost,
                    },
                ));
                biometric.push((
                    key(day, code),
                    BiometricCounts {
                        age_5_17: 2,
                        age_17_plus: 10,
                    },
                ));
            }
        }

        let catalog = GeoCoordinateCatalog::from_coordinates(CODES.iter().enumerate().map(
            |(i, code)| {
                #[allow(clippy::cast_precision_loss)]
                let offset = i as f64 * 0.02;
                Coordinate {
                    location_code: (*code).to_string(),
                    latitude: 22.57 + offset,
                    longitude: 88.36 - offset,
                    district: None,
                    state: None,
                }
            },
        ));
        let feeds = CounterFeeds {
            enrolment: CounterTable::from_rows(enrolment),
            demographic: CounterTable::from_rows(demographic),
            biometric: CounterTable::from_rows(biometric),
        };

        let config = PipelineConfig::default();
        let output = GovernancePipeline::new(config.clone(), feeds, catalog)
            .run_sync(&StageProgress::default())
            .unwrap();
        (output, config)
    }

    fn read_dir_contents(dir: &Path) -> Vec<(String, String)> {
        let mut files: Vec<_> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect();
        files.sort();
        files
            .into_iter()
            .map(|p| {
                (
                    p.file_name().unwrap().to_string_lossy().to_string(),
                    std::fs::read_to_string(&p).unwrap(),
                )
            })
            .collect()
    }

    #[test]
    fn writes_every_artifact() {
        let dir = std::env::temp_dir().join("pulse_generate_test_all");
        let _ = std::fs::remove_dir_all(&dir);

        let (output, config) = run();
        let written = write_artifacts(&output, &config, &dir, &NullProgress).unwrap();
        assert_eq!(written.len(), 11);

        for name in [
            GOVERNANCE_TABLE_FILE,
            HIGH_RISK_FILE,
            ALERTS_FILE,
            LOCATION_SUMMARY_FILE,
            NEIGHBORS_FILE,
            METADATA_FILE,
            "priorities_education.csv",
            "priorities_labor.csv",
        ] {
            assert!(dir.join(name).exists(), "missing {name}");
        }
        assert!(!dir.join("governance_table.csv.tmp").exists());

        let table = std::fs::read_to_string(dir.join(GOVERNANCE_TABLE_FILE)).unwrap();
        let mut lines = table.lines();
        let header = lines.next().unwrap();
        assert!(header.starts_with("date,state,district,pincode,latitude,longitude"));
        assert!(header.contains("risk_score,risk_category"));
        assert_eq!(lines.count(), CODES.len() * 5);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn governance_table_leads_with_highest_risk() {
        let dir = std::env::temp_dir().join("pulse_generate_test_order");
        let _ = std::fs::remove_dir_all(&dir);

        let (output, config) = run();
        write_artifacts(&output, &config, &dir, &NullProgress).unwrap();

        let mut reader = csv::Reader::from_path(dir.join(HIGH_RISK_FILE)).unwrap();
        let headers = reader.headers().unwrap().clone();
        let code_idx = headers.iter().position(|h| h == "pincode").unwrap();
        let date_idx = headers.iter().position(|h| h == "date").unwrap();
        let first = reader.records().next().unwrap().unwrap();
        assert_eq!(&first[code_idx], CODES[0]);
        assert_eq!(&first[date_idx], "2026-01-05");

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn reruns_are_byte_identical() {
        let first_dir = std::env::temp_dir().join("pulse_generate_test_rerun_a");
        let second_dir = std::env::temp_dir().join("pulse_generate_test_rerun_b");
        let _ = std::fs::remove_dir_all(&first_dir);
        let _ = std::fs::remove_dir_all(&second_dir);

        let (output, config) = run();
        write_artifacts(&output, &config, &first_dir, &NullProgress).unwrap();
        let (output, config) = run();
        write_artifacts(&output, &config, &second_dir, &NullProgress).unwrap();

        assert_eq!(read_dir_contents(&first_dir), read_dir_contents(&second_dir));

        let _ = std::fs::remove_dir_all(&first_dir);
        let _ = std::fs::remove_dir_all(&second_dir);
    }

    #[test]
    fn neighbors_file_lists_ranked_edges() {
        let dir = std::env::temp_dir().join("pulse_generate_test_neighbors");
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();

        let (output, _) = run();
        let path = write_neighbors_csv(&output.neighbors, &dir.join(NEIGHBORS_FILE)).unwrap();
        let contents = std::fs::read_to_string(path).unwrap();
        let mut lines = contents.lines();
        assert_eq!(lines.next(), Some("location_code,rank,neighbor_code,distance_km"));
        // Four locations, three neighbors each.
        assert_eq!(lines.count(), 12);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn priority_files_name_their_sector() {
        let dir = std::env::temp_dir().join("pulse_generate_test_priorities");
        let _ = std::fs::remove_dir_all(&dir);

        let (output, config) = run();
        write_artifacts(&output, &config, &dir, &NullProgress).unwrap();

        let contents = std::fs::read_to_string(dir.join(priorities_file(Sector::Hunger))).unwrap();
        let mut lines = contents.lines();
        assert!(lines.next().unwrap().starts_with("sector,rank,pincode"));
        let first = lines.next().unwrap();
        assert!(first.starts_with("Migrant Hunger Risk,1,"), "got {first}");
        assert_eq!(lines.count(), CODES.len() - 1);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn priorities_break_ties_by_location_code() {
        let (output, _) = run();
        let mut summaries = output.summaries;
        for summary in &mut summaries {
            summary.mean_indices.rural = 10.0;
        }
        summaries[2].mean_indices.rural = 90.0;

        let ranked = sector_priorities(&summaries, Sector::Rural, 3);
        let codes: Vec<_> = ranked.iter().map(|s| s.location_code.as_str()).collect();
        assert_eq!(codes, vec![CODES[2], CODES[0], CODES[1]]);
    }

    #[test]
    fn metadata_counts_every_category() {
        let (output, config) = run();
        let metadata = RunMetadata::new(&output, &config);
        assert_eq!(metadata.risk_categories.len(), 5);
        assert_eq!(metadata.governance_levels.len(), 5);
        assert_eq!(metadata.risk_categories.values().sum::<u64>(), output.stats.scored_rows);
        assert!(metadata.flags.mass_migration >= 1);

        let json = serde_json::to_string(&metadata).unwrap();
        assert!(json.contains("\"No Risk\""));
        assert!(json.contains("\"scoredRows\""));
    }
}
