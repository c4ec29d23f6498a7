#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Loading and merging of identity-update counter feeds.
//!
//! Reads the enrolment, demographic, and biometric CSV feeds plus the
//! location coordinate catalog, outer-joins the feeds with
//! [`merge::UpdateRecordMerger`], and group-sums the result into
//! per-day aggregates with [`daily::aggregate_daily`].
//!
//! Malformed rows are skipped and counted, never fatal.

pub mod daily;
pub mod merge;
pub mod parsing;
pub mod progress;
pub mod streams;

use std::io::Read;
use std::path::{Path, PathBuf};

use pulse_records_models::{BiometricCounts, DemographicCounts, EnrolmentCounts};
use pulse_spatial::{GeoCoordinateCatalog, RawCoordinate};
use serde::{Deserialize, Serialize};

use crate::parsing::normalize_header;
use crate::streams::{Biometric, CounterTable, Demographic, Enrolment, load_counter_path};

/// Column holding the location code in every input file.
pub const LOCATION_COLUMN: &str = "pincode";

/// Errors that can occur while loading inputs.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// CSV parsing error.
    #[error("CSV error in {path}: {source}")]
    Csv {
        /// Path to the CSV file.
        path: String,
        /// Underlying CSV error.
        source: csv::Error,
    },

    /// I/O error reading a directory or file.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path that caused the error.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A required column is absent.
    #[error("{path} has no '{column}' column")]
    MissingColumn {
        /// Path to the CSV file.
        path: String,
        /// Normalized column name.
        column: String,
    },

    /// Input path does not exist.
    #[error("Input path not found: {0}")]
    DirectoryNotFound(String),
}

/// Rows excluded from scoring, by reason.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkipCounts {
    /// Counter rows with an empty key or invalid counter cell.
    pub malformed_rows: u64,
    /// Merged records whose date text failed to parse.
    pub unparsable_dates: u64,
    /// Merged records whose location has no catalog coordinate.
    pub missing_coordinates: u64,
    /// Catalog rows with missing, unparsable, or out-of-range coordinates.
    pub invalid_coordinates: u64,
    /// Catalog rows shadowed by an earlier row for the same code.
    pub duplicate_coordinates: u64,
}

/// The three raw counter feeds, loaded but not yet merged.
#[derive(Debug, Clone, Default)]
pub struct CounterFeeds {
    /// New enrolments.
    pub enrolment: CounterTable<EnrolmentCounts>,
    /// Demographic changes.
    pub demographic: CounterTable<DemographicCounts>,
    /// Biometric updates.
    pub biometric: CounterTable<BiometricCounts>,
}

impl CounterFeeds {
    /// Loads all three feeds from their paths (file or directory each).
    ///
    /// # Errors
    ///
    /// Returns [`IngestError`] if any path is missing or unlistable.
    pub fn load(enrolment: &Path, demographic: &Path, biometric: &Path) -> Result<Self, IngestError> {
        Ok(Self {
            enrolment: load_counter_path::<Enrolment>(enrolment)?,
            demographic: load_counter_path::<Demographic>(demographic)?,
            biometric: load_counter_path::<Biometric>(biometric)?,
        })
    }

    /// Whether every feed is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.enrolment.is_empty() && self.demographic.is_empty() && self.biometric.is_empty()
    }

    /// Malformed rows across all feeds.
    #[must_use]
    pub const fn malformed_rows(&self) -> u64 {
        self.enrolment.malformed_rows
            + self.demographic.malformed_rows
            + self.biometric.malformed_rows
    }
}

/// Loads the coordinate catalog from a CSV file.
///
/// # Errors
///
/// Returns [`IngestError`] if the file cannot be opened, is not valid CSV,
/// or lacks a `pincode`, `latitude`, or `longitude` column.
pub fn load_coordinates(path: &Path) -> Result<GeoCoordinateCatalog, IngestError> {
    if !path.exists() {
        return Err(IngestError::DirectoryNotFound(path.display().to_string()));
    }
    let file = std::fs::File::open(path).map_err(|e| IngestError::Io {
        path: path.display().to_string(),
        source: e,
    })?;

    let rows = read_coordinate_csv(file).map_err(|e| match e {
        streams::ReadError::Csv(source) => IngestError::Csv {
            path: path.display().to_string(),
            source,
        },
        streams::ReadError::MissingColumn(column) => IngestError::MissingColumn {
            path: path.display().to_string(),
            column,
        },
    })?;

    log::info!("Read {} coordinate rows from {}", rows.len(), path.display());
    Ok(GeoCoordinateCatalog::from_raw(rows))
}

/// Reads raw catalog rows. `district` and `statename` are optional
/// columns; any other extra columns are ignored.
///
/// # Errors
///
/// Returns [`streams::ReadError`] on unreadable CSV or a missing required
/// column.
pub fn read_coordinate_csv<R: Read>(reader: R) -> Result<Vec<RawCoordinate>, streams::ReadError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers: Vec<String> = csv_reader
        .headers()?
        .iter()
        .map(normalize_header)
        .collect();
    let position = |name: &str| headers.iter().position(|h| h == name);
    let required = |name: &str| {
        position(name).ok_or_else(|| streams::ReadError::MissingColumn(name.to_string()))
    };

    let code_idx = required(LOCATION_COLUMN)?;
    let lat_idx = required("latitude")?;
    let lng_idx = required("longitude")?;
    let district_idx = position("district");
    let state_idx = position("statename");

    let mut rows = Vec::new();
    for record in csv_reader.records() {
        let record = match record {
            Ok(record) => record,
            Err(e) => {
                log::warn!("Skipping undecodable coordinate row: {e}");
                // An empty code is counted as an invalid catalog row.
                rows.push(RawCoordinate::default());
                continue;
            }
        };
        let text = |i: Option<usize>| i.and_then(|i| record.get(i)).map(str::to_string);
        rows.push(RawCoordinate {
            location_code: record.get(code_idx).unwrap_or("").to_string(),
            latitude: text(Some(lat_idx)),
            longitude: text(Some(lng_idx)),
            district: text(district_idx),
            state: text(state_idx),
        });
    }

    Ok(rows)
}

/// Collects all `.csv` files under `dir` recursively, sorted by path.
///
/// # Errors
///
/// Returns [`IngestError::Io`] if a directory cannot be read.
pub fn collect_csv_files(dir: &Path) -> Result<Vec<PathBuf>, IngestError> {
    let mut files = Vec::new();
    collect_csv_files_recursive(dir, &mut files)?;
    files.sort();
    Ok(files)
}

fn collect_csv_files_recursive(dir: &Path, files: &mut Vec<PathBuf>) -> Result<(), IngestError> {
    let entries = std::fs::read_dir(dir).map_err(|e| IngestError::Io {
        path: dir.display().to_string(),
        source: e,
    })?;

    for entry in entries {
        let entry = entry.map_err(|e| IngestError::Io {
            path: dir.display().to_string(),
            source: e,
        })?;
        let path = entry.path();

        if path.is_dir() {
            collect_csv_files_recursive(&path, files)?;
        } else if path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
        {
            files.push(path);
        }
    }

    Ok(())
}
