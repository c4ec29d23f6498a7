//! Readers for the three raw counter feeds.
//!
//! Each feed is a set of CSV files sharing the key columns `date`, `state`,
//! `district`, `pincode` plus feed-specific age-bucket columns. Rows are
//! folded into a [`CounterTable`] keyed by [`CounterKey`]; a key repeated
//! within one feed has its counters summed.

use std::collections::BTreeMap;
use std::io::Read;
use std::ops::AddAssign;
use std::path::Path;

use pulse_records_models::{BiometricCounts, CounterKey, DemographicCounts, EnrolmentCounts};

use crate::parsing::{normalize_header, parse_count};
use crate::{IngestError, collect_csv_files};

/// Key columns every counter feed must carry.
pub const KEY_COLUMNS: [&str; 4] = ["date", "state", "district", "pincode"];

/// A raw counter feed: its label, columns, and bucket type.
pub trait CounterSource {
    /// Age-bucketed counts for this feed.
    type Counts: Copy + Default + AddAssign + std::fmt::Debug;

    /// Feed name used in log messages.
    const LABEL: &'static str;

    /// Counter column names after header normalization, in bucket order.
    const COLUMNS: &'static [&'static str];

    /// Builds the bucket struct from parsed values in [`Self::COLUMNS`]
    /// order.
    fn from_values(values: &[u64]) -> Self::Counts;
}

/// New-enrolment feed.
pub struct Enrolment;

impl CounterSource for Enrolment {
    type Counts = EnrolmentCounts;
    const LABEL: &'static str = "enrolment";
    const COLUMNS: &'static [&'static str] = &["age_0_5", "age_5_17", "age_18_greater"];

    fn from_values(values: &[u64]) -> Self::Counts {
        EnrolmentCounts {
            age_0_5: values[0],
            age_5_17: values[1],
            age_18_plus: values[2],
        }
    }
}

/// Demographic (address change) feed.
pub struct Demographic;

impl CounterSource for Demographic {
    type Counts = DemographicCounts;
    const LABEL: &'static str = "demographic";
    const COLUMNS: &'static [&'static str] = &["demo_age_5_17", "demo_age_17_"];

    fn from_values(values: &[u64]) -> Self::Counts {
        DemographicCounts {
            age_5_17: values[0],
            age_17_plus: values[1],
        }
    }
}

/// Biometric update feed.
pub struct Biometric;

impl CounterSource for Biometric {
    type Counts = BiometricCounts;
    const LABEL: &'static str = "biometric";
    const COLUMNS: &'static [&'static str] = &["bio_age_5_17", "bio_age_17_"];

    fn from_values(values: &[u64]) -> Self::Counts {
        BiometricCounts {
            age_5_17: values[0],
            age_17_plus: values[1],
        }
    }
}

/// All rows of one counter feed, keyed and summed.
#[derive(Debug, Clone)]
pub struct CounterTable<C> {
    /// Summed counters per key, in key order.
    pub rows: BTreeMap<CounterKey, C>,
    /// Files read successfully.
    pub files: u64,
    /// Data rows read (before key folding).
    pub rows_read: u64,
    /// Rows skipped because a key cell was empty or a counter was invalid.
    pub malformed_rows: u64,
}

impl<C> Default for CounterTable<C> {
    fn default() -> Self {
        Self {
            rows: BTreeMap::new(),
            files: 0,
            rows_read: 0,
            malformed_rows: 0,
        }
    }
}

impl<C: Copy + Default + AddAssign> CounterTable<C> {
    /// Builds a table from already-keyed rows, summing repeated keys.
    #[must_use]
    pub fn from_rows(rows: impl IntoIterator<Item = (CounterKey, C)>) -> Self {
        let mut table = Self::default();
        for (key, counts) in rows {
            table.rows_read += 1;
            table.add(key, counts);
        }
        table
    }

    fn add(&mut self, key: CounterKey, counts: C) {
        *self.rows.entry(key).or_default() += counts;
    }

    /// Number of distinct keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether no keys were loaded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Loads a counter feed from a single CSV file or from every `.csv` file
/// under a directory.
///
/// Files that cannot be read or lack a required column are skipped with a
/// warning.
///
/// # Errors
///
/// Returns [`IngestError::DirectoryNotFound`] if `path` does not exist, or
/// [`IngestError::Io`] if the directory cannot be listed.
pub fn load_counter_path<S: CounterSource>(
    path: &Path,
) -> Result<CounterTable<S::Counts>, IngestError> {
    let files = if path.is_dir() {
        collect_csv_files(path)?
    } else if path.exists() {
        vec![path.to_path_buf()]
    } else {
        return Err(IngestError::DirectoryNotFound(path.display().to_string()));
    };

    if files.is_empty() {
        log::warn!("No {} CSV files found in {}", S::LABEL, path.display());
    }

    let mut table = CounterTable::default();
    for file in &files {
        let result = std::fs::File::open(file)
            .map_err(|e| IngestError::Io {
                path: file.display().to_string(),
                source: e,
            })
            .and_then(|reader| {
                read_counter_csv::<S, _>(reader, &mut table).map_err(|e| match e {
                    ReadError::Csv(source) => IngestError::Csv {
                        path: file.display().to_string(),
                        source,
                    },
                    ReadError::MissingColumn(column) => IngestError::MissingColumn {
                        path: file.display().to_string(),
                        column,
                    },
                })
            });

        match result {
            Ok(count) => {
                table.files += 1;
                log::debug!("  {}: {count} rows from {}", S::LABEL, file.display());
            }
            Err(e) => log::warn!("  skipping {}: {e}", file.display()),
        }
    }

    if table.malformed_rows > 0 {
        log::warn!(
            "{} feed: skipped {} malformed rows",
            S::LABEL,
            table.malformed_rows
        );
    }
    log::info!(
        "Loaded {} feed: {} rows from {} files, {} distinct keys",
        S::LABEL,
        table.rows_read,
        table.files,
        table.len()
    );

    Ok(table)
}

/// Errors from reading a single counter CSV stream.
#[derive(Debug, thiserror::Error)]
pub enum ReadError {
    /// The CSV itself was unreadable.
    #[error("{0}")]
    Csv(#[from] csv::Error),

    /// A required column is absent from the header row.
    #[error("missing column '{0}'")]
    MissingColumn(String),
}

/// Reads one counter CSV stream into `table`, returning the number of data
/// rows consumed (including malformed ones).
///
/// # Errors
///
/// Returns [`ReadError`] if the header is unreadable or lacks a required
/// column, or if a record cannot be decoded.
pub fn read_counter_csv<S: CounterSource, R: Read>(
    reader: R,
    table: &mut CounterTable<S::Counts>,
) -> Result<u64, ReadError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers: Vec<String> = csv_reader
        .headers()?
        .iter()
        .map(normalize_header)
        .collect();

    let column = |name: &str| {
        headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| ReadError::MissingColumn(name.to_string()))
    };

    let key_idx = [
        column(KEY_COLUMNS[0])?,
        column(KEY_COLUMNS[1])?,
        column(KEY_COLUMNS[2])?,
        column(KEY_COLUMNS[3])?,
    ];
    let counter_idx = S::COLUMNS
        .iter()
        .map(|name| column(name))
        .collect::<Result<Vec<_>, _>>()?;

    let mut count = 0u64;
    let mut values = vec![0u64; counter_idx.len()];

    for record in csv_reader.records() {
        count += 1;
        table.rows_read += 1;

        let record = match record {
            Ok(record) => record,
            Err(e) => {
                log::warn!("  {}: skipping undecodable row {count}: {e}", S::LABEL);
                table.malformed_rows += 1;
                continue;
            }
        };

        let cell = |i: usize| record.get(i).unwrap_or("");
        let location_code = cell(key_idx[3]);
        if location_code.is_empty() {
            table.malformed_rows += 1;
            continue;
        }

        let mut valid = true;
        for (slot, &i) in values.iter_mut().zip(&counter_idx) {
            if let Some(value) = parse_count(cell(i)) {
                *slot = value;
            } else {
                valid = false;
                break;
            }
        }
        if !valid {
            table.malformed_rows += 1;
            continue;
        }

        table.add(
            CounterKey {
                date: cell(key_idx[0]).to_string(),
                state: cell(key_idx[1]).to_string(),
                district: cell(key_idx[2]).to_string(),
                location_code: location_code.to_string(),
            },
            S::from_values(&values),
        );
    }

    Ok(count)
}
