//! Neighbor-relative anomaly scoring.
//!
//! Rows are partitioned by date. Within a partition, a hash map from
//! location code to row lets each row read its neighbors' same-date totals
//! without scanning. A neighbor that did not report on the date is left
//! out of the baseline rather than counted as zero.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use pulse_analytics_models::config::SpatialConfig;
use pulse_analytics_models::{MeasureDeviation, SpatialAnomalyRecord};
use pulse_ingest::progress::ProgressCallback;
use pulse_records_models::{DailyAggregate, Measure};
use pulse_spatial::GeoNeighborIndex;

/// Scores each daily row against its geographic neighbors on the same date.
pub struct SpatialAnomalyScorer<'a> {
    index: &'a GeoNeighborIndex,
    config: &'a SpatialConfig,
}

impl<'a> SpatialAnomalyScorer<'a> {
    /// Creates a scorer over a pre-built neighbor graph.
    #[must_use]
    pub const fn new(index: &'a GeoNeighborIndex, config: &'a SpatialConfig) -> Self {
        Self { index, config }
    }

    /// Scores every row. The output is aligned with `rows`.
    pub fn score(
        &self,
        rows: &[DailyAggregate],
        progress: &dyn ProgressCallback,
    ) -> Vec<SpatialAnomalyRecord> {
        let mut partitions: BTreeMap<NaiveDate, HashMap<&str, usize>> = BTreeMap::new();
        for (i, row) in rows.iter().enumerate() {
            partitions
                .entry(row.date)
                .or_default()
                .insert(row.location_code.as_str(), i);
        }

        progress.set_total(partitions.len() as u64);
        log::debug!(
            "Spatial scoring {} rows across {} dates",
            rows.len(),
            partitions.len()
        );

        let mut records: Vec<Option<SpatialAnomalyRecord>> = vec![None; rows.len()];
        let mut isolated = 0_u64;

        for partition in partitions.values() {
            for &i in partition.values() {
                let record = self.score_row(rows, partition, &rows[i]);
                if record.neighbor_observations == 0 {
                    isolated += 1;
                }
                records[i] = Some(record);
            }
            progress.inc(1);
        }

        if isolated > 0 {
            log::debug!("{isolated} rows had no same-date neighbor observations");
        }
        progress.finish(format!("Scored {} rows against neighbors", rows.len()));

        records.into_iter().flatten().collect()
    }

    fn score_row(
        &self,
        rows: &[DailyAggregate],
        partition: &HashMap<&str, usize>,
        row: &DailyAggregate,
    ) -> SpatialAnomalyRecord {
        let neighbor_rows: Vec<&DailyAggregate> = self
            .index
            .neighbors_of(&row.location_code)
            .map(|set| {
                set.codes()
                    .filter_map(|code| partition.get(code).map(|&j| &rows[j]))
                    .collect()
            })
            .unwrap_or_default();

        let deviation = |measure: Measure| {
            let values: Vec<f64> = neighbor_rows
                .iter()
                .map(|n| n.totals()[measure.index()])
                .collect();
            measure_deviation(row.totals()[measure.index()], &values, self.config.min_std)
        };

        let enrolment = deviation(Measure::Enrolment);
        let demographic = deviation(Measure::Demographic);
        let biometric = deviation(Measure::Biometric);

        SpatialAnomalyRecord {
            date: row.date,
            location_code: row.location_code.clone(),
            neighbor_observations: neighbor_rows.len(),
            influx_flag: enrolment.zscore > self.config.influx_zscore,
            ghost_population_flag: demographic.zscore > self.config.ghost_demographic_zscore
                && biometric.zscore < self.config.ghost_biometric_zscore,
            enrolment,
            demographic,
            biometric,
        }
    }
}

/// Mean and sample standard deviation of the neighbor values.
///
/// With fewer than two values the baseline is undefined and falls back to
/// mean 0, std 1.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn neighbor_baseline(values: &[f64]) -> (f64, f64) {
    if values.len() < 2 {
        return (0.0, 1.0);
    }

    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    (mean, variance.sqrt())
}

/// Z-score of `value` against a neighbor baseline, dividing by the std
/// floored at `min_std`. NaN and infinite results become 0.
#[must_use]
pub fn zscore(value: f64, mean: f64, std: f64, min_std: f64) -> f64 {
    finite_or_zero((value - mean) / std.max(min_std))
}

fn measure_deviation(value: f64, neighbor_values: &[f64], min_std: f64) -> MeasureDeviation {
    let (neighbor_mean, neighbor_std) = neighbor_baseline(neighbor_values);
    let neighbor_std = neighbor_std.max(min_std);
    MeasureDeviation {
        neighbor_mean,
        neighbor_std,
        zscore: zscore(value, neighbor_mean, neighbor_std, min_std),
    }
}

pub(crate) const fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() { value } else { 0.0 }
}
