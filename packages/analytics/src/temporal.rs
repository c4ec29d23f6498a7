//! Self-history anomaly scoring.
//!
//! Rows are partitioned by location and ordered by date. Each measure gets
//! a row-based rolling mean over the last `window` observations; the spike
//! ratio compares the day's value to that mean plus a small epsilon.

use std::collections::BTreeMap;

use pulse_analytics_models::config::TemporalConfig;
use pulse_analytics_models::{SeriesPoint, TemporalAnomalyRecord};
use pulse_ingest::progress::ProgressCallback;
use pulse_records_models::{DailyAggregate, Measure};

use crate::spatial::finite_or_zero;

/// Scores each daily row against its own location's recent history.
pub struct TemporalAnomalyScorer<'a> {
    config: &'a TemporalConfig,
}

impl<'a> TemporalAnomalyScorer<'a> {
    /// Creates a scorer with the given window settings.
    #[must_use]
    pub const fn new(config: &'a TemporalConfig) -> Self {
        Self { config }
    }

    /// Scores every row. The output is aligned with `rows`.
    pub fn score(
        &self,
        rows: &[DailyAggregate],
        progress: &dyn ProgressCallback,
    ) -> Vec<TemporalAnomalyRecord> {
        let mut partitions: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
        for (i, row) in rows.iter().enumerate() {
            partitions
                .entry(row.location_code.as_str())
                .or_default()
                .push(i);
        }

        progress.set_total(partitions.len() as u64);
        log::debug!(
            "Temporal scoring {} rows across {} locations",
            rows.len(),
            partitions.len()
        );

        let mut records: Vec<Option<TemporalAnomalyRecord>> = vec![None; rows.len()];

        for series in partitions.values_mut() {
            series.sort_by_key(|&i| rows[i].date);
            let points = self.series_points(rows, series);

            for (position, &i) in series.iter().enumerate() {
                let day = std::array::from_fn(|m| points[m][position]);
                records[i] = Some(self.record(&rows[i], day));
            }
            progress.inc(1);
        }

        progress.finish(format!("Scored {} location series", partitions.len()));

        records.into_iter().flatten().collect()
    }

    /// Rolling points for every measure, each aligned with `series`.
    fn series_points(&self, rows: &[DailyAggregate], series: &[usize]) -> [Vec<SeriesPoint>; 3] {
        Measure::ALL.map(|measure| {
            let values: Vec<f64> = series
                .iter()
                .map(|&i| rows[i].totals()[measure.index()])
                .collect();

            rolling_means(
                &values,
                self.config.window,
                self.config.min_periods,
                self.config.include_current_day,
            )
            .into_iter()
            .zip(&values)
            .map(|(rolling_mean, &value)| SeriesPoint {
                rolling_mean,
                spike_ratio: spike_ratio(value, rolling_mean, self.config.epsilon),
            })
            .collect()
        })
    }

    fn record(&self, row: &DailyAggregate, points: [SeriesPoint; 3]) -> TemporalAnomalyRecord {
        let [enrolment, demographic, biometric] = points;
        let threshold = self.config.spike_ratio;

        TemporalAnomalyRecord {
            location_code: row.location_code.clone(),
            date: row.date,
            spike_flag: enrolment.spike_ratio > threshold || demographic.spike_ratio > threshold,
            mass_migration_flag: row.total_demographic() > self.config.mass_migration_demographic,
            enrolment,
            demographic,
            biometric,
        }
    }
}

/// Row-based rolling mean of `values`.
///
/// With `include_current`, position `i` averages the last `window` values
/// ending at `i`; otherwise it averages the `window` values before `i`.
/// A window holding fewer than `min_periods` values yields `None`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn rolling_means(
    values: &[f64],
    window: usize,
    min_periods: usize,
    include_current: bool,
) -> Vec<Option<f64>> {
    (0..values.len())
        .map(|i| {
            let end = if include_current { i + 1 } else { i };
            let start = end.saturating_sub(window);
            let slice = &values[start..end];
            if slice.is_empty() || slice.len() < min_periods {
                return None;
            }
            Some(slice.iter().sum::<f64>() / slice.len() as f64)
        })
        .collect()
}

/// `value / (rolling_mean + epsilon)`, or 0 when the mean is undefined or
/// the ratio is not finite.
#[must_use]
pub fn spike_ratio(value: f64, rolling_mean: Option<f64>, epsilon: f64) -> f64 {
    rolling_mean.map_or(0.0, |mean| finite_or_zero(value / (mean + epsilon)))
}
