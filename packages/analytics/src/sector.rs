//! Sector governance indices and the composite governance risk score.
//!
//! Each index is a fixed linear combination of daily totals, percentile
//! ranks across every scored row of the run, and the anomaly flags,
//! clipped to `[0, 100]`. Percentiles are the averaged-tie ranks from
//! [`crate::rank`], so the indices do not depend on row order.

use pulse_analytics_models::config::{SectorConfig, SectorWeights};
use pulse_analytics_models::{
    GovernanceRiskLevel, SectorIndices, SectorScoreRecord, SpatialAnomalyRecord,
    TemporalAnomalyRecord, round2,
};
use pulse_records_models::DailyAggregate;

use crate::rank::percentile_ranks;
use crate::risk::flag;

/// Added to ratio denominators.
pub const RATIO_EPSILON: f64 = 1.0;

const MAX_INDEX: f64 = 100.0;

/// Derives the five sector indices and the governance composite per row.
pub struct SectorMetricEngine<'a> {
    config: &'a SectorConfig,
}

impl<'a> SectorMetricEngine<'a> {
    /// Creates an engine with the given composite weights.
    #[must_use]
    pub const fn new(config: &'a SectorConfig) -> Self {
        Self { config }
    }

    /// Scores every row. `spatial` and `temporal` must be aligned with
    /// `rows`; the output is too.
    #[must_use]
    pub fn score(
        &self,
        rows: &[DailyAggregate],
        spatial: &[SpatialAnomalyRecord],
        temporal: &[TemporalAnomalyRecord],
    ) -> Vec<SectorScoreRecord> {
        let percentile_of = |value: fn(&DailyAggregate) -> f64| {
            let values: Vec<f64> = rows.iter().map(value).collect();
            percentile_ranks(&values)
        };

        #[allow(clippy::cast_precision_loss)]
        let adult_migration = percentile_of(|r| r.demographic.age_17_plus as f64);
        #[allow(clippy::cast_precision_loss)]
        let adult_biometric = percentile_of(|r| r.biometric.age_17_plus as f64);
        #[allow(clippy::cast_precision_loss)]
        let adult_enrolment = percentile_of(|r| r.enrolment.age_18_plus as f64);
        let hollow_out = percentile_of(hollow_out_ratio);

        rows.iter()
            .zip(spatial.iter().zip(temporal))
            .enumerate()
            .map(|(i, (row, (spatial, temporal)))| {
                let mass = flag(temporal.mass_migration_flag);
                let spike = flag(temporal.spike_flag);

                let indices = SectorIndices {
                    education: education_index(row),
                    hunger: clip(50.0 * adult_migration[i] + 30.0 * mass + 20.0 * spike),
                    rural: clip(80.0 * hollow_out[i] + 20.0 * flag(spatial.ghost_population_flag)),
                    electoral: clip(
                        50.0 * adult_enrolment[i] + 30.0 * flag(spatial.influx_flag) + 20.0 * spike,
                    ),
                    labor: clip(40.0 * adult_migration[i] + 30.0 * adult_biometric[i] + 30.0 * mass),
                };
                let governance_risk_score =
                    governance_score(&indices, &self.config.composite_weights);

                SectorScoreRecord {
                    date: row.date,
                    location_code: row.location_code.clone(),
                    indices,
                    governance_risk_score,
                    governance_risk_level: GovernanceRiskLevel::from_score(governance_risk_score),
                }
            })
            .collect()
    }
}

/// School dropout risk: child enrolments lacking biometric follow-up,
/// raised further by child address changes.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn education_index(row: &DailyAggregate) -> f64 {
    let children = row.enrolment.children() as f64 + RATIO_EPSILON;
    let verified = (row.biometric.age_5_17 as f64 / children).clamp(0.0, 1.0);
    let child_moves = (row.demographic.age_5_17 as f64 / children).clamp(0.0, 1.0);
    clip(0.7 * verified.mul_add(-100.0, 100.0) + 0.3 * child_moves * 100.0)
}

/// Address changes relative to new enrolments.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn hollow_out_ratio(row: &DailyAggregate) -> f64 {
    row.total_demographic() as f64 / (row.total_enrolment() as f64 + RATIO_EPSILON)
}

/// Weighted sum of the indices, rounded to 2 decimals and clipped.
#[must_use]
pub fn governance_score(indices: &SectorIndices, weights: &SectorWeights) -> f64 {
    round2(indices.weighted_sum(weights)).clamp(0.0, MAX_INDEX)
}

fn clip(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, MAX_INDEX)
}
