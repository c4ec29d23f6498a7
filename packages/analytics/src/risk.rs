//! Composition of the four anomaly flags into one bounded risk score.

use pulse_analytics_models::config::RiskWeights;
use pulse_analytics_models::{
    RiskCategory, RiskScoreRecord, SpatialAnomalyRecord, TemporalAnomalyRecord,
};

/// Upper bound of the risk score.
pub const MAX_RISK_SCORE: f64 = 100.0;

/// Weighted sum of flags, clipped to `[0, 100]`.
///
/// A pure function of the four booleans: no state, no ordering effects.
pub struct RiskComposer<'a> {
    weights: &'a RiskWeights,
}

impl<'a> RiskComposer<'a> {
    /// Creates a composer with the given flag weights.
    #[must_use]
    pub const fn new(weights: &'a RiskWeights) -> Self {
        Self { weights }
    }

    /// Scores the flags directly.
    #[must_use]
    pub fn score(&self, influx: bool, spike: bool, mass_migration: bool, ghost: bool) -> f64 {
        let points = flag(influx) * self.weights.influx
            + flag(spike) * self.weights.spike
            + flag(mass_migration) * self.weights.mass_migration
            + flag(ghost) * self.weights.ghost_population;
        points.clamp(0.0, MAX_RISK_SCORE)
    }

    /// Composes the spatial and temporal records for one (date, location).
    #[must_use]
    pub fn compose(
        &self,
        spatial: &SpatialAnomalyRecord,
        temporal: &TemporalAnomalyRecord,
    ) -> RiskScoreRecord {
        let risk_score = self.score(
            spatial.influx_flag,
            temporal.spike_flag,
            temporal.mass_migration_flag,
            spatial.ghost_population_flag,
        );

        RiskScoreRecord {
            date: spatial.date,
            location_code: spatial.location_code.clone(),
            risk_score,
            risk_category: RiskCategory::from_score(risk_score),
        }
    }
}

/// 1.0 for a raised flag, 0.0 otherwise.
#[must_use]
pub const fn flag(raised: bool) -> f64 {
    if raised { 1.0 } else { 0.0 }
}
