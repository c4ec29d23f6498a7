#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Scored record types produced by the anomaly pipeline.
//!
//! Each scoring stage emits one record per (date, location code):
//! [`SpatialAnomalyRecord`] from the neighbor comparison,
//! [`TemporalAnomalyRecord`] from the self-history comparison,
//! [`RiskScoreRecord`] from the flag composition, and
//! [`SectorScoreRecord`] from the sector indices. [`ScoredRow`] joins them
//! with the underlying [`DailyAggregate`], and [`LocationSummary`] rolls
//! rows up per location.

pub mod config;

use chrono::NaiveDate;
use pulse_records_models::DailyAggregate;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumIter, EnumString, IntoStaticStr};

pub use config::PipelineConfig;

/// Deviation of one measure from the same-date neighbor baseline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeasureDeviation {
    /// Mean of the neighbor values, 0 when fewer than two were available.
    pub neighbor_mean: f64,
    /// Sample standard deviation of the neighbor values floored at the
    /// configured minimum (1 by default), and 1 when fewer than two were
    /// available.
    pub neighbor_std: f64,
    /// `(value - mean) / neighbor_std`, never NaN or infinite.
    pub zscore: f64,
}

impl Default for MeasureDeviation {
    fn default() -> Self {
        Self {
            neighbor_mean: 0.0,
            neighbor_std: 1.0,
            zscore: 0.0,
        }
    }
}

/// Neighbor-relative scores for one (date, location).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpatialAnomalyRecord {
    /// Calendar date.
    pub date: NaiveDate,
    /// Postal location code.
    pub location_code: String,
    /// Neighbors that reported on the same date.
    pub neighbor_observations: usize,
    /// Enrolment deviation.
    pub enrolment: MeasureDeviation,
    /// Demographic deviation.
    pub demographic: MeasureDeviation,
    /// Biometric deviation.
    pub biometric: MeasureDeviation,
    /// Enrolment far above the neighborhood.
    pub influx_flag: bool,
    /// Demographic churn without matching biometric verification.
    pub ghost_population_flag: bool,
}

/// Rolling baseline and spike ratio for one measure on one day.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesPoint {
    /// Rolling mean over the window, `None` when the window held fewer
    /// observations than required.
    pub rolling_mean: Option<f64>,
    /// `value / (rolling_mean + epsilon)`, 0 when undefined.
    pub spike_ratio: f64,
}

impl Default for SeriesPoint {
    fn default() -> Self {
        Self {
            rolling_mean: None,
            spike_ratio: 0.0,
        }
    }
}

/// Self-history scores for one (location, date).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemporalAnomalyRecord {
    /// Postal location code.
    pub location_code: String,
    /// Calendar date.
    pub date: NaiveDate,
    /// Enrolment series.
    pub enrolment: SeriesPoint,
    /// Demographic series.
    pub demographic: SeriesPoint,
    /// Biometric series.
    pub biometric: SeriesPoint,
    /// Enrolment or demographic ratio above the spike threshold.
    pub spike_flag: bool,
    /// Raw demographic total above the absolute threshold.
    pub mass_migration_flag: bool,
}

/// Discrete bucket of the composite risk score.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
    EnumIter,
    IntoStaticStr,
)]
pub enum RiskCategory {
    /// Score of exactly 0.
    #[serde(rename = "No Risk")]
    #[strum(serialize = "No Risk")]
    NoRisk,
    /// (0, 25]
    Low,
    /// (25, 50]
    Medium,
    /// (50, 75]
    High,
    /// (75, 100]
    Critical,
}

impl RiskCategory {
    /// Buckets a score with right-closed intervals.
    ///
    /// Scores at or below 0 (including NaN) are `NoRisk`; scores above 75
    /// are `Critical`.
    #[must_use]
    pub fn from_score(score: f64) -> Self {
        if score.is_nan() || score <= 0.0 {
            Self::NoRisk
        } else if score <= 25.0 {
            Self::Low
        } else if score <= 50.0 {
            Self::Medium
        } else if score <= 75.0 {
            Self::High
        } else {
            Self::Critical
        }
    }
}

/// Composite risk for one (date, location).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskScoreRecord {
    /// Calendar date.
    pub date: NaiveDate,
    /// Postal location code.
    pub location_code: String,
    /// Weighted flag sum clipped to `[0, 100]`.
    pub risk_score: f64,
    /// Bucket of `risk_score`.
    pub risk_category: RiskCategory,
}

/// Governance sector with its own risk index.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
    EnumIter,
    IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Sector {
    /// School dropout risk.
    Education,
    /// Migrant hunger risk.
    Hunger,
    /// Village hollow-out.
    Rural,
    /// Electoral roll discrepancy.
    Electoral,
    /// Skill-gap labor migration.
    Labor,
}

impl Sector {
    /// All sectors in tie-break order.
    pub const ALL: [Self; 5] = [
        Self::Education,
        Self::Hunger,
        Self::Rural,
        Self::Electoral,
        Self::Labor,
    ];

    /// Human-readable title.
    #[must_use]
    pub const fn title(self) -> &'static str {
        match self {
            Self::Education => "School Dropout Risk",
            Self::Hunger => "Migrant Hunger Risk",
            Self::Rural => "Village Hollow-Out",
            Self::Electoral => "Electoral Discrepancy",
            Self::Labor => "Skill-Gap Migration",
        }
    }

    /// Weight of this sector in the composite score.
    #[must_use]
    pub const fn weight(self, weights: &config::SectorWeights) -> f64 {
        match self {
            Self::Education => weights.education,
            Self::Hunger => weights.hunger,
            Self::Rural => weights.rural,
            Self::Electoral => weights.electoral,
            Self::Labor => weights.labor,
        }
    }
}

/// The five sector indices, each in `[0, 100]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectorIndices {
    /// School dropout risk.
    pub education: f64,
    /// Migrant hunger risk.
    pub hunger: f64,
    /// Village hollow-out.
    pub rural: f64,
    /// Electoral discrepancy.
    pub electoral: f64,
    /// Skill-gap labor migration.
    pub labor: f64,
}

impl SectorIndices {
    /// Index for the given sector.
    #[must_use]
    pub const fn get(&self, sector: Sector) -> f64 {
        match sector {
            Sector::Education => self.education,
            Sector::Hunger => self.hunger,
            Sector::Rural => self.rural,
            Sector::Electoral => self.electoral,
            Sector::Labor => self.labor,
        }
    }

    /// Mutable index for the given sector.
    pub const fn get_mut(&mut self, sector: Sector) -> &mut f64 {
        match sector {
            Sector::Education => &mut self.education,
            Sector::Hunger => &mut self.hunger,
            Sector::Rural => &mut self.rural,
            Sector::Electoral => &mut self.electoral,
            Sector::Labor => &mut self.labor,
        }
    }

    /// Unrounded weighted sum of the five indices.
    #[must_use]
    pub fn weighted_sum(&self, weights: &config::SectorWeights) -> f64 {
        Sector::ALL
            .iter()
            .map(|&sector| self.get(sector) * sector.weight(weights))
            .sum()
    }

    /// Sector with the highest index, earlier sectors winning ties.
    #[must_use]
    pub fn primary(&self) -> Sector {
        let mut best = Sector::Education;
        for sector in Sector::ALL {
            if self.get(sector) > self.get(best) {
                best = sector;
            }
        }
        best
    }
}

/// Discrete bucket of the governance risk score.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
    EnumIter,
    IntoStaticStr,
)]
pub enum GovernanceRiskLevel {
    /// At most 20.
    Safe,
    /// (20, 40]
    Low,
    /// (40, 60]
    Medium,
    /// (60, 80]
    High,
    /// (80, 100]
    Critical,
}

impl GovernanceRiskLevel {
    /// Buckets a score with right-closed intervals.
    #[must_use]
    pub fn from_score(score: f64) -> Self {
        if score.is_nan() || score <= 20.0 {
            Self::Safe
        } else if score <= 40.0 {
            Self::Low
        } else if score <= 60.0 {
            Self::Medium
        } else if score <= 80.0 {
            Self::High
        } else {
            Self::Critical
        }
    }
}

/// Sector indices and governance composite for one (date, location).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectorScoreRecord {
    /// Calendar date.
    pub date: NaiveDate,
    /// Postal location code.
    pub location_code: String,
    /// The five sector indices.
    pub indices: SectorIndices,
    /// Weighted composite rounded to 2 decimals, in `[0, 100]`.
    pub governance_risk_score: f64,
    /// Bucket of `governance_risk_score`.
    pub governance_risk_level: GovernanceRiskLevel,
}

/// Every stage's output for one (date, location).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoredRow {
    /// Daily totals the scores were computed from.
    pub aggregate: DailyAggregate,
    /// Neighbor-relative scores.
    pub spatial: SpatialAnomalyRecord,
    /// Self-history scores.
    pub temporal: TemporalAnomalyRecord,
    /// Composite risk.
    pub risk: RiskScoreRecord,
    /// Sector indices.
    pub sector: SectorScoreRecord,
}

impl ScoredRow {
    /// Calendar date.
    #[must_use]
    pub const fn date(&self) -> NaiveDate {
        self.aggregate.date
    }

    /// Postal location code.
    #[must_use]
    pub fn location_code(&self) -> &str {
        &self.aggregate.location_code
    }
}

/// Per-location roll-up of scored rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationSummary {
    /// Postal location code.
    pub location_code: String,
    /// First-seen state.
    pub state: String,
    /// First-seen district.
    pub district: String,
    /// Catalog latitude.
    pub latitude: f64,
    /// Catalog longitude.
    pub longitude: f64,
    /// Days with data.
    pub days: u64,
    /// Summed enrolments.
    pub total_enrolment: u64,
    /// Summed demographic changes.
    pub total_demographic: u64,
    /// Summed biometric updates.
    pub total_biometric: u64,
    /// Summed child enrolments (ages 0-17).
    pub children_enrolled: u64,
    /// Summed adult demographic changes.
    pub adult_migration_volume: u64,
    /// Summed adult biometric updates.
    pub labor_activity: u64,
    /// Days with a temporal spike.
    pub spike_days: u64,
    /// Days above the mass-migration threshold.
    pub mass_migration_days: u64,
    /// Any day flagged for influx.
    pub ever_influx: bool,
    /// Any day flagged for ghost population.
    pub ever_ghost_population: bool,
    /// Highest daily risk score.
    pub max_risk_score: f64,
    /// Bucket of `max_risk_score`.
    pub max_risk_category: RiskCategory,
    /// Mean daily sector indices, rounded to 2 decimals.
    pub mean_indices: SectorIndices,
    /// Mean daily governance score, rounded to 2 decimals.
    pub governance_risk_score: f64,
    /// Bucket of `governance_risk_score`.
    pub governance_risk_level: GovernanceRiskLevel,
    /// Sector with the highest mean index.
    pub primary_sector_concern: Sector,
}

/// Rounds to 2 decimal places.
#[must_use]
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
