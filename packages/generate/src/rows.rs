//! Flat CSV row shapes for every tabular artifact.
//!
//! Column names follow the governance table's published schema. Booleans
//! are written as `0`/`1`, dates as `YYYY-MM-DD`, and an undefined rolling
//! mean as an empty cell.

use pulse_analytics_models::{LocationSummary, ScoredRow, Sector};
use pulse_spatial::NeighborSet;
use serde::Serialize;

/// Date format used in every artifact.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// One row of `governance_table.csv`.
#[derive(Debug, Clone, Serialize)]
pub struct GovernanceTableRow<'a> {
    pub date: String,
    pub state: &'a str,
    pub district: &'a str,
    pub pincode: &'a str,
    pub latitude: f64,
    pub longitude: f64,
    pub total_enrolment: u64,
    pub total_demographic: u64,
    pub total_biometric: u64,
    pub rolling_7d_enrolment: Option<f64>,
    pub rolling_7d_demographic: Option<f64>,
    pub rolling_7d_biometric: Option<f64>,
    pub enrolment_spike_ratio: f64,
    pub demographic_spike_ratio: f64,
    pub neighbor_observations: usize,
    pub zscore_enrolment: f64,
    pub zscore_demographic: f64,
    pub zscore_biometric: f64,
    pub risk_influx: u8,
    pub risk_ghost_population: u8,
    pub sudden_spike_anomaly: u8,
    pub mass_migration_alert: u8,
    pub risk_score: f64,
    pub risk_category: &'static str,
    pub education_index: f64,
    pub hunger_index: f64,
    pub rural_index: f64,
    pub electoral_index: f64,
    pub labor_index: f64,
    pub governance_risk_score: f64,
    pub governance_risk_level: &'static str,
}

impl<'a> From<&'a ScoredRow> for GovernanceTableRow<'a> {
    fn from(row: &'a ScoredRow) -> Self {
        let aggregate = &row.aggregate;
        let indices = &row.sector.indices;

        Self {
            date: aggregate.date.format(DATE_FORMAT).to_string(),
            state: &aggregate.state,
            district: &aggregate.district,
            pincode: &aggregate.location_code,
            latitude: aggregate.latitude,
            longitude: aggregate.longitude,
            total_enrolment: aggregate.total_enrolment(),
            total_demographic: aggregate.total_demographic(),
            total_biometric: aggregate.total_biometric(),
            rolling_7d_enrolment: row.temporal.enrolment.rolling_mean,
            rolling_7d_demographic: row.temporal.demographic.rolling_mean,
            rolling_7d_biometric: row.temporal.biometric.rolling_mean,
            enrolment_spike_ratio: row.temporal.enrolment.spike_ratio,
            demographic_spike_ratio: row.temporal.demographic.spike_ratio,
            neighbor_observations: row.spatial.neighbor_observations,
            zscore_enrolment: row.spatial.enrolment.zscore,
            zscore_demographic: row.spatial.demographic.zscore,
            zscore_biometric: row.spatial.biometric.zscore,
            risk_influx: u8::from(row.spatial.influx_flag),
            risk_ghost_population: u8::from(row.spatial.ghost_population_flag),
            sudden_spike_anomaly: u8::from(row.temporal.spike_flag),
            mass_migration_alert: u8::from(row.temporal.mass_migration_flag),
            risk_score: row.risk.risk_score,
            risk_category: row.risk.risk_category.into(),
            education_index: indices.education,
            hunger_index: indices.hunger,
            rural_index: indices.rural,
            electoral_index: indices.electoral,
            labor_index: indices.labor,
            governance_risk_score: row.sector.governance_risk_score,
            governance_risk_level: row.sector.governance_risk_level.into(),
        }
    }
}

/// One row of `location_summary.csv`.
#[derive(Debug, Clone, Serialize)]
pub struct LocationSummaryRow<'a> {
    pub pincode: &'a str,
    pub state: &'a str,
    pub district: &'a str,
    pub latitude: f64,
    pub longitude: f64,
    pub days: u64,
    pub total_enrolment: u64,
    pub total_demographic: u64,
    pub total_biometric: u64,
    pub children_enrolled: u64,
    pub adult_migration_volume: u64,
    pub labor_activity: u64,
    pub spike_days: u64,
    pub mass_migration_days: u64,
    pub ever_influx: u8,
    pub ever_ghost_population: u8,
    pub max_risk_score: f64,
    pub max_risk_category: &'static str,
    pub education_index: f64,
    pub hunger_index: f64,
    pub rural_index: f64,
    pub electoral_index: f64,
    pub labor_index: f64,
    pub governance_risk_score: f64,
    pub governance_risk_level: &'static str,
    pub primary_sector_concern: &'static str,
}

impl<'a> From<&'a LocationSummary> for LocationSummaryRow<'a> {
    fn from(summary: &'a LocationSummary) -> Self {
        let indices = &summary.mean_indices;

        Self {
            pincode: &summary.location_code,
            state: &summary.state,
            district: &summary.district,
            latitude: summary.latitude,
            longitude: summary.longitude,
            days: summary.days,
            total_enrolment: summary.total_enrolment,
            total_demographic: summary.total_demographic,
            total_biometric: summary.total_biometric,
            children_enrolled: summary.children_enrolled,
            adult_migration_volume: summary.adult_migration_volume,
            labor_activity: summary.labor_activity,
            spike_days: summary.spike_days,
            mass_migration_days: summary.mass_migration_days,
            ever_influx: u8::from(summary.ever_influx),
            ever_ghost_population: u8::from(summary.ever_ghost_population),
            max_risk_score: summary.max_risk_score,
            max_risk_category: summary.max_risk_category.into(),
            education_index: indices.education,
            hunger_index: indices.hunger,
            rural_index: indices.rural,
            electoral_index: indices.electoral,
            labor_index: indices.labor,
            governance_risk_score: summary.governance_risk_score,
            governance_risk_level: summary.governance_risk_level.into(),
            primary_sector_concern: summary.primary_sector_concern.into(),
        }
    }
}

/// One row of a `priorities_<sector>.csv` file.
#[derive(Debug, Clone, Serialize)]
pub struct PriorityRow<'a> {
    pub sector: &'static str,
    pub rank: usize,
    pub pincode: &'a str,
    pub state: &'a str,
    pub district: &'a str,
    pub sector_index: f64,
    pub governance_risk_score: f64,
    pub primary_sector_concern: &'static str,
}

impl<'a> PriorityRow<'a> {
    /// Row for `summary` at 1-based `rank` in `sector`'s list.
    #[must_use]
    pub fn new(rank: usize, sector: Sector, summary: &'a LocationSummary) -> Self {
        Self {
            sector: sector.title(),
            rank,
            pincode: &summary.location_code,
            state: &summary.state,
            district: &summary.district,
            sector_index: summary.mean_indices.get(sector),
            governance_risk_score: summary.governance_risk_score,
            primary_sector_concern: summary.primary_sector_concern.into(),
        }
    }
}

/// One edge of `neighbors.csv`.
#[derive(Debug, Clone, Serialize)]
pub struct NeighborRow<'a> {
    pub location_code: &'a str,
    pub rank: usize,
    pub neighbor_code: &'a str,
    pub distance_km: f64,
}

/// Edges of one neighbor set, closest first with 1-based ranks.
pub fn neighbor_rows(set: &NeighborSet) -> impl Iterator<Item = NeighborRow<'_>> {
    set.neighbors
        .iter()
        .enumerate()
        .map(move |(i, neighbor)| NeighborRow {
            location_code: &set.location_code,
            rank: i + 1,
            neighbor_code: &neighbor.location_code,
            distance_km: (neighbor.distance_km * 1_000.0).round() / 1_000.0,
        })
}
