//! Run summary written to `metadata.json`.
//!
//! Holds no timestamps or host details so that reruns on unchanged input
//! produce an identical file.

use std::collections::BTreeMap;

use pulse_analytics::{PipelineOutput, RunStats};
use pulse_analytics_models::{GovernanceRiskLevel, PipelineConfig, RiskCategory};
use pulse_ingest::SkipCounts;
use serde::Serialize;
use strum::IntoEnumIterator as _;

/// How many rows raised each flag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlagTotals {
    pub influx: u64,
    pub ghost_population: u64,
    pub spike: u64,
    pub mass_migration: u64,
}

/// Contents of `metadata.json`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunMetadata<'a> {
    pub stats: &'a RunStats,
    pub skips: SkipCounts,
    pub neighbor_locations: usize,
    pub flags: FlagTotals,
    /// Row counts per risk category, every category present.
    pub risk_categories: BTreeMap<&'static str, u64>,
    /// Row counts per governance level, every level present.
    pub governance_levels: BTreeMap<&'static str, u64>,
    pub config: &'a PipelineConfig,
}

impl<'a> RunMetadata<'a> {
    /// Summarizes a pipeline run.
    #[must_use]
    pub fn new(output: &'a PipelineOutput, config: &'a PipelineConfig) -> Self {
        let mut flags = FlagTotals::default();
        let mut risk_categories: BTreeMap<&'static str, u64> =
            RiskCategory::iter().map(|c| (c.into(), 0)).collect();
        let mut governance_levels: BTreeMap<&'static str, u64> =
            GovernanceRiskLevel::iter().map(|l| (l.into(), 0)).collect();

        for row in &output.rows {
            flags.influx += u64::from(row.spatial.influx_flag);
            flags.ghost_population += u64::from(row.spatial.ghost_population_flag);
            flags.spike += u64::from(row.temporal.spike_flag);
            flags.mass_migration += u64::from(row.temporal.mass_migration_flag);

            *risk_categories
                .entry(row.risk.risk_category.into())
                .or_default() += 1;
            *governance_levels
                .entry(row.sector.governance_risk_level.into())
                .or_default() += 1;
        }

        Self {
            stats: &output.stats,
            skips: output.skips,
            neighbor_locations: output.neighbors.len(),
            flags,
            risk_categories,
            governance_levels,
            config,
        }
    }
}
