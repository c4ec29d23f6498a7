//! Per-location roll-up of scored rows.

use std::collections::BTreeMap;

use pulse_analytics_models::{
    GovernanceRiskLevel, LocationSummary, RiskCategory, ScoredRow, Sector, SectorIndices, round2,
};

/// Rolls scored rows up to one summary per location, sorted by code.
///
/// Identity fields come from the earliest-dated row. Sector indices and
/// the governance score are averaged over the location's days.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn summarize_locations(rows: &[ScoredRow]) -> Vec<LocationSummary> {
    let mut groups: BTreeMap<&str, Vec<&ScoredRow>> = BTreeMap::new();
    for row in rows {
        groups.entry(row.location_code()).or_default().push(row);
    }

    groups
        .into_values()
        .filter_map(|mut days| {
            days.sort_by_key(|r| r.date());
            let first = days.first()?;
            let n = days.len() as f64;

            let mut summary = LocationSummary {
                location_code: first.aggregate.location_code.clone(),
                state: first.aggregate.state.clone(),
                district: first.aggregate.district.clone(),
                latitude: first.aggregate.latitude,
                longitude: first.aggregate.longitude,
                days: days.len() as u64,
                total_enrolment: 0,
                total_demographic: 0,
                total_biometric: 0,
                children_enrolled: 0,
                adult_migration_volume: 0,
                labor_activity: 0,
                spike_days: 0,
                mass_migration_days: 0,
                ever_influx: false,
                ever_ghost_population: false,
                max_risk_score: 0.0,
                max_risk_category: RiskCategory::NoRisk,
                mean_indices: SectorIndices::default(),
                governance_risk_score: 0.0,
                governance_risk_level: GovernanceRiskLevel::Safe,
                primary_sector_concern: Sector::Education,
            };

            let mut index_sums = SectorIndices::default();
            let mut governance_sum = 0.0;

            for day in &days {
                let aggregate = &day.aggregate;
                summary.total_enrolment = summary
                    .total_enrolment
                    .saturating_add(aggregate.total_enrolment());
                summary.total_demographic = summary
                    .total_demographic
                    .saturating_add(aggregate.total_demographic());
                summary.total_biometric = summary
                    .total_biometric
                    .saturating_add(aggregate.total_biometric());
                summary.children_enrolled = summary
                    .children_enrolled
                    .saturating_add(aggregate.enrolment.children());
                summary.adult_migration_volume = summary
                    .adult_migration_volume
                    .saturating_add(aggregate.demographic.age_17_plus);
                summary.labor_activity = summary
                    .labor_activity
                    .saturating_add(aggregate.biometric.age_17_plus);

                summary.spike_days += u64::from(day.temporal.spike_flag);
                summary.mass_migration_days += u64::from(day.temporal.mass_migration_flag);
                summary.ever_influx |= day.spatial.influx_flag;
                summary.ever_ghost_population |= day.spatial.ghost_population_flag;
                summary.max_risk_score = summary.max_risk_score.max(day.risk.risk_score);

                for sector in Sector::ALL {
                    *index_sums.get_mut(sector) += day.sector.indices.get(sector);
                }
                governance_sum += day.sector.governance_risk_score;
            }

            for sector in Sector::ALL {
                *summary.mean_indices.get_mut(sector) = round2(index_sums.get(sector) / n);
            }
            summary.max_risk_category = RiskCategory::from_score(summary.max_risk_score);
            summary.governance_risk_score = round2(governance_sum / n);
            summary.governance_risk_level =
                GovernanceRiskLevel::from_score(summary.governance_risk_score);
            summary.primary_sector_concern = summary.mean_indices.primary();

            Some(summary)
        })
        .collect()
}
