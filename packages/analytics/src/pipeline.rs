//! End-to-end scoring run over injected inputs.
//!
//! A [`GovernancePipeline`] owns its configuration, the three counter feeds,
//! and the coordinate catalog. Nothing is read from process-wide state, so
//! a new pipeline over different inputs can run in the same process.
//!
//! After merging, the spatial stage (partitioned by date) and the temporal
//! stage (partitioned by location) are independent; [`GovernancePipeline::run`]
//! executes them concurrently on blocking worker threads, while
//! [`GovernancePipeline::run_sync`] runs them in sequence. Both produce the
//! same output.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::NaiveDate;
use pulse_analytics_models::{
    LocationSummary, PipelineConfig, ScoredRow, SpatialAnomalyRecord, TemporalAnomalyRecord,
};
use pulse_ingest::daily::aggregate_daily;
use pulse_ingest::merge::UpdateRecordMerger;
use pulse_ingest::progress::{ProgressCallback, null_progress};
use pulse_ingest::{CounterFeeds, SkipCounts};
use pulse_records_models::DailyAggregate;
use pulse_spatial::{GeoCoordinateCatalog, GeoNeighborIndex};
use serde::{Deserialize, Serialize};

use crate::PipelineError;
use crate::risk::RiskComposer;
use crate::sector::SectorMetricEngine;
use crate::spatial::SpatialAnomalyScorer;
use crate::summary::summarize_locations;
use crate::temporal::TemporalAnomalyScorer;

/// Progress sinks for the two scoring stages.
#[derive(Clone)]
pub struct StageProgress {
    /// Spatial stage, one unit per date.
    pub spatial: Arc<dyn ProgressCallback>,
    /// Temporal stage, one unit per location.
    pub temporal: Arc<dyn ProgressCallback>,
}

impl Default for StageProgress {
    fn default() -> Self {
        Self {
            spatial: null_progress(),
            temporal: null_progress(),
        }
    }
}

/// Size and coverage of a completed run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunStats {
    /// Records after the outer join.
    pub merged_records: u64,
    /// Scored (date, location) rows.
    pub scored_rows: u64,
    /// Distinct scored locations.
    pub locations: u64,
    /// Distinct scored dates.
    pub dates: u64,
    /// Earliest scored date.
    pub first_date: Option<NaiveDate>,
    /// Latest scored date.
    pub last_date: Option<NaiveDate>,
}

/// Everything a run produces.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    /// Scored rows sorted by risk score descending, then date, then
    /// location code.
    pub rows: Vec<ScoredRow>,
    /// Per-location roll-ups sorted by location code.
    pub summaries: Vec<LocationSummary>,
    /// Neighbor graph over the scored locations.
    pub neighbors: Arc<GeoNeighborIndex>,
    /// Rows excluded along the way.
    pub skips: SkipCounts,
    /// Run coverage.
    pub stats: RunStats,
}

/// Merged, aggregated inputs ready for the scoring stages.
struct Prepared {
    daily: Arc<Vec<DailyAggregate>>,
    index: Arc<GeoNeighborIndex>,
    skips: SkipCounts,
    merged_records: u64,
}

/// A scoring run over injected counter feeds and a coordinate catalog.
pub struct GovernancePipeline {
    config: PipelineConfig,
    feeds: CounterFeeds,
    catalog: GeoCoordinateCatalog,
}

impl GovernancePipeline {
    /// Creates a pipeline over the given inputs.
    #[must_use]
    pub const fn new(
        config: PipelineConfig,
        feeds: CounterFeeds,
        catalog: GeoCoordinateCatalog,
    ) -> Self {
        Self {
            config,
            feeds,
            catalog,
        }
    }

    /// The configuration this pipeline scores with.
    #[must_use]
    pub const fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Runs every stage, scoring spatial and temporal stages concurrently.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] if no counter or coordinate data is
    /// present, nothing is left to score, or a worker task fails.
    pub async fn run(&self, progress: &StageProgress) -> Result<PipelineOutput, PipelineError> {
        let prepared = self.prepare()?;

        let spatial_task = {
            let daily = Arc::clone(&prepared.daily);
            let index = Arc::clone(&prepared.index);
            let config = self.config.spatial.clone();
            let progress = Arc::clone(&progress.spatial);
            tokio::task::spawn_blocking(move || {
                SpatialAnomalyScorer::new(&index, &config).score(&daily, progress.as_ref())
            })
        };

        let temporal_task = {
            let daily = Arc::clone(&prepared.daily);
            let config = self.config.temporal.clone();
            let progress = Arc::clone(&progress.temporal);
            tokio::task::spawn_blocking(move || {
                TemporalAnomalyScorer::new(&config).score(&daily, progress.as_ref())
            })
        };

        let (spatial, temporal) = tokio::try_join!(spatial_task, temporal_task)?;

        Ok(self.assemble(prepared, &spatial, &temporal))
    }

    /// Runs every stage on the calling thread.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] if no counter or coordinate data is
    /// present or nothing is left to score.
    pub fn run_sync(&self, progress: &StageProgress) -> Result<PipelineOutput, PipelineError> {
        let prepared = self.prepare()?;

        let spatial = SpatialAnomalyScorer::new(&prepared.index, &self.config.spatial)
            .score(&prepared.daily, progress.spatial.as_ref());
        let temporal = TemporalAnomalyScorer::new(&self.config.temporal)
            .score(&prepared.daily, progress.temporal.as_ref());

        Ok(self.assemble(prepared, &spatial, &temporal))
    }

    fn prepare(&self) -> Result<Prepared, PipelineError> {
        if self.feeds.is_empty() {
            return Err(PipelineError::NoCounterData);
        }
        if self.catalog.is_empty() {
            return Err(PipelineError::NoCoordinateData);
        }

        let merged = UpdateRecordMerger::merge(
            &self.feeds.enrolment,
            &self.feeds.demographic,
            &self.feeds.biometric,
        );
        let daily = aggregate_daily(&merged.records, &self.catalog);
        if daily.rows.is_empty() {
            return Err(PipelineError::NoScorableRows);
        }

        let codes: BTreeSet<&str> = daily
            .rows
            .iter()
            .map(|r| r.location_code.as_str())
            .collect();
        let scored_catalog = self.catalog.restricted_to(&codes);
        let index = GeoNeighborIndex::build(&scored_catalog, self.config.neighbors.k);

        let catalog_stats = self.catalog.stats();
        let skips = SkipCounts {
            malformed_rows: self.feeds.malformed_rows(),
            unparsable_dates: merged.unparsable_dates,
            missing_coordinates: daily.missing_coordinates,
            invalid_coordinates: catalog_stats.invalid_coordinates,
            duplicate_coordinates: catalog_stats.duplicates,
        };

        Ok(Prepared {
            daily: Arc::new(daily.rows),
            index: Arc::new(index),
            skips,
            merged_records: merged.records.len() as u64,
        })
    }

    fn assemble(
        &self,
        prepared: Prepared,
        spatial: &[SpatialAnomalyRecord],
        temporal: &[TemporalAnomalyRecord],
    ) -> PipelineOutput {
        let daily = Arc::try_unwrap(prepared.daily).unwrap_or_else(|shared| (*shared).clone());

        let sectors = SectorMetricEngine::new(&self.config.sector).score(&daily, spatial, temporal);
        let composer = RiskComposer::new(&self.config.risk);

        let mut rows: Vec<ScoredRow> = daily
            .into_iter()
            .zip(spatial.iter().zip(temporal))
            .zip(sectors)
            .map(|((aggregate, (spatial, temporal)), sector)| ScoredRow {
                risk: composer.compose(spatial, temporal),
                spatial: spatial.clone(),
                temporal: temporal.clone(),
                sector,
                aggregate,
            })
            .collect();

        rows.sort_by(|a, b| {
            b.risk
                .risk_score
                .total_cmp(&a.risk.risk_score)
                .then_with(|| a.date().cmp(&b.date()))
                .then_with(|| a.location_code().cmp(b.location_code()))
        });

        let summaries = summarize_locations(&rows);
        let dates: BTreeSet<NaiveDate> = rows.iter().map(ScoredRow::date).collect();
        let stats = RunStats {
            merged_records: prepared.merged_records,
            scored_rows: rows.len() as u64,
            locations: summaries.len() as u64,
            dates: dates.len() as u64,
            first_date: dates.first().copied(),
            last_date: dates.last().copied(),
        };

        let flagged = rows.iter().filter(|r| r.risk.risk_score > 0.0).count();
        log::info!(
            "Scored {} rows across {} locations and {} dates; {} carry risk",
            stats.scored_rows,
            stats.locations,
            stats.dates,
            flagged
        );

        PipelineOutput {
            rows,
            summaries,
            neighbors: prepared.index,
            skips: prepared.skips,
            stats,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulse_analytics_models::{RiskCategory, Sector};
    use pulse_ingest::streams::CounterTable;
    use pulse_records_models::{
        BiometricCounts, Coordinate, CounterKey, DemographicCounts, EnrolmentCounts,
    };

    const CODES: [&str; 7] = ["560001", "560002", "560003", "560004", "560005", "560006", "560007"];

    fn key(day: u32, code: &str) -> CounterKey {
        CounterKey {
            date: format!("{day:02}-03-2025"),
            state: "Karnataka".to_string(),
            district: "Bengaluru Urban".to_string(),
            location_code: code.to_string(),
        }
    }

    fn catalog() -> GeoCoordinateCatalog {
        GeoCoordinateCatalog::from_coordinates(CODES.iter().enumerate().map(|(i, code)| {
            #[allow(clippy::cast_precision_loss)]
            let offset = i as f64 * 0.01;
            Coordinate {
                location_code: (*code).to_string(),
                latitude: 12.9 + offset,
                longitude: 77.5 + offset,
                district: None,
                state: None,
            }
        }))
    }

    fn enrolment(adults: u64) -> EnrolmentCounts {
        EnrolmentCounts {
            age_0_5: 0,
            age_5_17: 0,
            age_18_plus: adults,
        }
    }

    fn demographic(adults: u64) -> DemographicCounts {
        DemographicCounts {
            age_5_17: 0,
            age_17_plus: adults,
        }
    }

    fn feeds(day_eight_demographic: u64) -> CounterFeeds {
        hub_feeds(10, day_eight_demographic)
    }

    /// Quiet baseline on days 1..=7 for every location, plus the given
    /// day-8 enrolment and demographic totals for the first location.
    fn hub_feeds(day_eight_enrolment: u64, day_eight_demographic: u64) -> CounterFeeds {
        let mut enrolment_rows = Vec::new();
        let mut demographic_rows = Vec::new();
        let mut biometric_rows = Vec::new();
        for day in 1..=8 {
            for code in CODES {
                let hub_day = day == 8 && code == CODES[0];
                let enrol = if hub_day { day_eight_enrolment } else { 10 };
                enrolment_rows.push((key(day, code), enrolment(enrol)));
                let demo = if hub_day { day_eight_demographic } else { 200 };
                demographic_rows.push((key(day, code), demographic(demo)));
                biometric_rows.push((
                    key(day, code),
                    BiometricCounts {
                        age_5_17: 0,
                        age_17_plus: 5,
                    },
                ));
            }
        }
        CounterFeeds {
            enrolment: CounterTable::from_rows(enrolment_rows),
            demographic: CounterTable::from_rows(demographic_rows),
            biometric: CounterTable::from_rows(biometric_rows),
        }
    }

    fn pipeline(day_eight_demographic: u64) -> GovernancePipeline {
        GovernancePipeline::new(PipelineConfig::default(), feeds(day_eight_demographic), catalog())
    }

    fn row<'a>(output: &'a PipelineOutput, day: u32, code: &str) -> &'a ScoredRow {
        let date = NaiveDate::from_ymd_opt(2025, 3, day).unwrap();
        output
            .rows
            .iter()
            .find(|r| r.date() == date && r.location_code() == code)
            .unwrap()
    }

    #[test]
    fn empty_feeds_are_fatal() {
        let pipeline = GovernancePipeline::new(PipelineConfig::default(), CounterFeeds::default(), catalog());
        assert!(matches!(
            pipeline.run_sync(&StageProgress::default()),
            Err(PipelineError::NoCounterData)
        ));
    }

    #[test]
    fn empty_catalog_is_fatal() {
        let pipeline = GovernancePipeline::new(
            PipelineConfig::default(),
            feeds(200),
            GeoCoordinateCatalog::default(),
        );
        assert!(matches!(
            pipeline.run_sync(&StageProgress::default()),
            Err(PipelineError::NoCoordinateData)
        ));
    }

    #[test]
    fn rows_without_coordinates_leave_nothing_to_score() {
        let foreign = GeoCoordinateCatalog::from_coordinates([Coordinate {
            location_code: "999999".to_string(),
            latitude: 1.0,
            longitude: 1.0,
            district: None,
            state: None,
        }]);
        let pipeline = GovernancePipeline::new(PipelineConfig::default(), feeds(200), foreign);
        assert!(matches!(
            pipeline.run_sync(&StageProgress::default()),
            Err(PipelineError::NoScorableRows)
        ));
    }

    #[test]
    fn mass_migration_day_scores_fifty() {
        let output = pipeline(600).run_sync(&StageProgress::default()).unwrap();
        let hot = row(&output, 8, CODES[0]);

        assert!(hot.temporal.mass_migration_flag);
        assert!((hot.risk.risk_score - 50.0).abs() < f64::EPSILON);
        assert_eq!(hot.risk.risk_category, RiskCategory::Medium);

        // Highest risk sorts first.
        assert_eq!(output.rows[0].location_code(), CODES[0]);
        assert_eq!(output.rows[0].date(), hot.date());
    }

    #[test]
    fn enrolment_surge_scores_influx_plus_spike() {
        let pipeline = GovernancePipeline::new(
            PipelineConfig::default(),
            hub_feeds(1_000, 200),
            catalog(),
        );
        let output = pipeline.run_sync(&StageProgress::default()).unwrap();
        let hot = row(&output, 8, CODES[0]);

        // Neighbors all report 10, so the floored std of 1 gives z = 990.
        assert!(hot.spatial.influx_flag);
        assert!(!hot.spatial.ghost_population_flag);
        // 1000 against an inclusive mean of 1060 / 7.
        assert!(hot.temporal.spike_flag);
        assert!(!hot.temporal.mass_migration_flag);

        assert!((hot.risk.risk_score - 50.0).abs() < f64::EPSILON);
        assert_eq!(hot.risk.risk_category, RiskCategory::Medium);
        assert_eq!(output.rows[0].location_code(), CODES[0]);
        assert_eq!(output.summaries[0].location_code, CODES[0]);
        assert!(output.summaries[0].ever_influx);
        assert_eq!(output.summaries[0].spike_days, 1);
    }

    #[test]
    fn raising_demographic_past_threshold_never_lowers_risk() {
        let below = pipeline(450).run_sync(&StageProgress::default()).unwrap();
        let above = pipeline(550).run_sync(&StageProgress::default()).unwrap();

        let before = row(&below, 8, CODES[0]).risk.risk_score;
        let after = row(&above, 8, CODES[0]).risk.risk_score;
        assert!(after >= before);
        assert!(row(&above, 8, CODES[0]).temporal.mass_migration_flag);
    }

    #[test]
    fn every_row_is_bounded() {
        let output = pipeline(5_000).run_sync(&StageProgress::default()).unwrap();
        assert_eq!(output.rows.len(), CODES.len() * 8);

        for row in &output.rows {
            assert!((0.0..=100.0).contains(&row.risk.risk_score));
            for sector in Sector::ALL {
                assert!((0.0..=100.0).contains(&row.sector.indices.get(sector)));
            }
            assert!((0.0..=100.0).contains(&row.sector.governance_risk_score));
            assert!(row.spatial.enrolment.zscore.is_finite());
        }
    }

    #[test]
    fn neighbor_sets_hold_min_of_k_and_n_minus_one() {
        let output = pipeline(200).run_sync(&StageProgress::default()).unwrap();
        assert_eq!(output.neighbors.len(), CODES.len());
        for set in output.neighbors.iter() {
            assert_eq!(set.neighbors.len(), 5);
        }
    }

    #[test]
    fn stats_and_summaries_cover_the_run() {
        let output = pipeline(200).run_sync(&StageProgress::default()).unwrap();
        assert_eq!(output.stats.merged_records, 56);
        assert_eq!(output.stats.scored_rows, 56);
        assert_eq!(output.stats.locations, 7);
        assert_eq!(output.stats.dates, 8);
        assert_eq!(output.stats.first_date, NaiveDate::from_ymd_opt(2025, 3, 1));
        assert_eq!(output.summaries.len(), 7);
        assert_eq!(output.skips, SkipCounts::default());
    }

    #[test]
    fn rerun_is_identical() {
        let pipeline = pipeline(900);
        let first = pipeline.run_sync(&StageProgress::default()).unwrap();
        let second = pipeline.run_sync(&StageProgress::default()).unwrap();
        assert_eq!(first.rows, second.rows);
        assert_eq!(first.summaries, second.summaries);
    }

    #[tokio::test]
    async fn concurrent_run_matches_sequential_run() {
        let pipeline = pipeline(900);
        let concurrent = pipeline.run(&StageProgress::default()).await.unwrap();
        let sequential = pipeline.run_sync(&StageProgress::default()).unwrap();
        assert_eq!(concurrent.rows, sequential.rows);
        assert_eq!(concurrent.summaries, sequential.summaries);
        assert_eq!(concurrent.stats, sequential.stats);
    }
}
