#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Anomaly scoring engine for identity-update activity.
//!
//! Scores every (date, location) aggregate twice, once against the
//! location's geographic neighbors on the same date
//! ([`spatial::SpatialAnomalyScorer`]) and once against its own recent
//! history ([`temporal::TemporalAnomalyScorer`]). The resulting flags are
//! composed into a bounded risk score ([`risk::RiskComposer`]) and five
//! sector governance indices ([`sector::SectorMetricEngine`]).
//! [`pipeline::GovernancePipeline`] runs the stages end to end.

pub mod pipeline;
pub mod rank;
pub mod risk;
pub mod sector;
pub mod spatial;
pub mod summary;
pub mod temporal;

use thiserror::Error;

pub use pipeline::{GovernancePipeline, PipelineOutput, RunStats, StageProgress};

/// Conditions that stop a pipeline run before any output is produced.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// None of the three counter feeds yielded a row.
    #[error("No counter rows were loaded from any feed")]
    NoCounterData,

    /// The coordinate catalog holds no valid entry.
    #[error("The coordinate catalog has no valid coordinates")]
    NoCoordinateData,

    /// Every merged record lacked a parsable date or a catalog coordinate.
    #[error("No scorable rows: every record lacked a valid date or a catalog coordinate")]
    NoScorableRows,

    /// A scoring worker panicked or was cancelled.
    #[error("Scoring task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}
