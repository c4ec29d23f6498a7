//! Tunable thresholds and weights for the scoring pipeline.
//!
//! Every field has a default matching the production constants, so an
//! empty TOML document (or no file at all) yields the standard run. Keys
//! omitted from a file fall back to their defaults individually.

use serde::{Deserialize, Serialize};

/// Complete pipeline configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Neighbor graph settings.
    pub neighbors: NeighborConfig,
    /// Neighbor-relative scoring thresholds.
    pub spatial: SpatialConfig,
    /// Self-history scoring settings.
    pub temporal: TemporalConfig,
    /// Composite risk weights.
    pub risk: RiskWeights,
    /// Sector composite weights.
    pub sector: SectorConfig,
    /// Artifact settings.
    pub output: OutputConfig,
}

impl PipelineConfig {
    /// Parses a TOML document, defaulting anything it omits.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is not valid TOML or a value has
    /// the wrong type.
    pub fn from_toml_str(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Renders the configuration as TOML.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

/// Neighbor graph settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NeighborConfig {
    /// Neighbors per location.
    pub k: usize,
}

impl Default for NeighborConfig {
    fn default() -> Self {
        Self { k: 5 }
    }
}

/// Thresholds for the neighbor-relative stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpatialConfig {
    /// Enrolment z-score above which `influx_flag` is raised.
    pub influx_zscore: f64,
    /// Demographic z-score above which a ghost-population pattern starts.
    pub ghost_demographic_zscore: f64,
    /// Biometric z-score below which a ghost-population pattern completes.
    pub ghost_biometric_zscore: f64,
    /// Floor applied to the neighbor standard deviation before dividing.
    pub min_std: f64,
}

impl Default for SpatialConfig {
    fn default() -> Self {
        Self {
            influx_zscore: 2.5,
            ghost_demographic_zscore: 1.5,
            ghost_biometric_zscore: -1.5,
            min_std: 1.0,
        }
    }
}

/// Settings for the self-history stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemporalConfig {
    /// Rolling window length in observations.
    pub window: usize,
    /// Observations required before a rolling mean is defined.
    pub min_periods: usize,
    /// Added to the rolling mean before dividing.
    pub epsilon: f64,
    /// Spike ratio above which a series spikes.
    pub spike_ratio: f64,
    /// Daily demographic total above which a mass-migration alert fires.
    pub mass_migration_demographic: u64,
    /// Whether the rolling window includes the day being scored.
    ///
    /// `true` reproduces the historical (inclusive) baseline. `false`
    /// scores each day against the preceding `window` observations only.
    pub include_current_day: bool,
}

impl Default for TemporalConfig {
    fn default() -> Self {
        Self {
            window: 7,
            min_periods: 1,
            epsilon: 0.1,
            spike_ratio: 3.0,
            mass_migration_demographic: 500,
            include_current_day: true,
        }
    }
}

/// Points contributed by each flag to the composite risk score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskWeights {
    /// Spatial enrolment influx.
    pub influx: f64,
    /// Temporal spike.
    pub spike: f64,
    /// Absolute mass-migration alert.
    pub mass_migration: f64,
    /// Ghost-population pattern.
    pub ghost_population: f64,
}

impl Default for RiskWeights {
    fn default() -> Self {
        Self {
            influx: 20.0,
            spike: 30.0,
            mass_migration: 50.0,
            ghost_population: 15.0,
        }
    }
}

/// Sector composite settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SectorConfig {
    /// Weights of the five sector indices in the governance score.
    pub composite_weights: SectorWeights,
}

/// One weight per sector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SectorWeights {
    /// Education.
    pub education: f64,
    /// Hunger.
    pub hunger: f64,
    /// Rural hollow-out.
    pub rural: f64,
    /// Electoral discrepancy.
    pub electoral: f64,
    /// Labor migration.
    pub labor: f64,
}

impl Default for SectorWeights {
    fn default() -> Self {
        Self {
            education: 0.20,
            hunger: 0.20,
            rural: 0.15,
            electoral: 0.25,
            labor: 0.20,
        }
    }
}

impl SectorWeights {
    /// Sum of all weights.
    #[must_use]
    pub fn total(&self) -> f64 {
        self.education + self.hunger + self.rural + self.electoral + self.labor
    }
}

/// Artifact settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Governance score above which a row lands in the alerts file.
    pub alert_threshold: f64,
    /// Locations listed per sector priority file.
    pub priority_limit: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            alert_threshold: 60.0,
            priority_limit: 50,
        }
    }
}
