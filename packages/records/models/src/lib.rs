#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Identity-update counter types shared across the pulse toolchain.
//!
//! Three raw counter streams (new enrolments, demographic/address
//! changes, biometric updates) are keyed by date, state, district, and
//! location code. This crate defines the merged [`UpdateRecord`], the
//! per-day [`DailyAggregate`] that every scorer consumes, and the
//! [`Coordinate`] rows of the location catalog. It has no I/O.

use std::ops::AddAssign;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Join key shared by the three raw counter streams.
///
/// The date is kept as the verbatim source text: the streams are joined
/// before any date parsing happens.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CounterKey {
    /// Raw date text (day-month-year in the source feeds).
    pub date: String,
    /// State name.
    pub state: String,
    /// District name.
    pub district: String,
    /// Postal location code.
    pub location_code: String,
}

/// New-enrolment counts split by age bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrolmentCounts {
    /// Children aged 0-5.
    pub age_0_5: u64,
    /// Children aged 5-17.
    pub age_5_17: u64,
    /// Adults aged 18 and over.
    pub age_18_plus: u64,
}

impl EnrolmentCounts {
    /// Sum across all age buckets.
    #[must_use]
    pub const fn total(&self) -> u64 {
        self.age_0_5
            .saturating_add(self.age_5_17)
            .saturating_add(self.age_18_plus)
    }

    /// Enrolments in the two child buckets.
    #[must_use]
    pub const fn children(&self) -> u64 {
        self.age_0_5.saturating_add(self.age_5_17)
    }
}

impl AddAssign for EnrolmentCounts {
    fn add_assign(&mut self, rhs: Self) {
        self.age_0_5 = self.age_0_5.saturating_add(rhs.age_0_5);
        self.age_5_17 = self.age_5_17.saturating_add(rhs.age_5_17);
        self.age_18_plus = self.age_18_plus.saturating_add(rhs.age_18_plus);
    }
}

/// Demographic (address-change) update counts split by age bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DemographicCounts {
    /// Residents aged 5-17.
    pub age_5_17: u64,
    /// Residents aged 17 and over.
    pub age_17_plus: u64,
}

impl DemographicCounts {
    /// Sum across both age buckets.
    #[must_use]
    pub const fn total(&self) -> u64 {
        self.age_5_17.saturating_add(self.age_17_plus)
    }
}

impl AddAssign for DemographicCounts {
    fn add_assign(&mut self, rhs: Self) {
        self.age_5_17 = self.age_5_17.saturating_add(rhs.age_5_17);
        self.age_17_plus = self.age_17_plus.saturating_add(rhs.age_17_plus);
    }
}

/// Biometric update counts split by age bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BiometricCounts {
    /// Residents aged 5-17.
    pub age_5_17: u64,
    /// Residents aged 17 and over.
    pub age_17_plus: u64,
}

impl BiometricCounts {
    /// Sum across both age buckets.
    #[must_use]
    pub const fn total(&self) -> u64 {
        self.age_5_17.saturating_add(self.age_17_plus)
    }
}

impl AddAssign for BiometricCounts {
    fn add_assign(&mut self, rhs: Self) {
        self.age_5_17 = self.age_5_17.saturating_add(rhs.age_5_17);
        self.age_17_plus = self.age_17_plus.saturating_add(rhs.age_17_plus);
    }
}

/// One of the three measured totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Measure {
    /// New enrolments.
    Enrolment,
    /// Demographic (address) changes.
    Demographic,
    /// Biometric updates.
    Biometric,
}

impl Measure {
    /// All measures in canonical order.
    pub const ALL: [Self; 3] = [Self::Enrolment, Self::Demographic, Self::Biometric];

    /// Position of this measure in [`Self::ALL`].
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }
}

impl std::fmt::Display for Measure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Enrolment => write!(f, "enrolment"),
            Self::Demographic => write!(f, "demographic"),
            Self::Biometric => write!(f, "biometric"),
        }
    }
}

/// A merged counter row for one (date, state, district, location) key.
///
/// Counters absent from a source stream are zero. Immutable once built by
/// the merger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRecord {
    /// Parsed date, `None` when the source text was not a valid
    /// day-month-year date. Such rows never reach scoring.
    pub date: Option<NaiveDate>,
    /// State name.
    pub state: String,
    /// District name.
    pub district: String,
    /// Postal location code.
    pub location_code: String,
    /// New-enrolment counters.
    pub enrolment: EnrolmentCounts,
    /// Demographic-change counters.
    pub demographic: DemographicCounts,
    /// Biometric-update counters.
    pub biometric: BiometricCounts,
}

impl UpdateRecord {
    /// Total of the given measure across its age buckets.
    #[must_use]
    pub const fn total(&self, measure: Measure) -> u64 {
        match measure {
            Measure::Enrolment => self.enrolment.total(),
            Measure::Demographic => self.demographic.total(),
            Measure::Biometric => self.biometric.total(),
        }
    }
}

/// Per-day, per-location totals: the unit every scorer works on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyAggregate {
    /// Calendar date.
    pub date: NaiveDate,
    /// Postal location code.
    pub location_code: String,
    /// First-seen state name for this key.
    pub state: String,
    /// First-seen district name for this key.
    pub district: String,
    /// Catalog latitude in degrees.
    pub latitude: f64,
    /// Catalog longitude in degrees.
    pub longitude: f64,
    /// Summed enrolment buckets.
    pub enrolment: EnrolmentCounts,
    /// Summed demographic buckets.
    pub demographic: DemographicCounts,
    /// Summed biometric buckets.
    pub biometric: BiometricCounts,
}

impl DailyAggregate {
    /// Total of the given measure.
    #[must_use]
    pub const fn total(&self, measure: Measure) -> u64 {
        match measure {
            Measure::Enrolment => self.enrolment.total(),
            Measure::Demographic => self.demographic.total(),
            Measure::Biometric => self.biometric.total(),
        }
    }

    /// `total_enrolment`.
    #[must_use]
    pub const fn total_enrolment(&self) -> u64 {
        self.enrolment.total()
    }

    /// `total_demographic`.
    #[must_use]
    pub const fn total_demographic(&self) -> u64 {
        self.demographic.total()
    }

    /// `total_biometric`.
    #[must_use]
    pub const fn total_biometric(&self) -> u64 {
        self.biometric.total()
    }

    /// All three totals as floats, indexed by [`Measure::index`].
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn totals(&self) -> [f64; 3] {
        [
            self.enrolment.total() as f64,
            self.demographic.total() as f64,
            self.biometric.total() as f64,
        ]
    }
}

/// A validated catalog position for one location code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Coordinate {
    /// Postal location code.
    pub location_code: String,
    /// Latitude in degrees, within `[-90, 90]`.
    pub latitude: f64,
    /// Longitude in degrees, within `[-180, 180]`.
    pub longitude: f64,
    /// District name from the catalog, if present.
    pub district: Option<String>,
    /// State name from the catalog, if present.
    pub state: Option<String>,
}
