//! Outer join of the three counter feeds into [`UpdateRecord`]s.
//!
//! Keys are matched on the verbatim `(date, state, district, pincode)`
//! text. A key missing from a feed gets zero counters for that feed. Dates
//! are parsed only after the join; rows whose date text is not a valid
//! day-month-year date keep a `None` date and are counted.

use std::collections::BTreeSet;

use pulse_records_models::{
    BiometricCounts, CounterKey, DemographicCounts, EnrolmentCounts, UpdateRecord,
};

use crate::parsing::parse_date;
use crate::streams::CounterTable;

/// Result of merging the three feeds.
#[derive(Debug, Clone, Default)]
pub struct MergeOutput {
    /// One record per distinct key across all feeds, in key order.
    pub records: Vec<UpdateRecord>,
    /// Records whose date text failed to parse.
    pub unparsable_dates: u64,
}

/// Joins enrolment, demographic, and biometric tables on their shared key.
#[derive(Debug, Clone, Copy, Default)]
pub struct UpdateRecordMerger;

impl UpdateRecordMerger {
    /// Performs the outer join, zero-filling absent counters.
    #[must_use]
    pub fn merge(
        enrolment: &CounterTable<EnrolmentCounts>,
        demographic: &CounterTable<DemographicCounts>,
        biometric: &CounterTable<BiometricCounts>,
    ) -> MergeOutput {
        let keys: BTreeSet<&CounterKey> = enrolment
            .rows
            .keys()
            .chain(demographic.rows.keys())
            .chain(biometric.rows.keys())
            .collect();

        let mut output = MergeOutput {
            records: Vec::with_capacity(keys.len()),
            unparsable_dates: 0,
        };

        for key in keys {
            let date = parse_date(&key.date);
            if date.is_none() {
                output.unparsable_dates += 1;
            }

            output.records.push(UpdateRecord {
                date,
                state: key.state.clone(),
                district: key.district.clone(),
                location_code: key.location_code.clone(),
                enrolment: enrolment.rows.get(key).copied().unwrap_or_default(),
                demographic: demographic.rows.get(key).copied().unwrap_or_default(),
                biometric: biometric.rows.get(key).copied().unwrap_or_default(),
            });
        }

        if output.unparsable_dates > 0 {
            log::warn!(
                "{} merged records have an unparsable date and will not be scored",
                output.unparsable_dates
            );
        }
        log::info!("Merged counter feeds into {} records", output.records.len());

        output
    }
}
