//! Group-sum of merged records into one [`DailyAggregate`] per
//! (date, location code).

use std::collections::BTreeMap;

use chrono::NaiveDate;
use pulse_records_models::{
    BiometricCounts, DailyAggregate, DemographicCounts, EnrolmentCounts, UpdateRecord,
};
use pulse_spatial::GeoCoordinateCatalog;

/// Daily aggregates plus the rows that could not take part.
#[derive(Debug, Clone, Default)]
pub struct DailyTable {
    /// Aggregates sorted by (date, location code).
    pub rows: Vec<DailyAggregate>,
    /// Records dropped because their date was unknown.
    pub unknown_dates: u64,
    /// Records dropped because their location has no catalog coordinate.
    pub missing_coordinates: u64,
}

/// Sums age buckets per (date, location code).
///
/// State and district come from the first record seen for the key (records
/// arrive in merge-key order); latitude and longitude come from the
/// catalog. Records without a parsed date or without a catalog coordinate
/// are excluded.
#[must_use]
pub fn aggregate_daily(records: &[UpdateRecord], catalog: &GeoCoordinateCatalog) -> DailyTable {
    let mut groups: BTreeMap<(NaiveDate, &str), DailyAggregate> = BTreeMap::new();
    let mut table = DailyTable::default();

    for record in records {
        let Some(date) = record.date else {
            table.unknown_dates += 1;
            continue;
        };
        let Some(coordinate) = catalog.get(&record.location_code) else {
            table.missing_coordinates += 1;
            continue;
        };

        let aggregate = groups
            .entry((date, record.location_code.as_str()))
            .or_insert_with(|| DailyAggregate {
                date,
                location_code: record.location_code.clone(),
                state: record.state.clone(),
                district: record.district.clone(),
                latitude: coordinate.latitude,
                longitude: coordinate.longitude,
                enrolment: EnrolmentCounts::default(),
                demographic: DemographicCounts::default(),
                biometric: BiometricCounts::default(),
            });

        aggregate.enrolment += record.enrolment;
        aggregate.demographic += record.demographic;
        aggregate.biometric += record.biometric;
    }

    if table.missing_coordinates > 0 {
        log::warn!(
            "{} records dropped: location code has no catalog coordinate",
            table.missing_coordinates
        );
    }

    table.rows = groups.into_values().collect();
    log::info!(
        "Aggregated {} daily (date, location) rows",
        table.rows.len()
    );

    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulse_records_models::Coordinate;

    fn catalog() -> GeoCoordinateCatalog {
        GeoCoordinateCatalog::from_coordinates([Coordinate {
            location_code: "560001".to_string(),
            latitude: 12.97,
            longitude: 77.59,
            district: None,
            state: None,
        }])
    }

    fn record(date: Option<NaiveDate>, district: &str, code: &str, enrolled: u64) -> UpdateRecord {
        UpdateRecord {
            date,
            state: "Karnataka".to_string(),
            district: district.to_string(),
            location_code: code.to_string(),
            enrolment: EnrolmentCounts {
                age_0_5: enrolled,
                age_5_17: 0,
                age_18_plus: 0,
            },
            demographic: DemographicCounts {
                age_5_17: 1,
                age_17_plus: 1,
            },
            biometric: Default::default(),
        }
    }

    #[test]
    fn sums_records_sharing_date_and_location() {
        let day = NaiveDate::from_ymd_opt(2025, 5, 1);
        let records = vec![
            record(day, "Bangalore Urban", "560001", 3),
            record(day, "Bengaluru", "560001", 4),
        ];

        let table = aggregate_daily(&records, &catalog());
        assert_eq!(table.rows.len(), 1);

        let row = &table.rows[0];
        assert_eq!(row.total_enrolment(), 7);
        assert_eq!(row.total_demographic(), 4);
        assert_eq!(row.district, "Bangalore Urban");
        assert!((row.latitude - 12.97).abs() < 1e-9);
    }

    #[test]
    fn excludes_unknown_dates_and_missing_coordinates() {
        let day = NaiveDate::from_ymd_opt(2025, 5, 1);
        let records = vec![
            record(None, "Bengaluru", "560001", 1),
            record(day, "Elsewhere", "999999", 1),
            record(day, "Bengaluru", "560001", 1),
        ];

        let table = aggregate_daily(&records, &catalog());
        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.unknown_dates, 1);
        assert_eq!(table.missing_coordinates, 1);
    }

    #[test]
    fn rows_are_sorted_by_date_then_location() {
        let catalog = GeoCoordinateCatalog::from_coordinates(["b", "a"].map(|code| Coordinate {
            location_code: code.to_string(),
            latitude: 1.0,
            longitude: 1.0,
            district: None,
            state: None,
        }));
        let d1 = NaiveDate::from_ymd_opt(2025, 5, 1);
        let d2 = NaiveDate::from_ymd_opt(2025, 5, 2);
        let records = vec![
            record(d2, "x", "a", 1),
            record(d1, "x", "b", 1),
            record(d1, "x", "a", 1),
        ];

        let table = aggregate_daily(&records, &catalog);
        let keys: Vec<_> = table
            .rows
            .iter()
            .map(|r| (r.date, r.location_code.as_str()))
            .collect();
        assert_eq!(
            keys,
            vec![(d1.unwrap(), "a"), (d1.unwrap(), "b"), (d2.unwrap(), "a")]
        );
    }
}
