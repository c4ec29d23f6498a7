//! Static location-code → coordinate catalog.
//!
//! Rows arrive with textual coordinates straight from the source file.
//! Unparsable or out-of-range positions are dropped, and the first row seen
//! for a location code wins over any later duplicates.

use std::collections::{BTreeMap, BTreeSet};

use pulse_records_models::Coordinate;

/// A catalog row before validation.
#[derive(Debug, Clone, Default)]
pub struct RawCoordinate {
    /// Postal location code.
    pub location_code: String,
    /// Latitude text (may be `NA`, empty, or garbage).
    pub latitude: Option<String>,
    /// Longitude text.
    pub longitude: Option<String>,
    /// District name.
    pub district: Option<String>,
    /// State name.
    pub state: Option<String>,
}

/// Counts of rows accepted and dropped while building a catalog.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CatalogStats {
    /// Rows kept.
    pub accepted: u64,
    /// Rows dropped because a coordinate was missing, unparsable, or out of
    /// range.
    pub invalid_coordinates: u64,
    /// Rows dropped because the location code was already present.
    pub duplicates: u64,
}

/// Validated, deduplicated coordinates keyed by location code.
///
/// Iteration order is first-seen order, which makes everything built on
/// top of the catalog deterministic for a fixed input file.
#[derive(Debug, Clone, Default)]
pub struct GeoCoordinateCatalog {
    entries: Vec<Coordinate>,
    by_code: BTreeMap<String, usize>,
    stats: CatalogStats,
}

impl GeoCoordinateCatalog {
    /// Builds a catalog from raw rows, validating and deduplicating.
    #[must_use]
    pub fn from_raw(rows: impl IntoIterator<Item = RawCoordinate>) -> Self {
        let mut catalog = Self::default();

        for row in rows {
            let code = row.location_code.trim();
            if code.is_empty() {
                catalog.stats.invalid_coordinates += 1;
                continue;
            }

            let Some((latitude, longitude)) =
                parse_coordinate(row.latitude.as_deref(), row.longitude.as_deref())
            else {
                catalog.stats.invalid_coordinates += 1;
                continue;
            };

            catalog.insert(Coordinate {
                location_code: code.to_string(),
                latitude,
                longitude,
                district: non_empty(row.district),
                state: non_empty(row.state),
            });
        }

        if catalog.stats.invalid_coordinates > 0 || catalog.stats.duplicates > 0 {
            log::warn!(
                "Coordinate catalog: dropped {} rows with invalid coordinates and {} duplicate codes",
                catalog.stats.invalid_coordinates,
                catalog.stats.duplicates
            );
        }
        log::info!("Coordinate catalog holds {} locations", catalog.len());

        catalog
    }

    /// Builds a catalog from already-parsed coordinates, applying the same
    /// range check and first-seen deduplication as [`Self::from_raw`].
    #[must_use]
    pub fn from_coordinates(coordinates: impl IntoIterator<Item = Coordinate>) -> Self {
        let mut catalog = Self::default();
        for coordinate in coordinates {
            if is_valid_position(coordinate.latitude, coordinate.longitude) {
                catalog.insert(coordinate);
            } else {
                catalog.stats.invalid_coordinates += 1;
            }
        }
        catalog
    }

    fn insert(&mut self, coordinate: Coordinate) {
        if self.by_code.contains_key(&coordinate.location_code) {
            self.stats.duplicates += 1;
            return;
        }
        self.by_code
            .insert(coordinate.location_code.clone(), self.entries.len());
        self.entries.push(coordinate);
        self.stats.accepted += 1;
    }

    /// Returns a catalog holding only the given location codes, in the
    /// original first-seen order.
    #[must_use]
    pub fn restricted_to(&self, codes: &BTreeSet<&str>) -> Self {
        Self::from_coordinates(
            self.entries
                .iter()
                .filter(|c| codes.contains(c.location_code.as_str()))
                .cloned(),
        )
    }

    /// Looks up the coordinate of a location code.
    #[must_use]
    pub fn get(&self, location_code: &str) -> Option<&Coordinate> {
        self.by_code
            .get(location_code)
            .and_then(|&i| self.entries.get(i))
    }

    /// Number of distinct locations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the catalog has no locations.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates coordinates in first-seen order.
    pub fn iter(&self) -> impl Iterator<Item = &Coordinate> {
        self.entries.iter()
    }

    /// Build statistics.
    #[must_use]
    pub const fn stats(&self) -> CatalogStats {
        self.stats
    }
}

/// Parses a latitude/longitude pair of text cells.
///
/// Returns `None` if either is missing, not a finite number, or outside
/// the valid WGS84 range.
#[must_use]
pub fn parse_coordinate(latitude: Option<&str>, longitude: Option<&str>) -> Option<(f64, f64)> {
    let latitude = latitude?.trim().parse::<f64>().ok()?;
    let longitude = longitude?.trim().parse::<f64>().ok()?;
    is_valid_position(latitude, longitude).then_some((latitude, longitude))
}

fn is_valid_position(latitude: f64, longitude: f64) -> bool {
    latitude.is_finite()
        && longitude.is_finite()
        && (-90.0..=90.0).contains(&latitude)
        && (-180.0..=180.0).contains(&longitude)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(code: &str, lat: &str, lng: &str) -> RawCoordinate {
        RawCoordinate {
            location_code: code.to_string(),
            latitude: Some(lat.to_string()),
            longitude: Some(lng.to_string()),
            district: Some("Pune".to_string()),
            state: Some("Maharashtra".to_string()),
        }
    }

    #[test]
    fn first_seen_duplicate_wins() {
        let catalog = GeoCoordinateCatalog::from_raw([
            raw("411001", "18.52", "73.85"),
            raw("411001", "19.00", "74.00"),
        ]);

        assert_eq!(catalog.len(), 1);
        let coordinate = catalog.get("411001").unwrap();
        assert!((coordinate.latitude - 18.52).abs() < 1e-9);
        assert_eq!(catalog.stats().duplicates, 1);
    }

    #[test]
    fn drops_unparsable_and_out_of_range_coordinates() {
        let catalog = GeoCoordinateCatalog::from_raw([
            raw("1", "NA", "73.85"),
            raw("2", "18.52", ""),
            raw("3", "95.0", "73.85"),
            raw("4", "18.52", "-181"),
            raw("5", " 18.52 ", "73.85"),
        ]);

        assert_eq!(catalog.len(), 1);
        assert!(catalog.get("5").is_some());
        assert_eq!(catalog.stats().invalid_coordinates, 4);
    }

    #[test]
    fn invalid_row_does_not_shadow_later_valid_row() {
        let catalog =
            GeoCoordinateCatalog::from_raw([raw("7", "NA", "NA"), raw("7", "10.0", "20.0")]);
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.stats().duplicates, 0);
    }

    #[test]
    fn restriction_keeps_first_seen_order() {
        let catalog = GeoCoordinateCatalog::from_raw([
            raw("c", "1.0", "1.0"),
            raw("a", "2.0", "2.0"),
            raw("b", "3.0", "3.0"),
        ]);
        let keep: BTreeSet<&str> = ["b", "c"].into_iter().collect();
        let restricted = catalog.restricted_to(&keep);

        let codes: Vec<&str> = restricted
            .iter()
            .map(|c| c.location_code.as_str())
            .collect();
        assert_eq!(codes, vec!["c", "b"]);
    }

    #[test]
    fn blank_district_becomes_none() {
        let mut row = raw("9", "1.0", "1.0");
        row.district = Some("   ".to_string());
        let catalog = GeoCoordinateCatalog::from_raw([row]);
        assert!(catalog.get("9").unwrap().district.is_none());
    }
}
