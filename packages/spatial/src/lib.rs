#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! In-memory geographic neighbor graph for location codes.
//!
//! Projects every catalog coordinate onto the unit sphere, bulk-loads the
//! points into an R-tree, and answers a k-nearest-neighbor query per
//! location by searching growing boxes around it. Straight-line (chord)
//! distance on the unit sphere is a monotone function of great-circle
//! distance, so a ball in 3-D space is a spherical cap on the globe.
//! Neighbors are ranked and reported by haversine kilometres.
//!
//! The graph is built once and is read-only afterwards, so it can be shared
//! across scoring workers behind an `Arc`.

pub mod catalog;

use std::collections::BTreeMap;

use rstar::{AABB, RTree, RTreeObject};

pub use catalog::{CatalogStats, GeoCoordinateCatalog, RawCoordinate};

/// Mean Earth radius (IUGG) in kilometres.
pub const EARTH_RADIUS_KM: f64 = 6_371.008_8;

/// Default number of neighbors per location.
pub const DEFAULT_NEIGHBOR_COUNT: usize = 5;

/// Starting half-width of the search box on the unit sphere (~6 km).
const INITIAL_SEARCH_RADIUS: f64 = 0.001;

/// Chord length spanning the whole unit sphere.
const MAX_CHORD: f64 = 2.0;

/// A catalog point stored in the R-tree, tagged with its catalog slot.
#[derive(Debug, Clone, Copy)]
struct SpherePoint {
    position: [f64; 3],
    slot: usize,
}

impl RTreeObject for SpherePoint {
    type Envelope = AABB<[f64; 3]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.position)
    }
}

/// One neighbor of a location.
#[derive(Debug, Clone, PartialEq)]
pub struct Neighbor {
    /// The neighbor's location code.
    pub location_code: String,
    /// Great-circle distance in kilometres.
    pub distance_km: f64,
}

/// The nearest neighbors of one location, closest first.
#[derive(Debug, Clone, PartialEq)]
pub struct NeighborSet {
    /// The location the set belongs to.
    pub location_code: String,
    /// Neighbors ordered by ascending distance (ties by catalog order).
    pub neighbors: Vec<Neighbor>,
}

impl NeighborSet {
    /// Neighbor location codes in distance order.
    pub fn codes(&self) -> impl Iterator<Item = &str> {
        self.neighbors.iter().map(|n| n.location_code.as_str())
    }
}

/// Pre-built k-nearest-neighbor graph over a coordinate catalog.
///
/// Every location holds exactly `min(k, N - 1)` neighbors, where `N` is the
/// number of catalog locations. A location is never its own neighbor, even
/// when another code shares its exact position.
#[derive(Debug, Clone, Default)]
pub struct GeoNeighborIndex {
    k: usize,
    sets: BTreeMap<String, NeighborSet>,
}

impl GeoNeighborIndex {
    /// Builds the neighbor graph for every location in `catalog`.
    #[must_use]
    pub fn build(catalog: &GeoCoordinateCatalog, k: usize) -> Self {
        let coordinates: Vec<_> = catalog.iter().collect();
        let points: Vec<SpherePoint> = coordinates
            .iter()
            .enumerate()
            .map(|(slot, c)| SpherePoint {
                position: unit_vector(c.latitude, c.longitude),
                slot,
            })
            .collect();

        let tree = RTree::bulk_load(points.clone());
        let want = k.min(points.len().saturating_sub(1));

        let mut sets = BTreeMap::new();
        for point in &points {
            let origin = coordinates[point.slot];
            let mut candidates: Vec<(f64, usize)> = Vec::with_capacity(want + 1);

            if want > 0 {
                for (_, slot) in nearest_within_ball(&tree, point, want) {
                    let target = coordinates[slot];
                    candidates.push((
                        haversine_km(
                            origin.latitude,
                            origin.longitude,
                            target.latitude,
                            target.longitude,
                        ),
                        slot,
                    ));
                }
            }

            candidates.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
            candidates.truncate(want);

            let neighbors = candidates
                .into_iter()
                .map(|(distance_km, slot)| Neighbor {
                    location_code: coordinates[slot].location_code.clone(),
                    distance_km,
                })
                .collect();

            sets.insert(
                origin.location_code.clone(),
                NeighborSet {
                    location_code: origin.location_code.clone(),
                    neighbors,
                },
            );
        }

        log::info!(
            "Built neighbor graph for {} locations ({} neighbors each)",
            sets.len(),
            want
        );

        Self { k, sets }
    }

    /// The requested neighbor count.
    #[must_use]
    pub const fn k(&self) -> usize {
        self.k
    }

    /// Looks up the neighbor set of a location.
    #[must_use]
    pub fn neighbors_of(&self, location_code: &str) -> Option<&NeighborSet> {
        self.sets.get(location_code)
    }

    /// Number of locations in the graph.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sets.len()
    }

    /// Whether the graph is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    /// Iterates neighbor sets ordered by location code.
    pub fn iter(&self) -> impl Iterator<Item = &NeighborSet> {
        self.sets.values()
    }
}

/// Collects every other point inside a ball around `origin` that holds at
/// least `want` points, growing the ball until it does.
///
/// Each round queries the R-tree with the ball's bounding box and keeps
/// only hits inside the ball itself. Once `want` hits are inside, every
/// point at or below the k-th distance (ties included) has been seen.
fn nearest_within_ball(
    tree: &RTree<SpherePoint>,
    origin: &SpherePoint,
    want: usize,
) -> Vec<(f64, usize)> {
    let mut radius = INITIAL_SEARCH_RADIUS;
    loop {
        let [x, y, z] = origin.position;
        let envelope = AABB::from_corners(
            [x - radius, y - radius, z - radius],
            [x + radius, y + radius, z + radius],
        );
        let radius_2 = radius * radius;

        let hits: Vec<(f64, usize)> = tree
            .locate_in_envelope_intersecting(&envelope)
            .filter(|other| other.slot != origin.slot)
            .map(|other| (chord_2(&origin.position, &other.position), other.slot))
            .filter(|(distance_2, _)| *distance_2 <= radius_2)
            .collect();

        if hits.len() >= want || radius >= MAX_CHORD {
            return hits;
        }
        radius *= 2.0;
    }
}

fn chord_2(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    let dx = a[0] - b[0];
    let dy = a[1] - b[1];
    let dz = a[2] - b[2];
    dx.mul_add(dx, dy.mul_add(dy, dz * dz))
}

/// Great-circle distance between two WGS84 positions, in kilometres.
#[must_use]
pub fn haversine_km(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let half_dphi = (phi2 - phi1) / 2.0;
    let half_dlambda = (lng2 - lng1).to_radians() / 2.0;

    let a = (phi1.cos() * phi2.cos()).mul_add(
        half_dlambda.sin().powi(2),
        half_dphi.sin().powi(2),
    );
    2.0 * EARTH_RADIUS_KM * a.clamp(0.0, 1.0).sqrt().asin()
}

fn unit_vector(latitude: f64, longitude: f64) -> [f64; 3] {
    let phi = latitude.to_radians();
    let lambda = longitude.to_radians();
    [
        phi.cos() * lambda.cos(),
        phi.cos() * lambda.sin(),
        phi.sin(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulse_records_models::Coordinate;

    fn coordinate(code: &str, latitude: f64, longitude: f64) -> Coordinate {
        Coordinate {
            location_code: code.to_string(),
            latitude,
            longitude,
            district: None,
            state: None,
        }
    }

    fn line_catalog(n: usize) -> GeoCoordinateCatalog {
        GeoCoordinateCatalog::from_coordinates((0..n).map(|i| {
            #[allow(clippy::cast_precision_loss)]
            let offset = i as f64 * 0.01;
            coordinate(&format!("{:06}", 400_000 + i), 19.0 + offset, 73.0)
        }))
    }

    #[test]
    fn one_degree_of_latitude_is_about_111_km() {
        let d = haversine_km(10.0, 76.0, 11.0, 76.0);
        assert!((d - 111.195).abs() < 0.01, "got {d}");
    }

    #[test]
    fn haversine_is_symmetric_and_zero_on_identity() {
        let a = haversine_km(28.61, 77.21, 19.08, 72.88);
        let b = haversine_km(19.08, 72.88, 28.61, 77.21);
        assert!((a - b).abs() < 1e-9);
        assert!(haversine_km(28.61, 77.21, 28.61, 77.21).abs() < 1e-12);
        // Delhi to Mumbai is roughly 1,150 km.
        assert!((1_100.0..1_200.0).contains(&a), "got {a}");
    }

    #[test]
    fn every_set_has_min_k_or_n_minus_one_entries() {
        for n in [1, 2, 3, 6, 10] {
            let index = GeoNeighborIndex::build(&line_catalog(n), DEFAULT_NEIGHBOR_COUNT);
            assert_eq!(index.len(), n);
            for set in index.iter() {
                assert_eq!(
                    set.neighbors.len(),
                    DEFAULT_NEIGHBOR_COUNT.min(n - 1),
                    "n = {n}, location {}",
                    set.location_code
                );
            }
        }
    }

    #[test]
    fn location_is_never_its_own_neighbor() {
        let catalog = GeoCoordinateCatalog::from_coordinates([
            coordinate("a", 12.0, 77.0),
            coordinate("b", 12.0, 77.0),
            coordinate("c", 12.5, 77.0),
        ]);
        let index = GeoNeighborIndex::build(&catalog, 5);

        for set in index.iter() {
            assert!(set.codes().all(|code| code != set.location_code));
        }
        let a = index.neighbors_of("a").unwrap();
        assert_eq!(a.codes().collect::<Vec<_>>(), vec!["b", "c"]);
        assert!(a.neighbors[0].distance_km.abs() < 1e-9);
    }

    #[test]
    fn neighbors_are_closest_first() {
        let index = GeoNeighborIndex::build(&line_catalog(10), 5);
        let set = index.neighbors_of("400000").unwrap();

        assert_eq!(
            set.codes().collect::<Vec<_>>(),
            vec!["400001", "400002", "400003", "400004", "400005"]
        );
        assert!(
            set.neighbors
                .windows(2)
                .all(|w| w[0].distance_km <= w[1].distance_km)
        );
    }

    #[test]
    fn equidistant_neighbors_resolve_by_catalog_order() {
        // Four points at equal distance north/south/east/west of the origin
        // on the equator, plus the origin itself.
        let catalog = GeoCoordinateCatalog::from_coordinates([
            coordinate("origin", 0.0, 0.0),
            coordinate("east", 0.0, 1.0),
            coordinate("north", 1.0, 0.0),
            coordinate("west", 0.0, -1.0),
            coordinate("south", -1.0, 0.0),
        ]);
        let first = GeoNeighborIndex::build(&catalog, 2);
        let second = GeoNeighborIndex::build(&catalog, 2);

        let codes: Vec<_> = first.neighbors_of("origin").unwrap().codes().collect();
        assert_eq!(codes, vec!["east", "north"]);
        assert_eq!(
            first.neighbors_of("origin"),
            second.neighbors_of("origin")
        );
    }

    #[test]
    fn zero_k_yields_empty_sets() {
        let index = GeoNeighborIndex::build(&line_catalog(4), 0);
        assert!(index.iter().all(|set| set.neighbors.is_empty()));
        assert_eq!(index.k(), 0);
    }

    #[test]
    fn empty_catalog_builds_empty_graph() {
        let index = GeoNeighborIndex::build(&GeoCoordinateCatalog::default(), 5);
        assert!(index.is_empty());
        assert!(index.neighbors_of("anything").is_none());
    }
}
