//! Nearest-neighborhood lookup over known incident coordinates.

use std::collections::HashMap;
use std::ops::RangeInclusive;

use crate::cleaner::CrimeRecord;
use crate::neighborhood::NeighborhoodKey;

const CELL_DEGREES: f64 = 0.01;
/// Search radius in cells; roughly 50 km at city latitudes.
const MAX_RING: i64 = 50;

pub const LATITUDE_RANGE: RangeInclusive<f64> = -90.0..=90.0;
pub const LONGITUDE_RANGE: RangeInclusive<f64> = -180.0..=180.0;

type Cell = (i64, i64);

/// Whether `(lat, lon)` is a point on the globe. Rejects NaN and infinities.
pub fn valid_coordinate(lat: f64, lon: f64) -> bool {
    LATITUDE_RANGE.contains(&lat) && LONGITUDE_RANGE.contains(&lon)
}

fn cell_of(lat: f64, lon: f64) -> Cell {
    (
        (lat / CELL_DEGREES).floor() as i64,
        (lon / CELL_DEGREES).floor() as i64,
    )
}

/// Grid-bucketed index of `(lat, lon) -> neighborhood` reference points.
#[derive(Debug, Default)]
pub struct NearestNeighborhood {
    cells: HashMap<Cell, Vec<(f64, f64, usize)>>,
    keys: Vec<NeighborhoodKey>,
}

impl NearestNeighborhood {
    pub fn new(points: impl IntoIterator<Item = (f64, f64, NeighborhoodKey)>) -> Self {
        let mut index = Self::default();
        let mut key_ids: HashMap<NeighborhoodKey, usize> = HashMap::new();

        for (lat, lon, key) in points {
            if !valid_coordinate(lat, lon) {
                continue;
            }
            let id = *key_ids.entry(key.clone()).or_insert_with(|| {
                index.keys.push(key);
                index.keys.len() - 1
            });
            index.cells.entry(cell_of(lat, lon)).or_default().push((lat, lon, id));
        }

        index
    }

    pub fn from_crimes(crimes: &[CrimeRecord]) -> Self {
        Self::new(
            crimes
                .iter()
                .map(|c| (c.latitude, c.longitude, c.neighborhood.clone())),
        )
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Neighborhood of the closest reference point, if one lies within range.
    ///
    /// Rings of cells are searched outward until no unscanned ring can hold a
    /// closer point than the best one found.
    pub fn nearest(&self, lat: f64, lon: f64) -> Option<&NeighborhoodKey> {
        if self.is_empty() || !valid_coordinate(lat, lon) {
            return None;
        }

        let (cy, cx) = cell_of(lat, lon);
        let mut best: Option<(f64, usize)> = None;

        for ring in 0..=MAX_RING {
            for (dy, dx) in ring_offsets(ring) {
                let (Some(y), Some(x)) = (cy.checked_add(dy), cx.checked_add(dx)) else {
                    continue;
                };
                let Some(points) = self.cells.get(&(y, x)) else {
                    continue;
                };
                for &(plat, plon, id) in points {
                    let d = (plat - lat).powi(2) + (plon - lon).powi(2);
                    if best.is_none_or(|(bd, _)| d < bd) {
                        best = Some((d, id));
                    }
                }
            }

            // Points in ring k + 1 are at least k cells away.
            let reach = ring as f64 * CELL_DEGREES;
            if best.is_some_and(|(bd, _)| reach * reach >= bd) {
                break;
            }
        }

        best.map(|(_, id)| &self.keys[id])
    }
}

fn ring_offsets(ring: i64) -> Vec<(i64, i64)> {
    if ring == 0 {
        return vec![(0, 0)];
    }
    let mut out = Vec::with_capacity((8 * ring) as usize);
    for d in -ring..=ring {
        out.push((-ring, d));
        out.push((ring, d));
    }
    for d in (-ring + 1)..ring {
        out.push((d, -ring));
        out.push((d, ring));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(s: &str) -> NeighborhoodKey {
        NeighborhoodKey::parse(s).unwrap()
    }

    #[test]
    fn test_nearest_picks_closest_point() {
        let index = NearestNeighborhood::new([
            (39.70, -104.90, key("baker")),
            (39.75, -104.98, key("five-points")),
        ]);

        assert_eq!(index.nearest(39.749, -104.979), Some(&key("five-points")));
        assert_eq!(index.nearest(39.701, -104.901), Some(&key("baker")));
    }

    #[test]
    fn test_closer_point_in_next_ring_wins() {
        let index = NearestNeighborhood::new([
            (39.7000, -104.9000, key("far")),
            (39.7101, -104.9051, key("near")),
        ]);

        assert_eq!(index.nearest(39.7099, -104.9051), Some(&key("near")));
    }

    #[test]
    fn test_out_of_range_is_none() {
        let index = NearestNeighborhood::new([(39.7, -104.9, key("baker"))]);
        assert_eq!(index.nearest(45.0, -90.0), None);
    }

    #[test]
    fn test_off_globe_coordinates_are_ignored() {
        let index = NearestNeighborhood::new([
            (39.7, -104.9, key("baker")),
            (1e300, 0.0, key("nowhere")),
            (0.0, -181.0, key("nowhere")),
        ]);
        assert_eq!(index.nearest(1e300, 0.0), None);
        assert_eq!(index.nearest(39.7, f64::MAX), None);
        assert_eq!(index.nearest(-90.5, -104.9), None);
        assert_eq!(index.nearest(39.7, -104.9), Some(&key("baker")));
        assert_eq!(index.keys.len(), 1);
    }

    #[test]
    fn test_valid_coordinate_bounds() {
        assert!(valid_coordinate(90.0, -180.0));
        assert!(valid_coordinate(-90.0, 180.0));
        assert!(!valid_coordinate(90.01, 0.0));
        assert!(!valid_coordinate(f64::NAN, 0.0));
        assert!(!valid_coordinate(0.0, f64::INFINITY));
    }

    #[test]
    fn test_empty_index_is_none() {
        let index = NearestNeighborhood::default();
        assert!(index.nearest(39.7, -104.9).is_none());
    }

    #[test]
    fn test_ring_offsets_cover_perimeter() {
        assert_eq!(ring_offsets(0).len(), 1);
        assert_eq!(ring_offsets(1).len(), 8);
        assert_eq!(ring_offsets(2).len(), 16);
    }
}
