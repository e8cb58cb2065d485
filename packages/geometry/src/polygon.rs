//! Polygon rings: validation, bounding boxes, and exact containment.
//!
//! A ring is an ordered slice of [`LngLat`] vertices whose first and last
//! entries are equal. Containment delegates to [`geo::Contains`], which
//! reports points on an edge or vertex as not contained; that is the
//! boundary-as-outside convention every caller relies on.

use std::collections::BTreeMap;

use geo::{Contains as _, LineString, Point, Polygon};

use crate::{BoundingBox, GeometryError, LngLat};

/// Fully validates a ring before it is persisted.
///
/// Checks, in order: at least four points, every vertex finite and in
/// range, the ring is closed, no vertex repeats an earlier one (other than
/// the closing vertex), and at least three distinct vertices. Runs in
/// O(n log n); self-intersection beyond repeated vertices is not
/// detected.
///
/// # Errors
///
/// Returns the first [`GeometryError`] found.
pub fn validate_ring(ring: &[LngLat]) -> Result<(), GeometryError> {
    if ring.len() < 4 {
        return Err(GeometryError::TooFewPoints { count: ring.len() });
    }

    for (index, point) in ring.iter().enumerate() {
        if !point.is_finite() {
            return Err(GeometryError::NonFiniteCoordinate { index });
        }
        if !point.in_range() {
            return Err(GeometryError::OutOfRange {
                index,
                point: *point,
            });
        }
    }

    let first = ring[0];
    let last = ring[ring.len() - 1];
    if first != last {
        return Err(GeometryError::NotClosed { first, last });
    }

    let open = &ring[..ring.len() - 1];
    let mut seen: BTreeMap<(u64, u64), usize> = BTreeMap::new();
    for (index, point) in open.iter().enumerate() {
        if let Some(&first_index) = seen.get(&vertex_key(*point)) {
            return Err(GeometryError::DuplicateVertex { index, first_index });
        }
        seen.insert(vertex_key(*point), index);
    }

    if seen.len() < 3 {
        return Err(GeometryError::Degenerate);
    }

    Ok(())
}

/// Bit-exact key for a vertex, with `-0.0` folded into `0.0`.
fn vertex_key(point: LngLat) -> (u64, u64) {
    ((point.0 + 0.0).to_bits(), (point.1 + 0.0).to_bits())
}

/// The cheap checks run on every read: enough points, all finite, and at
/// least three distinct vertices.
fn check_ring(ring: &[LngLat]) -> Result<(), GeometryError> {
    if ring.len() < 4 {
        return Err(GeometryError::TooFewPoints { count: ring.len() });
    }
    if let Some(index) = ring.iter().position(|p| !p.is_finite()) {
        return Err(GeometryError::NonFiniteCoordinate { index });
    }

    let mut distinct: Vec<LngLat> = Vec::with_capacity(3);
    for point in ring {
        if !distinct.contains(point) {
            distinct.push(*point);
            if distinct.len() == 3 {
                return Ok(());
            }
        }
    }
    Err(GeometryError::Degenerate)
}

/// Computes the axis-aligned box enclosing every vertex of `ring`.
///
/// # Errors
///
/// Returns [`GeometryError`] if the ring is malformed.
pub fn bounding_box(ring: &[LngLat]) -> Result<BoundingBox, GeometryError> {
    check_ring(ring)?;
    Ok(envelope(ring))
}

fn envelope(ring: &[LngLat]) -> BoundingBox {
    ring.iter().fold(
        BoundingBox {
            min_lon: f64::INFINITY,
            min_lat: f64::INFINITY,
            max_lon: f64::NEG_INFINITY,
            max_lat: f64::NEG_INFINITY,
        },
        |bbox, p| BoundingBox {
            min_lon: bbox.min_lon.min(p.0),
            min_lat: bbox.min_lat.min(p.1),
            max_lon: bbox.max_lon.max(p.0),
            max_lat: bbox.max_lat.max(p.1),
        },
    )
}

/// Whether `point` lies strictly inside the polygon described by `ring`.
///
/// Boundary points return `false`. For repeated queries against the same
/// ring, build a [`PreparedPolygon`] once instead.
///
/// # Errors
///
/// Returns [`GeometryError`] if the ring or the point is malformed.
pub fn point_in_polygon(point: LngLat, ring: &[LngLat]) -> Result<bool, GeometryError> {
    PreparedPolygon::new(ring)?.contains(point)
}

/// A ring checked once and cached alongside its bounding box, ready for
/// repeated containment queries.
#[derive(Debug, Clone)]
pub struct PreparedPolygon {
    bbox: BoundingBox,
    polygon: Polygon<f64>,
}

impl PreparedPolygon {
    /// Checks `ring` and prepares it for queries.
    ///
    /// # Errors
    ///
    /// Returns [`GeometryError`] if the ring is malformed.
    pub fn new(ring: &[LngLat]) -> Result<Self, GeometryError> {
        check_ring(ring)?;
        let exterior = LineString::new(ring.iter().map(|p| geo::Coord::from(*p)).collect());
        Ok(Self {
            bbox: envelope(ring),
            polygon: Polygon::new(exterior, vec![]),
        })
    }

    /// The ring's bounding box.
    #[must_use]
    pub const fn bbox(&self) -> BoundingBox {
        self.bbox
    }

    /// Exact containment, boundary excluded. Checks the bounding box first.
    ///
    /// # Errors
    ///
    /// Returns [`GeometryError::InvalidPoint`] if `point` is not finite.
    pub fn contains(&self, point: LngLat) -> Result<bool, GeometryError> {
        if !point.is_finite() {
            return Err(GeometryError::InvalidPoint { point });
        }
        if !self.bbox.contains(point) {
            return Ok(false);
        }
        Ok(self.contains_exact(point))
    }

    /// Exact containment without the bounding-box check, for callers that
    /// have already pre-filtered. `point` must be finite.
    #[must_use]
    pub fn contains_exact(&self, point: LngLat) -> bool {
        self.polygon.contains(&Point::new(point.0, point.1))
    }

    /// The ring's vertices.
    pub fn vertices(&self) -> impl Iterator<Item = LngLat> + '_ {
        self.polygon.exterior().coords().map(|c| LngLat::from(*c))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_square() -> Vec<LngLat> {
        vec![
            LngLat::new(0.0, 0.0),
            LngLat::new(0.0, 1.0),
            LngLat::new(1.0, 1.0),
            LngLat::new(1.0, 0.0),
            LngLat::new(0.0, 0.0),
        ]
    }

    #[test]
    fn interior_points_are_inside() {
        let square = unit_square();
        for p in [(0.5, 0.5), (0.01, 0.99), (0.999, 0.001)] {
            assert!(
                point_in_polygon(LngLat::new(p.0, p.1), &square).unwrap(),
                "{p:?} should be inside"
            );
        }
    }

    #[test]
    fn exterior_points_are_outside() {
        let square = unit_square();
        for p in [(-0.5, 0.5), (1.5, 0.5), (0.5, 2.0), (2.0, 2.0)] {
            assert!(
                !point_in_polygon(LngLat::new(p.0, p.1), &square).unwrap(),
                "{p:?} should be outside"
            );
        }
    }

    #[test]
    fn boundary_points_are_outside() {
        let square = unit_square();
        for p in [(0.0, 0.0), (0.5, 0.0), (1.0, 0.5), (0.0, 0.25), (1.0, 1.0)] {
            assert!(
                !point_in_polygon(LngLat::new(p.0, p.1), &square).unwrap(),
                "boundary point {p:?} must be outside"
            );
        }
    }

    #[test]
    fn concave_polygon_notch_is_outside() {
        // A "U" shape opening to the north.
        let u = vec![
            LngLat::new(0.0, 0.0),
            LngLat::new(3.0, 0.0),
            LngLat::new(3.0, 3.0),
            LngLat::new(2.0, 3.0),
            LngLat::new(2.0, 1.0),
            LngLat::new(1.0, 1.0),
            LngLat::new(1.0, 3.0),
            LngLat::new(0.0, 3.0),
            LngLat::new(0.0, 0.0),
        ];
        assert!(!point_in_polygon(LngLat::new(1.5, 2.0), &u).unwrap());
        assert!(point_in_polygon(LngLat::new(0.5, 2.0), &u).unwrap());
        assert!(point_in_polygon(LngLat::new(1.5, 0.5), &u).unwrap());
    }

    #[test]
    fn bounding_box_encloses_all_vertices() {
        let ring = vec![
            LngLat::new(-1.0, 2.0),
            LngLat::new(3.0, -4.0),
            LngLat::new(5.0, 6.0),
            LngLat::new(-1.0, 2.0),
        ];
        let bbox = bounding_box(&ring).unwrap();
        assert_eq!(
            bbox,
            BoundingBox {
                min_lon: -1.0,
                min_lat: -4.0,
                max_lon: 5.0,
                max_lat: 6.0,
            }
        );
        assert!(ring.iter().all(|p| bbox.contains(*p)));
    }

    #[test]
    fn malformed_rings_fail_fast() {
        assert_eq!(
            bounding_box(&unit_square()[..3]),
            Err(GeometryError::TooFewPoints { count: 3 })
        );

        let mut nan = unit_square();
        nan[2] = LngLat::new(f64::NAN, 1.0);
        assert_eq!(
            point_in_polygon(LngLat::new(0.5, 0.5), &nan),
            Err(GeometryError::NonFiniteCoordinate { index: 2 })
        );

        let line = vec![
            LngLat::new(0.0, 0.0),
            LngLat::new(1.0, 1.0),
            LngLat::new(0.0, 0.0),
            LngLat::new(1.0, 1.0),
        ];
        assert_eq!(bounding_box(&line), Err(GeometryError::Degenerate));
    }

    #[test]
    fn non_finite_query_point_is_an_error() {
        let square = unit_square();
        assert!(matches!(
            point_in_polygon(LngLat::new(f64::INFINITY, 0.5), &square),
            Err(GeometryError::InvalidPoint { .. })
        ));
    }

    #[test]
    fn validate_accepts_simple_ring() {
        assert_eq!(validate_ring(&unit_square()), Ok(()));
    }

    #[test]
    fn validate_rejects_open_ring() {
        let mut ring = unit_square();
        ring.pop();
        ring.push(LngLat::new(0.0, 0.5));
        assert!(matches!(
            validate_ring(&ring),
            Err(GeometryError::NotClosed { .. })
        ));
    }

    #[test]
    fn validate_rejects_duplicate_vertex() {
        let ring = vec![
            LngLat::new(0.0, 0.0),
            LngLat::new(0.0, 1.0),
            LngLat::new(1.0, 1.0),
            LngLat::new(0.0, 1.0),
            LngLat::new(1.0, 0.0),
            LngLat::new(0.0, 0.0),
        ];
        assert_eq!(
            validate_ring(&ring),
            Err(GeometryError::DuplicateVertex {
                index: 3,
                first_index: 1,
            })
        );
    }

    #[test]
    fn validate_rejects_out_of_range_and_short_rings() {
        let ring = vec![
            LngLat::new(0.0, 0.0),
            LngLat::new(0.0, 95.0),
            LngLat::new(1.0, 1.0),
            LngLat::new(0.0, 0.0),
        ];
        assert!(matches!(
            validate_ring(&ring),
            Err(GeometryError::OutOfRange { index: 1, .. })
        ));

        let closed_line = vec![
            LngLat::new(0.0, 0.0),
            LngLat::new(1.0, 1.0),
            LngLat::new(0.0, 0.0),
        ];
        assert_eq!(
            validate_ring(&closed_line),
            Err(GeometryError::TooFewPoints { count: 3 })
        );
    }

    #[test]
    fn prepared_polygon_exposes_its_vertices() {
        let prepared = PreparedPolygon::new(&unit_square()).unwrap();
        let vertices: Vec<LngLat> = prepared.vertices().collect();
        assert_eq!(vertices, unit_square());
    }
}
