#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! In-memory spatial index for zone hit-testing.
//!
//! Builds an R-tree over zone bounding boxes and answers "which zones
//! contain this point" with an envelope query followed by exact
//! containment. Rebuilt from scratch whenever the zone list changes.

use response_map_geometry::{GeometryError, LngLat, PreparedPolygon};
use response_map_zone_models::Zone;
use rstar::{AABB, RTree, RTreeObject};

/// A zone polygon stored in the R-tree with its metadata.
struct ZoneEntry {
    zone_id: String,
    /// Position in the zone list the index was built from.
    order: usize,
    bbox_area: f64,
    envelope: AABB<[f64; 2]>,
    polygon: PreparedPolygon,
}

impl RTreeObject for ZoneEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// Pre-built R-tree over a zone list.
pub struct ZoneIndex {
    zones: RTree<ZoneEntry>,
}

impl ZoneIndex {
    /// Prepares every zone's polygon and bulk-loads the tree.
    ///
    /// Inactive zones are indexed too; filter the list first if only
    /// active zones should be hit.
    ///
    /// # Errors
    ///
    /// Returns [`GeometryError`] if any zone has a malformed ring.
    pub fn build(zones: &[Zone]) -> Result<Self, GeometryError> {
        let mut entries = Vec::with_capacity(zones.len());

        for (order, zone) in zones.iter().enumerate() {
            let polygon = PreparedPolygon::new(&zone.geometry)?;
            let bbox = polygon.bbox();

            entries.push(ZoneEntry {
                zone_id: zone.id.clone(),
                order,
                bbox_area: bbox.area(),
                envelope: AABB::from_corners(
                    [bbox.min_lon, bbox.min_lat],
                    [bbox.max_lon, bbox.max_lat],
                ),
                polygon,
            });
        }

        let zones = RTree::bulk_load(entries);
        log::debug!("Loaded {} zones into spatial index", zones.size());
        Ok(Self { zones })
    }

    /// Number of indexed zones.
    #[must_use]
    pub fn len(&self) -> usize {
        self.zones.size()
    }

    /// Whether the index holds no zones.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.zones.size() == 0
    }

    fn hits(&self, point: LngLat) -> impl Iterator<Item = &ZoneEntry> {
        let query_env = AABB::from_point([point.lon(), point.lat()]);
        self.zones
            .locate_in_envelope_intersecting(&query_env)
            .filter(move |entry| entry.polygon.contains_exact(point))
    }

    /// Ids of every zone strictly containing `point`, in zone-list order.
    ///
    /// Points on a zone's boundary are outside it.
    ///
    /// # Errors
    ///
    /// Returns [`GeometryError::InvalidPoint`] if `point` is not finite.
    pub fn zones_containing(&self, point: LngLat) -> Result<Vec<&str>, GeometryError> {
        if !point.is_finite() {
            return Err(GeometryError::InvalidPoint { point });
        }

        let mut hits: Vec<&ZoneEntry> = self.hits(point).collect();
        hits.sort_by_key(|entry| entry.order);
        Ok(hits.into_iter().map(|entry| entry.zone_id.as_str()).collect())
    }

    /// The zone containing `point` whose bounding box is smallest.
    ///
    /// Zones can overlap; the tightest one wins, and ties go to the zone
    /// earlier in the list.
    ///
    /// # Errors
    ///
    /// Returns [`GeometryError::InvalidPoint`] if `point` is not finite.
    pub fn smallest_zone_containing(&self, point: LngLat) -> Result<Option<&str>, GeometryError> {
        if !point.is_finite() {
            return Err(GeometryError::InvalidPoint { point });
        }

        let best = self.hits(point).min_by(|a, b| {
            a.bbox_area
                .total_cmp(&b.bbox_area)
                .then(a.order.cmp(&b.order))
        });

        Ok(best.map(|e| e.zone_id.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn square(id: &str, min: f64, max: f64) -> Zone {
        Zone {
            id: id.to_string(),
            name: id.to_uppercase(),
            description: None,
            geometry: vec![
                LngLat::new(min, min),
                LngLat::new(min, max),
                LngLat::new(max, max),
                LngLat::new(max, min),
                LngLat::new(min, min),
            ],
            color: "#000000".to_string(),
            opacity: 0.5,
            created_by: "test".to_string(),
            is_active: true,
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    fn index() -> ZoneIndex {
        ZoneIndex::build(&[
            square("outer", 0.0, 10.0),
            square("inner", 2.0, 4.0),
            square("far", 50.0, 60.0),
        ])
        .unwrap()
    }

    #[test]
    fn returns_all_containing_zones_in_list_order() {
        let index = index();
        assert_eq!(index.len(), 3);
        assert_eq!(
            index.zones_containing(LngLat::new(3.0, 3.0)).unwrap(),
            vec!["outer", "inner"]
        );
        assert_eq!(
            index.zones_containing(LngLat::new(8.0, 8.0)).unwrap(),
            vec!["outer"]
        );
        assert!(
            index
                .zones_containing(LngLat::new(20.0, 20.0))
                .unwrap()
                .is_empty()
        );
    }

    #[test]
    fn boundary_points_hit_nothing() {
        let index = index();
        assert!(
            index
                .zones_containing(LngLat::new(50.0, 55.0))
                .unwrap()
                .is_empty()
        );
        assert_eq!(
            index
                .smallest_zone_containing(LngLat::new(2.0, 3.0))
                .unwrap(),
            Some("outer")
        );
    }

    #[test]
    fn smallest_zone_wins_when_nested() {
        let index = index();
        assert_eq!(
            index
                .smallest_zone_containing(LngLat::new(3.0, 3.0))
                .unwrap(),
            Some("inner")
        );
        assert_eq!(
            index
                .smallest_zone_containing(LngLat::new(-1.0, 3.0))
                .unwrap(),
            None
        );
    }

    #[test]
    fn rejects_bad_input() {
        let index = index();
        assert!(matches!(
            index.zones_containing(LngLat::new(f64::NAN, 0.0)),
            Err(GeometryError::InvalidPoint { .. })
        ));

        let mut broken = square("broken", 0.0, 1.0);
        broken.geometry.truncate(2);
        assert!(ZoneIndex::build(&[broken]).is_err());
        assert!(ZoneIndex::build(&[]).unwrap().is_empty());
    }
}
