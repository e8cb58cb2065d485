//! The closed set of shapes the engine can test containment against.

use serde::{Deserialize, Serialize};

use crate::{
    BoundingBox, GeometryError, LngLat,
    circle::{CIRCLE_SEGMENTS, circle_polygon},
    polygon::{PreparedPolygon, bounding_box},
};

/// A query or zone shape.
///
/// Circles are never tested analytically; they are converted to a
/// [`CIRCLE_SEGMENTS`]-gon first so every shape shares the same
/// boundary-as-outside polygon semantics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Geometry {
    /// A closed ring of `[lon, lat]` vertices.
    Polygon {
        /// Vertices, first equal to last.
        ring: Vec<LngLat>,
    },
    /// A great-circle radius around a center.
    Circle {
        /// Circle center.
        center: LngLat,
        /// Radius in meters.
        radius_meters: f64,
    },
}

impl Geometry {
    /// The shape as a polygon ring.
    ///
    /// # Errors
    ///
    /// Returns [`GeometryError`] if a circle has an invalid center or
    /// radius.
    pub fn to_ring(&self) -> Result<Vec<LngLat>, GeometryError> {
        match self {
            Self::Polygon { ring } => Ok(ring.clone()),
            Self::Circle {
                center,
                radius_meters,
            } => circle_polygon(*center, *radius_meters, CIRCLE_SEGMENTS),
        }
    }

    /// The shape's bounding box.
    ///
    /// # Errors
    ///
    /// Returns [`GeometryError`] if the shape is malformed.
    pub fn bounding_box(&self) -> Result<BoundingBox, GeometryError> {
        match self {
            Self::Polygon { ring } => bounding_box(ring),
            Self::Circle { .. } => bounding_box(&self.to_ring()?),
        }
    }

    /// Prepares the shape for repeated containment queries.
    ///
    /// # Errors
    ///
    /// Returns [`GeometryError`] if the shape is malformed.
    pub fn prepare(&self) -> Result<PreparedPolygon, GeometryError> {
        match self {
            Self::Polygon { ring } => PreparedPolygon::new(ring),
            Self::Circle { .. } => PreparedPolygon::new(&self.to_ring()?),
        }
    }

    /// Whether `point` lies strictly inside the shape.
    ///
    /// For circles the point is first moved into the center's longitude
    /// frame, so circles spanning the antimeridian behave like any other.
    ///
    /// # Errors
    ///
    /// Returns [`GeometryError`] if the shape or the point is malformed.
    pub fn contains(&self, point: LngLat) -> Result<bool, GeometryError> {
        match self {
            Self::Polygon { ring } => PreparedPolygon::new(ring)?.contains(point),
            Self::Circle { center, .. } => {
                self.prepare()?.contains(point.unwrapped_near(center.lon()))
            }
        }
    }
}
