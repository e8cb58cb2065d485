#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Geometry kernel for zone, sweep, and cluster analysis.
//!
//! All coordinates are WGS84 `[lon, lat]` pairs ([`LngLat`]). Distances are
//! great-circle (haversine) meters. Polygon containment is exact and
//! treats points on the boundary as **outside**; the axis-aligned
//! [`BoundingBox`] is only ever used as a cheap pre-filter ahead of it.
//!
//! Malformed input (non-finite coordinates, rings with fewer than three
//! distinct vertices) fails fast with a [`GeometryError`]. Full ring
//! validation ([`validate_ring`]) is meant to run once, when a zone is
//! written, rather than on every read.

pub mod circle;
pub mod distance;
pub mod polygon;
pub mod shape;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use circle::{CIRCLE_SEGMENTS, circle_polygon};
pub use distance::{EARTH_RADIUS_METERS, destination, distance_meters};
pub use polygon::{PreparedPolygon, bounding_box, point_in_polygon, validate_ring};
pub use shape::Geometry;

/// A WGS84 position as `[longitude, latitude]` in degrees.
///
/// Serializes as a two-element array, matching `GeoJSON` coordinate order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LngLat(pub f64, pub f64);

impl LngLat {
    /// Creates a position from longitude and latitude in degrees.
    #[must_use]
    pub const fn new(lon: f64, lat: f64) -> Self {
        Self(lon, lat)
    }

    /// Longitude in degrees.
    #[must_use]
    pub const fn lon(self) -> f64 {
        self.0
    }

    /// Latitude in degrees.
    #[must_use]
    pub const fn lat(self) -> f64 {
        self.1
    }

    /// Whether both components are finite.
    #[must_use]
    pub const fn is_finite(self) -> bool {
        self.0.is_finite() && self.1.is_finite()
    }

    /// Whether the position lies within `[-180, 180] x [-90, 90]`.
    #[must_use]
    pub fn in_range(self) -> bool {
        (-180.0..=180.0).contains(&self.0) && (-90.0..=90.0).contains(&self.1)
    }

    /// The same position with its longitude shifted by a multiple of 360
    /// degrees so that it lies within 180 degrees of `reference_lon`.
    ///
    /// Shapes built around a center near the antimeridian keep their
    /// vertices in the center's frame; query points must be moved into
    /// that frame before any bounding-box or containment test.
    #[must_use]
    pub fn unwrapped_near(self, reference_lon: f64) -> Self {
        let turns = ((reference_lon - self.0) / 360.0).round();
        Self(turns.mul_add(360.0, self.0), self.1)
    }

    /// Fails with [`GeometryError::InvalidPoint`] unless the position is
    /// finite and in range.
    ///
    /// # Errors
    ///
    /// Returns [`GeometryError::InvalidPoint`] for non-finite or
    /// out-of-range coordinates.
    pub fn checked(self) -> Result<Self, GeometryError> {
        if self.is_finite() && self.in_range() {
            Ok(self)
        } else {
            Err(GeometryError::InvalidPoint { point: self })
        }
    }
}

impl std::fmt::Display for LngLat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {}]", self.0, self.1)
    }
}

impl From<LngLat> for geo::Coord<f64> {
    fn from(p: LngLat) -> Self {
        Self { x: p.0, y: p.1 }
    }
}

impl From<geo::Coord<f64>> for LngLat {
    fn from(c: geo::Coord<f64>) -> Self {
        Self(c.x, c.y)
    }
}

impl From<LngLat> for geo::Point<f64> {
    fn from(p: LngLat) -> Self {
        Self::new(p.0, p.1)
    }
}

impl From<geo::Point<f64>> for LngLat {
    fn from(p: geo::Point<f64>) -> Self {
        Self(p.x(), p.y())
    }
}

/// Axis-aligned bounding box in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoundingBox {
    /// Western edge.
    pub min_lon: f64,
    /// Southern edge.
    pub min_lat: f64,
    /// Eastern edge.
    pub max_lon: f64,
    /// Northern edge.
    pub max_lat: f64,
}

impl BoundingBox {
    /// Whether `point` lies inside or on the edge of this box.
    ///
    /// Inclusive so that it never rejects a point the exact test would
    /// accept.
    #[must_use]
    pub fn contains(&self, point: LngLat) -> bool {
        point.0 >= self.min_lon
            && point.0 <= self.max_lon
            && point.1 >= self.min_lat
            && point.1 <= self.max_lat
    }

    /// Area in square degrees. Only meaningful for ranking boxes against
    /// each other.
    #[must_use]
    pub fn area(&self) -> f64 {
        (self.max_lon - self.min_lon) * (self.max_lat - self.min_lat)
    }
}

/// Errors raised by the geometry kernel for malformed input.
///
/// These are fatal to the single call and never retried; the caller must
/// fix its input.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeometryError {
    /// The ring is shorter than a closed triangle.
    #[error("Polygon ring has {count} points; a closed ring needs at least 4")]
    TooFewPoints {
        /// Number of points supplied.
        count: usize,
    },

    /// The first and last vertices differ.
    #[error("Polygon ring is not closed: first vertex {first} != last vertex {last}")]
    NotClosed {
        /// First vertex.
        first: LngLat,
        /// Last vertex.
        last: LngLat,
    },

    /// A vertex has a NaN or infinite component.
    #[error("Non-finite coordinate at vertex {index}")]
    NonFiniteCoordinate {
        /// Index of the offending vertex.
        index: usize,
    },

    /// A vertex lies outside `[-180, 180] x [-90, 90]`.
    #[error("Coordinate {point} at vertex {index} is outside the valid lon/lat range")]
    OutOfRange {
        /// Index of the offending vertex.
        index: usize,
        /// The vertex.
        point: LngLat,
    },

    /// The ring has fewer than three distinct vertices.
    #[error("Polygon ring has fewer than 3 distinct vertices")]
    Degenerate,

    /// A vertex repeats an earlier one (other than the closing vertex).
    #[error("Vertex {index} duplicates vertex {first_index}")]
    DuplicateVertex {
        /// Index of the repeated vertex.
        index: usize,
        /// Index where it first appeared.
        first_index: usize,
    },

    /// A radius is non-finite or not strictly positive.
    #[error("Invalid radius: {radius_meters} m")]
    InvalidRadius {
        /// The rejected radius.
        radius_meters: f64,
    },

    /// A query point is non-finite or out of range.
    #[error("Invalid point: {point}")]
    InvalidPoint {
        /// The rejected point.
        point: LngLat,
    },

    /// A circle was requested with too few segments to form a polygon.
    #[error("Circle needs at least 3 segments, got {segments}")]
    TooFewSegments {
        /// The rejected segment count.
        segments: usize,
    },
}
