//! Great-circle distance and destination on a spherical Earth.

use geo::{Destination as _, Distance as _, Haversine, Point};

use crate::LngLat;

/// Mean Earth radius in meters used by [`Haversine`] (GRS80 `R1`).
pub const EARTH_RADIUS_METERS: f64 = Haversine.radius();

/// Haversine distance between two positions, in meters.
///
/// Symmetric, non-negative, and exactly zero for identical inputs.
/// Non-finite input propagates as NaN; callers that need a hard failure
/// check positions with [`LngLat::checked`] first.
#[must_use]
pub fn distance_meters(a: LngLat, b: LngLat) -> f64 {
    Haversine.distance(Point::from(a), Point::from(b))
}

/// The position reached by travelling `distance_meters` from `origin`
/// along the initial bearing `bearing_degrees` (clockwise from north).
///
/// Longitude is normalized to `(-180, 180]`.
#[must_use]
pub fn destination(origin: LngLat, bearing_degrees: f64, distance_meters: f64) -> LngLat {
    LngLat::from(Haversine.destination(Point::from(origin), bearing_degrees, distance_meters))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_to_self_is_zero() {
        for p in [
            LngLat::new(0.0, 0.0),
            LngLat::new(-87.6278, 41.8827),
            LngLat::new(179.9, -89.0),
        ] {
            assert!(distance_meters(p, p).abs() < f64::EPSILON, "{p} -> {p}");
        }
    }

    #[test]
    fn distance_is_symmetric() {
        let pairs = [
            (LngLat::new(0.0, 0.0), LngLat::new(1.0, 1.0)),
            (LngLat::new(-73.9857, 40.7484), LngLat::new(-118.2437, 34.0522)),
            (LngLat::new(179.5, 10.0), LngLat::new(-179.5, 10.0)),
        ];
        for (a, b) in pairs {
            let ab = distance_meters(a, b);
            let ba = distance_meters(b, a);
            assert!((ab - ba).abs() < 1e-6, "{a} <-> {b}: {ab} vs {ba}");
            assert!(ab > 0.0);
        }
    }

    #[test]
    fn one_degree_of_latitude_is_about_111_km() {
        let d = distance_meters(LngLat::new(0.0, 0.0), LngLat::new(0.0, 1.0));
        assert!((d - 111_195.0).abs() < 10.0, "got {d}");
    }

    #[test]
    fn crossing_the_antimeridian_is_short() {
        let d = distance_meters(LngLat::new(179.99, 0.0), LngLat::new(-179.99, 0.0));
        assert!(d < 2_300.0, "got {d}");
    }

    #[test]
    fn destination_round_trips_distance() {
        let origin = LngLat::new(-87.6278, 41.8827);
        for bearing in [0.0, 45.0, 90.0, 180.0, 270.0, 333.0] {
            let dest = destination(origin, bearing, 1_234.0);
            let d = distance_meters(origin, dest);
            assert!((d - 1_234.0).abs() < 0.01, "bearing {bearing}: {d}");
        }
    }

    #[test]
    fn destination_due_north_keeps_longitude() {
        let dest = destination(LngLat::new(10.0, 0.0), 0.0, 1_000.0);
        assert!((dest.lon() - 10.0).abs() < 1e-9);
        assert!(dest.lat() > 0.0);
    }
}
