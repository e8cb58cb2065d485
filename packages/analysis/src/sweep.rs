//! Radius queries around an operator-picked point.

use response_map_analysis_models::{GeoSweep, SweepResult};
use response_map_entity_models::Entity;
use response_map_geometry::{CIRCLE_SEGMENTS, LngLat, PreparedPolygon, circle_polygon};

use crate::{AnalysisError, position};

/// Returns the candidates inside the circle of `radius_meters` around
/// `center`, in input order.
///
/// The circle is approximated by a [`CIRCLE_SEGMENTS`]-gon. Candidates are
/// first filtered by the polygon's bounding box, and only the survivors get
/// the exact containment test. Both tests run in the center's longitude
/// frame, so sweeps straddling the antimeridian match on either side.
///
/// # Errors
///
/// Returns [`AnalysisError::Geometry`] if the center or radius is invalid,
/// or if any candidate has a non-finite coordinate.
pub fn analyze(
    center: LngLat,
    radius_meters: f64,
    candidates: &[Entity],
) -> Result<SweepResult, AnalysisError> {
    let circle = circle_polygon(center, radius_meters, CIRCLE_SEGMENTS)?;
    let circle = PreparedPolygon::new(&circle)?;
    let bbox = circle.bbox();

    let mut in_box = Vec::new();
    for entity in candidates {
        let point = position(entity)?.unwrapped_near(center.lon());
        if bbox.contains(point) {
            in_box.push((entity, point));
        }
    }

    let matched: Vec<Entity> = in_box
        .into_iter()
        .filter(|(_, point)| circle.contains_exact(*point))
        .map(|(entity, _)| entity.clone())
        .collect();

    log::debug!(
        "Sweep at {center} r={radius_meters}m matched {} of {} candidates",
        matched.len(),
        candidates.len()
    );

    Ok(SweepResult::new(matched))
}

/// Runs [`analyze`] for a [`GeoSweep`].
///
/// # Errors
///
/// See [`analyze`].
pub fn analyze_sweep(sweep: &GeoSweep, candidates: &[Entity]) -> Result<SweepResult, AnalysisError> {
    analyze(sweep.center, sweep.radius_meters, candidates)
}
