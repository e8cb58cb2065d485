//! Greedy single-pass proximity clustering.
//!
//! Each point joins the *first* existing cluster (in creation order) whose
//! seed lies within the radius, or seeds a new one. The result depends on
//! input order and is not spatially optimal; earlier clusters always win
//! ties. There is no spatial index, so the cost is O(n * c) for `c`
//! clusters, and every call starts from scratch.

use response_map_analysis_models::{Cluster, ClusterPalette, DominantType};
use response_map_entity_models::{Entity, EntityType};
use response_map_geometry::{GeometryError, distance_meters};

use crate::{AnalysisError, position};

/// Clusters `points` with the greedy first-fit rule.
///
/// A cluster turns [`DominantType::Mixed`] (and takes `color_for_mixed`)
/// the first time it receives a point whose type differs from its own, and
/// never reverts. Clusters left with a single member are dropped.
///
/// # Errors
///
/// Returns [`AnalysisError::Geometry`] if the radius is not a positive
/// finite number or any point has a non-finite coordinate.
pub fn cluster(
    points: &[Entity],
    radius_meters: f64,
    color_for_type: impl Fn(EntityType) -> String,
    color_for_mixed: &str,
) -> Result<Vec<Cluster>, AnalysisError> {
    if !radius_meters.is_finite() || radius_meters <= 0.0 {
        return Err(GeometryError::InvalidRadius { radius_meters }.into());
    }

    let mut clusters: Vec<Cluster> = Vec::new();

    for entity in points {
        let point = position(entity)?;
        let entity_type = DominantType::from(entity.entity_type);

        let target = clusters
            .iter_mut()
            .find(|c| distance_meters(c.centroid, point) <= radius_meters);

        match target {
            Some(existing) => {
                existing.member_count += 1;
                existing.members.push(entity.clone());
                if existing.dominant_type != entity_type {
                    existing.dominant_type = DominantType::Mixed;
                    color_for_mixed.clone_into(&mut existing.color);
                }
            }
            None => clusters.push(Cluster {
                id: uuid::Uuid::new_v4().to_string(),
                centroid: point,
                member_count: 1,
                dominant_type: entity_type,
                color: color_for_type(entity.entity_type),
                members: vec![entity.clone()],
            }),
        }
    }

    let formed = clusters.len();
    clusters.retain(|c| c.member_count > 1);
    log::debug!(
        "Clustered {} points into {} clusters ({} singletons dropped)",
        points.len(),
        clusters.len(),
        formed - clusters.len()
    );

    Ok(clusters)
}

/// [`cluster`] with colours taken from a [`ClusterPalette`].
///
/// # Errors
///
/// See [`cluster`].
pub fn cluster_with_palette(
    points: &[Entity],
    radius_meters: f64,
    palette: &ClusterPalette,
) -> Result<Vec<Cluster>, AnalysisError> {
    cluster(
        points,
        radius_meters,
        |t| palette.color_for(t).to_string(),
        &palette.mixed,
    )
}
