//! Per-zone aggregate statistics.
//!
//! Stats are recomputed in full on every call. For each entity list the
//! status filter runs first, then the zone's bounding box, then exact
//! containment.

use chrono::{DateTime, Utc};
use response_map_analysis_models::EmergencyZoneStats;
use response_map_entity_models::{Entity, EntitySnapshot, EntityStatus};
use response_map_geometry::{GeometryError, PreparedPolygon};
use response_map_zone_models::Zone;

use crate::{AnalysisError, position};

/// Computes stats for `zone`, stamped with the current time.
///
/// # Errors
///
/// Returns [`AnalysisError::Geometry`] if the zone ring is malformed or a
/// considered entity has a non-finite coordinate.
pub fn compute_stats(
    zone: &Zone,
    incidents: &[Entity],
    helpers: &[Entity],
    responders: &[Entity],
) -> Result<EmergencyZoneStats, AnalysisError> {
    compute_stats_at(zone, incidents, helpers, responders, Utc::now())
}

/// Computes stats for `zone` with an explicit `computed_at`.
///
/// An incident counts as active when its status is
/// [`EntityStatus::Active`] and it has no resolution time. The average
/// response time covers every in-zone incident that has both timestamps,
/// whatever its status; incidents resolved before they were created are
/// ignored.
///
/// # Errors
///
/// See [`compute_stats`].
pub fn compute_stats_at(
    zone: &Zone,
    incidents: &[Entity],
    helpers: &[Entity],
    responders: &[Entity],
    computed_at: DateTime<Utc>,
) -> Result<EmergencyZoneStats, AnalysisError> {
    let polygon = PreparedPolygon::new(&zone.geometry)?;

    let active_incident_count = count_inside(&polygon, incidents, |e| {
        e.status == EntityStatus::Active && e.resolved_at.is_none()
    })?;
    let available_helper_count =
        count_inside(&polygon, helpers, |e| e.status == EntityStatus::Available)?;
    let assigned_responder_count =
        count_inside(&polygon, responders, |e| e.status == EntityStatus::Assigned)?;

    let mut durations_ms = Vec::new();
    for incident in incidents {
        let Some(elapsed) = incident.resolution_time() else {
            continue;
        };
        if polygon.contains(position(incident)?)? {
            durations_ms.push(elapsed.num_milliseconds());
        }
    }

    Ok(EmergencyZoneStats {
        zone_id: zone.id.clone(),
        zone_name: zone.name.clone(),
        active_incident_count,
        available_helper_count,
        assigned_responder_count,
        average_response_time_minutes: mean_minutes(&durations_ms),
        computed_at,
    })
}

/// Computes stats for every active zone, all stamped with the current
/// time.
///
/// # Errors
///
/// Fails on the first zone that [`compute_stats_at`] rejects.
pub fn compute_all_stats(
    zones: &[Zone],
    entities: &EntitySnapshot,
) -> Result<Vec<EmergencyZoneStats>, AnalysisError> {
    compute_all_stats_at(zones, entities, Utc::now())
}

/// Computes stats for every active zone, all sharing `computed_at`.
///
/// # Errors
///
/// Fails on the first zone that [`compute_stats_at`] rejects.
pub fn compute_all_stats_at(
    zones: &[Zone],
    entities: &EntitySnapshot,
    computed_at: DateTime<Utc>,
) -> Result<Vec<EmergencyZoneStats>, AnalysisError> {
    zones
        .iter()
        .filter(|zone| zone.is_active)
        .map(|zone| {
            compute_stats_at(
                zone,
                &entities.incidents,
                &entities.helpers,
                &entities.responders,
                computed_at,
            )
        })
        .collect()
}

fn count_inside(
    polygon: &PreparedPolygon,
    entities: &[Entity],
    status_filter: impl Fn(&Entity) -> bool,
) -> Result<usize, GeometryError> {
    let mut count = 0;
    for entity in entities.iter().filter(|e| status_filter(e)) {
        if polygon.contains(position(entity)?)? {
            count += 1;
        }
    }
    Ok(count)
}

#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn mean_minutes(durations_ms: &[i64]) -> i64 {
    if durations_ms.is_empty() {
        return 0;
    }
    let total: f64 = durations_ms.iter().map(|ms| *ms as f64).sum();
    let mean_ms = total / durations_ms.len() as f64;
    (mean_ms / 60_000.0).round() as i64
}
