#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Result types produced by the analysis engine.
//!
//! Everything here is derived from the current entity and zone snapshots
//! and is recomputed from scratch on demand. None of it is persisted.

use chrono::{DateTime, Utc};
use response_map_entity_models::{Entity, EntityType};
use response_map_geometry::LngLat;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// An ad-hoc circular query region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeoSweep {
    /// Client-generated identifier.
    pub id: String,
    /// Circle center.
    pub center: LngLat,
    /// Circle radius in meters.
    pub radius_meters: f64,
    /// Display colour.
    pub color: String,
    /// Operator-facing label.
    pub label: String,
}

impl GeoSweep {
    /// Creates a sweep with a fresh random id.
    #[must_use]
    pub fn new(
        center: LngLat,
        radius_meters: f64,
        color: impl Into<String>,
        label: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            center,
            radius_meters,
            color: color.into(),
            label: label.into(),
        }
    }
}

/// Entities matched by a sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepResult {
    /// Matching entities in input order.
    pub matched: Vec<Entity>,
    /// `matched.len()`.
    pub count: usize,
    /// Number of matched responders, shown next to the sweep on the map.
    pub responders_count: usize,
}

impl SweepResult {
    /// Wraps a matched list, deriving the counts.
    #[must_use]
    pub fn new(matched: Vec<Entity>) -> Self {
        let responders_count = matched
            .iter()
            .filter(|e| e.entity_type == EntityType::Responder)
            .count();
        Self {
            count: matched.len(),
            responders_count,
            matched,
        }
    }
}

/// The entity kind a cluster represents, or [`DominantType::Mixed`] once it
/// has absorbed more than one kind.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DominantType {
    /// Only incidents.
    Incident,
    /// Only helpers.
    Helper,
    /// Only responders.
    Responder,
    /// Only hospitals.
    Hospital,
    /// More than one kind.
    Mixed,
}

impl From<EntityType> for DominantType {
    fn from(value: EntityType) -> Self {
        match value {
            EntityType::Incident => Self::Incident,
            EntityType::Helper => Self::Helper,
            EntityType::Responder => Self::Responder,
            EntityType::Hospital => Self::Hospital,
        }
    }
}

/// A group of nearby entities drawn as one marker.
///
/// Ids are regenerated on every clustering run; clusters carry no identity
/// across runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cluster {
    /// Run-local identifier.
    pub id: String,
    /// Position of the seed entity. Not a running mean.
    pub centroid: LngLat,
    /// `members.len()`.
    pub member_count: usize,
    /// Kind of every member, or mixed.
    pub dominant_type: DominantType,
    /// Marker colour.
    pub color: String,
    /// Members in the order they joined.
    pub members: Vec<Entity>,
}

/// Marker colours used for clusters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ClusterPalette {
    /// Incident-only clusters.
    pub incident: String,
    /// Helper-only clusters.
    pub helper: String,
    /// Responder-only clusters.
    pub responder: String,
    /// Hospital-only clusters.
    pub hospital: String,
    /// Colour of clusters holding more than one entity kind.
    pub mixed: String,
}

impl ClusterPalette {
    /// Colour for a single-kind cluster.
    #[must_use]
    pub fn color_for(&self, entity_type: EntityType) -> &str {
        match entity_type {
            EntityType::Incident => &self.incident,
            EntityType::Helper => &self.helper,
            EntityType::Responder => &self.responder,
            EntityType::Hospital => &self.hospital,
        }
    }
}

impl Default for ClusterPalette {
    fn default() -> Self {
        Self {
            incident: "#ef4444".to_string(),
            helper: "#22c55e".to_string(),
            responder: "#3b82f6".to_string(),
            hospital: "#a855f7".to_string(),
            mixed: "#f59e0b".to_string(),
        }
    }
}

/// Aggregate figures for one zone at one instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmergencyZoneStats {
    pub zone_id: String,
    pub zone_name: String,
    /// Incidents inside the zone with status active and no resolution time.
    pub active_incident_count: usize,
    /// Helpers inside the zone with status available.
    pub available_helper_count: usize,
    /// Responders inside the zone with status assigned.
    pub assigned_responder_count: usize,
    /// Mean report-to-resolution time in whole minutes; `0` when no
    /// incident in the zone has both timestamps.
    pub average_response_time_minutes: i64,
    /// When the figures were computed.
    pub computed_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use response_map_entity_models::EntityStatus;

    use super::*;

    #[test]
    fn sweep_result_counts_responders() {
        let result = SweepResult::new(vec![
            Entity::new("r1", EntityType::Responder, 0.0, 0.0, EntityStatus::Available),
            Entity::new("h1", EntityType::Helper, 0.0, 0.0, EntityStatus::Available),
            Entity::new("r2", EntityType::Responder, 0.0, 0.0, EntityStatus::Assigned),
        ]);
        assert_eq!(result.count, 3);
        assert_eq!(result.responders_count, 2);
    }

    #[test]
    fn sweeps_get_distinct_ids() {
        let a = GeoSweep::new(LngLat::new(0.0, 0.0), 500.0, "#fff", "A");
        let b = GeoSweep::new(LngLat::new(0.0, 0.0), 500.0, "#fff", "B");
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn dominant_type_names() {
        assert_eq!(DominantType::Mixed.to_string(), "mixed");
        assert_eq!(DominantType::from(EntityType::Hospital), DominantType::Hospital);
        assert_eq!(
            serde_json::to_value(DominantType::Responder).unwrap(),
            serde_json::json!("responder")
        );
    }

    #[test]
    fn palette_picks_per_type() {
        let palette = ClusterPalette::default();
        assert_eq!(palette.color_for(EntityType::Incident), "#ef4444");
        assert_eq!(palette.color_for(EntityType::Hospital), "#a855f7");
    }
}
