#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Operator-drawn zone types.
//!
//! A [`Zone`] is a named polygon drawn on the map and persisted by the
//! external zone store. Its geometry is fixed at creation; later updates
//! may only change presentation fields and the active flag.

use chrono::{DateTime, Utc};
use response_map_geometry::LngLat;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// A persisted, operator-defined region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Zone {
    /// Store-assigned identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Free-form operator notes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Closed polygon ring of `[lon, lat]` vertices.
    pub geometry: Vec<LngLat>,
    /// Fill colour as a hex string (e.g. `"#ef4444"`).
    pub color: String,
    /// Fill opacity in `0..=1`.
    pub opacity: f64,
    /// Operator who drew the zone.
    pub created_by: String,
    /// `false` once the zone has been soft-deleted.
    pub is_active: bool,
    /// Store-assigned creation time.
    pub created_at: DateTime<Utc>,
    /// Store-assigned time of the last update.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// A zone as submitted from the drawing tool, before the store assigns an
/// id and timestamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoneDraft {
    /// Display name.
    pub name: String,
    /// Free-form operator notes.
    #[serde(default)]
    pub description: Option<String>,
    /// Closed polygon ring of `[lon, lat]` vertices.
    pub geometry: Vec<LngLat>,
    /// Fill colour as a hex string.
    pub color: String,
    /// Fill opacity in `0..=1`.
    pub opacity: f64,
    /// Operator submitting the zone.
    pub created_by: String,
}

/// A partial update. `None` fields are left unchanged; geometry cannot be
/// updated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoneUpdate {
    /// New display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// New fill colour.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    /// New fill opacity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opacity: Option<f64>,
    /// Soft-delete (`false`) or restore (`true`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
}

impl ZoneUpdate {
    /// Whether the update changes nothing.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.color.is_none()
            && self.opacity.is_none()
            && self.is_active.is_none()
    }

    /// Returns `zone` with this update's fields applied.
    #[must_use]
    pub fn apply_to(&self, mut zone: Zone) -> Zone {
        if let Some(name) = &self.name {
            zone.name.clone_from(name);
        }
        if let Some(color) = &self.color {
            zone.color.clone_from(color);
        }
        if let Some(opacity) = self.opacity {
            zone.opacity = opacity;
        }
        if let Some(is_active) = self.is_active {
            zone.is_active = is_active;
        }
        zone
    }
}

/// Kind of change carried by a zone store notification.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ZoneChangeOp {
    /// A zone was created.
    Insert,
    /// A zone was updated (including soft delete).
    Update,
    /// A zone was hard-deleted.
    Delete,
}

/// A change notification pushed by the zone store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoneChange {
    /// What happened.
    pub op: ZoneChangeOp,
    /// The zone after the change (before it, for deletes).
    pub zone: Zone,
}

/// Applies a change notification to a zone list, returning the new list.
///
/// Inserts and updates replace a zone with the same id in place, or append
/// when it is absent; deletes remove it. The input is never mutated.
#[must_use]
pub fn apply_change(zones: &[Zone], change: &ZoneChange) -> Vec<Zone> {
    let mut next = zones.to_vec();
    let position = next.iter().position(|z| z.id == change.zone.id);

    match (change.op, position) {
        (ZoneChangeOp::Insert | ZoneChangeOp::Update, Some(idx)) => {
            next[idx] = change.zone.clone();
        }
        (ZoneChangeOp::Insert | ZoneChangeOp::Update, None) => next.push(change.zone.clone()),
        (ZoneChangeOp::Delete, Some(idx)) => {
            next.remove(idx);
        }
        (ZoneChangeOp::Delete, None) => {}
    }

    next
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zone(id: &str) -> Zone {
        Zone {
            id: id.to_string(),
            name: format!("Zone {id}"),
            description: None,
            geometry: vec![
                LngLat::new(0.0, 0.0),
                LngLat::new(0.0, 1.0),
                LngLat::new(1.0, 1.0),
                LngLat::new(0.0, 0.0),
            ],
            color: "#ef4444".to_string(),
            opacity: 0.3,
            created_by: "dispatcher-1".to_string(),
            is_active: true,
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    #[test]
    fn update_only_touches_given_fields() {
        let update = ZoneUpdate {
            name: Some("Staging".to_string()),
            opacity: Some(0.8),
            ..ZoneUpdate::default()
        };
        let before = zone("a");
        let after = update.apply_to(before.clone());
        assert_eq!(after.name, "Staging");
        assert!((after.opacity - 0.8).abs() < f64::EPSILON);
        assert_eq!(after.color, before.color);
        assert_eq!(after.geometry, before.geometry);
        assert!(after.is_active);
    }

    #[test]
    fn empty_update_is_detected() {
        assert!(ZoneUpdate::default().is_empty());
        assert!(
            !ZoneUpdate {
                is_active: Some(false),
                ..ZoneUpdate::default()
            }
            .is_empty()
        );
    }

    #[test]
    fn apply_change_upserts_and_deletes() {
        let zones = vec![zone("a"), zone("b")];

        let mut renamed = zone("b");
        renamed.name = "Renamed".to_string();
        let next = apply_change(
            &zones,
            &ZoneChange {
                op: ZoneChangeOp::Update,
                zone: renamed,
            },
        );
        assert_eq!(next[1].name, "Renamed");
        assert_eq!(zones[1].name, "Zone b");

        let next = apply_change(
            &next,
            &ZoneChange {
                op: ZoneChangeOp::Insert,
                zone: zone("c"),
            },
        );
        let ids: Vec<&str> = next.iter().map(|z| z.id.as_str()).collect();
        assert_eq!(ids, ["a", "b", "c"]);

        let next = apply_change(
            &next,
            &ZoneChange {
                op: ZoneChangeOp::Delete,
                zone: zone("a"),
            },
        );
        let ids: Vec<&str> = next.iter().map(|z| z.id.as_str()).collect();
        assert_eq!(ids, ["b", "c"]);
    }

    #[test]
    fn zone_uses_camel_case_on_the_wire() {
        let json = serde_json::to_value(zone("a")).unwrap();
        assert!(json.get("createdBy").is_some());
        assert!(json.get("isActive").is_some());
        assert_eq!(json["geometry"][1], serde_json::json!([0.0, 1.0]));
    }
}
