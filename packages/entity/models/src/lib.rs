#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Trackable point entity types.
//!
//! Every object drawn as a marker on the live map (incidents, helpers,
//! responders, hospitals) is an [`Entity`]. Entities are immutable
//! snapshots: the live feed supersedes them by `id` rather than mutating
//! them, and an [`EntitySnapshot`] holds the current list of each kind.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// The closed set of trackable entity kinds.
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
pub enum EntityType {
    /// A reported emergency.
    Incident,
    /// A volunteer helper.
    Helper,
    /// A professional responder (EMS, fire, police).
    Responder,
    /// A receiving hospital.
    Hospital,
}

impl EntityType {
    /// Returns all variants of this enum.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Incident, Self::Helper, Self::Responder, Self::Hospital]
    }
}

/// Lifecycle status reported by the live feed.
///
/// The feed shares one status vocabulary across entity kinds. Values the
/// engine does not recognise deserialize to [`EntityStatus::Unknown`].
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
pub enum EntityStatus {
    // ── Incidents ───────────────────────────────────────
    /// Reported, not yet triaged.
    Pending,
    /// Open and being worked.
    Active,
    /// Closed out.
    Resolved,

    // ── Helpers / responders ────────────────────────────
    /// Free to take an assignment.
    Available,
    /// Occupied with something else.
    Busy,
    /// Attached to an incident.
    Assigned,
    /// Travelling to an incident.
    EnRoute,
    /// Not reachable.
    Offline,

    // ── Hospitals ───────────────────────────────────────
    /// Accepting patients.
    Open,
    /// Not accepting patients.
    Closed,

    /// Any value outside this vocabulary.
    #[serde(other)]
    Unknown,
}

/// A single trackable point on the map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    /// Stable identifier assigned by the feed.
    pub id: String,
    /// Entity kind.
    #[serde(rename = "type")]
    pub entity_type: EntityType,
    /// Latitude (WGS84).
    pub latitude: f64,
    /// Longitude (WGS84).
    pub longitude: f64,
    /// Current status.
    pub status: EntityStatus,
    /// When the entity was first reported. Incidents only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    /// When the incident was resolved, if it has been.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,
}

impl Entity {
    /// Creates an entity with no timestamps.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        entity_type: EntityType,
        longitude: f64,
        latitude: f64,
        status: EntityStatus,
    ) -> Self {
        Self {
            id: id.into(),
            entity_type,
            latitude,
            longitude,
            status,
            created_at: None,
            resolved_at: None,
        }
    }

    /// Returns a copy carrying the given creation/resolution timestamps.
    #[must_use]
    pub fn with_timestamps(
        mut self,
        created_at: Option<DateTime<Utc>>,
        resolved_at: Option<DateTime<Utc>>,
    ) -> Self {
        self.created_at = created_at;
        self.resolved_at = resolved_at;
        self
    }

    /// Time from report to resolution, if both timestamps are present and
    /// ordered.
    #[must_use]
    pub fn resolution_time(&self) -> Option<chrono::Duration> {
        let created = self.created_at?;
        let resolved = self.resolved_at?;
        let elapsed = resolved - created;
        (elapsed >= chrono::Duration::zero()).then_some(elapsed)
    }
}

/// Kind of change carried by a live feed event.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FeedOp {
    /// A new entity appeared.
    Insert,
    /// An existing entity was superseded.
    Update,
    /// An entity was removed.
    Delete,
}

/// One event from the live entity feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedEvent {
    /// What happened.
    pub op: FeedOp,
    /// Which list the feed filed the entity under. Routing uses
    /// `entity.entity_type`; this field is informational.
    pub entity_type: EntityType,
    /// The entity as of this event.
    pub entity: Entity,
}

/// The current entity lists, replaced wholesale on every update.
///
/// Lists are shared behind [`Arc`] so cloning a snapshot is cheap and
/// readers never observe a list being mutated.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntitySnapshot {
    /// Reported incidents.
    pub incidents: Arc<Vec<Entity>>,
    /// Volunteer helpers.
    pub helpers: Arc<Vec<Entity>>,
    /// Professional responders.
    pub responders: Arc<Vec<Entity>>,
    /// Hospitals.
    pub hospitals: Arc<Vec<Entity>>,
}

impl EntitySnapshot {
    /// Builds a snapshot by partitioning a mixed list on [`Entity::entity_type`].
    ///
    /// Input order is preserved within each list.
    #[must_use]
    pub fn from_entities(entities: impl IntoIterator<Item = Entity>) -> Self {
        let mut incidents = Vec::new();
        let mut helpers = Vec::new();
        let mut responders = Vec::new();
        let mut hospitals = Vec::new();

        for entity in entities {
            match entity.entity_type {
                EntityType::Incident => incidents.push(entity),
                EntityType::Helper => helpers.push(entity),
                EntityType::Responder => responders.push(entity),
                EntityType::Hospital => hospitals.push(entity),
            }
        }

        Self {
            incidents: Arc::new(incidents),
            helpers: Arc::new(helpers),
            responders: Arc::new(responders),
            hospitals: Arc::new(hospitals),
        }
    }

    /// Returns the list for one entity kind.
    #[must_use]
    pub fn of_type(&self, entity_type: EntityType) -> &[Entity] {
        match entity_type {
            EntityType::Incident => &self.incidents,
            EntityType::Helper => &self.helpers,
            EntityType::Responder => &self.responders,
            EntityType::Hospital => &self.hospitals,
        }
    }

    /// All entities in a stable order: incidents, helpers, responders,
    /// hospitals.
    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        EntityType::all()
            .iter()
            .flat_map(move |t| self.of_type(*t).iter())
    }

    /// Total number of entities across all lists.
    #[must_use]
    pub fn len(&self) -> usize {
        self.incidents.len() + self.helpers.len() + self.responders.len() + self.hospitals.len()
    }

    /// Whether every list is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns a new snapshot with `event` applied to the list for the
    /// entity's own [`Entity::entity_type`], the same key
    /// [`from_entities`](Self::from_entities) partitions on.
    ///
    /// Insert and update both replace any entity with the same id in place
    /// (or append when absent). Delete removes it. Only the touched list is
    /// reallocated; the others stay shared with `self`.
    #[must_use]
    pub fn apply(&self, event: &FeedEvent) -> Self {
        let entity_type = event.entity.entity_type;
        let current = self.of_type(entity_type);
        let mut next: Vec<Entity> = current.to_vec();
        let position = next.iter().position(|e| e.id == event.entity.id);

        match (event.op, position) {
            (FeedOp::Insert | FeedOp::Update, Some(idx)) => next[idx] = event.entity.clone(),
            (FeedOp::Insert | FeedOp::Update, None) => next.push(event.entity.clone()),
            (FeedOp::Delete, Some(idx)) => {
                next.remove(idx);
            }
            (FeedOp::Delete, None) => {}
        }

        let mut snapshot = self.clone();
        let next = Arc::new(next);
        match entity_type {
            EntityType::Incident => snapshot.incidents = next,
            EntityType::Helper => snapshot.helpers = next,
            EntityType::Responder => snapshot.responders = next,
            EntityType::Hospital => snapshot.hospitals = next,
        }
        snapshot
    }
}
