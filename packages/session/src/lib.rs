#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Map session state and analysis scheduling.
//!
//! A [`MapSession`] is an immutable snapshot of the zones and entities on
//! the map. The orchestration layer owns the current session and replaces
//! it through [`MapSession::apply`]; nothing mutates a session in place,
//! so any number of readers can hold one while a newer one is built.
//!
//! [`pipeline::RecomputePipeline`] turns a stream of sessions into
//! debounced, strictly sequential cluster and stats recomputations.
//! [`follow::spawn_zone_follower`] feeds zone store notifications into the
//! same update path.

pub mod follow;
pub mod pipeline;

use std::sync::{Arc, OnceLock};

use chrono::Utc;
use response_map_analysis::{
    AnalysisError, analyze_sweep, cluster_with_palette, compute_all_stats_at,
};
use response_map_analysis_models::{GeoSweep, SweepResult};
use response_map_entity_models::{Entity, EntitySnapshot, FeedEvent};
use response_map_geometry::{GeometryError, LngLat};
use response_map_spatial::ZoneIndex;
use response_map_zone_models::{Zone, ZoneChange, apply_change};

pub use pipeline::{AnalysisFrame, PipelineSettings, RecomputePipeline};

/// One change to a [`MapSession`].
#[derive(Debug, Clone, PartialEq)]
pub enum SessionUpdate {
    /// Replace every entity list.
    ReplaceEntities(EntitySnapshot),
    /// Upsert or delete one entity.
    Entity(FeedEvent),
    /// Replace the zone list.
    ReplaceZones(Vec<Zone>),
    /// Apply one zone store notification.
    Zone(ZoneChange),
}

/// Immutable snapshot of everything the analysis engine reads.
#[derive(Clone, Default)]
pub struct MapSession {
    version: u64,
    zones: Arc<Vec<Zone>>,
    entities: EntitySnapshot,
    /// Built on first hit-test and shared by clones of this snapshot.
    index: Arc<OnceLock<Result<ZoneIndex, GeometryError>>>,
}

impl std::fmt::Debug for MapSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MapSession")
            .field("version", &self.version)
            .field("zones", &self.zones.len())
            .field("entities", &self.entities.len())
            .finish_non_exhaustive()
    }
}

impl MapSession {
    /// Creates a session at version 0.
    #[must_use]
    pub fn new(zones: Vec<Zone>, entities: EntitySnapshot) -> Self {
        Self {
            version: 0,
            zones: Arc::new(zones),
            entities,
            index: Arc::default(),
        }
    }

    /// Incremented by every [`apply`](Self::apply).
    #[must_use]
    pub const fn version(&self) -> u64 {
        self.version
    }

    /// All zones, active or not.
    #[must_use]
    pub fn zones(&self) -> &Arc<Vec<Zone>> {
        &self.zones
    }

    /// The entity lists.
    #[must_use]
    pub const fn entities(&self) -> &EntitySnapshot {
        &self.entities
    }

    /// Returns the session that results from `update`.
    ///
    /// Untouched lists are shared with `self`.
    #[must_use]
    pub fn apply(&self, update: SessionUpdate) -> Self {
        let mut next = self.clone();
        next.version = self.version + 1;

        match update {
            SessionUpdate::ReplaceEntities(entities) => next.entities = entities,
            SessionUpdate::Entity(event) => next.entities = self.entities.apply(&event),
            SessionUpdate::ReplaceZones(zones) => {
                next.zones = Arc::new(zones);
                next.index = Arc::default();
            }
            SessionUpdate::Zone(change) => {
                next.zones = Arc::new(apply_change(&self.zones, &change));
                next.index = Arc::default();
            }
        }

        next
    }

    /// Active zones strictly containing `point`, in zone-list order.
    ///
    /// # Errors
    ///
    /// Returns [`GeometryError`] if an active zone has a malformed ring or
    /// `point` is not finite.
    pub fn zones_at(&self, point: LngLat) -> Result<Vec<&Zone>, GeometryError> {
        let index = self
            .index
            .get_or_init(|| {
                let active: Vec<Zone> = self.zones.iter().filter(|z| z.is_active).cloned().collect();
                ZoneIndex::build(&active)
            })
            .as_ref()
            .map_err(Clone::clone)?;

        let ids = index.zones_containing(point)?;
        Ok(ids
            .into_iter()
            .filter_map(|id| self.zones.iter().find(|z| z.is_active && z.id == id))
            .collect())
    }

    /// Runs a sweep over every entity in the session.
    ///
    /// # Errors
    ///
    /// See [`analyze_sweep`].
    pub fn sweep(&self, sweep: &GeoSweep) -> Result<SweepResult, AnalysisError> {
        let candidates: Vec<Entity> = self.entities.iter().cloned().collect();
        analyze_sweep(sweep, &candidates)
    }

    /// Clusters every entity and computes stats for every active zone.
    ///
    /// # Errors
    ///
    /// Returns [`AnalysisError`] if any entity, zone, or setting is
    /// malformed.
    pub fn compute_frame(&self, settings: &PipelineSettings) -> Result<AnalysisFrame, AnalysisError> {
        let computed_at = Utc::now();
        let points: Vec<Entity> = self.entities.iter().cloned().collect();
        let clusters = cluster_with_palette(&points, settings.cluster_radius_meters, &settings.palette)?;
        let stats = compute_all_stats_at(&self.zones, &self.entities, computed_at)?;

        Ok(AnalysisFrame {
            version: self.version,
            clusters: Arc::new(clusters),
            stats: Arc::new(stats),
            computed_at,
        })
    }
}
