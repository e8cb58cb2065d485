#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Synchronous analysis over entity and zone snapshots.
//!
//! Every function here is a pure function of its arguments: it reads the
//! snapshots it is given and never mutates shared state, so callers may
//! run it on any worker thread without locking. Malformed input aborts the
//! whole call with an [`AnalysisError`]; there is no partial result.

pub mod cluster;
pub mod stats;
pub mod sweep;

use response_map_entity_models::Entity;
use response_map_geometry::{GeometryError, LngLat};
use thiserror::Error;

pub use cluster::{cluster, cluster_with_palette};
pub use stats::{compute_all_stats, compute_all_stats_at, compute_stats, compute_stats_at};
pub use sweep::{analyze, analyze_sweep};

/// Errors from the analysis functions.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnalysisError {
    /// An input point, radius, or polygon is malformed.
    #[error("Geometry error: {0}")]
    Geometry(#[from] GeometryError),
}

/// An entity's `[lon, lat]` position.
///
/// # Errors
///
/// Returns [`GeometryError::InvalidPoint`] if either coordinate is not
/// finite.
fn position(entity: &Entity) -> Result<LngLat, GeometryError> {
    let point = LngLat::new(entity.longitude, entity.latitude);
    if point.is_finite() {
        Ok(point)
    } else {
        Err(GeometryError::InvalidPoint { point })
    }
}
