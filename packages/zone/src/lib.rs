#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Zone store for operator-drawn regions.
//!
//! [`ZoneStore`] validates drafts and updates, forwards them to the
//! external persistence collaborator (any [`ZoneBackend`]), and keeps the
//! most recently listed zones as an immutable snapshot. It is the only
//! component that writes; mutations are serialized per zone id while
//! different zones may be mutated concurrently.
//!
//! [`memory::InMemoryZoneBackend`] implements the collaborator in-process
//! and is what the rest of the workspace tests against.

pub mod memory;
pub mod store;
pub mod validate;

use async_trait::async_trait;
use futures::stream::BoxStream;
use response_map_geometry::GeometryError;
use response_map_zone_models::{Zone, ZoneChange, ZoneDraft, ZoneUpdate};
use thiserror::Error;

pub use store::ZoneStore;

/// Errors reported by the persistence collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ZoneBackendError {
    /// No zone with this id exists.
    #[error("Zone not found: {id}")]
    NotFound {
        /// The missing id.
        id: String,
    },

    /// The store could not be reached or rejected the write.
    #[error("Zone store unavailable: {message}")]
    Unavailable {
        /// Description of what went wrong.
        message: String,
    },
}

/// Reasons a draft or update is rejected before it reaches the store.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// The polygon ring is malformed.
    #[error("Invalid zone geometry: {0}")]
    Geometry(#[from] GeometryError),

    /// The name is empty or whitespace.
    #[error("Zone name must not be empty")]
    EmptyName,

    /// The creator is empty or whitespace.
    #[error("Zone creator must not be empty")]
    EmptyCreator,

    /// Opacity is outside `0..=1` or not finite.
    #[error("Opacity must be between 0 and 1, got {value}")]
    Opacity {
        /// The rejected value.
        value: f64,
    },

    /// Colour is not a `#rgb` or `#rrggbb` hex string.
    #[error("Color must be a #rgb or #rrggbb hex string, got {value:?}")]
    Color {
        /// The rejected value.
        value: String,
    },

    /// The update changes nothing.
    #[error("Zone update contains no fields")]
    EmptyUpdate,
}

/// Errors surfaced by [`ZoneStore`] operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ZoneError {
    /// The draft or update failed validation.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// The zone id does not exist.
    #[error("Zone not found: {id}")]
    NotFound {
        /// The missing id.
        id: String,
    },

    /// The store failed for another reason.
    #[error("Zone store error: {0}")]
    Backend(ZoneBackendError),
}

impl From<ZoneBackendError> for ZoneError {
    fn from(err: ZoneBackendError) -> Self {
        match err {
            ZoneBackendError::NotFound { id } => Self::NotFound { id },
            other @ ZoneBackendError::Unavailable { .. } => Self::Backend(other),
        }
    }
}

/// The external, durable zone store.
///
/// Treated as a key-value store by id with a secondary filter on
/// `is_active`. Implementations assign ids and timestamps on insert.
#[async_trait]
pub trait ZoneBackend: Send + Sync {
    /// Returns zones whose `is_active` flag is set.
    ///
    /// # Errors
    ///
    /// Returns [`ZoneBackendError`] if the store cannot be read.
    async fn list_active_zones(&self) -> Result<Vec<Zone>, ZoneBackendError>;

    /// Returns every zone, active or not.
    ///
    /// # Errors
    ///
    /// Returns [`ZoneBackendError`] if the store cannot be read.
    async fn list_all_zones(&self) -> Result<Vec<Zone>, ZoneBackendError>;

    /// Persists a draft and returns the materialized zone.
    ///
    /// # Errors
    ///
    /// Returns [`ZoneBackendError`] if the write fails.
    async fn insert_zone(&self, draft: &ZoneDraft) -> Result<Zone, ZoneBackendError>;

    /// Applies a partial update and returns the updated zone.
    ///
    /// # Errors
    ///
    /// Returns [`ZoneBackendError::NotFound`] if `id` does not exist.
    async fn update_zone(&self, id: &str, fields: &ZoneUpdate) -> Result<Zone, ZoneBackendError>;

    /// Hard-deletes a zone.
    ///
    /// # Errors
    ///
    /// Returns [`ZoneBackendError::NotFound`] if `id` does not exist.
    async fn delete_zone(&self, id: &str) -> Result<(), ZoneBackendError>;

    /// Stream of change notifications for writes made by any client.
    fn changes(&self) -> BoxStream<'static, ZoneChange>;
}
