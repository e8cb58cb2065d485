#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Isochrone fetching over an external routing service.
//!
//! The engine only shapes the request and validates the response: one
//! well-formed polygon must come back per requested time band. Returned
//! polygons are otherwise opaque.
//!
//! [`IsochroneAdapter`] wraps any [`RoutingClient`] with a per-attempt
//! timeout, a single retry, and last-request-wins cancellation per center.
//! [`http::HttpRoutingClient`] is the `reqwest`-backed client.

pub mod adapter;
pub mod http;

use async_trait::async_trait;
use response_map_geometry::{GeometryError, LngLat};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use adapter::{AdapterOptions, IsochroneAdapter};
pub use http::{HttpRoutingClient, parse_isochrone_response};

/// Errors from isochrone fetching.
#[derive(Debug, Error)]
pub enum RoutingError {
    /// The HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The routing service answered with a non-success status.
    #[error("Routing service returned HTTP {status}")]
    Status {
        /// HTTP status code.
        status: u16,
    },

    /// The attempt did not finish within the configured timeout.
    #[error("Routing request timed out")]
    Timeout,

    /// The response body was not a usable polygon collection.
    #[error("Failed to parse isochrone response: {message}")]
    Parse {
        /// What was wrong with the body.
        message: String,
    },

    /// The service returned a different number of polygons than bands
    /// requested.
    #[error("Requested {requested} time bands but received {returned} polygons")]
    BandMismatch {
        /// Bands requested.
        requested: usize,
        /// Polygons returned.
        returned: usize,
    },

    /// A returned polygon is malformed.
    #[error("Invalid isochrone geometry: {0}")]
    Geometry(#[from] GeometryError),

    /// A newer request for the same center was issued before this one
    /// completed.
    #[error("Superseded by a newer request for the same center")]
    Superseded,

    /// The request itself is invalid and was never sent.
    #[error("Invalid isochrone request: {message}")]
    InvalidRequest {
        /// What was wrong with the request.
        message: String,
    },
}

impl RoutingError {
    /// Whether a second attempt could plausibly succeed.
    ///
    /// Client errors (4xx other than 429), invalid requests, and superseded
    /// requests are permanent.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Superseded | Self::InvalidRequest { .. } => false,
            Self::Status { status } => *status == 429 || *status >= 500,
            Self::Http(e) => !e.is_builder(),
            Self::Timeout | Self::Parse { .. } | Self::BandMismatch { .. } | Self::Geometry(_) => {
                true
            }
        }
    }
}

/// Reachability polygons around a center, one per time band.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IsochroneZone {
    /// Identifier assigned when the response was accepted.
    pub id: String,
    /// Origin of the travel-time computation.
    pub center: LngLat,
    /// Requested travel times, in minutes.
    pub time_bands_minutes: Vec<u32>,
    /// Display colour per band.
    pub colors: Vec<String>,
    /// One closed ring per band, in the order the service returned them.
    pub geometry: Vec<Vec<LngLat>>,
}

/// The external routing service.
#[async_trait]
pub trait RoutingClient: Send + Sync {
    /// Requests one polygon ring per time band around `center`.
    ///
    /// # Errors
    ///
    /// Returns [`RoutingError`] if the request fails or the response
    /// cannot be parsed.
    async fn isochrone(
        &self,
        center: LngLat,
        time_bands_minutes: &[u32],
    ) -> Result<Vec<Vec<LngLat>>, RoutingError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_policy() {
        assert!(!RoutingError::Superseded.is_retryable());
        assert!(
            !RoutingError::InvalidRequest {
                message: "no bands".to_string()
            }
            .is_retryable()
        );
        assert!(!RoutingError::Status { status: 404 }.is_retryable());
        assert!(RoutingError::Status { status: 429 }.is_retryable());
        assert!(RoutingError::Status { status: 503 }.is_retryable());
        assert!(RoutingError::Timeout.is_retryable());
        assert!(
            RoutingError::BandMismatch {
                requested: 2,
                returned: 1
            }
            .is_retryable()
        );
    }
}
