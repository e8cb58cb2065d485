//! `reqwest` client for the routing service's isochrone endpoint.
//!
//! `GET {base_url}/isochrone?center=lon,lat&bands=5,10&polygons=true`
//! answers with a `GeoJSON` `FeatureCollection` holding one polygon feature
//! per band.

use std::time::Duration;

use async_trait::async_trait;
use geojson::GeoJson;
use response_map_geometry::LngLat;

use crate::{RoutingClient, RoutingError};

/// [`RoutingClient`] talking to the routing service over HTTP.
pub struct HttpRoutingClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpRoutingClient {
    /// Creates a client for the service at `base_url`.
    ///
    /// `timeout` bounds each HTTP request at the transport level.
    ///
    /// # Errors
    ///
    /// Returns [`RoutingError::Http`] if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, RoutingError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/isochrone", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl RoutingClient for HttpRoutingClient {
    async fn isochrone(
        &self,
        center: LngLat,
        time_bands_minutes: &[u32],
    ) -> Result<Vec<Vec<LngLat>>, RoutingError> {
        let center_param = format!("{},{}", center.lon(), center.lat());
        let bands_param = time_bands_minutes
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",");

        let resp = self
            .client
            .get(self.endpoint())
            .query(&[
                ("center", center_param.as_str()),
                ("bands", bands_param.as_str()),
                ("polygons", "true"),
            ])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(RoutingError::Status {
                status: status.as_u16(),
            });
        }

        let body = resp.text().await?;
        parse_isochrone_response(&body)
    }
}

/// Parses a routing response into one exterior ring per feature, in the
/// order the features appear.
///
/// Accepts a `FeatureCollection`, a single `Feature`, or a bare geometry.
/// Each feature must carry a `Polygon`, or a `MultiPolygon` holding exactly
/// one polygon. Interior rings are discarded.
///
/// # Errors
///
/// Returns [`RoutingError::Parse`] if the body is not `GeoJSON` or a
/// feature has no usable polygon.
pub fn parse_isochrone_response(body: &str) -> Result<Vec<Vec<LngLat>>, RoutingError> {
    let geojson: GeoJson = body.parse().map_err(|e: geojson::Error| RoutingError::Parse {
        message: e.to_string(),
    })?;

    let geometries = match geojson {
        GeoJson::FeatureCollection(fc) => fc.features.into_iter().map(|f| f.geometry).collect(),
        GeoJson::Feature(f) => vec![f.geometry],
        GeoJson::Geometry(g) => vec![Some(g)],
    };

    geometries
        .into_iter()
        .enumerate()
        .map(|(index, geometry)| {
            let geometry = geometry.ok_or_else(|| RoutingError::Parse {
                message: format!("feature {index} has no geometry"),
            })?;
            exterior_ring(index, geometry)
        })
        .collect()
}

fn exterior_ring(index: usize, geometry: geojson::Geometry) -> Result<Vec<LngLat>, RoutingError> {
    let geo_geom: geo::Geometry<f64> = geometry.try_into().map_err(|e: geojson::Error| {
        RoutingError::Parse {
            message: format!("feature {index}: {e}"),
        }
    })?;

    let polygon = match geo_geom {
        geo::Geometry::Polygon(p) => p,
        geo::Geometry::MultiPolygon(mp) if mp.0.len() == 1 => {
            mp.0.into_iter().next().ok_or_else(|| RoutingError::Parse {
                message: format!("feature {index} has an empty multipolygon"),
            })?
        }
        _ => {
            return Err(RoutingError::Parse {
                message: format!("feature {index} is not a single polygon"),
            });
        }
    };

    Ok(polygon
        .exterior()
        .coords()
        .map(|c| LngLat::from(*c))
        .collect())
}
