//! Timeout, retry, and last-request-wins handling around a
//! [`RoutingClient`].

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use response_map_geometry::{LngLat, validate_ring};
use tokio::sync::watch;

use crate::{IsochroneZone, RoutingClient, RoutingError};

/// Attempts per fetch: the first try plus one retry.
const MAX_ATTEMPTS: u32 = 2;

/// Tuning for [`IsochroneAdapter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterOptions {
    /// Upper bound on each attempt.
    pub timeout: Duration,
    /// Pause before the retry.
    pub retry_backoff: Duration,
    /// Colour per band, assigned by index and repeated when there are more
    /// bands than colours.
    pub band_colors: Vec<String>,
}

impl Default for AdapterOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            retry_backoff: Duration::from_secs(1),
            band_colors: vec![
                "#22c55e".to_string(),
                "#eab308".to_string(),
                "#ef4444".to_string(),
            ],
        }
    }
}

/// Fetches isochrones with request shaping and response validation.
pub struct IsochroneAdapter {
    client: Arc<dyn RoutingClient>,
    options: AdapterOptions,
    /// Latest request generation per rounded center.
    generations: Mutex<BTreeMap<String, watch::Sender<u64>>>,
}

impl IsochroneAdapter {
    /// Creates an adapter over `client` with no requests in flight.
    #[must_use]
    pub fn new(client: Arc<dyn RoutingClient>, options: AdapterOptions) -> Self {
        Self {
            client,
            options,
            generations: Mutex::new(BTreeMap::new()),
        }
    }

    /// Fetches one polygon per band around `center`.
    ///
    /// A newer `fetch` for the same center (to six decimal places) makes
    /// this one return [`RoutingError::Superseded`] instead of its result.
    /// Each attempt is bounded by the configured timeout; a failed attempt
    /// is retried once after the backoff unless the error is permanent.
    ///
    /// # Errors
    ///
    /// Returns [`RoutingError::InvalidRequest`] for an invalid center or
    /// band list, [`RoutingError::Superseded`] if overtaken, or the error of
    /// the last attempt.
    pub async fn fetch(
        &self,
        center: LngLat,
        time_bands_minutes: &[u32],
    ) -> Result<IsochroneZone, RoutingError> {
        validate_request(center, time_bands_minutes)?;

        let key = center_key(center);
        let (generation, mut latest) = self.begin(&key);

        let result = tokio::select! {
            biased;
            _ = superseded(&mut latest, generation) => Err(RoutingError::Superseded),
            result = self.fetch_with_retry(center, time_bands_minutes) => result,
        };

        // A result that raced a newer request is discarded.
        let result = if *latest.borrow() == generation {
            result
        } else {
            Err(RoutingError::Superseded)
        };

        self.finish(&key, generation);

        if matches!(result, Err(RoutingError::Superseded)) {
            log::debug!("Isochrone request for {center} superseded");
        }
        result
    }

    fn begin(&self, key: &str) -> (u64, watch::Receiver<u64>) {
        let mut generations = self
            .generations
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let sender = generations
            .entry(key.to_string())
            .or_insert_with(|| watch::channel(0).0);

        let generation = *sender.borrow() + 1;
        sender.send_replace(generation);
        (generation, sender.subscribe())
    }

    fn finish(&self, key: &str, generation: u64) {
        let mut generations = self
            .generations
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if generations
            .get(key)
            .is_some_and(|sender| *sender.borrow() == generation)
        {
            generations.remove(key);
        }
    }

    async fn fetch_with_retry(
        &self,
        center: LngLat,
        time_bands_minutes: &[u32],
    ) -> Result<IsochroneZone, RoutingError> {
        let mut attempt = 1;
        loop {
            match self.attempt(center, time_bands_minutes).await {
                Ok(zone) => return Ok(zone),
                Err(e) if e.is_retryable() && attempt < MAX_ATTEMPTS => {
                    log::warn!(
                        "Isochrone fetch for {center} failed ({e}), retry {attempt}/{} in {:?}",
                        MAX_ATTEMPTS - 1,
                        self.options.retry_backoff
                    );
                    tokio::time::sleep(self.options.retry_backoff).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn attempt(
        &self,
        center: LngLat,
        time_bands_minutes: &[u32],
    ) -> Result<IsochroneZone, RoutingError> {
        let rings = tokio::time::timeout(
            self.options.timeout,
            self.client.isochrone(center, time_bands_minutes),
        )
        .await
        .map_err(|_| RoutingError::Timeout)??;

        if rings.len() != time_bands_minutes.len() {
            return Err(RoutingError::BandMismatch {
                requested: time_bands_minutes.len(),
                returned: rings.len(),
            });
        }
        for ring in &rings {
            validate_ring(ring)?;
        }

        Ok(IsochroneZone {
            id: uuid::Uuid::new_v4().to_string(),
            center,
            time_bands_minutes: time_bands_minutes.to_vec(),
            colors: self.colors_for(time_bands_minutes.len()),
            geometry: rings,
        })
    }

    fn colors_for(&self, bands: usize) -> Vec<String> {
        self.options
            .band_colors
            .iter()
            .cycle()
            .take(bands)
            .cloned()
            .collect()
    }
}

fn validate_request(center: LngLat, time_bands_minutes: &[u32]) -> Result<(), RoutingError> {
    if center.checked().is_err() {
        return Err(RoutingError::InvalidRequest {
            message: format!("center {center} is not a valid position"),
        });
    }
    if time_bands_minutes.is_empty() {
        return Err(RoutingError::InvalidRequest {
            message: "at least one time band is required".to_string(),
        });
    }
    if time_bands_minutes.contains(&0) {
        return Err(RoutingError::InvalidRequest {
            message: "time bands must be positive".to_string(),
        });
    }
    Ok(())
}

fn center_key(center: LngLat) -> String {
    format!("{:.6},{:.6}", center.lon(), center.lat())
}

/// Resolves once a generation newer than `generation` is published.
async fn superseded(latest: &mut watch::Receiver<u64>, generation: u64) {
    if latest.wait_for(|g| *g != generation).await.is_err() {
        std::future::pending::<()>().await;
    }
}
