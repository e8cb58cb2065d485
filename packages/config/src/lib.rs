#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Engine configuration.
//!
//! Defaults are compiled in from `config/default.toml`. An operator file
//! may override any subset of keys, and a few settings can also be
//! overridden through environment variables:
//!
//! | Variable | Setting |
//! |---|---|
//! | `RESPONSE_MAP_ROUTING_URL` | `routing.base_url` |
//! | `RESPONSE_MAP_DEBOUNCE_MS` | `recompute.debounce_ms` |

use std::path::Path;
use std::time::Duration;

use response_map_analysis_models::ClusterPalette;
use response_map_isochrone::AdapterOptions;
use serde::{Deserialize, Serialize};
use thiserror::Error;

const DEFAULT_TOML: &str = include_str!("../config/default.toml");

/// Environment variable overriding [`RoutingConfig::base_url`].
pub const ROUTING_URL_ENV: &str = "RESPONSE_MAP_ROUTING_URL";

/// Environment variable overriding [`RecomputeConfig::debounce_ms`].
pub const DEBOUNCE_MS_ENV: &str = "RESPONSE_MAP_DEBOUNCE_MS";

/// Errors from loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The override file could not be read.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A TOML document is malformed or has the wrong shape.
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// A setting is out of range.
    #[error("Invalid configuration: {message}")]
    Invalid {
        /// Which setting and why.
        message: String,
    },
}

/// Complete engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// `[clustering]` table.
    pub clustering: ClusteringConfig,
    /// `[sweep]` table.
    pub sweep: SweepConfig,
    /// `[recompute]` table.
    pub recompute: RecomputeConfig,
    /// `[routing]` table.
    pub routing: RoutingConfig,
}

/// Map-density clustering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusteringConfig {
    /// Join distance from a cluster's seed point.
    pub radius_meters: f64,
    /// Marker colour per entity kind.
    pub palette: ClusterPalette,
}

/// Defaults for operator sweeps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepConfig {
    /// Radius offered when an operator starts a sweep.
    pub default_radius_meters: f64,
    /// Fill colour for new sweeps.
    pub default_color: String,
}

/// Recomputation scheduling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecomputeConfig {
    /// Window over which bursts of entity updates are coalesced.
    pub debounce_ms: u64,
}

impl RecomputeConfig {
    /// The debounce window as a [`Duration`].
    #[must_use]
    pub const fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

/// The external routing service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingConfig {
    /// Service root; requests go to `{base_url}/isochrone`.
    pub base_url: String,
    /// Per-attempt timeout.
    pub timeout_secs: u64,
    /// Pause before the single retry.
    pub retry_backoff_ms: u64,
    /// Colour per time band.
    pub band_colors: Vec<String>,
}

impl RoutingConfig {
    /// Options for an [`IsochroneAdapter`](response_map_isochrone::IsochroneAdapter).
    #[must_use]
    pub fn adapter_options(&self) -> AdapterOptions {
        AdapterOptions {
            timeout: Duration::from_secs(self.timeout_secs),
            retry_backoff: Duration::from_millis(self.retry_backoff_ms),
            band_colors: self.band_colors.clone(),
        }
    }
}

impl EngineConfig {
    /// The compiled-in defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Toml`] if the embedded defaults are malformed.
    pub fn embedded() -> Result<Self, ConfigError> {
        Ok(toml::de::from_str(DEFAULT_TOML)?)
    }

    /// Reads an override file and layers it over the defaults.
    ///
    /// Keys missing from the file keep their default values. The result is
    /// validated.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed, or the
    /// merged configuration is invalid.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let overrides = std::fs::read_to_string(path)?;
        log::info!("Loading engine configuration overrides from {}", path.display());
        Self::from_overrides(&overrides)
    }

    /// Layers a TOML document over the defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the document cannot be parsed or the
    /// merged configuration is invalid.
    pub fn from_overrides(overrides: &str) -> Result<Self, ConfigError> {
        let mut merged: toml::Table = toml::de::from_str(DEFAULT_TOML)?;
        let overrides: toml::Table = toml::de::from_str(overrides)?;
        merge(&mut merged, overrides);

        let config: Self = toml::Value::Table(merged).try_into()?;
        config.validate()?;
        Ok(config)
    }

    /// Applies overrides from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if a variable is set to an
    /// unusable value.
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Applies overrides looked up through `lookup`, keyed by environment
    /// variable name.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if a value is unusable.
    pub fn with_overrides_from(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(url) = lookup(ROUTING_URL_ENV) {
            log::debug!("{ROUTING_URL_ENV} overrides routing.base_url");
            self.routing.base_url = url;
        }
        if let Some(raw) = lookup(DEBOUNCE_MS_ENV) {
            self.recompute.debounce_ms =
                raw.trim().parse().map_err(|_| ConfigError::Invalid {
                    message: format!("{DEBOUNCE_MS_ENV} must be an integer, got {raw:?}"),
                })?;
        }
        self.validate()?;
        Ok(self)
    }

    /// Checks every setting against its allowed range.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first bad setting.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |message: String| Err(ConfigError::Invalid { message });

        let radius = self.clustering.radius_meters;
        if !radius.is_finite() || radius <= 0.0 {
            return invalid(format!("clustering.radius_meters must be positive, got {radius}"));
        }
        let radius = self.sweep.default_radius_meters;
        if !radius.is_finite() || radius <= 0.0 {
            return invalid(format!(
                "sweep.default_radius_meters must be positive, got {radius}"
            ));
        }
        if !(250..=500).contains(&self.recompute.debounce_ms) {
            return invalid(format!(
                "recompute.debounce_ms must be within 250..=500, got {}",
                self.recompute.debounce_ms
            ));
        }
        if !(8..=10).contains(&self.routing.timeout_secs) {
            return invalid(format!(
                "routing.timeout_secs must be within 8..=10, got {}",
                self.routing.timeout_secs
            ));
        }
        if self.routing.base_url.trim().is_empty() {
            return invalid("routing.base_url must not be empty".to_string());
        }
        if self.routing.band_colors.is_empty() {
            return invalid("routing.band_colors must list at least one colour".to_string());
        }
        Ok(())
    }
}

/// Recursively overlays `overrides` onto `base`. Tables merge key by key;
/// any other value replaces the base value outright.
fn merge(base: &mut toml::Table, overrides: toml::Table) {
    for (key, value) in overrides {
        match value {
            toml::Value::Table(incoming) => {
                if let Some(toml::Value::Table(existing)) = base.get_mut(&key) {
                    merge(existing, incoming);
                } else {
                    base.insert(key, toml::Value::Table(incoming));
                }
            }
            other => {
                base.insert(key, other);
            }
        }
    }
}
