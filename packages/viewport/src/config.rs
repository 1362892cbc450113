//! Viewport and highlight tunables loaded from TOML.
//!
//! Every field is optional in TOML and falls back to the defaults embedded
//! from `config/default.toml`.

use std::path::Path;
use std::time::Duration;

use event_map_cluster::ClusterOptions;
use event_map_viewport_models::MAX_ZOOM;
use serde::{Deserialize, Serialize};

use crate::ConfigError;
use crate::highlight::RetryPolicy;

/// The default configuration file, embedded at compile time.
pub const DEFAULT_CONFIG_TOML: &str = include_str!("../config/default.toml");

/// Tunables for clustering, geofencing, and highlight retries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapConfig {
    /// Physical size of a clustering grid cell.
    #[serde(default = "default_cluster_radius_meters")]
    pub cluster_radius_meters: f64,
    /// Widen clustering cells away from the equator.
    #[serde(default)]
    pub latitude_corrected_cells: bool,
    /// Slack past the geofence radius before the view is clamped.
    #[serde(default = "default_geofence_tolerance_meters")]
    pub geofence_tolerance_meters: f64,
    /// Maximum distance between a remembered center and the geofence
    /// center for the remembered center to be trusted.
    #[serde(default = "default_drift_limit_meters")]
    pub drift_limit_meters: f64,
    /// Zoom used when centering on a single event.
    #[serde(default = "default_detail_zoom")]
    pub detail_zoom: u8,
    /// Zoom used when centering on the geofence.
    #[serde(default = "default_neighborhood_zoom")]
    pub neighborhood_zoom: u8,
    /// Popup-open attempt offsets, in milliseconds after acceptance.
    #[serde(default = "default_highlight_retry_delays_ms")]
    pub highlight_retry_delays_ms: Vec<u64>,
    /// How long a highlight keeps priority over other recentering.
    #[serde(default = "default_highlight_window_ms")]
    pub highlight_window_ms: u64,
}

const fn default_cluster_radius_meters() -> f64 {
    50.0
}

const fn default_geofence_tolerance_meters() -> f64 {
    10.0
}

const fn default_drift_limit_meters() -> f64 {
    1000.0
}

const fn default_detail_zoom() -> u8 {
    16
}

const fn default_neighborhood_zoom() -> u8 {
    13
}

fn default_highlight_retry_delays_ms() -> Vec<u64> {
    vec![200, 500, 1000, 2000]
}

const fn default_highlight_window_ms() -> u64 {
    5500
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            cluster_radius_meters: default_cluster_radius_meters(),
            latitude_corrected_cells: false,
            geofence_tolerance_meters: default_geofence_tolerance_meters(),
            drift_limit_meters: default_drift_limit_meters(),
            detail_zoom: default_detail_zoom(),
            neighborhood_zoom: default_neighborhood_zoom(),
            highlight_retry_delays_ms: default_highlight_retry_delays_ms(),
            highlight_window_ms: default_highlight_window_ms(),
        }
    }
}

impl MapConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Toml`] if the document does not parse and
    /// [`ConfigError::Invalid`] if a value is out of range.
    pub fn from_toml_str(toml_str: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses, and validates a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, otherwise
    /// the same errors as [`Self::from_toml_str`].
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        log::debug!("Loading map config from {}", path.display());
        Self::from_toml_str(&contents)
    }

    /// Checks that every value is usable.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first bad value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.cluster_radius_meters.is_finite() && self.cluster_radius_meters > 0.0) {
            return Err(invalid(format!(
                "cluster_radius_meters must be positive, got {}",
                self.cluster_radius_meters
            )));
        }
        if !(self.geofence_tolerance_meters.is_finite() && self.geofence_tolerance_meters >= 0.0)
        {
            return Err(invalid(format!(
                "geofence_tolerance_meters must be non-negative, got {}",
                self.geofence_tolerance_meters
            )));
        }
        if !(self.drift_limit_meters.is_finite() && self.drift_limit_meters > 0.0) {
            return Err(invalid(format!(
                "drift_limit_meters must be positive, got {}",
                self.drift_limit_meters
            )));
        }
        for (name, zoom) in [
            ("detail_zoom", self.detail_zoom),
            ("neighborhood_zoom", self.neighborhood_zoom),
        ] {
            if zoom > MAX_ZOOM {
                return Err(invalid(format!(
                    "{name} must be at most {MAX_ZOOM}, got {zoom}"
                )));
            }
        }
        if self.highlight_retry_delays_ms.is_empty() {
            return Err(invalid("highlight_retry_delays_ms must not be empty"));
        }
        if self
            .highlight_retry_delays_ms
            .windows(2)
            .any(|pair| pair[0] >= pair[1])
        {
            return Err(invalid(format!(
                "highlight_retry_delays_ms must be strictly increasing, got {:?}",
                self.highlight_retry_delays_ms
            )));
        }
        if self.highlight_window_ms == 0 {
            return Err(invalid("highlight_window_ms must be positive"));
        }
        Ok(())
    }

    /// Retry schedule for opening highlighted popups.
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::from_millis(&self.highlight_retry_delays_ms)
    }

    /// How long a highlight request stays fresh.
    #[must_use]
    pub const fn highlight_window(&self) -> Duration {
        Duration::from_millis(self.highlight_window_ms)
    }

    /// Options for the event clusterer.
    #[must_use]
    pub const fn cluster_options(&self) -> ClusterOptions {
        ClusterOptions {
            radius_meters: self.cluster_radius_meters,
            latitude_corrected: self.latitude_corrected_cells,
        }
    }
}

fn invalid(message: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        message: message.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_default_matches_default_impl() {
        let parsed = MapConfig::from_toml_str(DEFAULT_CONFIG_TOML).unwrap();
        assert_eq!(parsed, MapConfig::default());
    }

    #[test]
    fn empty_document_uses_defaults() {
        assert_eq!(MapConfig::from_toml_str("").unwrap(), MapConfig::default());
    }

    #[test]
    fn partial_document_overrides_only_given_keys() {
        let config = MapConfig::from_toml_str(
            "detail_zoom = 18\nhighlight_retry_delays_ms = [100, 300]\n",
        )
        .unwrap();
        assert_eq!(config.detail_zoom, 18);
        assert_eq!(config.highlight_retry_delays_ms, vec![100, 300]);
        assert_eq!(config.neighborhood_zoom, 13);
        assert_eq!(config.retry_policy().attempts(), 2);
    }

    #[test]
    fn rejects_bad_values() {
        for doc in [
            "cluster_radius_meters = 0.0",
            "cluster_radius_meters = nan",
            "geofence_tolerance_meters = -1.0",
            "drift_limit_meters = 0.0",
            "detail_zoom = 30",
            "highlight_retry_delays_ms = []",
            "highlight_retry_delays_ms = [500, 200]",
            "highlight_window_ms = 0",
        ] {
            let err = MapConfig::from_toml_str(doc).unwrap_err();
            assert!(
                matches!(err, ConfigError::Invalid { .. }),
                "expected invalid for {doc:?}, got {err}"
            );
        }
    }

    #[test]
    fn rejects_malformed_toml() {
        let err = MapConfig::from_toml_str("detail_zoom = ").unwrap_err();
        assert!(matches!(err, ConfigError::Toml(_)));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = MapConfig::from_path(Path::new("/nonexistent/event_map.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
