#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Grid-based proximity clustering for event markers.
//!
//! Events are bucketed into fixed-size grid cells; every non-empty cell
//! becomes one [`EventMarkerGroup`]. The grid is derived from a physical
//! radius with the flat meters-to-degrees approximation, which is fine for
//! city-scale clustering away from the poles. Clustering depends only on
//! the event list, so callers re-run it when the events change, not when
//! the viewport moves.

use std::collections::BTreeMap;

use event_map_geo::meters_to_degrees;
use event_map_viewport_models::{EventMarkerGroup, EventSummary};
use serde::{Deserialize, Serialize};

/// Default clustering radius in meters.
pub const DEFAULT_CLUSTER_RADIUS_METERS: f64 = 50.0;

/// Smallest `cos(latitude)` used when widening longitude cells, so rows
/// near the poles don't blow up.
const MIN_LATITUDE_SCALE: f64 = 0.01;

/// Tunables for [`GridClusterer`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterOptions {
    /// Physical size of a grid cell in meters.
    pub radius_meters: f64,
    /// Widen longitude cells by `1 / cos(latitude)` of their row.
    pub latitude_corrected: bool,
}

impl Default for ClusterOptions {
    fn default() -> Self {
        Self {
            radius_meters: DEFAULT_CLUSTER_RADIUS_METERS,
            latitude_corrected: false,
        }
    }
}

/// Result of clustering an event list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Clustering {
    /// One group per occupied grid cell, ordered by first appearance.
    pub groups: Vec<EventMarkerGroup>,
    /// IDs of events without a usable coordinate.
    pub unplaced: Vec<String>,
}

impl Clustering {
    /// The group containing `event_id`, if it was placed.
    #[must_use]
    pub fn group_for_event(&self, event_id: &str) -> Option<&EventMarkerGroup> {
        self.groups.iter().find(|g| g.contains(event_id))
    }

    /// The group with the given key.
    #[must_use]
    pub fn group(&self, key: &str) -> Option<&EventMarkerGroup> {
        self.groups.iter().find(|g| g.key == key)
    }

    /// Number of events placed into groups.
    #[must_use]
    pub fn placed_count(&self) -> usize {
        self.groups.iter().map(|g| g.members.len()).sum()
    }
}

/// Buckets events into square grid cells.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridClusterer {
    cell_degrees: f64,
    latitude_corrected: bool,
}

impl Default for GridClusterer {
    fn default() -> Self {
        Self::from_options(ClusterOptions::default())
    }
}

impl GridClusterer {
    /// Creates a clusterer with cells of roughly `radius_meters`.
    ///
    /// A non-finite or non-positive radius falls back to
    /// [`DEFAULT_CLUSTER_RADIUS_METERS`].
    #[must_use]
    pub fn new(radius_meters: f64) -> Self {
        Self::from_options(ClusterOptions {
            radius_meters,
            ..ClusterOptions::default()
        })
    }

    /// Creates a clusterer from [`ClusterOptions`].
    #[must_use]
    pub fn from_options(options: ClusterOptions) -> Self {
        let radius = if options.radius_meters.is_finite() && options.radius_meters > 0.0 {
            options.radius_meters
        } else {
            log::warn!(
                "Invalid cluster radius {}, using {DEFAULT_CLUSTER_RADIUS_METERS}m",
                options.radius_meters
            );
            DEFAULT_CLUSTER_RADIUS_METERS
        };

        Self {
            cell_degrees: meters_to_degrees(radius),
            latitude_corrected: options.latitude_corrected,
        }
    }

    /// Cell size in degrees of latitude.
    #[must_use]
    pub const fn cell_degrees(&self) -> f64 {
        self.cell_degrees
    }

    /// Grid cell `(row, col)` for a valid coordinate.
    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    fn cell(&self, latitude: f64, longitude: f64) -> (i64, i64) {
        let row = (latitude / self.cell_degrees).round() as i64;
        let lon_cell = if self.latitude_corrected {
            let row_latitude = row as f64 * self.cell_degrees;
            self.cell_degrees / row_latitude.to_radians().cos().max(MIN_LATITUDE_SCALE)
        } else {
            self.cell_degrees
        };
        let col = (longitude / lon_cell).round() as i64;
        (row, col)
    }

    /// Stable identifier for a grid cell.
    fn cell_key((row, col): (i64, i64)) -> String {
        format!("cell:{row}:{col}")
    }

    /// Groups events by grid cell.
    ///
    /// Events without a valid coordinate are excluded and listed in
    /// [`Clustering::unplaced`]. An empty input yields zero groups.
    #[must_use]
    pub fn cluster(&self, events: &[EventSummary]) -> Clustering {
        let mut index: BTreeMap<(i64, i64), usize> = BTreeMap::new();
        let mut clustering = Clustering::default();

        for event in events {
            let Some(coordinate) = event.placed_coordinate() else {
                clustering.unplaced.push(event.id.clone());
                continue;
            };

            let cell = self.cell(coordinate.latitude, coordinate.longitude);
            let slot = *index.entry(cell).or_insert_with(|| {
                clustering.groups.push(EventMarkerGroup {
                    key: Self::cell_key(cell),
                    position: coordinate,
                    members: Vec::new(),
                });
                clustering.groups.len() - 1
            });
            clustering.groups[slot].members.push(event.clone());
        }

        if !clustering.unplaced.is_empty() {
            log::debug!(
                "{} of {} events have no usable coordinate and were not clustered",
                clustering.unplaced.len(),
                events.len()
            );
        }
        log::trace!(
            "Clustered {} events into {} groups",
            clustering.placed_count(),
            clustering.groups.len()
        );

        clustering
    }
}
