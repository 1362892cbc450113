#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Shared types for the event map viewport.
//!
//! These types describe what flows into the map controller (events,
//! requested regions, geofences, highlight requests) and what it derives
//! from them (marker groups). They carry no behavior beyond validation so
//! the geometry, clustering, and controller crates can share them freely.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// Highest zoom level a [`Viewport`] may carry.
pub const MAX_ZOOM: u8 = 22;

/// A WGS84 latitude/longitude pair in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeoPoint {
    /// Latitude in degrees, valid in `[-90, 90]`.
    pub latitude: f64,
    /// Longitude in degrees, valid in `[-180, 180]`.
    pub longitude: f64,
}

impl GeoPoint {
    /// Creates a point without validating it.
    #[must_use]
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Creates a point, rejecting non-finite or out-of-range values.
    ///
    /// # Errors
    ///
    /// Returns an error if either component is not finite or lies outside
    /// its valid range.
    pub fn checked(latitude: f64, longitude: f64) -> Result<Self, InvalidCoordinateError> {
        let point = Self::new(latitude, longitude);
        if point.is_valid() {
            Ok(point)
        } else {
            Err(InvalidCoordinateError {
                latitude,
                longitude,
            })
        }
    }

    /// Whether both components are finite and within range.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }

    /// Returns `Some(self)` if the point is valid.
    #[must_use]
    pub fn valid(self) -> Option<Self> {
        self.is_valid().then_some(self)
    }
}

impl std::fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.6}, {:.6})", self.latitude, self.longitude)
    }
}

/// Error returned when a coordinate is not a usable [`GeoPoint`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InvalidCoordinateError {
    /// The rejected latitude.
    pub latitude: f64,
    /// The rejected longitude.
    pub longitude: f64,
}

impl std::fmt::Display for InvalidCoordinateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "invalid coordinate ({}, {}): expected finite latitude in [-90, 90] and longitude in [-180, 180]",
            self.latitude, self.longitude
        )
    }
}

impl std::error::Error for InvalidCoordinateError {}

/// The visible map region.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Viewport {
    /// Map center.
    pub center: GeoPoint,
    /// Integer zoom level (0 = whole world).
    pub zoom: u8,
    /// Visible latitude extent in degrees.
    pub latitude_span: f64,
    /// Visible longitude extent in degrees.
    pub longitude_span: f64,
}

impl Viewport {
    /// Builds a viewport at `zoom`, deriving spans from the zoom level.
    ///
    /// Zoom levels above [`MAX_ZOOM`] are capped.
    #[must_use]
    pub fn at_zoom(center: GeoPoint, zoom: u8) -> Self {
        let zoom = zoom.min(MAX_ZOOM);
        let longitude_span = 360.0 / f64::from(1u32 << zoom);
        Self {
            center,
            zoom,
            latitude_span: longitude_span / 2.0,
            longitude_span,
        }
    }

    /// Same zoom and spans, different center.
    #[must_use]
    pub const fn with_center(self, center: GeoPoint) -> Self {
        Self { center, ..self }
    }

    /// Whether the center is valid and the spans are finite.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.center.is_valid()
            && self.latitude_span.is_finite()
            && self.longitude_span.is_finite()
            && self.zoom <= MAX_ZOOM
    }
}

/// A circular region the viewport center may not leave.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeofenceConstraint {
    /// Center of the allowed circle.
    pub center: GeoPoint,
    /// Radius of the allowed circle in meters.
    pub radius_meters: f64,
}

impl GeofenceConstraint {
    /// Creates a constraint without validating it.
    #[must_use]
    pub const fn new(center: GeoPoint, radius_meters: f64) -> Self {
        Self {
            center,
            radius_meters,
        }
    }

    /// Returns `Some(self)` only if the center is valid and the radius is
    /// finite and positive. An invalid constraint means "unconstrained".
    #[must_use]
    pub fn validated(self) -> Option<Self> {
        (self.center.is_valid() && self.radius_meters.is_finite() && self.radius_meters > 0.0)
            .then_some(self)
    }
}

/// An event as supplied by the data layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventSummary {
    /// Unique event ID.
    pub id: String,
    /// Event category name.
    pub category: String,
    /// Where the event takes place, if known.
    #[serde(default)]
    pub coordinate: Option<GeoPoint>,
}

impl EventSummary {
    /// Creates an event summary.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        category: impl Into<String>,
        coordinate: Option<GeoPoint>,
    ) -> Self {
        Self {
            id: id.into(),
            category: category.into(),
            coordinate,
        }
    }

    /// The coordinate, if present and valid.
    #[must_use]
    pub fn placed_coordinate(&self) -> Option<GeoPoint> {
        self.coordinate.and_then(GeoPoint::valid)
    }
}

/// Events rendered as a single marker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventMarkerGroup {
    /// Stable grid-cell identifier.
    pub key: String,
    /// Marker position (coordinate of the first member).
    pub position: GeoPoint,
    /// Events in this group, in input order.
    pub members: Vec<EventSummary>,
}

impl EventMarkerGroup {
    /// Whether the group contains the event with `event_id`.
    #[must_use]
    pub fn contains(&self, event_id: &str) -> bool {
        self.members.iter().any(|e| e.id == event_id)
    }

    /// Whether more than one event shares this marker.
    #[must_use]
    pub fn is_cluster(&self) -> bool {
        self.members.len() > 1
    }
}

/// A request to center on an event and open its popup.
#[derive(Debug, Clone, PartialEq)]
pub struct HighlightRequest {
    /// Event to highlight.
    pub event_id: String,
    /// Where to center the map.
    pub coordinate: GeoPoint,
    /// When the request was accepted.
    pub submitted_at: Instant,
}

impl HighlightRequest {
    /// Creates a request submitted at `now`.
    #[must_use]
    pub fn new(event_id: impl Into<String>, coordinate: GeoPoint, now: Instant) -> Self {
        Self {
            event_id: event_id.into(),
            coordinate,
            submitted_at: now,
        }
    }

    /// Time elapsed since submission (zero if `now` is earlier).
    #[must_use]
    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.submitted_at)
    }

    /// Whether the request is still inside its display window.
    #[must_use]
    pub fn is_fresh(&self, now: Instant, window: Duration) -> bool {
        self.age(now) < window
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checked_rejects_out_of_range_and_non_finite() {
        assert!(GeoPoint::checked(32.08, 34.78).is_ok());
        assert!(GeoPoint::checked(91.0, 0.0).is_err());
        assert!(GeoPoint::checked(0.0, -180.5).is_err());
        assert!(GeoPoint::checked(f64::NAN, 0.0).is_err());
        assert!(GeoPoint::checked(0.0, f64::INFINITY).is_err());
    }

    #[test]
    fn invalid_coordinate_error_mentions_values() {
        let err = GeoPoint::checked(120.0, 5.0).unwrap_err();
        assert!(err.to_string().contains("120"));
    }

    #[test]
    fn at_zoom_halves_spans_per_level() {
        let center = GeoPoint::new(0.0, 0.0);
        let z0 = Viewport::at_zoom(center, 0);
        let z1 = Viewport::at_zoom(center, 1);
        assert!((z0.longitude_span - 360.0).abs() < f64::EPSILON);
        assert!((z1.longitude_span - 180.0).abs() < f64::EPSILON);
        assert!((z1.latitude_span - 90.0).abs() < f64::EPSILON);
        assert_eq!(Viewport::at_zoom(center, 40).zoom, MAX_ZOOM);
    }

    #[test]
    fn geofence_validation() {
        let center = GeoPoint::new(32.08, 34.78);
        assert!(GeofenceConstraint::new(center, 2000.0).validated().is_some());
        assert!(GeofenceConstraint::new(center, 0.0).validated().is_none());
        assert!(GeofenceConstraint::new(center, -5.0).validated().is_none());
        assert!(GeofenceConstraint::new(center, f64::NAN).validated().is_none());
        assert!(
            GeofenceConstraint::new(GeoPoint::new(f64::NAN, 0.0), 10.0)
                .validated()
                .is_none()
        );
    }

    #[test]
    fn placed_coordinate_drops_invalid() {
        let placed = EventSummary::new("a", "music", Some(GeoPoint::new(1.0, 2.0)));
        let bad = EventSummary::new("b", "music", Some(GeoPoint::new(f64::NAN, 2.0)));
        let missing = EventSummary::new("c", "music", None);
        assert!(placed.placed_coordinate().is_some());
        assert!(bad.placed_coordinate().is_none());
        assert!(missing.placed_coordinate().is_none());
    }

    #[test]
    fn event_summary_deserializes_without_coordinate() {
        let event: EventSummary =
            serde_json::from_str(r#"{"id":"e1","category":"sports"}"#).unwrap();
        assert_eq!(event.coordinate, None);

        let event: EventSummary = serde_json::from_str(
            r#"{"id":"e2","category":"sports","coordinate":{"latitude":1.5,"longitude":2.5}}"#,
        )
        .unwrap();
        assert_eq!(event.coordinate, Some(GeoPoint::new(1.5, 2.5)));
    }

    #[test]
    fn highlight_freshness() {
        let t0 = Instant::now();
        let request = HighlightRequest::new("e1", GeoPoint::new(0.0, 0.0), t0);
        let window = Duration::from_millis(5500);
        assert!(request.is_fresh(t0 + Duration::from_millis(5000), window));
        assert!(!request.is_fresh(t0 + Duration::from_millis(5500), window));
    }
}
