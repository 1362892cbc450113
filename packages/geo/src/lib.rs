#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Great-circle helpers on a spherical Earth.
//!
//! Accuracy is what the map needs for clamping the viewport to a geofence,
//! not survey grade: every function uses a sphere of radius
//! [`EARTH_RADIUS_METERS`]. All functions are pure and total; invalid input
//! never panics.

use event_map_viewport_models::GeoPoint;

/// Mean Earth radius in meters.
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// Approximate length of one degree of latitude in meters.
pub const METERS_PER_DEGREE: f64 = 111_320.0;

/// Converts a distance in meters to degrees using the flat
/// [`METERS_PER_DEGREE`] approximation (not latitude corrected).
#[must_use]
pub fn meters_to_degrees(meters: f64) -> f64 {
    meters / METERS_PER_DEGREE
}

/// Wraps a longitude into `[-180, 180)`.
#[must_use]
pub fn normalize_longitude(longitude: f64) -> f64 {
    (longitude + 180.0).rem_euclid(360.0) - 180.0
}

/// Haversine distance between two points in meters.
///
/// Symmetric, and exactly zero for coincident points.
#[must_use]
pub fn distance_meters(a: GeoPoint, b: GeoPoint) -> f64 {
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();
    let h = (d_lat / 2.0).sin().powi(2)
        + a.latitude.to_radians().cos()
            * b.latitude.to_radians().cos()
            * (d_lon / 2.0).sin().powi(2);
    // Rounding can push `h` a hair past 1 for antipodal points.
    let h = h.clamp(0.0, 1.0);
    2.0 * EARTH_RADIUS_METERS * h.sqrt().atan2((1.0 - h).sqrt())
}

/// Initial great-circle bearing from `a` to `b`, in radians clockwise from
/// north, in `(-PI, PI]`.
#[must_use]
pub fn bearing_radians(a: GeoPoint, b: GeoPoint) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();
    let y = d_lon.sin() * lat2.cos();
    let x = lat1.cos().mul_add(lat2.sin(), -(lat1.sin() * lat2.cos() * d_lon.cos()));
    y.atan2(x)
}

/// The point reached by travelling `distance_meters` from `origin` along
/// the great circle with initial bearing `bearing` (radians).
#[must_use]
pub fn destination_point(origin: GeoPoint, bearing: f64, distance_meters: f64) -> GeoPoint {
    let angular = distance_meters / EARTH_RADIUS_METERS;
    let lat1 = origin.latitude.to_radians();
    let lon1 = origin.longitude.to_radians();

    let sin_lat2 = lat1
        .sin()
        .mul_add(angular.cos(), lat1.cos() * angular.sin() * bearing.cos());
    let lat2 = sin_lat2.clamp(-1.0, 1.0).asin();
    let lon2 = lon1
        + (bearing.sin() * angular.sin() * lat1.cos())
            .atan2(lat1.sin().mul_add(-sin_lat2, angular.cos()));

    GeoPoint::new(lat2.to_degrees(), normalize_longitude(lon2.to_degrees()))
}

/// Projects `point` back onto the circle of `radius_meters` around
/// `center` if it lies outside it, keeping the bearing from the center.
///
/// Points inside the circle (or equal to the center) are returned
/// unchanged. If any input is invalid (bad coordinates, non-finite or
/// non-positive radius) no constraint is applied and `point` is returned
/// unchanged.
#[must_use]
pub fn clamp_to_radius(center: GeoPoint, point: GeoPoint, radius_meters: f64) -> GeoPoint {
    if !center.is_valid()
        || !point.is_valid()
        || !radius_meters.is_finite()
        || radius_meters <= 0.0
    {
        return point;
    }

    let distance = distance_meters(center, point);
    if distance <= radius_meters {
        return point;
    }

    destination_point(center, bearing_radians(center, point), radius_meters)
}
