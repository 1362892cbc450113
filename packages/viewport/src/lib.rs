#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Geofenced map viewport control for the event map.
//!
//! [`view::EventMapView`] is the host-facing entry point. It clusters the
//! event list, drives a [`controller::ViewportController`] against the
//! host's map through the [`map::MapHandle`] seam, and opens highlighted
//! popups via [`highlight::HighlightCoordinator`]. Nothing here sleeps or
//! spawns; the host passes the current [`std::time::Instant`] in and calls
//! [`view::EventMapView::tick`] when [`view::EventMapView::next_deadline`]
//! comes due.

pub mod config;
pub mod controller;
pub mod highlight;
pub mod map;
pub mod store;
pub mod view;

#[cfg(test)]
mod testing;

/// Errors that can occur while loading map configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// I/O error reading the config file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The document is not valid TOML for [`config::MapConfig`].
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// A value is out of range.
    #[error("Invalid config: {message}")]
    Invalid {
        /// Description of the bad value.
        message: String,
    },
}
