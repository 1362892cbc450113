//! Process-lifetime memory of where the map was left.
//!
//! One [`ViewportStateStore`] is created at application startup and handed
//! to every controller instance, so a remounted map resumes where the user
//! left it. Nothing is written to durable storage.

use std::sync::{Arc, PoisonError, RwLock};

use event_map_viewport_models::{GeoPoint, Viewport};

/// A remembered center and zoom.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SavedViewport {
    /// Last settled center.
    pub center: GeoPoint,
    /// Last settled zoom.
    pub zoom: u8,
}

#[derive(Debug, Default)]
struct StoreState {
    initialized: bool,
    last: Option<SavedViewport>,
}

/// Shared last-known viewport, surviving controller remounts.
#[derive(Debug, Default)]
pub struct ViewportStateStore {
    state: RwLock<StoreState>,
}

impl ViewportStateStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty store ready to be shared between controllers.
    #[must_use]
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Whether any controller has resolved an initial center yet.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .initialized
    }

    /// The last recorded center and zoom.
    #[must_use]
    pub fn last_known(&self) -> Option<SavedViewport> {
        self.state.read().unwrap_or_else(PoisonError::into_inner).last
    }

    /// Marks the store initialized and records the starting viewport.
    pub fn mark_initialized(&self, viewport: &Viewport) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if !state.initialized {
            log::debug!("Viewport store initialized at {}", viewport.center);
        }
        state.initialized = true;
        if viewport.center.is_valid() {
            state.last = Some(SavedViewport {
                center: viewport.center,
                zoom: viewport.zoom,
            });
        }
    }

    /// Records a settled viewport. Invalid centers are ignored.
    ///
    /// Returns whether the viewport was stored.
    pub fn record(&self, viewport: &Viewport) -> bool {
        if !viewport.center.is_valid() {
            log::debug!("Not recording invalid viewport center {}", viewport.center);
            return false;
        }
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.last = Some(SavedViewport {
            center: viewport.center,
            zoom: viewport.zoom,
        });
        true
    }

    /// Forgets everything, as if the process had just started.
    pub fn reset(&self) {
        *self.state.write().unwrap_or_else(PoisonError::into_inner) = StoreState::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_empty() {
        let store = ViewportStateStore::new();
        assert!(!store.is_initialized());
        assert_eq!(store.last_known(), None);
    }

    #[test]
    fn records_latest_settled_viewport() {
        let store = ViewportStateStore::new();
        store.mark_initialized(&Viewport::at_zoom(GeoPoint::new(1.0, 2.0), 13));
        store.record(&Viewport::at_zoom(GeoPoint::new(3.0, 4.0), 15));

        assert!(store.is_initialized());
        assert_eq!(
            store.last_known(),
            Some(SavedViewport {
                center: GeoPoint::new(3.0, 4.0),
                zoom: 15,
            })
        );
    }

    #[test]
    fn ignores_invalid_centers() {
        let store = ViewportStateStore::new();
        store.record(&Viewport::at_zoom(GeoPoint::new(1.0, 2.0), 13));
        assert!(!store.record(&Viewport::at_zoom(GeoPoint::new(f64::NAN, 2.0), 13)));
        assert_eq!(store.last_known().unwrap().center, GeoPoint::new(1.0, 2.0));
    }

    #[test]
    fn separate_stores_do_not_share_state() {
        let a = ViewportStateStore::new();
        let b = ViewportStateStore::new();
        a.record(&Viewport::at_zoom(GeoPoint::new(1.0, 2.0), 13));
        assert_eq!(b.last_known(), None);
    }

    #[test]
    fn reset_forgets_everything() {
        let store = ViewportStateStore::new();
        store.mark_initialized(&Viewport::at_zoom(GeoPoint::new(1.0, 2.0), 13));
        store.reset();
        assert!(!store.is_initialized());
        assert_eq!(store.last_known(), None);
    }
}
