//! The event map view: clustering, viewport control, and highlight
//! coordination behind one host-facing API.

use std::sync::Arc;
use std::time::Instant;

use event_map_cluster::{Clustering, GridClusterer};
use event_map_viewport_models::{
    EventMarkerGroup, EventSummary, GeoPoint, GeofenceConstraint, HighlightRequest, Viewport,
};

use crate::config::MapConfig;
use crate::controller::{ControllerState, InitialSource, ViewportController};
use crate::highlight::{HighlightCoordinator, HighlightStatus, Submission};
use crate::map::{CommandId, MapHandle, MapListener, RegionUpdate};
use crate::store::ViewportStateStore;

/// One mounted event map.
pub struct EventMapView<M> {
    controller: ViewportController<M>,
    coordinator: HighlightCoordinator,
    clusterer: GridClusterer,
    events: Vec<EventSummary>,
    clustering: Clustering,
    listener: Arc<dyn MapListener>,
}

impl<M: MapHandle> EventMapView<M> {
    /// Creates a view sharing `store` with every other view in the process.
    #[must_use]
    pub fn new(
        config: MapConfig,
        store: Arc<ViewportStateStore>,
        listener: Arc<dyn MapListener>,
    ) -> Self {
        let clusterer = GridClusterer::from_options(config.cluster_options());
        let coordinator = HighlightCoordinator::new(config.retry_policy());
        let controller = ViewportController::new(config, store, Arc::clone(&listener));

        Self {
            controller,
            coordinator,
            clusterer,
            events: Vec::new(),
            clustering: Clustering::default(),
            listener,
        }
    }

    /// The viewport controller.
    #[must_use]
    pub const fn controller(&self) -> &ViewportController<M> {
        &self.controller
    }

    /// The mounted map.
    #[must_use]
    pub const fn map(&self) -> Option<&M> {
        self.controller.map()
    }

    /// The mounted map, mutably.
    pub const fn map_mut(&mut self) -> Option<&mut M> {
        self.controller.map_mut()
    }

    /// The popup coordinator.
    #[must_use]
    pub const fn coordinator(&self) -> &HighlightCoordinator {
        &self.coordinator
    }

    /// The current events, in input order.
    #[must_use]
    pub fn events(&self) -> &[EventSummary] {
        &self.events
    }

    /// Marker groups for the current events.
    #[must_use]
    pub const fn clustering(&self) -> &Clustering {
        &self.clustering
    }

    /// Lifecycle state of the viewport.
    #[must_use]
    pub const fn state(&self) -> ControllerState {
        self.controller.state()
    }

    /// The current viewport, once initialized.
    #[must_use]
    pub const fn viewport(&self) -> Option<Viewport> {
        self.controller.viewport()
    }

    /// Progress of the current highlight popup.
    #[must_use]
    pub const fn highlight_status(&self) -> HighlightStatus {
        self.coordinator.status()
    }

    /// When [`Self::tick`] next has work to do.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.coordinator.next_deadline()
    }

    /// Replaces the event list and re-clusters it.
    pub fn set_events(&mut self, events: Vec<EventSummary>) -> &Clustering {
        self.clustering = self.clusterer.cluster(&events);
        self.events = events;
        log::debug!(
            "Showing {} events as {} markers",
            self.clustering.placed_count(),
            self.clustering.groups.len()
        );
        &self.clustering
    }

    /// Mounts a live map.
    pub fn attach_map(&mut self, map: M) -> Option<InitialSource> {
        self.controller.attach(map)
    }

    /// Unmounts the map. The highlight, its pending popup retries, and the
    /// unconfirmed move are dropped; the host re-signals the highlight after
    /// remounting if it still wants it.
    pub fn detach_map(&mut self) -> Option<M> {
        self.clear_highlight();
        self.controller.detach()
    }

    /// Replaces the geofence; `None` or an invalid fence means unconstrained.
    pub fn set_geofence(&mut self, geofence: Option<GeofenceConstraint>, now: Instant) {
        self.controller.set_geofence(geofence, now);
    }

    /// Sets the region used when nothing better is known.
    pub fn set_default_region(&mut self, region: Option<Viewport>) {
        self.controller.set_default_region(region);
    }

    /// Moves to a region requested by the data layer.
    pub fn request_region(&mut self, region: Viewport, now: Instant) -> Option<CommandId> {
        self.controller.request_region(region, now)
    }

    /// Applies the host's highlight signal. `None` clears it.
    pub fn set_highlight(
        &mut self,
        highlight: Option<(&str, GeoPoint)>,
        now: Instant,
    ) -> Option<Submission> {
        match highlight {
            Some((event_id, coordinate)) => Some(self.highlight(event_id, coordinate, now)),
            None => {
                self.clear_highlight();
                None
            }
        }
    }

    /// Centers on `event_id` and opens its popup once the marker exists.
    ///
    /// Repeating a highlight whose popup is pending or already open is a
    /// no-op. A different event supersedes it, and an abandoned one starts
    /// over.
    pub fn highlight(&mut self, event_id: &str, coordinate: GeoPoint, now: Instant) -> Submission {
        if !coordinate.is_valid() {
            log::warn!("Ignoring highlight for {event_id} with invalid coordinate {coordinate}");
            return Submission::Rejected;
        }
        let live = matches!(
            self.coordinator.status(),
            HighlightStatus::Pending { .. } | HighlightStatus::Opened
        );
        if live && self.coordinator.event_id() == Some(event_id) {
            return Submission::Duplicate;
        }

        let submission = self.coordinator.submit(event_id, now);
        if submission == Submission::Accepted {
            self.controller
                .highlight(HighlightRequest::new(event_id, coordinate, now));
        }
        submission
    }

    /// Drops the highlight and any pending popup retries.
    pub fn clear_highlight(&mut self) {
        self.coordinator.clear();
        if let Some(request) = self.controller.clear_highlight() {
            log::trace!("Cleared highlight for {}", request.event_id);
        }
    }

    /// The map is moving.
    pub fn on_region_changing(&mut self, update: RegionUpdate) {
        self.controller.on_region_changing(update);
    }

    /// The map came to rest.
    pub fn on_region_settled(&mut self, update: RegionUpdate) {
        self.controller.on_region_settled(update);
    }

    /// The host attached the marker for `group_key` to the map.
    pub fn on_marker_attached(&mut self, group_key: &str) -> HighlightStatus {
        match self.controller.map_mut() {
            Some(map) => {
                self.coordinator
                    .on_marker_attached(group_key, &self.clustering.groups, map)
            }
            None => self.coordinator.status(),
        }
    }

    /// Runs any due popup retry.
    pub fn tick(&mut self, now: Instant) -> HighlightStatus {
        self.coordinator
            .poll(now, &self.clustering.groups, self.controller.map_mut())
    }

    /// The user pressed the marker for `group_key`.
    pub fn press_marker(&self, group_key: &str) -> Option<&EventMarkerGroup> {
        let group = self.clustering.group(group_key)?;
        self.listener.on_marker_press(group);
        Some(group)
    }

    /// The user pressed an individual event, e.g. inside a cluster popup.
    pub fn press_event(&self, event_id: &str) -> Option<&EventSummary> {
        let event = self.events.iter().find(|event| event.id == event_id)?;
        self.listener.on_event_press(event);
        Some(event)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::map::CommandReason;
    use crate::testing::{RecordingListener, RecordingMap};

    const TEL_AVIV: GeoPoint = GeoPoint::new(32.08, 34.78);

    fn events() -> Vec<EventSummary> {
        vec![
            EventSummary::new("a", "music", Some(GeoPoint::new(32.08, 34.78))),
            EventSummary::new("b", "food", Some(GeoPoint::new(32.0801, 34.7801))),
            EventSummary::new("c", "sports", Some(GeoPoint::new(32.085, 34.785))),
            EventSummary::new("d", "art", None),
        ]
    }

    fn view() -> (EventMapView<RecordingMap>, Arc<RecordingListener>) {
        let listener = Arc::new(RecordingListener::default());
        let mut view = EventMapView::new(
            MapConfig::default(),
            ViewportStateStore::shared(),
            listener.clone(),
        );
        view.set_events(events());
        (view, listener)
    }

    fn map(view: &EventMapView<RecordingMap>) -> &RecordingMap {
        view.map().unwrap()
    }

    fn settle_last_command(view: &mut EventMapView<RecordingMap>) {
        let command = map(view).last_command().clone();
        view.on_region_settled(RegionUpdate::from_command(command.id, command.viewport));
    }

    fn ms(millis: u64) -> Duration {
        Duration::from_millis(millis)
    }

    #[test]
    fn clusters_events_on_set() {
        let (mut view, _) = view();
        let clustering = view.clustering();
        assert_eq!(clustering.groups.len(), 2);
        assert_eq!(clustering.unplaced, vec!["d".to_string()]);

        assert!(view.set_events(Vec::new()).groups.is_empty());
    }

    #[test]
    fn highlight_opens_popup_when_marker_attaches() {
        let (mut view, _) = view();
        let t0 = Instant::now();
        view.set_geofence(Some(GeofenceConstraint::new(TEL_AVIV, 2000.0)), t0);
        view.attach_map(RecordingMap::default());
        settle_last_command(&mut view);

        assert_eq!(view.highlight("b", GeoPoint::new(32.0801, 34.7801), t0), Submission::Accepted);
        let command = map(&view).last_command().clone();
        assert_eq!(command.reason, CommandReason::Highlight);
        assert_eq!(command.viewport.zoom, 16);

        let key = view.clustering().group_for_event("b").unwrap().key.clone();
        view.map_mut().unwrap().attach_marker(&key);
        assert_eq!(view.on_marker_attached(&key), HighlightStatus::Opened);
        assert_eq!(view.next_deadline(), None);
    }

    #[test]
    fn highlight_before_mount_centers_and_polls_for_popup() {
        let (mut view, _) = view();
        let t0 = Instant::now();
        view.set_highlight(Some(("c", GeoPoint::new(32.085, 34.785))), t0);
        assert_eq!(view.state(), ControllerState::Uninitialized);

        assert_eq!(view.attach_map(RecordingMap::default()), Some(InitialSource::Highlight));
        assert_eq!(view.viewport().unwrap().center, GeoPoint::new(32.085, 34.785));

        assert_eq!(view.tick(t0 + ms(200)), HighlightStatus::Pending { attempts: 1 });
        let key = view.clustering().group_for_event("c").unwrap().key.clone();
        view.map_mut().unwrap().attach_marker(&key);
        assert_eq!(view.tick(t0 + ms(500)), HighlightStatus::Opened);
        assert_eq!(map(&view).open_attempts.len(), 2);
    }

    #[test]
    fn repeated_highlight_signal_does_not_recenter() {
        let (mut view, _) = view();
        let t0 = Instant::now();
        view.set_default_region(Some(Viewport::at_zoom(TEL_AVIV, 13)));
        view.attach_map(RecordingMap::default());
        view.set_highlight(Some(("a", TEL_AVIV)), t0);
        let issued = map(&view).commands.len();

        assert_eq!(
            view.set_highlight(Some(("a", TEL_AVIV)), t0 + ms(100)),
            Some(Submission::Duplicate)
        );
        assert_eq!(map(&view).commands.len(), issued);
    }

    #[test]
    fn highlight_wins_over_geofence_move() {
        let (mut view, _) = view();
        let t0 = Instant::now();
        view.set_geofence(Some(GeofenceConstraint::new(TEL_AVIV, 2000.0)), t0);
        view.attach_map(RecordingMap::default());
        settle_last_command(&mut view);

        view.highlight("c", GeoPoint::new(32.085, 34.785), t0);
        let far = GeofenceConstraint::new(GeoPoint::new(32.3, 34.9), 2000.0);
        view.set_geofence(Some(far), t0 + ms(50));
        settle_last_command(&mut view);

        assert_eq!(view.viewport().unwrap().center, GeoPoint::new(32.085, 34.785));
    }

    #[test]
    fn detaching_cancels_retries() {
        let (mut view, _) = view();
        let t0 = Instant::now();
        view.set_default_region(Some(Viewport::at_zoom(TEL_AVIV, 13)));
        view.attach_map(RecordingMap::default());
        view.highlight("a", TEL_AVIV, t0);

        let detached = view.detach_map().unwrap();
        assert_eq!(view.highlight_status(), HighlightStatus::Idle);
        assert_eq!(view.tick(t0 + ms(2000)), HighlightStatus::Idle);
        assert!(detached.open_attempts.is_empty());
    }

    #[test]
    fn resignalled_highlight_opens_after_remount() {
        let (mut view, _) = view();
        let t0 = Instant::now();
        view.set_default_region(Some(Viewport::at_zoom(TEL_AVIV, 13)));
        view.attach_map(RecordingMap::default());
        view.highlight("a", TEL_AVIV, t0);
        view.detach_map();

        view.attach_map(RecordingMap::default());
        let region = Viewport::at_zoom(GeoPoint::new(32.1, 34.8), 12);
        assert!(view.request_region(region, t0 + ms(50)).is_some());

        assert_eq!(
            view.set_highlight(Some(("a", TEL_AVIV)), t0 + ms(100)),
            Some(Submission::Accepted)
        );
        let key = view.clustering().group_for_event("a").unwrap().key.clone();
        view.map_mut().unwrap().attach_marker(&key);
        assert_eq!(view.tick(t0 + ms(300)), HighlightStatus::Opened);
        assert_eq!(map(&view).open_attempts, vec![key]);
    }

    #[test]
    fn abandoned_highlight_can_be_signalled_again() {
        let (mut view, _) = view();
        let t0 = Instant::now();
        view.set_default_region(Some(Viewport::at_zoom(TEL_AVIV, 13)));
        view.attach_map(RecordingMap::default());
        view.highlight("a", TEL_AVIV, t0);
        for offset in [200, 500, 1000, 2000] {
            view.tick(t0 + ms(offset));
        }
        assert_eq!(view.highlight_status(), HighlightStatus::Abandoned);

        assert_eq!(
            view.set_highlight(Some(("a", TEL_AVIV)), t0 + ms(6000)),
            Some(Submission::Accepted)
        );
        let key = view.clustering().group_for_event("a").unwrap().key.clone();
        view.map_mut().unwrap().attach_marker(&key);
        assert_eq!(view.tick(t0 + ms(6200)), HighlightStatus::Opened);
    }

    #[test]
    fn clearing_highlight_allows_requested_regions() {
        let (mut view, _) = view();
        let t0 = Instant::now();
        view.set_default_region(Some(Viewport::at_zoom(TEL_AVIV, 13)));
        view.attach_map(RecordingMap::default());
        view.highlight("a", TEL_AVIV, t0);

        let region = Viewport::at_zoom(GeoPoint::new(32.1, 34.8), 12);
        assert_eq!(view.request_region(region, t0 + ms(100)), None);

        assert_eq!(view.set_highlight(None, t0 + ms(200)), None);
        assert_eq!(view.highlight_status(), HighlightStatus::Idle);
        assert!(view.request_region(region, t0 + ms(300)).is_some());
    }

    #[test]
    fn rejects_highlight_with_invalid_coordinate() {
        let (mut view, _) = view();
        let submission = view.highlight("a", GeoPoint::new(f64::NAN, 34.78), Instant::now());
        assert_eq!(submission, Submission::Rejected);
        assert_eq!(view.highlight_status(), HighlightStatus::Idle);
    }

    #[test]
    fn presses_reach_listener() {
        let (view, listener) = view();
        let key = view.clustering().group_for_event("a").unwrap().key.clone();

        assert_eq!(view.press_marker(&key).unwrap().members.len(), 2);
        assert!(view.press_marker("cell:0:0").is_none());
        assert_eq!(view.press_event("d").unwrap().category, "art");
        assert!(view.press_event("zzz").is_none());

        assert_eq!(listener.markers(), vec![key]);
        assert_eq!(listener.events(), vec!["d".to_string()]);
    }
}
