//! Geofenced viewport controller.
//!
//! Owns the live map handle, resolves where the map starts, keeps the
//! center inside the geofence while the user pans, and mirrors every
//! settled viewport into the shared [`ViewportStateStore`].
//!
//! Programmatic moves are tagged with a [`CommandId`]. The map echoes the
//! tag back in the [`RegionUpdate`]s it produces, which lets the controller
//! tell its own moves apart from the user's without timers.

use std::sync::Arc;
use std::time::Instant;

use event_map_geo::{clamp_to_radius, distance_meters};
use event_map_viewport_models::{GeoPoint, GeofenceConstraint, HighlightRequest, Viewport};
use strum::{AsRefStr, Display};

use crate::config::MapConfig;
use crate::map::{
    CommandId, CommandReason, MapHandle, MapListener, MoveOrigin, RegionUpdate, ViewCommand,
};
use crate::store::ViewportStateStore;

/// Lifecycle of the controlled viewport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum ControllerState {
    /// No center source has resolved yet; the map should not render.
    Uninitialized,
    /// At rest.
    Centered,
    /// The user is moving the map.
    UserPanning,
    /// The view was pulled back inside the geofence and the map has not
    /// confirmed the move yet.
    Clamped,
}

/// Where the initial center came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum InitialSource {
    /// A pending highlight request.
    Highlight,
    /// The shared store's last settled viewport.
    LastKnown,
    /// The geofence center.
    Geofence,
    /// The externally supplied default region.
    DefaultRegion,
}

/// Controls a single map instance.
pub struct ViewportController<M> {
    config: MapConfig,
    store: Arc<ViewportStateStore>,
    listener: Arc<dyn MapListener>,
    map: Option<M>,
    state: ControllerState,
    viewport: Option<Viewport>,
    geofence: Option<GeofenceConstraint>,
    default_region: Option<Viewport>,
    highlight: Option<HighlightRequest>,
    next_command: u64,
    in_flight: Option<CommandId>,
    /// A clamp issued mid-drag whose region change is reported on settle.
    unannounced_clamp: Option<CommandId>,
}

impl<M: MapHandle> ViewportController<M> {
    /// Creates an uninitialized controller with no map attached.
    #[must_use]
    pub fn new(
        config: MapConfig,
        store: Arc<ViewportStateStore>,
        listener: Arc<dyn MapListener>,
    ) -> Self {
        Self {
            config,
            store,
            listener,
            map: None,
            state: ControllerState::Uninitialized,
            viewport: None,
            geofence: None,
            default_region: None,
            highlight: None,
            next_command: 0,
            in_flight: None,
            unannounced_clamp: None,
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> ControllerState {
        self.state
    }

    /// Whether an initial center has been resolved.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.state != ControllerState::Uninitialized
    }

    /// The controller's view of the current viewport.
    #[must_use]
    pub const fn viewport(&self) -> Option<Viewport> {
        self.viewport
    }

    /// The active (validated) geofence.
    #[must_use]
    pub const fn geofence(&self) -> Option<GeofenceConstraint> {
        self.geofence
    }

    /// The programmatic move the map has not confirmed yet.
    #[must_use]
    pub const fn in_flight(&self) -> Option<CommandId> {
        self.in_flight
    }

    /// The active highlight request, if any.
    #[must_use]
    pub const fn active_highlight(&self) -> Option<&HighlightRequest> {
        self.highlight.as_ref()
    }

    /// The attached map.
    #[must_use]
    pub const fn map(&self) -> Option<&M> {
        self.map.as_ref()
    }

    /// The attached map, mutably.
    pub const fn map_mut(&mut self) -> Option<&mut M> {
        self.map.as_mut()
    }

    /// Settings this controller was built with.
    #[must_use]
    pub const fn config(&self) -> &MapConfig {
        &self.config
    }

    /// Attaches a live map. Resolves the initial center if needed,
    /// otherwise pushes the current viewport to the new map.
    pub fn attach(&mut self, map: M) -> Option<InitialSource> {
        self.map = Some(map);
        self.in_flight = None;
        if self.state == ControllerState::Uninitialized {
            return self.try_initialize();
        }
        if let Some(viewport) = self.viewport {
            self.issue(viewport, CommandReason::Initialize, false);
        }
        None
    }

    /// Detaches the map, forgetting any unconfirmed move.
    pub fn detach(&mut self) -> Option<M> {
        self.in_flight = None;
        self.unannounced_clamp = None;
        self.map.take()
    }

    /// Sets the fallback region used when nothing better is known.
    pub fn set_default_region(&mut self, region: Option<Viewport>) {
        self.default_region = match region {
            Some(region) if region.is_valid() => Some(region),
            Some(region) => {
                log::warn!(
                    "Ignoring invalid default region centered at {}",
                    region.center
                );
                None
            }
            None => None,
        };
        if self.state == ControllerState::Uninitialized {
            self.try_initialize();
        }
    }

    /// Moves to a region requested by the data layer.
    ///
    /// Before initialization the region becomes the default region. While
    /// a highlight is fresh the request is ignored. The requested center is
    /// clamped to the geofence.
    pub fn request_region(&mut self, region: Viewport, now: Instant) -> Option<CommandId> {
        if !region.is_valid() {
            log::warn!("Ignoring invalid requested region centered at {}", region.center);
            return None;
        }
        if self.state == ControllerState::Uninitialized {
            self.default_region = Some(region);
            self.try_initialize();
            return self.in_flight;
        }
        if self.highlight_is_fresh(now) {
            log::debug!("Ignoring requested region while a highlight is fresh");
            return None;
        }

        let target = match self.geofence {
            Some(fence) => region.with_center(clamp_to_radius(
                fence.center,
                region.center,
                fence.radius_meters,
            )),
            None => region,
        };
        self.issue(target, CommandReason::RequestedRegion, true)
    }

    /// Replaces the geofence. `None` or an invalid constraint means
    /// unconstrained panning.
    ///
    /// If the new fence center is farther than the drift limit from the
    /// current center, the view recenters on it, unless a highlight is
    /// fresh.
    pub fn set_geofence(&mut self, geofence: Option<GeofenceConstraint>, now: Instant) {
        let validated = geofence.and_then(GeofenceConstraint::validated);
        if let (Some(raw), None) = (geofence, validated) {
            log::warn!(
                "Ignoring invalid geofence (center {}, radius {}m); movement is unconstrained",
                raw.center,
                raw.radius_meters
            );
        }
        if validated == self.geofence {
            return;
        }
        self.geofence = validated;

        if self.state == ControllerState::Uninitialized {
            self.try_initialize();
            return;
        }

        let (Some(fence), Some(current)) = (validated, self.viewport) else {
            return;
        };
        let drift = distance_meters(fence.center, current.center);
        if drift <= self.config.drift_limit_meters {
            return;
        }
        if self.highlight_is_fresh(now) {
            log::debug!("Geofence moved {drift:.0}m away but a highlight is fresh; keeping the view");
            return;
        }

        log::debug!("Geofence moved {drift:.0}m away, recentering on {}", fence.center);
        self.issue(
            Viewport::at_zoom(fence.center, self.config.neighborhood_zoom),
            CommandReason::Geofence,
            true,
        );
    }

    /// Centers on a highlighted event at the detail zoom, regardless of
    /// the current state. Before initialization the request becomes the
    /// preferred initial center.
    pub fn highlight(&mut self, request: HighlightRequest) -> Option<CommandId> {
        if !request.coordinate.is_valid() {
            log::warn!(
                "Ignoring highlight for event {} with invalid coordinate {}",
                request.event_id,
                request.coordinate
            );
            return None;
        }

        let target = Viewport::at_zoom(request.coordinate, self.config.detail_zoom);
        self.highlight = Some(request);

        if self.state == ControllerState::Uninitialized {
            self.try_initialize();
            return self.in_flight;
        }
        self.issue(target, CommandReason::Highlight, true)
    }

    /// Drops the active highlight request.
    pub fn clear_highlight(&mut self) -> Option<HighlightRequest> {
        self.highlight.take()
    }

    /// Whether a highlight request is inside its display window.
    #[must_use]
    pub fn highlight_is_fresh(&self, now: Instant) -> bool {
        let window = self.config.highlight_window();
        self.highlight
            .as_ref()
            .is_some_and(|request| request.is_fresh(now, window))
    }

    /// The map is moving (drag in progress).
    pub fn on_region_changing(&mut self, update: RegionUpdate) {
        if self.state == ControllerState::Uninitialized {
            return;
        }
        if let MoveOrigin::Command(id) = update.origin {
            log::trace!("Ignoring movement produced by {id}");
            return;
        }
        if !update.viewport.center.is_valid() {
            log::debug!("Ignoring movement to invalid center {}", update.viewport.center);
            return;
        }

        self.set_state(ControllerState::UserPanning);
        self.viewport = Some(update.viewport);
        if let Some(fence) = self.breached_geofence(update.viewport.center) {
            self.clamp(update.viewport, fence, false);
        }
    }

    /// The map came to rest.
    pub fn on_region_settled(&mut self, update: RegionUpdate) {
        if self.state == ControllerState::Uninitialized {
            log::debug!("Ignoring settle before initialization");
            return;
        }
        match update.origin {
            MoveOrigin::Command(id) => self.acknowledge(id, update.viewport),
            MoveOrigin::User => self.settle_user(update.viewport),
        }
    }

    /// Resolves the initial viewport by priority: highlight, trusted last
    /// known viewport, geofence center, default region.
    #[must_use]
    pub fn resolve_initial(&self) -> Option<(Viewport, InitialSource)> {
        if let Some(request) = &self.highlight {
            return Some((
                Viewport::at_zoom(request.coordinate, self.config.detail_zoom),
                InitialSource::Highlight,
            ));
        }

        if let Some(saved) = self.store.last_known() {
            let trusted = self.geofence.is_none_or(|fence| {
                distance_meters(fence.center, saved.center) <= self.config.drift_limit_meters
            });
            if trusted {
                return Some((
                    Viewport::at_zoom(saved.center, saved.zoom),
                    InitialSource::LastKnown,
                ));
            }
            log::debug!(
                "Discarding last known center {}: more than {}m from the geofence center",
                saved.center,
                self.config.drift_limit_meters
            );
        }

        if let Some(fence) = self.geofence {
            return Some((
                Viewport::at_zoom(fence.center, self.config.neighborhood_zoom),
                InitialSource::Geofence,
            ));
        }

        self.default_region
            .map(|region| (region, InitialSource::DefaultRegion))
    }

    fn try_initialize(&mut self) -> Option<InitialSource> {
        if self.map.is_none() {
            return None;
        }
        let Some((viewport, source)) = self.resolve_initial() else {
            log::debug!("No initial center available yet; map stays uninitialized");
            return None;
        };

        log::debug!(
            "Initializing viewport at {} (zoom {}) from {source}",
            viewport.center,
            viewport.zoom
        );
        self.set_state(ControllerState::Centered);
        self.store.mark_initialized(&viewport);
        self.issue(viewport, CommandReason::Initialize, false);
        Some(source)
    }

    fn acknowledge(&mut self, id: CommandId, viewport: Viewport) {
        if self.in_flight != Some(id) {
            log::trace!("Ignoring stale settle from {id}");
            return;
        }
        self.in_flight = None;
        self.viewport = Some(viewport);
        self.store.record(&viewport);
        self.set_state(ControllerState::Centered);
        log::trace!("{id} settled at {}", viewport.center);
        if self.unannounced_clamp.take() == Some(id) {
            self.listener.on_region_change(&viewport);
        }
    }

    fn settle_user(&mut self, viewport: Viewport) {
        if !viewport.center.is_valid() {
            log::debug!("Ignoring settle at invalid center {}", viewport.center);
            return;
        }
        // A user move interrupts whatever we asked the map to do.
        self.in_flight = None;
        self.unannounced_clamp = None;

        if let Some(fence) = self.breached_geofence(viewport.center) {
            self.clamp(viewport, fence, true);
            return;
        }

        self.viewport = Some(viewport);
        self.store.record(&viewport);
        self.set_state(ControllerState::Centered);
        self.listener.on_region_change(&viewport);
    }

    fn breached_geofence(&self, center: GeoPoint) -> Option<GeofenceConstraint> {
        let fence = self.geofence?;
        let limit = fence.radius_meters + self.config.geofence_tolerance_meters;
        (center.is_valid() && distance_meters(fence.center, center) > limit).then_some(fence)
    }

    /// Pulls `viewport` back onto the fence. A clamp made while the user is
    /// still dragging is neither persisted nor reported until its command
    /// settles.
    fn clamp(&mut self, viewport: Viewport, fence: GeofenceConstraint, settled: bool) {
        let center = clamp_to_radius(fence.center, viewport.center, fence.radius_meters);
        let clamped = viewport.with_center(center);
        log::debug!(
            "Clamping center {} to {} on the {:.0}m geofence",
            viewport.center,
            center,
            fence.radius_meters
        );

        self.set_state(ControllerState::Clamped);
        if settled {
            self.store.record(&clamped);
            self.listener.on_region_change(&clamped);
            self.issue(clamped, CommandReason::Clamp, false);
        } else {
            self.unannounced_clamp = self.issue(clamped, CommandReason::Clamp, false);
        }
    }

    fn issue(
        &mut self,
        viewport: Viewport,
        reason: CommandReason,
        animated: bool,
    ) -> Option<CommandId> {
        self.viewport = Some(viewport);
        let Some(map) = self.map.as_mut() else {
            log::debug!("No map attached; {reason} move to {} not sent", viewport.center);
            return None;
        };

        let id = CommandId::new(self.next_command);
        self.next_command += 1;
        let command = ViewCommand {
            id,
            viewport,
            animated,
            reason,
        };
        log::debug!("Issuing {id} ({reason}) to {} zoom {}", viewport.center, viewport.zoom);
        map.apply_view(&command);
        self.in_flight = Some(id);
        Some(id)
    }

    fn set_state(&mut self, state: ControllerState) {
        if self.state != state {
            log::trace!("Viewport state {} -> {state}", self.state);
            self.state = state;
        }
    }
}
