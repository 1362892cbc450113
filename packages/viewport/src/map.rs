//! Seams between the controller and the host's map widget.
//!
//! The host implements [`MapHandle`] for its live map and feeds movement
//! notifications back as [`RegionUpdate`]s. Outgoing callbacks go through
//! [`MapListener`].

use std::sync::Arc;

use event_map_viewport_models::{EventMarkerGroup, EventSummary, Viewport};
use strum::{AsRefStr, Display};

/// Identifies one programmatic view change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CommandId(u64);

impl CommandId {
    /// Creates a command ID from its raw value.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw value.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for CommandId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "cmd#{}", self.0)
    }
}

/// Why the controller moved the map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum CommandReason {
    /// First centering after attaching to a map.
    Initialize,
    /// Pulling the view back inside the geofence.
    Clamp,
    /// Centering on a highlighted event.
    Highlight,
    /// Recentering after the geofence moved.
    Geofence,
    /// A region requested by the data layer.
    RequestedRegion,
}

/// A programmatic view change the map must apply.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewCommand {
    /// Tag the map echoes back in the resulting [`RegionUpdate`].
    pub id: CommandId,
    /// Target viewport.
    pub viewport: Viewport,
    /// Whether the move should be animated.
    pub animated: bool,
    /// Why the move was issued.
    pub reason: CommandReason,
}

/// What caused a movement notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOrigin {
    /// The user panned, dragged, or zoomed.
    User,
    /// The map is applying the given [`ViewCommand`].
    Command(CommandId),
}

/// A movement notification from the map.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegionUpdate {
    /// Viewport reported by the map.
    pub viewport: Viewport,
    /// What caused the movement.
    pub origin: MoveOrigin,
}

impl RegionUpdate {
    /// A user-driven movement.
    #[must_use]
    pub const fn user(viewport: Viewport) -> Self {
        Self {
            viewport,
            origin: MoveOrigin::User,
        }
    }

    /// A movement produced by applying command `id`.
    #[must_use]
    pub const fn from_command(id: CommandId, viewport: Viewport) -> Self {
        Self {
            viewport,
            origin: MoveOrigin::Command(id),
        }
    }
}

/// The live map widget, as seen by the controller.
pub trait MapHandle {
    /// Moves the view. The map must report the resulting movement with
    /// [`MoveOrigin::Command`] carrying `command.id`.
    fn apply_view(&mut self, command: &ViewCommand);

    /// Tries to open the detail popup of the marker rendered for
    /// `group_key`. Returns `false` if the marker is not attached yet.
    fn open_marker_popup(&mut self, group_key: &str) -> bool;
}

/// Callbacks from the map view to its collaborators.
///
/// Implementations must be `Send + Sync` so they can be shared as
/// `Arc<dyn MapListener>`.
pub trait MapListener: Send + Sync {
    /// The viewport settled somewhere new.
    fn on_region_change(&self, viewport: &Viewport);

    /// A marker (single event or cluster) was pressed.
    fn on_marker_press(&self, group: &EventMarkerGroup);

    /// An individual event was pressed (e.g. inside a cluster popup).
    fn on_event_press(&self, event: &EventSummary);
}

/// A [`MapListener`] that ignores every callback.
pub struct NullListener;

impl MapListener for NullListener {
    fn on_region_change(&self, _viewport: &Viewport) {}
    fn on_marker_press(&self, _group: &EventMarkerGroup) {}
    fn on_event_press(&self, _event: &EventSummary) {}
}

/// Returns a shared [`NullListener`] instance for convenient use.
#[must_use]
pub fn null_listener() -> Arc<dyn MapListener> {
    Arc::new(NullListener)
}
