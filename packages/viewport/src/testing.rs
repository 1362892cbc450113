//! Recording fakes for the map seams.

use std::collections::BTreeSet;
use std::sync::{Mutex, PoisonError};

use event_map_viewport_models::{EventMarkerGroup, EventSummary, Viewport};

use crate::map::{MapHandle, MapListener, ViewCommand};

/// A map that records commands and only opens popups for attached markers.
#[derive(Debug, Default)]
pub struct RecordingMap {
    pub commands: Vec<ViewCommand>,
    pub open_attempts: Vec<String>,
    pub attached: BTreeSet<String>,
}

impl RecordingMap {
    pub fn attach_marker(&mut self, group_key: &str) {
        self.attached.insert(group_key.to_string());
    }

    pub fn last_command(&self) -> &ViewCommand {
        self.commands.last().expect("no command was issued")
    }
}

impl MapHandle for RecordingMap {
    fn apply_view(&mut self, command: &ViewCommand) {
        self.commands.push(command.clone());
    }

    fn open_marker_popup(&mut self, group_key: &str) -> bool {
        self.open_attempts.push(group_key.to_string());
        self.attached.contains(group_key)
    }
}

/// A listener that records every callback.
#[derive(Debug, Default)]
pub struct RecordingListener {
    regions: Mutex<Vec<Viewport>>,
    markers: Mutex<Vec<String>>,
    events: Mutex<Vec<String>>,
}

impl RecordingListener {
    pub fn regions(&self) -> Vec<Viewport> {
        self.regions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn markers(&self) -> Vec<String> {
        self.markers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn events(&self) -> Vec<String> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl MapListener for RecordingListener {
    fn on_region_change(&self, viewport: &Viewport) {
        self.regions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(*viewport);
    }

    fn on_marker_press(&self, group: &EventMarkerGroup) {
        self.markers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(group.key.clone());
    }

    fn on_event_press(&self, event: &EventSummary) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.id.clone());
    }
}
