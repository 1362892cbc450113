//! Highlight-and-open coordination.
//!
//! After the map centers on a highlighted event, its marker popup can only
//! be opened once the marker is attached to the map. The coordinator opens
//! it as soon as the host signals that the marker is attached, and falls
//! back to a bounded retry schedule driven by [`HighlightCoordinator::poll`].

use std::time::{Duration, Instant};

use event_map_viewport_models::EventMarkerGroup;
use strum::{AsRefStr, Display};

use crate::map::MapHandle;

/// Offsets, measured from acceptance, at which a pending popup is retried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    delays: Vec<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_millis(&[200, 500, 1000, 2000])
    }
}

impl RetryPolicy {
    /// Creates a policy from attempt offsets. Offsets are sorted and
    /// duplicates dropped.
    #[must_use]
    pub fn new(mut delays: Vec<Duration>) -> Self {
        delays.sort_unstable();
        delays.dedup();
        Self { delays }
    }

    /// Creates a policy from offsets in milliseconds.
    #[must_use]
    pub fn from_millis(delays_ms: &[u64]) -> Self {
        Self::new(delays_ms.iter().copied().map(Duration::from_millis).collect())
    }

    /// Attempt offsets in ascending order.
    #[must_use]
    pub fn delays(&self) -> &[Duration] {
        &self.delays
    }

    /// Number of scheduled attempts.
    #[must_use]
    pub fn attempts(&self) -> usize {
        self.delays.len()
    }
}

/// Progress of the current highlight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum HighlightStatus {
    /// Nothing to open.
    Idle,
    /// Waiting for the marker; `attempts` failed so far.
    Pending { attempts: usize },
    /// The popup was opened.
    Opened,
    /// Every scheduled attempt failed.
    Abandoned,
}

/// Outcome of [`HighlightCoordinator::submit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum Submission {
    /// A new schedule started.
    Accepted,
    /// The same event is already pending; nothing changed.
    Duplicate,
    /// The request was unusable.
    Rejected,
}

#[derive(Debug, Clone)]
struct Pending {
    event_id: String,
    accepted_at: Instant,
    next_slot: usize,
    attempts: usize,
}

/// Opens the popup of a highlighted event once its marker exists.
#[derive(Debug, Clone)]
pub struct HighlightCoordinator {
    policy: RetryPolicy,
    pending: Option<Pending>,
    last_event: Option<String>,
    status: HighlightStatus,
}

impl Default for HighlightCoordinator {
    fn default() -> Self {
        Self::new(RetryPolicy::default())
    }
}

impl HighlightCoordinator {
    /// Creates an idle coordinator.
    #[must_use]
    pub const fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            pending: None,
            last_event: None,
            status: HighlightStatus::Idle,
        }
    }

    /// The retry schedule.
    #[must_use]
    pub const fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Progress of the current highlight.
    #[must_use]
    pub const fn status(&self) -> HighlightStatus {
        self.status
    }

    /// The event most recently submitted, pending or not.
    #[must_use]
    pub fn event_id(&self) -> Option<&str> {
        self.last_event.as_deref()
    }

    /// The event still waiting for its popup.
    #[must_use]
    pub fn pending_event(&self) -> Option<&str> {
        self.pending.as_ref().map(|p| p.event_id.as_str())
    }

    /// Starts a retry schedule for `event_id`.
    ///
    /// Resubmitting the pending event is a no-op. Submitting a different
    /// event supersedes the pending one.
    pub fn submit(&mut self, event_id: &str, now: Instant) -> Submission {
        if event_id.is_empty() {
            log::warn!("Ignoring highlight request without an event id");
            return Submission::Rejected;
        }
        if self.policy.attempts() == 0 {
            log::warn!("Highlight retry policy has no attempts; ignoring {event_id}");
            return Submission::Rejected;
        }

        match &self.pending {
            Some(pending) if pending.event_id == event_id => {
                log::trace!("Highlight for {event_id} already pending");
                return Submission::Duplicate;
            }
            Some(pending) => {
                log::debug!("Highlight for {} superseded by {event_id}", pending.event_id);
            }
            None => {}
        }

        self.pending = Some(Pending {
            event_id: event_id.to_string(),
            accepted_at: now,
            next_slot: 0,
            attempts: 0,
        });
        self.last_event = Some(event_id.to_string());
        self.status = HighlightStatus::Pending { attempts: 0 };
        Submission::Accepted
    }

    /// Stops retrying. Returns whether anything was pending.
    pub fn cancel(&mut self) -> bool {
        let Some(pending) = self.pending.take() else {
            return false;
        };
        log::debug!("Highlight for {} cancelled", pending.event_id);
        self.status = HighlightStatus::Idle;
        true
    }

    /// Forgets the current highlight entirely.
    pub fn clear(&mut self) {
        self.pending = None;
        self.last_event = None;
        self.status = HighlightStatus::Idle;
    }

    /// When the next scheduled attempt is due.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        let pending = self.pending.as_ref()?;
        self.policy
            .delays()
            .get(pending.next_slot)
            .map(|delay| pending.accepted_at + *delay)
    }

    /// Runs the scheduled attempt if one is due.
    ///
    /// A late poll makes a single attempt and skips every slot that has
    /// already elapsed.
    pub fn poll<M: MapHandle + ?Sized>(
        &mut self,
        now: Instant,
        groups: &[EventMarkerGroup],
        map: Option<&mut M>,
    ) -> HighlightStatus {
        let Some(mut pending) = self.pending.take() else {
            return self.status;
        };

        let elapsed = now.saturating_duration_since(pending.accepted_at);
        let due = self.policy.delays()[pending.next_slot.min(self.policy.attempts())..]
            .iter()
            .take_while(|delay| **delay <= elapsed)
            .count();
        if due == 0 {
            self.pending = Some(pending);
            return self.status;
        }

        if due > 1 {
            log::trace!("Coalescing {due} elapsed highlight attempts");
        }
        pending.next_slot += due;
        self.attempt(pending, groups, map)
    }

    /// The marker for `group_key` was attached to the map. Attempts to open
    /// the pending popup right away if it belongs to that group.
    ///
    /// The attempt takes the place of the next scheduled one, so the total
    /// never exceeds [`RetryPolicy::attempts`].
    pub fn on_marker_attached<M: MapHandle + ?Sized>(
        &mut self,
        group_key: &str,
        groups: &[EventMarkerGroup],
        map: &mut M,
    ) -> HighlightStatus {
        let Some(mut pending) = self.pending.take() else {
            return self.status;
        };
        let belongs = groups
            .iter()
            .any(|group| group.key == group_key && group.contains(&pending.event_id));
        if !belongs {
            self.pending = Some(pending);
            return self.status;
        }
        pending.next_slot += 1;
        self.attempt(pending, groups, Some(map))
    }

    fn attempt<M: MapHandle + ?Sized>(
        &mut self,
        mut pending: Pending,
        groups: &[EventMarkerGroup],
        map: Option<&mut M>,
    ) -> HighlightStatus {
        pending.attempts += 1;
        let group = groups.iter().find(|group| group.contains(&pending.event_id));
        let opened = match (group, map) {
            (Some(group), Some(map)) => map.open_marker_popup(&group.key),
            _ => false,
        };

        if opened {
            log::debug!(
                "Opened popup for {} after {} attempt(s)",
                pending.event_id,
                pending.attempts
            );
            self.status = HighlightStatus::Opened;
        } else if pending.next_slot >= self.policy.attempts() {
            log::warn!(
                "Giving up on popup for {} after {} attempt(s)",
                pending.event_id,
                pending.attempts
            );
            self.status = HighlightStatus::Abandoned;
        } else {
            log::trace!(
                "Popup for {} not ready (attempt {})",
                pending.event_id,
                pending.attempts
            );
            self.status = HighlightStatus::Pending {
                attempts: pending.attempts,
            };
            self.pending = Some(pending);
        }
        self.status
    }
}
