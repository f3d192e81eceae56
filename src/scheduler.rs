//! Scan scheduling: turning host change notifications into scan moments.
//!
//! The scheduler is a passive state machine over instants. It never sleeps or
//! spawns anything itself; the engine's tick loop feeds it events via
//! [`ChangeScheduler::note_event`] and asks [`ChangeScheduler::due`] whether a
//! scan should run now. This keeps every timing decision deterministic and
//! testable with hand-picked instants.
//!
//! Two sources can make a scan due:
//!
//! - a change-driven deadline (mutation debounce, visibility deferral, resize
//!   debounce, navigation), and
//! - the adaptive poll timer, which backs off multiplicatively on quiet pages
//!   and snaps back to the base interval as soon as a scan finds changes.
//!
//! User interactions arm a pause gate. While the gate is held no scan fires,
//! but pending deadlines are kept, so the first tick after release runs
//! exactly one catch-up scan instead of dropping the change on the floor.

use crate::config::{PauseConfig, SchedulerConfig};
use crate::types::{HostEvent, InteractionKind};
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// Why a scan is being run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanReason {
    /// A host change notification made the scan due
    Change,
    /// The adaptive poll timer elapsed
    Poll,
}

impl ScanReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanReason::Change => "change",
            ScanReason::Poll => "poll",
        }
    }
}

/// Decides when the next scan runs
#[derive(Debug)]
pub struct ChangeScheduler {
    timings: SchedulerConfig,
    pause: PauseConfig,

    /// Trailing mutation debounce deadline; each burst member pushes it out
    pending_mutation: Option<Instant>,
    /// Earliest-wins deadline for navigation, visibility, and resize
    pending_event: Option<Instant>,

    /// Pause gate: quiet period armed by typing/click/blur
    paused_until: Option<Instant>,
    /// Pause gate: held open while an interactive control keeps focus
    focus_held: bool,

    poll_interval: Duration,
    next_poll: Instant,
    no_change_streak: u32,
}

impl ChangeScheduler {
    pub fn new(timings: SchedulerConfig, pause: PauseConfig, now: Instant) -> Self {
        let poll_interval = Duration::from_millis(timings.poll_base_ms);
        Self {
            timings,
            pause,
            pending_mutation: None,
            pending_event: None,
            paused_until: None,
            focus_held: false,
            poll_interval,
            next_poll: now + poll_interval,
            no_change_streak: 0,
        }
    }

    /// Absorb one host event.
    ///
    /// Mutations use trailing debounce: each burst member pushes the deadline
    /// out again, so one scan runs after the burst settles. The debounce only
    /// extends itself; a deadline armed by navigation, visibility, or resize
    /// keeps its place and never moves later.
    pub fn note_event(&mut self, event: &HostEvent, now: Instant) {
        match event {
            HostEvent::Mutation { .. } => {
                self.pending_mutation =
                    Some(now + Duration::from_millis(self.timings.mutation_debounce_ms));
            }
            HostEvent::VisibilityChanged { .. } => {
                self.schedule_no_later_than(now + Duration::from_millis(self.timings.visibility_defer_ms));
            }
            HostEvent::Resized => {
                self.schedule_no_later_than(now + Duration::from_millis(self.timings.resize_debounce_ms));
            }
            HostEvent::LocationChanged { url } => {
                debug!("Navigation to {}, scheduling immediate scan", url);
                self.schedule_no_later_than(now);
            }
            HostEvent::Interaction(kind) => self.note_interaction(*kind, now),
        }
    }

    fn note_interaction(&mut self, kind: InteractionKind, now: Instant) {
        match kind {
            InteractionKind::Typing => {
                self.extend_quiet(now + Duration::from_millis(self.pause.typing_quiet_ms));
            }
            InteractionKind::Click => {
                self.extend_quiet(now + Duration::from_millis(self.pause.click_quiet_ms));
            }
            InteractionKind::Focus => {
                trace!("Interactive control focused, holding scans");
                self.focus_held = true;
            }
            InteractionKind::Blur => {
                self.focus_held = false;
                self.extend_quiet(now + Duration::from_millis(self.pause.blur_quiet_ms));
            }
        }
    }

    fn schedule_no_later_than(&mut self, deadline: Instant) {
        self.pending_event = Some(match self.pending_event {
            Some(existing) if existing <= deadline => existing,
            _ => deadline,
        });
    }

    fn extend_quiet(&mut self, until: Instant) {
        self.paused_until = Some(match self.paused_until {
            Some(existing) if existing >= until => existing,
            _ => until,
        });
    }

    /// Whether the pause gate is currently held
    pub fn paused(&self, now: Instant) -> bool {
        if self.focus_held {
            return true;
        }
        matches!(self.paused_until, Some(until) if until > now)
    }

    /// Whether a scan should run at `now`, and why.
    ///
    /// Consumes the pending change deadlines when the earliest fires; one
    /// scan covers everything armed. Returns `None` while the pause gate is
    /// held; pending deadlines survive the gate.
    pub fn due(&mut self, now: Instant) -> Option<ScanReason> {
        if self.paused(now) {
            return None;
        }

        let earliest = match (self.pending_mutation, self.pending_event) {
            (Some(m), Some(e)) => Some(m.min(e)),
            (m, e) => m.or(e),
        };
        if matches!(earliest, Some(deadline) if deadline <= now) {
            self.pending_mutation = None;
            self.pending_event = None;
            return Some(ScanReason::Change);
        }

        if self.next_poll <= now {
            return Some(ScanReason::Poll);
        }

        None
    }

    /// Arm a change deadline `delay` from now, used to pace root-lookup
    /// retries without blocking the tick loop
    pub fn schedule_retry(&mut self, delay: Duration, now: Instant) {
        self.schedule_no_later_than(now + delay);
    }

    /// Record the outcome of a scan and reschedule the poll timer.
    ///
    /// A scan that changed the transcript resets the backoff; after
    /// `no_change_threshold` consecutive quiet scans the interval grows
    /// multiplicatively up to the cap.
    pub fn record_scan_result(&mut self, changed: bool, now: Instant) {
        if changed {
            self.no_change_streak = 0;
            self.poll_interval = Duration::from_millis(self.timings.poll_base_ms);
        } else {
            self.no_change_streak += 1;
            if self.no_change_streak >= self.timings.no_change_threshold {
                let grown = self.poll_interval.as_millis() as f64 * self.timings.poll_backoff;
                let capped = (grown as u64).min(self.timings.poll_max_ms);
                if capped != self.poll_interval.as_millis() as u64 {
                    trace!("Quiet page, poll interval now {}ms", capped);
                }
                self.poll_interval = Duration::from_millis(capped);
            }
        }
        self.next_poll = now + self.poll_interval;
    }

    /// Drop all pending state and restart timers, as after navigation
    pub fn reset(&mut self, now: Instant) {
        self.pending_mutation = None;
        self.pending_event = None;
        self.paused_until = None;
        self.focus_held = false;
        self.no_change_streak = 0;
        self.poll_interval = Duration::from_millis(self.timings.poll_base_ms);
        self.next_poll = now + self.poll_interval;
    }

    /// Current poll interval, exposed for the engine's tick pacing
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }
}
