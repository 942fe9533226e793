//! Admission gate applied to every raw event.
//!
//! Three checks run in order:
//!
//! 1. **Pacing**: when enabled, at most one event is admitted per whole
//!    second. Events landing in the same second as the previous one are
//!    dropped, not queued.
//! 2. **Exclusion**: events whose name matches the exclude pattern are dropped.
//! 3. **Inclusion**: events whose name does not match the include pattern are
//!    dropped.
//!
//! Pacing runs before filtering, so a filtered-out event still consumes the
//! current second.
//!
//! # Known quirk
//!
//! A paced-out event still writes the current second into [`PacingState`].
//! The value already equals the stored one, so the write is a no-op.
//! Events are never buffered: a burst inside one second loses everything
//! after its first event.

use std::time::Duration;

use regex::Regex;

use crate::types::Event;

/// How long the driver waits after a paced-out event before receiving again.
pub const PACE_BACKOFF: Duration = Duration::from_secs(1);

/// Source of whole-second timestamps.
pub trait Clock {
    /// Returns the current Unix time in whole seconds.
    fn now_secs(&self) -> i64;
}

/// Wall clock backed by [`chrono::Utc`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_secs(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }
}

/// Pacing state threaded through every [`EventGate::admit`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacingState {
    pub last_accepted_second: i64,
}

impl PacingState {
    #[must_use]
    pub fn new(now_secs: i64) -> Self {
        Self {
            last_accepted_second: now_secs,
        }
    }
}

/// Outcome of running an event through the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Admitted,
    /// Dropped by the one-per-second pacing window.
    Paced,
    /// Dropped because the name matched the exclude pattern.
    Excluded,
    /// Dropped because the name did not match the include pattern.
    NotIncluded,
}

impl Admission {
    #[must_use]
    pub fn is_admitted(self) -> bool {
        self == Self::Admitted
    }
}

/// Pacing and include/exclude filtering.
#[derive(Debug, Clone)]
pub struct EventGate {
    pace: bool,
    include: Option<Regex>,
    exclude: Option<Regex>,
}

impl EventGate {
    #[must_use]
    pub fn new(pace: bool, include: Option<Regex>, exclude: Option<Regex>) -> Self {
        Self {
            pace,
            include,
            exclude,
        }
    }

    #[must_use]
    pub fn pace(&self) -> bool {
        self.pace
    }

    /// Decides whether `event` is admitted at time `now_secs`.
    ///
    /// The only side effect is the update of `state`.
    pub fn admit(&self, event: &Event, state: &mut PacingState, now_secs: i64) -> Admission {
        if self.pace {
            if now_secs == state.last_accepted_second {
                state.last_accepted_second = now_secs;
                return Admission::Paced;
            }
            state.last_accepted_second = now_secs;
        }

        if let Some(exclude) = &self.exclude {
            if exclude.is_match(&event.name) {
                return Admission::Excluded;
            }
        }

        if let Some(include) = &self.include {
            if !include.is_match(&event.name) {
                return Admission::NotIncluded;
            }
        }

        Admission::Admitted
    }
}
