use std::time::{Duration, Instant};

use crate::proctor::devtools::DevtoolsHeuristic;
use crate::proctor::reason::{TerminationReason, ViolationKind};

/// Longest countdown a session runs; longer durations are clamped to it.
pub const MAX_DURATION: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// `now + span`, with `span` clamped to [`MAX_DURATION`]. Falls back to `now`
/// when even that does not fit in an `Instant`.
pub fn deadline_after(now: Instant, span: Duration) -> Instant {
    now.checked_add(span.min(MAX_DURATION)).unwrap_or(now)
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Countdown length. Reaching zero ends the session with `time-expired`.
    pub duration: Duration,
    /// Interval of the compliance poll (devtools heuristic, fullscreen re-check).
    pub poll_interval: Duration,
    pub restore_attempts: u32,
    /// Attempt `n` of a fullscreen restoration waits `n * restore_backoff`.
    pub restore_backoff: Duration,
    pub devtools: DevtoolsHeuristic,
    pub escape_opens_quit: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            duration: Duration::from_secs(30 * 60),
            poll_interval: Duration::from_millis(500),
            restore_attempts: 3,
            restore_backoff: Duration::from_millis(250),
            devtools: DevtoolsHeuristic::default(),
            escape_opens_quit: true,
        }
    }
}

/// Lifecycle of one proctored attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Enforcing,
    AwaitingConfirmation(ViolationKind),
    /// The learner declined to end after leaving fullscreen; fullscreen is
    /// being re-acquired. `deadline` bounds the current attempt.
    Restoring { attempt: u32, deadline: Instant },
    Terminated(TerminationReason),
}

#[derive(Debug, Clone)]
pub struct SessionState {
    pub phase: Phase,
    /// Last fresh read of the environment's fullscreen status.
    pub fullscreen_active: bool,
    /// Non-fatal warnings issued so far. Informational, never escalates.
    pub warning_count: u32,
    pub time_remaining_seconds: u64,
    pub started_at: Option<Instant>,
    pub ends_at: Option<Instant>,
    pub last_poll: Option<Instant>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            phase: Phase::Idle,
            fullscreen_active: false,
            warning_count: 0,
            time_remaining_seconds: 0,
            started_at: None,
            ends_at: None,
            last_poll: None,
        }
    }
}

impl SessionState {
    pub fn is_terminated(&self) -> bool {
        matches!(self.phase, Phase::Terminated(_))
    }

    /// True while a confirmation or a fullscreen restoration is in flight.
    pub fn is_handling_violation(&self) -> bool {
        matches!(
            self.phase,
            Phase::AwaitingConfirmation(_) | Phase::Restoring { .. }
        )
    }

    pub fn is_enforcing(&self) -> bool {
        self.phase == Phase::Enforcing
    }

    pub fn termination(&self) -> Option<TerminationReason> {
        match self.phase {
            Phase::Terminated(reason) => Some(reason),
            _ => None,
        }
    }

    /// Recompute the whole seconds left, rounding up so the display only
    /// reaches zero when the deadline has actually passed.
    pub fn update_remaining(&mut self, now: Instant) {
        if let Some(ends_at) = self.ends_at {
            let left = ends_at.saturating_duration_since(now);
            let secs = left.as_secs() + u64::from(left.subsec_nanos() > 0);
            self.time_remaining_seconds = secs;
        }
    }
}
