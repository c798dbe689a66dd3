//! Proctoring session controller.
//!
//! A [`Controller`] owns one locked-down quiz attempt. It keeps the surface in
//! fullscreen, swallows disruptive input, watches focus and visibility, and
//! ends the attempt through exactly one call to the `on_quiz_end` callback.
//!
//! Every browser-style signal funnels through [`Controller::handle`]; time
//! based work (countdown, compliance poll, fullscreen restoration) runs in
//! [`Controller::tick`]. Both are plain synchronous calls on one thread, so
//! the [`Phase`] alone decides which signal wins when several arrive for the
//! same underlying cause (a tab switch raises blur, visibility and
//! fullscreen changes back to back).

pub mod devtools;
pub mod keys;
pub mod reason;

use std::collections::BTreeSet;
use std::time::Instant;

use crossterm::event::{KeyCode, KeyEvent};
use tracing::{debug, info, warn};

use crate::environment::{Listener, ProctorEnv, Toast};
use crate::session::{deadline_after, Phase, SessionConfig, SessionState};
use keys::KeyVerdict;
use reason::{TerminationReason, ViolationKind};

/// A signal delivered by one of the session's listeners.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Signal {
    Visibility { hidden: bool },
    WindowBlur,
    PageHide,
    /// The fullscreen state may have changed; the controller re-reads it.
    FullscreenChange,
    Key(KeyEvent),
    ContextMenu,
    /// Pointer left the viewport at `(x, y)`; `width`/`height` bound it.
    MouseLeave {
        x: i32,
        y: i32,
        width: u32,
        height: u32,
    },
    BeforeUnload,
}

impl Signal {
    pub fn listener(&self) -> Listener {
        match self {
            Signal::Visibility { .. } => Listener::Visibility,
            Signal::WindowBlur => Listener::Blur,
            Signal::PageHide => Listener::PageHide,
            Signal::FullscreenChange => Listener::FullscreenChange,
            Signal::Key(_) => Listener::KeyDown,
            Signal::ContextMenu => Listener::ContextMenu,
            Signal::MouseLeave { .. } => Listener::MouseLeave,
            Signal::BeforeUnload => Listener::BeforeUnload,
        }
    }
}

/// What happened to a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Not for the controller: deliver to the host screen.
    PassThrough,
    Suppressed,
    Warned,
    ConfirmationOpened,
    /// The learner declined and the session is enforced again.
    Resumed,
    /// Restoration of fullscreen is in progress.
    Restoring,
    Terminated(TerminationReason),
    /// No listener installed, or another violation is already being handled.
    Ignored,
}

pub type QuizEndCallback = Box<dyn FnOnce(TerminationReason)>;

pub struct Controller<E: ProctorEnv> {
    env: E,
    config: SessionConfig,
    state: SessionState,
    installed: BTreeSet<Listener>,
    on_quiz_end: Option<QuizEndCallback>,
}

impl<E: ProctorEnv> Controller<E> {
    pub fn new(env: E, config: SessionConfig) -> Self {
        Self {
            env,
            config,
            state: SessionState::default(),
            installed: BTreeSet::new(),
            on_quiz_end: None,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn phase(&self) -> Phase {
        self.state.phase
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn env(&self) -> &E {
        &self.env
    }

    pub fn env_mut(&mut self) -> &mut E {
        &mut self.env
    }

    pub fn installed_listeners(&self) -> impl Iterator<Item = &Listener> {
        self.installed.iter()
    }

    /// Begin enforcement. Fullscreen is acquired before anything else; when
    /// that fails the session ends with `fullscreen-denied` and no listener
    /// is ever installed.
    pub fn start<F>(&mut self, on_quiz_end: F, now: Instant)
    where
        F: FnOnce(TerminationReason) + 'static,
    {
        if self.state.phase != Phase::Idle {
            debug!(phase = ?self.state.phase, "start ignored, session already begun");
            return;
        }

        self.on_quiz_end = Some(Box::new(on_quiz_end));
        self.state.phase = Phase::Enforcing;
        self.state.started_at = Some(now);
        info!(duration_secs = self.config.duration.as_secs(), "proctored session starting");

        if !self.request_fullscreen() {
            return;
        }

        for listener in Listener::ALL {
            self.env.add_listener(listener);
            self.installed.insert(listener);
        }
        self.state.ends_at = Some(deadline_after(now, self.config.duration));
        self.state.last_poll = Some(now);
        self.state.update_remaining(now);
    }

    /// Acquire fullscreen, trusting only a fresh read afterwards. Failure ends
    /// the session with `fullscreen-denied`.
    pub fn request_fullscreen(&mut self) -> bool {
        if self.acquire_fullscreen() {
            return true;
        }
        self.terminate(TerminationReason::FullscreenDenied);
        false
    }

    fn acquire_fullscreen(&mut self) -> bool {
        if let Err(e) = self.env.request_fullscreen() {
            warn!(error = %e, "fullscreen request failed");
        }
        self.state.fullscreen_active = self.env.is_fullscreen();
        self.state.fullscreen_active
    }

    /// Open the blocking confirmation for `kind`. Returns false, showing
    /// nothing, unless the session is enforcing with no other violation in
    /// flight.
    pub fn confirm_violation(&mut self, kind: ViolationKind) -> bool {
        if !self.state.is_enforcing() {
            debug!(%kind, phase = ?self.state.phase, "confirmation suppressed");
            return false;
        }
        warn!(%kind, "violation awaiting confirmation");
        self.state.phase = Phase::AwaitingConfirmation(kind);
        self.env.show_confirmation(kind);
        true
    }

    /// The in-app quit action.
    pub fn request_quit(&mut self) -> bool {
        self.confirm_violation(ViolationKind::ManualQuit)
    }

    /// Deliver the learner's answer to the open confirmation. `end` is true
    /// when they chose to end the attempt.
    pub fn resolve_confirmation(&mut self, end: bool, now: Instant) -> Disposition {
        let Phase::AwaitingConfirmation(kind) = self.state.phase else {
            return Disposition::Ignored;
        };
        self.env.close_confirmation();

        if end {
            let reason = kind.confirmed_reason();
            self.terminate(reason);
            return Disposition::Terminated(reason);
        }

        match kind {
            ViolationKind::ManualQuit => {
                info!("quit declined, resuming");
                self.state.phase = Phase::Enforcing;
                Disposition::Resumed
            }
            ViolationKind::FullscreenExit => self.restore_attempt(1, now),
        }
    }

    fn restore_attempt(&mut self, attempt: u32, now: Instant) -> Disposition {
        if self.acquire_fullscreen() {
            info!(attempt, "fullscreen restored");
            self.state.phase = Phase::Enforcing;
            return Disposition::Resumed;
        }
        let deadline = deadline_after(now, self.config.restore_backoff.saturating_mul(attempt));
        debug!(attempt, "fullscreen not restored yet");
        self.state.phase = Phase::Restoring { attempt, deadline };
        Disposition::Restoring
    }

    /// End the session. Only the first call has any effect: it records the
    /// reason, removes every listener, closes an open dialog and invokes the
    /// callback. Returns whether this call was the one that terminated.
    pub fn terminate(&mut self, reason: TerminationReason) -> bool {
        if self.state.is_terminated() {
            debug!(%reason, "already terminated");
            return false;
        }
        if matches!(self.state.phase, Phase::AwaitingConfirmation(_)) {
            self.env.close_confirmation();
        }

        self.state.phase = Phase::Terminated(reason);
        self.teardown();

        if reason.is_misconduct() {
            warn!(%reason, warnings = self.state.warning_count, "session terminated");
        } else {
            info!(%reason, warnings = self.state.warning_count, "session ended");
        }

        if let Some(on_quiz_end) = self.on_quiz_end.take() {
            on_quiz_end(reason);
        }
        true
    }

    /// Discard the current session so a new one can be started. Any
    /// listener still installed is removed; a pending callback is dropped
    /// without being called.
    pub fn reset(&mut self) {
        self.teardown();
        if self.state.is_handling_violation() {
            self.env.close_confirmation();
        }
        self.on_quiz_end = None;
        self.state = SessionState::default();
    }

    fn teardown(&mut self) {
        for listener in std::mem::take(&mut self.installed) {
            self.env.remove_listener(listener);
        }
    }

    fn hard_violation(&mut self, reason: TerminationReason) -> Disposition {
        if self.state.is_handling_violation() {
            debug!(%reason, "hard violation ignored while another is handled");
            return Disposition::Ignored;
        }
        self.terminate(reason);
        Disposition::Terminated(reason)
    }

    fn warn_learner(&mut self, message: &str) -> Disposition {
        self.state.warning_count += 1;
        warn!(count = self.state.warning_count, message, "warning issued");
        self.env.toast(Toast::warning(message));
        Disposition::Warned
    }

    /// Route a listener signal through the policy table.
    pub fn handle(&mut self, signal: &Signal, now: Instant) -> Disposition {
        if !self.installed.contains(&signal.listener()) {
            return Disposition::Ignored;
        }

        match signal {
            Signal::Visibility { hidden: false } => Disposition::Ignored,
            Signal::Visibility { hidden: true } => {
                self.hard_violation(TerminationReason::TabHidden)
            }
            Signal::WindowBlur => self.hard_violation(TerminationReason::WindowBlurred),
            Signal::PageHide => self.hard_violation(TerminationReason::PageHidden),
            Signal::FullscreenChange => self.on_fullscreen_change(),
            Signal::Key(key) => self.on_key(key, now),
            Signal::ContextMenu => Disposition::Suppressed,
            Signal::MouseLeave {
                x,
                y,
                width,
                height,
            } => {
                if self.state.is_handling_violation() {
                    return Disposition::Ignored;
                }
                let w = i64::from(*width);
                let h = i64::from(*height);
                let (x, y) = (i64::from(*x), i64::from(*y));
                if x <= 0 || y <= 0 || x >= w - 1 || y >= h - 1 {
                    self.warn_learner("Keep the pointer inside the quiz window")
                } else {
                    Disposition::Ignored
                }
            }
            Signal::BeforeUnload => {
                if self.state.is_handling_violation() {
                    return Disposition::Suppressed;
                }
                self.warn_learner("Leaving now ends the quiz. Use Ctrl+Q to quit instead")
            }
        }
    }

    fn on_fullscreen_change(&mut self) -> Disposition {
        let fresh = self.env.is_fullscreen();
        self.state.fullscreen_active = fresh;

        match self.state.phase {
            Phase::Enforcing if !fresh => {
                self.confirm_violation(ViolationKind::FullscreenExit);
                Disposition::ConfirmationOpened
            }
            Phase::Restoring { attempt, .. } if fresh => {
                info!(attempt, "fullscreen restored");
                self.state.phase = Phase::Enforcing;
                Disposition::Resumed
            }
            _ => Disposition::Ignored,
        }
    }

    fn on_key(&mut self, key: &KeyEvent, now: Instant) -> Disposition {
        match self.state.phase {
            Phase::AwaitingConfirmation(_) => match key.code {
                KeyCode::Char('y') | KeyCode::Char('Y') => self.resolve_confirmation(true, now),
                KeyCode::Char('n') | KeyCode::Char('N') => self.resolve_confirmation(false, now),
                _ => Disposition::Suppressed,
            },
            Phase::Enforcing => match keys::classify(key) {
                KeyVerdict::Allow => Disposition::PassThrough,
                KeyVerdict::Suppress => {
                    debug!(code = ?key.code, modifiers = ?key.modifiers, "key suppressed");
                    Disposition::Suppressed
                }
                KeyVerdict::Escape if !self.config.escape_opens_quit => Disposition::Suppressed,
                KeyVerdict::Escape | KeyVerdict::QuitRequest => {
                    self.confirm_violation(ViolationKind::ManualQuit);
                    Disposition::ConfirmationOpened
                }
            },
            _ => Disposition::Suppressed,
        }
    }

    /// Advance time: countdown, compliance poll and restoration deadlines.
    pub fn tick(&mut self, now: Instant) {
        if self.state.is_terminated() {
            return;
        }
        let Some(ends_at) = self.state.ends_at else {
            return;
        };

        self.state.update_remaining(now);
        if now >= ends_at {
            self.terminate(TerminationReason::TimeExpired);
            return;
        }

        match self.state.phase {
            Phase::Enforcing => {
                let due = self
                    .state
                    .last_poll
                    .map_or(true, |last| now.duration_since(last) >= self.config.poll_interval);
                if due {
                    self.state.last_poll = Some(now);
                    self.poll_compliance();
                }
            }
            Phase::Restoring { attempt, deadline } => {
                if self.env.is_fullscreen() {
                    info!(attempt, "fullscreen restored");
                    self.state.fullscreen_active = true;
                    self.state.phase = Phase::Enforcing;
                } else if now >= deadline {
                    if attempt >= self.config.restore_attempts.max(1) {
                        self.terminate(TerminationReason::FullscreenRestoreFailed);
                    } else {
                        self.restore_attempt(attempt + 1, now);
                    }
                }
            }
            _ => {}
        }
    }

    fn poll_compliance(&mut self) {
        if let Some(metrics) = self.env.window_metrics() {
            if self.config.devtools.tripped(&metrics) {
                warn!(?metrics, "devtools heuristic tripped");
                self.terminate(TerminationReason::DevtoolsDetected);
                self.env.reload();
                return;
            }
        }

        if self.env.is_fullscreen() {
            self.state.fullscreen_active = true;
            return;
        }

        // Dropped without an event. Ask for it back once before treating it
        // as an exit.
        debug!("fullscreen dropped silently, re-requesting");
        if !self.acquire_fullscreen() {
            self.confirm_violation(ViolationKind::FullscreenExit);
        }
    }
}

impl<E: ProctorEnv> Drop for Controller<E> {
    fn drop(&mut self) {
        if !self.installed.is_empty() {
            debug!("controller dropped with listeners installed, tearing down");
            self.teardown();
        }
    }
}
