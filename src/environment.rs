use std::collections::BTreeSet;

use thiserror::Error;

use crate::proctor::devtools::WindowMetrics;
use crate::proctor::reason::ViolationKind;

#[derive(Error, Debug)]
pub enum EnvError {
    #[error("fullscreen request denied: {0}")]
    FullscreenDenied(String),
    #[error("not supported by this environment: {0}")]
    Unsupported(&'static str),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Global listeners a session installs for its lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Listener {
    Visibility,
    Blur,
    PageHide,
    FullscreenChange,
    KeyDown,
    ContextMenu,
    MouseLeave,
    BeforeUnload,
}

impl Listener {
    pub const ALL: [Listener; 8] = [
        Listener::Visibility,
        Listener::Blur,
        Listener::PageHide,
        Listener::FullscreenChange,
        Listener::KeyDown,
        Listener::ContextMenu,
        Listener::MouseLeave,
        Listener::BeforeUnload,
    ];
}

/// A transient, auto-dismissing warning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    pub message: String,
}

impl Toast {
    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Everything the proctoring controller needs from the surface it locks down.
///
/// The controller never caches fullscreen state: `is_fullscreen` must report
/// what the surface looks like right now.
pub trait ProctorEnv {
    fn request_fullscreen(&mut self) -> Result<(), EnvError>;
    fn is_fullscreen(&self) -> bool;

    fn add_listener(&mut self, listener: Listener);
    fn remove_listener(&mut self, listener: Listener);

    /// `None` when the surface cannot report outer and inner sizes.
    fn window_metrics(&self) -> Option<WindowMetrics>;

    fn show_confirmation(&mut self, kind: ViolationKind);
    fn close_confirmation(&mut self);
    fn toast(&mut self, toast: Toast);

    /// Throw away the host's state, as a page reload would.
    fn reload(&mut self);
}

impl<E: ProctorEnv + ?Sized> ProctorEnv for &mut E {
    fn request_fullscreen(&mut self) -> Result<(), EnvError> {
        (**self).request_fullscreen()
    }

    fn is_fullscreen(&self) -> bool {
        (**self).is_fullscreen()
    }

    fn add_listener(&mut self, listener: Listener) {
        (**self).add_listener(listener)
    }

    fn remove_listener(&mut self, listener: Listener) {
        (**self).remove_listener(listener)
    }

    fn window_metrics(&self) -> Option<WindowMetrics> {
        (**self).window_metrics()
    }

    fn show_confirmation(&mut self, kind: ViolationKind) {
        (**self).show_confirmation(kind)
    }

    fn close_confirmation(&mut self) {
        (**self).close_confirmation()
    }

    fn toast(&mut self, toast: Toast) {
        (**self).toast(toast)
    }

    fn reload(&mut self) {
        (**self).reload()
    }
}

/// How a [`RecordingEnv`] answers fullscreen requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FullscreenScript {
    Grant,
    DenyAll,
    /// Deny the first `n` requests, grant the ones after.
    DenyFirst(u32),
}

/// In-memory environment for tests: scriptable fullscreen, recorded effects.
#[derive(Debug)]
pub struct RecordingEnv {
    pub fullscreen: bool,
    pub script: FullscreenScript,
    pub fullscreen_requests: u32,
    pub listeners: BTreeSet<Listener>,
    pub listeners_ever_added: u32,
    pub open_dialog: Option<ViolationKind>,
    pub dialogs_shown: Vec<ViolationKind>,
    pub max_open_dialogs: u32,
    pub toasts: Vec<Toast>,
    pub reloads: u32,
    pub metrics: Option<WindowMetrics>,
}

impl Default for RecordingEnv {
    fn default() -> Self {
        Self {
            fullscreen: false,
            script: FullscreenScript::Grant,
            fullscreen_requests: 0,
            listeners: BTreeSet::new(),
            listeners_ever_added: 0,
            open_dialog: None,
            dialogs_shown: Vec::new(),
            max_open_dialogs: 0,
            toasts: Vec::new(),
            reloads: 0,
            metrics: None,
        }
    }
}

impl RecordingEnv {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_script(script: FullscreenScript) -> Self {
        Self {
            script,
            ..Self::default()
        }
    }

    /// Leave fullscreen behind the controller's back (OS-level Escape etc).
    pub fn drop_fullscreen(&mut self) {
        self.fullscreen = false;
    }
}

impl ProctorEnv for RecordingEnv {
    fn request_fullscreen(&mut self) -> Result<(), EnvError> {
        self.fullscreen_requests += 1;
        let granted = match self.script {
            FullscreenScript::Grant => true,
            FullscreenScript::DenyAll => false,
            FullscreenScript::DenyFirst(n) => self.fullscreen_requests > n,
        };
        if granted {
            self.fullscreen = true;
            Ok(())
        } else {
            Err(EnvError::FullscreenDenied(format!(
                "request {} rejected",
                self.fullscreen_requests
            )))
        }
    }

    fn is_fullscreen(&self) -> bool {
        self.fullscreen
    }

    fn add_listener(&mut self, listener: Listener) {
        if self.listeners.insert(listener) {
            self.listeners_ever_added += 1;
        }
    }

    fn remove_listener(&mut self, listener: Listener) {
        self.listeners.remove(&listener);
    }

    fn window_metrics(&self) -> Option<WindowMetrics> {
        self.metrics
    }

    fn show_confirmation(&mut self, kind: ViolationKind) {
        self.dialogs_shown.push(kind);
        let open = if self.open_dialog.is_some() { 2 } else { 1 };
        self.max_open_dialogs = self.max_open_dialogs.max(open);
        self.open_dialog = Some(kind);
    }

    fn close_confirmation(&mut self) {
        self.open_dialog = None;
    }

    fn toast(&mut self, toast: Toast) {
        self.toasts.push(toast);
    }

    fn reload(&mut self) {
        self.reloads += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deny_first_grants_after_n_requests() {
        let mut env = RecordingEnv::with_script(FullscreenScript::DenyFirst(1));
        assert!(env.request_fullscreen().is_err());
        assert!(!env.is_fullscreen());
        assert!(env.request_fullscreen().is_ok());
        assert!(env.is_fullscreen());
        assert_eq!(env.fullscreen_requests, 2);
    }

    #[test]
    fn overlapping_dialogs_are_recorded() {
        let mut env = RecordingEnv::new();
        env.show_confirmation(ViolationKind::ManualQuit);
        assert_eq!(env.max_open_dialogs, 1);
        env.show_confirmation(ViolationKind::FullscreenExit);
        assert_eq!(env.max_open_dialogs, 2);
    }

    #[test]
    fn listener_set_tracks_add_and_remove() {
        let mut env = RecordingEnv::new();
        env.add_listener(Listener::Blur);
        env.add_listener(Listener::Blur);
        assert_eq!(env.listeners_ever_added, 1);
        env.remove_listener(Listener::Blur);
        assert!(env.listeners.is_empty());
    }
}
