//! Terminal implementation of the proctoring environment.
//!
//! "Fullscreen" here means the alternate screen is active and the terminal is
//! at least the configured minimum size. The size is read from the terminal
//! every time it is asked for, so a window shrunk behind our back shows up
//! on the next fullscreen change or compliance poll.

use std::collections::{BTreeSet, VecDeque};
use std::io::{self, Write};
use std::time::{Duration, Instant};

use crossterm::{
    event::{DisableFocusChange, DisableMouseCapture, EnableFocusChange, EnableMouseCapture},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, SetSize},
};
use tracing::{debug, warn};

use crate::environment::{EnvError, Listener, ProctorEnv, Toast};
use crate::proctor::devtools::WindowMetrics;
use crate::proctor::reason::ViolationKind;

pub type SizeProbe = Box<dyn Fn() -> io::Result<(u16, u16)>>;

/// Dialog and toast state the host screen draws on top of the quiz.
#[derive(Debug)]
pub struct Overlay {
    pub dialog: Option<ViolationKind>,
    toasts: VecDeque<(Toast, Instant)>,
    ttl: Duration,
}

impl Overlay {
    pub fn new(ttl: Duration) -> Self {
        Self {
            dialog: None,
            toasts: VecDeque::new(),
            ttl,
        }
    }

    pub fn push_toast(&mut self, toast: Toast, now: Instant) {
        self.toasts.push_back((toast, now + self.ttl));
    }

    /// Drop expired toasts and return the ones still showing, oldest first.
    pub fn active_toasts(&mut self, now: Instant) -> Vec<&Toast> {
        while self.toasts.front().is_some_and(|(_, until)| *until <= now) {
            self.toasts.pop_front();
        }
        self.toasts.iter().map(|(t, _)| t).collect()
    }
}

pub struct TerminalEnv<W: Write> {
    out: W,
    size: SizeProbe,
    min_size: (u16, u16),
    alternate: bool,
    baseline: Option<(u16, u16)>,
    listeners: BTreeSet<Listener>,
    pub overlay: Overlay,
    reload_requested: bool,
}

impl TerminalEnv<io::Stdout> {
    pub fn stdout(min_size: (u16, u16), toast_ttl: Duration) -> Self {
        Self::new(
            io::stdout(),
            Box::new(crossterm::terminal::size),
            min_size,
            toast_ttl,
        )
    }
}

impl<W: Write> TerminalEnv<W> {
    pub fn new(out: W, size: SizeProbe, min_size: (u16, u16), toast_ttl: Duration) -> Self {
        Self {
            out,
            size,
            min_size,
            alternate: false,
            baseline: None,
            listeners: BTreeSet::new(),
            overlay: Overlay::new(toast_ttl),
            reload_requested: false,
        }
    }

    pub fn enter_alternate_screen(&mut self) -> io::Result<()> {
        if !self.alternate {
            execute!(self.out, EnterAlternateScreen)?;
            self.alternate = true;
        }
        Ok(())
    }

    fn current_size(&self) -> Option<(u16, u16)> {
        match (self.size)() {
            Ok(size) => Some(size),
            Err(e) => {
                warn!(error = %e, "could not read terminal size");
                None
            }
        }
    }

    fn large_enough(&self, (w, h): (u16, u16)) -> bool {
        w >= self.min_size.0 && h >= self.min_size.1
    }

    /// True once after the controller asked for a reload.
    pub fn take_reload(&mut self) -> bool {
        std::mem::take(&mut self.reload_requested)
    }

    /// Undo every terminal mode this environment switched on.
    pub fn restore(&mut self) -> io::Result<()> {
        for listener in std::mem::take(&mut self.listeners) {
            self.apply_listener(listener, false)?;
        }
        if self.alternate {
            execute!(self.out, LeaveAlternateScreen)?;
            self.alternate = false;
        }
        Ok(())
    }

    fn mouse_listeners(&self) -> usize {
        self.listeners
            .iter()
            .filter(|l| matches!(l, Listener::MouseLeave | Listener::ContextMenu))
            .count()
    }

    // Called after `listeners` was updated for `listener`.
    fn apply_listener(&mut self, listener: Listener, on: bool) -> io::Result<()> {
        match listener {
            Listener::Blur if on => execute!(self.out, EnableFocusChange),
            Listener::Blur => execute!(self.out, DisableFocusChange),
            Listener::MouseLeave | Listener::ContextMenu => {
                let others = self.mouse_listeners();
                match (on, others) {
                    (true, 1) => execute!(self.out, EnableMouseCapture),
                    (false, 0) => execute!(self.out, DisableMouseCapture),
                    _ => Ok(()),
                }
            }
            // keys arrive through raw mode; visibility, page hide, unload
            // and fullscreen changes have no terminal mode to toggle
            _ => Ok(()),
        }
    }
}

impl<W: Write> ProctorEnv for TerminalEnv<W> {
    fn request_fullscreen(&mut self) -> Result<(), EnvError> {
        self.enter_alternate_screen()?;

        let size = self
            .current_size()
            .ok_or(EnvError::Unsupported("terminal size"))?;
        if !self.large_enough(size) {
            // honoured by some terminal emulators, ignored by most
            execute!(self.out, SetSize(self.min_size.0, self.min_size.1))?;
        }

        match self.current_size() {
            Some(size) if self.large_enough(size) => {
                self.baseline = Some(size);
                Ok(())
            }
            Some((w, h)) => Err(EnvError::FullscreenDenied(format!(
                "terminal is {}x{}, at least {}x{} is required",
                w, h, self.min_size.0, self.min_size.1
            ))),
            None => Err(EnvError::Unsupported("terminal size")),
        }
    }

    fn is_fullscreen(&self) -> bool {
        self.alternate && self.current_size().is_some_and(|s| self.large_enough(s))
    }

    fn add_listener(&mut self, listener: Listener) {
        if self.listeners.insert(listener) {
            if let Err(e) = self.apply_listener(listener, true) {
                warn!(?listener, error = %e, "could not enable terminal mode");
            }
        }
    }

    fn remove_listener(&mut self, listener: Listener) {
        if self.listeners.remove(&listener) {
            if let Err(e) = self.apply_listener(listener, false) {
                warn!(?listener, error = %e, "could not disable terminal mode");
            }
        }
    }

    fn window_metrics(&self) -> Option<WindowMetrics> {
        let (bw, bh) = self.baseline?;
        let (w, h) = self.current_size()?;
        Some(WindowMetrics::new(
            (u32::from(bw), u32::from(bh)),
            (u32::from(w), u32::from(h)),
        ))
    }

    fn show_confirmation(&mut self, kind: ViolationKind) {
        self.overlay.dialog = Some(kind);
    }

    fn close_confirmation(&mut self) {
        self.overlay.dialog = None;
    }

    fn toast(&mut self, toast: Toast) {
        self.overlay.push_toast(toast, Instant::now());
    }

    fn reload(&mut self) {
        debug!("reload requested");
        self.reload_requested = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    fn env_with(size: Rc<Cell<(u16, u16)>>) -> TerminalEnv<Vec<u8>> {
        TerminalEnv::new(
            Vec::new(),
            Box::new(move || Ok(size.get())),
            (60, 20),
            Duration::from_millis(100),
        )
    }

    #[test]
    fn fullscreen_requires_minimum_size() {
        let size = Rc::new(Cell::new((40, 10)));
        let mut env = env_with(Rc::clone(&size));
        assert!(matches!(
            env.request_fullscreen(),
            Err(EnvError::FullscreenDenied(_))
        ));
        assert!(!env.is_fullscreen());

        size.set((120, 40));
        assert!(env.request_fullscreen().is_ok());
        assert!(env.is_fullscreen());

        // shrunk behind our back
        size.set((50, 40));
        assert!(!env.is_fullscreen());
    }

    #[test]
    fn metrics_compare_against_size_at_acquisition() {
        let size = Rc::new(Cell::new((120, 40)));
        let mut env = env_with(Rc::clone(&size));
        assert_eq!(env.window_metrics(), None);

        env.request_fullscreen().unwrap();
        size.set((90, 38));
        assert_eq!(
            env.window_metrics(),
            Some(WindowMetrics::new((120, 40), (90, 38)))
        );
    }

    #[test]
    fn mouse_capture_follows_mouse_listeners() {
        let size = Rc::new(Cell::new((120, 40)));
        let mut env = env_with(size);

        env.add_listener(Listener::MouseLeave);
        let after_first = env.out.len();
        assert!(after_first > 0);
        env.add_listener(Listener::ContextMenu);
        assert_eq!(env.out.len(), after_first);

        env.remove_listener(Listener::MouseLeave);
        assert_eq!(env.out.len(), after_first);
        env.remove_listener(Listener::ContextMenu);
        assert!(env.out.len() > after_first);
    }

    #[test]
    fn restore_leaves_alternate_screen_and_clears_listeners() {
        let size = Rc::new(Cell::new((120, 40)));
        let mut env = env_with(size);
        env.request_fullscreen().unwrap();
        env.add_listener(Listener::Blur);
        env.restore().unwrap();
        assert!(!env.is_fullscreen());
        assert!(env.listeners.is_empty());
    }

    #[test]
    fn toasts_expire_after_ttl() {
        let mut overlay = Overlay::new(Duration::from_millis(100));
        let now = Instant::now();
        overlay.push_toast(Toast::warning("a"), now);
        overlay.push_toast(Toast::warning("b"), now + Duration::from_millis(50));

        assert_eq!(overlay.active_toasts(now).len(), 2);
        let left = overlay.active_toasts(now + Duration::from_millis(120));
        assert_eq!(left, vec![&Toast::warning("b")]);
        assert!(overlay.active_toasts(now + Duration::from_millis(200)).is_empty());
    }

    #[test]
    fn controller_confirms_shrink_and_resumes_once_size_returns() {
        use crate::proctor::reason::TerminationReason;
        use crate::proctor::{Controller, Disposition, Signal};
        use crate::session::{Phase, SessionConfig};

        let size = Rc::new(Cell::new((120, 40)));
        let now = Instant::now();
        let env = env_with(Rc::clone(&size));
        let mut controller = Controller::new(env, SessionConfig::default());
        controller.start(|_: TerminationReason| {}, now);
        assert_eq!(controller.phase(), Phase::Enforcing);
        assert_eq!(controller.env().listeners.len(), Listener::ALL.len());

        size.set((40, 10));
        assert_eq!(
            controller.handle(&Signal::FullscreenChange, now),
            Disposition::ConfirmationOpened
        );
        assert_eq!(
            controller.env().overlay.dialog,
            Some(ViolationKind::FullscreenExit)
        );

        // declining tries to take the size back, which the terminal refuses
        assert_eq!(
            controller.resolve_confirmation(false, now),
            Disposition::Restoring
        );
        assert_eq!(controller.env().overlay.dialog, None);

        size.set((120, 40));
        assert_eq!(
            controller.handle(&Signal::FullscreenChange, now),
            Disposition::Resumed
        );
        assert_eq!(controller.phase(), Phase::Enforcing);
    }

    #[test]
    fn reload_flag_is_taken_once() {
        let size = Rc::new(Cell::new((120, 40)));
        let mut env = env_with(size);
        env.reload();
        assert!(env.take_reload());
        assert!(!env.take_reload());
    }
}
