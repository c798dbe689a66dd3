use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::Duration;

use crossterm::event::{
    self, Event as CtEvent, KeyEvent, MouseButton, MouseEvent, MouseEventKind,
};

use crate::proctor::keys::is_unload_chord;
use crate::proctor::Signal;

/// Unified event type consumed by the app runner
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProctorEvent {
    Key(KeyEvent),
    Mouse(MouseEvent),
    FocusGained,
    FocusLost,
    Resize(u16, u16),
    Tick,
}

/// Source of terminal events (keyboard, mouse, focus, resize)
pub trait ProctorEventSource: Send + 'static {
    /// Block for up to `timeout` waiting for an event.
    /// Returns Ok(event) if an event arrives before the timeout, or Err(Timeout) if it expires.
    fn recv_timeout(&self, timeout: Duration) -> Result<ProctorEvent, RecvTimeoutError>;
}

/// Production event source using crossterm
pub struct CrosstermEventSource {
    rx: Receiver<ProctorEvent>,
}

impl CrosstermEventSource {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();

        std::thread::spawn(move || loop {
            let evt = match event::read() {
                Ok(CtEvent::Key(key)) => ProctorEvent::Key(key),
                Ok(CtEvent::Mouse(mouse)) => ProctorEvent::Mouse(mouse),
                Ok(CtEvent::FocusGained) => ProctorEvent::FocusGained,
                Ok(CtEvent::FocusLost) => ProctorEvent::FocusLost,
                Ok(CtEvent::Resize(w, h)) => ProctorEvent::Resize(w, h),
                Ok(_) => continue,
                Err(_) => break,
            };
            if tx.send(evt).is_err() {
                break;
            }
        });

        Self { rx }
    }
}

impl Default for CrosstermEventSource {
    fn default() -> Self {
        Self::new()
    }
}

impl ProctorEventSource for CrosstermEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<ProctorEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

/// Configurable ticker interface
pub trait Ticker: Send + Sync + 'static {
    fn interval(&self) -> Duration;
}

/// Fixed interval ticker
#[derive(Clone, Copy, Debug)]
pub struct FixedTicker {
    interval: Duration,
}

impl FixedTicker {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

impl Ticker for FixedTicker {
    fn interval(&self) -> Duration {
        self.interval
    }
}

/// Test event source for unit tests
pub struct TestEventSource {
    rx: Receiver<ProctorEvent>,
}

impl TestEventSource {
    pub fn new(rx: Receiver<ProctorEvent>) -> Self {
        Self { rx }
    }
}

impl ProctorEventSource for TestEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<ProctorEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

/// Runner that advances the application one event/tick at a time
pub struct Runner<E: ProctorEventSource, T: Ticker> {
    event_source: E,
    ticker: T,
}

impl<E: ProctorEventSource, T: Ticker> Runner<E, T> {
    pub fn new(event_source: E, ticker: T) -> Self {
        Self {
            event_source,
            ticker,
        }
    }

    /// Blocks up to tick interval and returns the next event, or Tick on timeout
    pub fn step(&self) -> ProctorEvent {
        match self.event_source.recv_timeout(self.ticker.interval()) {
            Ok(ev) => ev,
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {
                ProctorEvent::Tick
            }
        }
    }
}

/// Translate a terminal event into the listener signal it stands for.
/// `viewport` is the current terminal size in cells.
pub fn signal_for(event: &ProctorEvent, viewport: (u16, u16)) -> Option<Signal> {
    let (width, height) = viewport;
    match event {
        ProctorEvent::Key(key) if is_unload_chord(key) => Some(Signal::BeforeUnload),
        ProctorEvent::Key(key) => Some(Signal::Key(*key)),
        ProctorEvent::FocusLost => Some(Signal::WindowBlur),
        ProctorEvent::Resize(_, _) => Some(Signal::FullscreenChange),
        ProctorEvent::Mouse(mouse) => match mouse.kind {
            MouseEventKind::Down(MouseButton::Right) => Some(Signal::ContextMenu),
            MouseEventKind::Moved | MouseEventKind::Drag(_) => {
                let on_border = mouse.column == 0
                    || mouse.row == 0
                    || mouse.column + 1 >= width
                    || mouse.row + 1 >= height;
                on_border.then_some(Signal::MouseLeave {
                    x: i32::from(mouse.column),
                    y: i32::from(mouse.row),
                    width: u32::from(width),
                    height: u32::from(height),
                })
            }
            _ => None,
        },
        ProctorEvent::FocusGained | ProctorEvent::Tick => None,
    }
}
