use std::sync::mpsc::{self, Receiver};
use std::time::{Duration, Instant};

use chrono::{DateTime, Local};
use crossterm::event::{KeyCode, KeyEvent};
use tracing::{info, warn};

use crate::environment::ProctorEnv;
use crate::history::{AttemptRecord, HistoryDb};
use crate::proctor::reason::TerminationReason;
use crate::proctor::{Controller, Disposition};
use crate::quiz::{Attempt, Quiz};
use crate::runtime::{signal_for, ProctorEvent};
use crate::session::SessionConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    Intro,
    Quiz,
    Results,
}

/// How a finished attempt ended, shown on the results screen.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub reason: TerminationReason,
    pub correct: usize,
    pub total: usize,
    pub warnings: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppAction {
    Continue,
    Exit,
}

/// The quiz-attempt host: owns the quiz content and one proctoring controller.
pub struct App<E: ProctorEnv> {
    pub quiz: Quiz,
    pub attempt: Attempt,
    pub state: AppState,
    pub controller: Controller<E>,
    pub outcome: Option<Outcome>,
    /// Shown on the intro screen after a reset.
    pub notice: Option<String>,
    shuffle: bool,
    ended: Option<Receiver<TerminationReason>>,
    started_at: Option<DateTime<Local>>,
    history: Option<HistoryDb>,
}

impl<E: ProctorEnv> App<E> {
    pub fn new(quiz: Quiz, shuffle: bool, env: E, session: SessionConfig) -> Self {
        let attempt = Attempt::new(quiz.clone(), shuffle);
        Self {
            quiz,
            attempt,
            state: AppState::Intro,
            controller: Controller::new(env, session),
            outcome: None,
            notice: None,
            shuffle,
            ended: None,
            started_at: None,
            history: None,
        }
    }

    pub fn with_history(mut self, history: HistoryDb) -> Self {
        self.history = Some(history);
        self
    }

    pub fn time_remaining(&self) -> Duration {
        Duration::from_secs(self.controller.state().time_remaining_seconds)
    }

    /// The learner pressed "Start Quiz".
    pub fn start(&mut self, now: Instant) {
        if self.state != AppState::Intro {
            return;
        }
        let (tx, rx) = mpsc::channel();
        self.ended = Some(rx);
        self.notice = None;
        self.started_at = Some(Local::now());
        self.state = AppState::Quiz;
        info!(quiz = %self.quiz.title, "attempt started");

        self.controller.start(
            move |reason| {
                let _ = tx.send(reason);
            },
            now,
        );
        self.collect_end();
    }

    pub fn on_event(&mut self, event: &ProctorEvent, viewport: (u16, u16), now: Instant) -> AppAction {
        let action = match self.state {
            AppState::Intro => match event {
                ProctorEvent::Key(key) => self.on_intro_key(key, now),
                _ => AppAction::Continue,
            },
            AppState::Quiz => {
                if let ProctorEvent::Tick = event {
                    self.controller.tick(now);
                } else if let Some(signal) = signal_for(event, viewport) {
                    let disposition = self.controller.handle(&signal, now);
                    if let (Disposition::PassThrough, ProctorEvent::Key(key)) = (disposition, event)
                    {
                        self.on_quiz_key(key);
                    }
                }
                AppAction::Continue
            }
            AppState::Results => match event {
                ProctorEvent::Key(key) => self.on_results_key(key),
                _ => AppAction::Continue,
            },
        };
        self.collect_end();
        action
    }

    fn on_intro_key(&mut self, key: &KeyEvent, now: Instant) -> AppAction {
        match key.code {
            KeyCode::Enter => {
                self.start(now);
                AppAction::Continue
            }
            KeyCode::Esc | KeyCode::Char('q') => AppAction::Exit,
            _ => AppAction::Continue,
        }
    }

    fn on_quiz_key(&mut self, key: &KeyEvent) {
        match key.code {
            KeyCode::Up | KeyCode::Char('k') => self.attempt.highlight_prev(),
            KeyCode::Down | KeyCode::Char('j') => self.attempt.highlight_next(),
            KeyCode::Left => self.attempt.previous(),
            KeyCode::Char(c) if c.is_ascii_digit() && c != '0' => {
                self.attempt.highlight(c as usize - '1' as usize)
            }
            KeyCode::Enter => {
                if self.attempt.answer() {
                    self.controller.terminate(TerminationReason::Submitted);
                }
            }
            _ => {}
        }
    }

    fn on_results_key(&mut self, key: &KeyEvent) -> AppAction {
        match key.code {
            KeyCode::Char('r') => {
                self.reset(None);
                AppAction::Continue
            }
            KeyCode::Esc | KeyCode::Char('q') => AppAction::Exit,
            _ => AppAction::Continue,
        }
    }

    /// Pick up the end-of-session notification, if the controller sent one.
    fn collect_end(&mut self) {
        let reason = match &self.ended {
            Some(rx) => match rx.try_recv() {
                Ok(reason) => reason,
                Err(_) => return,
            },
            None => return,
        };
        self.ended = None;
        self.finish(reason);
    }

    fn finish(&mut self, reason: TerminationReason) {
        let (correct, total) = self.attempt.score();
        let warnings = self.controller.state().warning_count;
        info!(%reason, correct, total, warnings, "attempt finished");

        if let (Some(history), Some(started_at)) = (&self.history, self.started_at) {
            let record = AttemptRecord::new(
                &self.quiz.title,
                started_at,
                Local::now(),
                reason,
                (correct, total),
                warnings,
            );
            if let Err(e) = history.record(&record) {
                warn!(error = %e, "could not record attempt");
            }
        }

        self.outcome = Some(Outcome {
            reason,
            correct,
            total,
            warnings,
        });
        self.state = AppState::Results;
    }

    /// Back to the intro screen with a fresh attempt and session.
    pub fn reset(&mut self, notice: Option<String>) {
        self.controller.reset();
        self.attempt = Attempt::new(self.quiz.clone(), self.shuffle);
        self.state = AppState::Intro;
        self.outcome = None;
        self.ended = None;
        self.started_at = None;
        self.notice = notice;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::{FullscreenScript, RecordingEnv};
    use crossterm::event::KeyModifiers;

    fn quiz() -> Quiz {
        Quiz::from_json(
            r#"{
                "title": "tiny",
                "duration_secs": 60,
                "questions": [
                    { "prompt": "a", "options": ["x", "y"], "answer": 1 },
                    { "prompt": "b", "options": ["x", "y"], "answer": 0 }
                ]
            }"#,
        )
        .unwrap()
    }

    fn app(env: RecordingEnv) -> App<RecordingEnv> {
        let q = quiz();
        let session = SessionConfig {
            duration: Duration::from_secs(q.duration_secs),
            ..SessionConfig::default()
        };
        App::new(q, false, env, session)
    }

    fn key(code: KeyCode) -> ProctorEvent {
        ProctorEvent::Key(KeyEvent::new(code, KeyModifiers::NONE))
    }

    #[test]
    fn answering_everything_submits() {
        let now = Instant::now();
        let mut app = app(RecordingEnv::new());
        app.on_event(&key(KeyCode::Enter), (80, 24), now);
        assert_eq!(app.state, AppState::Quiz);
        assert_eq!(app.time_remaining(), Duration::from_secs(60));

        app.on_event(&key(KeyCode::Down), (80, 24), now);
        app.on_event(&key(KeyCode::Enter), (80, 24), now);
        app.on_event(&key(KeyCode::Enter), (80, 24), now);

        assert_eq!(app.state, AppState::Results);
        let outcome = app.outcome.clone().unwrap();
        assert_eq!(outcome.reason, TerminationReason::Submitted);
        assert_eq!((outcome.correct, outcome.total), (2, 2));
        assert!(app.controller.env().listeners.is_empty());
    }

    #[test]
    fn focus_loss_ends_the_attempt() {
        let now = Instant::now();
        let mut app = app(RecordingEnv::new());
        app.start(now);
        app.on_event(&ProctorEvent::FocusLost, (80, 24), now);
        assert_eq!(
            app.outcome.as_ref().map(|o| o.reason),
            Some(TerminationReason::WindowBlurred)
        );
    }

    #[test]
    fn denied_fullscreen_goes_straight_to_results() {
        let mut app = app(RecordingEnv::with_script(FullscreenScript::DenyAll));
        app.start(Instant::now());
        assert_eq!(app.state, AppState::Results);
        assert_eq!(
            app.outcome.as_ref().map(|o| o.reason),
            Some(TerminationReason::FullscreenDenied)
        );
    }

    #[test]
    fn suppressed_keys_never_reach_the_quiz() {
        let now = Instant::now();
        let mut app = app(RecordingEnv::new());
        app.start(now);
        app.on_event(&key(KeyCode::Tab), (80, 24), now);
        app.on_event(
            &ProctorEvent::Key(KeyEvent::new(KeyCode::Enter, KeyModifiers::ALT)),
            (80, 24),
            now,
        );
        assert_eq!(app.attempt.answered(), 0);
    }

    #[test]
    fn digit_keys_pick_options() {
        let now = Instant::now();
        let mut app = app(RecordingEnv::new());
        app.start(now);
        app.on_event(&key(KeyCode::Char('2')), (80, 24), now);
        assert_eq!(app.attempt.highlighted(), 1);
        app.on_event(&key(KeyCode::Char('9')), (80, 24), now);
        assert_eq!(app.attempt.highlighted(), 1);
    }

    #[test]
    fn timer_expiry_shows_results_and_records_history() {
        let now = Instant::now();
        let mut app = app(RecordingEnv::new()).with_history(HistoryDb::in_memory().unwrap());
        app.start(now);
        app.on_event(&ProctorEvent::Tick, (80, 24), now + Duration::from_secs(60));

        assert_eq!(app.state, AppState::Results);
        let history = app.history.as_ref().unwrap();
        let recent = history.recent(5).unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].reason, "time-expired");
        assert_eq!(recent[0].quiz_title, "tiny");
    }

    #[test]
    fn restart_from_results_begins_a_new_session() {
        let now = Instant::now();
        let mut app = app(RecordingEnv::new());
        app.start(now);
        app.controller.request_quit();
        app.on_event(&key(KeyCode::Char('y')), (80, 24), now);
        assert_eq!(app.state, AppState::Results);

        app.on_event(&key(KeyCode::Char('r')), (80, 24), now);
        assert_eq!(app.state, AppState::Intro);
        assert!(app.outcome.is_none());

        app.on_event(&key(KeyCode::Enter), (80, 24), now);
        assert_eq!(app.state, AppState::Quiz);
        assert_eq!(app.controller.installed_listeners().count(), 8);
    }

    #[test]
    fn intro_and_results_can_exit() {
        let now = Instant::now();
        let mut app = app(RecordingEnv::new());
        assert_eq!(
            app.on_event(&key(KeyCode::Char('q')), (80, 24), now),
            AppAction::Exit
        );
        app.start(now);
        // inside the quiz, q is just a letter and Escape opens the quit dialog
        assert_eq!(
            app.on_event(&key(KeyCode::Esc), (80, 24), now),
            AppAction::Continue
        );
        assert!(app.controller.env().open_dialog.is_some());
    }
}
