use std::sync::mpsc;
use std::time::{Duration, Instant};

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use quizguard::app::{App, AppAction, AppState};
use quizguard::environment::RecordingEnv;
use quizguard::proctor::reason::TerminationReason;
use quizguard::quiz::Quiz;
use quizguard::runtime::{FixedTicker, ProctorEvent, Runner, TestEventSource};
use quizguard::session::SessionConfig;

const VIEWPORT: (u16, u16) = (80, 24);

fn key(code: KeyCode) -> ProctorEvent {
    ProctorEvent::Key(KeyEvent::new(code, KeyModifiers::NONE))
}

fn bundled_app(duration: Duration) -> App<RecordingEnv> {
    let quiz = Quiz::bundled("rust-basics").unwrap();
    let session = SessionConfig {
        duration,
        ..SessionConfig::default()
    };
    App::new(quiz, false, RecordingEnv::new(), session)
}

// Drives the host through Runner/TestEventSource without a TTY.
#[test]
fn headless_attempt_submits_after_last_answer() {
    let mut app = bundled_app(Duration::from_secs(600));
    let questions = app.quiz.questions.len();

    let (tx, rx) = mpsc::channel();
    let runner = Runner::new(
        TestEventSource::new(rx),
        FixedTicker::new(Duration::from_millis(5)),
    );

    tx.send(key(KeyCode::Enter)).unwrap();
    for _ in 0..questions {
        tx.send(key(KeyCode::Enter)).unwrap();
    }

    for _ in 0..100u32 {
        let event = runner.step();
        app.on_event(&event, VIEWPORT, Instant::now());
        if app.state == AppState::Results {
            break;
        }
    }

    assert_eq!(app.state, AppState::Results);
    let outcome = app.outcome.clone().unwrap();
    assert_eq!(outcome.reason, TerminationReason::Submitted);
    assert_eq!(outcome.total, questions);
    assert!(app.controller.env().listeners.is_empty());
}

#[test]
fn headless_focus_loss_ends_attempt_and_exit_follows() {
    let mut app = bundled_app(Duration::from_secs(600));

    let (tx, rx) = mpsc::channel();
    let runner = Runner::new(
        TestEventSource::new(rx),
        FixedTicker::new(Duration::from_millis(5)),
    );

    tx.send(key(KeyCode::Enter)).unwrap();
    tx.send(ProctorEvent::FocusLost).unwrap();
    tx.send(key(KeyCode::Char('q'))).unwrap();

    let mut exited = false;
    for _ in 0..100u32 {
        let event = runner.step();
        if app.on_event(&event, VIEWPORT, Instant::now()) == AppAction::Exit {
            exited = true;
            break;
        }
    }

    assert!(exited, "q on the results screen should exit");
    assert_eq!(
        app.outcome.as_ref().map(|o| o.reason),
        Some(TerminationReason::WindowBlurred)
    );
}

#[test]
fn headless_timed_attempt_expires() {
    let mut app = bundled_app(Duration::from_millis(200));

    let (_tx, rx) = mpsc::channel();
    let runner = Runner::new(
        TestEventSource::new(rx),
        FixedTicker::new(Duration::from_millis(10)),
    );

    app.start(Instant::now());
    for _ in 0..100u32 {
        // up to ~1s
        let event = runner.step();
        app.on_event(&event, VIEWPORT, Instant::now());
        if app.state == AppState::Results {
            break;
        }
    }

    assert_eq!(
        app.outcome.as_ref().map(|o| o.reason),
        Some(TerminationReason::TimeExpired)
    );
}
