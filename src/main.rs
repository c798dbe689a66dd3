use clap::{error::ErrorKind, CommandFactory, Parser};
use crossterm::{
    terminal::{disable_raw_mode, enable_raw_mode},
    tty::IsTty,
};
use itertools::Itertools;
use quizguard::{
    app::{App, AppAction},
    app_dirs::AppDirs,
    config::FileConfigStore,
    history::HistoryDb,
    quiz::Quiz,
    runtime::{CrosstermEventSource, FixedTicker, Runner},
    terminal::TerminalEnv,
    ui,
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};
use std::{
    error::Error,
    io::{self, stdin},
    path::PathBuf,
    sync::Mutex,
    time::{Duration, Instant},
};
use tracing_subscriber::EnvFilter;

const TICK_RATE_MS: u64 = 100;
const DEFAULT_QUIZ: &str = "rust-basics";

/// proctored quizzes in the terminal
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "Take a timed quiz under lockdown: the terminal must stay focused and large enough, disruptive keys are swallowed, and leaving ends the attempt."
)]
pub struct Cli {
    /// quiz file (json) to take
    #[clap(long, conflicts_with = "bundled")]
    quiz: Option<PathBuf>,

    /// name of a bundled quiz
    #[clap(short = 'b', long)]
    bundled: Option<String>,

    /// list bundled quizzes and exit
    #[clap(long)]
    list: bool,

    /// show recent attempts and exit
    #[clap(long)]
    history: bool,

    /// override the quiz duration, in seconds
    #[clap(short = 's', long)]
    duration: Option<u64>,

    /// shuffle question order
    #[clap(long)]
    shuffle: bool,

    /// write logs here instead of the state directory
    #[clap(long)]
    log_file: Option<PathBuf>,
}

impl Cli {
    fn load_quiz(&self) -> Result<Quiz, Box<dyn Error>> {
        let mut quiz = match (&self.quiz, &self.bundled) {
            (Some(path), _) => Quiz::from_file(path)?,
            (None, Some(name)) => Quiz::bundled(name)?,
            (None, None) => Quiz::bundled(DEFAULT_QUIZ)?,
        };
        if let Some(secs) = self.duration {
            quiz.duration_secs = secs;
            quiz.validate()?;
        }
        Ok(quiz)
    }
}

fn init_logging(cli: &Cli) {
    let Some(path) = cli.log_file.clone().or_else(AppDirs::log_path) else {
        return;
    };
    let file = match AppDirs::open_log(&path) {
        Ok(file) => file,
        Err(e) => {
            eprintln!("logging disabled: cannot open {}: {}", path.display(), e);
            return;
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
}

fn print_history() -> Result<(), Box<dyn Error>> {
    let db = HistoryDb::new()?;
    let attempts = db.recent(20)?;
    if attempts.is_empty() {
        println!("no attempts yet");
        return Ok(());
    }
    for a in attempts {
        println!(
            "{}  {:<28} {:>3}/{:<3} {:>5}s  {:<26} warnings {}",
            a.ended_at.format("%Y-%m-%d %H:%M"),
            a.quiz_title,
            a.correct,
            a.total,
            a.elapsed_secs(),
            a.reason,
            a.warnings
        );
    }

    println!();
    let summary = db
        .reason_counts()?
        .into_iter()
        .map(|(reason, n)| format!("{} {}", reason, n))
        .join(", ");
    println!("all attempts by reason: {}", summary);
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    if cli.list {
        for name in Quiz::bundled_names() {
            println!("{}", name);
        }
        return Ok(());
    }
    if cli.history {
        return print_history();
    }

    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    init_logging(&cli);

    let config = FileConfigStore::new().load_or_init();
    let quiz = cli.load_quiz()?;
    let session = config.session_config(Duration::from_secs(quiz.duration_secs));
    let shuffle = cli.shuffle || config.shuffle;

    enable_raw_mode()?;

    let mut env = TerminalEnv::stdout((config.min_cols, config.min_rows), config.toast_ttl());
    env.enter_alternate_screen()?;
    let backend = CrosstermBackend::new(io::stdout());
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(quiz, shuffle, env, session);
    match HistoryDb::new() {
        Ok(db) => app = app.with_history(db),
        Err(e) => tracing::warn!(error = %e, "attempt history unavailable"),
    }

    let result = start_tui(&mut terminal, &mut app);

    app.controller.env_mut().restore()?;
    disable_raw_mode()?;
    terminal.show_cursor()?;

    result
}

fn start_tui<B: Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App<TerminalEnv<io::Stdout>>,
) -> Result<(), Box<dyn Error>> {
    let runner = Runner::new(
        CrosstermEventSource::new(),
        FixedTicker::new(Duration::from_millis(TICK_RATE_MS)),
    );

    loop {
        terminal.draw(|f| ui::draw(f, app, Instant::now()))?;

        let event = runner.step();
        let viewport = crossterm::terminal::size().unwrap_or((0, 0));
        if app.on_event(&event, viewport, Instant::now()) == AppAction::Exit {
            break;
        }

        if app.controller.env_mut().take_reload() {
            app.reset(Some(
                "The session was reset because inspection tools were detected".to_string(),
            ));
            terminal.clear()?;
        }
    }

    Ok(())
}
