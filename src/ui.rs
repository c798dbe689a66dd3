pub mod overlay;

use std::io::Write;
use std::time::Instant;

use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Gauge, Paragraph, Wrap},
    Frame,
};

use crate::app::{App, AppState};
use crate::terminal::TerminalEnv;

const HORIZONTAL_MARGIN: u16 = 5;
const VERTICAL_MARGIN: u16 = 2;

pub fn draw<W: Write>(f: &mut Frame, app: &mut App<TerminalEnv<W>>, now: Instant) {
    let area = f.area();
    match app.state {
        AppState::Intro => render_intro(f, app, area),
        AppState::Quiz => render_quiz(f, app, area),
        AppState::Results => render_results(f, app, area),
    }

    let layer = &mut app.controller.env_mut().overlay;
    if let Some(kind) = layer.dialog {
        overlay::render_dialog(f, area, kind);
    }
    let toasts = layer.active_toasts(now);
    overlay::render_toasts(f, area, &toasts);
}

fn format_clock(secs: u64) -> String {
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

fn render_intro<W: Write>(f: &mut Frame, app: &App<TerminalEnv<W>>, area: Rect) {
    let bold = Style::default().add_modifier(Modifier::BOLD);
    let dim = Style::default().add_modifier(Modifier::DIM);

    let mut lines = vec![
        Line::from(Span::styled(app.quiz.title.clone(), bold.fg(Color::Cyan))),
        Line::from(""),
        Line::from(format!(
            "{} questions, {} to finish",
            app.quiz.questions.len(),
            format_clock(app.quiz.duration_secs)
        )),
        Line::from(""),
        Line::from("This quiz is proctored. Once started:"),
        Line::from(Span::styled(
            "  switching away from this terminal ends the quiz",
            dim,
        )),
        Line::from(Span::styled(
            "  shrinking the terminal asks you to confirm ending it",
            dim,
        )),
        Line::from(Span::styled("  Esc or Ctrl+Q asks to quit", dim)),
        Line::from(""),
        Line::from(Span::styled("press Enter to start, q to leave", bold)),
    ];
    if let Some(notice) = &app.notice {
        lines.insert(
            0,
            Line::from(Span::styled(
                notice.clone(),
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
            )),
        );
        lines.insert(1, Line::from(""));
    }

    let widget = Paragraph::new(lines)
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true });
    f.render_widget(widget, centered_block(area, lines_height(app.notice.is_some())));
}

fn lines_height(with_notice: bool) -> u16 {
    if with_notice {
        12
    } else {
        10
    }
}

fn centered_block(area: Rect, height: u16) -> Rect {
    let top = area.height.saturating_sub(height) / 2;
    Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .constraints([
            Constraint::Length(top),
            Constraint::Length(height),
            Constraint::Min(0),
        ])
        .split(area)[1]
}

fn render_quiz<W: Write>(f: &mut Frame, app: &App<TerminalEnv<W>>, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .vertical_margin(VERTICAL_MARGIN)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(5),
            Constraint::Length(2),
        ])
        .split(area);

    let remaining = app.time_remaining().as_secs();
    let total = app.quiz.duration_secs.max(1);
    let ratio = (remaining as f64 / total as f64).clamp(0.0, 1.0);
    let gauge_color = if ratio < 0.1 { Color::Red } else { Color::Green };
    let gauge = Gauge::default()
        .block(Block::default().borders(Borders::ALL).title(format!(
            "{}  question {}/{}",
            app.quiz.title,
            app.attempt.position() + 1,
            app.attempt.len()
        )))
        .gauge_style(Style::default().fg(gauge_color))
        .ratio(ratio)
        .label(format_clock(remaining));
    f.render_widget(gauge, chunks[0]);

    let question = app.attempt.question();
    let bold = Style::default().add_modifier(Modifier::BOLD);
    let mut lines = vec![Line::from(Span::styled(question.prompt.clone(), bold)), Line::from("")];
    for (i, option) in question.options.iter().enumerate() {
        let marker = if app.attempt.selection() == Some(i) { "*" } else { " " };
        let text = format!("{} {}. {}", marker, i + 1, option);
        let style = if i == app.attempt.highlighted() {
            Style::default().fg(Color::Black).bg(Color::Cyan)
        } else {
            Style::default()
        };
        lines.push(Line::from(Span::styled(text, style)));
    }
    f.render_widget(
        Paragraph::new(lines).wrap(Wrap { trim: false }),
        chunks[1],
    );

    let help = Paragraph::new(Span::styled(
        "↑/↓ or 1-9 choose   enter answer   ← previous   esc quit",
        Style::default().add_modifier(Modifier::DIM | Modifier::ITALIC),
    ))
    .alignment(Alignment::Center);
    f.render_widget(help, chunks[2]);
}

fn render_results<W: Write>(f: &mut Frame, app: &App<TerminalEnv<W>>, area: Rect) {
    let Some(outcome) = &app.outcome else {
        return;
    };
    let reason_style = if outcome.reason.is_misconduct() {
        Style::default().fg(Color::Red).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)
    };

    let lines = vec![
        Line::from(Span::styled("Quiz ended", Style::default().add_modifier(Modifier::BOLD))),
        Line::from(""),
        Line::from(Span::styled(outcome.reason.describe(), reason_style)),
        Line::from(Span::styled(
            format!("({})", outcome.reason),
            Style::default().add_modifier(Modifier::DIM),
        )),
        Line::from(""),
        Line::from(format!("score {}/{}", outcome.correct, outcome.total)),
        Line::from(format!("warnings {}", outcome.warnings)),
        Line::from(""),
        Line::from(Span::styled(
            "(r)etry / (q)uit",
            Style::default().add_modifier(Modifier::ITALIC),
        )),
    ];

    let widget = Paragraph::new(lines).alignment(Alignment::Center);
    f.render_widget(widget, centered_block(area, 9));
}
