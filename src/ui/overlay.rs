use ratatui::{
    layout::{Alignment, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame,
};
use unicode_width::UnicodeWidthStr;

use crate::environment::Toast;
use crate::proctor::reason::ViolationKind;

const DIALOG_WIDTH: u16 = 50;
const TOAST_MAX_WIDTH: u16 = 60;

/// Rect of at most `width` x `height`, centered in `area`.
pub fn centered_rect(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}

pub fn render_dialog(f: &mut Frame, area: Rect, kind: ViolationKind) {
    let title = match kind {
        ViolationKind::FullscreenExit => " Fullscreen lost ",
        ViolationKind::ManualQuit => " Quit quiz ",
    };
    let rect = centered_rect(area, DIALOG_WIDTH, 7);
    let body = Paragraph::new(vec![
        Line::from(""),
        Line::from(kind.prompt()),
        Line::from(""),
        Line::from(Span::styled(
            "y / n",
            Style::default().add_modifier(Modifier::BOLD),
        )),
    ])
    .alignment(Alignment::Center)
    .wrap(Wrap { trim: true })
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Yellow))
            .title(title),
    );

    f.render_widget(Clear, rect);
    f.render_widget(body, rect);
}

/// Stack toasts in the bottom-right corner, newest at the bottom.
pub fn render_toasts(f: &mut Frame, area: Rect, toasts: &[&Toast]) {
    let mut bottom = area.y + area.height;
    for toast in toasts.iter().rev() {
        let rect = toast_rect(area, bottom, toast);
        if rect.height == 0 || rect.y < area.y {
            break;
        }
        let widget = Paragraph::new(Span::styled(
            toast.message.as_str(),
            Style::default().fg(Color::Yellow),
        ))
        .block(Block::default().borders(Borders::ALL));
        f.render_widget(Clear, rect);
        f.render_widget(widget, rect);
        bottom = rect.y;
    }
}

fn toast_rect(area: Rect, bottom: u16, toast: &Toast) -> Rect {
    let text_width = u16::try_from(toast.message.width()).unwrap_or(u16::MAX);
    let width = text_width
        .saturating_add(2)
        .min(TOAST_MAX_WIDTH)
        .min(area.width);
    let height = 3.min(bottom.saturating_sub(area.y));
    Rect {
        x: area.x + area.width - width,
        y: bottom.saturating_sub(height),
        width,
        height,
    }
}
