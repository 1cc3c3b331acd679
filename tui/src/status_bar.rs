use helm_core::channel::ConnectionState;
use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::Stylize;
use ratatui::text::Line;
use ratatui::text::Span;
use ratatui::widgets::Paragraph;
use ratatui::widgets::WidgetRef;

use crate::app::Screen;

/// What the bottom line reports about the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct StatusLine {
    pub screen: Screen,
    pub control: ConnectionState,
    pub stream: ConnectionState,
    pub server_running: bool,
}

pub(crate) struct StatusBar;

impl StatusBar {
    pub(crate) fn render(status: &StatusLine, area: Rect, buf: &mut Buffer) {
        if area.height == 0 || area.width < 10 {
            return;
        }
        let mut spans = connection_spans(status.control, status.stream);
        spans.push("  ".into());
        if status.server_running {
            spans.push("Server running".green());
        } else {
            spans.push("Server stopped".dim());
        }
        spans.push("  ".into());
        spans.extend(hint_spans(status));
        Paragraph::new(Line::from(spans)).render_ref(area, buf);
    }
}

fn connection_spans(control: ConnectionState, stream: ConnectionState) -> Vec<Span<'static>> {
    let overall = match (control, stream) {
        (ConnectionState::Connected, ConnectionState::Connected) => "Connected".green(),
        (ConnectionState::Disconnected, _) => "Disconnected".red(),
        (ConnectionState::Connected, ConnectionState::Disconnected) => "Log stream down".yellow(),
        _ => "Connecting…".yellow(),
    };
    vec!["● ".into(), overall]
}

fn hint_spans(status: &StatusLine) -> Vec<Span<'static>> {
    let toggle = if status.server_running {
        "Ctrl+S Stop"
    } else {
        "Ctrl+S Start"
    };
    let screen = match status.screen {
        Screen::Console => "F2 Drive",
        Screen::Drive => "F2 Console",
    };
    let mut spans = vec![screen.cyan(), "  ".into(), toggle.cyan()];
    if status.control == ConnectionState::Disconnected {
        spans.push("  ".into());
        spans.push("Ctrl+R Reconnect".cyan());
    }
    spans.push("  ".into());
    spans.push("Ctrl+C Quit".dim());
    spans
}
