use helm_core::command_line::CommandLine;
use helm_core::command_line::InputMode;
use helm_core::console::ConsoleSession;
use helm_core::log::LogCategory;
use helm_core::log::LogEntry;
use helm_core::monitoring::ByteFormat;
use helm_core::monitoring::MonitoringSnapshot;
use helm_core::monitoring::convert_bytes;
use ratatui::buffer::Buffer;
use ratatui::layout::Constraint;
use ratatui::layout::Layout;
use ratatui::layout::Position;
use ratatui::layout::Rect;
use ratatui::style::Color;
use ratatui::style::Style;
use ratatui::style::Stylize;
use ratatui::text::Line;
use ratatui::widgets::Block;
use ratatui::widgets::Clear;
use ratatui::widgets::Gauge;
use ratatui::widgets::Paragraph;
use ratatui::widgets::Widget;
use ratatui::widgets::WidgetRef;
use unicode_width::UnicodeWidthStr;

const PROMPT: &str = "> ";
const MONITORING_HEIGHT: u16 = 3;
const INPUT_HEIGHT: u16 = 3;
const MAX_POPUP_ROWS: usize = 6;

const SELECTED_BG: Color = Color::Rgb(14, 40, 55);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ConsoleLayout {
    monitoring: Option<Rect>,
    logs: Rect,
    input: Rect,
    popup: Option<Rect>,
}

/// The console screen: log pane, monitoring gauges while the server runs,
/// the command input and its suggestion dropdown.
pub(crate) struct ConsoleView<'a> {
    session: &'a ConsoleSession,
    input: &'a CommandLine,
}

impl<'a> ConsoleView<'a> {
    pub(crate) fn new(session: &'a ConsoleSession, input: &'a CommandLine) -> Self {
        Self { session, input }
    }

    fn layout(&self, area: Rect) -> ConsoleLayout {
        let monitoring_height = if self.session.server_running() {
            MONITORING_HEIGHT
        } else {
            0
        };
        let [monitoring, logs, input] = Layout::vertical([
            Constraint::Length(monitoring_height),
            Constraint::Min(1),
            Constraint::Length(INPUT_HEIGHT),
        ])
        .areas(area);

        ConsoleLayout {
            monitoring: (monitoring.height > 0).then_some(monitoring),
            logs,
            input,
            popup: self.popup_area(area, input),
        }
    }

    fn popup_area(&self, area: Rect, input: Rect) -> Option<Rect> {
        if self.input.mode() != InputMode::Suggesting {
            return None;
        }
        let suggestions = self.input.suggestions();
        let rows = suggestions.len().min(MAX_POPUP_ROWS) as u16;
        let widest = suggestions
            .iter()
            .map(|candidate| candidate.width())
            .max()
            .unwrap_or(0) as u16;
        let width = (widest + 4).min(area.width.saturating_sub(2)).max(1);
        let height = (rows + 2).min(input.y.saturating_sub(area.y));
        if height < 3 {
            return None;
        }
        Some(Rect::new(
            input.x + 1,
            input.y - height,
            width,
            height,
        ))
    }

    /// First dropdown row shown; keeps the highlighted entry in view.
    fn popup_offset(&self, rows: usize) -> usize {
        match self.input.highlighted() {
            Some(idx) if rows > 0 => idx.saturating_sub(rows - 1),
            _ => 0,
        }
    }

    /// Terminal cursor position inside the input line.
    pub(crate) fn cursor_position(&self, area: Rect) -> Option<(u16, u16)> {
        let input = self.layout(area).input;
        let inner = Block::bordered().inner(input);
        if inner.width == 0 || inner.height == 0 {
            return None;
        }
        let before_cursor = &self.input.text()[..self.input.cursor()];
        let offset = (PROMPT.width() + before_cursor.width()) as u16;
        let x = inner.x + offset.min(inner.width.saturating_sub(1));
        Some((x, inner.y))
    }

    /// Index of the suggestion under `(column, row)`, if any.
    pub(crate) fn suggestion_at(&self, area: Rect, column: u16, row: u16) -> Option<usize> {
        let popup = self.layout(area).popup?;
        let inner = Block::bordered().inner(popup);
        if !inner.contains(Position::new(column, row)) {
            return None;
        }
        let offset = self.popup_offset(inner.height as usize);
        let idx = offset + (row - inner.y) as usize;
        (idx < self.input.suggestions().len()).then_some(idx)
    }

    pub(crate) fn input_contains(&self, area: Rect, column: u16, row: u16) -> bool {
        self.layout(area)
            .input
            .contains(Position::new(column, row))
    }

    fn render_logs(&self, area: Rect, buf: &mut Buffer) {
        let block = Block::bordered().title(" Console ");
        let inner = block.inner(area);
        block.render(area, buf);

        let logs = self.session.logs();
        let skip = logs.len().saturating_sub(inner.height as usize);
        let lines: Vec<Line> = logs.iter().skip(skip).map(log_line).collect();
        if lines.is_empty() {
            Paragraph::new(Line::from("No output yet.".dim().italic())).render(inner, buf);
        } else {
            Paragraph::new(lines).render(inner, buf);
        }
    }

    fn render_monitoring(&self, area: Rect, buf: &mut Buffer) {
        let snapshot = self.session.monitoring().copied().unwrap_or_default();
        let [cpu, memory] =
            Layout::horizontal([Constraint::Percentage(50), Constraint::Percentage(50)])
                .areas(area);
        gauge(" CPU ", cpu_label(&snapshot), snapshot.cpu.percent(), Color::Cyan)
            .render(cpu, buf);
        gauge(
            " Memory ",
            memory_label(&snapshot),
            snapshot.memory.percent(),
            Color::Magenta,
        )
        .render(memory, buf);
    }

    fn render_input(&self, area: Rect, buf: &mut Buffer) {
        let block = Block::bordered().title(" Command ");
        let inner = block.inner(area);
        block.render(area, buf);
        let line = Line::from(vec![PROMPT.cyan().bold(), self.input.text().into()]);
        Paragraph::new(line).render(inner, buf);
    }

    fn render_popup(&self, area: Rect, buf: &mut Buffer) {
        Clear.render(area, buf);
        let block = Block::bordered().border_style(Style::default().fg(Color::DarkGray));
        let inner = block.inner(area);
        block.render(area, buf);

        let rows = inner.height as usize;
        let offset = self.popup_offset(rows);
        let highlighted = self.input.highlighted();
        for (row, (idx, candidate)) in self
            .input
            .suggestions()
            .iter()
            .enumerate()
            .skip(offset)
            .take(rows)
            .enumerate()
        {
            let style = if highlighted == Some(idx) {
                Style::default().fg(Color::Cyan).bg(SELECTED_BG).bold()
            } else {
                Style::default()
            };
            let y = inner.y + row as u16;
            buf.set_style(Rect::new(inner.x, y, inner.width, 1), style);
            buf.set_stringn(inner.x, y, candidate, inner.width as usize, style);
        }
    }
}

impl WidgetRef for ConsoleView<'_> {
    fn render_ref(&self, area: Rect, buf: &mut Buffer) {
        if area.height == 0 || area.width == 0 {
            return;
        }
        let layout = self.layout(area);
        if let Some(monitoring) = layout.monitoring {
            self.render_monitoring(monitoring, buf);
        }
        self.render_logs(layout.logs, buf);
        self.render_input(layout.input, buf);
        if let Some(popup) = layout.popup {
            self.render_popup(popup, buf);
        }
    }
}

fn log_line(entry: &LogEntry) -> Line<'_> {
    let style = match entry.category() {
        Some(LogCategory::Command) => Style::default().fg(Color::Cyan),
        Some(LogCategory::System) => Style::default().fg(Color::Yellow),
        Some(LogCategory::Error) => Style::default().fg(Color::Red),
        None => Style::default(),
    };
    Line::styled(entry.text(), style)
}

fn gauge<'a>(title: &'a str, label: String, percent: f64, color: Color) -> Gauge<'a> {
    Gauge::default()
        .block(Block::bordered().title(title))
        .gauge_style(Style::default().fg(color))
        .ratio((percent / 100.0).clamp(0.0, 1.0))
        .label(label)
}

fn cpu_label(snapshot: &MonitoringSnapshot) -> String {
    format!("{}%", snapshot.cpu.percent())
}

fn memory_label(snapshot: &MonitoringSnapshot) -> String {
    let format = ByteFormat::default();
    format!(
        "{} / {} ({}%)",
        convert_bytes(snapshot.memory.used, format),
        convert_bytes(snapshot.memory.total, format),
        snapshot.memory.percent()
    )
}
