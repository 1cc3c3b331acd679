use std::path::Path;

use chrono::DateTime;
use chrono::Local;
use crossterm::event::KeyCode;
use crossterm::event::KeyEvent;
use crossterm::event::KeyModifiers;
use helm_core::monitoring::ByteFormat;
use helm_core::monitoring::convert_bytes;
use helm_core::tree::ExpandAction;
use helm_core::tree::FetchError;
use helm_core::tree::FetchTicket;
use helm_core::tree::FsNode;
use helm_core::tree::RowKind;
use helm_core::tree::TreeCache;
use helm_core::tree::TreeError;
use helm_core::tree::VisibleRow;
use helm_core::tree::parent_path;
use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::Color;
use ratatui::style::Style;
use ratatui::style::Stylize;
use ratatui::widgets::WidgetRef;

const SELECTED_BG: Color = Color::Rgb(14, 40, 55);
const DETAILS_HEIGHT: u16 = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Prompt {
    Rename { path: String, input: String },
    NewFolder { parent: Option<String>, input: String },
    ConfirmDelete { path: String },
}

/// What a refresh needs from the fetcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Refresh {
    Directory(FetchTicket),
    Roots,
}

/// Drive screen state: the lazy tree, the flattened rows on screen and the
/// operator's current selection or prompt.
#[derive(Debug)]
pub(crate) struct DriveState {
    title: String,
    tree: TreeCache,
    rows: Vec<VisibleRow>,
    selected: usize,
    prompt: Option<Prompt>,
    notice: Option<String>,
    show_details: bool,
    roots_loading: bool,
}

impl DriveState {
    pub(crate) fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            tree: TreeCache::default(),
            rows: Vec::new(),
            selected: 0,
            prompt: None,
            notice: None,
            show_details: false,
            roots_loading: true,
        }
    }

    pub(crate) fn rows(&self) -> &[VisibleRow] {
        &self.rows
    }

    pub(crate) fn selected_row(&self) -> Option<&VisibleRow> {
        self.rows.get(self.selected)
    }

    pub(crate) fn prompt(&self) -> Option<&Prompt> {
        self.prompt.as_ref()
    }

    pub(crate) fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    pub(crate) fn begin_roots_reload(&mut self) {
        self.roots_loading = true;
        self.notice = None;
    }

    pub(crate) fn set_roots(&mut self, result: Result<Vec<FsNode>, FetchError>) {
        self.roots_loading = false;
        match result {
            Ok(roots) => {
                self.tree.replace_roots(roots);
                self.selected = 0;
            }
            Err(err) => {
                tracing::warn!("failed to load drive: {err}");
                self.notice = Some(format!("Failed to load drive: {err}"));
            }
        }
        self.rebuild();
    }

    pub(crate) fn complete_fetch(&mut self, ticket: u64, result: Result<Vec<FsNode>, FetchError>) {
        if self.tree.complete_fetch(ticket, result) {
            self.rebuild();
        }
    }

    pub(crate) fn move_selection(&mut self, delta: isize) {
        if self.rows.is_empty() {
            return;
        }
        let len = self.rows.len() as isize;
        let next = (self.selected as isize + delta).clamp(0, len - 1);
        self.selected = next as usize;
    }

    pub(crate) fn select_first(&mut self) {
        self.selected = 0;
    }

    pub(crate) fn select_last(&mut self) {
        self.selected = self.rows.len().saturating_sub(1);
    }

    /// Toggle a directory, retry a failed load, or show a file's details.
    pub(crate) fn activate(&mut self) -> Option<FetchTicket> {
        let row = self.selected_row()?.clone();
        let action = match row.kind {
            RowKind::Directory { .. } => self.tree.toggle(&row.path),
            RowKind::Failed(_) => self.tree.request_expand(&row.path),
            RowKind::File { .. } => {
                self.show_details = !self.show_details;
                return None;
            }
            RowKind::Loading => return None,
        };
        self.after_expand(action)
    }

    pub(crate) fn expand_selected(&mut self) -> Option<FetchTicket> {
        let row = self.selected_row()?.clone();
        match row.kind {
            RowKind::Directory { expanded: false } => {
                let action = self.tree.request_expand(&row.path);
                self.after_expand(action)
            }
            _ => None,
        }
    }

    /// Collapse the selected directory, or jump to the parent of anything
    /// else.
    pub(crate) fn collapse_selected(&mut self) {
        let Some(row) = self.selected_row().cloned() else {
            return;
        };
        let target = match row.kind {
            RowKind::Directory { expanded: true } => Some(row.path.clone()),
            RowKind::Loading | RowKind::Failed(_) => Some(row.path.clone()),
            _ => parent_path(&row.path).map(str::to_string),
        };
        let Some(target) = target else {
            return;
        };
        if let Err(err) = self.tree.collapse(&target) {
            self.notice = Some(err.to_string());
        }
        self.rebuild();
        self.select_path(&target);
    }

    /// Reload the selected directory (or the one holding the selected
    /// file). Top-level files reload the whole drive.
    pub(crate) fn refresh(&mut self) -> Option<Refresh> {
        let row = self.selected_row()?.clone();
        let dir = match row.kind {
            RowKind::File { .. } => parent_path(&row.path).map(str::to_string),
            _ => Some(row.path.clone()),
        };
        let Some(dir) = dir else {
            self.begin_roots_reload();
            return Some(Refresh::Roots);
        };
        if let Err(err) = self.tree.invalidate(&dir) {
            self.notice = Some(err.to_string());
            return None;
        }
        let action = self.tree.request_expand(&dir);
        let ticket = self.after_expand(action);
        self.select_path(&dir);
        ticket.map(Refresh::Directory)
    }

    pub(crate) fn toggle_details(&mut self) {
        self.show_details = !self.show_details;
    }

    pub(crate) fn begin_rename(&mut self) {
        if let Some(row) = self.selected_row().filter(|row| is_node_row(row)) {
            self.prompt = Some(Prompt::Rename {
                path: row.path.clone(),
                input: row.name.clone(),
            });
        }
    }

    /// New folders go into the selected directory, or next to the selected
    /// file.
    pub(crate) fn begin_new_folder(&mut self) {
        let parent = match self.selected_row() {
            Some(row) if matches!(row.kind, RowKind::Directory { .. }) => Some(row.path.clone()),
            Some(row) => parent_path(&row.path).map(str::to_string),
            None => None,
        };
        self.prompt = Some(Prompt::NewFolder {
            parent,
            input: String::new(),
        });
    }

    pub(crate) fn begin_delete(&mut self) {
        if let Some(row) = self.selected_row().filter(|row| is_node_row(row)) {
            self.prompt = Some(Prompt::ConfirmDelete {
                path: row.path.clone(),
            });
        }
    }

    /// Feed a key to the open prompt. Returns false when no prompt is open.
    pub(crate) fn handle_prompt_key(&mut self, key: &KeyEvent) -> bool {
        let Some(prompt) = self.prompt.as_mut() else {
            return false;
        };
        match prompt {
            Prompt::ConfirmDelete { .. } => match key.code {
                KeyCode::Char('y') | KeyCode::Enter => self.commit_prompt(),
                KeyCode::Char('n') | KeyCode::Esc => self.prompt = None,
                _ => {}
            },
            Prompt::Rename { input, .. } | Prompt::NewFolder { input, .. } => match key.code {
                KeyCode::Enter => self.commit_prompt(),
                KeyCode::Esc => self.prompt = None,
                KeyCode::Backspace => {
                    input.pop();
                }
                KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
                    input.push(c);
                }
                _ => {}
            },
        }
        true
    }

    fn commit_prompt(&mut self) {
        let Some(prompt) = self.prompt.take() else {
            return;
        };
        let result = match prompt {
            Prompt::Rename { path, input } => self.tree.rename(&path, input.trim()),
            Prompt::NewFolder { parent, input } => self.tree.insert(
                parent.as_deref(),
                FsNode::directory_with(input.trim(), Vec::new()),
            ),
            Prompt::ConfirmDelete { path } => self.tree.delete(&path).map(|node| {
                self.notice = Some(format!("Deleted {}", node.name()));
                parent_path(&path).unwrap_or_default().to_string()
            }),
        };
        self.rebuild();
        match result {
            Ok(path) => self.select_path(&path),
            Err(err) => self.notice = Some(err.to_string()),
        }
    }

    /// Add a local file to the top level of the drive, as dropping it on the
    /// browser would.
    pub(crate) fn drop_file(&mut self, path: &Path) {
        let name = match path.file_name().and_then(|name| name.to_str()) {
            Some(name) => name.to_string(),
            None => {
                self.notice = Some(format!("Cannot upload {}", path.display()));
                return;
            }
        };
        let metadata = match std::fs::metadata(path) {
            Ok(metadata) if metadata.is_file() => metadata,
            Ok(_) => {
                self.notice = Some(format!("{name} is not a file"));
                return;
            }
            Err(err) => {
                self.notice = Some(format!("Cannot upload {name}: {err}"));
                return;
            }
        };
        let modified = metadata
            .modified()
            .map(|time| DateTime::<Local>::from(time).format("%Y-%m-%d").to_string())
            .unwrap_or_default();
        match self
            .tree
            .insert(None, FsNode::file(name.clone(), metadata.len(), modified))
        {
            Ok(new_path) => {
                tracing::info!(path = %new_path, "uploaded file");
                self.notice = Some(format!("Uploaded {name}"));
                self.rebuild();
                self.select_path(&new_path);
            }
            Err(err) => self.notice = Some(err.to_string()),
        }
    }

    fn after_expand(
        &mut self,
        action: Result<ExpandAction, TreeError>,
    ) -> Option<FetchTicket> {
        let ticket = match action {
            Ok(ExpandAction::Fetch(ticket)) => Some(ticket),
            Ok(_) => None,
            Err(err) => {
                self.notice = Some(err.to_string());
                None
            }
        };
        self.rebuild();
        ticket
    }

    fn rebuild(&mut self) {
        self.rows = self.tree.visible_rows();
        if self.selected >= self.rows.len() {
            self.selected = self.rows.len().saturating_sub(1);
        }
    }

    fn select_path(&mut self, path: &str) {
        if let Some(idx) = self
            .rows
            .iter()
            .position(|row| row.path == path && is_node_row(row))
        {
            self.selected = idx;
        }
    }

    pub(crate) fn widget(&self, focused: bool) -> DriveWidget<'_> {
        DriveWidget {
            state: self,
            focused,
        }
    }
}

fn is_node_row(row: &VisibleRow) -> bool {
    matches!(row.kind, RowKind::Directory { .. } | RowKind::File { .. })
}

pub(crate) struct DriveWidget<'a> {
    state: &'a DriveState,
    focused: bool,
}

impl DriveWidget<'_> {
    fn footer_lines(&self) -> Vec<(String, Style)> {
        let state = self.state;
        let mut lines = Vec::new();
        if state.show_details {
            if let Some(row) = state.selected_row() {
                lines.extend(details_lines(row));
            }
        }
        if let Some(prompt) = &state.prompt {
            lines.push((prompt_line(prompt), Style::default().fg(Color::Yellow)));
        } else if let Some(notice) = &state.notice {
            lines.push((notice.clone(), Style::default().fg(Color::DarkGray)));
        }
        lines
    }
}

impl WidgetRef for DriveWidget<'_> {
    fn render_ref(&self, area: Rect, buf: &mut Buffer) {
        if area.height == 0 || area.width == 0 {
            return;
        }

        for y in area.y..area.bottom() {
            fill_line(buf, area.x, y, area.width, Style::default());
        }

        let header_style = if self.focused {
            Style::default().fg(Color::Cyan).bold()
        } else {
            Style::default().fg(Color::DarkGray).bold()
        };
        let header_text = format!("Drive · {}", self.state.title);
        render_line(
            buf,
            area.x,
            area.y,
            area.width,
            &header_text,
            header_style,
            header_style,
        );

        let footer = self.footer_lines();
        let footer_height = (footer.len() as u16).min(area.height.saturating_sub(1));
        let footer_top = area.bottom() - footer_height;
        for (offset, (text, style)) in footer.iter().take(footer_height as usize).enumerate() {
            render_line(
                buf,
                area.x,
                footer_top + offset as u16,
                area.width,
                text,
                *style,
                Style::default(),
            );
        }

        let rows_available = footer_top.saturating_sub(area.y + 1) as usize;
        if rows_available == 0 {
            return;
        }

        let rows = self.state.rows();
        if rows.is_empty() {
            let text = if self.state.roots_loading {
                "loading…"
            } else {
                "(no files)"
            };
            let style = Style::default().fg(Color::DarkGray).italic();
            render_line(
                buf,
                area.x,
                area.y + 1,
                area.width,
                text,
                style,
                Style::default(),
            );
            return;
        }

        let selected = self.state.selected;
        let first = selected.saturating_sub(rows_available - 1);
        for (line, (idx, row)) in rows
            .iter()
            .enumerate()
            .skip(first)
            .take(rows_available)
            .enumerate()
        {
            let (fill_style, text_style) = row_styles(row, idx == selected, self.focused);
            render_line(
                buf,
                area.x,
                area.y + 1 + line as u16,
                area.width,
                &row_label(row),
                text_style,
                fill_style,
            );
        }
    }
}

fn row_styles(row: &VisibleRow, selected: bool, focused: bool) -> (Style, Style) {
    if selected {
        return if focused {
            (
                Style::default().bg(SELECTED_BG),
                Style::default().fg(Color::Cyan).bg(SELECTED_BG).bold(),
            )
        } else {
            (
                Style::default().bg(Color::Rgb(25, 25, 25)),
                Style::default().fg(Color::DarkGray).bg(Color::Rgb(25, 25, 25)),
            )
        };
    }
    let text = match row.kind {
        RowKind::Directory { .. } => Style::default().fg(Color::LightCyan),
        RowKind::File { .. } => Style::default(),
        RowKind::Loading => Style::default().fg(Color::DarkGray).italic(),
        RowKind::Failed(_) => Style::default().fg(Color::Red).italic(),
    };
    (Style::default(), text)
}

fn row_label(row: &VisibleRow) -> String {
    let mut text = "  ".repeat(row.depth);
    match &row.kind {
        RowKind::Directory { expanded: true } => text.push_str("- "),
        RowKind::Directory { expanded: false } => text.push_str("+ "),
        RowKind::File { .. } => text.push_str("  "),
        RowKind::Loading => text.push_str("  "),
        RowKind::Failed(_) => text.push_str("! "),
    }
    text.push_str(&row.name);
    if let RowKind::File { size, .. } = row.kind {
        text.push_str(&format!("  ({})", format_size(size)));
    }
    text
}

fn details_lines(row: &VisibleRow) -> Vec<(String, Style)> {
    let RowKind::File { size, modified } = &row.kind else {
        return Vec::new();
    };
    let style = Style::default().fg(Color::Gray);
    let mut lines = vec![
        (format!("Name:     {}", row.name), style),
        (format!("Path:     {}", row.path), style),
        (format!("Size:     {}", format_size(*size)), style),
        (format!("Modified: {modified}"), style),
    ];
    lines.truncate(DETAILS_HEIGHT as usize);
    lines
}

fn prompt_line(prompt: &Prompt) -> String {
    match prompt {
        Prompt::Rename { path, input } => format!("Rename {path} to: {input}_"),
        Prompt::NewFolder { parent, input } => {
            format!("New folder in {}: {input}_", parent.as_deref().unwrap_or("/"))
        }
        Prompt::ConfirmDelete { path } => format!("Delete {path}? (y/n)"),
    }
}

fn format_size(size: u64) -> String {
    convert_bytes(size as f64, ByteFormat::default())
}

fn render_line(
    buf: &mut Buffer,
    x: u16,
    y: u16,
    width: u16,
    text: &str,
    text_style: Style,
    fill_style: Style,
) {
    if width == 0 {
        return;
    }
    fill_line(buf, x, y, width, fill_style);
    let max_chars = width as usize;
    let total_chars = text.chars().count();
    let mut clipped: String = text.chars().take(max_chars).collect();
    if total_chars > max_chars && max_chars >= 3 {
        let new_len = clipped.chars().count().saturating_sub(3);
        clipped = clipped.chars().take(new_len).collect();
        clipped.push_str("...");
    }
    buf.set_stringn(x, y, clipped, max_chars, text_style);
}

fn fill_line(buf: &mut Buffer, x: u16, y: u16, width: u16, style: Style) {
    if width == 0 {
        return;
    }
    let blank = " ".repeat(width as usize);
    buf.set_stringn(x, y, blank, width as usize, style);
}
