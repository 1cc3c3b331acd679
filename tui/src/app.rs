use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

use color_eyre::eyre::Result;
use color_eyre::eyre::WrapErr;
use crossterm::event::Event;
use crossterm::event::EventStream;
use crossterm::event::KeyEvent;
use crossterm::event::KeyEventKind;
use crossterm::event::MouseButton;
use crossterm::event::MouseEvent;
use crossterm::event::MouseEventKind;
use helm_core::command_line::CommandLine;
use helm_core::command_line::InputKey;
use helm_core::command_line::KeyOutcome;
use helm_core::console::ConsoleSession;
use helm_core::tree::ChildFetcher;
use helm_core::tree::FetchTicket;
use ratatui::Frame;
use ratatui::layout::Constraint;
use ratatui::layout::Layout;
use ratatui::layout::Rect;
use tokio::select;
use tokio::sync::mpsc::unbounded_channel;
use tokio::time::MissedTickBehavior;
use tokio_stream::StreamExt;
use tracing::debug;
use tracing::info;

use crate::app_event::AppEvent;
use crate::app_event::AppEventSender;
use crate::console_view::ConsoleView;
use crate::drive_view::DriveState;
use crate::drive_view::Refresh;
use crate::keymap::Action;
use crate::keymap::Keymap;
use crate::keymap::input_key;
use crate::status_bar::StatusBar;
use crate::status_bar::StatusLine;
use crate::tui;

/// Redraw and inbound-event cadence.
const TICK: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Screen {
    Console,
    Drive,
}

pub(crate) struct App {
    session: ConsoleSession,
    command_line: CommandLine,
    drive: DriveState,
    fetcher: Arc<dyn ChildFetcher>,
    keymap: Keymap,
    screen: Screen,
    app_event_tx: AppEventSender,
    /// Area the current screen was last drawn into, for mouse hit tests.
    body_area: Rect,
}

impl App {
    pub(crate) fn new(
        session: ConsoleSession,
        command_line: CommandLine,
        drive: DriveState,
        fetcher: Arc<dyn ChildFetcher>,
        app_event_tx: AppEventSender,
    ) -> Self {
        Self {
            session,
            command_line,
            drive,
            fetcher,
            keymap: Keymap::new(),
            screen: Screen::Console,
            app_event_tx,
            body_area: Rect::default(),
        }
    }

    pub(crate) async fn run(
        terminal: &mut tui::Terminal,
        session: ConsoleSession,
        command_line: CommandLine,
        drive: DriveState,
        fetcher: Arc<dyn ChildFetcher>,
    ) -> Result<()> {
        let (app_event_tx, mut app_event_rx) = unbounded_channel();
        let app_event_tx = AppEventSender::new(app_event_tx);
        let mut app = Self::new(session, command_line, drive, fetcher, app_event_tx);
        app.load_roots();

        let mut tui_events = EventStream::new();
        let mut ticker = tokio::time::interval(TICK);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        app.draw(terminal)?;
        while select! {
            Some(event) = app_event_rx.recv() => {
                app.handle_event(event)
            }
            Some(event) = tui_events.next() => {
                let event = event.wrap_err("failed to read terminal event")?;
                app.handle_tui_event(event)
            }
            _ = ticker.tick() => {
                app.on_tick();
                true
            }
        } {
            app.draw(terminal)?;
        }

        app.session.close();
        info!("helm exiting");
        Ok(())
    }

    fn draw(&mut self, terminal: &mut tui::Terminal) -> Result<()> {
        let mut body = Rect::default();
        terminal.draw(|frame| body = self.render(frame))?;
        self.body_area = body;
        Ok(())
    }

    fn render(&self, frame: &mut Frame) -> Rect {
        let [body, status] =
            Layout::vertical([Constraint::Min(1), Constraint::Length(1)]).areas(frame.area());
        match self.screen {
            Screen::Console => {
                let view = ConsoleView::new(&self.session, &self.command_line);
                let cursor = view.cursor_position(body);
                frame.render_widget_ref(view, body);
                if let Some((x, y)) = cursor {
                    frame.set_cursor_position((x, y));
                }
            }
            Screen::Drive => {
                frame.render_widget_ref(self.drive.widget(true), body);
            }
        }
        let status_line = StatusLine {
            screen: self.screen,
            control: self.session.control_state(),
            stream: self.session.stream_state(),
            server_running: self.session.server_running(),
        };
        StatusBar::render(&status_line, status, frame.buffer_mut());
        body
    }

    fn on_tick(&mut self) {
        let applied = self.session.pump();
        if applied > 0 {
            debug!(applied, "applied stream events");
        }
        self.command_line.flush_blur(Instant::now());
    }

    fn handle_event(&mut self, event: AppEvent) -> bool {
        match event {
            AppEvent::ExitRequest => return false,
            AppEvent::RootsFetched(result) => self.drive.set_roots(result),
            AppEvent::ChildrenFetched { ticket, result } => {
                self.drive.complete_fetch(ticket, result);
            }
        }
        true
    }

    pub(crate) fn handle_tui_event(&mut self, event: Event) -> bool {
        match event {
            Event::Key(key) => self.handle_key_event(key),
            Event::Mouse(mouse) => self.handle_mouse_event(mouse),
            Event::Paste(pasted) => self.handle_paste(&pasted),
            Event::FocusLost => self.command_line.blur(Instant::now()),
            Event::FocusGained | Event::Resize(..) => {}
        }
        true
    }

    fn handle_key_event(&mut self, key: KeyEvent) {
        if key.kind == KeyEventKind::Release {
            return;
        }
        if self.screen == Screen::Drive && self.drive.handle_prompt_key(&key) {
            return;
        }
        if let Some(action) = self.keymap.action(self.screen, &key) {
            self.handle_action(action);
            return;
        }
        if self.screen == Screen::Console {
            if let Some(input) = input_key(&key) {
                self.handle_input(input);
            }
        }
    }

    fn handle_input(&mut self, input: InputKey) {
        let outcome = self
            .command_line
            .handle_key(input, self.session.history_mut());
        if let KeyOutcome::Submit(command) = outcome {
            self.session.submit_command(&command);
        }
    }

    fn handle_mouse_event(&mut self, mouse: MouseEvent) {
        if self.screen != Screen::Console {
            return;
        }
        let view = ConsoleView::new(&self.session, &self.command_line);
        let hit = view.suggestion_at(self.body_area, mouse.column, mouse.row);
        let in_input = view.input_contains(self.body_area, mouse.column, mouse.row);
        match mouse.kind {
            MouseEventKind::Moved => {
                if let Some(idx) = hit {
                    self.command_line.hover_suggestion(idx);
                }
            }
            MouseEventKind::Down(MouseButton::Left) => match hit {
                Some(idx) => {
                    self.command_line.click_suggestion(idx);
                }
                None if in_input => self.command_line.focus(),
                None => self.command_line.blur(Instant::now()),
            },
            _ => {}
        }
    }

    /// Pasted text goes into the command line; on the drive a pasted file
    /// path is uploaded.
    fn handle_paste(&mut self, pasted: &str) {
        match self.screen {
            Screen::Console => {
                for c in pasted.chars().filter(|c| !c.is_control()) {
                    self.handle_input(InputKey::Char(c));
                }
            }
            Screen::Drive => {
                let path = pasted.trim().trim_matches(|c| c == '\'' || c == '"');
                self.drive.drop_file(Path::new(path));
            }
        }
    }

    fn handle_action(&mut self, action: Action) {
        match action {
            Action::Quit => self.app_event_tx.send(AppEvent::ExitRequest),
            Action::SwitchScreen => self.switch_screen(),
            Action::ToggleServer => {
                if !self.session.toggle_server() {
                    debug!("server toggle ignored while disconnected");
                }
            }
            Action::Reconnect => {
                info!("reconnecting on operator request");
                self.session.reconnect();
            }
            Action::SelectPrev => self.drive.move_selection(-1),
            Action::SelectNext => self.drive.move_selection(1),
            Action::SelectFirst => self.drive.select_first(),
            Action::SelectLast => self.drive.select_last(),
            Action::Activate => {
                let ticket = self.drive.activate();
                self.spawn_fetch(ticket);
            }
            Action::Expand => {
                let ticket = self.drive.expand_selected();
                self.spawn_fetch(ticket);
            }
            Action::Collapse => self.drive.collapse_selected(),
            Action::Rename => self.drive.begin_rename(),
            Action::Delete => self.drive.begin_delete(),
            Action::NewFolder => self.drive.begin_new_folder(),
            Action::ToggleDetails => self.drive.toggle_details(),
            Action::Refresh => match self.drive.refresh() {
                Some(Refresh::Directory(ticket)) => self.spawn_fetch(Some(ticket)),
                Some(Refresh::Roots) => self.load_roots(),
                None => {}
            },
        }
    }

    fn switch_screen(&mut self) {
        self.screen = match self.screen {
            Screen::Console => {
                self.command_line.blur(Instant::now());
                Screen::Drive
            }
            Screen::Drive => {
                self.command_line.focus();
                Screen::Console
            }
        };
    }

    fn load_roots(&mut self) {
        self.drive.begin_roots_reload();
        let fetcher = Arc::clone(&self.fetcher);
        let tx = self.app_event_tx.clone();
        tokio::spawn(async move {
            let result = fetcher.fetch_roots().await;
            tx.send(AppEvent::RootsFetched(result));
        });
    }

    fn spawn_fetch(&self, ticket: Option<FetchTicket>) {
        let Some(ticket) = ticket else {
            return;
        };
        let fetcher = Arc::clone(&self.fetcher);
        let tx = self.app_event_tx.clone();
        tokio::spawn(async move {
            let result = fetcher.fetch_children(&ticket.path).await;
            tx.send(AppEvent::ChildrenFetched {
                ticket: ticket.id,
                result,
            });
        });
    }
}
