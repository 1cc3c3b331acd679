//! The console view-model: a control channel and a log stream channel folded
//! into one log buffer, history and server status.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::sync::watch;
use tracing::debug;
use tracing::warn;

use crate::channel::ChannelOptions;
use crate::channel::ConnectionState;
use crate::channel::Endpoint;
use crate::channel::EventHandler;
use crate::channel::SessionChannel;
use crate::channel::Transport;
use crate::history::CommandHistory;
use crate::log::DEFAULT_LOG_CAPACITY;
use crate::log::LogBuffer;
use crate::log::LogCategory;
use crate::log::LogEntry;
use crate::monitoring::MonitoringSnapshot;

/// Control endpoint: `start`, `stop`, `write`.
pub const SERVER: &str = "SERVER";
/// Stream endpoint: `message`, `monitoring`, `exit`, `error`.
pub const CONSOLE: &str = "CONSOLE";

pub const SERVER_STOPPED: &str = "Server was stopped";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsoleEndpoints {
    pub control: Endpoint,
    pub stream: Endpoint,
}

impl ConsoleEndpoints {
    /// Join `base_url` with the two endpoint paths.
    pub fn from_base(base_url: &str, control_path: &str, stream_path: &str) -> Self {
        Self {
            control: Endpoint::new(SERVER, join_url(base_url, control_path)),
            stream: Endpoint::new(CONSOLE, join_url(base_url, stream_path)),
        }
    }
}

fn join_url(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    if path.is_empty() {
        base.to_string()
    } else {
        format!("{base}/{path}")
    }
}

/// Payload of the `start` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartRequest {
    pub command: String,
    pub arguments: Vec<String>,
}

impl Default for StartRequest {
    fn default() -> Self {
        Self {
            command: "java".to_string(),
            arguments: vec!["-jar".into(), "server.jar".into(), "nogui".into()],
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Message(String),
    Monitoring(MonitoringSnapshot),
    Exit,
    Error(String),
}

#[derive(Debug, Clone)]
pub struct ConsoleSettings {
    pub log_capacity: usize,
    pub start: StartRequest,
}

impl Default for ConsoleSettings {
    fn default() -> Self {
        Self {
            log_capacity: DEFAULT_LOG_CAPACITY,
            start: StartRequest::default(),
        }
    }
}

pub struct ConsoleSession {
    control: SessionChannel,
    stream: SessionChannel,
    events: mpsc::UnboundedReceiver<StreamEvent>,
    logs: LogBuffer,
    history: CommandHistory,
    monitoring: Option<MonitoringSnapshot>,
    server_running: bool,
    start: StartRequest,
    closed: bool,
}

impl ConsoleSession {
    pub fn open(
        endpoints: ConsoleEndpoints,
        options: ChannelOptions,
        transport: Arc<dyn Transport>,
        settings: ConsoleSettings,
    ) -> Self {
        let control = SessionChannel::open(endpoints.control, options, Arc::clone(&transport));
        let mut stream = SessionChannel::open(endpoints.stream, options, transport);

        let (tx, events) = mpsc::unbounded_channel();
        stream.set_handlers(stream_handlers(tx));

        Self {
            control,
            stream,
            events,
            logs: LogBuffer::with_capacity(settings.log_capacity),
            history: CommandHistory::new(),
            monitoring: None,
            server_running: false,
            start: settings.start,
            closed: false,
        }
    }

    /// Send a console command. Blank input is ignored. Returns whether the
    /// command was accepted (not whether it reached the server).
    /// Send `text` as a `write`, then log it and remember it. Nothing is
    /// recorded when the input is blank or the control channel is down.
    pub fn submit_command(&mut self, text: &str) -> bool {
        self.history.reset_cursor();
        if self.closed || text.trim().is_empty() {
            return false;
        }
        if !self
            .control
            .send("write", Some(Value::String(text.to_string())))
        {
            return false;
        }
        self.logs.push(LogEntry::tagged(LogCategory::Command, text));
        self.history.push(text);
        true
    }

    /// Ask the server to start. The running flag is only set once the
    /// request was handed to the control channel.
    pub fn start(&mut self) -> bool {
        if self.closed {
            return false;
        }
        let payload = match serde_json::to_value(&self.start) {
            Ok(payload) => payload,
            Err(err) => {
                warn!("failed to encode start request: {err}");
                return false;
            }
        };
        if !self.control.send("start", Some(payload)) {
            return false;
        }
        self.server_running = true;
        true
    }

    /// Ask the server to stop. The running flag stays set until `exit`.
    pub fn stop(&mut self) -> bool {
        if self.closed {
            return false;
        }
        self.control.send("stop", None)
    }

    /// Start or stop depending on the running flag. Does nothing while the
    /// control channel is disconnected.
    pub fn toggle_server(&mut self) -> bool {
        if !self.is_connected() {
            return false;
        }
        if self.server_running {
            self.stop()
        } else {
            self.start()
        }
    }

    /// Apply every inbound event that has already arrived.
    pub fn pump(&mut self) -> usize {
        if self.closed {
            return 0;
        }
        self.control.dispatch_pending();
        self.stream.dispatch_pending();
        self.drain_events()
    }

    /// Wait for the next stream event and apply it along with anything
    /// queued behind it. Returns `false` once the session is closed.
    pub async fn next_update(&mut self) -> bool {
        if self.closed || !self.stream.dispatch_next().await {
            return false;
        }
        self.pump();
        true
    }

    fn drain_events(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(event) = self.events.try_recv() {
            self.apply(event);
            applied += 1;
        }
        applied
    }

    fn apply(&mut self, event: StreamEvent) {
        match event {
            StreamEvent::Message(text) => self.logs.push(LogEntry::raw(text)),
            StreamEvent::Monitoring(snapshot) => self.monitoring = Some(snapshot),
            StreamEvent::Exit => {
                self.server_running = false;
                self.logs
                    .push(LogEntry::tagged(LogCategory::System, SERVER_STOPPED));
            }
            StreamEvent::Error(message) => {
                self.server_running = false;
                self.logs
                    .push(LogEntry::tagged(LogCategory::Error, &message));
            }
        }
    }

    pub fn logs(&self) -> &LogBuffer {
        &self.logs
    }

    pub fn history(&self) -> &CommandHistory {
        &self.history
    }

    pub fn history_mut(&mut self) -> &mut CommandHistory {
        &mut self.history
    }

    pub fn is_connected(&self) -> bool {
        self.control.is_connected()
    }

    /// Connectivity of the control channel, which is what `is_connected`
    /// reports.
    pub fn watch_connectivity(&self) -> watch::Receiver<ConnectionState> {
        self.control.watch_state()
    }

    pub fn control_state(&self) -> ConnectionState {
        self.control.state()
    }

    pub fn stream_state(&self) -> ConnectionState {
        self.stream.state()
    }

    pub fn monitoring(&self) -> Option<&MonitoringSnapshot> {
        self.monitoring.as_ref()
    }

    pub fn server_running(&self) -> bool {
        self.server_running
    }

    /// Reconnect both channels, e.g. after reconnection gave up.
    pub fn reconnect(&self) {
        self.control.connect();
        self.stream.connect();
    }

    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.stream.close();
        self.control.close();
        self.events.close();
        while self.events.try_recv().is_ok() {}
        debug!("console session closed");
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl Drop for ConsoleSession {
    fn drop(&mut self) {
        self.close();
    }
}

fn payload_text(payload: Option<&Value>) -> String {
    match payload {
        Some(Value::String(text)) => text.clone(),
        Some(other) => other.to_string(),
        None => String::new(),
    }
}

fn stream_handlers(tx: mpsc::UnboundedSender<StreamEvent>) -> HashMap<String, EventHandler> {
    let mut handlers: HashMap<String, EventHandler> = HashMap::new();

    let sink = tx.clone();
    handlers.insert(
        "message".to_string(),
        Box::new(move |payload| {
            let _ = sink.send(StreamEvent::Message(payload_text(payload)));
        }),
    );

    let sink = tx.clone();
    handlers.insert(
        "monitoring".to_string(),
        Box::new(move |payload| {
            let Some(payload) = payload else {
                warn!("monitoring event without payload");
                return;
            };
            match serde_json::from_value::<MonitoringSnapshot>(payload.clone()) {
                Ok(snapshot) => {
                    let _ = sink.send(StreamEvent::Monitoring(snapshot));
                }
                Err(err) => warn!("ignoring malformed monitoring payload: {err}"),
            }
        }),
    );

    let sink = tx.clone();
    handlers.insert(
        "exit".to_string(),
        Box::new(move |_| {
            let _ = sink.send(StreamEvent::Exit);
        }),
    );

    handlers.insert(
        "error".to_string(),
        Box::new(move |payload| {
            let _ = tx.send(StreamEvent::Error(payload_text(payload)));
        }),
    );

    handlers
}
