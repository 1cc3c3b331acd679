//! In-process stand-in for a game server, used by `helm --demo`.

use std::time::Duration;

use helm_core::channel::Frame;
use helm_core::channel::MemoryConnection;
use helm_core::channel::MemoryServer;
use helm_core::console::SERVER;
use helm_core::monitoring::Gauge;
use helm_core::monitoring::MonitoringSnapshot;
use serde_json::Value;
use tokio::sync::broadcast;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;
use tracing::warn;

const MONITORING_INTERVAL: Duration = Duration::from_secs(1);
const TOTAL_MEMORY: f64 = 4.0 * 1024.0 * 1024.0 * 1024.0;
const MAX_PLAYERS: u32 = 20;

/// Serve every connection `server` accepts until all clients are gone.
pub(crate) fn spawn(server: MemoryServer) -> JoinHandle<()> {
    tokio::spawn(run(server))
}

async fn run(mut server: MemoryServer) {
    let (broadcast_tx, _) = broadcast::channel::<Frame>(256);
    let (control_tx, mut control_rx) = mpsc::unbounded_channel::<Frame>();
    let mut ticker = tokio::time::interval(MONITORING_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut state = DemoServer::default();

    loop {
        tokio::select! {
            connection = server.accept() => {
                let Some(connection) = connection else {
                    debug!("demo server shutting down");
                    break;
                };
                if connection.endpoint().name == SERVER {
                    tokio::spawn(forward_control(connection, control_tx.clone()));
                } else {
                    tokio::spawn(stream_to(connection, broadcast_tx.subscribe()));
                }
            }
            Some(frame) = control_rx.recv() => {
                for (event, payload) in state.handle(&frame) {
                    let _ = broadcast_tx.send(Frame::new(event, payload));
                }
            }
            _ = ticker.tick(), if state.running => {
                state.ticks += 1;
                let _ = broadcast_tx.send(Frame::new("monitoring", Some(state.monitoring())));
            }
        }
    }
}

async fn forward_control(mut connection: MemoryConnection, control_tx: mpsc::UnboundedSender<Frame>) {
    while let Some(frame) = connection.recv().await {
        if control_tx.send(frame).is_err() {
            break;
        }
    }
}

async fn stream_to(mut connection: MemoryConnection, mut frames: broadcast::Receiver<Frame>) {
    loop {
        tokio::select! {
            frame = frames.recv() => match frame {
                Ok(frame) => {
                    if !connection.emit(&frame.event, frame.payload) {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "demo log stream lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            incoming = connection.recv() => {
                if incoming.is_none() {
                    break;
                }
            }
        }
    }
}

#[derive(Debug, Default)]
struct DemoServer {
    running: bool,
    ticks: u64,
}

impl DemoServer {
    /// Events to publish on the log stream in answer to one control frame.
    fn handle(&mut self, frame: &Frame) -> Vec<(&'static str, Option<Value>)> {
        match frame.event.as_str() {
            "start" if self.running => vec![message("Server is already running")],
            "start" => {
                self.running = true;
                self.ticks = 0;
                let command = frame
                    .payload
                    .as_ref()
                    .and_then(|payload| payload.get("command"))
                    .and_then(Value::as_str)
                    .unwrap_or("java");
                vec![
                    message(&format!("Launching `{command}`")),
                    message("Starting minecraft server version 1.20.1"),
                    message("Preparing level \"world\""),
                    message("Done (2.817s)! For help, type \"help\""),
                ]
            }
            "stop" if !self.running => vec![message("Server is not running")],
            "stop" => {
                self.running = false;
                vec![
                    message("Stopping the server"),
                    message("Saving chunks for level 'ServerLevel[world]'"),
                    ("exit", None),
                ]
            }
            "write" => {
                let command = frame
                    .payload
                    .as_ref()
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                if self.running {
                    vec![message(&respond(command))]
                } else {
                    vec![(
                        "error",
                        Some(Value::String(format!(
                            "Cannot run `{command}`: server is not running"
                        ))),
                    )]
                }
            }
            other => {
                warn!(event = other, "demo server ignoring unknown event");
                Vec::new()
            }
        }
    }

    fn monitoring(&self) -> Value {
        let phase = self.ticks as f64;
        let snapshot = MonitoringSnapshot {
            cpu: Gauge {
                used: 35.0 + 20.0 * (phase * 0.7).sin(),
                total: 100.0,
            },
            memory: Gauge {
                used: 1.5 * 1024.0 * 1024.0 * 1024.0 + 256.0 * 1024.0 * 1024.0 * (phase * 0.3).sin(),
                total: TOTAL_MEMORY,
            },
        };
        serde_json::to_value(snapshot).unwrap_or(Value::Null)
    }
}

fn message(text: &str) -> (&'static str, Option<Value>) {
    ("message", Some(Value::String(format!("[Server thread/INFO]: {text}"))))
}

fn respond(command: &str) -> String {
    let mut parts = command.split_whitespace();
    let name = parts.next().unwrap_or_default().to_lowercase();
    let rest: Vec<&str> = parts.collect();
    match name.as_str() {
        "list" => format!("There are 0 of a max of {MAX_PLAYERS} players online:"),
        "help" => "--- Showing help page 1 of 1 (/help <page>) ---".to_string(),
        "say" => format!("[Server] {}", rest.join(" ")),
        "time" => match rest.as_slice() {
            ["set", "day"] => "Set the time to 1000".to_string(),
            ["set", "night"] => "Set the time to 13000".to_string(),
            _ => "Usage: /time <set|add|query> <value>".to_string(),
        },
        "weather" => match rest.first() {
            Some(kind) => format!("Set the weather to {kind}"),
            None => "Usage: /weather <clear|rain|thunder>".to_string(),
        },
        "seed" => "Seed: [-4172144997902289642]".to_string(),
        "save-all" => "Saved the game".to_string(),
        _ => format!("Unknown command `{command}`. Type \"help\" for help."),
    }
}
