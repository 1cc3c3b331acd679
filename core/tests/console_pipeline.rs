use std::sync::Arc;
use std::time::Duration;

use helm_core::channel::ChannelOptions;
use helm_core::channel::ConnectionState;
use helm_core::channel::Frame;
use helm_core::channel::MemoryConnection;
use helm_core::channel::MemoryServer;
use helm_core::channel::MemoryTransport;
use helm_core::console::CONSOLE;
use helm_core::console::ConsoleEndpoints;
use helm_core::console::ConsoleSession;
use helm_core::console::ConsoleSettings;
use helm_core::console::SERVER;
use helm_core::console::StartRequest;
use helm_core::log::LogCategory;
use helm_core::log::LogEntry;
use pretty_assertions::assert_eq;
use serde_json::json;
use tokio::time::timeout;

const STEP: Duration = Duration::from_secs(5);

struct Remote {
    control: MemoryConnection,
    stream: MemoryConnection,
}

async fn accept_both(server: &mut MemoryServer) -> Remote {
    let mut control = None;
    let mut stream = None;
    while control.is_none() || stream.is_none() {
        let conn = timeout(STEP, server.accept())
            .await
            .expect("accept timed out")
            .expect("transport dropped");
        match conn.endpoint().name.as_str() {
            SERVER => control = Some(conn),
            CONSOLE => stream = Some(conn),
            other => panic!("unexpected endpoint {other}"),
        }
    }
    Remote {
        control: control.expect("control"),
        stream: stream.expect("stream"),
    }
}

async fn open_session(settings: ConsoleSettings) -> (ConsoleSession, Remote, MemoryServer) {
    let (transport, mut server) = MemoryTransport::pair();
    let endpoints = ConsoleEndpoints::from_base("memory://demo", "server", "console");
    let session = ConsoleSession::open(
        endpoints,
        ChannelOptions::default(),
        Arc::new(transport),
        settings,
    );
    let remote = accept_both(&mut server).await;
    let mut connectivity = session.watch_connectivity();
    timeout(
        STEP,
        connectivity.wait_for(|state| *state == ConnectionState::Connected),
    )
    .await
    .expect("connect timed out")
    .expect("driver stopped");
    (session, remote, server)
}

async fn wait_for_lines(session: &mut ConsoleSession, count: usize) {
    while session.logs().len() < count {
        let alive = timeout(STEP, session.next_update())
            .await
            .expect("no update arrived");
        assert!(alive, "session closed while waiting");
    }
}

fn lines(session: &ConsoleSession) -> Vec<String> {
    session
        .logs()
        .iter()
        .map(|entry| entry.text().to_string())
        .collect()
}

#[tokio::test]
async fn submitted_commands_are_written_logged_and_remembered() {
    let (mut session, mut remote, _server) = open_session(ConsoleSettings::default()).await;
    assert!(session.is_connected());

    assert!(session.submit_command("say hello"));
    let frame = timeout(STEP, remote.control.recv())
        .await
        .expect("write timed out");
    assert_eq!(frame, Some(Frame::new("write", Some(json!("say hello")))));

    let last = session.logs().last().cloned().expect("command line logged");
    assert_eq!(last.category(), Some(LogCategory::Command));
    assert!(last.text().ends_with("] [COMMAND]: say hello"), "{}", last.text());
    assert_eq!(session.history().entries(), ["say hello"]);

    assert!(!session.submit_command("   "));
    assert_eq!(session.logs().len(), 1);
    assert_eq!(session.history().len(), 1);
    assert_eq!(session.history().cursor(), 1);
}

#[tokio::test]
async fn stream_events_update_logs_monitoring_and_running_flag() {
    let (mut session, mut remote, _server) = open_session(ConsoleSettings::default()).await;

    session.start();
    assert!(session.server_running());
    let frame = timeout(STEP, remote.control.recv())
        .await
        .expect("start timed out")
        .expect("start frame");
    assert_eq!(frame.event, "start");
    assert_eq!(
        frame.payload,
        Some(json!({"command": "java", "arguments": ["-jar", "server.jar", "nogui"]}))
    );

    remote.stream.emit("message", Some(json!("[Server thread/INFO]: Done (2.1s)!")));
    remote.stream.emit(
        "monitoring",
        Some(json!({"cpu": {"used": 25, "total": 100}, "memory": {"used": 512, "total": 2048}})),
    );
    remote.stream.emit("monitoring", Some(json!({"cpu": "broken"})));
    remote.stream.emit("exit", None);
    wait_for_lines(&mut session, 2).await;

    let logs = lines(&session);
    assert_eq!(logs[0], "[Server thread/INFO]: Done (2.1s)!");
    assert!(logs[1].ends_with("] [SYSTEM]: Server was stopped"), "{}", logs[1]);
    assert!(!session.server_running());
    let monitoring = session.monitoring().expect("snapshot kept");
    assert_eq!(monitoring.memory.percent(), 25.0);
    assert_eq!(monitoring.cpu.used, 25.0);
}

#[tokio::test]
async fn stop_keeps_running_until_exit_and_error_clears_it() {
    let (mut session, mut remote, _server) = open_session(ConsoleSettings::default()).await;

    session.toggle_server();
    assert!(session.server_running());
    session.toggle_server();
    assert!(session.server_running(), "stop waits for the exit event");

    let start = timeout(STEP, remote.control.recv()).await.expect("start");
    let stop = timeout(STEP, remote.control.recv()).await.expect("stop");
    assert_eq!(start.map(|frame| frame.event), Some("start".to_string()));
    assert_eq!(stop, Some(Frame::new("stop", None)));

    remote.stream.emit("error", Some(json!("java: not found")));
    wait_for_lines(&mut session, 1).await;
    let last = session.logs().last().cloned().expect("error line");
    assert_eq!(last.category(), Some(LogCategory::Error));
    assert!(last.text().ends_with("] [ERROR]: java: not found"));
    assert!(!session.server_running());
}

#[tokio::test]
async fn configured_start_request_and_log_capacity_apply() {
    let settings = ConsoleSettings {
        log_capacity: 2,
        start: StartRequest {
            command: "./run.sh".to_string(),
            arguments: vec!["--fast".to_string()],
        },
    };
    let (mut session, mut remote, _server) = open_session(settings).await;

    session.start();
    let frame = timeout(STEP, remote.control.recv())
        .await
        .expect("start")
        .expect("frame");
    assert_eq!(
        frame.payload,
        Some(json!({"command": "./run.sh", "arguments": ["--fast"]}))
    );

    for idx in 0..4 {
        remote.stream.emit("message", Some(json!(format!("line {idx}"))));
    }
    while !lines(&session).contains(&"line 3".to_string()) {
        let alive = timeout(STEP, session.next_update()).await.expect("update");
        assert!(alive);
    }
    assert_eq!(lines(&session), vec!["line 2", "line 3"]);
}

#[tokio::test]
async fn closed_session_ignores_late_events() {
    let (mut session, remote, _server) = open_session(ConsoleSettings::default()).await;
    session.close();
    remote.stream.emit("message", Some(json!("late")));
    remote.stream.emit("exit", None);

    tokio::task::yield_now().await;
    assert_eq!(session.pump(), 0);
    assert!(!session.next_update().await);
    assert!(session.logs().is_empty());
    assert!(!session.submit_command("list"));
    session.close();
}

#[tokio::test]
async fn disconnected_session_neither_starts_nor_records_commands() {
    let (transport, server) = MemoryTransport::pair();
    let options = ChannelOptions {
        auto_connect: false,
        ..ChannelOptions::default()
    };
    let mut session = ConsoleSession::open(
        ConsoleEndpoints::from_base("memory://demo", "server", "console"),
        options,
        Arc::new(transport),
        ConsoleSettings::default(),
    );
    assert!(!session.is_connected());

    assert!(!session.toggle_server());
    assert!(!session.server_running());
    assert!(!session.start());
    assert!(!session.server_running());
    assert!(!session.toggle_server());
    assert!(!session.server_running());

    assert!(!session.submit_command("list"));
    assert!(session.logs().is_empty());
    assert!(session.history().is_empty());
    assert_eq!(server.connect_attempts(SERVER), 0);
}

#[test]
fn locally_created_lines_are_tagged() {
    let entry = LogEntry::tagged(LogCategory::Command, "list");
    let text = entry.text();
    assert_eq!(text.len(), "[00:00:00] [COMMAND]: list".len());
    assert!(text.starts_with('['));
}
