// Forbid accidental stdout/stderr writes in the *library* portion of the TUI.
// The standalone binary entry point is still allowed to print.
#![deny(clippy::print_stdout, clippy::print_stderr)]

use std::path::Path;
use std::sync::Arc;

use color_eyre::eyre::Result;
use color_eyre::eyre::WrapErr;
use helm_core::channel::MemoryTransport;
use helm_core::channel::Transport;
use helm_core::channel::WebSocketTransport;
use helm_core::command_line::CommandLine;
use helm_core::config::Config;
use helm_core::config::find_helm_home;
use helm_core::console::ConsoleSession;
use helm_core::tree::ChildFetcher;
use helm_core::tree::LocalDirFetcher;
use helm_core::tree::MockFileSystem;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

mod app;
mod app_event;
mod cli;
mod console_view;
mod demo;
mod drive_view;
mod keymap;
mod status_bar;
mod tui;

pub use cli::Cli;

use crate::app::App;
use crate::drive_view::DriveState;

const LOG_FILE_NAME: &str = "helm-tui.log";
const DEFAULT_LOG_FILTER: &str = "helm_core=info,helm_tui=info";

pub async fn run_main(cli: Cli) -> Result<()> {
    let helm_home = find_helm_home()?;
    let config = Config::load(helm_home, cli.overrides()).wrap_err("failed to load config")?;
    let _log_guard = init_logging(&config.log_dir())?;

    config
        .access_gate()
        .check()
        .wrap_err("operator is not allowed to use this console")?;

    let demo_server = if cli.demo {
        let (transport, server) = MemoryTransport::pair();
        Some((Arc::new(transport) as Arc<dyn Transport>, demo::spawn(server)))
    } else {
        None
    };
    let transport: Arc<dyn Transport> = match &demo_server {
        Some((transport, _)) => Arc::clone(transport),
        None => Arc::new(WebSocketTransport::new()),
    };
    tracing::info!(
        url = %config.server_url,
        demo = cli.demo,
        "opening console session"
    );
    let session = ConsoleSession::open(
        config.endpoints(),
        config.channel,
        transport,
        config.console.clone(),
    );

    let (fetcher, drive_title): (Arc<dyn ChildFetcher>, String) = match &config.drive_root {
        Some(root) => (
            Arc::new(LocalDirFetcher::new(root)),
            root.display().to_string(),
        ),
        None => (
            Arc::new(MockFileSystem::sample().with_latency(config.mock_latency)),
            "sample".to_string(),
        ),
    };

    let mut terminal = tui::init()?;
    let result = App::run(
        &mut terminal,
        session,
        CommandLine::new(config.suggestion_engine()),
        DriveState::new(drive_title),
        fetcher,
    )
    .await;
    tui::restore()?;

    if let Some((_, handle)) = demo_server {
        handle.abort();
    }
    result
}

/// Route `tracing` output to `<log_dir>/helm-tui.log`; the terminal belongs
/// to the UI.
fn init_logging(log_dir: &Path) -> Result<WorkerGuard> {
    std::fs::create_dir_all(log_dir)
        .wrap_err_with(|| format!("failed to create {}", log_dir.display()))?;
    let file_appender = tracing_appender::rolling::never(log_dir, LOG_FILE_NAME);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_target(false)
        .with_ansi(false);

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .try_init();
    Ok(guard)
}
