use helm_core::tree::FetchError;
use helm_core::tree::FsNode;
use tokio::sync::mpsc::UnboundedSender;

#[derive(Debug)]
pub(crate) enum AppEvent {
    /// Request to exit the application gracefully.
    ExitRequest,

    /// Top-level drive listing finished loading.
    RootsFetched(Result<Vec<FsNode>, FetchError>),

    /// Children of a directory arrived. `ticket` is the id handed out by the
    /// tree cache when the fetch was requested; stale tickets are ignored.
    ChildrenFetched {
        ticket: u64,
        result: Result<Vec<FsNode>, FetchError>,
    },
}

#[derive(Clone, Debug)]
pub(crate) struct AppEventSender {
    app_event_tx: UnboundedSender<AppEvent>,
}

impl AppEventSender {
    pub(crate) fn new(app_event_tx: UnboundedSender<AppEvent>) -> Self {
        Self { app_event_tx }
    }

    /// Send an event to the app loop. Failures are logged; they only happen
    /// while the app is shutting down.
    pub(crate) fn send(&self, event: AppEvent) {
        if let Err(err) = self.app_event_tx.send(event) {
            tracing::error!("failed to send app event: {err}");
        }
    }
}
