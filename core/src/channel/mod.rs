//! Realtime session channels: one logical, self-reconnecting connection per
//! named endpoint with named-event subscriptions.
//!
//! Each [`SessionChannel`] spawns a driver task that owns the transport link.
//! Inbound events are queued by the driver and handed to the registered
//! handlers only when the owner calls [`SessionChannel::dispatch_pending`] or
//! [`SessionChannel::dispatch_next`], so handlers always run on the owner's
//! task.

mod driver;
pub mod memory;
pub mod transport;
pub mod websocket;

use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::mpsc;
use tokio::sync::watch;
use tracing::debug;

use driver::Command;
use driver::Driver;
pub use memory::MemoryConnection;
pub use memory::MemoryServer;
pub use memory::MemoryTransport;
pub use transport::Endpoint;
pub use transport::Frame;
pub use transport::Transport;
pub use transport::TransportError;
pub use transport::TransportLink;
pub use websocket::WebSocketTransport;

pub const DEFAULT_RECONNECTION_ATTEMPTS: u32 = 5;
pub const DEFAULT_RECONNECTION_DELAY: Duration = Duration::from_millis(3000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelOptions {
    pub auto_connect: bool,
    pub reconnection: bool,
    pub reconnection_attempts: u32,
    pub reconnection_delay: Duration,
}

impl Default for ChannelOptions {
    fn default() -> Self {
        Self {
            auto_connect: true,
            reconnection: true,
            reconnection_attempts: DEFAULT_RECONNECTION_ATTEMPTS,
            reconnection_delay: DEFAULT_RECONNECTION_DELAY,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

pub type EventHandler = Box<dyn FnMut(Option<&Value>) + Send>;

/// Result of [`SessionChannel::set_handlers`]. Both lists are sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriptionDelta {
    pub added: Vec<String>,
    pub removed: Vec<String>,
}

impl SubscriptionDelta {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

pub struct SessionChannel {
    endpoint: Endpoint,
    commands: Option<mpsc::UnboundedSender<Command>>,
    inbound: mpsc::UnboundedReceiver<Frame>,
    state: watch::Receiver<ConnectionState>,
    handlers: HashMap<String, EventHandler>,
}

impl SessionChannel {
    /// Spawn the driver for `endpoint`. Must be called inside a tokio runtime.
    pub fn open(endpoint: Endpoint, options: ChannelOptions, transport: Arc<dyn Transport>) -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);

        let driver = Driver {
            endpoint: endpoint.clone(),
            options,
            transport,
            commands: command_rx,
            state: state_tx,
            inbound: inbound_tx,
            subscriptions: HashSet::new(),
        };
        tokio::spawn(driver.run());

        Self {
            endpoint,
            commands: Some(command_tx),
            inbound: inbound_rx,
            state: state_rx,
            handlers: HashMap::new(),
        }
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.commands.is_none()
    }

    /// Hand a frame to the driver. Only possible while connected; otherwise
    /// the event is dropped and `false` is returned.
    pub fn send(&self, event: &str, payload: Option<Value>) -> bool {
        if !self.is_connected() {
            debug!(endpoint = %self.endpoint.name, event, "not connected, dropping send");
            return false;
        }
        self.command(Command::Emit(Frame::new(event, payload)))
    }

    pub fn connect(&self) {
        self.command(Command::Connect);
    }

    pub fn disconnect(&self) {
        self.command(Command::Disconnect);
    }

    /// Register or replace the handler for `event`.
    pub fn on(&mut self, event: impl Into<String>, handler: EventHandler) {
        let event = event.into();
        if self.is_closed() {
            return;
        }
        if self.handlers.insert(event.clone(), handler).is_none() {
            self.command(Command::Subscribe(event));
        }
    }

    pub fn off(&mut self, event: &str) -> bool {
        if self.handlers.remove(event).is_some() {
            self.command(Command::Unsubscribe(event.to_string()));
            true
        } else {
            false
        }
    }

    /// Replace the whole handler set, subscribing and unsubscribing only the
    /// names that actually changed.
    pub fn set_handlers(&mut self, handlers: HashMap<String, EventHandler>) -> SubscriptionDelta {
        if self.is_closed() {
            return SubscriptionDelta::default();
        }
        let mut removed: Vec<String> = self
            .handlers
            .keys()
            .filter(|name| !handlers.contains_key(*name))
            .cloned()
            .collect();
        let mut added: Vec<String> = handlers
            .keys()
            .filter(|name| !self.handlers.contains_key(*name))
            .cloned()
            .collect();
        removed.sort();
        added.sort();

        for name in &removed {
            self.command(Command::Unsubscribe(name.clone()));
        }
        for name in &added {
            self.command(Command::Subscribe(name.clone()));
        }
        self.handlers = handlers;

        let delta = SubscriptionDelta { added, removed };
        if !delta.is_empty() {
            debug!(endpoint = %self.endpoint.name, ?delta, "handlers reconciled");
        }
        delta
    }

    pub fn handler_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Run handlers for every event already queued. Returns how many were
    /// delivered to a handler.
    pub fn dispatch_pending(&mut self) -> usize {
        let mut delivered = 0;
        while let Ok(frame) = self.inbound.try_recv() {
            if self.dispatch(frame) {
                delivered += 1;
            }
        }
        delivered
    }

    /// Wait for the next inbound event and run its handler. Returns `false`
    /// once the channel is closed.
    pub async fn dispatch_next(&mut self) -> bool {
        match self.inbound.recv().await {
            Some(frame) => {
                self.dispatch(frame);
                true
            }
            None => false,
        }
    }

    fn dispatch(&mut self, frame: Frame) -> bool {
        match self.handlers.get_mut(&frame.event) {
            Some(handler) => {
                handler(frame.payload.as_ref());
                true
            }
            None => false,
        }
    }

    /// Drop handlers and queued events, then stop the driver. Idempotent.
    pub fn close(&mut self) {
        if self.commands.take().is_none() {
            return;
        }
        self.handlers.clear();
        self.inbound.close();
        while self.inbound.try_recv().is_ok() {}
        // Dropping the command sender is what stops the driver: it closes the
        // link and returns.
        debug!(endpoint = %self.endpoint.name, "channel closed");
    }

    fn command(&self, command: Command) -> bool {
        match &self.commands {
            Some(tx) => tx.send(command).is_ok(),
            None => false,
        }
    }
}

impl Drop for SessionChannel {
    fn drop(&mut self) {
        self.close();
    }
}
