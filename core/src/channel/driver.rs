use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::sync::watch;
use tracing::debug;
use tracing::info;
use tracing::trace;
use tracing::warn;

use super::ChannelOptions;
use super::ConnectionState;
use super::transport::Endpoint;
use super::transport::Frame;
use super::transport::Transport;
use super::transport::TransportError;
use super::transport::TransportLink;

#[derive(Debug)]
pub(crate) enum Command {
    Connect,
    Disconnect,
    Emit(Frame),
    Subscribe(String),
    Unsubscribe(String),
}

enum Control {
    Continue,
    Disconnect,
    Shutdown,
}

enum Attempt {
    Done(Result<Box<dyn TransportLink>, TransportError>),
    Interrupted(Control),
}

enum Established {
    Link(Box<dyn TransportLink>),
    Stopped,
    Shutdown,
}

enum LinkOutcome {
    Lost,
    Disconnected,
    Shutdown,
}

/// Owns the transport link of one channel: connects, retries, forwards
/// outbound frames and filters inbound ones by subscription.
pub(crate) struct Driver {
    pub(crate) endpoint: Endpoint,
    pub(crate) options: ChannelOptions,
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) commands: mpsc::UnboundedReceiver<Command>,
    pub(crate) state: watch::Sender<ConnectionState>,
    pub(crate) inbound: mpsc::UnboundedSender<Frame>,
    pub(crate) subscriptions: HashSet<String>,
}

impl Driver {
    pub(crate) async fn run(mut self) {
        let mut wants_link = self.options.auto_connect;
        let mut immediate = true;
        loop {
            if !wants_link {
                match self.commands.recv().await {
                    None => return,
                    Some(Command::Connect) => {
                        wants_link = true;
                        immediate = true;
                    }
                    Some(command) => self.apply_offline(command),
                }
                continue;
            }

            let link = match self.establish(immediate).await {
                Established::Link(link) => link,
                Established::Stopped => {
                    wants_link = false;
                    continue;
                }
                Established::Shutdown => return,
            };

            match self.serve(link).await {
                LinkOutcome::Lost => {
                    wants_link = self.options.reconnection;
                    immediate = false;
                }
                LinkOutcome::Disconnected => wants_link = false,
                LinkOutcome::Shutdown => return,
            }
        }
    }

    /// One connect pass: an optional immediate attempt, then up to
    /// `reconnection_attempts` delayed retries.
    async fn establish(&mut self, immediate: bool) -> Established {
        self.set_state(ConnectionState::Connecting);
        let retries = if self.options.reconnection {
            self.options.reconnection_attempts
        } else {
            0
        };
        let first = if immediate { 0 } else { 1 };

        for attempt in first..=retries {
            if attempt > 0 {
                match self.wait(self.options.reconnection_delay).await {
                    Control::Continue => {}
                    Control::Disconnect => {
                        self.set_state(ConnectionState::Disconnected);
                        return Established::Stopped;
                    }
                    Control::Shutdown => return Established::Shutdown,
                }
            }
            match self.attempt().await {
                Attempt::Done(Ok(link)) => {
                    info!(endpoint = %self.endpoint.name, attempt, "connected");
                    self.set_state(ConnectionState::Connected);
                    return Established::Link(link);
                }
                Attempt::Done(Err(err)) => {
                    warn!(endpoint = %self.endpoint.name, attempt, "connect failed: {err}");
                }
                Attempt::Interrupted(Control::Shutdown) => return Established::Shutdown,
                Attempt::Interrupted(_) => {
                    self.set_state(ConnectionState::Disconnected);
                    return Established::Stopped;
                }
            }
        }

        warn!(
            endpoint = %self.endpoint.name,
            retries, "reconnection attempts exhausted"
        );
        self.set_state(ConnectionState::Disconnected);
        Established::Stopped
    }

    async fn attempt(&mut self) -> Attempt {
        let transport = Arc::clone(&self.transport);
        let endpoint = self.endpoint.clone();
        let connect = async move { transport.connect(&endpoint).await };
        tokio::pin!(connect);
        loop {
            tokio::select! {
                biased;
                command = self.commands.recv() => match self.control(command) {
                    Control::Continue => {}
                    other => return Attempt::Interrupted(other),
                },
                result = &mut connect => return Attempt::Done(result),
            }
        }
    }

    async fn wait(&mut self, delay: Duration) -> Control {
        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);
        loop {
            tokio::select! {
                biased;
                command = self.commands.recv() => match self.control(command) {
                    Control::Continue => {}
                    other => return other,
                },
                _ = &mut sleep => return Control::Continue,
            }
        }
    }

    async fn serve(&mut self, mut link: Box<dyn TransportLink>) -> LinkOutcome {
        loop {
            tokio::select! {
                biased;
                command = self.commands.recv() => match command {
                    None => {
                        link.close().await;
                        return LinkOutcome::Shutdown;
                    }
                    Some(Command::Emit(frame)) => {
                        if let Err(err) = link.send(frame).await {
                            warn!(endpoint = %self.endpoint.name, "send failed: {err}");
                            self.set_state(ConnectionState::Disconnected);
                            return LinkOutcome::Lost;
                        }
                    }
                    Some(Command::Disconnect) => {
                        link.close().await;
                        info!(endpoint = %self.endpoint.name, "disconnected by owner");
                        self.set_state(ConnectionState::Disconnected);
                        return LinkOutcome::Disconnected;
                    }
                    Some(Command::Connect) => {}
                    Some(command) => self.apply_offline(command),
                },
                frame = link.recv() => match frame {
                    Some(Ok(frame)) => self.deliver(frame),
                    Some(Err(err)) => {
                        warn!(endpoint = %self.endpoint.name, "link failed: {err}");
                        self.set_state(ConnectionState::Disconnected);
                        return LinkOutcome::Lost;
                    }
                    None => {
                        info!(endpoint = %self.endpoint.name, "link lost");
                        self.set_state(ConnectionState::Disconnected);
                        return LinkOutcome::Lost;
                    }
                },
            }
        }
    }

    /// Commands that arrive while there is no link.
    fn control(&mut self, command: Option<Command>) -> Control {
        match command {
            None => Control::Shutdown,
            Some(Command::Disconnect) => Control::Disconnect,
            Some(command) => {
                self.apply_offline(command);
                Control::Continue
            }
        }
    }

    fn apply_offline(&mut self, command: Command) {
        match command {
            Command::Subscribe(name) => {
                debug!(endpoint = %self.endpoint.name, event = %name, "subscribe");
                self.subscriptions.insert(name);
            }
            Command::Unsubscribe(name) => {
                debug!(endpoint = %self.endpoint.name, event = %name, "unsubscribe");
                self.subscriptions.remove(&name);
            }
            Command::Emit(frame) => {
                trace!(endpoint = %self.endpoint.name, event = %frame.event, "dropping send while offline");
            }
            Command::Connect | Command::Disconnect => {}
        }
    }

    fn deliver(&self, frame: Frame) {
        if !self.subscriptions.contains(&frame.event) {
            trace!(endpoint = %self.endpoint.name, event = %frame.event, "no subscriber");
            return;
        }
        if self.inbound.send(frame).is_err() {
            trace!(endpoint = %self.endpoint.name, "inbound queue closed");
        }
    }

    fn set_state(&self, next: ConnectionState) {
        self.state.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }
}
