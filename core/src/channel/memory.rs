//! In-process transport. The client half plugs into [`SessionChannel`]s, the
//! server half lets tests and the offline demo play the remote side.
//!
//! [`SessionChannel`]: super::SessionChannel

use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

use super::transport::Endpoint;
use super::transport::Frame;
use super::transport::Transport;
use super::transport::TransportError;
use super::transport::TransportLink;

#[derive(Default)]
struct Hub {
    refused: HashSet<String>,
    attempts: HashMap<String, usize>,
}

#[derive(Clone)]
pub struct MemoryTransport {
    hub: Arc<Mutex<Hub>>,
    incoming: mpsc::UnboundedSender<MemoryConnection>,
}

pub struct MemoryServer {
    hub: Arc<Mutex<Hub>>,
    incoming: mpsc::UnboundedReceiver<MemoryConnection>,
}

impl MemoryTransport {
    pub fn pair() -> (MemoryTransport, MemoryServer) {
        let hub = Arc::new(Mutex::new(Hub::default()));
        let (tx, rx) = mpsc::unbounded_channel();
        (
            MemoryTransport {
                hub: Arc::clone(&hub),
                incoming: tx,
            },
            MemoryServer { hub, incoming: rx },
        )
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn connect(&self, endpoint: &Endpoint) -> Result<Box<dyn TransportLink>, TransportError> {
        {
            let mut hub = self.hub.lock().map_err(|_| TransportError::Poisoned)?;
            *hub.attempts.entry(endpoint.name.clone()).or_default() += 1;
            if hub.refused.contains(&endpoint.name) {
                return Err(TransportError::Refused(endpoint.name.clone()));
            }
        }

        let (to_server, from_client) = mpsc::unbounded_channel();
        let (to_client, from_server) = mpsc::unbounded_channel();
        let connection = MemoryConnection {
            endpoint: endpoint.clone(),
            outbound: to_client,
            inbound: from_client,
        };
        self.incoming
            .send(connection)
            .map_err(|_| TransportError::Refused(endpoint.name.clone()))?;

        Ok(Box::new(MemoryLink {
            outbound: Some(to_server),
            inbound: from_server,
        }))
    }
}

impl MemoryServer {
    /// Next connection opened by a client. `None` once every transport
    /// handle is gone.
    pub async fn accept(&mut self) -> Option<MemoryConnection> {
        self.incoming.recv().await
    }

    pub fn try_accept(&mut self) -> Option<MemoryConnection> {
        self.incoming.try_recv().ok()
    }

    /// Refuse future connections to the endpoint called `name`.
    pub fn refuse(&self, name: &str) {
        if let Ok(mut hub) = self.hub.lock() {
            hub.refused.insert(name.to_string());
        }
    }

    pub fn allow(&self, name: &str) {
        if let Ok(mut hub) = self.hub.lock() {
            hub.refused.remove(name);
        }
    }

    /// Connect attempts seen for `name`, refused ones included.
    pub fn connect_attempts(&self, name: &str) -> usize {
        self.hub
            .lock()
            .ok()
            .and_then(|hub| hub.attempts.get(name).copied())
            .unwrap_or(0)
    }
}

/// Server side of one client link. Dropping it drops the link.
pub struct MemoryConnection {
    endpoint: Endpoint,
    outbound: mpsc::UnboundedSender<Frame>,
    inbound: mpsc::UnboundedReceiver<Frame>,
}

impl MemoryConnection {
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Push an event to the client. `false` when the client has gone.
    pub fn emit(&self, event: &str, payload: Option<Value>) -> bool {
        self.outbound.send(Frame::new(event, payload)).is_ok()
    }

    /// Next frame sent by the client, `None` once the client closed.
    pub async fn recv(&mut self) -> Option<Frame> {
        self.inbound.recv().await
    }

    pub fn try_recv(&mut self) -> Option<Frame> {
        self.inbound.try_recv().ok()
    }

    pub fn is_closed(&self) -> bool {
        self.outbound.is_closed()
    }
}

struct MemoryLink {
    outbound: Option<mpsc::UnboundedSender<Frame>>,
    inbound: mpsc::UnboundedReceiver<Frame>,
}

#[async_trait]
impl TransportLink for MemoryLink {
    async fn send(&mut self, frame: Frame) -> Result<(), TransportError> {
        match &self.outbound {
            Some(tx) => tx.send(frame).map_err(|_| TransportError::Closed),
            None => Err(TransportError::Closed),
        }
    }

    async fn recv(&mut self) -> Option<Result<Frame, TransportError>> {
        self.inbound.recv().await.map(Ok)
    }

    async fn close(&mut self) {
        self.outbound.take();
        self.inbound.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[tokio::test]
    async fn refused_endpoints_count_attempts() {
        let (transport, server) = MemoryTransport::pair();
        server.refuse("CONSOLE");
        let endpoint = Endpoint::new("CONSOLE", "memory://console");

        let result = transport.connect(&endpoint).await.err();
        assert_matches!(result, Some(TransportError::Refused(name)) if name == "CONSOLE");
        assert_eq!(server.connect_attempts("CONSOLE"), 1);
        assert_eq!(server.connect_attempts("SERVER"), 0);
    }

    #[tokio::test]
    async fn frames_flow_both_ways() {
        let (transport, mut server) = MemoryTransport::pair();
        let endpoint = Endpoint::new("SERVER", "memory://server");
        let mut link = match transport.connect(&endpoint).await {
            Ok(link) => link,
            Err(err) => panic!("connect failed: {err}"),
        };
        let Some(mut conn) = server.try_accept() else {
            panic!("connection not queued");
        };
        assert_eq!(conn.endpoint().name, "SERVER");

        assert!(link.send(Frame::new("stop", None)).await.is_ok());
        assert_eq!(conn.recv().await, Some(Frame::new("stop", None)));

        assert!(conn.emit("message", Some(json!("ready"))));
        assert_matches!(link.recv().await, Some(Ok(frame)) if frame.event == "message");

        link.close().await;
        assert_eq!(conn.recv().await, None);
        assert!(conn.is_closed());
    }
}
