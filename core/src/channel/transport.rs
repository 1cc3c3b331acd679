use async_trait::async_trait;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// A named remote endpoint, e.g. `SERVER` at `ws://host:8080/server`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    pub name: String,
    pub url: String,
}

impl Endpoint {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }
}

/// Wire unit: one named event with an optional JSON payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub event: String,
    #[serde(rename = "data", default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

impl Frame {
    pub fn new(event: impl Into<String>, payload: Option<Value>) -> Self {
        Self {
            event: event.into(),
            payload,
        }
    }
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("{0} refused the connection")]
    Refused(String),
    #[error("invalid endpoint url `{url}`: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("link closed")]
    Closed,
    #[error("transport state poisoned")]
    Poisoned,
}

/// Opens links to endpoints. One transport serves every channel of a session.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn connect(&self, endpoint: &Endpoint) -> Result<Box<dyn TransportLink>, TransportError>;
}

/// An established bidirectional link.
#[async_trait]
pub trait TransportLink: Send {
    async fn send(&mut self, frame: Frame) -> Result<(), TransportError>;

    /// Next inbound frame. `None` once the peer has gone away.
    async fn recv(&mut self) -> Option<Result<Frame, TransportError>>;

    async fn close(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn frame_uses_data_key_on_the_wire() {
        let frame = Frame::new("write", Some(json!("say hi")));
        let encoded = serde_json::to_value(&frame).ok();
        assert_eq!(encoded, Some(json!({"event": "write", "data": "say hi"})));

        let bare = Frame::new("stop", None);
        let encoded = serde_json::to_string(&bare).ok();
        assert_eq!(encoded.as_deref(), Some(r#"{"event":"stop"}"#));
    }

    #[test]
    fn frame_without_data_decodes() {
        let frame: Result<Frame, _> = serde_json::from_str(r#"{"event":"exit"}"#);
        assert_eq!(frame.ok(), Some(Frame::new("exit", None)));
    }
}
