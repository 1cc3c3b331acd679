use async_trait::async_trait;
use futures::SinkExt;
use futures::StreamExt;
use tokio::net::TcpStream;
use tokio_tungstenite::MaybeTlsStream;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::debug;
use tracing::warn;
use url::Url;

use super::transport::Endpoint;
use super::transport::Frame;
use super::transport::Transport;
use super::transport::TransportError;
use super::transport::TransportLink;

/// JSON frames over WebSocket text messages. The endpoint URL is used as is.
#[derive(Debug, Clone, Default)]
pub struct WebSocketTransport;

impl WebSocketTransport {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn connect(&self, endpoint: &Endpoint) -> Result<Box<dyn TransportLink>, TransportError> {
        let url = Url::parse(&endpoint.url).map_err(|source| TransportError::InvalidUrl {
            url: endpoint.url.clone(),
            source,
        })?;
        let (stream, response) = connect_async(url.as_str()).await?;
        debug!(endpoint = %endpoint.name, status = %response.status(), "websocket handshake done");
        Ok(Box::new(WebSocketLink {
            name: endpoint.name.clone(),
            stream,
        }))
    }
}

struct WebSocketLink {
    name: String,
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl TransportLink for WebSocketLink {
    async fn send(&mut self, frame: Frame) -> Result<(), TransportError> {
        let text = serde_json::to_string(&frame)?;
        self.stream.send(Message::Text(text)).await?;
        Ok(())
    }

    async fn recv(&mut self) -> Option<Result<Frame, TransportError>> {
        loop {
            let message = match self.stream.next().await? {
                Ok(message) => message,
                Err(err) => return Some(Err(err.into())),
            };
            match message {
                Message::Text(text) => match serde_json::from_str::<Frame>(&text) {
                    Ok(frame) => return Some(Ok(frame)),
                    Err(err) => {
                        warn!(endpoint = %self.name, "skipping undecodable frame: {err}");
                    }
                },
                Message::Ping(_) => {
                    // tungstenite queues the pong while reading; flush it out.
                    if let Err(err) = self.stream.flush().await {
                        return Some(Err(err.into()));
                    }
                }
                Message::Close(reason) => {
                    debug!(endpoint = %self.name, ?reason, "peer closed");
                    return None;
                }
                Message::Binary(_) | Message::Pong(_) | Message::Frame(_) => {}
            }
        }
    }

    async fn close(&mut self) {
        if let Err(err) = self.stream.close(None).await {
            debug!(endpoint = %self.name, "close handshake failed: {err}");
        }
    }
}
