//! WebSocket Connector
//!
//! Opens the agent connection with an HTTP upgrade handshake carrying the
//! bearer credential, and classifies handshake failures.

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::{HeaderValue, AUTHORIZATION};
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info};

use crate::agent::error::AgentError;
use crate::connection::endpoint::Endpoint;
use crate::connection::protocol::AgentMessage;
use crate::connection::transport::{
    Connection, Connector, Credential, Inbound, MessageSink, MessageSource,
};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Connector for the server's websocket endpoint
#[derive(Debug, Clone)]
pub struct WebSocketConnector {
    connect_timeout: Duration,
}

impl WebSocketConnector {
    /// Create a connector that gives up on a handshake after `connect_timeout`
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

impl Default for WebSocketConnector {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

#[async_trait]
impl Connector for WebSocketConnector {
    async fn connect(
        &self,
        endpoint: &Endpoint,
        credential: &Credential,
    ) -> Result<Connection, AgentError> {
        let ws_url = endpoint.websocket_url()?;

        let mut request = ws_url
            .as_str()
            .into_client_request()
            .map_err(|e| classify_error(endpoint, e))?;
        let auth = HeaderValue::from_str(&credential.bearer()).map_err(|_| {
            AgentError::Fatal("access token contains characters not allowed in a header".to_string())
        })?;
        request.headers_mut().insert(AUTHORIZATION, auth);

        info!(url = %endpoint, "Connecting to Tower");

        let (ws_stream, response) = timeout(self.connect_timeout, connect_async(request))
            .await
            .map_err(|_| {
                AgentError::ConnectionRejected(format!(
                    "no response from {} within {:?}",
                    endpoint, self.connect_timeout
                ))
            })?
            .map_err(|e| classify_error(endpoint, e))?;

        debug!(status = %response.status(), "Handshake completed");

        let (write, read) = ws_stream.split();
        Ok(Connection::new(
            Box::new(WebSocketSink { write }),
            Box::new(WebSocketSource { read }),
        ))
    }
}

/// Map a handshake error onto the agent failure taxonomy
fn classify_error(endpoint: &Endpoint, error: WsError) -> AgentError {
    match error {
        WsError::Url(e) => AgentError::invalid_endpoint(endpoint.as_str(), e.to_string()),
        WsError::Http(response) => {
            AgentError::ConnectionRejected(format!("HTTP error: {}", response.status()))
        }
        e @ (WsError::Io(_)
        | WsError::Tls(_)
        | WsError::Protocol(_)
        | WsError::HttpFormat(_)
        | WsError::ConnectionClosed
        | WsError::AlreadyClosed) => AgentError::ConnectionRejected(e.to_string()),
        other => AgentError::Fatal(other.to_string()),
    }
}

struct WebSocketSink {
    write: SplitSink<WsStream, Message>,
}

#[async_trait]
impl MessageSink for WebSocketSink {
    async fn send(&mut self, message: &AgentMessage) -> Result<(), AgentError> {
        let json = message
            .to_json()
            .map_err(|e| AgentError::Fatal(format!("failed to encode message: {}", e)))?;
        self.write
            .send(Message::Text(json.into()))
            .await
            .map_err(|e| AgentError::ConnectionLost(e.to_string()))
    }

    async fn close(&mut self) -> Result<(), AgentError> {
        self.write
            .close()
            .await
            .map_err(|e| AgentError::ConnectionLost(e.to_string()))
    }
}

struct WebSocketSource {
    read: SplitStream<WsStream>,
}

#[async_trait]
impl MessageSource for WebSocketSource {
    async fn next(&mut self) -> Inbound {
        loop {
            match self.read.next().await {
                Some(Ok(Message::Text(text))) => return Inbound::Message(text.to_string()),
                Some(Ok(Message::Close(frame))) => {
                    let reason = match frame {
                        Some(frame) => format!(
                            "server closed connection ({}): {}",
                            frame.code, frame.reason
                        ),
                        None => "server closed connection".to_string(),
                    };
                    return Inbound::Closed(Some(reason));
                }
                // Pongs are queued by tungstenite and flushed on the next read.
                Some(Ok(Message::Ping(_))) => debug!("Received ping"),
                Some(Ok(Message::Pong(_))) => debug!("Received pong"),
                Some(Ok(Message::Binary(_))) => debug!("Received binary message (ignored)"),
                Some(Ok(Message::Frame(_))) => {}
                Some(Err(e)) => return Inbound::Closed(Some(format!("WebSocket error: {}", e))),
                None => return Inbound::Closed(Some("stream ended".to_string())),
            }
        }
    }
}
