//! Transport Abstraction
//!
//! The seam between the session logic and the wire. A [`Connector`] opens a
//! [`Connection`], which is split into an outbound [`MessageSink`] and an
//! inbound [`MessageSource`] so both directions can be awaited at once.

use async_trait::async_trait;
use std::sync::Arc;

use crate::agent::error::AgentError;
use crate::connection::endpoint::Endpoint;
use crate::connection::protocol::AgentMessage;

/// Secret used to authenticate the connection.
///
/// Has no `Display`, and `Debug` never prints the value.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Value of the `Authorization` header for this credential
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.0)
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

/// Something received from the server
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// A text message
    Message(String),
    /// The connection was closed or failed. Always the last event.
    Closed(Option<String>),
}

/// Outbound half of a connection
#[async_trait]
pub trait MessageSink: Send {
    /// Send one message, failing if the connection is no longer usable
    async fn send(&mut self, message: &AgentMessage) -> Result<(), AgentError>;

    /// Close the connection
    async fn close(&mut self) -> Result<(), AgentError>;
}

/// Inbound half of a connection
#[async_trait]
pub trait MessageSource: Send {
    /// Wait for the next inbound event
    async fn next(&mut self) -> Inbound;
}

/// A live, authenticated connection
pub struct Connection {
    sink: Box<dyn MessageSink>,
    source: Box<dyn MessageSource>,
}

impl Connection {
    pub fn new(sink: Box<dyn MessageSink>, source: Box<dyn MessageSource>) -> Self {
        Self { sink, source }
    }

    /// Borrow both halves at once
    pub fn split_mut(&mut self) -> (&mut dyn MessageSink, &mut dyn MessageSource) {
        (self.sink.as_mut(), self.source.as_mut())
    }

    pub fn sink_mut(&mut self) -> &mut dyn MessageSink {
        self.sink.as_mut()
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection").finish_non_exhaustive()
    }
}

/// Opens connections to the server
#[async_trait]
pub trait Connector: Send + Sync {
    /// Make a single authenticated connection attempt
    async fn connect(
        &self,
        endpoint: &Endpoint,
        credential: &Credential,
    ) -> Result<Connection, AgentError>;
}

#[async_trait]
impl<C: Connector + ?Sized> Connector for Arc<C> {
    async fn connect(
        &self,
        endpoint: &Endpoint,
        credential: &Credential,
    ) -> Result<Connection, AgentError> {
        self.as_ref().connect(endpoint, credential).await
    }
}
