//! Tower Agent Library
//!
//! This crate provides the core of the Tower agent: resolving the agent
//! endpoint, opening the authenticated websocket connection, and keeping it
//! alive with periodic heartbeats until the process is stopped.

pub mod agent;
pub mod cli;
pub mod connection;

// Re-exports for convenience
pub use agent::error::{AgentError, FailureKind};
pub use agent::session::{AgentSession, SessionState, SessionStateManager, TerminationReason};
pub use agent::supervisor::{supervise, Exit, Supervisor, FAILURE_EXIT_CODE};
pub use cli::config::Config;
pub use connection::endpoint::{resolve_endpoint, Endpoint};
pub use connection::keepalive::KeepaliveScheduler;
pub use connection::protocol::{AgentMessage, ServerMessage};
pub use connection::transport::{Connection, Connector, Credential};
pub use connection::websocket::WebSocketConnector;
