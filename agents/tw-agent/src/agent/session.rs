//! Agent Session
//!
//! The single connection session owned by an agent process, and the state
//! machine that tracks it: `Unconnected -> Connected -> Terminated`, with
//! `Terminated` reachable from either live state and never left again.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::sync::Arc;

use crate::agent::error::{AgentError, FailureKind};
use crate::connection::endpoint::Endpoint;
use crate::connection::transport::{Connection, Credential};

/// Why a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationReason {
    /// Stopped on request, not a failure
    Stopped,
    /// Ended by a failure of the given class
    Failed(FailureKind),
}

impl std::fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TerminationReason::Stopped => write!(f, "Stopped"),
            TerminationReason::Failed(kind) => write!(f, "{}", kind),
        }
    }
}

/// Represents the possible states of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No connection has been made yet
    Unconnected,
    /// The connection is open and kept alive
    Connected,
    /// The session is over
    Terminated(TerminationReason),
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Unconnected => write!(f, "Unconnected"),
            SessionState::Connected => write!(f, "Connected"),
            SessionState::Terminated(reason) => write!(f, "Terminated({})", reason),
        }
    }
}

/// State transition information
#[derive(Debug, Clone)]
pub struct StateTransition {
    pub from: SessionState,
    pub to: SessionState,
    pub timestamp: DateTime<Utc>,
    pub reason: Option<String>,
}

struct SessionStateInner {
    current: SessionState,
    connected_at: Option<DateTime<Utc>>,
    connect_attempts: u32,
    transitions: Vec<StateTransition>,
}

/// Thread-safe view of the session state.
///
/// Cloning yields another handle onto the same state, so the state can be
/// observed while the session itself is owned by the supervisor.
#[derive(Clone)]
pub struct SessionStateManager {
    inner: Arc<RwLock<SessionStateInner>>,
}

impl SessionStateManager {
    /// Create a new state manager starting in Unconnected state
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(SessionStateInner {
                current: SessionState::Unconnected,
                connected_at: None,
                connect_attempts: 0,
                transitions: Vec::new(),
            })),
        }
    }

    /// Get the current state
    pub fn current_state(&self) -> SessionState {
        self.inner.read().current
    }

    /// When the session became connected
    pub fn connected_at(&self) -> Option<DateTime<Utc>> {
        self.inner.read().connected_at
    }

    /// Number of connection attempts made
    pub fn connect_attempts(&self) -> u32 {
        self.inner.read().connect_attempts
    }

    /// Record that a connection attempt is starting
    pub fn record_attempt(&self) {
        self.inner.write().connect_attempts += 1;
    }

    /// Transition to a new state. Returns false if the transition is not allowed.
    fn transition_to(&self, new_state: SessionState, reason: Option<String>) -> bool {
        let mut inner = self.inner.write();

        if !is_valid_transition(inner.current, new_state) {
            tracing::warn!(from = %inner.current, to = %new_state, "Rejected session state transition");
            return false;
        }

        let old_state = inner.current;
        inner.current = new_state;
        if new_state == SessionState::Connected {
            inner.connected_at = Some(Utc::now());
        }

        inner.transitions.push(StateTransition {
            from: old_state,
            to: new_state,
            timestamp: Utc::now(),
            reason,
        });

        tracing::debug!(from = %old_state, to = %new_state, "Session state transition");

        true
    }

    /// Get the recorded state transitions, oldest first
    pub fn transitions(&self) -> Vec<StateTransition> {
        self.inner.read().transitions.clone()
    }

    pub fn is_connected(&self) -> bool {
        self.current_state() == SessionState::Connected
    }

    /// The termination reason, once the session has ended
    pub fn termination(&self) -> Option<TerminationReason> {
        match self.current_state() {
            SessionState::Terminated(reason) => Some(reason),
            _ => None,
        }
    }
}

impl Default for SessionStateManager {
    fn default() -> Self {
        Self::new()
    }
}

fn is_valid_transition(from: SessionState, to: SessionState) -> bool {
    matches!(
        (from, to),
        (SessionState::Unconnected, SessionState::Connected)
            | (SessionState::Unconnected, SessionState::Terminated(_))
            | (SessionState::Connected, SessionState::Terminated(_))
    )
}

/// The run-scoped session of an agent process.
///
/// Holds a live connection exactly while the state is `Connected`.
pub struct AgentSession {
    connection_id: String,
    credential: Credential,
    base_url: String,
    endpoint: Option<Endpoint>,
    connection: Option<Connection>,
    state: SessionStateManager,
}

impl AgentSession {
    pub fn new(
        connection_id: impl Into<String>,
        credential: Credential,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            connection_id: connection_id.into(),
            credential,
            base_url: base_url.into(),
            endpoint: None,
            connection: None,
            state: SessionStateManager::new(),
        }
    }

    pub fn connection_id(&self) -> &str {
        &self.connection_id
    }

    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The resolved connection URL, once connected
    pub fn endpoint(&self) -> Option<&Endpoint> {
        self.endpoint.as_ref()
    }

    pub fn current_state(&self) -> SessionState {
        self.state.current_state()
    }

    /// A handle for observing this session's state
    pub fn state_handle(&self) -> SessionStateManager {
        self.state.clone()
    }

    pub fn has_connection(&self) -> bool {
        self.connection.is_some()
    }

    /// The live connection, while connected
    pub fn connection_mut(&mut self) -> Option<&mut Connection> {
        self.connection.as_mut()
    }

    /// Take ownership of a freshly opened connection and become `Connected`.
    ///
    /// Only valid from `Unconnected`: a session connects at most once.
    pub fn attach(&mut self, endpoint: Endpoint, connection: Connection) -> Result<(), AgentError> {
        if !self
            .state
            .transition_to(SessionState::Connected, Some(format!("Connected to {}", endpoint)))
        {
            return Err(AgentError::Fatal(format!(
                "cannot connect a session in state {}",
                self.current_state()
            )));
        }
        self.endpoint = Some(endpoint);
        self.connection = Some(connection);
        Ok(())
    }

    /// End the session, dropping the connection. Later calls have no effect.
    pub fn terminate(&mut self, reason: TerminationReason, detail: Option<String>) {
        if self.state.transition_to(SessionState::Terminated(reason), detail) {
            self.connection = None;
        }
    }
}

impl std::fmt::Debug for AgentSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentSession")
            .field("connection_id", &self.connection_id)
            .field("credential", &self.credential)
            .field("base_url", &self.base_url)
            .field("state", &self.current_state())
            .finish()
    }
}
