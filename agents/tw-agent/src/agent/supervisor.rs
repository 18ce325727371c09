//! Process Supervisor
//!
//! Runs a session from endpoint resolution through connection to keepalive,
//! and decides how the process ends. This is the only place that exits the
//! process.

use std::future::Future;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::agent::error::AgentError;
use crate::agent::session::{AgentSession, TerminationReason};
use crate::connection::endpoint::resolve_endpoint;
use crate::connection::keepalive::KeepaliveScheduler;
use crate::connection::transport::Connector;

/// Exit status for any session failure
pub const FAILURE_EXIT_CODE: i32 = 255;

/// How a supervised session ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Exit {
    /// Stopped on request
    Stopped,
    /// Ended by a failure
    Failed(AgentError),
}

impl Exit {
    /// Process exit status for this outcome
    pub fn code(&self) -> i32 {
        match self {
            Exit::Stopped => 0,
            Exit::Failed(_) => FAILURE_EXIT_CODE,
        }
    }

    /// Exit the process with this outcome's status
    pub fn terminate(self) -> ! {
        std::process::exit(self.code())
    }
}

/// Sequences resolve -> connect -> keepalive for one session
pub struct Supervisor<C: Connector> {
    connector: C,
    keepalive: KeepaliveScheduler,
}

impl<C: Connector> Supervisor<C> {
    pub fn new(connector: C, heartbeat_interval: Duration) -> Self {
        Self {
            connector,
            keepalive: KeepaliveScheduler::new(heartbeat_interval),
        }
    }

    /// Run `session` until `shutdown` resolves or the session fails.
    ///
    /// Always leaves the session `Terminated` and logs one line describing
    /// the outcome.
    pub async fn run<F>(&self, session: &mut AgentSession, shutdown: F) -> Exit
    where
        F: Future<Output = ()>,
    {
        match self.drive(session, shutdown).await {
            Ok(()) => {
                session.terminate(TerminationReason::Stopped, None);
                info!("Agent stopped");
                Exit::Stopped
            }
            Err(e) => {
                session.terminate(TerminationReason::Failed(e.kind()), Some(e.to_string()));
                error!(failure = %e.kind(), "{}", e);
                Exit::Failed(e)
            }
        }
    }

    async fn drive<F>(&self, session: &mut AgentSession, shutdown: F) -> Result<(), AgentError>
    where
        F: Future<Output = ()>,
    {
        let endpoint = resolve_endpoint(session.base_url(), session.connection_id())?;

        session.state_handle().record_attempt();
        let connection = self
            .connector
            .connect(&endpoint, session.credential())
            .await?;
        session.attach(endpoint, connection)?;
        info!("Connected");

        let connection = session
            .connection_mut()
            .ok_or_else(|| AgentError::Fatal("connected session has no connection".to_string()))?;
        self.keepalive.run(connection, shutdown).await?;

        if let Err(e) = connection.sink_mut().close().await {
            warn!(error = %e, "Failed to close connection cleanly");
        }
        Ok(())
    }
}

/// Run a session on its own task so that a panic anywhere inside it still
/// ends as a failure instead of a hang.
pub async fn supervise<C, F>(supervisor: Supervisor<C>, mut session: AgentSession, shutdown: F) -> Exit
where
    C: Connector + 'static,
    F: Future<Output = ()> + Send + 'static,
{
    let task = tokio::spawn(async move { supervisor.run(&mut session, shutdown).await });

    match task.await {
        Ok(exit) => exit,
        Err(e) => {
            let e = AgentError::Fatal(format!("agent task failed: {}", e));
            error!(failure = %e.kind(), "{}", e);
            Exit::Failed(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::error::FailureKind;
    use crate::agent::session::SessionState;
    use crate::connection::endpoint::Endpoint;
    use crate::connection::protocol::AgentMessage;
    use crate::connection::transport::mock::{MockConnector, MockWire};
    use crate::connection::transport::{Connection, Credential, Inbound};
    use async_trait::async_trait;
    use std::sync::Arc;
    use tokio::time::sleep;

    const MINUTE: Duration = Duration::from_secs(60);

    fn session(connection_id: &str) -> AgentSession {
        AgentSession::new(connection_id, Credential::new("token"), "https://api.tower.nf")
    }

    #[tokio::test(start_paused = true)]
    async fn test_connected_session_sends_heartbeats() {
        let wire = MockWire::new();
        let connector = Arc::new(MockConnector::accepting(wire.clone()));
        let supervisor = Supervisor::new(connector.clone(), MINUTE);
        let mut session = session("abc123");
        let state = session.state_handle();

        let task = tokio::spawn(async move {
            let exit = supervisor.run(&mut session, std::future::pending()).await;
            (exit, session)
        });

        sleep(MINUTE + Duration::from_secs(1)).await;
        assert_eq!(state.current_state(), SessionState::Connected);
        assert_eq!(wire.sent(), vec![AgentMessage::Heartbeat]);

        sleep(MINUTE * 2).await;
        assert_eq!(state.current_state(), SessionState::Connected);
        assert_eq!(wire.sent().len(), 3);
        assert_eq!(connector.attempts(), 1);
        assert_eq!(state.connect_attempts(), 1);

        task.abort();
    }

    #[tokio::test]
    async fn test_rejected_handshake_fails() {
        let rejection = AgentError::ConnectionRejected("HTTP error: 401 Unauthorized".to_string());
        let connector = Arc::new(MockConnector::failing(rejection.clone()));
        let supervisor = Supervisor::new(connector.clone(), MINUTE);
        let mut session = session("abc123");

        let exit = supervisor.run(&mut session, std::future::pending()).await;

        assert_eq!(exit, Exit::Failed(rejection));
        assert_ne!(exit.code(), 0);
        assert_eq!(
            session.current_state(),
            SessionState::Terminated(TerminationReason::Failed(FailureKind::ConnectionRejected))
        );
        assert_eq!(connector.attempts(), 1);
    }

    #[tokio::test]
    async fn test_invalid_endpoint_never_connects() {
        let connector = Arc::new(MockConnector::accepting(MockWire::new()));
        let supervisor = Supervisor::new(connector.clone(), MINUTE);
        let mut session = session("abc 123");

        let exit = supervisor.run(&mut session, std::future::pending()).await;

        assert!(matches!(exit, Exit::Failed(AgentError::InvalidEndpoint { .. })));
        assert_eq!(exit.code(), FAILURE_EXIT_CODE);
        assert_eq!(connector.attempts(), 0);
        assert_eq!(
            session.current_state(),
            SessionState::Terminated(TerminationReason::Failed(FailureKind::InvalidEndpoint))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_heartbeat_terminates_session() {
        let wire = MockWire::new();
        wire.fail_on_attempt(2);
        let supervisor = Supervisor::new(MockConnector::accepting(wire.clone()), MINUTE);
        let mut session = session("abc123");

        let exit = supervisor.run(&mut session, std::future::pending()).await;

        assert!(matches!(exit, Exit::Failed(AgentError::ConnectionLost(_))));
        assert_eq!(
            session.current_state(),
            SessionState::Terminated(TerminationReason::Failed(FailureKind::ConnectionLost))
        );
        assert!(!session.has_connection());
        assert_eq!(wire.sent().len(), 1);

        sleep(MINUTE * 5).await;
        assert_eq!(wire.send_attempts(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_server_close_terminates_session() {
        let wire = MockWire::new();
        let supervisor = Supervisor::new(MockConnector::accepting(wire.clone()), MINUTE);
        let mut session = session("abc123");
        let state = session.state_handle();

        let task = tokio::spawn(async move {
            supervisor.run(&mut session, std::future::pending()).await
        });

        sleep(Duration::from_secs(90)).await;
        assert!(state.is_connected());
        wire.push_inbound(Inbound::Closed(Some("server closed connection".to_string())));

        let exit = task.await.unwrap();
        assert_eq!(
            exit,
            Exit::Failed(AgentError::ConnectionLost("server closed connection".to_string()))
        );
        assert_eq!(
            state.termination(),
            Some(TerminationReason::Failed(FailureKind::ConnectionLost))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_cleanly() {
        let wire = MockWire::new();
        let supervisor = Supervisor::new(MockConnector::accepting(wire.clone()), MINUTE);
        let mut session = session("abc123");

        let exit = supervisor
            .run(&mut session, sleep(MINUTE * 2 + Duration::from_secs(30)))
            .await;

        assert_eq!(exit, Exit::Stopped);
        assert_eq!(exit.code(), 0);
        assert_eq!(wire.sent().len(), 2);
        assert!(wire.closed_by_agent());
        assert_eq!(
            session.current_state(),
            SessionState::Terminated(TerminationReason::Stopped)
        );
    }

    struct PanickingConnector;

    #[async_trait]
    impl Connector for PanickingConnector {
        async fn connect(
            &self,
            _endpoint: &Endpoint,
            _credential: &Credential,
        ) -> Result<Connection, AgentError> {
            panic!("connector blew up")
        }
    }

    #[tokio::test]
    async fn test_panic_becomes_fatal_exit() {
        let supervisor = Supervisor::new(PanickingConnector, MINUTE);

        let exit = supervise(supervisor, session("abc123"), std::future::pending()).await;

        assert!(matches!(exit, Exit::Failed(AgentError::Fatal(_))));
        assert_eq!(exit.code(), FAILURE_EXIT_CODE);
    }

    #[tokio::test(start_paused = true)]
    async fn test_supervise_returns_session_outcome() {
        let wire = MockWire::new();
        let supervisor = Supervisor::new(MockConnector::accepting(wire.clone()), MINUTE);

        let exit = supervise(supervisor, session("abc123"), sleep(MINUTE * 3 + Duration::from_secs(1))).await;

        assert_eq!(exit, Exit::Stopped);
        assert_eq!(wire.sent().len(), 3);
    }
}
