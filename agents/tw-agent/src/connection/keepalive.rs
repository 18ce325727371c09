//! Keepalive Scheduler
//!
//! Sends a heartbeat over the live connection on a fixed period so that the
//! server, proxies and load balancers never see the connection as idle.

use std::future::Future;
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::agent::error::AgentError;
use crate::connection::protocol::{AgentMessage, ServerMessage};
use crate::connection::transport::{Connection, Inbound};

/// Heartbeat period used by the server
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(60);

/// Periodic heartbeat emitter for a connected session
#[derive(Debug, Clone)]
pub struct KeepaliveScheduler {
    period: Duration,
}

impl KeepaliveScheduler {
    pub fn new(period: Duration) -> Self {
        Self { period }
    }

    /// Keep `connection` alive until `shutdown` resolves or the connection
    /// becomes unusable.
    ///
    /// The first heartbeat goes out one period after the call. Heartbeats are
    /// sent one at a time, in tick order. A failed send or a closed connection
    /// ends the loop with [`AgentError::ConnectionLost`] and no further tick
    /// fires. A zero period, or one too large to schedule, fails with
    /// [`AgentError::Fatal`] before anything is sent. Returns the number of
    /// heartbeats sent on a normal stop.
    pub async fn run<F>(&self, connection: &mut Connection, shutdown: F) -> Result<u64, AgentError>
    where
        F: Future<Output = ()>,
    {
        if self.period.is_zero() {
            return Err(AgentError::Fatal("heartbeat interval must be non-zero".to_string()));
        }
        let first_tick = Instant::now().checked_add(self.period).ok_or_else(|| {
            AgentError::Fatal(format!(
                "heartbeat interval of {}s is too large to schedule",
                self.period.as_secs()
            ))
        })?;

        let (sink, source) = connection.split_mut();

        let mut ticker = interval_at(first_tick, self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tokio::pin!(shutdown);
        let mut sent: u64 = 0;

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    debug!(heartbeats = sent, "Keepalive stopped");
                    return Ok(sent);
                }

                _ = ticker.tick() => {
                    info!("Sending heartbeat");
                    sink.send(&AgentMessage::heartbeat()).await?;
                    sent += 1;
                    debug!(heartbeats = sent, "Heartbeat sent");
                }

                inbound = source.next() => match inbound {
                    Inbound::Message(text) => match ServerMessage::from_json(&text) {
                        Ok(message) => debug!(?message, "Received message from Tower"),
                        Err(e) => debug!(error = %e, "Ignoring unrecognised message"),
                    },
                    Inbound::Closed(reason) => {
                        let reason = reason.unwrap_or_else(|| "connection closed".to_string());
                        return Err(AgentError::ConnectionLost(reason));
                    }
                },
            }
        }
    }
}

impl Default for KeepaliveScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_HEARTBEAT_INTERVAL)
    }
}
