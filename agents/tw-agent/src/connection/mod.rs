//! Connection module
//!
//! This module handles all communication with the Tower server, including
//! endpoint resolution, the websocket connection and the keepalive loop.

pub mod endpoint;
pub mod keepalive;
pub mod protocol;
pub mod transport;
pub mod websocket;
