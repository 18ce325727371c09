//! Agent module
//!
//! This module contains the session state machine, the failure taxonomy and
//! the supervisor that drives a session to its end.

pub mod error;
pub mod session;
pub mod supervisor;
