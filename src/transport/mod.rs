//! # Transport Layer
//!
//! The TCP connection to the chat server.
//!
//! ## Components
//! - **Connection**: connection state machine, writer and task lifecycle
//! - **Listener**: timed read loop and ordered or parallel packet dispatch

pub mod connection;
pub(crate) mod listener;

pub use connection::{ConnectionManager, ConnectionState};
