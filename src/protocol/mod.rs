//! # Protocol Layer
//!
//! Message model, routing and the session-level exchanges with the chat server.
//!
//! ## Components
//! - **Message**: decoded inbound and outbound message values
//! - **Dispatcher**: the priority-ordered event bus
//! - **Router**: raw packet to event
//! - **Roster**: channels and users seen on the connection
//! - **Handshake**: cookie based authentication
//! - **Commands**: one sender per outbound opcode

pub mod commands;
pub mod dispatcher;
pub mod handshake;
pub mod message;
pub mod roster;
pub mod router;
