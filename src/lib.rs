//! # honchat-protocol
//!
//! Client engine for a game's binary chat protocol: cookie based
//! authentication, one persistent TCP connection, a closed set of decoded
//! messages and a priority-ordered event bus that delivers them.
//!
//! ## Layers
//! - [`core`]: opcodes and the little-endian wire codec
//! - [`protocol`]: messages, event bus, router, roster, handshake and commands
//! - [`transport`]: the connection state machine and its read loop
//! - [`service`]: master server retry and the [`ChatClient`] façade
//! - [`config`], [`error`], [`utils`]: configuration, errors, logging and metrics

pub mod config;
pub mod core;
pub mod error;
pub mod protocol;
pub mod service;
pub mod transport;
pub mod utils;

pub use config::{DispatchMode, EngineConfig};
pub use error::{ChatError, Result};
pub use protocol::dispatcher::{EventBus, HandlerId, PRIORITY_DEFAULT, PRIORITY_INTERNAL};
pub use protocol::handshake::Session;
pub use protocol::message::{ClientMessage, ServerMessage};
pub use service::{ChatClient, MasterServer};
pub use transport::{ConnectionManager, ConnectionState};
