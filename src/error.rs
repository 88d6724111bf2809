//! # Error Types
//!
//! Error handling for the chat protocol engine.
//!
//! Every fallible operation returns [`Result`], whose error type [`ChatError`]
//! wraps one of the category enums below. Callers that only care about one
//! category can match on the wrapped value directly.
//!
//! ## Error Categories
//! - **Connection**: socket connect, read, write and liveness failures
//! - **Protocol**: unknown opcodes and malformed payloads
//! - **Auth**: handshake preconditions, timeouts and rejected auth packets
//! - **Config**: event bus misuse and invalid configuration
//! - **MasterServer**: failures reported by the login collaborator
//!
//! ## Example Usage
//! ```rust
//! use honchat_protocol::error::{AuthError, ChatError};
//! use tracing::warn;
//!
//! fn report(err: &ChatError) {
//!     match err {
//!         ChatError::Auth(AuthError::BrokenPipe) => warn!("retry with a newer protocol version"),
//!         other => warn!(error = %other, "chat operation failed"),
//!     }
//! }
//! ```

use std::io;
use thiserror::Error;

/// Error message constants to reduce allocations in error paths.
pub mod constants {
    /// Event bus lock errors
    pub const ERR_BUS_WRITE_LOCK: &str = "Failed to acquire write lock on event bus";
    pub const ERR_BUS_READ_LOCK: &str = "Failed to acquire read lock on event bus";

    /// Shared state lock errors
    pub const ERR_ROSTER_LOCK: &str = "Roster lock poisoned";
    pub const ERR_STATE_LOCK: &str = "Connection state lock poisoned";

    /// Connection errors
    pub const ERR_NOT_CONNECTED: &str = "Not connected to the chat server";
    pub const ERR_CONNECTION_CLOSED: &str = "Connection closed by the chat server";
}

/// Failures of the TCP connection to the chat server.
#[derive(Error, Debug)]
pub enum ConnectionError {
    #[error("Connection to {0} was refused")]
    Refused(String),

    #[error("Connection timed out")]
    Timeout,

    #[error("Connection reset by peer")]
    Reset,

    #[error("Failed to send packet: {0}")]
    SendFailed(#[source] io::Error),

    #[error("{}", constants::ERR_NOT_CONNECTED)]
    NotConnected,

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Failures decoding or encoding wire payloads.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Unknown opcode 0x{0:04X}")]
    UnknownOpcode(u16),

    #[error("Malformed payload for opcode 0x{opcode:04X}: {reason}")]
    Malformed { opcode: u16, reason: String },

    #[error("Invalid field `{field}`: {reason}")]
    InvalidField {
        field: &'static str,
        reason: &'static str,
    },
}

/// Failures of the chat server authentication handshake.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    #[error("No cookie/auth hash provided")]
    MissingCredentials,

    #[error("Chat server did not respond to the authentication request")]
    Timeout,

    #[error("Broken pipe while authenticating, is the protocol version correct?")]
    BrokenPipe,
}

/// Misuse of the event bus and invalid configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("No event declared for opcode 0x{0:04X}")]
    UnknownEvent(u16),

    #[error("Handler is not registered on opcode 0x{0:04X}")]
    NotRegistered(u16),

    #[error("Configuration error: {0}")]
    Invalid(String),
}

/// Failures reported by the master server collaborator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MasterServerError {
    #[error("Could not connect to the master server")]
    Unreachable,

    #[error("Could not obtain login data")]
    NoLoginData,

    #[error("Incorrect username/password")]
    BadCredentials,

    #[error("Connection to the master server timed out")]
    Timeout,

    #[error("Connection to the master server was rejected")]
    Rejected,

    #[error("Connection to the master server was reset by peer")]
    ConnectionReset,

    #[error("Bad HTTP status code: {0}")]
    BadStatus(u16),

    #[error("Master server failed to receive logout request, forcing logout")]
    LogoutFailed,
}

impl MasterServerError {
    /// Numeric code used by the master server tooling
    pub fn code(&self) -> u16 {
        match self {
            MasterServerError::Unreachable => 100,
            MasterServerError::NoLoginData => 101,
            MasterServerError::BadCredentials => 102,
            MasterServerError::Timeout => 104,
            MasterServerError::Rejected => 105,
            MasterServerError::LogoutFailed => 106,
            MasterServerError::BadStatus(_) => 109,
            MasterServerError::ConnectionReset => 110,
        }
    }

    /// Whether another attempt could succeed. Answers the server actually
    /// gave (bad credentials, empty login data) are final.
    pub fn is_transient(&self) -> bool {
        !matches!(
            self,
            MasterServerError::NoLoginData | MasterServerError::BadCredentials
        )
    }
}

/// ChatError is the primary error type for all engine operations
#[derive(Error, Debug)]
pub enum ChatError {
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    MasterServer(#[from] MasterServerError),

    #[error("Synchronization primitive poisoned: {0}")]
    LockPoisoned(&'static str),
}

impl From<io::Error> for ChatError {
    fn from(err: io::Error) -> Self {
        ChatError::Connection(ConnectionError::from(err))
    }
}

/// Type alias for Results using ChatError
pub type Result<T> = std::result::Result<T, ChatError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_converts_to_connection_error() {
        let err: ChatError = io::Error::new(io::ErrorKind::Other, "boom").into();
        assert!(matches!(err, ChatError::Connection(ConnectionError::Io(_))));
    }

    #[test]
    fn test_unknown_opcode_display_is_hex() {
        let err = ProtocolError::UnknownOpcode(0x2A00);
        assert_eq!(err.to_string(), "Unknown opcode 0x2A00");
    }

    #[test]
    fn test_master_server_error_codes() {
        assert_eq!(MasterServerError::BadCredentials.code(), 102);
        assert!(!MasterServerError::BadCredentials.is_transient());
        assert!(MasterServerError::ConnectionReset.is_transient());
    }

    #[test]
    fn test_transparent_wrapping_keeps_message() {
        let err = ChatError::from(AuthError::MissingCredentials);
        assert_eq!(err.to_string(), "No cookie/auth hash provided");
    }
}
