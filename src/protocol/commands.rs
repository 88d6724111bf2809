//! Outbound commands.
//!
//! One method per client opcode. Fields are checked before encoding: the wire
//! strings are NUL-terminated, so an empty value or an embedded NUL would
//! produce a packet the server cannot parse.

use std::io;

use tracing::{debug, instrument, warn};

use crate::core::opcode::LoginMode;
use crate::error::{AuthError, ChatError, ConnectionError, ProtocolError, Result};
use crate::protocol::message::ClientMessage;
use crate::transport::connection::ConnectionManager;

fn require(field: &'static str, value: &str) -> std::result::Result<(), ProtocolError> {
    if value.is_empty() {
        return Err(ProtocolError::InvalidField {
            field,
            reason: "must not be empty",
        });
    }
    if value.contains('\0') {
        return Err(ProtocolError::InvalidField {
            field,
            reason: "must not contain NUL",
        });
    }
    Ok(())
}

/// Encodes and writes outbound messages through a [`ConnectionManager`]
#[derive(Clone, Copy)]
pub struct CommandSender<'a> {
    connection: &'a ConnectionManager,
}

impl<'a> CommandSender<'a> {
    pub fn new(connection: &'a ConnectionManager) -> Self {
        Self { connection }
    }

    /// Send the authentication packet.
    ///
    /// A broken pipe or reset here usually means the server rejected the
    /// protocol version, which surfaces as [`AuthError::BrokenPipe`].
    #[instrument(skip(self, cookie, auth_hash), level = "debug")]
    pub async fn send_auth_info(
        &self,
        account_id: u32,
        cookie: &str,
        ip: &str,
        auth_hash: &str,
        protocol: u32,
        mode: LoginMode,
    ) -> Result<()> {
        require("cookie", cookie)?;
        require("auth_hash", auth_hash)?;
        if ip.contains('\0') {
            return Err(ProtocolError::InvalidField {
                field: "ip",
                reason: "must not contain NUL",
            }
            .into());
        }

        let message = ClientMessage::AuthInfo {
            account_id,
            cookie: cookie.to_owned(),
            ip: ip.to_owned(),
            auth_hash: auth_hash.to_owned(),
            protocol,
            mode,
        };
        match self.connection.send(message).await {
            Err(ChatError::Connection(ConnectionError::SendFailed(e)))
                if matches!(
                    e.kind(),
                    io::ErrorKind::BrokenPipe | io::ErrorKind::ConnectionReset
                ) =>
            {
                warn!(error = %e, protocol, "Chat server dropped the authentication request");
                Err(AuthError::BrokenPipe.into())
            }
            other => other,
        }
    }

    pub async fn send_pong(&self) -> Result<()> {
        self.connection.send(ClientMessage::Pong).await
    }

    pub async fn send_join_channel(&self, channel: &str) -> Result<()> {
        require("channel", channel)?;
        debug!(channel, "Joining channel");
        self.connection
            .send(ClientMessage::JoinChannel {
                channel: channel.to_owned(),
            })
            .await
    }

    #[instrument(skip(self, password), level = "debug")]
    pub async fn send_join_channel_password(&self, channel: &str, password: &str) -> Result<()> {
        require("channel", channel)?;
        require("password", password)?;
        self.connection
            .send(ClientMessage::JoinChannelPassword {
                channel: channel.to_owned(),
                password: password.to_owned(),
            })
            .await
    }

    pub async fn send_leave_channel(&self, channel: &str) -> Result<()> {
        require("channel", channel)?;
        debug!(channel, "Leaving channel");
        self.connection
            .send(ClientMessage::LeaveChannel {
                channel: channel.to_owned(),
            })
            .await
    }

    pub async fn send_whisper(&self, player: &str, message: &str) -> Result<()> {
        require("player", player)?;
        require("message", message)?;
        self.connection
            .send(ClientMessage::Whisper {
                player: player.to_owned(),
                message: message.to_owned(),
            })
            .await
    }

    pub async fn send_private_message(&self, player: &str, message: &str) -> Result<()> {
        require("player", player)?;
        require("message", message)?;
        self.connection
            .send(ClientMessage::PrivateMessage {
                player: player.to_owned(),
                message: message.to_owned(),
            })
            .await
    }

    pub async fn send_channel_message(&self, message: &str, channel_id: u32) -> Result<()> {
        require("message", message)?;
        self.connection
            .send(ClientMessage::ChannelMessage {
                message: message.to_owned(),
                channel_id,
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ChatConfig;

    #[test]
    fn test_require_rejects_empty_and_nul() {
        assert!(require("channel", "town").is_ok());
        assert_eq!(
            require("channel", ""),
            Err(ProtocolError::InvalidField {
                field: "channel",
                reason: "must not be empty"
            })
        );
        assert!(require("channel", "a\0b").is_err());
    }

    #[tokio::test]
    async fn test_validation_runs_before_connection_check() {
        let connection = ConnectionManager::new(ChatConfig::default());
        let sender = CommandSender::new(&connection);
        let err = sender.send_whisper("", "hi").await.unwrap_err();
        assert!(matches!(
            err,
            ChatError::Protocol(ProtocolError::InvalidField { field: "player", .. })
        ));
        let err = sender.send_join_channel("town").await.unwrap_err();
        assert!(matches!(
            err,
            ChatError::Connection(ConnectionError::NotConnected)
        ));
    }
}
