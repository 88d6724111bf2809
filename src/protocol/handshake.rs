//! # Chat Server Authentication
//!
//! The chat server trusts the cookie and auth hash handed out by the master
//! server at login. The handshake connects, sends AUTH_INFO once and then
//! checks for AUTH_ACCEPTED on a fixed tick until the attempt budget runs out.
//!
//! ## Sequence
//! 1. Reject sessions without a cookie or auth hash before touching the network
//! 2. Connect to the session's chat host
//! 3. Send AUTH_INFO `{account_id, cookie, ip, auth_hash, protocol, 0x01, mode}`
//! 4. Poll the authenticated flag every tick, up to the configured tick count
//!
//! On timeout the socket is left open; tearing it down is up to the caller.

use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::core::opcode::LoginMode;
use crate::error::{AuthError, Result};
use crate::protocol::commands::CommandSender;
use crate::protocol::message::User;
use crate::transport::connection::ConnectionManager;

/// Credentials issued by the master server for one login
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub account_id: u32,
    pub cookie: String,
    pub auth_hash: String,
    /// Chat server host name
    pub chat_url: String,
    /// Client IP as seen by the master server
    pub ip: String,
    /// Nickname including clan tag
    #[serde(default)]
    pub nickname: Option<String>,
    /// Buddies listed in the login response
    #[serde(default)]
    pub buddies: Vec<User>,
}

impl Session {
    pub fn has_credentials(&self) -> bool {
        !self.cookie.is_empty() && !self.auth_hash.is_empty()
    }
}

pub struct AuthHandshake<'a> {
    connection: &'a ConnectionManager,
}

impl<'a> AuthHandshake<'a> {
    pub fn new(connection: &'a ConnectionManager) -> Self {
        Self { connection }
    }

    #[instrument(skip(self, session), fields(account_id = session.account_id, host = %session.chat_url))]
    pub async fn run(&self, session: &Session) -> Result<()> {
        if !session.has_credentials() {
            warn!("Session has no cookie or auth hash");
            return Err(AuthError::MissingCredentials.into());
        }

        let config = self.connection.config();
        let metrics = self.connection.metrics();
        metrics.handshake_attempt();

        if let Err(e) = self.connection.connect(&session.chat_url, config.port).await {
            metrics.handshake_failed();
            return Err(e);
        }

        self.connection.mark_authenticating();
        let sent = CommandSender::new(self.connection)
            .send_auth_info(
                session.account_id,
                &session.cookie,
                &session.ip,
                &session.auth_hash,
                config.protocol,
                LoginMode::from_invisible(config.invisible),
            )
            .await;
        if let Err(e) = sent {
            self.connection.mark_failed();
            metrics.handshake_failed();
            return Err(e);
        }

        for tick in 1..=config.auth_poll_attempts {
            tokio::time::sleep(config.auth_poll_interval).await;
            if self.connection.is_authenticated() {
                info!(tick, "Chat server accepted the session");
                metrics.handshake_success();
                return Ok(());
            }
            if !self.connection.is_connected() {
                warn!(tick, "Connection lost while waiting for authentication");
                break;
            }
        }

        warn!(
            ticks = config.auth_poll_attempts,
            "Chat server did not answer the authentication request"
        );
        self.connection.mark_failed();
        metrics.handshake_failed();
        Err(AuthError::Timeout.into())
    }
}
