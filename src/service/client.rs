//! # Chat Client
//!
//! The façade a host application talks to. It ties the master server login,
//! the chat connection and the event bus together for one account.
//!
//! ## Example
//! ```rust,no_run
//! use std::sync::Arc;
//! use honchat_protocol::config::EngineConfig;
//! use honchat_protocol::core::opcode::ServerOpcode;
//! use honchat_protocol::protocol::message::ServerMessage;
//! use honchat_protocol::service::{ChatClient, MasterServer};
//!
//! async fn run(master: Arc<dyn MasterServer>) -> honchat_protocol::error::Result<()> {
//!     let mut client = ChatClient::new(EngineConfig::default(), master);
//!     client.connect_event(ServerOpcode::Whisper, |message| {
//!         if let ServerMessage::Whisper { player, message } = message {
//!             println!("{player}: {message}");
//!         }
//!     })?;
//!     client.login("user", "password").await?;
//!     client.chat_connect().await?;
//!     client.join_channel("town", None).await?;
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::config::EngineConfig;
use crate::error::{AuthError, ConfigError, Result};
use crate::protocol::commands::CommandSender;
use crate::protocol::dispatcher::HandlerId;
use crate::protocol::handshake::{AuthHandshake, Session};
use crate::protocol::message::{ServerMessage, User};
use crate::protocol::roster::Channel;
use crate::service::master::{MasterServer, RetryPolicy};
use crate::transport::connection::{ConnectionManager, ConnectionState};
use crate::utils::metrics::MetricsSnapshot;

pub struct ChatClient {
    config: EngineConfig,
    connection: ConnectionManager,
    master: Arc<dyn MasterServer>,
    session: Option<Session>,
    logged_in: bool,
}

impl ChatClient {
    pub fn new(config: EngineConfig, master: Arc<dyn MasterServer>) -> Self {
        let connection = ConnectionManager::new(config.chat.clone());
        Self {
            config,
            connection,
            master,
            session: None,
            logged_in: false,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Change the configuration. Rejected while connected, and when the
    /// result does not validate.
    pub fn configure<F>(&mut self, mutator: F) -> Result<()>
    where
        F: FnOnce(&mut EngineConfig),
    {
        if self.connection.is_connected() {
            return Err(
                ConfigError::Invalid("Cannot reconfigure while connected".to_string()).into(),
            );
        }
        let mut config = self.config.clone();
        mutator(&mut config);
        config.validate_strict()?;
        self.connection.reconfigure(config.chat.clone());
        self.config = config;
        Ok(())
    }

    /// Log in with the master server, retrying transient failures.
    #[instrument(skip(self, password))]
    pub async fn login(&mut self, username: &str, password: &str) -> Result<()> {
        let policy = RetryPolicy::from_config(&self.config.master);
        let master = self.master.clone();
        let session = policy
            .run("login", || master.login(username, password))
            .await?;

        info!(account_id = session.account_id, "Logged in with the master server");
        let roster = self.connection.roster();
        roster.forget_seeded();
        roster.add_users(session.buddies.iter().cloned());
        self.session = Some(session);
        self.logged_in = true;
        Ok(())
    }

    /// Log out with the master server. The local session is logged out even
    /// when the request fails; the last error is still returned.
    #[instrument(skip(self))]
    pub async fn logout(&mut self) -> Result<()> {
        let cookie = match &self.session {
            Some(session) if !session.cookie.is_empty() => session.cookie.clone(),
            _ => {
                self.logged_in = false;
                return Ok(());
            }
        };

        let policy = RetryPolicy::from_config(&self.config.master);
        let master = self.master.clone();
        let result = policy.run("logout", || master.logout(&cookie)).await;
        self.logged_in = false;
        self.connection.roster().forget_seeded();
        match result {
            Ok(()) => {
                info!("Logged out with the master server");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Logout request failed, forcing logout");
                Err(e.into())
            }
        }
    }

    /// Connect to the chat server and authenticate with the current session.
    pub async fn chat_connect(&self) -> Result<()> {
        let session = self
            .session
            .as_ref()
            .ok_or(AuthError::MissingCredentials)?;
        AuthHandshake::new(&self.connection).run(session).await
    }

    pub async fn chat_disconnect(&self) {
        self.connection.disconnect().await;
    }

    pub fn is_logged_in(&self) -> bool {
        self.logged_in
    }

    /// Connected means authenticated as well; a socket the server has not
    /// accepted yet does not count.
    pub fn is_connected(&self) -> bool {
        self.connection.is_authenticated() && self.connection.is_connected()
    }

    pub fn is_authenticated(&self) -> bool {
        self.connection.is_authenticated()
    }

    pub fn state(&self) -> ConnectionState {
        self.connection.state()
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// Use a session obtained elsewhere instead of logging in here
    pub fn set_session(&mut self, session: Session) {
        let roster = self.connection.roster();
        roster.forget_seeded();
        roster.add_users(session.buddies.iter().cloned());
        self.session = Some(session);
        self.logged_in = true;
    }

    pub fn connection(&self) -> &ConnectionManager {
        &self.connection
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.connection.metrics().snapshot()
    }

    pub async fn join_channel(&self, channel: &str, password: Option<&str>) -> Result<()> {
        let sender = CommandSender::new(&self.connection);
        match password {
            Some(password) => sender.send_join_channel_password(channel, password).await,
            None => sender.send_join_channel(channel).await,
        }
    }

    pub async fn leave_channel(&self, channel: &str) -> Result<()> {
        CommandSender::new(&self.connection)
            .send_leave_channel(channel)
            .await
    }

    pub async fn send_whisper(&self, player: &str, message: &str) -> Result<()> {
        CommandSender::new(&self.connection)
            .send_whisper(player, message)
            .await
    }

    pub async fn send_private_message(&self, player: &str, message: &str) -> Result<()> {
        CommandSender::new(&self.connection)
            .send_private_message(player, message)
            .await
    }

    pub async fn send_channel_message(&self, message: &str, channel_id: u32) -> Result<()> {
        CommandSender::new(&self.connection)
            .send_channel_message(message, channel_id)
            .await
    }

    pub fn connect_event<F>(&self, opcode: impl Into<u16>, handler: F) -> Result<HandlerId>
    where
        F: Fn(&ServerMessage) + Send + Sync + 'static,
    {
        self.connection.bus().connect(opcode, handler)
    }

    pub fn connect_event_with_priority<F>(
        &self,
        opcode: impl Into<u16>,
        handler: F,
        priority: u8,
    ) -> Result<HandlerId>
    where
        F: Fn(&ServerMessage) + Send + Sync + 'static,
    {
        self.connection
            .bus()
            .connect_with_priority(opcode, handler, priority)
    }

    pub fn disconnect_event(&self, opcode: impl Into<u16>, id: HandlerId) -> Result<()> {
        self.connection.bus().disconnect(opcode, id)
    }

    pub fn channel_name(&self, channel_id: u32) -> Option<String> {
        self.connection.roster().channel_name(channel_id)
    }

    pub fn channel(&self, channel_id: u32) -> Option<Channel> {
        self.connection.roster().channel(channel_id)
    }

    pub fn nickname(&self, account_id: u32) -> Option<String> {
        self.connection.roster().nickname(account_id)
    }

    pub fn user(&self, account_id: u32) -> Option<User> {
        self.connection.roster().user(account_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ChatError, MasterServerError};
    use async_trait::async_trait;

    struct Offline;

    #[async_trait]
    impl MasterServer for Offline {
        async fn login(&self, _: &str, _: &str) -> std::result::Result<Session, MasterServerError> {
            Err(MasterServerError::BadCredentials)
        }

        async fn logout(&self, _: &str) -> std::result::Result<(), MasterServerError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_chat_connect_without_session() {
        let client = ChatClient::new(EngineConfig::default(), Arc::new(Offline));
        let err = client.chat_connect().await.unwrap_err();
        assert!(matches!(err, ChatError::Auth(AuthError::MissingCredentials)));
        assert_eq!(client.metrics().connect_attempts, 0);
    }

    #[tokio::test]
    async fn test_bad_credentials_fail_once() {
        let mut client = ChatClient::new(EngineConfig::default(), Arc::new(Offline));
        let err = client.login("user", "wrong").await.unwrap_err();
        assert!(matches!(
            err,
            ChatError::MasterServer(MasterServerError::BadCredentials)
        ));
        assert!(!client.is_logged_in());
    }

    #[test]
    fn test_configure_validates() {
        let mut client = ChatClient::new(EngineConfig::default(), Arc::new(Offline));
        assert!(client.configure(|c| c.chat.port = 0).is_err());
        assert_eq!(client.config().chat.port, 11031);
        client.configure(|c| c.chat.invisible = true).unwrap();
        assert!(client.connection().config().invisible);
    }
}
