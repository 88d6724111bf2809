//! In-memory directory of channels and users seen on the current connection.
//!
//! Populated by the engine's internal JOINED_CHANNEL / ENTERED_CHANNEL
//! handlers before any caller handler observes the event, and cleared on
//! disconnect. Writers take an exclusive lock since packets can be dispatched
//! from several workers at once.

use std::collections::HashMap;
use std::sync::RwLock;

use tracing::{trace, warn};

use crate::error::constants;
use crate::protocol::message::{ServerMessage, User};

/// A channel the session is currently in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channel {
    pub id: u32,
    pub name: String,
    pub topic: String,
    /// Account ids of the channel operators
    pub operators: Vec<u32>,
    /// Account ids of the members, look them up with [`Roster::user`]
    pub members: Vec<u32>,
}

#[derive(Default)]
struct RosterInner {
    channels: HashMap<u32, Channel>,
    users: HashMap<u32, User>,
    /// Users from the login response, kept across chat connections
    seeded: HashMap<u32, User>,
}

impl RosterInner {
    fn lookup(&self, account_id: u32) -> Option<&User> {
        self.seeded
            .get(&account_id)
            .or_else(|| self.users.get(&account_id))
    }
}

#[derive(Default)]
pub struct Roster {
    inner: RwLock<RosterInner>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a decoded event. Messages that carry no roster data are ignored.
    pub fn apply(&self, message: &ServerMessage) {
        let mut inner = match self.inner.write() {
            Ok(inner) => inner,
            Err(_) => {
                warn!("{}", constants::ERR_ROSTER_LOCK);
                return;
            }
        };

        match message {
            ServerMessage::JoinedChannel {
                channel,
                channel_id,
                topic,
                operators,
                users,
            } => {
                trace!(channel_id, members = users.len(), "Recording joined channel");
                inner.channels.insert(
                    *channel_id,
                    Channel {
                        id: *channel_id,
                        name: channel.clone(),
                        topic: topic.clone(),
                        operators: operators.iter().map(|op| op.account_id).collect(),
                        members: users.iter().map(|u| u.account_id).collect(),
                    },
                );
                for user in users {
                    inner
                        .users
                        .entry(user.account_id)
                        .or_insert_with(|| user.clone());
                }
            }
            ServerMessage::EnteredChannel { channel_id, user } => {
                trace!(channel_id, account_id = user.account_id, "Recording channel entry");
                if let Some(channel) = inner.channels.get_mut(channel_id) {
                    if !channel.members.contains(&user.account_id) {
                        channel.members.push(user.account_id);
                    }
                }
                inner
                    .users
                    .entry(user.account_id)
                    .or_insert_with(|| user.clone());
            }
            ServerMessage::LeftChannel {
                account_id,
                channel_id,
            } => {
                trace!(channel_id, account_id, "Recording channel exit");
                if let Some(channel) = inner.channels.get_mut(channel_id) {
                    channel.members.retain(|member| member != account_id);
                }
            }
            _ => {}
        }
    }

    /// Seed users known before connecting (e.g. from the login response).
    ///
    /// Seeded users survive [`Roster::clear`] and take precedence over what a
    /// channel listing reports; [`Roster::forget_seeded`] drops them.
    pub fn add_users(&self, users: impl IntoIterator<Item = User>) {
        if let Ok(mut inner) = self.inner.write() {
            for user in users {
                inner.seeded.insert(user.account_id, user);
            }
        }
    }

    pub fn forget_seeded(&self) {
        if let Ok(mut inner) = self.inner.write() {
            inner.seeded.clear();
        }
    }

    pub fn channel_name(&self, channel_id: u32) -> Option<String> {
        let inner = self.inner.read().ok()?;
        inner.channels.get(&channel_id).map(|c| c.name.clone())
    }

    pub fn channel(&self, channel_id: u32) -> Option<Channel> {
        let inner = self.inner.read().ok()?;
        inner.channels.get(&channel_id).cloned()
    }

    pub fn nickname(&self, account_id: u32) -> Option<String> {
        let inner = self.inner.read().ok()?;
        inner.lookup(account_id).map(|u| u.nickname.clone())
    }

    pub fn user(&self, account_id: u32) -> Option<User> {
        let inner = self.inner.read().ok()?;
        inner.lookup(account_id).cloned()
    }

    pub fn users(&self) -> Vec<User> {
        self.inner
            .read()
            .map(|inner| {
                let mut users: Vec<User> = inner.seeded.values().cloned().collect();
                users.extend(
                    inner
                        .users
                        .values()
                        .filter(|u| !inner.seeded.contains_key(&u.account_id))
                        .cloned(),
                );
                users
            })
            .unwrap_or_default()
    }

    pub fn channels(&self) -> Vec<Channel> {
        self.inner
            .read()
            .map(|inner| inner.channels.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Forget everything learned on the current connection
    pub fn clear(&self) {
        if let Ok(mut inner) = self.inner.write() {
            inner.channels.clear();
            inner.users.clear();
        }
    }
}
