use serde::{Deserialize, Serialize};

use crate::core::opcode::{ClientOpcode, LoginMode, ServerOpcode, UserStatus};

/// A user as described by the chat server in channel listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub account_id: u32,
    /// Nickname including any clan tag
    pub nickname: String,
    pub status: u8,
    pub flags: u8,
    pub chat_icon: String,
    pub nick_colour: String,
    pub account_icon: String,
}

impl User {
    pub fn presence(&self) -> UserStatus {
        UserStatus::from(self.status)
    }
}

/// Operator entry of a JOINED_CHANNEL listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operator {
    pub account_id: u32,
    pub kind: u8,
}

/// Decoded inbound packet, one variant per modelled server opcode.
///
/// Every handler attached to an event receives the same value and reads the
/// fields it needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServerMessage {
    AuthAccepted,
    Ping,
    ChannelMessage {
        account_id: u32,
        channel_id: u32,
        message: String,
    },
    JoinedChannel {
        channel: String,
        channel_id: u32,
        topic: String,
        operators: Vec<Operator>,
        users: Vec<User>,
    },
    EnteredChannel {
        channel_id: u32,
        user: User,
    },
    LeftChannel {
        account_id: u32,
        channel_id: u32,
    },
    Whisper {
        player: String,
        message: String,
    },
    PrivateMessage {
        player: String,
        message: String,
    },
    /// Server-wide broadcast
    MessageAll {
        sender: String,
        message: String,
    },
    TotalOnline {
        count: u32,
        region_data: String,
    },
}

impl ServerMessage {
    pub fn opcode(&self) -> ServerOpcode {
        match self {
            ServerMessage::AuthAccepted => ServerOpcode::AuthAccepted,
            ServerMessage::Ping => ServerOpcode::Ping,
            ServerMessage::ChannelMessage { .. } => ServerOpcode::ChannelMessage,
            ServerMessage::JoinedChannel { .. } => ServerOpcode::JoinedChannel,
            ServerMessage::EnteredChannel { .. } => ServerOpcode::EnteredChannel,
            ServerMessage::LeftChannel { .. } => ServerOpcode::LeftChannel,
            ServerMessage::Whisper { .. } => ServerOpcode::Whisper,
            ServerMessage::PrivateMessage { .. } => ServerOpcode::PrivateMessage,
            ServerMessage::MessageAll { .. } => ServerOpcode::MessageAll,
            ServerMessage::TotalOnline { .. } => ServerOpcode::TotalOnline,
        }
    }
}

/// Outbound packet, one variant per client opcode the engine can send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    AuthInfo {
        account_id: u32,
        cookie: String,
        ip: String,
        auth_hash: String,
        protocol: u32,
        mode: LoginMode,
    },
    Pong,
    JoinChannel {
        channel: String,
    },
    JoinChannelPassword {
        channel: String,
        password: String,
    },
    LeaveChannel {
        channel: String,
    },
    Whisper {
        player: String,
        message: String,
    },
    PrivateMessage {
        player: String,
        message: String,
    },
    ChannelMessage {
        message: String,
        channel_id: u32,
    },
}

impl ClientMessage {
    pub fn opcode(&self) -> ClientOpcode {
        match self {
            ClientMessage::AuthInfo { .. } => ClientOpcode::AuthInfo,
            ClientMessage::Pong => ClientOpcode::Pong,
            ClientMessage::JoinChannel { .. } => ClientOpcode::JoinChannel,
            ClientMessage::JoinChannelPassword { .. } => ClientOpcode::JoinChannelPassword,
            ClientMessage::LeaveChannel { .. } => ClientOpcode::LeaveChannel,
            ClientMessage::Whisper { .. } => ClientOpcode::Whisper,
            ClientMessage::PrivateMessage { .. } => ClientOpcode::PrivateMessage,
            ClientMessage::ChannelMessage { .. } => ClientOpcode::ChannelMessage,
        }
    }
}
