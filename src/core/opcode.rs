//! Opcode tables for both directions of the chat protocol.
//!
//! Inbound and outbound ids overlap numerically (0x08 is a whisper in both
//! directions, 0x03 a channel message), so each direction gets its own closed
//! enum. Only a subset of the ids has a payload decoder; the rest are known to
//! the engine so they can be named in logs and rejected precisely.

macro_rules! opcodes {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $($variant:ident = $value:literal,)+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[repr(u16)]
        pub enum $name {
            $($variant = $value,)+
        }

        impl $name {
            /// Every opcode in the table
            pub const ALL: &'static [$name] = &[$($name::$variant,)+];

            /// Look up an opcode by its wire value
            pub fn from_u16(value: u16) -> Option<Self> {
                match value {
                    $($value => Some($name::$variant),)+
                    _ => None,
                }
            }

            /// Wire value of the opcode
            #[inline]
            pub fn as_u16(self) -> u16 {
                self as u16
            }

            /// Human readable name, used in logs
            pub fn name(self) -> &'static str {
                match self {
                    $($name::$variant => stringify!($variant),)+
                }
            }
        }

        impl From<$name> for u16 {
            fn from(opcode: $name) -> u16 {
                opcode as u16
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}(0x{:04X})", self.name(), *self as u16)
            }
        }
    };
}

opcodes! {
    /// Server to client packet ids
    pub enum ServerOpcode {
        AuthAccepted = 0x1C00,
        Ping = 0x2A00,
        ChannelMessage = 0x03,
        JoinedChannel = 0x04,
        EnteredChannel = 0x05,
        LeftChannel = 0x06,
        Whisper = 0x08,
        WhisperFailed = 0x09,
        InitialStatus = 0x0B,
        UpdateStatus = 0x0C,
        ClanMessage = 0x13,
        LookingForClan = 0x18,
        PrivateMessage = 0x1C,
        PrivateMessageFailed = 0x1D,
        WhisperBuddies = 0x20,
        MaxChannels = 0x21,
        UserInfoNoExist = 0x2B,
        UserInfoOffline = 0x2C,
        UserInfoOnline = 0x2D,
        UserInfoInGame = 0x2E,
        ChannelUpdate = 0x2F,
        ChannelUpdateTopic = 0x30,
        ChannelKick = 0x31,
        ChannelBan = 0x32,
        ChannelUnban = 0x33,
        ChannelBanned = 0x34,
        ChannelSilenced = 0x35,
        ChannelSilenceLifted = 0x36,
        ChannelSilencePlaced = 0x37,
        MessageAll = 0x39,
        ChannelPromote = 0x3A,
        ChannelDemote = 0x3B,
        ChannelAuthEnable = 0x3E,
        ChannelAuthDisable = 0x3F,
        ChannelAuthAdd = 0x40,
        ChannelAuthDelete = 0x41,
        ChannelAuthList = 0x42,
        ChannelPasswordChanged = 0x43,
        ChannelAuthAddFail = 0x44,
        ChannelAuthDeleteFail = 0x45,
        JoinChannelPassword = 0x46,
        ChannelEmote = 0x65,
        TotalOnline = 0x68,
        RequestNotification = 0xB2,
        Notification = 0xB4,
    }
}

opcodes! {
    /// Client to server packet ids
    pub enum ClientOpcode {
        Pong = 0x2A01,
        ChannelMessage = 0x03,
        Whisper = 0x08,
        AuthInfo = 0x0C00,
        BuddyAddNotify = 0x0D,
        JoinGame = 0x10,
        ClanMessage = 0x13,
        PrivateMessage = 0x1C,
        JoinChannel = 0x1E,
        WhisperBuddies = 0x20,
        LeaveChannel = 0x22,
        UserInfo = 0x2A,
        UpdateTopic = 0x30,
        ChannelKick = 0x31,
        ChannelUnban = 0x32,
        ChannelBan = 0x33,
        ChannelSilenceUser = 0x38,
        ChannelPromote = 0x3A,
        ChannelDemote = 0x3B,
        ChannelAuthEnable = 0x3E,
        ChannelAuthDisable = 0x3F,
        ChannelAuthAdd = 0x40,
        ChannelAuthDelete = 0x41,
        ChannelAuthList = 0x42,
        ChannelSetPassword = 0x43,
        JoinChannelPassword = 0x46,
        ClanAddMember = 0x47,
        ChannelEmote = 0x65,
        BuddyAccept = 0xB3,
    }
}

/// Account flags carried in user records
pub mod user_flags {
    pub const NONE: u8 = 0x00;
    pub const OFFICER: u8 = 0x01;
    pub const LEADER: u8 = 0x02;
    pub const ADMINISTRATOR: u8 = 0x03;
    pub const STAFF: u8 = 0x04;
    pub const PREPURCHASED: u8 = 0x40;
}

/// Presence of a user as reported by the chat server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserStatus {
    Offline,
    Online,
    InLobby,
    InGame,
    Unknown(u8),
}

impl From<u8> for UserStatus {
    fn from(value: u8) -> Self {
        match value {
            0 => UserStatus::Offline,
            3 => UserStatus::Online,
            4 => UserStatus::InLobby,
            5 => UserStatus::InGame,
            other => UserStatus::Unknown(other),
        }
    }
}

/// Visibility requested in the AUTH_INFO packet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoginMode {
    #[default]
    Normal,
    Invisible,
}

impl LoginMode {
    pub fn from_invisible(invisible: bool) -> Self {
        if invisible {
            LoginMode::Invisible
        } else {
            LoginMode::Normal
        }
    }

    /// Wire value of the mode field
    pub fn as_u32(self) -> u32 {
        match self {
            LoginMode::Normal => 0x00,
            LoginMode::Invisible => 0x03,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_opcode_lookup() {
        assert_eq!(ServerOpcode::from_u16(0x1C00), Some(ServerOpcode::AuthAccepted));
        assert_eq!(ServerOpcode::from_u16(0x68), Some(ServerOpcode::TotalOnline));
        assert_eq!(ServerOpcode::from_u16(0xFFFF), None);
    }

    #[test]
    fn test_directions_share_values() {
        assert_eq!(ServerOpcode::Whisper.as_u16(), ClientOpcode::Whisper.as_u16());
        assert_ne!(ServerOpcode::Ping.as_u16(), ClientOpcode::Pong.as_u16());
    }

    #[test]
    fn test_all_tables_are_unique() {
        for table in [
            ServerOpcode::ALL.iter().map(|op| op.as_u16()).collect::<Vec<_>>(),
            ClientOpcode::ALL.iter().map(|op| op.as_u16()).collect::<Vec<_>>(),
        ] {
            let mut sorted = table.clone();
            sorted.sort_unstable();
            sorted.dedup();
            assert_eq!(sorted.len(), table.len());
        }
    }

    #[test]
    fn test_display_includes_hex() {
        assert_eq!(ServerOpcode::Ping.to_string(), "Ping(0x2A00)");
    }

    #[test]
    fn test_login_mode_values() {
        assert_eq!(LoginMode::from_invisible(false).as_u32(), 0);
        assert_eq!(LoginMode::from_invisible(true).as_u32(), 3);
        assert_eq!(UserStatus::from(5), UserStatus::InGame);
        assert_eq!(UserStatus::from(9), UserStatus::Unknown(9));
    }
}
