//! # Wire Codec
//!
//! Pure encode/decode functions for every modelled opcode, plus the
//! `tokio_util` codec used to move raw packets over the socket.
//!
//! Decoding goes through a registry keyed by the inbound opcode. The registry
//! is filled once when the codec is built; re-registering an opcode keeps the
//! first decoder so older registrations stay authoritative.
//!
//! ## Framing
//! The protocol has no length prefix. The server writes one message per
//! segment and every message fits the read buffer, so [`PacketCodec`] yields
//! whatever a single read delivered as one packet.

use std::collections::HashMap;

use bytes::{Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::trace;

use crate::core::opcode::ServerOpcode;
use crate::core::wire::{WireReader, WireWriter};
use crate::error::{ChatError, ProtocolError};
use crate::protocol::message::{ClientMessage, Operator, ServerMessage, User};

/// Decoder for a single opcode's payload
pub type DecodeFn = fn(&mut WireReader<'_>) -> Result<ServerMessage, ProtocolError>;

/// Reserved byte sent in every AUTH_INFO packet
const AUTH_INFO_RESERVED: u8 = 0x01;

/// Smallest possible operator record: u32 id + u8 type
const OPERATOR_RECORD_LEN: usize = 5;

/// Smallest possible user record: empty nickname, u32 id, two u8, three empty strings
const USER_RECORD_LEN: usize = 10;

/// Opcode to decoder registry
#[derive(Debug, Clone)]
pub struct WireCodec {
    decoders: HashMap<u16, DecodeFn>,
}

impl Default for WireCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl WireCodec {
    /// Codec with a decoder for every modelled inbound opcode
    pub fn new() -> Self {
        let mut codec = Self::empty();
        codec.register(ServerOpcode::AuthAccepted, decode_auth_accepted);
        codec.register(ServerOpcode::Ping, decode_ping);
        codec.register(ServerOpcode::ChannelMessage, decode_channel_message);
        codec.register(ServerOpcode::JoinedChannel, decode_joined_channel);
        codec.register(ServerOpcode::EnteredChannel, decode_entered_channel);
        codec.register(ServerOpcode::LeftChannel, decode_left_channel);
        codec.register(ServerOpcode::Whisper, decode_whisper);
        codec.register(ServerOpcode::PrivateMessage, decode_private_message);
        codec.register(ServerOpcode::MessageAll, decode_message_all);
        codec.register(ServerOpcode::TotalOnline, decode_total_online);
        codec
    }

    /// Codec with no decoders at all
    pub fn empty() -> Self {
        Self {
            decoders: HashMap::new(),
        }
    }

    /// Register a decoder. Returns false and keeps the existing decoder when
    /// the opcode already has one.
    pub fn register(&mut self, opcode: impl Into<u16>, decoder: DecodeFn) -> bool {
        let opcode = opcode.into();
        if self.decoders.contains_key(&opcode) {
            trace!(opcode, "Decoder already registered, keeping the first");
            return false;
        }
        self.decoders.insert(opcode, decoder);
        true
    }

    pub fn has_decoder(&self, opcode: u16) -> bool {
        self.decoders.contains_key(&opcode)
    }

    /// Decode a packet body (opcode already stripped).
    pub fn decode(&self, opcode: u16, body: &[u8]) -> Result<ServerMessage, ProtocolError> {
        let decoder = self
            .decoders
            .get(&opcode)
            .ok_or(ProtocolError::UnknownOpcode(opcode))?;
        let mut reader = WireReader::new(opcode, body);
        decoder(&mut reader)
    }

    /// Encode an outbound message, opcode included.
    pub fn encode(message: &ClientMessage) -> BytesMut {
        let writer = WireWriter::new(message.opcode().as_u16());
        match message {
            ClientMessage::AuthInfo {
                account_id,
                cookie,
                ip,
                auth_hash,
                protocol,
                mode,
            } => writer
                .u32(*account_id)
                .cstr(cookie)
                .cstr(ip)
                .cstr(auth_hash)
                .u32(*protocol)
                .u8(AUTH_INFO_RESERVED)
                .u32(mode.as_u32()),
            ClientMessage::Pong => writer,
            ClientMessage::JoinChannel { channel } | ClientMessage::LeaveChannel { channel } => {
                writer.cstr(channel)
            }
            ClientMessage::JoinChannelPassword { channel, password } => {
                writer.cstr(channel).cstr(password)
            }
            ClientMessage::Whisper { player, message }
            | ClientMessage::PrivateMessage { player, message } => {
                writer.cstr(player).cstr(message)
            }
            ClientMessage::ChannelMessage {
                message,
                channel_id,
            } => writer.cstr(message).u32(*channel_id),
        }
        .finish()
    }
}

fn decode_auth_accepted(_reader: &mut WireReader<'_>) -> Result<ServerMessage, ProtocolError> {
    Ok(ServerMessage::AuthAccepted)
}

fn decode_ping(_reader: &mut WireReader<'_>) -> Result<ServerMessage, ProtocolError> {
    Ok(ServerMessage::Ping)
}

fn decode_channel_message(reader: &mut WireReader<'_>) -> Result<ServerMessage, ProtocolError> {
    Ok(ServerMessage::ChannelMessage {
        account_id: reader.u32("account_id")?,
        channel_id: reader.u32("channel_id")?,
        message: reader.cstr("message")?,
    })
}

fn decode_joined_channel(reader: &mut WireReader<'_>) -> Result<ServerMessage, ProtocolError> {
    let channel = reader.cstr("channel_name")?;
    let channel_id = reader.u32("channel_id")?;
    let _reserved = reader.u8("reserved")?;
    let topic = reader.cstr("topic")?;

    let op_count = reader.count("op_count", OPERATOR_RECORD_LEN)?;
    let mut operators = Vec::with_capacity(op_count);
    for _ in 0..op_count {
        operators.push(Operator {
            account_id: reader.u32("op_account_id")?,
            kind: reader.u8("op_type")?,
        });
    }

    let user_count = reader.count("user_count", USER_RECORD_LEN)?;
    let mut users = Vec::with_capacity(user_count);
    for _ in 0..user_count {
        let nickname = reader.cstr("nickname")?;
        let account_id = reader.u32("account_id")?;
        users.push(User {
            account_id,
            nickname,
            status: reader.u8("status")?,
            flags: reader.u8("flags")?,
            chat_icon: reader.cstr("chat_icon")?,
            nick_colour: reader.cstr("nick_colour")?,
            account_icon: reader.cstr("account_icon")?,
        });
    }

    Ok(ServerMessage::JoinedChannel {
        channel,
        channel_id,
        topic,
        operators,
        users,
    })
}

fn decode_entered_channel(reader: &mut WireReader<'_>) -> Result<ServerMessage, ProtocolError> {
    let nickname = reader.cstr("nickname")?;
    let account_id = reader.u32("account_id")?;
    let channel_id = reader.u32("channel_id")?;
    let user = User {
        account_id,
        nickname,
        status: reader.u8("status")?,
        flags: reader.u8("flags")?,
        chat_icon: reader.cstr("chat_icon")?,
        nick_colour: reader.cstr("nick_colour")?,
        account_icon: reader.cstr("account_icon")?,
    };
    Ok(ServerMessage::EnteredChannel { channel_id, user })
}

fn decode_left_channel(reader: &mut WireReader<'_>) -> Result<ServerMessage, ProtocolError> {
    Ok(ServerMessage::LeftChannel {
        account_id: reader.u32("account_id")?,
        channel_id: reader.u32("channel_id")?,
    })
}

fn decode_whisper(reader: &mut WireReader<'_>) -> Result<ServerMessage, ProtocolError> {
    Ok(ServerMessage::Whisper {
        player: reader.cstr("player")?,
        message: reader.cstr("message")?,
    })
}

fn decode_private_message(reader: &mut WireReader<'_>) -> Result<ServerMessage, ProtocolError> {
    Ok(ServerMessage::PrivateMessage {
        player: reader.cstr("player")?,
        message: reader.cstr("message")?,
    })
}

fn decode_message_all(reader: &mut WireReader<'_>) -> Result<ServerMessage, ProtocolError> {
    Ok(ServerMessage::MessageAll {
        sender: reader.cstr("sender")?,
        message: reader.cstr("message")?,
    })
}

fn decode_total_online(reader: &mut WireReader<'_>) -> Result<ServerMessage, ProtocolError> {
    Ok(ServerMessage::TotalOnline {
        count: reader.u32("count")?,
        region_data: reader.cstr("region_data")?,
    })
}

/// Socket codec: one read in, one raw packet out. Outbound it accepts either a
/// [`ClientMessage`] or a packet already encoded with [`WireCodec::encode`].
#[derive(Debug, Default, Clone, Copy)]
pub struct PacketCodec;

impl Decoder for PacketCodec {
    type Item = Bytes;
    type Error = ChatError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.is_empty() {
            return Ok(None);
        }
        Ok(Some(src.split().freeze()))
    }
}

impl Encoder<ClientMessage> for PacketCodec {
    type Error = ChatError;

    fn encode(&mut self, item: ClientMessage, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.extend_from_slice(&WireCodec::encode(&item));
        Ok(())
    }
}

impl Encoder<Bytes> for PacketCodec {
    type Error = ChatError;

    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.extend_from_slice(&item);
        Ok(())
    }
}
