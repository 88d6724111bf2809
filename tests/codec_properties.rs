//! Property-based tests for the wire codec
//!
//! Inbound bytes come straight off the network, so decoding must never panic
//! whatever arrives, and outbound layouts must match the protocol byte for byte.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use honchat_protocol::core::codec::WireCodec;
use honchat_protocol::core::opcode::ServerOpcode;
use honchat_protocol::error::ProtocolError;
use honchat_protocol::protocol::message::{ClientMessage, ServerMessage};
use proptest::prelude::*;

fn wire_string() -> impl Strategy<Value = String> {
    "[^\\x00]{1,40}"
}

fn cstr(value: &str) -> Vec<u8> {
    let mut bytes = value.as_bytes().to_vec();
    bytes.push(0);
    bytes
}

// Property: decoding arbitrary bodies for any modelled opcode never panics
proptest! {
    #[test]
    fn prop_decode_never_panics(
        index in 0usize..ServerOpcode::ALL.len(),
        body in prop::collection::vec(any::<u8>(), 0..512),
    ) {
        let codec = WireCodec::new();
        let opcode = ServerOpcode::ALL[index].as_u16();
        match codec.decode(opcode, &body) {
            Ok(message) => prop_assert_eq!(message.opcode().as_u16(), opcode),
            Err(ProtocolError::UnknownOpcode(op)) => {
                prop_assert_eq!(op, opcode);
                prop_assert!(!codec.has_decoder(opcode));
            }
            Err(ProtocolError::Malformed { opcode: op, .. }) => prop_assert_eq!(op, opcode),
            Err(other) => prop_assert!(false, "unexpected error {other:?}"),
        }
    }
}

// Property: whisper encoding is opcode, player, NUL, message, NUL
proptest! {
    #[test]
    fn prop_whisper_layout(player in wire_string(), message in wire_string()) {
        let bytes = WireCodec::encode(&ClientMessage::Whisper {
            player: player.clone(),
            message: message.clone(),
        });
        let mut expected = vec![0x08, 0x00];
        expected.extend(cstr(&player));
        expected.extend(cstr(&message));
        prop_assert_eq!(&bytes[..], &expected[..]);
    }
}

// Property: channel messages carry both ids little-endian ahead of the text
proptest! {
    #[test]
    fn prop_channel_message_fields(
        account_id in any::<u32>(),
        channel_id in any::<u32>(),
        text in wire_string(),
    ) {
        let mut body = account_id.to_le_bytes().to_vec();
        body.extend(channel_id.to_le_bytes());
        body.extend(cstr(&text));

        let decoded = WireCodec::new().decode(0x03, &body).unwrap();
        prop_assert_eq!(decoded, ServerMessage::ChannelMessage { account_id, channel_id, message: text });
    }
}

// Property: every strict prefix of an ENTERED_CHANNEL body is malformed
proptest! {
    #[test]
    fn prop_truncated_entered_channel_is_malformed(nickname in wire_string(), cut in 0usize..1000) {
        let mut body = cstr(&nickname);
        body.extend(9u32.to_le_bytes());
        body.extend(7u32.to_le_bytes());
        body.extend([3, 0]);
        body.extend(cstr("icon"));
        body.extend(cstr("white"));
        body.extend(cstr("avatar"));

        let codec = WireCodec::new();
        prop_assert!(codec.decode(0x05, &body).is_ok());

        let cut = cut % body.len();
        let truncated = codec.decode(0x05, &body[..cut]);
        let is_malformed = matches!(truncated, Err(ProtocolError::Malformed { opcode: 0x05, .. }));
        prop_assert!(is_malformed);
    }
}

#[test]
fn join_channel_town_exact_bytes() {
    let bytes = WireCodec::encode(&ClientMessage::JoinChannel {
        channel: "town".into(),
    });
    assert_eq!(&bytes[..], &[0x1E, 0x00, b't', b'o', b'w', b'n', 0x00]);
}

#[test]
fn joined_channel_with_impossible_user_count_is_malformed() {
    let mut body = cstr("town");
    body.extend(7u32.to_le_bytes());
    body.push(0);
    body.extend(cstr("topic"));
    body.extend(0u32.to_le_bytes());
    body.extend(u32::MAX.to_le_bytes());

    let err = WireCodec::new().decode(0x04, &body).unwrap_err();
    assert!(matches!(err, ProtocolError::Malformed { opcode: 0x04, .. }));
}
