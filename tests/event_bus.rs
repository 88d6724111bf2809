//! Event bus ordering and registration rules

#![allow(clippy::unwrap_used)]

use std::sync::{Arc, Mutex};

use honchat_protocol::core::opcode::ServerOpcode;
use honchat_protocol::error::{ChatError, ConfigError};
use honchat_protocol::protocol::dispatcher::{EventBus, PRIORITY_INTERNAL};
use honchat_protocol::protocol::message::ServerMessage;

fn whisper() -> ServerMessage {
    ServerMessage::Whisper {
        player: "alice".into(),
        message: "hi".into(),
    }
}

#[test]
fn handlers_run_in_ascending_priority() {
    let bus = EventBus::new();
    let order = Arc::new(Mutex::new(Vec::new()));
    for priority in [5u8, 1, 3] {
        let order = order.clone();
        bus.connect_with_priority(
            ServerOpcode::Whisper,
            move |_| order.lock().unwrap().push(priority),
            priority,
        )
        .unwrap();
    }

    assert_eq!(bus.trigger(&whisper()).unwrap(), 3);
    assert_eq!(*order.lock().unwrap(), vec![1, 3, 5]);
}

#[test]
fn equal_priorities_keep_registration_order() {
    let bus = EventBus::new();
    let order = Arc::new(Mutex::new(Vec::new()));
    for tag in ["first", "second", "third"] {
        let order = order.clone();
        bus.connect(ServerOpcode::Whisper, move |_| order.lock().unwrap().push(tag))
            .unwrap();
    }
    let internal = order.clone();
    bus.connect_with_priority(
        ServerOpcode::Whisper,
        move |_| internal.lock().unwrap().push("internal"),
        PRIORITY_INTERNAL,
    )
    .unwrap();

    bus.trigger(&whisper()).unwrap();
    assert_eq!(
        *order.lock().unwrap(),
        vec!["internal", "first", "second", "third"]
    );
}

#[test]
fn every_handler_sees_the_same_message() {
    let bus = EventBus::new();
    let seen = Arc::new(Mutex::new(Vec::new()));
    for _ in 0..2 {
        let seen = seen.clone();
        bus.connect(ServerOpcode::TotalOnline, move |message| {
            if let ServerMessage::TotalOnline { count, .. } = message {
                seen.lock().unwrap().push(*count);
            }
        })
        .unwrap();
    }
    bus.trigger(&ServerMessage::TotalOnline {
        count: 1234,
        region_data: String::new(),
    })
    .unwrap();
    assert_eq!(*seen.lock().unwrap(), vec![1234, 1234]);
}

#[test]
fn subscribing_to_undeclared_event_fails() {
    let bus = EventBus::new();
    let err = bus.connect(ServerOpcode::WhisperFailed, |_| {}).unwrap_err();
    assert!(matches!(
        err,
        ChatError::Config(ConfigError::UnknownEvent(0x09))
    ));
    bus.connect(ServerOpcode::LeftChannel, |_| {}).unwrap();
    bus.connect(ServerOpcode::MessageAll, |_| {}).unwrap();
}

#[test]
fn disconnect_removes_exactly_one_registration() {
    let bus = EventBus::new();
    let calls = Arc::new(Mutex::new(0));
    let a = {
        let calls = calls.clone();
        bus.connect(ServerOpcode::Whisper, move |_| *calls.lock().unwrap() += 1)
            .unwrap()
    };
    {
        let calls = calls.clone();
        bus.connect(ServerOpcode::Whisper, move |_| *calls.lock().unwrap() += 10)
            .unwrap();
    }

    bus.disconnect(ServerOpcode::Whisper, a).unwrap();
    bus.trigger(&whisper()).unwrap();
    assert_eq!(*calls.lock().unwrap(), 10);

    let err = bus.disconnect(ServerOpcode::Whisper, a).unwrap_err();
    assert!(matches!(
        err,
        ChatError::Config(ConfigError::NotRegistered(0x08))
    ));
}

#[test]
fn panicking_handler_does_not_stop_the_rest() {
    let bus = EventBus::new();
    let ran = Arc::new(Mutex::new(false));
    bus.connect_with_priority(ServerOpcode::Ping, |_| panic!("handler bug"), 1)
        .unwrap();
    let flag = ran.clone();
    bus.connect_with_priority(ServerOpcode::Ping, move |_| *flag.lock().unwrap() = true, 2)
        .unwrap();

    assert_eq!(bus.trigger(&ServerMessage::Ping).unwrap(), 2);
    assert!(*ran.lock().unwrap());
}
