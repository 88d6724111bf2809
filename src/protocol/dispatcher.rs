//! # Event Bus
//!
//! Priority-ordered publish/subscribe keyed by inbound opcode.
//!
//! Events are declared up front, one per decodable server opcode. Handlers can
//! only attach to declared events and are kept sorted by ascending priority at
//! registration time (ties keep registration order), so a trigger is a single
//! ordered pass over a snapshot of the list. Handlers run synchronously on the
//! triggering thread and the lock is released before any handler is called,
//! which lets handlers attach or detach other handlers.

use crate::core::opcode::ServerOpcode;
use crate::error::{constants, ChatError, ConfigError, Result};
use crate::protocol::message::ServerMessage;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tracing::{debug, error};

type HandlerFn = dyn Fn(&ServerMessage) + Send + Sync + 'static;
type TapFn = dyn Fn(u16, &[u8]) + Send + Sync + 'static;

/// Priority used by the engine's own bookkeeping handlers. Lowest value, runs first.
pub const PRIORITY_INTERNAL: u8 = 0;

/// Priority given to handlers connected without an explicit one
pub const PRIORITY_DEFAULT: u8 = 5;

/// Opaque handle identifying one registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

struct Registration {
    id: HandlerId,
    priority: u8,
    handler: Arc<HandlerFn>,
}

struct Event {
    name: &'static str,
    handlers: Vec<Registration>,
}

pub struct EventBus {
    events: RwLock<HashMap<u16, Event>>,
    taps: RwLock<Vec<Arc<TapFn>>>,
    next_id: AtomicU64,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    /// Bus with every decodable server opcode declared
    pub fn new() -> Self {
        let mut bus = Self::empty();
        let events = bus.events.get_mut().unwrap_or_else(|e| e.into_inner());
        for (opcode, name) in [
            (ServerOpcode::AuthAccepted, "Auth Accepted"),
            (ServerOpcode::Ping, "Ping"),
            (ServerOpcode::ChannelMessage, "Channel Message"),
            (ServerOpcode::JoinedChannel, "Joined Channel"),
            (ServerOpcode::EnteredChannel, "Entered Channel"),
            (ServerOpcode::LeftChannel, "Left Channel"),
            (ServerOpcode::Whisper, "Whisper"),
            (ServerOpcode::PrivateMessage, "Private Message"),
            (ServerOpcode::MessageAll, "Server Message"),
            (ServerOpcode::TotalOnline, "Total Online"),
        ] {
            events.entry(opcode.as_u16()).or_insert(Event {
                name,
                handlers: Vec::new(),
            });
        }
        bus
    }

    /// Bus with no events declared
    pub fn empty() -> Self {
        Self {
            events: RwLock::new(HashMap::new()),
            taps: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Declare an event for an opcode. Returns false if one already exists.
    pub fn declare(&self, opcode: impl Into<u16>, name: &'static str) -> Result<bool> {
        let mut events = self
            .events
            .write()
            .map_err(|_| ChatError::LockPoisoned(constants::ERR_BUS_WRITE_LOCK))?;
        let opcode = opcode.into();
        if events.contains_key(&opcode) {
            return Ok(false);
        }
        events.insert(
            opcode,
            Event {
                name,
                handlers: Vec::new(),
            },
        );
        Ok(true)
    }

    pub fn is_declared(&self, opcode: impl Into<u16>) -> bool {
        let opcode = opcode.into();
        self.events
            .read()
            .map(|events| events.contains_key(&opcode))
            .unwrap_or(false)
    }

    /// Attach a handler at [`PRIORITY_DEFAULT`].
    pub fn connect<F>(&self, opcode: impl Into<u16>, handler: F) -> Result<HandlerId>
    where
        F: Fn(&ServerMessage) + Send + Sync + 'static,
    {
        self.connect_with_priority(opcode, handler, PRIORITY_DEFAULT)
    }

    /// Attach a handler. Lower priorities run first; equal priorities run in
    /// registration order.
    pub fn connect_with_priority<F>(
        &self,
        opcode: impl Into<u16>,
        handler: F,
        priority: u8,
    ) -> Result<HandlerId>
    where
        F: Fn(&ServerMessage) + Send + Sync + 'static,
    {
        let opcode = opcode.into();
        let mut events = self
            .events
            .write()
            .map_err(|_| ChatError::LockPoisoned(constants::ERR_BUS_WRITE_LOCK))?;
        let event = events
            .get_mut(&opcode)
            .ok_or(ConfigError::UnknownEvent(opcode))?;

        let id = HandlerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let position = event.handlers.partition_point(|r| r.priority <= priority);
        event.handlers.insert(
            position,
            Registration {
                id,
                priority,
                handler: Arc::new(handler),
            },
        );
        debug!(event = event.name, opcode, priority, ?id, "Handler connected");
        Ok(id)
    }

    /// Detach exactly one registration.
    pub fn disconnect(&self, opcode: impl Into<u16>, id: HandlerId) -> Result<()> {
        let opcode = opcode.into();
        let mut events = self
            .events
            .write()
            .map_err(|_| ChatError::LockPoisoned(constants::ERR_BUS_WRITE_LOCK))?;
        let event = events
            .get_mut(&opcode)
            .ok_or(ConfigError::UnknownEvent(opcode))?;
        let position = event
            .handlers
            .iter()
            .position(|r| r.id == id)
            .ok_or(ConfigError::NotRegistered(opcode))?;
        event.handlers.remove(position);
        debug!(event = event.name, opcode, ?id, "Handler disconnected");
        Ok(())
    }

    /// Number of handlers attached to an opcode
    pub fn handler_count(&self, opcode: impl Into<u16>) -> usize {
        let opcode = opcode.into();
        self.events
            .read()
            .ok()
            .and_then(|events| events.get(&opcode).map(|e| e.handlers.len()))
            .unwrap_or(0)
    }

    /// Observe every received packet before it is decoded.
    pub fn tap<F>(&self, handler: F) -> Result<()>
    where
        F: Fn(u16, &[u8]) + Send + Sync + 'static,
    {
        self.taps
            .write()
            .map_err(|_| ChatError::LockPoisoned(constants::ERR_BUS_WRITE_LOCK))?
            .push(Arc::new(handler));
        Ok(())
    }

    pub(crate) fn offer_raw(&self, opcode: u16, raw: &[u8]) {
        let taps: Vec<Arc<TapFn>> = match self.taps.read() {
            Ok(taps) => taps.clone(),
            Err(_) => return,
        };
        for tap in taps {
            if catch_unwind(AssertUnwindSafe(|| tap(opcode, raw))).is_err() {
                error!(opcode, "Packet tap panicked");
            }
        }
    }

    /// Run every handler attached to the message's opcode, in priority order,
    /// before returning. Returns how many handlers ran; an undeclared opcode
    /// runs none.
    ///
    /// A panicking handler is logged and skipped so the remaining handlers and
    /// later packets are still served.
    pub fn trigger(&self, message: &ServerMessage) -> Result<usize> {
        let opcode = message.opcode().as_u16();
        let (name, handlers): (&'static str, Vec<Arc<HandlerFn>>) = {
            let events = self
                .events
                .read()
                .map_err(|_| ChatError::LockPoisoned(constants::ERR_BUS_READ_LOCK))?;
            match events.get(&opcode) {
                Some(event) => (
                    event.name,
                    event.handlers.iter().map(|r| r.handler.clone()).collect(),
                ),
                None => return Ok(0),
            }
        };

        for handler in &handlers {
            if catch_unwind(AssertUnwindSafe(|| handler(message))).is_err() {
                error!(event = name, opcode, "Event handler panicked");
            }
        }
        Ok(handlers.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn recorder() -> (Arc<Mutex<Vec<u8>>>, impl Fn(u8) -> Box<dyn Fn(&ServerMessage) + Send + Sync>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = log.clone();
        let make = move |tag: u8| {
            let sink = sink.clone();
            Box::new(move |_: &ServerMessage| sink.lock().unwrap().push(tag))
                as Box<dyn Fn(&ServerMessage) + Send + Sync>
        };
        (log, make)
    }

    #[test]
    fn test_priority_order() {
        let bus = EventBus::new();
        let (log, make) = recorder();
        for priority in [5u8, 1, 3] {
            bus.connect_with_priority(ServerOpcode::Ping, make(priority), priority)
                .unwrap();
        }
        assert_eq!(bus.trigger(&ServerMessage::Ping).unwrap(), 3);
        assert_eq!(*log.lock().unwrap(), vec![1, 3, 5]);
    }

    #[test]
    fn test_equal_priority_keeps_registration_order() {
        let bus = EventBus::new();
        let (log, make) = recorder();
        bus.connect(ServerOpcode::Ping, make(10)).unwrap();
        bus.connect(ServerOpcode::Ping, make(20)).unwrap();
        bus.connect_with_priority(ServerOpcode::Ping, make(0), PRIORITY_INTERNAL)
            .unwrap();
        bus.connect(ServerOpcode::Ping, make(30)).unwrap();
        bus.trigger(&ServerMessage::Ping).unwrap();
        assert_eq!(*log.lock().unwrap(), vec![0, 10, 20, 30]);
    }

    #[test]
    fn test_connect_undeclared_event_fails() {
        let bus = EventBus::new();
        let err = bus.connect(ServerOpcode::ChannelKick, |_| {}).unwrap_err();
        assert!(matches!(
            err,
            ChatError::Config(ConfigError::UnknownEvent(0x31))
        ));
        assert!(bus.connect(0xBEEFu16, |_| {}).is_err());
    }

    #[test]
    fn test_disconnect_removes_one_registration() {
        let bus = EventBus::new();
        let (log, make) = recorder();
        let first = bus.connect(ServerOpcode::Ping, make(1)).unwrap();
        bus.connect(ServerOpcode::Ping, make(2)).unwrap();

        bus.disconnect(ServerOpcode::Ping, first).unwrap();
        bus.trigger(&ServerMessage::Ping).unwrap();
        assert_eq!(*log.lock().unwrap(), vec![2]);

        let err = bus.disconnect(ServerOpcode::Ping, first).unwrap_err();
        assert!(matches!(
            err,
            ChatError::Config(ConfigError::NotRegistered(0x2A00))
        ));
    }

    #[test]
    fn test_disconnect_on_wrong_event_fails() {
        let bus = EventBus::new();
        let id = bus.connect(ServerOpcode::Ping, |_| {}).unwrap();
        assert!(bus.disconnect(ServerOpcode::Whisper, id).is_err());
        assert_eq!(bus.handler_count(ServerOpcode::Ping), 1);
    }

    #[test]
    fn test_panicking_handler_does_not_stop_the_rest() {
        let bus = EventBus::new();
        let (log, make) = recorder();
        bus.connect_with_priority(ServerOpcode::Ping, |_| panic!("handler bug"), 1)
            .unwrap();
        bus.connect(ServerOpcode::Ping, make(7)).unwrap();
        assert_eq!(bus.trigger(&ServerMessage::Ping).unwrap(), 2);
        assert_eq!(*log.lock().unwrap(), vec![7]);
    }

    #[test]
    fn test_handler_may_detach_itself() {
        let bus = Arc::new(EventBus::new());
        let slot: Arc<Mutex<Option<HandlerId>>> = Arc::new(Mutex::new(None));
        let (bus_ref, slot_ref) = (bus.clone(), slot.clone());
        let id = bus
            .connect(ServerOpcode::Ping, move |_| {
                if let Some(id) = slot_ref.lock().unwrap().take() {
                    bus_ref.disconnect(ServerOpcode::Ping, id).unwrap();
                }
            })
            .unwrap();
        *slot.lock().unwrap() = Some(id);

        assert_eq!(bus.trigger(&ServerMessage::Ping).unwrap(), 1);
        assert_eq!(bus.trigger(&ServerMessage::Ping).unwrap(), 0);
    }

    #[test]
    fn test_declare_is_idempotent() {
        let bus = EventBus::empty();
        assert!(!bus.is_declared(ServerOpcode::Ping));
        assert!(bus.declare(ServerOpcode::Ping, "Ping").unwrap());
        assert!(!bus.declare(ServerOpcode::Ping, "Ping again").unwrap());
        assert!(bus.is_declared(0x2A00u16));
    }
}
