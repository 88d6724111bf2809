//! Raw packet routing.
//!
//! [`PacketRouter::parse`] takes one packet as read from the socket, splits off
//! the opcode, decodes the body and triggers the matching event. Bad packets
//! are reported to the caller and counted, but never poison the router.

use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, trace};

use crate::core::codec::WireCodec;
use crate::core::packet::Packet;
use crate::error::{ProtocolError, Result};
use crate::protocol::dispatcher::EventBus;
use crate::utils::metrics::Metrics;

/// Outcome of routing one packet that decoded successfully
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Routed {
    /// The event was triggered and this many handlers ran
    Dispatched(usize),
    /// Decoded, but no event is declared for the opcode
    Ignored,
}

pub struct PacketRouter {
    codec: Arc<WireCodec>,
    bus: Arc<EventBus>,
    metrics: Arc<Metrics>,
}

impl PacketRouter {
    pub fn new(codec: Arc<WireCodec>, bus: Arc<EventBus>, metrics: Arc<Metrics>) -> Self {
        Self {
            codec,
            bus,
            metrics,
        }
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    /// Route one raw packet.
    ///
    /// Taps see the packet before decoding, so they also observe packets that
    /// later fail with [`ProtocolError::UnknownOpcode`] or
    /// [`ProtocolError::Malformed`].
    pub fn parse(&self, raw: Bytes) -> Result<Routed> {
        let packet = match Packet::from_bytes(raw.clone()) {
            Ok(packet) => packet,
            Err(e) => {
                self.metrics.malformed_packet();
                return Err(e.into());
            }
        };
        self.bus.offer_raw(packet.opcode, &raw);

        let message = match self.codec.decode(packet.opcode, &packet.body) {
            Ok(message) => message,
            Err(e) => {
                match e {
                    ProtocolError::UnknownOpcode(_) => self.metrics.unknown_packet(),
                    _ => self.metrics.malformed_packet(),
                }
                return Err(e.into());
            }
        };
        trace!(opcode = packet.opcode, message = ?message.opcode(), "Decoded packet");

        if !self.bus.is_declared(packet.opcode) {
            debug!(opcode = packet.opcode, "No event declared, ignoring packet");
            return Ok(Routed::Ignored);
        }

        let handlers = self.bus.trigger(&message)?;
        self.metrics.event_dispatched();
        Ok(Routed::Dispatched(handlers))
    }
}
