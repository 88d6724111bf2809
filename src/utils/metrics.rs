//! Observability and Metrics
//!
//! Counters for connection, handshake and packet activity of one engine.
//!
//! Uses atomic counters for thread-safe metrics collection. Each engine owns
//! its own [`Metrics`] behind an `Arc`, so two engines in one process never
//! share numbers.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::info;

/// Metrics collector for one chat engine
#[derive(Debug)]
pub struct Metrics {
    /// TCP connect attempts, successful or not
    pub connect_attempts: AtomicU64,
    /// Connections established
    pub connections_total: AtomicU64,
    /// Connect failures and unexpected socket deaths
    pub connection_errors: AtomicU64,
    /// Authentication handshakes started
    pub handshakes_total: AtomicU64,
    /// Handshakes that saw AUTH_ACCEPTED in time
    pub handshakes_success: AtomicU64,
    /// Handshakes that failed or timed out
    pub handshakes_failed: AtomicU64,
    /// Packets written to the socket
    pub packets_sent: AtomicU64,
    /// Bytes written to the socket
    pub bytes_sent: AtomicU64,
    /// Packets read from the socket
    pub packets_received: AtomicU64,
    /// Bytes read from the socket
    pub bytes_received: AtomicU64,
    /// Packets dropped because no decoder exists for their opcode
    pub unknown_packets: AtomicU64,
    /// Packets dropped because their payload did not match the opcode's shape
    pub malformed_packets: AtomicU64,
    /// Events triggered on the bus
    pub events_dispatched: AtomicU64,
    start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            connect_attempts: AtomicU64::new(0),
            connections_total: AtomicU64::new(0),
            connection_errors: AtomicU64::new(0),
            handshakes_total: AtomicU64::new(0),
            handshakes_success: AtomicU64::new(0),
            handshakes_failed: AtomicU64::new(0),
            packets_sent: AtomicU64::new(0),
            bytes_sent: AtomicU64::new(0),
            packets_received: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
            unknown_packets: AtomicU64::new(0),
            malformed_packets: AtomicU64::new(0),
            events_dispatched: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn connect_attempt(&self) {
        self.connect_attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_established(&self) {
        self.connections_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_error(&self) {
        self.connection_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn handshake_attempt(&self) {
        self.handshakes_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn handshake_success(&self) {
        self.handshakes_success.fetch_add(1, Ordering::Relaxed);
    }

    pub fn handshake_failed(&self) {
        self.handshakes_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn packet_sent(&self, byte_count: u64) {
        self.packets_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(byte_count, Ordering::Relaxed);
    }

    pub fn packet_received(&self, byte_count: u64) {
        self.packets_received.fetch_add(1, Ordering::Relaxed);
        self.bytes_received.fetch_add(byte_count, Ordering::Relaxed);
    }

    pub fn unknown_packet(&self) {
        self.unknown_packets.fetch_add(1, Ordering::Relaxed);
    }

    pub fn malformed_packet(&self) {
        self.malformed_packets.fetch_add(1, Ordering::Relaxed);
    }

    pub fn event_dispatched(&self) {
        self.events_dispatched.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current metrics snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            connect_attempts: self.connect_attempts.load(Ordering::Relaxed),
            connections_total: self.connections_total.load(Ordering::Relaxed),
            connection_errors: self.connection_errors.load(Ordering::Relaxed),
            handshakes_total: self.handshakes_total.load(Ordering::Relaxed),
            handshakes_success: self.handshakes_success.load(Ordering::Relaxed),
            handshakes_failed: self.handshakes_failed.load(Ordering::Relaxed),
            packets_sent: self.packets_sent.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            packets_received: self.packets_received.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            unknown_packets: self.unknown_packets.load(Ordering::Relaxed),
            malformed_packets: self.malformed_packets.load(Ordering::Relaxed),
            events_dispatched: self.events_dispatched.load(Ordering::Relaxed),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }

    /// Log current metrics
    pub fn log_metrics(&self) {
        let snapshot = self.snapshot();
        info!(
            connect_attempts = snapshot.connect_attempts,
            connections_total = snapshot.connections_total,
            connection_errors = snapshot.connection_errors,
            handshakes_total = snapshot.handshakes_total,
            handshakes_success = snapshot.handshakes_success,
            handshakes_failed = snapshot.handshakes_failed,
            packets_sent = snapshot.packets_sent,
            bytes_sent = snapshot.bytes_sent,
            packets_received = snapshot.packets_received,
            bytes_received = snapshot.bytes_received,
            unknown_packets = snapshot.unknown_packets,
            malformed_packets = snapshot.malformed_packets,
            events_dispatched = snapshot.events_dispatched,
            uptime_seconds = snapshot.uptime_seconds,
            "Chat engine metrics snapshot"
        );
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of metrics at a point in time
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub connect_attempts: u64,
    pub connections_total: u64,
    pub connection_errors: u64,
    pub handshakes_total: u64,
    pub handshakes_success: u64,
    pub handshakes_failed: u64,
    pub packets_sent: u64,
    pub bytes_sent: u64,
    pub packets_received: u64,
    pub bytes_received: u64,
    pub unknown_packets: u64,
    pub malformed_packets: u64,
    pub events_dispatched: u64,
    pub uptime_seconds: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let metrics = Metrics::new();
        metrics.packet_received(10);
        metrics.packet_received(5);
        metrics.unknown_packet();
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.packets_received, 2);
        assert_eq!(snapshot.bytes_received, 15);
        assert_eq!(snapshot.unknown_packets, 1);
        assert_eq!(snapshot.packets_sent, 0);
    }
}
