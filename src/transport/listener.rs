//! Per-connection read loop and packet dispatch.
//!
//! The listener only reads. Every packet is handed to a [`Dispatch`] which
//! runs the router on blocking-capable worker threads, so slow handlers never
//! stall socket reads.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::StreamExt;
use tokio::net::tcp::OwnedReadHalf;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinHandle;
use tokio_util::codec::FramedRead;
use tracing::{debug, info, trace, warn};

use crate::config::DispatchMode;
use crate::core::codec::PacketCodec;
use crate::error::constants::ERR_CONNECTION_CLOSED;
use crate::error::{ChatError, ProtocolError};
use crate::protocol::router::PacketRouter;
use crate::transport::connection::ConnectionFlags;
use crate::utils::metrics::Metrics;

/// Where the listener sends packets it has read
pub(crate) enum Dispatch {
    /// Bounded queue drained in order by a single worker
    Ordered(mpsc::Sender<Bytes>),
    /// One worker per packet, concurrency capped by the semaphore
    Parallel {
        router: Arc<PacketRouter>,
        permits: Arc<Semaphore>,
    },
}

/// Handle used by `disconnect` to wait for dispatch to drain
pub(crate) enum DispatchHandle {
    Ordered(JoinHandle<()>),
    Parallel {
        permits: Arc<Semaphore>,
        max_in_flight: u32,
    },
}

impl DispatchHandle {
    /// Wait until no handler is running and none will start
    pub(crate) async fn join(self, limit: Duration) {
        match self {
            DispatchHandle::Ordered(worker) => {
                match tokio::time::timeout(limit, worker).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => warn!(error = %e, "Dispatch worker ended abnormally"),
                    Err(_) => warn!("Dispatch worker still busy at shutdown, detaching"),
                }
            }
            DispatchHandle::Parallel {
                permits,
                max_in_flight,
            } => match tokio::time::timeout(limit, permits.acquire_many(max_in_flight)).await {
                Ok(_) => {}
                Err(_) => warn!("Handlers still running at shutdown, detaching"),
            },
        }
    }
}

/// Start dispatch for one connection
pub(crate) fn start_dispatch(
    mode: DispatchMode,
    queue: usize,
    router: Arc<PacketRouter>,
) -> (Dispatch, DispatchHandle) {
    match mode {
        DispatchMode::Ordered => {
            let (tx, mut rx) = mpsc::channel::<Bytes>(queue.max(1));
            let worker = tokio::task::spawn_blocking(move || {
                while let Some(raw) = rx.blocking_recv() {
                    route(&router, raw);
                }
                trace!("Dispatch queue closed");
            });
            (Dispatch::Ordered(tx), DispatchHandle::Ordered(worker))
        }
        DispatchMode::Parallel { max_in_flight } => {
            let max_in_flight = u32::try_from(max_in_flight.max(1)).unwrap_or(u32::MAX);
            let permits = Arc::new(Semaphore::new(max_in_flight as usize));
            (
                Dispatch::Parallel {
                    router,
                    permits: permits.clone(),
                },
                DispatchHandle::Parallel {
                    permits,
                    max_in_flight,
                },
            )
        }
    }
}

impl Dispatch {
    /// Hand a packet off. Returns false once dispatch can take no more packets.
    async fn offer(&self, raw: Bytes) -> bool {
        match self {
            Dispatch::Ordered(tx) => tx.send(raw).await.is_ok(),
            Dispatch::Parallel { router, permits } => {
                let permit = match permits.clone().acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return false,
                };
                let router = router.clone();
                tokio::task::spawn_blocking(move || {
                    route(&router, raw);
                    drop(permit);
                });
                true
            }
        }
    }
}

fn route(router: &PacketRouter, raw: Bytes) {
    match router.parse(raw) {
        Ok(_) => {}
        Err(ChatError::Protocol(ProtocolError::UnknownOpcode(opcode))) => {
            warn!(opcode = format_args!("0x{opcode:04X}"), "Unknown packet, dropping");
        }
        Err(e) => warn!(error = %e, "Failed to route packet"),
    }
}

/// Read packets until stopped or the socket dies.
///
/// An expired read is routine and just polls again. EOF or a read error marks
/// the connection lost.
pub(crate) async fn run(
    mut reader: FramedRead<OwnedReadHalf, PacketCodec>,
    dispatch: Dispatch,
    mut shutdown_rx: mpsc::Receiver<()>,
    flags: Arc<ConnectionFlags>,
    read_timeout: Duration,
    metrics: Arc<Metrics>,
) {
    debug!("Listener started");
    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => {
                debug!("Listener stop requested");
                break;
            }
            read = tokio::time::timeout(read_timeout, reader.next()) => match read {
                Err(_) => {
                    trace!("Read timed out, polling again");
                }
                Ok(None) => {
                    info!("{}", ERR_CONNECTION_CLOSED);
                    flags.mark_lost();
                    break;
                }
                Ok(Some(Err(e))) => {
                    warn!(error = %e, "Socket read failed");
                    metrics.connection_error();
                    flags.mark_lost();
                    break;
                }
                Ok(Some(Ok(raw))) => {
                    metrics.packet_received(raw.len() as u64);
                    if !dispatch.offer(raw).await {
                        warn!("Dispatch closed, stopping listener");
                        break;
                    }
                }
            }
        }
    }
    debug!("Listener stopped");
}
