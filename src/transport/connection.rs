//! # Connection Manager
//!
//! Owns the single TCP connection to the chat server and its background tasks.
//!
//! ## State machine
//! ```text
//! Disconnected -> Connecting -> Connected -> Authenticating -> Authenticated
//!      ^              |                            |
//!      |              +-------> Failed <-----------+
//!      +---- disconnect() or socket death (from any state)
//! ```
//!
//! A live connection runs three tasks: the listener (reads), the dispatcher
//! (runs handlers) and the reply task (answers PING with PONG). All writes go
//! through one writer lock, reads use the independent read half.

use std::fmt;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use futures::SinkExt;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, error, info, instrument, trace, warn};

use crate::config::ChatConfig;
use crate::core::codec::{PacketCodec, WireCodec};
use crate::core::opcode::ServerOpcode;
use crate::error::{constants, ChatError, ConnectionError, Result};
use crate::protocol::dispatcher::{EventBus, PRIORITY_INTERNAL};
use crate::protocol::message::ClientMessage;
use crate::protocol::roster::Roster;
use crate::protocol::router::PacketRouter;
use crate::transport::listener::{self, DispatchHandle};
use crate::utils::metrics::Metrics;
use crate::utils::timeout::with_timeout_error;

type Writer = tokio::sync::Mutex<Option<FramedWrite<OwnedWriteHalf, PacketCodec>>>;
type ReplySlot = Mutex<Option<mpsc::UnboundedSender<ClientMessage>>>;

/// Lifecycle of the chat connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Authenticating,
    Authenticated,
    /// The last connect or authentication attempt failed
    Failed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Authenticating => "authenticating",
            ConnectionState::Authenticated => "authenticated",
            ConnectionState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Flags shared with the listener and the internal handlers
#[derive(Default)]
pub(crate) struct ConnectionFlags {
    connected: AtomicBool,
    authenticated: AtomicBool,
    state: Mutex<ConnectionState>,
}

impl ConnectionFlags {
    fn set_state(&self, state: ConnectionState) {
        match self.state.lock() {
            Ok(mut current) => *current = state,
            Err(poisoned) => {
                warn!("{}", constants::ERR_STATE_LOCK);
                *poisoned.into_inner() = state;
            }
        }
    }

    fn state(&self) -> ConnectionState {
        match self.state.lock() {
            Ok(state) => *state,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    fn connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn authenticated(&self) -> bool {
        self.authenticated.load(Ordering::SeqCst)
    }

    fn clear(&self) {
        self.connected.store(false, Ordering::SeqCst);
        self.authenticated.store(false, Ordering::SeqCst);
    }

    /// The socket died underneath us
    pub(crate) fn mark_lost(&self) {
        self.clear();
        self.set_state(ConnectionState::Disconnected);
    }

    /// AUTH_ACCEPTED only counts while the socket is up
    fn mark_authenticated(&self) -> bool {
        if !self.connected() {
            return false;
        }
        self.authenticated.store(true, Ordering::SeqCst);
        self.set_state(ConnectionState::Authenticated);
        true
    }
}

struct Live {
    shutdown_tx: mpsc::Sender<()>,
    listener: JoinHandle<()>,
    dispatch: DispatchHandle,
    reply: JoinHandle<()>,
}

pub struct ConnectionManager {
    config: ChatConfig,
    flags: Arc<ConnectionFlags>,
    bus: Arc<EventBus>,
    router: Arc<PacketRouter>,
    roster: Arc<Roster>,
    metrics: Arc<Metrics>,
    writer: Arc<Writer>,
    replies: Arc<ReplySlot>,
    live: tokio::sync::Mutex<Option<Live>>,
}

impl ConnectionManager {
    /// Build a manager with every event declared and the internal bookkeeping
    /// handlers attached ahead of any caller handler.
    pub fn new(config: ChatConfig) -> Self {
        let metrics = Arc::new(Metrics::new());
        let bus = Arc::new(EventBus::new());
        let router = Arc::new(PacketRouter::new(
            Arc::new(WireCodec::new()),
            bus.clone(),
            metrics.clone(),
        ));

        let manager = Self {
            config,
            flags: Arc::new(ConnectionFlags::default()),
            bus,
            router,
            roster: Arc::new(Roster::new()),
            metrics,
            writer: Arc::new(tokio::sync::Mutex::new(None)),
            replies: Arc::new(Mutex::new(None)),
            live: tokio::sync::Mutex::new(None),
        };
        if let Err(e) = manager.install_internal_handlers() {
            error!(error = %e, "Failed to install internal handlers");
        }
        manager
    }

    fn install_internal_handlers(&self) -> Result<()> {
        let flags = self.flags.clone();
        self.bus.connect_with_priority(
            ServerOpcode::AuthAccepted,
            move |_| {
                if flags.mark_authenticated() {
                    info!("Authenticated with the chat server");
                } else {
                    debug!("AUTH_ACCEPTED after disconnect, ignoring");
                }
            },
            PRIORITY_INTERNAL,
        )?;

        let replies = self.replies.clone();
        self.bus.connect_with_priority(
            ServerOpcode::Ping,
            move |_| {
                let slot = match replies.lock() {
                    Ok(slot) => slot,
                    Err(poisoned) => poisoned.into_inner(),
                };
                match slot.as_ref() {
                    Some(tx) => {
                        trace!("Ping received, queueing pong");
                        let _ = tx.send(ClientMessage::Pong);
                    }
                    None => debug!("Ping received while disconnected"),
                }
            },
            PRIORITY_INTERNAL,
        )?;

        for opcode in [
            ServerOpcode::JoinedChannel,
            ServerOpcode::EnteredChannel,
            ServerOpcode::LeftChannel,
        ] {
            let roster = self.roster.clone();
            self.bus
                .connect_with_priority(opcode, move |message| roster.apply(message), PRIORITY_INTERNAL)?;
        }
        Ok(())
    }

    /// Open the TCP connection and start the listener.
    ///
    /// Any live connection is disconnected first. On failure the manager is
    /// left in [`ConnectionState::Failed`] with nothing running.
    #[instrument(skip(self), fields(address = %address, port = port))]
    pub async fn connect(&self, address: &str, port: u16) -> Result<()> {
        if self.live.lock().await.is_some() {
            info!("Replacing the existing chat connection");
        }
        self.disconnect().await;

        self.flags.set_state(ConnectionState::Connecting);
        self.metrics.connect_attempt();

        let connect = async {
            TcpStream::connect((address, port))
                .await
                .map_err(|e| ChatError::from(connect_error(e, address, port)))
        };
        let stream = match with_timeout_error(connect, self.config.connect_timeout).await {
            Ok(stream) => stream,
            Err(e) => {
                warn!(
                    error = %e,
                    timeout_ms = ?self.config.connect_timeout.as_millis(),
                    "Failed to connect to the chat server"
                );
                self.metrics.connection_error();
                self.flags.set_state(ConnectionState::Failed);
                return Err(e);
            }
        };
        if let Err(e) = stream.set_nodelay(true) {
            debug!(error = %e, "Could not disable Nagle");
        }

        let (read_half, write_half) = stream.into_split();
        *self.writer.lock().await = Some(FramedWrite::new(write_half, PacketCodec));

        let (reply_tx, reply_rx) = mpsc::unbounded_channel();
        match self.replies.lock() {
            Ok(mut slot) => *slot = Some(reply_tx),
            Err(poisoned) => *poisoned.into_inner() = Some(reply_tx),
        }
        let reply = tokio::spawn(reply_loop(
            reply_rx,
            self.writer.clone(),
            self.metrics.clone(),
        ));

        let (dispatch, dispatch_handle) = listener::start_dispatch(
            self.config.dispatch,
            self.config.dispatch_queue,
            self.router.clone(),
        );

        self.flags.connected.store(true, Ordering::SeqCst);
        self.flags.set_state(ConnectionState::Connected);

        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>(1);
        let reader =
            FramedRead::with_capacity(read_half, PacketCodec, self.config.read_buffer_size);
        let listener = tokio::spawn(listener::run(
            reader,
            dispatch,
            shutdown_rx,
            self.flags.clone(),
            self.config.read_timeout,
            self.metrics.clone(),
        ));

        *self.live.lock().await = Some(Live {
            shutdown_tx,
            listener,
            dispatch: dispatch_handle,
            reply,
        });
        self.metrics.connection_established();
        info!("Connected to the chat server");
        Ok(())
    }

    /// Close the connection and wait for every background task to stop.
    ///
    /// Safe to call at any time and any number of times; always ends in
    /// [`ConnectionState::Disconnected`].
    #[instrument(skip(self))]
    pub async fn disconnect(&self) {
        self.flags.clear();
        match self.replies.lock() {
            Ok(mut slot) => *slot = None,
            Err(poisoned) => *poisoned.into_inner() = None,
        }

        let live = self.live.lock().await.take();
        if let Some(live) = live {
            let _ = live.shutdown_tx.try_send(());

            if let Some(mut writer) = self.writer.lock().await.take() {
                if let Err(e) = writer.get_mut().shutdown().await {
                    debug!(error = %e, "Socket shutdown failed");
                }
            }

            let limit = self.config.shutdown_timeout;
            let mut listener = live.listener;
            match tokio::time::timeout(limit, &mut listener).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(error = %e, "Listener ended abnormally"),
                Err(_) => {
                    warn!("Listener did not stop in time, aborting");
                    listener.abort();
                }
            }
            live.dispatch.join(limit).await;

            let mut reply = live.reply;
            if tokio::time::timeout(limit, &mut reply).await.is_err() {
                reply.abort();
            }
            info!("Disconnected from the chat server");
            self.metrics.log_metrics();
        } else {
            self.writer.lock().await.take();
        }

        self.roster.clear();
        self.flags.set_state(ConnectionState::Disconnected);
    }

    /// Socket-level liveness.
    ///
    /// A set flag is only trusted while the listener is running; a stale flag
    /// is corrected here.
    pub fn is_connected(&self) -> bool {
        if !self.flags.connected() {
            return false;
        }
        let alive = match self.live.try_lock() {
            Ok(live) => live
                .as_ref()
                .map(|live| !live.listener.is_finished())
                .unwrap_or(false),
            // connect or disconnect in progress, trust the flag
            Err(_) => true,
        };
        if !alive {
            warn!("Listener is gone but the connection was flagged live, correcting");
            self.flags.mark_lost();
        }
        alive
    }

    pub fn is_authenticated(&self) -> bool {
        self.flags.authenticated()
    }

    pub fn state(&self) -> ConnectionState {
        self.flags.state()
    }

    /// Write one message. Writers are serialised.
    pub async fn send(&self, message: ClientMessage) -> Result<()> {
        if !self.flags.connected() {
            return Err(ConnectionError::NotConnected.into());
        }
        write_message(&self.writer, &self.metrics, message).await
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    pub fn roster(&self) -> &Arc<Roster> {
        &self.roster
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    pub fn config(&self) -> &ChatConfig {
        &self.config
    }

    /// Takes effect on the next `connect`
    pub fn reconfigure(&mut self, config: ChatConfig) {
        self.config = config;
    }

    /// Only moves forward from `Connected`, so an AUTH_ACCEPTED that raced
    /// ahead is not overwritten.
    pub(crate) fn mark_authenticating(&self) {
        if let Ok(mut state) = self.flags.state.lock() {
            if *state == ConnectionState::Connected {
                *state = ConnectionState::Authenticating;
            }
        }
    }

    pub(crate) fn mark_failed(&self) {
        self.flags.set_state(ConnectionState::Failed);
    }
}

fn connect_error(e: io::Error, address: &str, port: u16) -> ConnectionError {
    match e.kind() {
        io::ErrorKind::ConnectionRefused => ConnectionError::Refused(format!("{address}:{port}")),
        io::ErrorKind::TimedOut => ConnectionError::Timeout,
        io::ErrorKind::ConnectionReset => ConnectionError::Reset,
        _ => ConnectionError::Io(e),
    }
}

async fn write_message(writer: &Writer, metrics: &Metrics, message: ClientMessage) -> Result<()> {
    let opcode = message.opcode();
    let frame = WireCodec::encode(&message).freeze();
    let len = frame.len();

    let mut guard = writer.lock().await;
    let sink = guard.as_mut().ok_or(ConnectionError::NotConnected)?;
    match sink.send(frame).await {
        Ok(()) => {
            metrics.packet_sent(len as u64);
            trace!(opcode = %opcode, bytes = len, "Packet sent");
            Ok(())
        }
        Err(ChatError::Connection(ConnectionError::Io(e))) => {
            Err(ConnectionError::SendFailed(e).into())
        }
        Err(e) => Err(e),
    }
}

async fn reply_loop(
    mut rx: mpsc::UnboundedReceiver<ClientMessage>,
    writer: Arc<Writer>,
    metrics: Arc<Metrics>,
) {
    while let Some(message) = rx.recv().await {
        if let Err(e) = write_message(&writer, &metrics, message).await {
            warn!(error = %e, "Failed to send automatic reply");
        }
    }
}
