//! Persistent TCP link to the dispensing device
//!
//! One [`DeviceLink`] owns at most one socket. Every connect attempt gets a
//! new generation number; reader tasks and reconnect timers carry the
//! generation they were started for and stand down once it is stale.

use crate::error::{LinkError, LinkResult};
use crate::protocol::{CommandBatch, DeviceResponse};
use chrono::{DateTime, Utc};
use futures::{SinkExt, StreamExt};
use parking_lot::RwLock;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::{Mutex, broadcast};
use tokio_util::codec::{AnyDelimiterCodec, FramedRead, FramedWrite, LinesCodec};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Link configuration
#[derive(Debug, Clone)]
pub struct LinkConfig {
    /// `host:port` of the device
    pub addr: String,
    pub connect_timeout: Duration,
    /// Delay before a reconnect attempt after the socket closed
    pub reconnect_delay: Duration,
    /// Close the socket after this long without inbound data
    pub idle_timeout: Duration,
    pub auto_reconnect: bool,
    pub event_capacity: usize,
    pub max_line_length: usize,
    /// Give up on a command write after this long and drop the socket
    pub write_timeout: Duration,
}

impl LinkConfig {
    pub fn new(host: &str, port: u16) -> LinkResult<Self> {
        let host = host.trim();
        if host.is_empty() {
            return Err(LinkError::InvalidConfig("Device host is empty".to_string()));
        }
        if port == 0 {
            return Err(LinkError::InvalidConfig("Device port is 0".to_string()));
        }

        Ok(Self {
            addr: format!("{}:{}", host, port),
            connect_timeout: Duration::from_secs(5),
            reconnect_delay: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(30),
            auto_reconnect: true,
            event_capacity: 256,
            max_line_length: 1024,
            write_timeout: Duration::from_secs(5),
        })
    }

    /// Create from an address string (e.g., "192.168.5.100:8080")
    pub fn from_addr(addr: &str) -> LinkResult<Self> {
        let (host, port) = addr
            .rsplit_once(':')
            .ok_or_else(|| LinkError::InvalidConfig(format!("Invalid address: {}", addr)))?;
        let port = port
            .parse()
            .map_err(|_| LinkError::InvalidConfig(format!("Invalid port in address: {}", addr)))?;
        Self::new(host, port)
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    pub fn with_auto_reconnect(mut self, enabled: bool) -> Self {
        self.auto_reconnect = enabled;
        self
    }
}

/// Socket state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
        })
    }
}

/// Events published by the link
#[derive(Debug, Clone)]
pub enum LinkEvent {
    Connected,
    Disconnected,
    CommandSent {
        batch: CommandBatch,
        at: DateTime<Utc>,
    },
    Response(DeviceResponse),
    /// Transport problem; the link recovers on its own
    Error(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct LinkStatus {
    pub state: ConnectionState,
    pub addr: String,
}

struct Session {
    sink: FramedWrite<OwnedWriteHalf, LinesCodec>,
    stop: CancellationToken,
}

struct Inner {
    config: LinkConfig,
    state: RwLock<ConnectionState>,
    generation: AtomicU64,
    auto_reconnect: AtomicBool,
    // lock order: session, then state
    session: Mutex<Option<Session>>,
    events: broadcast::Sender<LinkEvent>,
}

/// Handle to the device connection; clones share the same socket
#[derive(Clone)]
pub struct DeviceLink {
    inner: Arc<Inner>,
}

impl DeviceLink {
    pub fn new(config: LinkConfig) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        Self {
            inner: Arc::new(Inner {
                config,
                state: RwLock::new(ConnectionState::Disconnected),
                generation: AtomicU64::new(0),
                auto_reconnect: AtomicBool::new(false),
                session: Mutex::new(None),
                events,
            }),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LinkEvent> {
        self.inner.events.subscribe()
    }

    pub fn state(&self) -> ConnectionState {
        *self.inner.state.read()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    pub fn status(&self) -> LinkStatus {
        LinkStatus {
            state: self.state(),
            addr: self.inner.config.addr.clone(),
        }
    }

    /// Open the socket and send a `PING`.
    ///
    /// No-op while an attempt is in progress or a socket is up. A failed
    /// attempt is reported through events and, with auto-reconnect on,
    /// retried after `reconnect_delay`; the error is also returned.
    #[instrument(skip(self), fields(addr = %self.inner.config.addr))]
    pub async fn connect(&self) -> LinkResult<()> {
        self.inner
            .auto_reconnect
            .store(self.inner.config.auto_reconnect, Ordering::SeqCst);
        self.open().await
    }

    /// Close the socket for good; no reconnect until the next `connect()`.
    #[instrument(skip(self), fields(addr = %self.inner.config.addr))]
    pub async fn disconnect(&self) {
        self.inner.auto_reconnect.store(false, Ordering::SeqCst);

        let (previous, session) = {
            let mut session = self.inner.session.lock().await;
            let mut state = self.inner.state.write();
            self.inner.generation.fetch_add(1, Ordering::SeqCst);
            (
                std::mem::replace(&mut *state, ConnectionState::Disconnected),
                session.take(),
            )
        };

        if let Some(mut session) = session {
            session.stop.cancel();
            if let Err(e) = SinkExt::<String>::close(&mut session.sink).await {
                debug!(error = %e, "Error while closing device socket");
            }
        }

        if previous != ConnectionState::Disconnected {
            info!("Disconnected from device");
            self.emit(LinkEvent::Disconnected);
        }
    }

    /// Write one command line. Returns `false` when not connected or the
    /// write failed; never errors.
    pub async fn send(&self, batch: &CommandBatch) -> bool {
        match self.try_send(batch).await {
            Ok(()) => true,
            Err(LinkError::NotConnected) => {
                debug!(batch = %batch, "Device not connected, batch not sent");
                false
            }
            Err(e) => {
                warn!(error = %e, batch = %batch, "Failed to send command batch");
                self.emit(LinkEvent::Error(e.to_string()));
                false
            }
        }
    }

    #[instrument(skip(self, batch), fields(batch = %batch))]
    pub async fn try_send(&self, batch: &CommandBatch) -> LinkResult<()> {
        let mut guard = self.inner.session.lock().await;
        let Some(session) = guard.as_mut() else {
            return Err(LinkError::NotConnected);
        };
        if self.state() != ConnectionState::Connected {
            return Err(LinkError::NotConnected);
        }

        let write_timeout = self.inner.config.write_timeout;
        let sent = tokio::time::timeout(write_timeout, session.sink.send(batch.encode())).await;
        match sent {
            Ok(result) => result?,
            Err(_) => {
                // peer stopped reading; release the lock before tearing the session down
                drop(guard);
                let reason = format!("Write stalled for {}ms", write_timeout.as_millis());
                let generation = self.inner.generation.load(Ordering::SeqCst);
                self.close(generation, Some(LinkError::Timeout(reason.clone()).to_string()))
                    .await;
                return Err(LinkError::Timeout(reason));
            }
        }
        drop(guard);

        debug!("Command batch sent");
        self.emit(LinkEvent::CommandSent {
            batch: batch.clone(),
            at: Utc::now(),
        });
        Ok(())
    }

    async fn open(&self) -> LinkResult<()> {
        let generation = {
            let mut state = self.inner.state.write();
            if *state != ConnectionState::Disconnected {
                debug!(state = %*state, "Connect ignored");
                return Ok(());
            }
            *state = ConnectionState::Connecting;
            self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1
        };

        let config = &self.inner.config;
        info!(generation, "Connecting to device");

        let connected = match tokio::time::timeout(
            config.connect_timeout,
            TcpStream::connect(config.addr.as_str()),
        )
        .await
        {
            Ok(Ok(stream)) => Ok(stream),
            Ok(Err(e)) => Err(LinkError::Connection(format!("{}: {}", config.addr, e))),
            Err(_) => Err(LinkError::Timeout(format!(
                "Connection timeout: {}",
                config.addr
            ))),
        };
        let stream = match connected {
            Ok(stream) => stream,
            Err(e) => {
                self.close(generation, Some(e.to_string())).await;
                return Err(e);
            }
        };

        if let Err(e) = stream.set_nodelay(true) {
            debug!(error = %e, "Failed to set TCP_NODELAY");
        }
        let (read_half, write_half) = stream.into_split();
        let stop = CancellationToken::new();

        {
            let mut session = self.inner.session.lock().await;
            let mut state = self.inner.state.write();
            if self.inner.generation.load(Ordering::SeqCst) != generation {
                debug!(generation, "Connect attempt superseded, dropping socket");
                return Ok(());
            }
            *state = ConnectionState::Connected;
            *session = Some(Session {
                sink: FramedWrite::new(write_half, LinesCodec::new()),
                stop: stop.clone(),
            });
        }

        info!(generation, "Connected to device");
        self.emit(LinkEvent::Connected);

        // split on raw bytes so a line with invalid UTF-8 is skipped instead of
        // poisoning the stream
        let lines = FramedRead::new(
            read_half,
            AnyDelimiterCodec::new_with_max_length(
                b"\n".to_vec(),
                Vec::new(),
                config.max_line_length,
            ),
        );
        self.spawn_reader(generation, lines, stop);

        if !self.send(&CommandBatch::ping()).await {
            warn!(generation, "Initial PING could not be sent");
        }
        Ok(())
    }

    fn spawn_reader(
        &self,
        generation: u64,
        lines: FramedRead<OwnedReadHalf, AnyDelimiterCodec>,
        stop: CancellationToken,
    ) {
        let link = self.clone();
        tokio::spawn(async move { link.read_loop(generation, lines, stop).await });
    }

    async fn read_loop(
        self,
        generation: u64,
        mut lines: FramedRead<OwnedReadHalf, AnyDelimiterCodec>,
        stop: CancellationToken,
    ) {
        let idle = self.inner.config.idle_timeout;

        let reason = loop {
            let next = tokio::select! {
                _ = stop.cancelled() => return,
                next = tokio::time::timeout(idle, lines.next()) => next,
            };

            match next {
                Ok(Some(Ok(line))) => self.handle_line(&String::from_utf8_lossy(&line)),
                Ok(Some(Err(e))) => break Some(LinkError::from(e).to_string()),
                Ok(None) => break None,
                Err(_) => {
                    break Some(
                        LinkError::Timeout(format!("No data for {}ms", idle.as_millis()))
                            .to_string(),
                    );
                }
            }
        };

        self.close(generation, reason).await;
    }

    fn handle_line(&self, line: &str) {
        match DeviceResponse::parse(line) {
            Some(response) => {
                debug!(?response, "Device response");
                self.emit(LinkEvent::Response(response));
            }
            None if line.trim().is_empty() => {}
            None => debug!(line, "Ignoring unrecognized device line"),
        }
    }

    /// Close path shared by failed attempts, peer close, IO errors and idle
    /// timeout. Ignored for a stale generation.
    async fn close(&self, generation: u64, reason: Option<String>) {
        let session = {
            let mut session = self.inner.session.lock().await;
            let mut state = self.inner.state.write();
            if self.inner.generation.load(Ordering::SeqCst) != generation {
                return;
            }
            *state = ConnectionState::Disconnected;
            session.take()
        };

        if let Some(session) = session {
            session.stop.cancel();
        }

        match reason {
            Some(reason) => {
                warn!(generation, %reason, "Device connection closed");
                self.emit(LinkEvent::Error(reason));
            }
            None => info!(generation, "Device closed the connection"),
        }
        self.emit(LinkEvent::Disconnected);

        self.schedule_reconnect(generation);
    }

    fn schedule_reconnect(&self, generation: u64) {
        if !self.inner.auto_reconnect.load(Ordering::SeqCst) {
            return;
        }

        let link = self.clone();
        let delay = self.inner.config.reconnect_delay;
        debug!(delay_ms = delay.as_millis() as u64, "Reconnect scheduled");

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // a connect() or disconnect() in the meantime bumped the generation
            if !link.inner.auto_reconnect.load(Ordering::SeqCst)
                || link.inner.generation.load(Ordering::SeqCst) != generation
            {
                return;
            }
            let _ = link.open().await;
        });
    }

    fn emit(&self, event: LinkEvent) {
        // no subscribers is fine
        let _ = self.inner.events.send(event);
    }
}
