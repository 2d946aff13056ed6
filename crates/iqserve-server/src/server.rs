//! The streaming server: accept loop, command routing, sample fan-out.
//!
//! The server owns the radio control session and the set of live
//! connections. Sample buffers from the session are fanned out to every
//! connection's queue without blocking on any of them; commands from any
//! connection are routed to the session's setters; a disconnect
//! notification removes the connection from the set.
//!
//! Startup order: session first, then the listening socket, then the
//! accept loop. Shutdown order: accept loop, session, remaining
//! connections. Both orders hold on every exit path, including the fatal
//! device-removed path.

use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Mutex, broadcast, mpsc, watch};
use tracing::{debug, error, info, warn};

use iqserve_core::{DirectSampling, Error, GainMode, Result, TunerEvent};
use iqserve_protocol::{Command, CommandType, DecodedCommand, encode_header};

use crate::connection::{ClientCommand, ConnectionHandle, spawn_connection};
use crate::session::RadioSession;

/// The port rtl_tcp clients expect by default.
pub const DEFAULT_PORT: u16 = 1234;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind the listener on.
    pub bind_addr: IpAddr,
    /// Port to listen on.
    pub port: u16,
    /// Outbound queue depth per connection, in sample buffers.
    pub queue_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            bind_addr: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            queue_capacity: 128,
        }
    }
}

/// The rtl_tcp-compatible streaming server.
///
/// Construct with [`bind()`](StreamServer::bind) (which also starts the
/// session), then drive with [`run()`](StreamServer::run). All methods
/// take `&self`; wrap the server in an `Arc` to run it on its own task
/// while retaining control.
pub struct StreamServer {
    config: ServerConfig,
    session: Arc<RadioSession>,
    connections: Arc<Mutex<HashMap<u64, ConnectionHandle>>>,
    next_id: AtomicU64,
    listener: Mutex<Option<TcpListener>>,
    local_addr: SocketAddr,
    shutdown_tx: watch::Sender<bool>,
}

impl StreamServer {
    /// Start the session, then bind the listening socket.
    ///
    /// The session is stopped again if the bind fails, so no exit path
    /// leaves the hardware streaming into nothing.
    pub async fn bind(config: ServerConfig, session: Arc<RadioSession>) -> Result<Self> {
        session.start().await?;

        let listener = match TcpListener::bind((config.bind_addr, config.port)).await {
            Ok(listener) => listener,
            Err(e) => {
                session.stop().await;
                return Err(e.into());
            }
        };
        let local_addr = match listener.local_addr() {
            Ok(addr) => addr,
            Err(e) => {
                session.stop().await;
                return Err(e.into());
            }
        };
        info!(addr = %local_addr, "listening for clients");

        let (shutdown_tx, _) = watch::channel(false);
        Ok(StreamServer {
            config,
            session,
            connections: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(1),
            listener: Mutex::new(Some(listener)),
            local_addr,
            shutdown_tx,
        })
    }

    /// The address the listener is bound on.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Request an orderly shutdown of a running server.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Number of currently live connections.
    pub async fn connection_count(&self) -> usize {
        self.connections.lock().await.len()
    }

    /// Run the accept loop until shutdown or a fatal device event.
    ///
    /// Returns `Ok(())` on requested shutdown and
    /// [`Error::DeviceRemoved`] when the receiver disappeared.
    pub async fn run(&self) -> Result<()> {
        let listener = match self.listener.lock().await.take() {
            Some(listener) => listener,
            None => return Err(Error::AlreadyRunning),
        };

        let (command_tx, mut command_rx) = mpsc::channel::<ClientCommand>(256);
        let (closed_tx, mut closed_rx) = mpsc::channel::<u64>(64);
        let fanout = self.spawn_fanout();

        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let mut events = self.session.subscribe_events();
        let mut outcome: Result<()> = Ok(());

        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    info!("shutdown requested");
                    break;
                }
                accepted = listener.accept() => match accepted {
                    Ok((stream, addr)) => {
                        self.register_connection(stream, addr, &command_tx, &closed_tx).await;
                    }
                    Err(e) => {
                        error!(error = %e, "accept failed");
                    }
                },
                Some(command) = command_rx.recv() => {
                    self.route_command(command).await;
                }
                Some(id) = closed_rx.recv() => {
                    self.remove_connection(id).await;
                }
                event = events.recv() => match event {
                    Ok(TunerEvent::DeviceRemoved) => {
                        error!("device removed, forcing shutdown");
                        outcome = Err(Error::DeviceRemoved);
                        break;
                    }
                    Ok(TunerEvent::Overload { .. }) => {
                        // Advisory; the session already logged it.
                    }
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        warn!(missed, "event stream lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
            }
        }

        // Ordered shutdown: accept loop first, session second, remaining
        // connections last.
        drop(listener);
        self.session.stop().await;

        let remaining: Vec<ConnectionHandle> = {
            let mut connections = self.connections.lock().await;
            connections.drain().map(|(_, handle)| handle).collect()
        };
        for handle in remaining {
            debug!(id = handle.id(), "tearing down connection");
            handle.teardown().await;
        }

        let _ = self.shutdown_tx.send(true);
        let _ = fanout.await;
        info!("server stopped");
        outcome
    }

    /// Spawn the task that fans session samples out to every connection.
    fn spawn_fanout(&self) -> tokio::task::JoinHandle<()> {
        let mut sample_rx = self.session.subscribe_samples();
        let connections = Arc::clone(&self.connections);
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => break,
                    received = sample_rx.recv() => match received {
                        Ok(buf) => {
                            let conns = connections.lock().await;
                            for conn in conns.values() {
                                if !conn.try_enqueue(buf.clone()) {
                                    warn!(
                                        id = conn.id(),
                                        "client queue full, dropping sample buffer"
                                    );
                                }
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(missed)) => {
                            warn!(missed, "sample fan-out lagged");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            }
        })
    }

    /// Build and register a connection for an accepted socket.
    async fn register_connection(
        &self,
        stream: TcpStream,
        addr: SocketAddr,
        command_tx: &mpsc::Sender<ClientCommand>,
        closed_tx: &mpsc::Sender<u64>,
    ) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let info = self.session.tuner_info();
        let header = encode_header(info.kind, info.gain_levels);
        let handle = spawn_connection(
            id,
            stream,
            addr,
            header,
            self.config.queue_capacity,
            command_tx.clone(),
            closed_tx.clone(),
        );
        info!(id, %addr, "client connected");
        self.connections.lock().await.insert(id, handle);
    }

    /// Remove a connection after its coordinator reported the disconnect.
    ///
    /// The workers are already joined by the time the notification
    /// arrives, so removal never blocks on connection teardown.
    async fn remove_connection(&self, id: u64) {
        let removed = self.connections.lock().await.remove(&id);
        match removed {
            Some(handle) => info!(id, addr = %handle.addr(), "client disconnected"),
            None => debug!(id, "disconnect for already-removed connection"),
        }
    }

    /// Route one client command to the session.
    async fn route_command(&self, command: ClientCommand) {
        let id = command.connection_id;
        match command.decoded {
            DecodedCommand::Known(Command { kind, value }) => match kind {
                CommandType::Tune => self.session.set_frequency(value as u64).await,
                CommandType::SampleRate => self.session.set_sample_rate(value).await,
                CommandType::GainMode => {
                    let mode = if value == 0 {
                        GainMode::Automatic
                    } else {
                        GainMode::Manual
                    };
                    self.session.set_gain_mode(mode).await;
                }
                CommandType::FreqCorrection => {
                    self.session.set_frequency_correction(value as i32).await;
                }
                CommandType::AgcMode => self.session.set_agc(value != 0).await,
                CommandType::DirectSampling => {
                    match DirectSampling::from_wire_value(value) {
                        Some(mode) => self.session.set_direct_sampling(mode).await,
                        None => warn!(id, value, "invalid direct sampling value"),
                    }
                }
                CommandType::OffsetTuning => self.session.set_offset_tuning(value != 0).await,
                CommandType::TunerGainIndex => self.session.set_gain_level(value).await,
                CommandType::BiasTee => self.session.set_bias_tee(value != 0).await,
                CommandType::TunerGain
                | CommandType::IfGain
                | CommandType::TestMode
                | CommandType::RtlXtal
                | CommandType::TunerXtal => {
                    debug!(id, %kind, value, "legacy RTL control ignored");
                }
            },
            DecodedCommand::Unknown { code, value } => {
                debug!(id, code, value, "unrecognized command type ignored");
            }
        }
    }
}
