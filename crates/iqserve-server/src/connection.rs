//! One client connection: a socket bridged to the rest of the system.
//!
//! Each accepted socket is owned by exactly one connection, which runs
//! three cooperating tasks:
//!
//! - the **transmit worker** pops buffers off the outbound queue and
//!   writes them to the socket;
//! - the **command worker** reads 5-byte command frames and publishes
//!   them to the server;
//! - the **disconnect coordinator** waits for a single shared signal --
//!   raised by either worker on a transport failure, or by the server on
//!   external teardown -- then cancels and joins both workers and, for a
//!   worker-detected disconnect, raises exactly one connection-closed
//!   notification.
//!
//! The coordinator exists so that a worker never joins itself: whichever
//! task discovers the failure only raises the signal and exits, and the
//! joining happens on the coordinator's own task.
//!
//! The 12-byte capability header is queued at construction, before the
//! connection is registered for sample fan-out, so the client's first
//! read is always the header regardless of sample arrival timing.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::{Notify, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use iqserve_core::SampleBuffer;
use iqserve_protocol::{DecodedCommand, FRAME_LEN, HEADER_LEN, decode_frame};

/// A command received from a client, tagged with its connection.
#[derive(Debug, Clone, Copy)]
pub struct ClientCommand {
    /// Which connection sent the command.
    pub connection_id: u64,
    /// The decoded frame.
    pub decoded: DecodedCommand,
}

/// Server-side handle to a live connection.
///
/// Dropping the handle does not tear the connection down; use
/// [`teardown()`](ConnectionHandle::teardown) for that.
pub struct ConnectionHandle {
    id: u64,
    addr: SocketAddr,
    sample_tx: mpsc::Sender<SampleBuffer>,
    disconnect: Arc<Notify>,
    /// Marks teardown as externally requested, which suppresses the
    /// connection-closed notification.
    external: Arc<AtomicBool>,
    coordinator: JoinHandle<()>,
}

impl ConnectionHandle {
    /// The connection's id.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// The client's remote address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Enqueue a sample buffer without blocking.
    ///
    /// Returns `false` when the queue is full or the connection is going
    /// away; the caller decides whether to log the drop.
    pub fn try_enqueue(&self, buf: SampleBuffer) -> bool {
        self.sample_tx.try_send(buf).is_ok()
    }

    /// Externally tear the connection down and wait for its tasks.
    ///
    /// No connection-closed notification is raised on this path.
    pub async fn teardown(self) {
        self.external.store(true, Ordering::SeqCst);
        self.disconnect.notify_one();
        let _ = self.coordinator.await;
    }
}

/// Spawn the three tasks for an accepted socket and return the handle.
pub fn spawn_connection(
    id: u64,
    stream: TcpStream,
    addr: SocketAddr,
    header: [u8; HEADER_LEN],
    queue_capacity: usize,
    command_tx: mpsc::Sender<ClientCommand>,
    closed_tx: mpsc::Sender<u64>,
) -> ConnectionHandle {
    let (sample_tx, sample_rx) = mpsc::channel(queue_capacity.max(1));

    // Queue the capability header before the connection becomes visible
    // to fan-out; the transmit worker preserves queue order, so the
    // client's first bytes are always these twelve.
    if sample_tx
        .try_send(SampleBuffer::new(header.to_vec()))
        .is_err()
    {
        // Unreachable with a fresh nonzero-capacity queue.
        warn!(id, "failed to queue capability header");
    }

    let disconnect = Arc::new(Notify::new());
    let external = Arc::new(AtomicBool::new(false));
    let (cancel_tx, cancel_rx) = watch::channel(false);
    let (read_half, write_half) = stream.into_split();

    let writer = tokio::spawn(transmit_worker(
        id,
        write_half,
        sample_rx,
        cancel_rx.clone(),
        Arc::clone(&disconnect),
    ));
    let reader = tokio::spawn(command_worker(
        id,
        read_half,
        command_tx,
        cancel_rx,
        Arc::clone(&disconnect),
    ));
    let coordinator = tokio::spawn(coordinate(
        id,
        cancel_tx,
        writer,
        reader,
        Arc::clone(&disconnect),
        Arc::clone(&external),
        closed_tx,
    ));

    ConnectionHandle {
        id,
        addr,
        sample_tx,
        disconnect,
        external,
        coordinator,
    }
}

/// Transmit worker: queue to socket.
async fn transmit_worker(
    id: u64,
    mut socket: OwnedWriteHalf,
    mut queue: mpsc::Receiver<SampleBuffer>,
    mut cancel: watch::Receiver<bool>,
    disconnect: Arc<Notify>,
) {
    loop {
        tokio::select! {
            _ = cancel.changed() => break,
            maybe = queue.recv() => match maybe {
                Some(buf) => {
                    // The write itself must stay cancellation-aware: a
                    // client that stops reading would otherwise pin this
                    // worker in write_all and stall teardown.
                    let result = tokio::select! {
                        _ = cancel.changed() => break,
                        result = socket.write_all(buf.as_bytes()) => result,
                    };
                    if let Err(e) = result {
                        debug!(id, error = %e, "socket write failed");
                        disconnect.notify_one();
                        break;
                    }
                }
                None => {
                    // Queue sender gone; nothing left to transmit.
                    disconnect.notify_one();
                    break;
                }
            },
        }
    }
}

/// Command worker: socket to command channel, 5 bytes at a time.
async fn command_worker(
    id: u64,
    mut socket: OwnedReadHalf,
    command_tx: mpsc::Sender<ClientCommand>,
    mut cancel: watch::Receiver<bool>,
    disconnect: Arc<Notify>,
) {
    let mut frame = [0u8; FRAME_LEN];
    loop {
        tokio::select! {
            _ = cancel.changed() => break,
            result = socket.read_exact(&mut frame) => match result {
                Ok(_) => {
                    let command = ClientCommand {
                        connection_id: id,
                        decoded: decode_frame(&frame),
                    };
                    let sent = tokio::select! {
                        _ = cancel.changed() => false,
                        sent = command_tx.send(command) => sent.is_ok(),
                    };
                    if !sent {
                        disconnect.notify_one();
                        break;
                    }
                }
                Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    // Zero-byte read: the client closed in an orderly way.
                    debug!(id, "client closed the connection");
                    disconnect.notify_one();
                    break;
                }
                Err(e) => {
                    debug!(id, error = %e, "socket read failed");
                    disconnect.notify_one();
                    break;
                }
            },
        }
    }
}

/// Disconnect coordinator: the only place workers are joined.
async fn coordinate(
    id: u64,
    cancel_tx: watch::Sender<bool>,
    writer: JoinHandle<()>,
    reader: JoinHandle<()>,
    disconnect: Arc<Notify>,
    external: Arc<AtomicBool>,
    closed_tx: mpsc::Sender<u64>,
) {
    disconnect.notified().await;
    let _ = cancel_tx.send(true);
    let _ = writer.await;
    let _ = reader.await;

    if external.load(Ordering::SeqCst) {
        debug!(id, "connection torn down");
    } else {
        debug!(id, "connection closed by transport");
        let _ = closed_tx.send(id).await;
    }
}
