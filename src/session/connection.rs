//! Lifecycle of the single serial link and its I/O tasks.
//!
//! One established connection owns two spawned tasks: an inbound pump that
//! reads the transport into the receive buffer and feeds the dispatcher,
//! and a writer that drains the outbound queue. Both identify their
//! connection by generation, so a stale task can never touch the state of
//! a successor connection.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use tokio::io::{AsyncReadExt, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use crate::config::SessionConfig;
use crate::error::{Result, SessionError};
use crate::platform::{Adapter, SerialLink};
use crate::session::buffer::RecvBuffer;
use crate::session::dispatcher::{Dispatcher, SubscriptionStream};
use crate::types::{Address, ConnectionState, Security};

/// One queued outbound write and the caller waiting on its outcome.
struct QueuedWrite {
    data: Vec<u8>,
    done: oneshot::Sender<Result<()>>,
}

/// State that lives exactly as long as one established connection.
struct ActiveLink {
    address: Address,
    generation: u64,
    writes: mpsc::Sender<QueuedWrite>,
    /// Stops the inbound pump. Cancelled on every teardown.
    halt: CancellationToken,
    /// Abandons queued writes. Cancelled only on transport failure; a
    /// graceful disconnect lets the writer drain the queue first.
    abort: CancellationToken,
}

enum Phase {
    Disconnected,
    Connecting {
        attempt: u64,
        cancel: CancellationToken,
    },
    Connected(ActiveLink),
}

struct Shared {
    phase: Phase,
    buffer: RecvBuffer,
    dispatcher: Dispatcher,
    attempt_seq: u64,
    conn_seq: u64,
}

/// Owner of the one connection slot, its receive buffer, and its
/// subscription. All mutation happens under a single async mutex that is
/// never held across transport I/O.
pub(crate) struct ConnectionController<A: Adapter> {
    adapter: Arc<A>,
    shared: Arc<Mutex<Shared>>,
    connect_timeout: Duration,
    write_queue_depth: usize,
    read_chunk_size: usize,
}

impl<A: Adapter> ConnectionController<A> {
    pub fn new(adapter: Arc<A>, config: &SessionConfig) -> Self {
        ConnectionController {
            adapter,
            shared: Arc::new(Mutex::new(Shared {
                phase: Phase::Disconnected,
                buffer: RecvBuffer::new(),
                dispatcher: Dispatcher::new(),
                attempt_seq: 0,
                conn_seq: 0,
            })),
            connect_timeout: config.connect_timeout,
            write_queue_depth: config.write_queue_depth.max(1),
            read_chunk_size: config.read_chunk_size.max(1),
        }
    }

    pub async fn state(&self) -> ConnectionState {
        match &self.shared.lock().await.phase {
            Phase::Disconnected => ConnectionState::Disconnected,
            Phase::Connecting { .. } => ConnectionState::Connecting,
            Phase::Connected(_) => ConnectionState::Connected,
        }
    }

    pub async fn is_connected(&self) -> bool {
        matches!(&self.shared.lock().await.phase, Phase::Connected(_))
    }

    pub async fn connected_address(&self) -> Option<Address> {
        match &self.shared.lock().await.phase {
            Phase::Connected(link) => Some(link.address.clone()),
            _ => None,
        }
    }

    /// Establish the single connection. At most one attempt may be in
    /// flight; [`ConnectionController::disconnect`] cancels a pending one.
    pub async fn connect(&self, address: &Address, security: Security) -> Result<()> {
        let (my_attempt, attempt_cancel) = {
            let mut shared = self.shared.lock().await;
            match &shared.phase {
                Phase::Connecting { .. } => return Err(SessionError::AlreadyConnecting),
                Phase::Connected(link) => {
                    return Err(SessionError::AlreadyConnected {
                        address: link.address.clone(),
                    });
                }
                Phase::Disconnected => {}
            }
            shared.attempt_seq += 1;
            let attempt = shared.attempt_seq;
            let cancel = CancellationToken::new();
            shared.phase = Phase::Connecting {
                attempt,
                cancel: cancel.clone(),
            };
            (attempt, cancel)
        };

        info!("Connecting to {address} ({security:?})");
        let opened = tokio::select! {
            _ = attempt_cancel.cancelled() => {
                Err(connect_failed(address, "attempt cancelled by disconnect"))
            }
            result = timeout(self.connect_timeout, self.adapter.open(address, security)) => {
                match result {
                    Ok(Ok(link)) => Ok(link),
                    Ok(Err(err)) => Err(connect_failed(address, &err.to_string())),
                    Err(_) => Err(connect_failed(address, "timed out")),
                }
            }
        };

        // Resolve the attempt under the lock; only its owner may move the
        // phase on. A disconnect that raced us has already moved it.
        let mut shared = self.shared.lock().await;
        let still_mine = matches!(
            &shared.phase,
            Phase::Connecting { attempt, .. } if *attempt == my_attempt
        );
        let link = match opened {
            Ok(link) if still_mine => link,
            Ok(_link) => {
                debug!("Link to {address} opened after cancellation, dropping it");
                return Err(connect_failed(address, "attempt cancelled by disconnect"));
            }
            Err(err) => {
                if still_mine {
                    shared.phase = Phase::Disconnected;
                }
                warn!("Connection to {address} failed: {err}");
                return Err(err);
            }
        };

        shared.conn_seq += 1;
        let generation = shared.conn_seq;
        shared.buffer = RecvBuffer::new();
        shared.dispatcher = Dispatcher::new();

        let halt = CancellationToken::new();
        let abort = CancellationToken::new();
        let (write_tx, write_rx) = mpsc::channel(self.write_queue_depth);
        let (read_half, write_half) = tokio::io::split(link);

        shared.phase = Phase::Connected(ActiveLink {
            address: address.clone(),
            generation,
            writes: write_tx,
            halt: halt.clone(),
            abort: abort.clone(),
        });
        drop(shared);

        tokio::spawn(pump_inbound(
            self.shared.clone(),
            read_half,
            halt,
            generation,
            self.read_chunk_size,
        ));
        tokio::spawn(drive_writes(
            self.shared.clone(),
            write_rx,
            write_half,
            abort,
            generation,
        ));
        info!("Connected to {address}");
        Ok(())
    }

    /// Tear down whatever is in flight. Safe to call from any task at any
    /// time, including while a connect attempt is pending, and a no-op when
    /// already disconnected.
    pub async fn disconnect(&self) -> Result<()> {
        let mut shared = self.shared.lock().await;
        match std::mem::replace(&mut shared.phase, Phase::Disconnected) {
            Phase::Disconnected => {
                debug!("Disconnect requested while already disconnected");
            }
            Phase::Connecting { cancel, .. } => {
                info!("Cancelling in-flight connection attempt");
                cancel.cancel();
            }
            Phase::Connected(link) => {
                info!("Disconnecting from {}", link.address);
                link.halt.cancel();
                // dropping the link closes the write queue; the writer
                // drains what it already accepted, then shuts the
                // transport down
            }
        }
        shared.buffer.clear();
        shared.dispatcher.deactivate();
        Ok(())
    }

    pub async fn available(&self) -> Result<usize> {
        let shared = self.shared.lock().await;
        ensure_connected(&shared)?;
        Ok(shared.buffer.available())
    }

    /// Drain the whole receive buffer; empty when nothing has arrived.
    pub async fn read(&self) -> Result<Vec<u8>> {
        let mut shared = self.shared.lock().await;
        ensure_connected(&shared)?;
        let Shared {
            buffer, dispatcher, ..
        } = &mut *shared;
        let data = buffer.read_all();
        dispatcher.note_cleared();
        Ok(data)
    }

    /// Drain the buffer through the first occurrence of `delimiter`.
    pub async fn read_until(&self, delimiter: &[u8]) -> Result<Vec<u8>> {
        let mut shared = self.shared.lock().await;
        ensure_connected(&shared)?;
        let Shared {
            buffer, dispatcher, ..
        } = &mut *shared;
        match buffer.read_until(delimiter) {
            Some(frame) => {
                dispatcher.note_drained(frame.len());
                Ok(frame)
            }
            None => Err(SessionError::DelimiterNotFound),
        }
    }

    pub async fn clear(&self) -> Result<()> {
        let mut shared = self.shared.lock().await;
        ensure_connected(&shared)?;
        let Shared {
            buffer, dispatcher, ..
        } = &mut *shared;
        buffer.clear();
        dispatcher.note_cleared();
        Ok(())
    }

    /// Queue `data` for transmission and wait for the transport to take
    /// it. Writes go out strictly in the order the queue accepted them.
    pub async fn write(&self, data: &[u8]) -> Result<()> {
        let queue = {
            let shared = self.shared.lock().await;
            match &shared.phase {
                Phase::Connected(link) => link.writes.clone(),
                _ => return Err(SessionError::NotConnected),
            }
        };
        let (done_tx, done_rx) = oneshot::channel();
        queue
            .send(QueuedWrite {
                data: data.to_vec(),
                done: done_tx,
            })
            .await
            .map_err(|_| SessionError::NotConnected)?;
        match done_rx.await {
            Ok(result) => result,
            // the ack dropped with the queue: torn down before this write
            // reached the transport
            Err(_) => Err(SessionError::NotConnected),
        }
    }

    /// Install the frame subscription for the live connection, replacing
    /// any previous one.
    pub async fn subscribe(&self, delimiter: &[u8]) -> Result<SubscriptionStream> {
        let mut shared = self.shared.lock().await;
        ensure_connected(&shared)?;
        let Shared {
            buffer, dispatcher, ..
        } = &mut *shared;
        Ok(dispatcher.subscribe(delimiter.to_vec(), buffer))
    }

    /// Drop the active subscription. A no-op when none exists, connected
    /// or not.
    pub async fn unsubscribe(&self) -> Result<()> {
        self.shared.lock().await.dispatcher.deactivate();
        Ok(())
    }
}

fn ensure_connected(shared: &Shared) -> Result<()> {
    match &shared.phase {
        Phase::Connected(_) => Ok(()),
        _ => Err(SessionError::NotConnected),
    }
}

fn connect_failed(address: &Address, reason: &str) -> SessionError {
    SessionError::ConnectFailed {
        address: address.clone(),
        reason: reason.to_string(),
    }
}

fn is_current(shared: &Shared, generation: u64) -> bool {
    matches!(&shared.phase, Phase::Connected(link) if link.generation == generation)
}

/// Read the link until it fails, closes, or the connection is torn down.
/// Each chunk lands in the buffer and is offered to the dispatcher under a
/// single lock acquisition, so ordering is arrival order.
async fn pump_inbound<L: SerialLink>(
    shared: Arc<Mutex<Shared>>,
    mut read_half: ReadHalf<L>,
    halt: CancellationToken,
    generation: u64,
    chunk_size: usize,
) {
    let mut chunk = vec![0u8; chunk_size];
    loop {
        let read = tokio::select! {
            _ = halt.cancelled() => break,
            read = read_half.read(&mut chunk) => read,
        };
        match read {
            Ok(0) => {
                debug!("Serial link closed by peer");
                let cause = io::Error::new(io::ErrorKind::UnexpectedEof, "link closed by peer");
                force_disconnect(&shared, generation, cause).await;
                break;
            }
            Ok(n) => {
                let mut guard = shared.lock().await;
                if !is_current(&guard, generation) {
                    break;
                }
                let Shared {
                    buffer, dispatcher, ..
                } = &mut *guard;
                buffer.append(&chunk[..n]);
                dispatcher.dispatch_ready(buffer);
            }
            Err(err) => {
                warn!("Serial link read failed: {err}");
                force_disconnect(&shared, generation, err).await;
                break;
            }
        }
    }
    debug!("Inbound pump stopped");
}

/// Drain the write queue into the transport. A graceful disconnect closes
/// the queue and lets already accepted writes finish; `abort` fires only
/// on transport failure.
async fn drive_writes<L: SerialLink>(
    shared: Arc<Mutex<Shared>>,
    mut queue: mpsc::Receiver<QueuedWrite>,
    mut write_half: WriteHalf<L>,
    abort: CancellationToken,
    generation: u64,
) {
    loop {
        let next = tokio::select! {
            _ = abort.cancelled() => break,
            next = queue.recv() => next,
        };
        let Some(write) = next else { break };
        let outcome = match write_half.write_all(&write.data).await {
            Ok(()) => write_half.flush().await,
            Err(err) => Err(err),
        };
        match outcome {
            Ok(()) => {
                let _ = write.done.send(Ok(()));
            }
            Err(err) => {
                warn!("Serial link write failed: {err}");
                let cause = io::Error::new(err.kind(), err.to_string());
                let _ = write.done.send(Err(SessionError::Transport { source: err }));
                force_disconnect(&shared, generation, cause).await;
                break;
            }
        }
    }
    // remaining acks drop with the queue; their callers see NotConnected
    let _ = write_half.shutdown().await;
    debug!("Write queue closed");
}

/// Transport-failure teardown: flip the state, drop buffered bytes, and
/// hand the subscriber its terminal error. A no-op when `generation` no
/// longer names the live connection.
async fn force_disconnect(shared: &Arc<Mutex<Shared>>, generation: u64, cause: io::Error) {
    let mut guard = shared.lock().await;
    if !is_current(&guard, generation) {
        return;
    }
    if let Phase::Connected(link) = std::mem::replace(&mut guard.phase, Phase::Disconnected) {
        warn!("Link to {} lost: {cause}", link.address);
        link.halt.cancel();
        link.abort.cancel();
    }
    guard.buffer.clear();
    guard.dispatcher.fail(SessionError::Transport { source: cause });
}
