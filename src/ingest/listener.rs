//! IngestActor - Accepts simulator connections and applies their messages
//!
//! ## Message Flow
//!
//! ```text
//! accept() ─► spawn worker ─► read once ─► parse ─┬─► CountQuery ─► write count
//!    ↑                                            ├─► Update ─► NetworkState::apply_update ─► log
//!    │                                            └─► Unrecognized ─► drop
//!    └─── Commands (GetStats, Shutdown)
//! ```
//!
//! The accept loop only ever waits on `accept()` and its command channel.
//! Every connection gets its own task, so a peer that never sends anything
//! occupies one idle task and nothing else.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, instrument, trace, warn};

use super::messages::{IngestCommand, IngestCounters, IngestStats};
use super::protocol::{self, Message, READ_BUFFER_SIZE};
use crate::error::NetworkError;
use crate::state::NetworkState;

/// Pause after a failed `accept()` so a persistent error (e.g. out of file
/// descriptors) does not spin the loop
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

pub struct IngestActor {
    listener: TcpListener,

    state: NetworkState,

    /// Command receiver for control messages
    command_rx: mpsc::Receiver<IngestCommand>,

    counters: Arc<IngestCounters>,
}

impl IngestActor {
    pub fn new(
        listener: TcpListener,
        state: NetworkState,
        command_rx: mpsc::Receiver<IngestCommand>,
    ) -> Self {
        Self {
            listener,
            state,
            command_rx,
            counters: Arc::new(IngestCounters::default()),
        }
    }

    /// Run the accept loop until a Shutdown command arrives or every handle is dropped
    #[instrument(skip(self))]
    pub async fn run(mut self) {
        debug!("starting ingest actor");

        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => {
                            IngestCounters::bump(&self.counters.accepted);
                            let state = self.state.clone();
                            let counters = self.counters.clone();
                            tokio::spawn(handle_connection(stream, peer, state, counters));
                        }
                        Err(e) => back_off(&e).await,
                    }
                }

                cmd = self.command_rx.recv() => {
                    match cmd {
                        Some(IngestCommand::GetStats { respond_to }) => {
                            let _ = respond_to.send(self.counters.snapshot());
                        }
                        Some(IngestCommand::Shutdown) => {
                            debug!("received shutdown command");
                            break;
                        }
                        None => {
                            warn!("command channel closed, shutting down");
                            break;
                        }
                    }
                }
            }
        }

        debug!("ingest actor stopped");
    }
}

/// A failed accept only affects that one connection; keep listening after a pause.
async fn back_off(error: &io::Error) {
    warn!("failed to accept connection: {error}, retrying in {ACCEPT_BACKOFF:?}");
    tokio::time::sleep(ACCEPT_BACKOFF).await;
}

#[instrument(skip(stream, state, counters), fields(peer = %peer))]
async fn handle_connection(
    mut stream: TcpStream,
    peer: SocketAddr,
    state: NetworkState,
    counters: Arc<IngestCounters>,
) {
    if let Err(e) = serve(&mut stream, &state, &counters).await {
        debug!("connection ended with error: {e:#}");
    }
}

/// Process the single message carried by a connection
async fn serve(stream: &mut TcpStream, state: &NetworkState, counters: &IngestCounters) -> Result<()> {
    let mut buffer = [0u8; READ_BUFFER_SIZE];
    let read = stream
        .read(&mut buffer)
        .await
        .context("failed to read message")?;

    let text = protocol::decode(&buffer[..read]);
    trace!("received {text:?}");

    match protocol::parse(&text) {
        Message::CountQuery => {
            IngestCounters::bump(&counters.count_queries);
            let count = state.entity_count().await;
            stream
                .write_all(&protocol::encode_count(count))
                .await
                .context("failed to send object count")?;
            stream.flush().await?;
            trace!("answered count query with {count}");
        }

        Message::Update { entity_id, value } => match state.apply_update(entity_id, value).await {
            Ok(update) => {
                IngestCounters::bump(&counters.updates_applied);
                trace!(
                    "server {} is now {} (slot {:?})",
                    update.entity.id, update.entity.current_value, update.slot
                );
            }
            Err(NetworkError::NotFound(id)) => {
                IngestCounters::bump(&counters.unknown_entities);
                info!("server with id {id} not found, update ignored");
            }
            Err(e) => {
                warn!("failed to apply update for server {entity_id}: {e}");
            }
        },

        Message::Unrecognized => {
            IngestCounters::bump(&counters.dropped);
            debug!("dropping unrecognized message {text:?}");
        }
    }

    // the peer may already be gone, nothing left to report either way
    let _ = stream.shutdown().await;
    Ok(())
}

/// Handle for controlling the IngestActor
#[derive(Clone)]
pub struct IngestHandle {
    sender: mpsc::Sender<IngestCommand>,
    local_addr: SocketAddr,
}

impl IngestHandle {
    /// Bind the listener and spawn the accept loop
    pub async fn spawn(addr: SocketAddr, state: NetworkState) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind ingest listener on {addr}"))?;
        let local_addr = listener.local_addr()?;
        info!("listening for simulator connections on {local_addr}");

        let (cmd_tx, cmd_rx) = mpsc::channel(32);
        let actor = IngestActor::new(listener, state, cmd_rx);

        tokio::spawn(actor.run());

        Ok(Self {
            sender: cmd_tx,
            local_addr,
        })
    }

    /// Address the listener is actually bound to (useful with port 0)
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Get ingestion statistics
    pub async fn stats(&self) -> Option<IngestStats> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(IngestCommand::GetStats { respond_to: tx })
            .await
            .ok()?;

        rx.await.ok()
    }

    /// Stop accepting new connections
    pub async fn shutdown(&self) {
        let _ = self.sender.send(IngestCommand::Shutdown).await;
    }
}
