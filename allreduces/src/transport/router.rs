use crate::error::{AlError, Result};
use crate::protocol::ControlMessage;
use crate::protocol::codec::{MAX_CONTROL_BYTES, decode_message};
use crate::transport::buffer_pool::{BufferPool, PooledBuf};
use crate::transport::connection::{STREAM_TAG_DATA, STREAM_TAG_FRAMED};
use crate::types::Rank;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};

/// Largest data payload accepted from a peer (4 GiB).
const MAX_MESSAGE_SIZE: u64 = 4 * 1024 * 1024 * 1024;

type LaneRx = Arc<Mutex<mpsc::UnboundedReceiver<PooledBuf>>>;

/// Demultiplexer for everything one peer sends us.
///
/// A single background task accepts the peer's unidirectional streams in
/// order and reads each one to completion before accepting the next, so
/// per-tag lanes see messages in send order. Data streams are routed to a
/// lane keyed by their collective tag; lanes are created on first use from
/// either side and dropped with [`PeerRouter::release`]. Control messages
/// go to a single control lane.
///
/// Lanes are unbounded: a bounded lane that filled up would stall the
/// receive loop and with it every other tag from the same peer.
pub struct PeerRouter {
    rank: Rank,
    control: Mutex<mpsc::UnboundedReceiver<ControlMessage>>,
    lanes: Arc<Mutex<LaneTable>>,
}

struct Lane {
    /// `None` once the connection is gone; queued payloads stay readable.
    tx: Option<mpsc::UnboundedSender<PooledBuf>>,
    rx: LaneRx,
}

impl Lane {
    fn new(open: bool) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx: open.then_some(tx),
            rx: Arc::new(Mutex::new(rx)),
        }
    }
}

struct LaneTable {
    open: bool,
    lanes: HashMap<u64, Lane>,
}

impl LaneTable {
    fn lane(&mut self, tag: u64) -> &mut Lane {
        let open = self.open;
        self.lanes.entry(tag).or_insert_with(|| Lane::new(open))
    }
}

struct RouterSenders {
    rank: Rank,
    control: mpsc::UnboundedSender<ControlMessage>,
    lanes: Arc<Mutex<LaneTable>>,
    pool: Arc<BufferPool>,
}

impl PeerRouter {
    /// Spawn the receive loop for `conn` (the connection to `rank`).
    pub fn spawn(
        rank: Rank,
        conn: quinn::Connection,
        pool: Arc<BufferPool>,
    ) -> (Self, tokio::task::JoinHandle<()>) {
        let (ctrl_tx, ctrl_rx) = mpsc::unbounded_channel();
        let lanes = Arc::new(Mutex::new(LaneTable {
            open: true,
            lanes: HashMap::new(),
        }));

        let senders = RouterSenders {
            rank,
            control: ctrl_tx,
            lanes: Arc::clone(&lanes),
            pool,
        };
        let handle = tokio::spawn(receive_loop(conn, senders));

        let router = Self {
            rank,
            control: Mutex::new(ctrl_rx),
            lanes,
        };
        (router, handle)
    }

    /// Rank of the peer this router reads from.
    pub fn peer(&self) -> Rank {
        self.rank
    }

    /// Receive the next payload sent with `tag`.
    pub async fn recv_tagged(&self, tag: u64) -> Result<PooledBuf> {
        let rx = {
            let mut table = self.lanes.lock().await;
            Arc::clone(&table.lane(tag).rx)
        };
        let mut rx = rx.lock().await;
        rx.recv()
            .await
            .ok_or(AlError::PeerDisconnected { rank: self.rank })
    }

    /// Drop the lane for a finished collective.
    pub async fn release(&self, tag: u64) {
        let removed = self.lanes.lock().await.lanes.remove(&tag);
        if let Some(lane) = removed
            && let Ok(rx) = lane.rx.try_lock()
            && !rx.is_empty()
        {
            tracing::warn!(
                rank = self.rank,
                tag,
                pending = rx.len(),
                "router: released lane still had unread payloads"
            );
        }
    }

    /// Number of lanes currently allocated.
    pub async fn open_lanes(&self) -> usize {
        self.lanes.lock().await.lanes.len()
    }

    /// Receive the next control message.
    pub async fn recv_control(&self) -> Result<ControlMessage> {
        self.control
            .lock()
            .await
            .recv()
            .await
            .ok_or(AlError::PeerDisconnected { rank: self.rank })
    }
}

async fn receive_loop(conn: quinn::Connection, tx: RouterSenders) {
    loop {
        let mut stream = match conn.accept_uni().await {
            Ok(s) => s,
            Err(e) => {
                tracing::debug!(rank = tx.rank, "router: connection ended: {e}");
                break;
            }
        };
        if let Err(e) = handle_stream(&mut stream, &tx).await {
            tracing::warn!(rank = tx.rank, "router: dropping stream: {e}");
        }
    }

    let mut table = tx.lanes.lock().await;
    table.open = false;
    for lane in table.lanes.values_mut() {
        lane.tx = None;
    }
}

async fn handle_stream(stream: &mut quinn::RecvStream, tx: &RouterSenders) -> Result<()> {
    let mut kind = [0u8; 1];
    read_exact(stream, &mut kind).await?;

    match kind[0] {
        STREAM_TAG_FRAMED => {
            let msg = read_control(stream, &tx.pool).await?;
            if tx.control.send(msg).is_err() {
                tracing::error!(rank = tx.rank, "router: control receiver dropped");
            }
        }
        STREAM_TAG_DATA => {
            let mut tag_buf = [0u8; 8];
            read_exact(stream, &mut tag_buf).await?;
            let tag = u64::from_le_bytes(tag_buf);
            let payload = read_length_prefixed(stream, &tx.pool, MAX_MESSAGE_SIZE).await?;

            let mut table = tx.lanes.lock().await;
            let delivered = table
                .lane(tag)
                .tx
                .as_ref()
                .is_some_and(|lane| lane.send(payload).is_ok());
            if !delivered {
                tracing::error!(rank = tx.rank, tag, "router: lane receiver dropped");
            }
        }
        other => {
            return Err(AlError::DecodeFailed(format!(
                "unknown stream tag 0x{other:02x}"
            )));
        }
    }
    Ok(())
}

/// Read a framed control message (after the stream tag byte).
pub(crate) async fn read_control(
    stream: &mut quinn::RecvStream,
    pool: &Arc<BufferPool>,
) -> Result<ControlMessage> {
    let payload = read_length_prefixed(stream, pool, MAX_CONTROL_BYTES as u64).await?;
    decode_message(&payload)
}

/// Read the stream tag of a stream that must be framed, then its message.
pub(crate) async fn read_control_stream(
    stream: &mut quinn::RecvStream,
    pool: &Arc<BufferPool>,
) -> Result<ControlMessage> {
    let mut kind = [0u8; 1];
    read_exact(stream, &mut kind).await?;
    if kind[0] != STREAM_TAG_FRAMED {
        return Err(AlError::DecodeFailed(format!(
            "expected a control stream, got tag 0x{:02x}",
            kind[0]
        )));
    }
    read_control(stream, pool).await
}

async fn read_length_prefixed(
    stream: &mut quinn::RecvStream,
    pool: &Arc<BufferPool>,
    limit: u64,
) -> Result<PooledBuf> {
    let mut len_buf = [0u8; 8];
    read_exact(stream, &mut len_buf).await?;
    let len = u64::from_le_bytes(len_buf);
    if len > limit {
        return Err(AlError::DecodeFailed(format!(
            "message of {len} bytes exceeds limit of {limit}"
        )));
    }
    let mut buf = pool.checkout(len as usize);
    read_exact(stream, &mut buf).await?;
    Ok(buf)
}

async fn read_exact(stream: &mut quinn::RecvStream, buf: &mut [u8]) -> Result<()> {
    stream
        .read_exact(buf)
        .await
        .map_err(|e| AlError::transport_with_source("read stream", e))
}
