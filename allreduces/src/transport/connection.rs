use crate::error::{AlError, Result};
use crate::protocol::ControlMessage;
use crate::protocol::codec::encode_message;
use crate::types::Rank;

/// Stream type tag: first byte on every QUIC uni stream, so the router can
/// dispatch a stream before reading its payload.
pub(crate) const STREAM_TAG_FRAMED: u8 = 0x01;
pub(crate) const STREAM_TAG_DATA: u8 = 0x02;

/// The send side of a connection to one peer.
///
/// Every message gets its own unidirectional stream:
///
/// ```text
/// framed: [0x01][len: u64 LE][rkyv ControlMessage]
/// data:   [0x02][collective tag: u64 LE][len: u64 LE][payload]
/// ```
///
/// A send opens its stream only after the previous send to the same peer
/// has finished writing, and the peer's `PeerRouter` accepts streams in
/// the order they were opened, so messages between two ranks arrive in
/// the order they were sent.
pub struct PeerConnection {
    pub rank: Rank,
    pub(crate) conn: quinn::Connection,
}

impl PeerConnection {
    pub fn new(rank: Rank, conn: quinn::Connection) -> Self {
        Self { rank, conn }
    }

    /// Send a control message on a framed stream.
    pub async fn send_message(&self, msg: &ControlMessage) -> Result<()> {
        let payload = encode_message(msg)?;
        let mut header = [0u8; 9];
        header[0] = STREAM_TAG_FRAMED;
        header[1..].copy_from_slice(&(payload.len() as u64).to_le_bytes());
        self.write_stream(&header, &payload).await
    }

    /// Send a tagged data payload.
    pub async fn send_data(&self, tag: u64, payload: &[u8]) -> Result<()> {
        let mut header = [0u8; 17];
        header[0] = STREAM_TAG_DATA;
        header[1..9].copy_from_slice(&tag.to_le_bytes());
        header[9..].copy_from_slice(&(payload.len() as u64).to_le_bytes());
        self.write_stream(&header, payload).await
    }

    /// Close the connection immediately; unsent data is discarded.
    pub fn close(&self, reason: &[u8]) {
        self.conn.close(quinn::VarInt::from_u32(0), reason);
    }

    async fn write_stream(&self, header: &[u8], payload: &[u8]) -> Result<()> {
        let mut stream = self.conn.open_uni().await.map_err(|e| self.lost(e))?;
        stream
            .write_all(header)
            .await
            .map_err(|e| AlError::transport_with_source("write stream header", e))?;
        stream
            .write_all(payload)
            .await
            .map_err(|e| AlError::transport_with_source("write payload", e))?;
        stream
            .finish()
            .map_err(|e| AlError::transport_with_source("finish stream", e))?;
        Ok(())
    }

    fn lost(&self, e: quinn::ConnectionError) -> AlError {
        match e {
            quinn::ConnectionError::ApplicationClosed(_)
            | quinn::ConnectionError::ConnectionClosed(_)
            | quinn::ConnectionError::LocallyClosed
            | quinn::ConnectionError::Reset => AlError::PeerDisconnected { rank: self.rank },
            other => AlError::transport_with_source("open uni stream", other),
        }
    }
}
