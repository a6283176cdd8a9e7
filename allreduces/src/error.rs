use crate::types::Rank;

pub type Result<T> = std::result::Result<T, AlError>;

#[derive(Debug, thiserror::Error)]
pub enum AlError {
    #[error("connection to rank {rank} failed: {reason}")]
    ConnectionFailed { rank: Rank, reason: String },

    #[error("peer {rank} disconnected unexpectedly")]
    PeerDisconnected { rank: Rank },

    #[error("protocol version mismatch: local={local}, remote={remote}")]
    ProtocolMismatch { local: u16, remote: u16 },

    #[error("message decode failed: {0}")]
    DecodeFailed(String),

    #[error("message encode failed: {0}")]
    EncodeFailed(String),

    #[error("buffer size mismatch: expected {expected} bytes, got {actual}")]
    BufferSizeMismatch { expected: usize, actual: usize },

    #[error("invalid rank {rank}: world size is {world_size}")]
    InvalidRank { rank: Rank, world_size: u32 },

    #[error("invalid world size {0}: at least one rank is required")]
    InvalidWorldSize(u32),

    #[error("QUIC transport error: {message}")]
    Transport {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("TLS configuration error: {0}")]
    Tls(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{operation} failed at rank {rank}: {reason}")]
    CollectiveFailed {
        operation: &'static str,
        rank: Rank,
        reason: String,
    },

    #[error("{operation} at rank {rank} timed out after {timeout_ms}ms")]
    Timeout {
        operation: &'static str,
        rank: Rank,
        timeout_ms: u64,
    },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("device stream failed: {0}")]
    StreamFailed(String),

    #[error("internal lock poisoned: {0}")]
    LockPoisoned(&'static str),
}

impl AlError {
    /// Create a `Transport` error with just a message.
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport {
            message: msg.into(),
            source: None,
        }
    }

    /// Create a `Transport` error with a message and a source error.
    pub fn transport_with_source(
        msg: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Transport {
            message: msg.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Wrap a lower-level failure as the failure of a named collective.
    pub(crate) fn collective(operation: &'static str, rank: Rank, cause: AlError) -> Self {
        match cause {
            // Already attributed; keep the innermost operation name.
            e @ (AlError::CollectiveFailed { .. } | AlError::Timeout { .. }) => e,
            other => AlError::CollectiveFailed {
                operation,
                rank,
                reason: other.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let e = AlError::ConnectionFailed {
            rank: 3,
            reason: "timeout".into(),
        };
        assert_eq!(e.to_string(), "connection to rank 3 failed: timeout");
    }

    #[test]
    fn test_collective_failed_display() {
        let e = AlError::CollectiveFailed {
            operation: "ring_allreduce",
            rank: 3,
            reason: "connection reset".into(),
        };
        assert_eq!(
            e.to_string(),
            "ring_allreduce failed at rank 3: connection reset"
        );
    }

    #[test]
    fn test_collective_wraps_once() {
        let inner = AlError::collective("barrier", 1, AlError::PeerDisconnected { rank: 2 });
        let outer = AlError::collective("allreduce", 1, inner);
        assert_eq!(
            outer.to_string(),
            "barrier failed at rank 1: peer 2 disconnected unexpectedly"
        );
    }

    #[test]
    fn test_timeout_display() {
        let e = AlError::Timeout {
            operation: "recv",
            rank: 0,
            timeout_ms: 1500,
        };
        assert_eq!(e.to_string(), "recv at rank 0 timed out after 1500ms");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::AddrInUse, "port busy");
        let err: AlError = io_err.into();
        assert!(err.to_string().contains("port busy"));
    }

    #[test]
    fn test_all_variants_display() {
        let errors: Vec<AlError> = vec![
            AlError::ConnectionFailed {
                rank: 0,
                reason: "x".into(),
            },
            AlError::PeerDisconnected { rank: 1 },
            AlError::ProtocolMismatch {
                local: 1,
                remote: 2,
            },
            AlError::DecodeFailed("bad".into()),
            AlError::EncodeFailed("bad".into()),
            AlError::BufferSizeMismatch {
                expected: 100,
                actual: 50,
            },
            AlError::InvalidRank {
                rank: 5,
                world_size: 4,
            },
            AlError::InvalidWorldSize(0),
            AlError::transport("conn reset"),
            AlError::Tls("bad cert".into()),
            AlError::InvalidRequest("stale".into()),
            AlError::StreamFailed("worker gone".into()),
            AlError::LockPoisoned("requests"),
        ];
        for e in &errors {
            assert!(!e.to_string().is_empty(), "empty display for {e:?}");
        }
    }
}
