use crate::error::{AlError, Result};
use std::net::SocketAddr;

/// Listens for incoming QUIC connections on a bound address.
pub struct TransportListener {
    endpoint: quinn::Endpoint,
    local_addr: SocketAddr,
}

impl TransportListener {
    /// Bind a QUIC listener with the given server config.
    pub fn bind(addr: SocketAddr, config: quinn::ServerConfig) -> Result<Self> {
        let endpoint = quinn::Endpoint::server(config, addr)
            .map_err(|e| AlError::transport_with_source(format!("bind {addr}"), e))?;
        let local_addr = endpoint
            .local_addr()
            .map_err(|e| AlError::transport_with_source("local_addr", e))?;

        Ok(Self {
            endpoint,
            local_addr,
        })
    }

    /// Accept the next incoming QUIC connection.
    pub async fn accept(&self) -> Result<quinn::Connection> {
        let incoming = self
            .endpoint
            .accept()
            .await
            .ok_or_else(|| AlError::transport("endpoint closed"))?;

        incoming
            .await
            .map_err(|e| AlError::transport_with_source("accept", e))
    }

    /// The local address this listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// The underlying endpoint, kept by the communicator so it can be closed
    /// at finalize.
    pub fn endpoint(&self) -> &quinn::Endpoint {
        &self.endpoint
    }
}
