use crate::comm::Communicator;
use crate::config::AlConfig;
use crate::error::{AlError, Result};
use crate::protocol::ControlMessage;
use crate::transport::buffer_pool::BufferPool;
use crate::transport::router::read_control_stream;
use crate::transport::tls::{generate_self_signed_cert, make_client_config, make_server_config};
use crate::transport::{PeerConnection, TransportListener};
use crate::types::{PROTOCOL_VERSION, Rank};
use std::collections::HashMap;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;

const LOOPBACK: SocketAddr = SocketAddr::new(std::net::IpAddr::V4(Ipv4Addr::LOCALHOST), 0);

impl Communicator {
    /// Build an in-process world of `world_size` ranks connected by a full
    /// QUIC mesh on loopback. Returns one communicator per rank, in rank
    /// order.
    ///
    /// Every rank binds a listener; rank `i` dials every rank `j > i` and
    /// opens the connection with a `Hello` naming itself, and rank `j`
    /// accepts exactly `j` connections and sorts them by the `Hello` it
    /// reads. Each pair ends up with exactly one connection.
    pub async fn bootstrap_local(world_size: u32, config: AlConfig) -> Result<Vec<Communicator>> {
        if world_size == 0 {
            return Err(AlError::InvalidWorldSize(world_size));
        }

        let (cert, key) = generate_self_signed_cert()?;
        let server_config = make_server_config(cert, key)?;
        let client_config = make_client_config()?;

        let mut listeners = Vec::with_capacity(world_size as usize);
        for _ in 0..world_size {
            listeners.push(Arc::new(TransportListener::bind(
                LOOPBACK,
                server_config.clone(),
            )?));
        }
        let addrs: Vec<SocketAddr> = listeners.iter().map(|l| l.local_addr()).collect();

        let mut accept_tasks = Vec::with_capacity(world_size as usize);
        for (rank, listener) in listeners.iter().enumerate() {
            accept_tasks.push(tokio::spawn(accept_lower_ranks(
                Arc::clone(listener),
                rank as Rank,
                world_size,
            )));
        }

        let mut client_endpoints = Vec::with_capacity(world_size as usize);
        let mut connect_tasks = Vec::with_capacity(world_size as usize);
        for rank in 0..world_size {
            let mut endpoint = quinn::Endpoint::client(LOOPBACK)
                .map_err(|e| AlError::transport_with_source("mesh client endpoint", e))?;
            endpoint.set_default_client_config(client_config.clone());
            client_endpoints.push(endpoint.clone());
            connect_tasks.push(tokio::spawn(connect_higher_ranks(
                endpoint,
                rank,
                world_size,
                addrs.clone(),
            )));
        }

        let mut meshes: Vec<HashMap<Rank, PeerConnection>> =
            (0..world_size).map(|_| HashMap::new()).collect();
        for (rank, task) in connect_tasks.into_iter().enumerate() {
            let conns = task
                .await
                .map_err(|e| AlError::transport_with_source("mesh connect task panicked", e))??;
            for (peer, conn) in conns {
                meshes[rank].insert(peer, PeerConnection::new(peer, conn));
            }
        }
        for (rank, task) in accept_tasks.into_iter().enumerate() {
            let conns = task
                .await
                .map_err(|e| AlError::transport_with_source("mesh accept task panicked", e))??;
            for (peer, conn) in conns {
                meshes[rank].insert(peer, PeerConnection::new(peer, conn));
            }
        }

        let comms = meshes
            .into_iter()
            .zip(listeners.iter().zip(client_endpoints))
            .enumerate()
            .map(|(rank, (peers, (listener, client)))| {
                let endpoints = vec![listener.endpoint().clone(), client];
                Communicator::new(rank as Rank, world_size, peers, endpoints, config.clone())
            })
            .collect();

        tracing::debug!(world_size, "mesh bootstrap complete");
        Ok(comms)
    }
}

async fn connect_higher_ranks(
    endpoint: quinn::Endpoint,
    rank: Rank,
    world_size: u32,
    addrs: Vec<SocketAddr>,
) -> Result<Vec<(Rank, quinn::Connection)>> {
    let hello = ControlMessage::Hello {
        protocol_version: PROTOCOL_VERSION,
        rank,
        world_size,
    };
    let mut conns = Vec::new();
    for peer in (rank + 1)..world_size {
        let connecting = endpoint
            .connect(addrs[peer as usize], "localhost")
            .map_err(|e| AlError::ConnectionFailed {
                rank: peer,
                reason: e.to_string(),
            })?;
        let conn = connecting.await.map_err(|e| AlError::ConnectionFailed {
            rank: peer,
            reason: e.to_string(),
        })?;
        PeerConnection::new(peer, conn.clone())
            .send_message(&hello)
            .await?;
        conns.push((peer, conn));
    }
    Ok(conns)
}

async fn accept_lower_ranks(
    listener: Arc<TransportListener>,
    rank: Rank,
    world_size: u32,
) -> Result<Vec<(Rank, quinn::Connection)>> {
    let pool = BufferPool::with_capacity(1, 1);
    let mut conns: Vec<(Rank, quinn::Connection)> = Vec::with_capacity(rank as usize);
    while conns.len() < rank as usize {
        let conn = listener.accept().await?;
        let mut stream = conn
            .accept_uni()
            .await
            .map_err(|e| AlError::transport_with_source("await hello stream", e))?;
        let hello = read_control_stream(&mut stream, &pool).await?;

        let peer = match hello {
            ControlMessage::Hello {
                protocol_version,
                rank: peer,
                world_size: peer_world,
            } => {
                if protocol_version != PROTOCOL_VERSION {
                    return Err(AlError::ProtocolMismatch {
                        local: PROTOCOL_VERSION,
                        remote: protocol_version,
                    });
                }
                if peer_world != world_size || peer >= rank {
                    return Err(AlError::InvalidRank {
                        rank: peer,
                        world_size: peer_world,
                    });
                }
                peer
            }
            other => {
                return Err(AlError::DecodeFailed(format!(
                    "expected Hello as first message, got {other:?}"
                )));
            }
        };
        if conns.iter().any(|(r, _)| *r == peer) {
            return Err(AlError::ConnectionFailed {
                rank: peer,
                reason: format!("duplicate connection to rank {rank}"),
            });
        }
        conns.push((peer, conn));
    }
    Ok(conns)
}
