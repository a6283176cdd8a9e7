use allreduces::{AlConfig, AlError};
use std::time::Duration;

use super::helpers::{run_collective, run_collective_with};

#[tokio::test]
async fn test_send_recv_pair() {
    run_collective(2, |comm| async move {
        if comm.rank() == 0 {
            comm.send(&[1.5f32, 2.5, 3.5], 1).await.unwrap();
        } else {
            let mut buf = [0.0f32; 3];
            comm.recv(&mut buf, 0).await.unwrap();
            assert_eq!(buf, [1.5, 2.5, 3.5]);
        }
    })
    .await;
}

#[tokio::test]
async fn test_messages_arrive_in_send_order() {
    run_collective(2, |comm| async move {
        if comm.rank() == 0 {
            for i in 0..32u32 {
                comm.send(&vec![i; (i as usize) * 100], 1).await.unwrap();
            }
        } else {
            for i in 0..32u32 {
                let mut buf = vec![0u32; (i as usize) * 100];
                comm.recv(&mut buf, 0).await.unwrap();
                assert!(buf.iter().all(|&v| v == i));
            }
        }
    })
    .await;
}

#[tokio::test]
async fn test_ring_of_sends() {
    run_collective(5, |comm| async move {
        let rank = comm.rank();
        let world = comm.world_size();
        let next = (rank + 1) % world;
        let prev = (rank + world - 1) % world;
        let out = [rank as i64; 8];
        let (sent, received) = tokio::join!(comm.send(&out, next), async {
            let mut buf = [0i64; 8];
            comm.recv(&mut buf, prev).await.map(|()| buf)
        });
        sent.unwrap();
        assert_eq!(received.unwrap(), [prev as i64; 8]);
    })
    .await;
}

#[tokio::test]
async fn test_invalid_ranks() {
    run_collective(3, |comm| async move {
        let rank = comm.rank();
        for bad in [rank, 3, 100] {
            let err = comm.send(&[0u32], bad).await.unwrap_err();
            assert!(
                matches!(err, AlError::InvalidRank { rank: r, world_size: 3 } if r == bad),
                "{err}"
            );
            let mut buf = [0u32];
            assert!(matches!(
                comm.recv(&mut buf, bad).await,
                Err(AlError::InvalidRank { .. })
            ));
        }
    })
    .await;
}

#[tokio::test]
async fn test_recv_length_mismatch() {
    run_collective(2, |comm| async move {
        if comm.rank() == 0 {
            comm.send(&[1u64, 2, 3, 4], 1).await.unwrap();
        } else {
            let mut buf = [0u64; 3];
            let err = comm.recv(&mut buf, 0).await.unwrap_err();
            assert!(matches!(
                err,
                AlError::BufferSizeMismatch {
                    expected: 24,
                    actual: 32
                }
            ));
        }
    })
    .await;
}

#[tokio::test]
async fn test_unmatched_recv_times_out() {
    let config = AlConfig {
        collective_timeout: Some(Duration::from_millis(200)),
        ..AlConfig::default()
    };
    run_collective_with(2, config, |comm| async move {
        if comm.rank() == 0 {
            let mut buf = [0.0f32; 4];
            let err = comm.recv(&mut buf, 1).await.unwrap_err();
            assert!(matches!(
                err,
                AlError::Timeout {
                    operation: "recv",
                    rank: 0,
                    timeout_ms: 200
                }
            ));
        }
    })
    .await;
}
