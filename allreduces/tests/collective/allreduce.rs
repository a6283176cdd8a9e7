use allreduces::{AlConfig, AlError, AllreduceAlgorithm, ReduceOp};

use super::helpers::{SIZES, expected_sum, input, run_collective, run_collective_with};

async fn every_algorithm_matches(world: u32) {
    run_collective(world, move |comm| async move {
        let rank = comm.rank();
        for algo in AllreduceAlgorithm::ALL {
            for &count in SIZES {
                let send = input(rank, count);
                let mut recv = vec![0.0f32; count];
                comm.allreduce(&send, &mut recv, ReduceOp::Sum, algo)
                    .await
                    .unwrap();
                assert_eq!(
                    recv,
                    expected_sum(world, count),
                    "rank {rank}: {algo} out-of-place, count {count}"
                );
                assert_eq!(send, input(rank, count), "rank {rank}: {algo} touched send");

                let mut buf = input(rank, count);
                comm.allreduce_in_place(&mut buf, ReduceOp::Sum, algo)
                    .await
                    .unwrap();
                assert_eq!(
                    buf,
                    expected_sum(world, count),
                    "rank {rank}: {algo} in-place, count {count}"
                );
            }
        }
    })
    .await;
}

#[tokio::test]
async fn test_all_algorithms_world_1() {
    every_algorithm_matches(1).await;
}

#[tokio::test]
async fn test_all_algorithms_world_2() {
    every_algorithm_matches(2).await;
}

#[tokio::test]
async fn test_all_algorithms_world_3() {
    every_algorithm_matches(3).await;
}

#[tokio::test]
async fn test_all_algorithms_world_4() {
    every_algorithm_matches(4).await;
}

#[tokio::test]
async fn test_all_algorithms_world_5() {
    every_algorithm_matches(5).await;
}

#[tokio::test]
async fn test_256_ones_two_ranks() {
    run_collective(2, |comm| async move {
        let mut buf = vec![1.0f32; 256];
        comm.allreduce_in_place(&mut buf, ReduceOp::Sum, AllreduceAlgorithm::Automatic)
            .await
            .unwrap();
        assert_eq!(buf, vec![2.0f32; 256], "rank {}", comm.rank());
    })
    .await;
}

#[tokio::test]
async fn test_empty_buffer_is_a_no_op() {
    run_collective(3, |comm| async move {
        let mut recv: Vec<f32> = Vec::new();
        comm.allreduce(&[], &mut recv, ReduceOp::Sum, AllreduceAlgorithm::Ring)
            .await
            .unwrap();
        assert!(recv.is_empty());
    })
    .await;
}

#[tokio::test]
async fn test_length_mismatch_is_rejected() {
    run_collective(2, |comm| async move {
        let mut recv = vec![0.0f32; 3];
        let err = comm
            .allreduce(&[1.0f32; 4], &mut recv, ReduceOp::Sum, AllreduceAlgorithm::Ring)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AlError::BufferSizeMismatch {
                expected: 16,
                actual: 12
            }
        ));
    })
    .await;
}

#[tokio::test]
async fn test_other_ops_and_types() {
    run_collective(4, |comm| async move {
        let rank = comm.rank() as i64;
        let mut max = vec![rank, -rank, 7];
        comm.allreduce_in_place(&mut max, ReduceOp::Max, AllreduceAlgorithm::RecursiveDoubling)
            .await
            .unwrap();
        assert_eq!(max, vec![3, 0, 7]);

        let mut min = vec![rank as u32 + 5; 9];
        comm.allreduce_in_place(&mut min, ReduceOp::Min, AllreduceAlgorithm::Ring)
            .await
            .unwrap();
        assert_eq!(min, vec![5; 9]);

        let mut prod = vec![(rank + 1) as f64; 6];
        comm.allreduce_in_place(&mut prod, ReduceOp::Prod, AllreduceAlgorithm::Rabenseifner)
            .await
            .unwrap();
        assert_eq!(prod, vec![24.0; 6]);

        let mut sum = vec![rank as i32; 5];
        comm.allreduce_in_place(&mut sum, ReduceOp::Sum, AllreduceAlgorithm::PeRing)
            .await
            .unwrap();
        assert_eq!(sum, vec![6; 5]);
    })
    .await;
}

/// Messages above the small-message threshold exercise the bandwidth paths
/// of automatic selection.
#[tokio::test]
async fn test_automatic_large_messages() {
    for world in [3, 4] {
        run_collective(world, move |comm| async move {
            let count = 20_000;
            let mut buf = input(comm.rank(), count);
            comm.allreduce_in_place(&mut buf, ReduceOp::Sum, AllreduceAlgorithm::Automatic)
                .await
                .unwrap();
            assert_eq!(buf, expected_sum(world, count));
        })
        .await;
    }
}

#[tokio::test]
async fn test_automatic_pe_ring_for_wide_worlds() {
    let config = AlConfig {
        small_msg_bytes: 0,
        ring_max_world: 2,
        ..AlConfig::default()
    };
    run_collective_with(3, config, |comm| async move {
        let mut buf = input(comm.rank(), 50);
        comm.allreduce_in_place(&mut buf, ReduceOp::Sum, AllreduceAlgorithm::Automatic)
            .await
            .unwrap();
        assert_eq!(buf, expected_sum(3, 50));
    })
    .await;
}

#[tokio::test]
async fn test_baseline_matches_every_algorithm() {
    run_collective(5, |comm| async move {
        let mut expected = input(comm.rank(), 33);
        comm.baseline_allreduce(&mut expected, ReduceOp::Sum)
            .await
            .unwrap();
        for algo in AllreduceAlgorithm::ALL {
            let mut buf = input(comm.rank(), 33);
            comm.allreduce_in_place(&mut buf, ReduceOp::Sum, algo)
                .await
                .unwrap();
            assert_eq!(buf, expected, "{algo}");
        }
    })
    .await;
}

/// Arbitrary floats are not exact, but partners must still agree bit for
/// bit.
#[tokio::test]
async fn test_ranks_agree_bitwise() {
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    run_collective(4, move |comm| {
        let tx = tx.clone();
        async move {
            let rank = comm.rank();
            let mut buf: Vec<f32> = (0..37).map(|i| 0.1 * (i as f32) + 0.37 * rank as f32).collect();
            comm.allreduce_in_place(&mut buf, ReduceOp::Sum, AllreduceAlgorithm::RecursiveDoubling)
                .await
                .unwrap();
            tx.send(buf).unwrap();
        }
    })
    .await;
    let first = rx.recv().await.unwrap();
    for _ in 1..4 {
        let other = rx.recv().await.unwrap();
        assert!(first.iter().zip(&other).all(|(a, b)| a.to_bits() == b.to_bits()));
    }
}
