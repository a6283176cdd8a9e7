use allreduces::{
    AlConfig, AlError, AllreduceAlgorithm, Context, ReduceOp, Request, RequestState,
};
use std::time::Duration;

use super::helpers::{SIZES, expected_sum, input, run_collective};

#[tokio::test]
async fn test_two_concurrent_allreduces_waited_in_reverse() {
    run_collective(4, |comm| async move {
        let rank = comm.rank();
        let a = vec![(rank + 1) as f32; 4];
        let b = vec![(10 * (rank + 1)) as f32; 4];

        let req_a = comm
            .nonblocking_allreduce_in_place(a, ReduceOp::Sum, AllreduceAlgorithm::Ring)
            .unwrap();
        let req_b = comm
            .nonblocking_allreduce_in_place(b, ReduceOp::Sum, AllreduceAlgorithm::RecursiveDoubling)
            .unwrap();

        let b = comm.wait(req_b).await.unwrap();
        let a = comm.wait(req_a).await.unwrap();
        assert_eq!(a, vec![10.0f32; 4], "rank {rank} buf a");
        assert_eq!(b, vec![100.0f32; 4], "rank {rank} buf b");
    })
    .await;
}

#[tokio::test]
async fn test_every_algorithm_nonblocking() {
    run_collective(3, |comm| async move {
        let rank = comm.rank();
        for algo in AllreduceAlgorithm::ALL {
            for &count in SIZES {
                let send = input(rank, count);
                let req = comm
                    .nonblocking_allreduce(&send, vec![0.0; count], ReduceOp::Sum, algo)
                    .unwrap();
                let recv = comm.wait(req).await.unwrap();
                assert_eq!(recv, expected_sum(3, count), "rank {rank}: {algo}, count {count}");

                let req = comm
                    .nonblocking_allreduce_in_place(send, ReduceOp::Sum, algo)
                    .unwrap();
                let buf = comm.wait(req).await.unwrap();
                assert_eq!(buf, expected_sum(3, count), "rank {rank}: {algo} in place");
            }
        }
    })
    .await;
}

#[tokio::test]
async fn test_many_outstanding_then_wait_all() {
    run_collective(2, |comm| async move {
        let reqs: Vec<Request<Vec<u64>>> = (0..8u64)
            .map(|i| {
                comm.nonblocking_allreduce_in_place(vec![i; 3], ReduceOp::Sum, Default::default())
                    .unwrap()
            })
            .collect();
        assert_eq!(comm.requests().outstanding(), 8);
        let results = Request::wait_all(reqs).await.unwrap();
        for (i, r) in results.into_iter().enumerate() {
            assert_eq!(r, vec![2 * i as u64; 3]);
        }
        assert_eq!(comm.requests().outstanding(), 0);
    })
    .await;
}

#[tokio::test]
async fn test_poll_until_complete() {
    run_collective(2, |comm| async move {
        let req = comm
            .nonblocking_allreduce_in_place(vec![1.0f32; 1024], ReduceOp::Sum, Default::default())
            .unwrap();
        while !comm.test(&req).unwrap() {
            tokio::task::yield_now().await;
        }
        assert_eq!(req.state().unwrap(), RequestState::Complete);
        assert_eq!(comm.wait(req).await.unwrap(), vec![2.0f32; 1024]);
    })
    .await;
}

#[tokio::test]
async fn test_isend_irecv_exchange() {
    run_collective(2, |comm| async move {
        let rank = comm.rank();
        let peer = 1 - rank;
        let send = comm.isend(vec![rank as f32; 100], peer).unwrap();
        let recv = comm.irecv(vec![0.0f32; 100], peer).unwrap();
        while !(comm.test(&send).unwrap() && comm.test(&recv).unwrap()) {
            tokio::task::yield_now().await;
        }
        assert_eq!(comm.wait(send).await.unwrap(), vec![rank as f32; 100]);
        assert_eq!(comm.wait(recv).await.unwrap(), vec![peer as f32; 100]);
    })
    .await;
}

#[tokio::test]
async fn test_isend_to_self_is_rejected() {
    run_collective(2, |comm| async move {
        let err = comm.isend(vec![1u32], comm.rank()).unwrap_err();
        assert!(matches!(err, AlError::InvalidRank { .. }));
        assert_eq!(comm.requests().outstanding(), 0);
    })
    .await;
}

#[tokio::test]
async fn test_wait_on_foreign_request_is_rejected() {
    let ctx = Context::initialize(2, AlConfig::default()).await.unwrap();
    let c0 = ctx.communicator(0).unwrap().clone();
    let c1 = ctx.communicator(1).unwrap().clone();

    let req = c0.irecv(vec![0u32; 1], 1).unwrap();
    assert!(matches!(c1.test(&req), Err(AlError::InvalidRequest(_))));
    assert!(matches!(c1.wait(req).await, Err(AlError::InvalidRequest(_))));
    // The rejected token was dropped, which aborts the receive.
    assert_eq!(c0.requests().outstanding(), 0);
    ctx.finalize().await.unwrap();
}

#[tokio::test]
async fn test_finalize_aborts_outstanding_requests() {
    let ctx = Context::initialize(2, AlConfig::default()).await.unwrap();
    let c0 = ctx.communicator(0).unwrap().clone();
    // Never matched by rank 1.
    let req = c0.irecv(vec![0.0f64; 4], 1).unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(req.state().unwrap(), RequestState::Issued);

    ctx.finalize().await.unwrap();
    assert_eq!(c0.requests().outstanding(), 0);
    assert!(matches!(req.wait().await, Err(AlError::InvalidRequest(_))));
}
