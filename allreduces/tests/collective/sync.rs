use allreduces::{AlConfig, AllreduceAlgorithm, ReduceOp, SyncCommunicator};

#[test]
fn test_sync_communicators_on_threads() {
    let comms = SyncCommunicator::bootstrap_local(3, AlConfig::default()).unwrap();
    let handles: Vec<_> = comms
        .into_iter()
        .map(|comm| {
            std::thread::spawn(move || {
                let rank = comm.rank();
                let mut buf = vec![(rank + 1) as f32; 16];
                comm.allreduce_in_place(&mut buf, ReduceOp::Sum, AllreduceAlgorithm::Ring)
                    .unwrap();
                assert_eq!(buf, vec![6.0f32; 16]);

                let req = comm
                    .nonblocking_allreduce_in_place(vec![1u32; 5], ReduceOp::Sum, Default::default())
                    .unwrap();
                assert_eq!(comm.wait(req).unwrap(), vec![3u32; 5]);

                if rank == 0 {
                    comm.send(&[42u64], 2).unwrap();
                } else if rank == 2 {
                    let mut got = [0u64];
                    comm.recv(&mut got, 0).unwrap();
                    assert_eq!(got, [42]);
                }
                comm.barrier().unwrap();
                comm.finalize().unwrap();
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }
}
