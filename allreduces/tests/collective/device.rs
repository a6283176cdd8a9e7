use allreduces::{
    AlError, AllreduceAlgorithm, Backend, DeviceBackend, DeviceBuffer, DeviceCommunicator,
    HostBackend, ReduceOp, gpu_wait,
};
use std::sync::Arc;

use super::helpers::{expected_sum, input, run_collective};

#[tokio::test]
async fn test_device_allreduce_after_busy_stream() {
    run_collective(3, |comm| async move {
        let rank = comm.rank();
        let dc = DeviceCommunicator::new(comm).unwrap();
        let send = DeviceBuffer::from_host(&input(rank, 70));
        let recv = DeviceBuffer::zeroed(70);

        gpu_wait(0.01, dc.stream()).unwrap();
        dc.allreduce(&send, &recv, ReduceOp::Sum, AllreduceAlgorithm::Ring)
            .unwrap();
        dc.synchronize().await.unwrap();
        assert_eq!(recv.copy_to_host().unwrap(), expected_sum(3, 70));
        assert_eq!(send.copy_to_host().unwrap(), input(rank, 70));

        dc.allreduce_in_place(&send, ReduceOp::Sum, AllreduceAlgorithm::Automatic)
            .unwrap();
        dc.synchronize().await.unwrap();
        assert_eq!(send.copy_to_host().unwrap(), expected_sum(3, 70));
    })
    .await;
}

#[tokio::test]
async fn test_device_send_recv_ones() {
    run_collective(2, |comm| async move {
        let dc = DeviceCommunicator::new(comm).unwrap();
        if dc.rank() == 0 {
            dc.send(&DeviceBuffer::from_host(&[1.0f32; 64]), 1).unwrap();
            dc.synchronize().await.unwrap();
        } else {
            let buf = DeviceBuffer::<f32>::zeroed(64);
            dc.recv(&buf, 0).unwrap();
            dc.synchronize().await.unwrap();
            assert_eq!(buf.copy_to_host().unwrap(), vec![1.0f32; 64]);
        }
    })
    .await;
}

#[tokio::test]
async fn test_device_validation_is_eager() {
    run_collective(2, |comm| async move {
        let dc = DeviceCommunicator::new(comm).unwrap();
        let a = DeviceBuffer::<f32>::zeroed(4);
        let b = DeviceBuffer::<f32>::zeroed(5);
        assert!(matches!(
            dc.allreduce(&a, &b, ReduceOp::Sum, AllreduceAlgorithm::Ring),
            Err(AlError::BufferSizeMismatch { .. })
        ));
        assert!(matches!(
            dc.send(&a, dc.rank()),
            Err(AlError::InvalidRank { .. })
        ));
        assert!(matches!(dc.recv(&a, 7), Err(AlError::InvalidRank { .. })));
        dc.synchronize().await.unwrap();
    })
    .await;
}

#[tokio::test]
async fn test_failed_stream_work_surfaces_at_synchronize() {
    run_collective(2, |comm| async move {
        let dc = DeviceCommunicator::new(comm).unwrap();
        if dc.rank() == 0 {
            dc.send(&DeviceBuffer::from_host(&[1u32, 2, 3, 4]), 1).unwrap();
            dc.synchronize().await.unwrap();
        } else {
            let short = DeviceBuffer::<u32>::zeroed(3);
            dc.recv(&short, 0).unwrap();
            assert!(matches!(
                dc.synchronize().await,
                Err(AlError::BufferSizeMismatch { .. })
            ));
            // The stream is usable again after reporting.
            dc.synchronize().await.unwrap();
        }
        dc.barrier().await.unwrap();
    })
    .await;
}

#[tokio::test]
async fn test_device_and_host_p2p_do_not_mix() {
    run_collective(2, |comm| async move {
        let dc = DeviceCommunicator::new(Arc::clone(&comm)).unwrap();
        if comm.rank() == 0 {
            dc.send(&DeviceBuffer::from_host(&[9i32; 2]), 1).unwrap();
            comm.send(&[5i32; 2], 1).await.unwrap();
            dc.synchronize().await.unwrap();
        } else {
            let mut host = [0i32; 2];
            comm.recv(&mut host, 0).await.unwrap();
            assert_eq!(host, [5, 5]);
            let dev = DeviceBuffer::<i32>::zeroed(2);
            dc.recv(&dev, 0).unwrap();
            dc.synchronize().await.unwrap();
            assert_eq!(dev.copy_to_host().unwrap(), vec![9, 9]);
        }
    })
    .await;
}

async fn all_ones_through<B>(comm: &B::Comm, world: u32)
where
    B: Backend<Algo = AllreduceAlgorithm>,
{
    let send = B::upload(&[1.0f32; 256]);
    let mut recv = B::upload(&[0.0f32; 256]);
    B::allreduce(comm, &send, &mut recv, ReduceOp::Sum, AllreduceAlgorithm::Automatic)
        .await
        .unwrap();
    B::synchronize(comm).await.unwrap();
    assert_eq!(B::download(&recv).unwrap(), vec![world as f32; 256], "{}", B::NAME);

    let mut buf = B::upload(&[2.0f32; 10]);
    B::allreduce_in_place(comm, &mut buf, ReduceOp::Sum, AllreduceAlgorithm::PeRing)
        .await
        .unwrap();
    B::barrier(comm).await.unwrap();
    assert_eq!(B::download(&buf).unwrap(), vec![2.0 * world as f32; 10], "{}", B::NAME);
}

#[tokio::test]
async fn test_backends_agree() {
    run_collective(2, |comm| async move {
        all_ones_through::<HostBackend>(&comm, 2).await;
        let dc = DeviceCommunicator::new(comm).unwrap();
        all_ones_through::<DeviceBackend>(&dc, 2).await;
    })
    .await;
}
