use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use super::helpers::run_collective;

#[tokio::test]
async fn test_barrier_worlds() {
    for world in 1..=5 {
        run_collective(world, |comm| async move {
            for _ in 0..3 {
                comm.barrier().await.unwrap();
            }
        })
        .await;
    }
}

#[tokio::test]
async fn test_nobody_leaves_before_everyone_arrives() {
    let arrived = Arc::new(AtomicU32::new(0));
    run_collective(4, move |comm| {
        let arrived = Arc::clone(&arrived);
        async move {
            // Stagger arrivals.
            tokio::time::sleep(std::time::Duration::from_millis(5 * u64::from(comm.rank()))).await;
            arrived.fetch_add(1, Ordering::SeqCst);
            comm.barrier().await.unwrap();
            assert_eq!(arrived.load(Ordering::SeqCst), 4);
        }
    })
    .await;
}
