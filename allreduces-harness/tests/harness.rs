use allreduces::{AlConfig, AllreduceAlgorithm, DeviceBackend, DeviceCommunicator, HostBackend};
use allreduces_harness::bench::run_pingpong;
use allreduces_harness::config::HarnessConfig;
use allreduces_harness::correctness::{
    Variant, run_baseline_suite, run_vendor_suite, sizes, test_allreduce_algo,
    test_vendor_allreduce,
};
use allreduces_harness::datagen::DataGenerator;
use allreduces_harness::launch::{launch, launch_with};
use allreduces_harness::oracle::TestCase;
use allreduces_harness::timer::{finish_timer, start_timer};
use allreduces_vendor::VendorCommunicator;
use std::sync::Arc;
use std::time::Duration;

fn small(world_size: u32) -> Arc<HarnessConfig> {
    Arc::new(HarnessConfig {
        world_size,
        test_max_size: 64,
        bench_start_size: 1,
        bench_max_size: 16,
        bench_trials: 3,
        bench_gpu_wait: 0.0005,
        ..HarnessConfig::correctness()
    })
}

fn quick_finalize() -> AlConfig {
    AlConfig {
        finalize_timeout: Duration::from_secs(2),
        ..AlConfig::default()
    }
}

#[tokio::test]
async fn test_baseline_suite_passes() {
    for world in [1, 2, 3, 4] {
        let cfg = small(world);
        let reports = launch(world, AlConfig::default(), move |comm| {
            let cfg = Arc::clone(&cfg);
            async move { run_baseline_suite(comm, &cfg).await }
        })
        .await
        .unwrap();

        let per_rank = sizes(64).len() * AllreduceAlgorithm::ALL.len() * 4;
        assert_eq!(reports.len(), world as usize);
        for r in &reports {
            assert!(r.passed(), "world {world}: {:?}", r.mismatches);
            assert_eq!(r.checks, per_rank);
        }
    }
}

#[tokio::test]
async fn test_vendor_suite_passes() {
    let world = 3;
    let cfg = small(world);
    let vendors = VendorCommunicator::init_all(world).unwrap();
    let reports = launch_with(world, AlConfig::default(), vendors, move |comm, vendor| {
        let cfg = Arc::clone(&cfg);
        async move { run_vendor_suite(comm, vendor, &cfg).await }
    })
    .await
    .unwrap();

    for r in &reports {
        assert!(r.passed(), "{:?}", r.mismatches);
        assert_eq!(r.checks, sizes(64).len());
    }
}

#[tokio::test]
async fn test_device_backend_matches_baseline() {
    let reports = launch(2, AlConfig::default(), |comm| async move {
        let dc = DeviceCommunicator::new(Arc::clone(&comm))?;
        let case = TestCase::prepare(&comm, &DataGenerator::new(7), 33).await?;
        let found = test_allreduce_algo::<DeviceBackend>(&dc, &case, AllreduceAlgorithm::Ring)
            .await?;
        Ok::<_, anyhow::Error>(found)
    })
    .await
    .unwrap();

    for found in reports {
        assert_eq!(found, [None, None]);
    }
}

#[tokio::test]
async fn test_mismatch_is_reported() {
    let reports = launch(2, AlConfig::default(), |comm| async move {
        let mut case = TestCase::prepare(&comm, &DataGenerator::new(1), 8).await?;
        // Corrupt the expectation on rank 1 only.
        if comm.rank() == 1 {
            case.expected[5] += 1.0;
        }
        let found = test_allreduce_algo::<HostBackend>(&comm, &case, AllreduceAlgorithm::Passthrough)
            .await?;
        Ok::<_, anyhow::Error>(found)
    })
    .await
    .unwrap();

    assert_eq!(reports[0], [None, None]);
    let [regular, in_place] = reports[1].clone();
    let regular = regular.unwrap();
    assert_eq!(regular.variant, Variant::Regular);
    assert_eq!(regular.index, Some(5));
    assert_eq!(regular.to_string(), "1: regular allreduce does not match");
    assert_eq!(in_place.unwrap().variant, Variant::InPlace);
}

#[tokio::test]
async fn test_pingpong_drops_warmup() {
    let cfg = small(3);
    let reports = launch(3, AlConfig::default(), move |comm| {
        let cfg = Arc::clone(&cfg);
        async move { run_pingpong(comm, &cfg).await }
    })
    .await
    .unwrap();

    for per_rank in &reports {
        let sizes: Vec<usize> = per_rank.iter().map(|r| r.size).collect();
        assert_eq!(sizes, vec![1, 2, 4, 8, 16]);
        for r in per_rank {
            assert_eq!(r.host.len(), 2);
            assert_eq!(r.device.len(), 2);
            assert!(r.host.iter().chain(&r.device).all(|&t| t >= 0.0));
        }
    }
}

#[tokio::test]
async fn test_pingpong_needs_two_ranks() {
    let cfg = small(1);
    let err = launch(1, AlConfig::default(), move |comm| {
        let cfg = Arc::clone(&cfg);
        async move { run_pingpong(comm, &cfg).await }
    })
    .await
    .unwrap_err();
    assert!(format!("{err:#}").contains("at least 2 ranks"));
}

#[tokio::test]
async fn test_device_timer_waits_for_stream() {
    let elapsed = launch(2, AlConfig::default(), |comm| async move {
        let dc = DeviceCommunicator::new(comm)?;
        let timer = start_timer::<DeviceBackend>(&dc).await?;
        allreduces::gpu_wait(0.02, dc.stream())?;
        Ok::<_, anyhow::Error>(finish_timer::<DeviceBackend>(&dc, timer).await?)
    })
    .await
    .unwrap();
    assert!(elapsed.iter().all(|&t| t >= 0.02));
}

#[tokio::test]
async fn test_verdicts_repeat() {
    let reports = launch(3, AlConfig::default(), |comm| async move {
        let case = TestCase::prepare(&comm, &DataGenerator::new(11), 17).await?;
        let mut verdicts = Vec::new();
        for algo in AllreduceAlgorithm::ALL {
            let first = test_allreduce_algo::<HostBackend>(&comm, &case, algo).await?;
            let second = test_allreduce_algo::<HostBackend>(&comm, &case, algo).await?;
            verdicts.push((algo, first, second));
        }
        Ok::<_, anyhow::Error>(verdicts)
    })
    .await
    .unwrap();

    for per_rank in reports {
        for (algo, first, second) in per_rank {
            assert_eq!(first, second, "{algo}");
            assert_eq!(first, [None, None], "{algo}");
        }
    }
}

#[tokio::test]
async fn test_vendor_verdicts_repeat() {
    let vendors = VendorCommunicator::init_all(2).unwrap();
    let reports = launch_with(2, AlConfig::default(), vendors, |comm, vendor| async move {
        let case = TestCase::prepare(&comm, &DataGenerator::new(12), 65).await?;
        let first = test_vendor_allreduce(&vendor, &case).await?;
        let second = test_vendor_allreduce(&vendor, &case).await?;
        Ok::<_, anyhow::Error>((first, second))
    })
    .await
    .unwrap();

    for (first, second) in reports {
        assert_eq!(first, second);
        assert_eq!(first, None);
    }
}

#[tokio::test]
async fn test_failed_rank_aborts_the_others() {
    let outcome = tokio::time::timeout(
        Duration::from_secs(10),
        launch(2, quick_finalize(), |comm| async move {
            if comm.rank() == 0 {
                anyhow::bail!("rank 0 backend failure");
            }
            comm.barrier().await?;
            Ok::<_, anyhow::Error>(())
        }),
    )
    .await
    .expect("launch still blocked after rank 0 failed");

    let err = outcome.unwrap_err();
    assert!(format!("{err:#}").contains("rank 0 backend failure"));
}

#[tokio::test]
async fn test_panicking_rank_aborts_the_others() {
    let outcome = tokio::time::timeout(
        Duration::from_secs(10),
        launch(3, quick_finalize(), |comm| async move {
            if comm.rank() == 2 {
                panic!("rank 2 blew up");
            }
            comm.barrier().await?;
            Ok::<_, anyhow::Error>(())
        }),
    )
    .await
    .expect("launch still blocked after rank 2 panicked");

    let err = outcome.unwrap_err();
    assert!(format!("{err:#}").contains("rank 2"));
}
