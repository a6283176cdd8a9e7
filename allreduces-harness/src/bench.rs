//! Ping-pong latency between ranks 0 and 1, host path against device path.

use crate::config::HarnessConfig;
use crate::human_readable_size;
use crate::stats::format_stats;
use crate::timer::{finish_timer, start_timer};
use allreduces::{
    Communicator, DeviceBackend, DeviceBuffer, DeviceCommunicator, HostBackend, Rank, gpu_wait,
};
use anyhow::{Context as _, bail, ensure};
use std::sync::Arc;

/// Per-trial one-way times for one message size, warm-up trial dropped.
#[derive(Debug, Clone)]
pub struct SizeReport {
    pub size: usize,
    pub host: Vec<f64>,
    pub device: Vec<f64>,
}

/// Doubling sizes from `start` through `max`.
pub fn bench_sizes(start: usize, max: usize) -> Vec<usize> {
    std::iter::successors(Some(start.max(1)), |&s| s.checked_mul(2))
        .take_while(|&s| s <= max)
        .collect()
}

fn partner(rank: Rank) -> Option<Rank> {
    match rank {
        0 => Some(1),
        1 => Some(0),
        _ => None,
    }
}

/// Rank 0 sends ones through the device path and rank 1 checks them.
async fn precheck(dc: &DeviceCommunicator, size: usize) -> anyhow::Result<()> {
    match dc.rank() {
        0 => {
            let ones = DeviceBuffer::from_host(&vec![1.0f32; size]);
            dc.send(&ones, 1)?;
            dc.synchronize().await?;
        }
        1 => {
            let buf = DeviceBuffer::<f32>::zeroed(size);
            dc.recv(&buf, 0)?;
            dc.synchronize().await?;
            let got = buf.copy_to_host()?;
            if let Some(i) = got.iter().position(|&v| v != 1.0) {
                bail!("device pre-check at size {size}: element {i} is {}", got[i]);
            }
        }
        _ => {}
    }
    Ok(())
}

async fn host_trial(
    comm: &Arc<Communicator>,
    dc: &DeviceCommunicator,
    bufs: (Vec<f32>, Vec<f32>),
    gpu_wait_secs: f64,
) -> anyhow::Result<(f64, (Vec<f32>, Vec<f32>))> {
    gpu_wait(gpu_wait_secs, dc.stream())?;
    let timer = start_timer::<HostBackend>(comm).await?;
    let bufs = match partner(comm.rank()) {
        Some(peer) => {
            let send = comm.isend(bufs.0, peer)?;
            let recv = comm.irecv(bufs.1, peer)?;
            while !(comm.test(&send)? && comm.test(&recv)?) {
                tokio::task::yield_now().await;
            }
            (comm.wait(send).await?, comm.wait(recv).await?)
        }
        None => bufs,
    };
    let elapsed = finish_timer::<HostBackend>(comm, timer).await? / 2.0;
    dc.synchronize().await?;
    Ok((elapsed, bufs))
}

async fn device_trial(
    dc: &DeviceCommunicator,
    send: &DeviceBuffer<f32>,
    recv: &DeviceBuffer<f32>,
    gpu_wait_secs: f64,
) -> anyhow::Result<f64> {
    gpu_wait(gpu_wait_secs, dc.stream())?;
    let timer = start_timer::<DeviceBackend>(dc).await?;
    match dc.rank() {
        0 => {
            dc.send(send, 1)?;
            dc.recv(recv, 1)?;
        }
        1 => {
            dc.recv(recv, 0)?;
            dc.send(send, 0)?;
        }
        _ => {}
    }
    Ok(finish_timer::<DeviceBackend>(dc, timer).await? / 2.0)
}

/// Run the sweep on this rank. Ranks 0 and 1 exchange messages; any other
/// rank only joins the barriers.
pub async fn run_pingpong(
    comm: Arc<Communicator>,
    config: &HarnessConfig,
) -> anyhow::Result<Vec<SizeReport>> {
    ensure!(
        comm.world_size() >= 2,
        "ping-pong needs at least 2 ranks, world has {}",
        comm.world_size()
    );
    let dc = DeviceCommunicator::new(Arc::clone(&comm)).context("creating the device stream")?;
    let trials = config.bench_trials.max(2);
    let mut reports = Vec::new();

    for size in bench_sizes(config.bench_start_size, config.bench_max_size) {
        if comm.rank() == 0 {
            println!("Benchmarking size {}", human_readable_size(size));
        }
        precheck(&dc, size).await?;

        let mut bufs = (vec![1.0f32; size], vec![0.0f32; size]);
        let mut host = Vec::with_capacity(trials);
        for _ in 0..trials {
            let (t, back) = host_trial(&comm, &dc, bufs, config.bench_gpu_wait).await?;
            host.push(t);
            bufs = back;
        }

        let send = DeviceBuffer::from_host(&vec![1.0f32; size]);
        let recv = DeviceBuffer::<f32>::zeroed(size);
        let mut device = Vec::with_capacity(trials);
        for _ in 0..trials {
            device.push(device_trial(&dc, &send, &recv, config.bench_gpu_wait).await?);
        }

        host.remove(0);
        device.remove(0);
        tracing::debug!(rank = comm.rank(), size, "ping-pong size done");
        let report = SizeReport { size, host, device };

        // Rank 0's block, then rank 1's, so the two never interleave.
        for printer in [0, 1] {
            if comm.rank() == printer {
                print_report(printer, &report);
            }
            comm.barrier().await?;
        }
        reports.push(report);
    }
    Ok(reports)
}

/// The block one rank prints for one size.
pub fn format_report(rank: Rank, report: &SizeReport) -> String {
    format!(
        "Rank {rank}:\n{}\n{}",
        format_stats("host", &report.host),
        format_stats("mpicuda", &report.device)
    )
}

fn print_report(rank: Rank, report: &SizeReport) {
    println!("{}", format_report(rank, report));
}
