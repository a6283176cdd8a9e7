//! The correctness suites run by `test_correctness`.
//!
//! Every rank generates its own input, the baseline reduces it once per
//! size, and each candidate's output is compared against that. A mismatch
//! is printed and recorded; the run goes on.

use crate::compare::{EPSILON, VENDOR_SUM_THRESHOLD, check_sum, first_mismatch};
use crate::config::HarnessConfig;
use crate::datagen::DataGenerator;
use crate::human_readable_size;
use crate::oracle::TestCase;
use allreduces::{AllreduceAlgorithm, Backend, Communicator, HostBackend, Rank, ReduceOp};
use allreduces_vendor::{VendorAlgorithm, VendorBackend, VendorCommunicator};
use std::fmt;
use std::sync::Arc;

/// Message sizes checked: 0, then every power of two up to `max_size`, each
/// followed by its successor (skipping 2, which is already a power of two).
pub fn sizes(max_size: usize) -> Vec<usize> {
    let mut sizes = vec![0];
    let mut size = 1;
    while size <= max_size {
        sizes.push(size);
        if size > 1 {
            sizes.push(size + 1);
        }
        size *= 2;
    }
    sizes
}

/// Which form of the call produced a mismatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    Regular,
    InPlace,
    Vendor,
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Variant::Regular => "regular",
            Variant::InPlace => "in-place",
            Variant::Vendor => "vendor",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mismatch {
    pub rank: Rank,
    pub size: usize,
    pub algorithm: String,
    pub variant: Variant,
    /// First differing element, when known.
    pub index: Option<usize>,
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} allreduce does not match", self.rank, self.variant)
    }
}

/// Outcome of one rank's suite.
#[derive(Debug, Default, Clone)]
pub struct Report {
    /// Number of comparisons made.
    pub checks: usize,
    pub mismatches: Vec<Mismatch>,
}

impl Report {
    pub fn passed(&self) -> bool {
        self.mismatches.is_empty()
    }

    fn record(&mut self, mismatch: Option<Mismatch>) {
        self.checks += 1;
        if let Some(m) = mismatch {
            println!("{m}");
            tracing::debug!(
                rank = m.rank,
                size = m.size,
                algorithm = %m.algorithm,
                index = ?m.index,
                "mismatch"
            );
            self.mismatches.push(m);
        }
    }
}

fn compare(case: &TestCase, actual: &[f32], algorithm: impl fmt::Display, variant: Variant) -> Option<Mismatch> {
    first_mismatch(&case.expected, actual, EPSILON).map(|index| Mismatch {
        rank: case.rank,
        size: case.size,
        algorithm: algorithm.to_string(),
        variant,
        index: Some(index),
    })
}

/// Blocking out-of-place and in-place allreduce with `algo` on backend `B`.
pub async fn test_allreduce_algo<B: Backend>(
    comm: &B::Comm,
    case: &TestCase,
    algo: B::Algo,
) -> Result<[Option<Mismatch>; 2], B::Error> {
    let send = B::upload(&case.input);
    let mut recv = B::upload(&vec![0.0f32; case.size]);
    B::allreduce(comm, &send, &mut recv, ReduceOp::Sum, algo).await?;
    B::synchronize(comm).await?;
    let regular = compare(case, &B::download(&recv)?, algo, Variant::Regular);

    let mut buf = B::upload(&case.input);
    B::allreduce_in_place(comm, &mut buf, ReduceOp::Sum, algo).await?;
    B::synchronize(comm).await?;
    let in_place = compare(case, &B::download(&buf)?, algo, Variant::InPlace);

    Ok([regular, in_place])
}

/// Non-blocking out-of-place and in-place allreduce with `algo`, each
/// waited before checking.
pub async fn test_nb_allreduce_algo(
    comm: &Arc<Communicator>,
    case: &TestCase,
    algo: AllreduceAlgorithm,
) -> allreduces::Result<[Option<Mismatch>; 2]> {
    let req = comm.nonblocking_allreduce(
        &case.input,
        vec![0.0f32; case.size],
        ReduceOp::Sum,
        algo,
    )?;
    let recv = comm.wait(req).await?;
    let label = format!("NB {algo}");
    let regular = compare(case, &recv, &label, Variant::Regular);

    let req = comm.nonblocking_allreduce_in_place(case.input.clone(), ReduceOp::Sum, algo)?;
    let buf = comm.wait(req).await?;
    let in_place = compare(case, &buf, &label, Variant::InPlace);

    Ok([regular, in_place])
}

/// Out-of-place vendor allreduce, checked by comparing whole-vector sums.
pub async fn test_vendor_allreduce(
    comm: &VendorCommunicator,
    case: &TestCase,
) -> allreduces_vendor::Result<Option<Mismatch>> {
    let send = VendorBackend::upload(&case.input);
    let mut recv = VendorBackend::upload(&vec![0.0f32; case.size]);
    VendorBackend::allreduce(comm, &send, &mut recv, ReduceOp::Sum, VendorAlgorithm::Automatic)
        .await?;
    VendorBackend::synchronize(comm).await?;
    let actual = VendorBackend::download(&recv)?;
    if check_sum(&case.expected, &actual, VENDOR_SUM_THRESHOLD) {
        return Ok(None);
    }
    Ok(Some(Mismatch {
        rank: case.rank,
        size: case.size,
        algorithm: VendorAlgorithm::Automatic.to_string(),
        variant: Variant::Vendor,
        index: None,
    }))
}

/// Every algorithm, blocking then non-blocking, at every size.
pub async fn run_baseline_suite(
    comm: Arc<Communicator>,
    config: &HarnessConfig,
) -> anyhow::Result<Report> {
    let generator = DataGenerator::new(config.data_seed);
    let lead = comm.rank() == 0;
    let mut report = Report::default();

    for size in sizes(config.test_max_size) {
        if lead {
            println!("Testing size {}", human_readable_size(size));
        }
        let case = TestCase::prepare(&comm, &generator, size).await?;

        for algo in AllreduceAlgorithm::ALL {
            comm.barrier().await?;
            if lead {
                println!(" Algo: {algo}");
            }
            for m in test_allreduce_algo::<HostBackend>(&comm, &case, algo).await? {
                report.record(m);
            }
        }
        for algo in AllreduceAlgorithm::ALL {
            comm.barrier().await?;
            if lead {
                println!(" Algo: NB {algo}");
            }
            for m in test_nb_allreduce_algo(&comm, &case, algo).await? {
                report.record(m);
            }
        }
    }
    Ok(report)
}

/// The vendor backend at every size, against the network baseline.
pub async fn run_vendor_suite(
    comm: Arc<Communicator>,
    vendor: VendorCommunicator,
    config: &HarnessConfig,
) -> anyhow::Result<Report> {
    let generator = DataGenerator::new(config.data_seed);
    let mut report = Report::default();

    for size in sizes(config.test_max_size) {
        if comm.rank() == 0 {
            println!("Testing size {}", human_readable_size(size));
        }
        let case = TestCase::prepare(&comm, &generator, size).await?;
        comm.barrier().await?;
        report.record(test_vendor_allreduce(&vendor, &case).await?);
    }
    Ok(report)
}
