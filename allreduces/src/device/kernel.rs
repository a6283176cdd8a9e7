use crate::device::Stream;
use crate::error::Result;
use std::time::Duration;

/// Queue a kernel that keeps the stream busy for `seconds`.
///
/// Used before timed regions so that the host call under measurement is
/// issued while the device is still busy, as real workloads would.
pub fn gpu_wait(seconds: f64, stream: &Stream) -> Result<()> {
    let busy = Duration::from_secs_f64(seconds.max(0.0));
    stream.enqueue(async move {
        tokio::time::sleep(busy).await;
        Ok(())
    })
}
