//! Barrier-aligned wall-clock timing.

use allreduces::Backend;
use std::time::Instant;

/// Start of a timed region, from [`start_timer`].
#[derive(Debug, Clone, Copy)]
pub struct Timer(Instant);

/// Wait for every rank (and, on stream-ordered backends, for this rank's
/// stream), then start the clock.
pub async fn start_timer<B: Backend>(comm: &B::Comm) -> Result<Timer, B::Error> {
    B::barrier(comm).await?;
    Ok(Timer(Instant::now()))
}

/// Wait as in [`start_timer`], then return the seconds elapsed since
/// `timer` started.
pub async fn finish_timer<B: Backend>(comm: &B::Comm, timer: Timer) -> Result<f64, B::Error> {
    B::barrier(comm).await?;
    Ok(timer.0.elapsed().as_secs_f64())
}
