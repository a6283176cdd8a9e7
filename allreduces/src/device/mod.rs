//! Simulated accelerator: device-resident buffers and in-order streams.
//!
//! Device memory lives on the host heap, but it is only reachable through
//! a [`DeviceBuffer`] handle, and work on it is queued on a [`Stream`] that
//! runs operations one at a time in enqueue order. Like a real device, a
//! result written by stream work is only safe to read after
//! [`Stream::synchronize`].

mod buffer;
mod kernel;
mod stream;

pub use buffer::DeviceBuffer;
pub use kernel::gpu_wait;
pub use stream::Stream;
