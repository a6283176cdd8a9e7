//! Allreduce collectives over interchangeable backends.
//!
//! A [`Context`] builds an in-process world of ranks connected by a QUIC
//! mesh on loopback. Each rank's [`Communicator`] offers blocking and
//! non-blocking point-to-point and allreduce operations with a selectable
//! [`AllreduceAlgorithm`]. [`DeviceCommunicator`] runs the same operations on
//! simulated device buffers, ordered by a [`Stream`]. The [`Backend`] trait
//! puts these behind one interface for drivers that should not care which
//! one they run on.

pub mod backend;
pub mod collective;
pub mod comm;
pub mod config;
pub mod context;
pub mod device;
pub mod error;
pub mod protocol;
pub mod reduce;
pub mod request;
pub mod transport;
pub mod types;

pub use backend::{Backend, DeviceBackend, DeviceCommunicator, HostBackend};
pub use comm::{Communicator, SyncCommunicator};
pub use config::AlConfig;
pub use context::Context;
pub use device::{DeviceBuffer, Stream, gpu_wait};
pub use error::{AlError, Result};
pub use request::{Request, RequestId, RequestState, RequestTable};
pub use types::{AllreduceAlgorithm, DataType, Element, Rank, ReduceOp};
