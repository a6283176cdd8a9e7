//! A vendor collective library for the simulated device.
//!
//! Ranks of a [`VendorCommunicator`] world share an in-process device
//! fabric instead of the network. Every operation is queued on the rank's
//! [`allreduces::Stream`] and returns once queued. Reductions run over a
//! binomial tree or a ring, picked by the library, so their combination
//! order differs from the network baseline.

pub mod backend;
pub mod bootstrap;
pub mod collective;
pub mod comm;
pub mod error;
pub(crate) mod fabric;
pub mod types;

pub use backend::VendorBackend;
pub use comm::VendorCommunicator;
pub use error::{Result, VendorError};
pub use types::{Protocol, VendorAlgorithm};
