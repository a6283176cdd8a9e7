use allreduces::Stream;

use crate::comm::VendorCommunicator;
use crate::error::{Result, VendorError};
use crate::fabric;

impl VendorCommunicator {
    /// Create a world of `world_size` devices in this process, one
    /// communicator per device in rank order, each with its own stream.
    ///
    /// Must be called inside a tokio runtime; the stream workers run on it.
    pub fn init_all(world_size: u32) -> Result<Vec<VendorCommunicator>> {
        if world_size == 0 {
            return Err(VendorError::InvalidWorldSize(world_size));
        }
        let comms = fabric::connect(world_size as usize)
            .into_iter()
            .map(|port| Ok(VendorCommunicator::new(port, Stream::new()?)))
            .collect::<Result<Vec<_>>>()?;
        tracing::debug!(world_size, "vendor world initialized");
        Ok(comms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_init_all_ranks() {
        let comms = VendorCommunicator::init_all(3).unwrap();
        let ranks: Vec<_> = comms.iter().map(|c| c.rank()).collect();
        assert_eq!(ranks, vec![0, 1, 2]);
        assert!(comms.iter().all(|c| c.world_size() == 3));
    }

    #[tokio::test]
    async fn test_init_all_rejects_empty_world() {
        assert!(matches!(
            VendorCommunicator::init_all(0),
            Err(VendorError::InvalidWorldSize(0))
        ));
    }

    #[test]
    fn test_init_all_needs_runtime() {
        assert!(matches!(
            VendorCommunicator::init_all(2),
            Err(VendorError::Al(allreduces::AlError::StreamFailed(_)))
        ));
    }
}
