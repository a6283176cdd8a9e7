use crate::config::AlConfig;
use crate::types::AllreduceAlgorithm;

/// Resolve `Automatic` to a concrete algorithm for a message of `bytes`
/// over `world` ranks. Concrete algorithms pass through unchanged.
///
/// The inputs are identical on every rank, so every rank picks the same
/// algorithm.
pub fn resolve(
    algo: AllreduceAlgorithm,
    bytes: usize,
    world: usize,
    config: &AlConfig,
) -> AllreduceAlgorithm {
    if algo != AllreduceAlgorithm::Automatic {
        return algo;
    }
    if world <= 1 {
        AllreduceAlgorithm::Passthrough
    } else if bytes <= config.small_msg_bytes {
        AllreduceAlgorithm::RecursiveDoubling
    } else if world.is_power_of_two() && bytes <= config.large_msg_bytes {
        AllreduceAlgorithm::Rabenseifner
    } else if world <= config.ring_max_world {
        AllreduceAlgorithm::Ring
    } else {
        AllreduceAlgorithm::PeRing
    }
}
