use allreduces::{AlError, Rank};

pub type Result<T> = std::result::Result<T, VendorError>;

#[derive(Debug, thiserror::Error)]
pub enum VendorError {
    #[error("allreduces error: {0}")]
    Al(#[from] AlError),

    #[error("invalid rank {rank}: world size is {world_size}")]
    InvalidRank { rank: Rank, world_size: u32 },

    #[error("invalid world size {0}: at least one device is required")]
    InvalidWorldSize(u32),
}
