use crate::comm::Communicator;
use crate::error::{AlError, Result};
use crate::transport::buffer_pool::PooledBuf;
use crate::types::Rank;
use std::ops::Range;

/// Split of `count` elements into `parts` contiguous chunks whose sizes
/// differ by at most one; the first `count % parts` chunks get the extra
/// element. Counts smaller than `parts` leave trailing chunks empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkLayout {
    offsets: Vec<usize>,
    count: usize,
}

impl ChunkLayout {
    pub fn new(count: usize, parts: usize) -> Self {
        let parts = parts.max(1);
        let base = count / parts;
        let extra = count % parts;
        let mut offsets = Vec::with_capacity(parts);
        let mut offset = 0;
        for i in 0..parts {
            offsets.push(offset);
            offset += base + usize::from(i < extra);
        }
        Self { offsets, count }
    }

    pub fn parts(&self) -> usize {
        self.offsets.len()
    }

    /// Element range of chunk `i`.
    pub fn range(&self, i: usize) -> Range<usize> {
        let end = self.offsets.get(i + 1).copied().unwrap_or(self.count);
        self.offsets[i]..end
    }
}

/// Largest power of two not exceeding `n` (`n >= 1`).
pub(crate) fn largest_power_of_two_le(n: usize) -> usize {
    if n == 0 {
        return 0;
    }
    1 << (usize::BITS - 1 - n.leading_zeros())
}

/// Send bytes to a peer, wrapping errors as `CollectiveFailed`.
pub(crate) async fn collective_send(
    comm: &Communicator,
    dest: Rank,
    tag: u64,
    data: &[u8],
    operation: &'static str,
) -> Result<()> {
    comm.send_bytes(dest, tag, data)
        .await
        .map_err(|e| AlError::collective(operation, comm.rank(), e))
}

/// Receive bytes from a peer, wrapping errors as `CollectiveFailed`.
pub(crate) async fn collective_recv(
    comm: &Communicator,
    src: Rank,
    tag: u64,
    operation: &'static str,
) -> Result<PooledBuf> {
    comm.recv_bytes(src, tag)
        .await
        .map_err(|e| AlError::collective(operation, comm.rank(), e))
}

/// Send to `dest` and receive from `src` concurrently.
pub(crate) async fn send_recv(
    comm: &Communicator,
    dest: Rank,
    src: Rank,
    tag: u64,
    data: &[u8],
    operation: &'static str,
) -> Result<PooledBuf> {
    let (_, received) = tokio::try_join!(
        collective_send(comm, dest, tag, data, operation),
        collective_recv(comm, src, tag, operation),
    )?;
    Ok(received)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_layout_uneven() {
        let layout = ChunkLayout::new(10, 4);
        let ranges: Vec<_> = (0..4).map(|i| layout.range(i)).collect();
        assert_eq!(ranges, vec![0..3, 3..6, 6..8, 8..10]);
    }

    #[test]
    fn test_layout_fewer_elements_than_parts() {
        let layout = ChunkLayout::new(2, 5);
        let lens: Vec<_> = (0..5).map(|i| layout.range(i).len()).collect();
        assert_eq!(lens, vec![1, 1, 0, 0, 0]);
    }

    #[test]
    fn test_largest_power_of_two() {
        assert_eq!(largest_power_of_two_le(1), 1);
        assert_eq!(largest_power_of_two_le(6), 4);
        assert_eq!(largest_power_of_two_le(8), 8);
        assert_eq!(largest_power_of_two_le(9), 8);
    }

    proptest! {
        #[test]
        fn layout_tiles_the_buffer(count in 0usize..10_000, parts in 1usize..64) {
            let layout = ChunkLayout::new(count, parts);
            prop_assert_eq!(layout.parts(), parts);
            let mut next = 0;
            let mut min = usize::MAX;
            let mut max = 0;
            for i in 0..parts {
                let r = layout.range(i);
                prop_assert_eq!(r.start, next);
                next = r.end;
                min = min.min(r.len());
                max = max.max(r.len());
            }
            prop_assert_eq!(next, count);
            prop_assert!(max - min <= 1);
        }
    }
}
