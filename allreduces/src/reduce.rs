//! Element-wise reduction primitives shared by the collective algorithms.
//!
//! Received payloads are raw bytes that may not be aligned for `T`, so the
//! byte-side helpers read through `bytemuck::pod_read_unaligned` instead of
//! casting the slice.

use crate::error::{AlError, Result};
use crate::types::{Element, Rank, ReduceOp};

/// Operand order for a combination.
///
/// Both partners of an exchange must evaluate `lower_rank op higher_rank`
/// so that they end up with bit-identical results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    /// `dst = dst op src`
    LocalFirst,
    /// `dst = src op dst`
    RemoteFirst,
}

impl Order {
    /// Order that puts the lower of the two ranks on the left.
    pub fn by_rank(local: Rank, remote: Rank) -> Self {
        if remote < local {
            Order::RemoteFirst
        } else {
            Order::LocalFirst
        }
    }
}

/// View an element slice as its wire bytes.
#[inline]
pub fn as_bytes<T: Element>(data: &[T]) -> &[u8] {
    bytemuck::cast_slice(data)
}

/// `dst[i] = dst[i] op src[i]` over typed slices of equal length.
pub fn reduce_into<T: Element>(dst: &mut [T], src: &[T], op: ReduceOp) -> Result<()> {
    if dst.len() != src.len() {
        return Err(AlError::BufferSizeMismatch {
            expected: std::mem::size_of_val(dst),
            actual: std::mem::size_of_val(src),
        });
    }
    for (d, &s) in dst.iter_mut().zip(src) {
        *d = T::combine(*d, s, op);
    }
    Ok(())
}

/// Combine a received byte payload into `dst` element-wise.
pub fn reduce_bytes_into<T: Element>(
    dst: &mut [T],
    src: &[u8],
    op: ReduceOp,
    order: Order,
) -> Result<()> {
    check_len::<T>(dst.len(), src)?;
    let width = std::mem::size_of::<T>();
    for (d, chunk) in dst.iter_mut().zip(src.chunks_exact(width)) {
        let s: T = bytemuck::pod_read_unaligned(chunk);
        *d = match order {
            Order::LocalFirst => T::combine(*d, s, op),
            Order::RemoteFirst => T::combine(s, *d, op),
        };
    }
    Ok(())
}

/// Overwrite `dst` with a received byte payload.
pub fn copy_bytes_into<T: Element>(dst: &mut [T], src: &[u8]) -> Result<()> {
    check_len::<T>(dst.len(), src)?;
    bytemuck::cast_slice_mut::<T, u8>(dst).copy_from_slice(src);
    Ok(())
}

/// Decode a received byte payload into a fresh vector.
pub fn vec_from_bytes<T: Element>(src: &[u8]) -> Result<Vec<T>> {
    let width = std::mem::size_of::<T>();
    if src.len() % width != 0 {
        return Err(AlError::DecodeFailed(format!(
            "{} payload bytes is not a whole number of {} elements",
            src.len(),
            T::DTYPE
        )));
    }
    Ok(src
        .chunks_exact(width)
        .map(bytemuck::pod_read_unaligned)
        .collect())
}

fn check_len<T: Element>(count: usize, src: &[u8]) -> Result<()> {
    let expected = count * std::mem::size_of::<T>();
    if src.len() != expected {
        return Err(AlError::BufferSizeMismatch {
            expected,
            actual: src.len(),
        });
    }
    Ok(())
}
