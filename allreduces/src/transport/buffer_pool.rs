use crossbeam_queue::ArrayQueue;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

/// Buffers up to this size are recycled through the small tier.
const SMALL_BUF_CAPACITY: usize = 64 * 1024;
const SMALL_POOL_SIZE: usize = 128;

/// Buffers up to this size are recycled through the large tier. Anything
/// bigger is allocated fresh and freed on drop.
const LARGE_BUF_CAPACITY: usize = 4 * 1024 * 1024;
const LARGE_POOL_SIZE: usize = 16;

/// Lock-free pool of receive buffers shared by the routers of one
/// communicator.
///
/// The pool starts empty and fills as buffers are returned, so an idle
/// communicator holds no memory. A tier that is already full simply drops
/// the returned buffer.
pub struct BufferPool {
    small: ArrayQueue<Vec<u8>>,
    large: ArrayQueue<Vec<u8>>,
}

impl BufferPool {
    pub fn new() -> Arc<Self> {
        Self::with_capacity(SMALL_POOL_SIZE, LARGE_POOL_SIZE)
    }

    /// Pool that retains at most `small` and `large` idle buffers per tier.
    pub fn with_capacity(small: usize, large: usize) -> Arc<Self> {
        Arc::new(Self {
            small: ArrayQueue::new(small.max(1)),
            large: ArrayQueue::new(large.max(1)),
        })
    }

    /// Check out a zeroed buffer of exactly `len` bytes.
    pub fn checkout(self: &Arc<Self>, len: usize) -> PooledBuf {
        let mut buf = self
            .tier(len)
            .and_then(ArrayQueue::pop)
            .unwrap_or_else(|| Vec::with_capacity(len));
        buf.clear();
        buf.resize(len, 0);
        PooledBuf {
            buf,
            pool: Some(Arc::clone(self)),
        }
    }

    /// Number of idle buffers currently held.
    pub fn idle(&self) -> usize {
        self.small.len() + self.large.len()
    }

    fn tier(&self, len: usize) -> Option<&ArrayQueue<Vec<u8>>> {
        if len <= SMALL_BUF_CAPACITY {
            Some(&self.small)
        } else if len <= LARGE_BUF_CAPACITY {
            Some(&self.large)
        } else {
            None
        }
    }

    fn give_back(&self, buf: Vec<u8>) {
        if let Some(q) = self.tier(buf.capacity()) {
            let _ = q.push(buf);
        }
    }
}

/// A byte buffer that returns to its pool on drop.
pub struct PooledBuf {
    buf: Vec<u8>,
    pool: Option<Arc<BufferPool>>,
}

impl PooledBuf {
    /// Wrap a plain vector; it is freed normally on drop.
    pub fn unpooled(buf: Vec<u8>) -> Self {
        Self { buf, pool: None }
    }

    /// Detach from the pool and take the bytes.
    pub fn into_vec(mut self) -> Vec<u8> {
        self.pool = None;
        std::mem::take(&mut self.buf)
    }
}

impl Deref for PooledBuf {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.buf
    }
}

impl DerefMut for PooledBuf {
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.buf
    }
}

impl std::fmt::Debug for PooledBuf {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledBuf")
            .field("len", &self.buf.len())
            .field("pooled", &self.pool.is_some())
            .finish()
    }
}

impl Drop for PooledBuf {
    fn drop(&mut self) {
        if let Some(pool) = self.pool.take() {
            pool.give_back(std::mem::take(&mut self.buf));
        }
    }
}
