use crate::error::{AlError, Result};
use crate::types::Element;
use std::sync::{Arc, Mutex, MutexGuard};

/// A fixed-length buffer resident in (simulated) device memory.
///
/// The contents are only reachable by copying to or from the host, the way
/// a device pointer is. Copies are synchronous with respect to the caller
/// but not to any stream: read a buffer that stream work writes only after
/// synchronizing that stream.
pub struct DeviceBuffer<T: Element> {
    mem: Arc<Mutex<Vec<T>>>,
    len: usize,
}

impl<T: Element> DeviceBuffer<T> {
    /// Allocate `len` zeroed elements.
    pub fn zeroed(len: usize) -> Self {
        Self::from_vec(vec![T::zeroed(); len])
    }

    /// Allocate and fill from host memory.
    pub fn from_host(data: &[T]) -> Self {
        Self::from_vec(data.to_vec())
    }

    fn from_vec(data: Vec<T>) -> Self {
        Self {
            len: data.len(),
            mem: Arc::new(Mutex::new(data)),
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Device-to-host copy of the whole buffer.
    pub fn copy_to_host(&self) -> Result<Vec<T>> {
        Ok(self.lock()?.clone())
    }

    /// Host-to-device copy; `data` must match the buffer length.
    pub fn copy_from_host(&self, data: &[T]) -> Result<()> {
        if data.len() != self.len {
            return Err(AlError::BufferSizeMismatch {
                expected: self.len * std::mem::size_of::<T>(),
                actual: std::mem::size_of_val(data),
            });
        }
        self.lock()?.copy_from_slice(data);
        Ok(())
    }

    /// Another handle to the same device memory, for moving into work
    /// queued on a stream.
    pub fn alias(&self) -> Self {
        Self {
            mem: Arc::clone(&self.mem),
            len: self.len,
        }
    }

    /// Whether two handles name the same device memory.
    pub fn same_memory(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.mem, &other.mem)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Vec<T>>> {
        self.mem
            .lock()
            .map_err(|_| AlError::LockPoisoned("device buffer"))
    }
}

impl<T: Element> std::fmt::Debug for DeviceBuffer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceBuffer")
            .field("dtype", &T::DTYPE)
            .field("len", &self.len)
            .finish()
    }
}
