//! Pooled request buffers.
//!
//! A buffer is acquired at encode time and owned exclusively by the
//! in-flight operation; dropping the handle returns the backing allocation
//! to the pool on every exit path, including encode failures and transport
//! errors. Response buffers do not come from this pool: they are
//! reference-counted [`Bytes`] slices released when the last reader drops.

use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex};

use bytes::{Bytes, BytesMut};

const INITIAL_CAPACITY: usize = 256;

/// A pool of reusable request buffers, scoped to one client session.
#[derive(Debug, Clone, Default)]
pub struct BufferPool {
    free: Arc<Mutex<Vec<BytesMut>>>,
}

impl BufferPool {
    /// Creates an empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquires a cleared buffer, reusing a pooled allocation when one is
    /// available.
    pub fn acquire(&self) -> PooledBuffer {
        let buf = self
            .free
            .lock()
            .ok()
            .and_then(|mut free| free.pop())
            .unwrap_or_else(|| BytesMut::with_capacity(INITIAL_CAPACITY));

        PooledBuffer {
            buf,
            free: Arc::clone(&self.free),
        }
    }

    /// Returns the number of idle buffers currently held by the pool.
    pub fn idle_count(&self) -> usize {
        self.free.lock().map(|free| free.len()).unwrap_or(0)
    }
}

/// A scoped handle to one pooled buffer.
#[derive(Debug)]
pub struct PooledBuffer {
    buf: BytesMut,
    free: Arc<Mutex<Vec<BytesMut>>>,
}

impl PooledBuffer {
    /// Reserves a 4-byte big-endian count slot at the current position and
    /// returns its offset, to be filled in with [`patch_count`] once the
    /// element count is known.
    ///
    /// [`patch_count`]: PooledBuffer::patch_count
    pub fn reserve_count(&mut self) -> usize {
        let pos = self.buf.len();
        self.buf.extend_from_slice(&[0; 4]);
        pos
    }

    /// Writes a count into a slot previously reserved with
    /// [`reserve_count`](PooledBuffer::reserve_count).
    pub fn patch_count(&mut self, pos: usize, count: i32) {
        self.buf[pos..pos + 4].copy_from_slice(&count.to_be_bytes());
    }

    /// Detaches the written bytes for sending. The backing capacity still
    /// returns to the pool when this handle drops.
    pub fn freeze(&mut self) -> Bytes {
        self.buf.split().freeze()
    }
}

impl Deref for PooledBuffer {
    type Target = BytesMut;

    fn deref(&self) -> &Self::Target {
        &self.buf
    }
}

impl DerefMut for PooledBuffer {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.buf
    }
}

impl Drop for PooledBuffer {
    fn drop(&mut self) {
        let mut buf = std::mem::take(&mut self.buf);
        buf.clear();
        if let Ok(mut free) = self.free.lock() {
            free.push(buf);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_returns_to_pool_on_drop() {
        let pool = BufferPool::new();
        assert_eq!(pool.idle_count(), 0);
        {
            let mut buf = pool.acquire();
            buf.extend_from_slice(b"abc");
        }
        assert_eq!(pool.idle_count(), 1);
    }

    #[test]
    fn test_reacquired_buffer_is_empty() {
        let pool = BufferPool::new();
        {
            let mut buf = pool.acquire();
            buf.extend_from_slice(b"leftover");
        }
        let buf = pool.acquire();
        assert!(buf.is_empty());
        assert_eq!(pool.idle_count(), 0);
    }

    #[test]
    fn test_count_slot_patching() {
        let pool = BufferPool::new();
        let mut buf = pool.acquire();
        buf.extend_from_slice(&[0xAA]);
        let pos = buf.reserve_count();
        buf.extend_from_slice(&[0xBB, 0xCC]);
        buf.patch_count(pos, 0x0102_0304);

        assert_eq!(&buf[..], &[0xAA, 0x01, 0x02, 0x03, 0x04, 0xBB, 0xCC]);
    }

    #[test]
    fn test_freeze_detaches_written_bytes() {
        let pool = BufferPool::new();
        let mut buf = pool.acquire();
        buf.extend_from_slice(b"payload");
        let frozen = buf.freeze();
        assert_eq!(&frozen[..], b"payload");
        assert!(buf.is_empty());
    }

    #[test]
    fn test_returns_on_early_exit_path() {
        let pool = BufferPool::new();
        fn fails(pool: &BufferPool) -> datagrid_core::Result<()> {
            let mut buf = pool.acquire();
            buf.extend_from_slice(b"partial");
            Err(datagrid_core::GridError::Format("boom".to_string()))
        }
        assert!(fails(&pool).is_err());
        assert_eq!(pool.idle_count(), 1);
    }
}
