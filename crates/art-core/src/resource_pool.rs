//! Reusable frame/descriptor buffers with scoped release discipline (C7).
//!
//! One owning handle, scoped access, no manual release on the happy
//! path. A buffer checked
//! out of the pool is returned automatically when its guard drops,
//! regardless of which path — success, early return, or panic unwind —
//! leaves the scope.

use parking_lot::Mutex;
use std::sync::Arc;

/// A pool of same-shaped byte buffers, keyed by capacity. Buffers are
/// zeroed on checkout but not on return (the next checkout overwrites
/// them wholesale).
pub struct ResourcePool {
    inner: Arc<Mutex<PoolInner>>,
    max_buffers: usize,
}

struct PoolInner {
    free: Vec<Vec<u8>>,
    outstanding: usize,
}

impl ResourcePool {
    pub fn new(max_buffers: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(PoolInner {
                free: Vec::new(),
                outstanding: 0,
            })),
            max_buffers,
        }
    }

    /// Check out a buffer of at least `capacity` bytes. Reuses a freed
    /// buffer if one is large enough; otherwise allocates.
    pub fn acquire(&self, capacity: usize) -> crate::Result<PooledBuffer> {
        let mut inner = self.inner.lock();
        if inner.outstanding >= self.max_buffers && inner.free.is_empty() {
            return Err(crate::ArError::ResourceExhausted(format!(
                "pool has {} buffers outstanding (max {})",
                inner.outstanding, self.max_buffers
            )));
        }
        let mut buf = match inner.free.iter().position(|b| b.capacity() >= capacity) {
            Some(idx) => inner.free.swap_remove(idx),
            None => Vec::with_capacity(capacity),
        };
        buf.clear();
        buf.resize(capacity, 0);
        inner.outstanding += 1;
        Ok(PooledBuffer {
            buf: Some(buf),
            pool: Arc::clone(&self.inner),
        })
    }

    pub fn outstanding(&self) -> usize {
        self.inner.lock().outstanding
    }

    pub fn free_count(&self) -> usize {
        self.inner.lock().free.len()
    }
}

/// RAII guard around a checked-out buffer. Dropping it returns the
/// buffer to the pool; there is no `.release()` method on purpose.
pub struct PooledBuffer {
    buf: Option<Vec<u8>>,
    pool: Arc<Mutex<PoolInner>>,
}

impl PooledBuffer {
    pub fn as_slice(&self) -> &[u8] {
        self.buf.as_deref().unwrap_or(&[])
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        self.buf.as_deref_mut().unwrap_or(&mut [])
    }
}

impl Drop for PooledBuffer {
    fn drop(&mut self) {
        if let Some(buf) = self.buf.take() {
            let mut inner = self.pool.lock();
            inner.outstanding -= 1;
            inner.free.push(buf);
        }
    }
}
