//! Shared pool of reusable output buffers

use std::mem;
use std::ops::{Deref, DerefMut};
use std::sync::{Mutex, PoisonError};

/// Buffers kept around at most; extra releases are dropped
const MAX_POOLED: usize = 64;

/// Reusable `String` buffers shared by concurrent renders
#[derive(Debug, Default)]
pub struct BufferPool {
    buffers: Mutex<Vec<String>>,
}

impl BufferPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take an empty buffer; it goes back to the pool when the guard drops
    pub fn acquire(&self) -> PooledBuffer<'_> {
        let buffer = self
            .buffers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop()
            .unwrap_or_default();
        PooledBuffer { pool: self, buffer }
    }

    /// Number of idle buffers
    pub fn idle(&self) -> usize {
        self.buffers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn release(&self, mut buffer: String) {
        buffer.clear();
        let mut buffers = self.buffers.lock().unwrap_or_else(PoisonError::into_inner);
        if buffers.len() < MAX_POOLED {
            buffers.push(buffer);
        }
    }
}

/// A buffer on loan from a [`BufferPool`]
///
/// Contents are cleared on release, so copy them out before dropping.
#[derive(Debug)]
pub struct PooledBuffer<'p> {
    pool: &'p BufferPool,
    buffer: String,
}

impl Deref for PooledBuffer<'_> {
    type Target = String;

    fn deref(&self) -> &String {
        &self.buffer
    }
}

impl DerefMut for PooledBuffer<'_> {
    fn deref_mut(&mut self) -> &mut String {
        &mut self.buffer
    }
}

impl Drop for PooledBuffer<'_> {
    fn drop(&mut self) {
        self.pool.release(mem::take(&mut self.buffer));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_returns_to_pool() {
        let pool = BufferPool::new();
        {
            let mut buffer = pool.acquire();
            buffer.push_str("hello");
            assert_eq!(pool.idle(), 0);
        }
        assert_eq!(pool.idle(), 1);
    }

    #[test]
    fn test_reused_buffer_is_empty() {
        let pool = BufferPool::new();
        {
            let mut buffer = pool.acquire();
            buffer.push_str("stale");
        }
        let buffer = pool.acquire();
        assert!(buffer.is_empty());
        assert!(buffer.capacity() >= 5);
    }

    #[test]
    fn test_release_on_error_path() {
        fn fails(pool: &BufferPool) -> Result<String, ()> {
            let mut buffer = pool.acquire();
            buffer.push_str("partial");
            Err(())
        }

        let pool = BufferPool::new();
        assert!(fails(&pool).is_err());
        assert_eq!(pool.idle(), 1);
    }
}
