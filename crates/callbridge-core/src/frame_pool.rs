//! A process-wide pool of reusable byte buffers sized to the configured
//! output frame, reducing allocator pressure in the hot path (§4 "Frame
//! pool").

use std::sync::Mutex;

/// Pool of `Vec<u8>` buffers, each exactly `frame_size` bytes long.
///
/// Pooled slices undersized relative to the pool's configured frame size
/// are discarded on release rather than retained, per the component
/// design ("undersized pooled slices are discarded and replaced").
#[derive(Debug)]
pub struct FramePool {
    frame_size: usize,
    free: Mutex<Vec<Vec<u8>>>,
}

impl FramePool {
    /// Creates an empty pool for frames of `frame_size` bytes.
    #[must_use]
    pub fn new(frame_size: usize) -> Self {
        Self {
            frame_size,
            free: Mutex::new(Vec::new()),
        }
    }

    /// The frame size this pool was configured for.
    #[must_use]
    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    /// Takes a buffer of exactly `frame_size` bytes from the pool,
    /// allocating a fresh one if the pool is empty.
    #[must_use]
    pub fn acquire(&self) -> Vec<u8> {
        let mut free = self.free.lock().unwrap_or_else(|e| e.into_inner());
        match free.pop() {
            Some(mut buf) => {
                buf.clear();
                buf.resize(self.frame_size, 0);
                buf
            }
            None => vec![0u8; self.frame_size],
        }
    }

    /// Returns a buffer to the pool. Buffers not shaped to this pool's
    /// frame size are dropped instead of retained.
    pub fn release(&self, buf: Vec<u8>) {
        if buf.capacity() < self.frame_size {
            return;
        }
        let mut free = self.free.lock().unwrap_or_else(|e| e.into_inner());
        free.push(buf);
    }

    /// Number of buffers currently idle in the pool.
    #[must_use]
    pub fn len(&self) -> usize {
        self.free.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Whether the pool currently holds no idle buffers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_yields_exact_frame_size() {
        let pool = FramePool::new(160);
        let frame = pool.acquire();
        assert_eq!(frame.len(), 160);
    }

    #[test]
    fn released_buffer_is_reused() {
        let pool = FramePool::new(160);
        let frame = pool.acquire();
        let ptr_before = frame.as_ptr();
        pool.release(frame);
        assert_eq!(pool.len(), 1);
        let frame2 = pool.acquire();
        assert_eq!(frame2.as_ptr(), ptr_before);
        assert_eq!(pool.len(), 0);
    }

    #[test]
    fn undersized_buffer_is_discarded() {
        let pool = FramePool::new(160);
        pool.release(Vec::with_capacity(10));
        assert_eq!(pool.len(), 0);
    }
}
