//! Append-only memory pool for node payloads.
//!
//! The pool hands out 8-byte-aligned storage that is never freed, moved, or
//! shrunk until the pool itself is dropped. Node payloads are copied in once
//! and stay immutable afterwards, which is what makes lock-free reads of
//! published nodes sound.
//!
//! Growth happens in fixed-size chunks behind a mutex. Allocation only
//! occurs on a trie miss, off the annotation hot path, so a plain mutex is
//! sufficient; readers never touch it.

use crate::error::{Result, VernierError};
use parking_lot::Mutex;
use std::ptr::NonNull;

/// Alignment of every allocation, in bytes.
pub const POOL_ALIGNMENT: usize = 8;

/// Default chunk size: 64 KiB.
const DEFAULT_CHUNK_BYTES: usize = 64 * 1024;

/// A handle to bytes stored in a [`MemoryPool`].
///
/// The handle stays valid for as long as the owning pool is alive; the
/// runtime keeps pool and node store in the same owner so node payloads can
/// never outlive their storage.
#[derive(Debug, Clone, Copy)]
pub struct PoolSlice {
    ptr: NonNull<u8>,
    len: u32,
}

impl PoolSlice {
    /// The empty payload.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            ptr: NonNull::dangling(),
            len: 0,
        }
    }

    /// Payload length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len as usize
    }

    /// Whether the payload is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// View the payload bytes.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        // SAFETY: the pointer was produced by `MemoryPool::allocate`, which
        // copies the payload into a pinned chunk (`Box<[u64]>`) that is
        // neither freed nor relocated while the pool lives, and the bytes
        // are never written again after the handle is returned. Zero-length
        // handles use a dangling pointer, which `from_raw_parts` permits
        // for empty slices.
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len as usize) }
    }
}

// SAFETY: a PoolSlice is a read-only view of bytes that are immutable after
// publication; sharing or moving the handle across threads cannot race.
unsafe impl Send for PoolSlice {}
unsafe impl Sync for PoolSlice {}

struct PoolChunks {
    /// Chunks of 8-byte words; `Box<[u64]>` pins each block so earlier
    /// allocations survive vector growth.
    chunks: Vec<Box<[u64]>>,
    /// Words consumed in the newest chunk.
    used_words: usize,
    /// Words per regular chunk.
    chunk_words: usize,
    /// Total payload bytes handed out.
    allocated_bytes: usize,
}

impl PoolChunks {
    fn reserve(&mut self, words: usize) -> Result<*mut u64> {
        let need_new = match self.chunks.last() {
            Some(chunk) => self.used_words + words > chunk.len(),
            None => true,
        };

        if need_new {
            let size = self.chunk_words.max(words);
            let mut chunk: Vec<u64> = Vec::new();
            chunk
                .try_reserve_exact(size)
                .map_err(|_| VernierError::OutOfMemory {
                    requested: size * POOL_ALIGNMENT,
                })?;
            chunk.resize(size, 0);
            self.chunks.push(chunk.into_boxed_slice());
            self.used_words = 0;
        }

        let chunk = self.chunks.last_mut().expect("chunk just ensured");
        let ptr = unsafe { chunk.as_mut_ptr().add(self.used_words) };
        self.used_words += words;
        Ok(ptr)
    }
}

/// Append-only arena for node payload storage.
pub struct MemoryPool {
    inner: Mutex<PoolChunks>,
}

impl MemoryPool {
    /// Create a pool with the default chunk size.
    #[must_use]
    pub fn new() -> Self {
        Self::with_chunk_size(DEFAULT_CHUNK_BYTES)
    }

    /// Create a pool growing in chunks of `chunk_bytes` (rounded up to the
    /// pool alignment).
    #[must_use]
    pub fn with_chunk_size(chunk_bytes: usize) -> Self {
        Self {
            inner: Mutex::new(PoolChunks {
                chunks: Vec::new(),
                used_words: 0,
                chunk_words: chunk_bytes.div_ceil(POOL_ALIGNMENT).max(1),
                allocated_bytes: 0,
            }),
        }
    }

    /// Copy `data` into the pool and return a stable handle to it.
    ///
    /// # Errors
    ///
    /// Returns [`VernierError::OutOfMemory`] when the backing store cannot
    /// grow. This is fatal by contract; callers propagate it.
    pub fn allocate(&self, data: &[u8]) -> Result<PoolSlice> {
        if data.is_empty() {
            return Ok(PoolSlice::empty());
        }

        let words = data.len().div_ceil(POOL_ALIGNMENT);

        let mut inner = self.inner.lock();
        let ptr = inner.reserve(words)?;
        inner.allocated_bytes += data.len();

        // SAFETY: `reserve` returned `words * 8 >= data.len()` zeroed bytes
        // exclusive to this call; the mutex serializes concurrent growth.
        unsafe {
            std::ptr::copy_nonoverlapping(data.as_ptr(), ptr.cast::<u8>(), data.len());
        }

        Ok(PoolSlice {
            ptr: NonNull::new(ptr.cast::<u8>()).expect("chunk pointers are non-null"),
            len: data.len() as u32,
        })
    }

    /// Total payload bytes allocated so far.
    #[must_use]
    pub fn allocated_bytes(&self) -> usize {
        self.inner.lock().allocated_bytes
    }
}

impl Default for MemoryPool {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("MemoryPool")
            .field("chunks", &inner.chunks.len())
            .field("allocated_bytes", &inner.allocated_bytes)
            .finish()
    }
}
