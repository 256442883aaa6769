//! Signal-safe reader/writer lock.
//!
//! Sampling services interrupt instrumented threads from asynchronous signal
//! handlers and read runtime state from there, so the locks guarding that
//! state must never allocate or park. This lock is a pure spinlock over one
//! atomic word: readers count in the low bits, a writer bit, and a
//! writer-pending bit that makes the lock writer-preferring (new readers
//! spin once a writer waits, so a steady reader stream cannot starve
//! producers).
//!
//! Signal-handler paths must use [`SigsafeRwLock::try_read`]: if the handler
//! interrupted the very thread that holds the write lock, blocking would
//! spin forever. `try_read` fails immediately instead and the handler drops
//! its sample.

use std::cell::UnsafeCell;
use std::hint::spin_loop;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU32, Ordering};

const WRITER: u32 = 1 << 31;
const PENDING: u32 = 1 << 30;
const READER_MASK: u32 = PENDING - 1;

/// A reader/writer spinlock that is safe to acquire from signal handlers.
pub struct SigsafeRwLock<T> {
    state: AtomicU32,
    value: UnsafeCell<T>,
}

// SAFETY: the lock provides the usual RwLock synchronization protocol; the
// atomic state word guarantees exclusive `&mut T` for the writer and shared
// `&T` for readers.
unsafe impl<T: Send> Send for SigsafeRwLock<T> {}
unsafe impl<T: Send + Sync> Sync for SigsafeRwLock<T> {}

impl<T> SigsafeRwLock<T> {
    /// Create a new unlocked lock around `value`.
    pub const fn new(value: T) -> Self {
        Self {
            state: AtomicU32::new(0),
            value: UnsafeCell::new(value),
        }
    }

    /// Acquire shared read access, spinning while a writer holds or waits.
    pub fn read(&self) -> SigsafeReadGuard<'_, T> {
        loop {
            let s = self.state.load(Ordering::Relaxed);
            if s & (WRITER | PENDING) == 0 {
                debug_assert!(s & READER_MASK < READER_MASK);
                if self
                    .state
                    .compare_exchange_weak(s, s + 1, Ordering::Acquire, Ordering::Relaxed)
                    .is_ok()
                {
                    return SigsafeReadGuard { lock: self };
                }
            }
            spin_loop();
        }
    }

    /// Try to acquire shared read access without waiting.
    ///
    /// Fails while a writer holds the lock or is waiting for it. This is
    /// the only acquisition allowed from signal handlers.
    pub fn try_read(&self) -> Option<SigsafeReadGuard<'_, T>> {
        let s = self.state.load(Ordering::Relaxed);
        if s & (WRITER | PENDING) != 0 {
            return None;
        }
        self.state
            .compare_exchange(s, s + 1, Ordering::Acquire, Ordering::Relaxed)
            .ok()
            .map(|_| SigsafeReadGuard { lock: self })
    }

    /// Acquire exclusive write access, spinning until all readers drain.
    pub fn write(&self) -> SigsafeWriteGuard<'_, T> {
        self.state.fetch_or(PENDING, Ordering::Relaxed);
        loop {
            // Expect exactly "pending, no readers, no writer"; taking the
            // lock consumes the pending bit.
            if self
                .state
                .compare_exchange_weak(PENDING, WRITER, Ordering::Acquire, Ordering::Relaxed)
                .is_ok()
            {
                return SigsafeWriteGuard { lock: self };
            }
            // A concurrent writer may have consumed the bit; re-assert it so
            // readers keep yielding to us.
            self.state.fetch_or(PENDING, Ordering::Relaxed);
            spin_loop();
        }
    }

    /// Get mutable access without locking; requires exclusive ownership.
    pub fn get_mut(&mut self) -> &mut T {
        self.value.get_mut()
    }
}

impl<T: Default> Default for SigsafeRwLock<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for SigsafeRwLock<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.try_read() {
            Some(guard) => f.debug_tuple("SigsafeRwLock").field(&*guard).finish(),
            None => f.write_str("SigsafeRwLock(<write-locked>)"),
        }
    }
}

/// RAII guard for shared read access.
pub struct SigsafeReadGuard<'a, T> {
    lock: &'a SigsafeRwLock<T>,
}

impl<T> Deref for SigsafeReadGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: a positive reader count excludes writers.
        unsafe { &*self.lock.value.get() }
    }
}

impl<T> Drop for SigsafeReadGuard<'_, T> {
    fn drop(&mut self) {
        self.lock.state.fetch_sub(1, Ordering::Release);
    }
}

/// RAII guard for exclusive write access.
pub struct SigsafeWriteGuard<'a, T> {
    lock: &'a SigsafeRwLock<T>,
}

impl<T> Deref for SigsafeWriteGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: the writer bit excludes all other access.
        unsafe { &*self.lock.value.get() }
    }
}

impl<T> DerefMut for SigsafeWriteGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: the writer bit excludes all other access.
        unsafe { &mut *self.lock.value.get() }
    }
}

impl<T> Drop for SigsafeWriteGuard<'_, T> {
    fn drop(&mut self) {
        // Clearing only the writer bit preserves another writer's pending
        // flag, so queued writers go before new readers.
        self.lock.state.fetch_and(!WRITER, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn readers_share() {
        let lock = SigsafeRwLock::new(5u32);
        let a = lock.read();
        let b = lock.read();
        assert_eq!(*a + *b, 10);
    }

    #[test]
    fn write_is_exclusive() {
        let lock = SigsafeRwLock::new(0u32);
        {
            let mut guard = lock.write();
            *guard = 9;
            assert!(lock.try_read().is_none());
        }
        assert_eq!(*lock.read(), 9);
    }

    #[test]
    fn try_read_refused_while_writer_waits() {
        let lock = SigsafeRwLock::new(());
        lock.state.fetch_or(PENDING, Ordering::Relaxed);
        assert!(lock.try_read().is_none());
        lock.state.fetch_and(!PENDING, Ordering::Relaxed);
        assert!(lock.try_read().is_some());
    }

    #[test]
    fn concurrent_increments_do_not_tear() {
        let lock = Arc::new(SigsafeRwLock::new(0u64));
        let threads = 8;
        let per_thread = 1000;

        let handles: Vec<_> = (0..threads)
            .map(|_| {
                let lock = Arc::clone(&lock);
                thread::spawn(move || {
                    for _ in 0..per_thread {
                        let mut guard = lock.write();
                        *guard += 1;
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(*lock.read(), threads * per_thread);
    }

    #[test]
    fn readers_do_not_block_readers_under_load() {
        let lock = Arc::new(SigsafeRwLock::new(1u32));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let lock = Arc::clone(&lock);
                thread::spawn(move || {
                    let mut sum = 0u64;
                    for _ in 0..1000 {
                        sum += u64::from(*lock.read());
                    }
                    sum
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), 1000);
        }
    }
}
