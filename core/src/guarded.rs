//! Mutex-guarded single value.
//!
//! [`GuardedValue`] is the foundation for every piece of device state the
//! engine shares between threads (queues, allocator, device handles). Access
//! goes through a closure so the lock can never be held past the call.

use std::fmt;

use parking_lot::Mutex;

/// A single value whose access is serialized by a mutex.
///
/// Synchronized access is done through [`access`](Self::access) and
/// [`set`](Self::set). For hot single-threaded paths where the program
/// structure already guarantees exclusivity, [`get_unsafe`](Self::get_unsafe)
/// and [`set_unsafe`](Self::set_unsafe) skip the lock entirely.
///
/// # Example
///
/// ```
/// use graphite_core::GuardedValue;
///
/// let counter = GuardedValue::new(0u32);
/// let value = counter.access(|v| {
///     *v += 1;
///     *v
/// });
/// assert_eq!(value, 1);
/// ```
pub struct GuardedValue<T> {
    inner: Mutex<T>,
}

impl<T> GuardedValue<T> {
    /// Wrap `value`.
    pub fn new(value: T) -> Self {
        Self {
            inner: Mutex::new(value),
        }
    }

    /// Lock the value and run `function` with a mutable reference to it.
    ///
    /// The lock is released when `function` returns or unwinds.
    pub fn access<R>(&self, function: impl FnOnce(&mut T) -> R) -> R {
        let mut guard = self.inner.lock();
        function(&mut guard)
    }

    /// Assign a new value under the lock.
    pub fn set(&self, value: T) {
        *self.inner.lock() = value;
    }

    /// Assign a new value under the lock, returning the previous one.
    pub fn replace(&self, value: T) -> T {
        std::mem::replace(&mut *self.inner.lock(), value)
    }

    /// Mutable access through an exclusive borrow. No locking is needed.
    pub fn get_mut(&mut self) -> &mut T {
        self.inner.get_mut()
    }

    /// Consume the wrapper and return the value.
    pub fn into_inner(self) -> T {
        self.inner.into_inner()
    }

    /// Reference to the value without taking the lock.
    ///
    /// # Safety
    ///
    /// The caller must guarantee that no other thread accesses the value
    /// (synchronized or not) for as long as the returned reference lives.
    #[allow(clippy::mut_from_ref)]
    pub unsafe fn get_unsafe(&self) -> &mut T {
        // SAFETY: exclusivity is guaranteed by the caller.
        unsafe { &mut *self.inner.data_ptr() }
    }

    /// Assign a new value without taking the lock.
    ///
    /// # Safety
    ///
    /// Same contract as [`get_unsafe`](Self::get_unsafe).
    pub unsafe fn set_unsafe(&self, value: T) {
        // SAFETY: exclusivity is guaranteed by the caller.
        unsafe { *self.inner.data_ptr() = value };
    }
}

impl<T: Clone> GuardedValue<T> {
    /// Copy the value out under the lock.
    pub fn get(&self) -> T {
        self.inner.lock().clone()
    }
}

impl<T: Default> Default for GuardedValue<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T> From<T> for GuardedValue<T> {
    fn from(value: T) -> Self {
        Self::new(value)
    }
}

impl<T: fmt::Debug> fmt::Debug for GuardedValue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner.try_lock() {
            Some(guard) => f
                .debug_struct("GuardedValue")
                .field("value", &*guard)
                .finish(),
            None => f
                .debug_struct("GuardedValue")
                .field("value", &"<locked>")
                .finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::panic::{self, AssertUnwindSafe};
    use std::sync::Arc;
    use std::thread;

    static_assertions::assert_impl_all!(GuardedValue<u64>: Send, Sync);
    static_assertions::assert_not_impl_any!(GuardedValue<u64>: Clone);

    #[test]
    fn access_returns_closure_result() {
        let guarded = GuardedValue::new(vec![1, 2, 3]);
        let len = guarded.access(|v| {
            v.push(4);
            v.len()
        });
        assert_eq!(len, 4);
        assert_eq!(guarded.get(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn set_and_replace() {
        let guarded = GuardedValue::new(1);
        guarded.set(5);
        assert_eq!(guarded.get(), 5);
        assert_eq!(guarded.replace(7), 5);
        assert_eq!(guarded.into_inner(), 7);
    }

    #[test]
    fn lock_released_after_panic() {
        let guarded = GuardedValue::new(0);
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            guarded.access(|v| {
                *v = 3;
                panic!("boom");
            })
        }));
        assert!(result.is_err());
        // parking_lot does not poison, so the value is still reachable.
        assert_eq!(guarded.access(|v| *v), 3);
    }

    #[test]
    fn unsynchronized_access() {
        let mut guarded = GuardedValue::new(10);
        // SAFETY: single-threaded test, no concurrent access.
        unsafe {
            *guarded.get_unsafe() += 1;
            guarded.set_unsafe(*guarded.get_unsafe() * 2);
        }
        assert_eq!(*guarded.get_mut(), 22);
    }

    #[test]
    fn concurrent_access_has_no_lost_updates() {
        const THREADS: usize = 8;
        const ITERATIONS: usize = 1_000;

        let counter = Arc::new(GuardedValue::new(0usize));
        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let counter = Arc::clone(&counter);
                thread::spawn(move || {
                    (0..ITERATIONS)
                        .map(|_| {
                            counter.access(|v| {
                                *v += 1;
                                *v
                            })
                        })
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut seen = Vec::with_capacity(THREADS * ITERATIONS);
        for handle in handles {
            let values = handle.join().unwrap();
            assert!(values.windows(2).all(|w| w[0] < w[1]));
            seen.extend(values);
        }

        seen.sort_unstable();
        let expected: Vec<_> = (1..=THREADS * ITERATIONS).collect();
        assert_eq!(seen, expected);
        assert_eq!(counter.get(), THREADS * ITERATIONS);
    }

    #[test]
    fn debug_shows_locked_state() {
        let guarded = GuardedValue::new(1);
        assert!(format!("{guarded:?}").contains('1'));
        guarded.access(|_| {
            assert!(format!("{guarded:?}").contains("<locked>"));
        });
    }
}
