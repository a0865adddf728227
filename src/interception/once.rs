// src/interception/once.rs
//! Lock-free one-time initialization
//!
//! Interception shims can run on any client thread, including before the
//! controller is fully built. Waiters spin instead of parking so nothing here
//! depends on an OS synchronization primitive.

use std::cell::UnsafeCell;
use std::hint::spin_loop;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicU8, Ordering};

const UNINIT: u8 = 0;
const INITIALIZING: u8 = 1;
const READY: u8 = 2;

/// Cell written once, by whichever thread gets there first
pub struct SpinOnce<T> {
    state: AtomicU8,
    value: UnsafeCell<MaybeUninit<T>>,
}

// SAFETY: the value is written once before READY is published with Release
// and only read after observing READY with Acquire.
unsafe impl<T: Send + Sync> Sync for SpinOnce<T> {}
unsafe impl<T: Send> Send for SpinOnce<T> {}

impl<T> SpinOnce<T> {
    pub const fn new() -> Self {
        Self {
            state: AtomicU8::new(UNINIT),
            value: UnsafeCell::new(MaybeUninit::uninit()),
        }
    }

    /// The value, if initialization completed
    pub fn get(&self) -> Option<&T> {
        if self.state.load(Ordering::Acquire) == READY {
            // SAFETY: READY is only stored after the value is written
            Some(unsafe { (*self.value.get()).assume_init_ref() })
        } else {
            None
        }
    }

    /// Spin while another thread initializes, then return the value if any
    pub fn wait(&self) -> Option<&T> {
        loop {
            match self.state.load(Ordering::Acquire) {
                READY => return self.get(),
                INITIALIZING => spin_loop(),
                _ => return None,
            }
        }
    }

    pub fn get_or_init(&self, init: impl FnOnce() -> T) -> &T {
        match self.get_or_try_init(|| Ok::<T, std::convert::Infallible>(init())) {
            Ok(value) => value,
            Err(never) => match never {},
        }
    }

    /// Initialize with `init` unless another thread already did
    ///
    /// A failed `init` returns the cell to its uninitialized state so a later
    /// call may try again.
    pub fn get_or_try_init<E>(&self, init: impl FnOnce() -> Result<T, E>) -> Result<&T, E> {
        loop {
            match self
                .state
                .compare_exchange(UNINIT, INITIALIZING, Ordering::Acquire, Ordering::Acquire)
            {
                Ok(_) => {
                    return match init() {
                        Ok(value) => {
                            // SAFETY: this thread holds the INITIALIZING state exclusively
                            let value = unsafe { (*self.value.get()).write(value) };
                            self.state.store(READY, Ordering::Release);
                            Ok(&*value)
                        }
                        Err(err) => {
                            self.state.store(UNINIT, Ordering::Release);
                            Err(err)
                        }
                    };
                }
                Err(READY) => {
                    if let Some(value) = self.get() {
                        return Ok(value);
                    }
                }
                Err(_) => spin_loop(),
            }
        }
    }
}

impl<T> Default for SpinOnce<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for SpinOnce<T> {
    fn drop(&mut self) {
        if *self.state.get_mut() == READY {
            // SAFETY: READY means the value was written and never dropped
            unsafe { self.value.get_mut().assume_init_drop() };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    #[test]
    fn test_single_construction_under_contention() {
        let cell = Arc::new(SpinOnce::new());
        let constructed = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cell = Arc::clone(&cell);
                let constructed = Arc::clone(&constructed);
                std::thread::spawn(move || {
                    *cell.get_or_init(|| {
                        constructed.fetch_add(1, Ordering::SeqCst);
                        std::thread::sleep(std::time::Duration::from_millis(20));
                        1234u32
                    })
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), 1234);
        }
        assert_eq!(constructed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failed_init_can_retry() {
        let cell: SpinOnce<String> = SpinOnce::new();
        assert!(cell.wait().is_none());
        assert_eq!(cell.get_or_try_init(|| Err("boom")), Err("boom"));
        assert!(cell.get().is_none());

        let value = cell.get_or_try_init(|| Ok::<_, &str>("ready".to_string())).unwrap();
        assert_eq!(value, "ready");
        assert_eq!(cell.wait().map(String::as_str), Some("ready"));
    }
}
