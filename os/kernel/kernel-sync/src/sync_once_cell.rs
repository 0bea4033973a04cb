use core::cell::UnsafeCell;
use core::mem::MaybeUninit;
use core::sync::atomic::{AtomicU8, Ordering};

const EMPTY: u8 = 0;
const WRITING: u8 = 1;
const PUBLISHED: u8 = 2;

/// A slot written once and read from any context afterwards.
///
/// For globals whose value is only known at run time (e.g. the end of the
/// kernel image) and that must never be rebuilt. Readers do not wait for a
/// writer in progress; they see `None` until publication.
pub struct SyncOnceCell<T> {
    state: AtomicU8,
    slot: UnsafeCell<MaybeUninit<T>>,
}

// SAFETY: the slot is written by the single context that won `EMPTY -> WRITING`
// and only read after `PUBLISHED`.
unsafe impl<T: Send + Sync> Sync for SyncOnceCell<T> {}

impl<T> Default for SyncOnceCell<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> SyncOnceCell<T> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: AtomicU8::new(EMPTY),
            slot: UnsafeCell::new(MaybeUninit::uninit()),
        }
    }

    /// A cell that is already set to `value`.
    #[must_use]
    pub const fn with_value(value: T) -> Self {
        Self {
            state: AtomicU8::new(PUBLISHED),
            slot: UnsafeCell::new(MaybeUninit::new(value)),
        }
    }

    /// The published value, if any.
    #[inline]
    pub fn get(&self) -> Option<&T> {
        if self.state.load(Ordering::Acquire) != PUBLISHED {
            return None;
        }
        // SAFETY: published values are never written again.
        Some(unsafe { (*self.slot.get()).assume_init_ref() })
    }

    /// Publish `value` unless another value was set first.
    ///
    /// # Errors
    /// `Err(value)` if the cell is already set or being set.
    pub fn set(&self, value: T) -> Result<&T, T> {
        if self
            .state
            .compare_exchange(EMPTY, WRITING, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            return Err(value);
        }
        // SAFETY: winning the exchange makes us the only writer.
        let stored = unsafe { (*self.slot.get()).write(value) };
        self.state.store(PUBLISHED, Ordering::Release);
        Ok(stored)
    }
}

impl<T> Drop for SyncOnceCell<T> {
    fn drop(&mut self) {
        if *self.state.get_mut() == PUBLISHED {
            // SAFETY: published and not yet dropped.
            unsafe { self.slot.get_mut().assume_init_drop() }
        }
    }
}
