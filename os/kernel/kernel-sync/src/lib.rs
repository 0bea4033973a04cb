//! # Kernel synchronization primitives
//!
//! A [`Mutex`] pairs a value with a raw lock implementing [`RawLock`]:
//!
//! * [`RawSpin`]: test-and-test-and-set spin lock.
//! * [`GatedSpin`]: a [`RawSpin`] behind a one-way gate. While the gate is
//!   closed (single-threaded early boot) acquiring is a no-op; after
//!   [`GatedSpin::enable`] every acquire spins.
//!
//! [`SyncOnceCell`] holds a global that is published exactly once.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

mod gated_spin;
mod mutex;
mod raw_spin;
mod sync_once_cell;

pub use gated_spin::{GatedSpin, LockPhase};
pub use mutex::{Mutex, MutexGuard};
pub use raw_spin::RawSpin;
pub use sync_once_cell::SyncOnceCell;

pub type SpinMutex<T> = Mutex<T, RawSpin>;
pub type GatedMutex<T> = Mutex<T, GatedSpin>;

impl<T> SpinMutex<T> {
    pub const fn new(value: T) -> Self {
        Self::from_raw(RawSpin::new(), value)
    }
}

/// A lock without a payload.
///
/// # Safety
/// While `acquire` (or a successful `try_acquire`) is outstanding, no other
/// context may also have acquired, unless the implementation documents a
/// phase in which exclusion is deliberately off.
pub unsafe trait RawLock {
    fn acquire(&self);

    /// Acquire without waiting; `false` if the lock is taken.
    fn try_acquire(&self) -> bool;

    /// # Safety
    /// Only the current holder may release.
    unsafe fn release(&self);
}
