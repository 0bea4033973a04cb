use crate::{RawLock, RawSpin};
use core::sync::atomic::{AtomicBool, Ordering};

/// Which half of the gate's lifetime a [`GatedSpin`] is in.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum LockPhase {
    /// Single execution context; acquiring is a no-op.
    Bootstrap,
    /// Multiple execution contexts; acquiring spins.
    Operational,
}

/// A spin lock that is switched off until the system goes multi-context.
///
/// Early boot runs on one CPU with a minimal page table, before the lock's
/// own dependencies (per-CPU state, interrupt bookkeeping) exist. During
/// that window the gate is closed and [`RawLock::acquire`] returns at once.
/// [`enable`](Self::enable) opens the gate; it never closes again.
///
/// Unlocking always clears the held flag. A guard taken while the gate was
/// closed therefore releases cleanly even if the gate opened meanwhile.
pub struct GatedSpin {
    enabled: AtomicBool,
    spin: RawSpin,
}

impl GatedSpin {
    /// Create a lock whose gate is still closed.
    ///
    /// # Safety
    /// Until [`enable`](Self::enable) is called, at most one execution
    /// context may use the lock (and thereby the data it protects).
    #[must_use]
    pub const unsafe fn new_bootstrap() -> Self {
        Self {
            enabled: AtomicBool::new(false),
            spin: RawSpin::new(),
        }
    }

    /// Create a lock that behaves like a plain [`RawSpin`] from the start.
    #[must_use]
    pub const fn new_operational() -> Self {
        Self {
            enabled: AtomicBool::new(true),
            spin: RawSpin::new(),
        }
    }

    /// Open the gate. Idempotent; there is no way back.
    ///
    /// Returns `true` if this call performed the transition.
    pub fn enable(&self) -> bool {
        !self.enabled.swap(true, Ordering::AcqRel)
    }

    #[inline]
    pub fn phase(&self) -> LockPhase {
        if self.enabled.load(Ordering::Acquire) {
            LockPhase::Operational
        } else {
            LockPhase::Bootstrap
        }
    }
}

// SAFETY: exclusion is off only while the gate is closed, which
// `new_bootstrap` restricts to a single context.
unsafe impl RawLock for GatedSpin {
    fn acquire(&self) {
        if self.enabled.load(Ordering::Acquire) {
            self.spin.acquire();
        }
    }

    fn try_acquire(&self) -> bool {
        !self.enabled.load(Ordering::Acquire) || self.spin.try_acquire()
    }

    unsafe fn release(&self) {
        // SAFETY: forwarded from the caller.
        unsafe { self.spin.release() }
    }
}
