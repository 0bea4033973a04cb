use crate::RawLock;
use core::hint::spin_loop;
use core::sync::atomic::{AtomicBool, Ordering};

/// Spin lock that waits on a relaxed load between attempts.
#[derive(Default)]
pub struct RawSpin {
    locked: AtomicBool,
}

impl RawSpin {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            locked: AtomicBool::new(false),
        }
    }

    #[inline]
    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Relaxed)
    }
}

unsafe impl RawLock for RawSpin {
    #[inline]
    fn acquire(&self) {
        loop {
            if self.try_acquire() {
                return;
            }
            while self.is_locked() {
                spin_loop();
            }
        }
    }

    #[inline]
    fn try_acquire(&self) -> bool {
        self.locked
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    #[inline]
    unsafe fn release(&self) {
        self.locked.store(false, Ordering::Release);
    }
}
