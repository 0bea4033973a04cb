//! Process-wide frame allocator and its two-phase boot seeding.
//!
//! ```text
//!  init_bootstrap(kernel_end .. BOOT_MAP_END)    gate closed, one CPU
//!        │  kernel page tables installed
//!        ▼
//!  init_operational(BOOT_MAP_END .. PHYSTOP)     gate opened for good
//! ```

use crate::frame_alloc::{FrameAllocator, PhysicalLayout};
use crate::phys_mapper::HhdmPhysMapper;
use kernel_info::memory::MAX_FRAMES;
use kernel_memory_addresses::PhysicalAddress;

/// The kernel's frame allocator type.
pub type KernelFrames = FrameAllocator<HhdmPhysMapper, MAX_FRAMES>;

// SAFETY: `init_bootstrap` and `init_operational` require a single context
// until the gate is opened.
static FRAMES: KernelFrames = unsafe { KernelFrames::unconfigured(HhdmPhysMapper) };

/// Give the global allocator its layout and seed it with `[start, end)`.
///
/// # Safety
/// - Must run on the boot CPU before any other execution context exists.
/// - `[start, end)` must be unused and covered by the boot page tables.
///
/// # Panics
/// If called more than once, or if `layout` exceeds [`MAX_FRAMES`].
pub unsafe fn init_bootstrap(
    layout: PhysicalLayout,
    start: PhysicalAddress,
    end: PhysicalAddress,
) -> &'static KernelFrames {
    FRAMES.configure(layout);
    // SAFETY: forwarded to the caller.
    unsafe { FRAMES.register_range(start, end) };
    &FRAMES
}

/// Seed `[start, end)` and switch the allocator to locked operation.
///
/// # Safety
/// - Must still run before a second execution context touches the allocator.
/// - `[start, end)` must be unused and covered by the kernel's direct map.
pub unsafe fn init_operational(start: PhysicalAddress, end: PhysicalAddress) {
    let frames = frames();
    // SAFETY: forwarded to the caller.
    unsafe { frames.register_range(start, end) };
    frames.enter_operational();
}

/// The global allocator.
///
/// # Panics
/// If [`init_bootstrap`] has not run.
pub fn frames() -> &'static KernelFrames {
    assert!(
        FRAMES.is_configured(),
        "frame allocator used before init_bootstrap"
    );
    &FRAMES
}
