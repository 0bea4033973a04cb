//! # Memory Layout

use kernel_memory_addresses::PAGE_SIZE;

/// First kernel virtual address; user space is `[0, KERNBASE)`.
///
/// Physical memory is direct-mapped at `KERNBASE + pa`.
pub const KERNBASE: u32 = 0x8000_0000;

/// Top of installed physical memory (exclusive).
pub const PHYSTOP: u32 = 0x0E00_0000;

/// End (physical, exclusive) of the range mapped by the boot page directory.
///
/// Before the full kernel page table is installed only `[0, BOOT_MAP_END)` is
/// reachable, so the bootstrap allocator phase is seeded from
/// `[kernel end, BOOT_MAP_END)`.
pub const BOOT_MAP_END: u32 = 4 * 1024 * 1024;

/// Number of frames below [`PHYSTOP`]; an upper bound on what the frame
/// allocator ever has to track.
pub const MAX_FRAMES: usize = (PHYSTOP / PAGE_SIZE) as usize;

/// Translate a physical address to its direct-mapped kernel virtual address.
#[inline]
#[must_use]
pub const fn p2v(pa: u32) -> u32 {
    pa + KERNBASE
}

const _: () = {
    assert!(KERNBASE.is_multiple_of(PAGE_SIZE));
    assert!(PHYSTOP.is_multiple_of(PAGE_SIZE));
    assert!(BOOT_MAP_END.is_multiple_of(PAGE_SIZE));
    assert!(BOOT_MAP_END <= PHYSTOP);
    assert!(PHYSTOP <= u32::MAX - KERNBASE);
};
