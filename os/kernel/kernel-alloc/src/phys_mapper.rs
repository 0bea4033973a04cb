//! # Physical memory mappers
//!
//! [`PhysMapper`] implementations for the two ways this kernel reaches
//! physical memory:
//!
//! - [`HhdmPhysMapper`]: the kernel maps all of physical memory at
//!   `KERNBASE + pa`, so reaching a frame is an addition.
//! - [`OffsetPhysMapper`]: any other constant displacement, e.g. identity
//!   mapping (offset zero) or a host buffer standing in for RAM.

use kernel_info::memory::{PHYSTOP, p2v};
use kernel_memory_addresses::PhysicalAddress;
use kernel_vmem::PhysMapper;

/// [`PhysMapper`] for the kernel's direct map at [`KERNBASE`](kernel_info::memory::KERNBASE).
///
/// # Safety
/// The direct map must be installed and cover the referenced frame, which
/// holds for every address below [`PHYSTOP`] once the kernel page tables are
/// live (and below `BOOT_MAP_END` before that).
#[derive(Debug, Default, Copy, Clone)]
pub struct HhdmPhysMapper;

impl PhysMapper for HhdmPhysMapper {
    unsafe fn phys_to_mut<'a, T>(&self, pa: PhysicalAddress) -> &'a mut T {
        debug_assert!(pa.as_u32() < PHYSTOP);
        let va = p2v(pa.as_u32()) as usize;
        // SAFETY: Caller must ensure the physical address is valid and mapped.
        unsafe { &mut *core::ptr::with_exposed_provenance_mut::<T>(va) }
    }
}

/// [`PhysMapper`] that displaces every physical address by a fixed offset.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct OffsetPhysMapper {
    offset: usize,
}

impl OffsetPhysMapper {
    /// A mapper where physical address `pa` lives at virtual `pa + offset`
    /// (wrapping).
    #[must_use]
    pub const fn new(offset: usize) -> Self {
        Self { offset }
    }
}

impl PhysMapper for OffsetPhysMapper {
    unsafe fn phys_to_mut<'a, T>(&self, pa: PhysicalAddress) -> &'a mut T {
        let va = pa.as_usize().wrapping_add(self.offset);
        // SAFETY: Caller must ensure the displaced address is valid and mapped.
        unsafe { &mut *core::ptr::with_exposed_provenance_mut::<T>(va) }
    }
}
