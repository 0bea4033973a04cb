//! # Virtual Memory Support
//!
//! 32-bit x86 paging helpers for the kernel's user address spaces.
//!
//! ## What you get
//! - An [`AddressSpace`] view that walks, maps and unmaps through a
//!   page-directory tree.
//! - An owned [`UserSpace`] handle; exactly one owner at a time.
//! - The raw [`PageEntryBits`] entry layout and the 4 KiB [`PageTable`].
//! - The seams every consumer plugs into: [`FrameAlloc`] for physical frames,
//!   [`PhysMapper`] for reaching a frame's bytes, [`RootLoader`] for making a
//!   directory active.
//!
//! ## Virtual address → physical address walk
//!
//! ```text
//!  CR3 → Page Directory ─PDX→ PDE → Page Table ─PTX→ PTE → 4 KiB frame
//! ```
//!
//! User space is `[0, KERNBASE)`. Every user directory shares the kernel's
//! page tables for `[KERNBASE, 4 GiB)` by copying those directory entries.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

mod address_space;
mod error;
mod page_entry_bits;
mod page_table;
mod root_loader;
mod user_space;

pub use crate::address_space::AddressSpace;
pub use crate::error::VmError;
pub use crate::page_entry_bits::PageEntryBits;
pub use crate::page_table::{
    DIRECTORY_SPAN, ENTRIES, PageTable, directory_index, split_indices, table_index,
};
pub use crate::root_loader::{Cr3Loader, RootLoader};
pub use crate::user_space::UserSpace;
use kernel_memory_addresses::{PAGE_SIZE, PhysicalAddress, PhysicalPage};

/// Size of one frame in bytes.
pub const FRAME_BYTES: usize = PAGE_SIZE as usize;

/// Source and sink of physical 4 KiB frames.
///
/// Returned frames are page aligned; their content is unspecified.
pub trait FrameAlloc {
    /// Allocate one frame, or `None` when exhausted.
    fn alloc_4k(&self) -> Option<PhysicalPage>;

    /// Return a frame.
    ///
    /// # Safety
    /// `page` must have come from [`alloc_4k`](Self::alloc_4k) of the same
    /// allocator and must no longer be referenced.
    unsafe fn free_4k(&self, page: PhysicalPage);
}

impl<A: FrameAlloc + ?Sized> FrameAlloc for &A {
    #[inline]
    fn alloc_4k(&self) -> Option<PhysicalPage> {
        (**self).alloc_4k()
    }

    #[inline]
    unsafe fn free_4k(&self, page: PhysicalPage) {
        unsafe { (**self).free_4k(page) }
    }
}

/// Converts physical addresses to usable references in the current
/// virtual address space (a direct map in the kernel, an offset into a
/// buffer in tests).
///
/// # Safety
/// - `pa` must be mapped writable in the current page tables.
/// - The mapping must remain valid for `'a`.
/// - `T` must match the bytes at `pa` and must not alias a live reference.
pub trait PhysMapper {
    /// # Safety
    /// See the trait documentation.
    unsafe fn phys_to_mut<'a, T>(&self, pa: PhysicalAddress) -> &'a mut T;

    /// The frame interpreted as a directory or page table.
    ///
    /// # Safety
    /// `page` must hold paging entries.
    #[inline]
    unsafe fn table_mut<'a>(&self, page: PhysicalPage) -> &'a mut PageTable {
        unsafe { self.phys_to_mut::<PageTable>(page.base()) }
    }

    /// The frame as raw bytes.
    ///
    /// # Safety
    /// No typed reference into `page` may be live.
    #[inline]
    unsafe fn frame_mut<'a>(&self, page: PhysicalPage) -> &'a mut [u8; FRAME_BYTES] {
        unsafe { self.phys_to_mut::<[u8; FRAME_BYTES]>(page.base()) }
    }
}
