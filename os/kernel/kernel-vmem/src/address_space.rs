//! # Address Space (32-bit, two-level)
//!
//! A borrowed view of one page-directory tree. The view does not own the
//! directory; [`UserSpace`](crate::UserSpace) does. Walking, mapping and
//! unmapping happen through the [`PhysMapper`], so the same code runs on the
//! kernel's direct map and on simulated RAM in tests.
//!
//! Mutating an active tree requires TLB maintenance by the caller.

use crate::page_table::{ENTRIES, PageTable, split_indices};
use crate::{FrameAlloc, PageEntryBits, PhysMapper, VmError};
use core::ops::Range;
use kernel_memory_addresses::{PhysicalAddress, PhysicalPage, VirtualAddress, VirtualPage};

/// Handle to a single, concrete address space.
pub struct AddressSpace<'m, M: PhysMapper> {
    root: PhysicalPage,
    mapper: &'m M,
}

impl<'m, M: PhysMapper> AddressSpace<'m, M> {
    #[inline]
    pub const fn from_root(mapper: &'m M, root: PhysicalPage) -> Self {
        Self { root, mapper }
    }

    #[inline]
    pub fn directory(&self) -> &'m mut PageTable {
        // SAFETY: the root is a directory frame by construction.
        unsafe { self.mapper.table_mut(self.root) }
    }

    /// The leaf entry for `va`, if its page table exists.
    pub fn pte_mut(&self, va: VirtualAddress) -> Option<&'m mut PageEntryBits> {
        let (pdx, ptx) = split_indices(va);
        let pde = self.directory().entry(pdx);
        if !pde.present() {
            return None;
        }
        // SAFETY: a present PDE points to a page table frame.
        let pt = unsafe { self.mapper.table_mut(pde.page()) };
        Some(pt.entry_mut(ptx))
    }

    /// The leaf entry for `va`, allocating and linking a zeroed page table if needed.
    ///
    /// # Errors
    /// [`VmError::OutOfMemory`] if the page table cannot be allocated.
    pub fn ensure_pte<A: FrameAlloc + ?Sized>(
        &self,
        alloc: &A,
        va: VirtualAddress,
    ) -> Result<&'m mut PageEntryBits, VmError> {
        let (pdx, ptx) = split_indices(va);
        let dir = self.directory();
        let mut pde = dir.entry(pdx);
        if !pde.present() {
            let frame = alloc.alloc_4k().ok_or(VmError::OutOfMemory)?;
            // SAFETY: freshly allocated and exclusively ours.
            unsafe { self.mapper.table_mut(frame) }.zero();
            pde = PageEntryBits::table(frame);
            dir.set_entry(pdx, pde);
            log::trace!("page table {frame} linked at PDX {pdx}");
        }
        // SAFETY: present PDE.
        let pt = unsafe { self.mapper.table_mut(pde.page()) };
        Ok(pt.entry_mut(ptx))
    }

    /// Install `entry` as the leaf for `page`.
    ///
    /// # Errors
    /// [`VmError::OutOfMemory`] if an intermediate table cannot be allocated.
    ///
    /// # Panics
    /// If `page` is already mapped.
    pub fn map_one<A: FrameAlloc + ?Sized>(
        &self,
        alloc: &A,
        page: VirtualPage,
        entry: PageEntryBits,
    ) -> Result<(), VmError> {
        let pte = self.ensure_pte(alloc, page.base())?;
        assert!(!pte.present(), "map_one: remap of {page}");
        *pte = entry;
        Ok(())
    }

    /// Clear the leaf for `page` and return the frame it mapped.
    pub fn unmap_one(&self, page: VirtualPage) -> Option<PhysicalPage> {
        let pte = self.pte_mut(page.base())?;
        if !pte.present() {
            return None;
        }
        let frame = pte.page();
        *pte = PageEntryBits::new();
        Some(frame)
    }

    /// Translate `va` through present entries.
    pub fn query(&self, va: VirtualAddress) -> Option<PhysicalAddress> {
        let pte = self.pte_mut(va)?;
        pte.present()
            .then(|| PhysicalAddress::new(pte.page().base().as_u32() | va.offset()))
    }

    /// Translate `va` as user mode would see it.
    ///
    /// # Errors
    /// [`VmError::Unmapped`] without a present leaf,
    /// [`VmError::NotUserAccessible`] for a supervisor-only leaf.
    pub fn translate_user(&self, va: VirtualAddress) -> Result<PhysicalAddress, VmError> {
        let pte = self.pte_mut(va).ok_or(VmError::Unmapped(va))?;
        if !pte.present() {
            return Err(VmError::Unmapped(va));
        }
        if !pte.user_access() {
            return Err(VmError::NotUserAccessible(va));
        }
        Ok(PhysicalAddress::new(pte.page().base().as_u32() | va.offset()))
    }

    /// Copy the directory entries in `slots` from `other`.
    ///
    /// The page tables behind them become shared, not copied.
    pub fn share_directory_entries(&self, other: &Self, slots: Range<usize>) {
        debug_assert!(slots.end <= ENTRIES);
        let src = other.directory();
        let dst = self.directory();
        for i in slots {
            dst.set_entry(i, src.entry(i));
        }
    }

    /// Unlink the page table at directory slot `pdx`, returning its frame.
    pub fn take_page_table(&self, pdx: usize) -> Option<PhysicalPage> {
        let e = self.directory().entry_mut(pdx);
        if !e.present() {
            return None;
        }
        let frame = e.page();
        *e = PageEntryBits::new();
        Some(frame)
    }
}
