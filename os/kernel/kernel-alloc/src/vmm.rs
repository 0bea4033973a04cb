//! User address-space manager.
//!
//! [`UserVmm`] builds, grows, fills and tears down [`UserSpace`]s. It draws
//! page tables and user frames from a [`FrameAlloc`] (the kernel's
//! [`FrameAllocator`](crate::frame_alloc::FrameAllocator)) and reaches their
//! bytes through a [`PhysMapper`].
//!
//! User space is `[0, KERNBASE)`. The directory slots above it are copied
//! from the kernel's own directory when a space is created and are never
//! freed with the space.
//!
//! # Example
//! ```ignore
//! use kernel_alloc::{boot, phys_mapper::HhdmPhysMapper, vmm::UserVmm};
//! use kernel_vmem::Cr3Loader;
//! let vmm = UserVmm::new(HhdmPhysMapper, boot::frames(), kernel_root, Cr3Loader);
//! let space = vmm.new_space()?;
//! let size = vmm.grow(&space, 0, 0x3000)?;
//! vmm.destroy(space);
//! ```

use kernel_info::memory::KERNBASE;
use kernel_memory_addresses::{
    PAGE_SIZE, PhysicalPage, VirtualAddress, VirtualPage, page_round_down, page_round_up,
};
use kernel_vmem::{
    AddressSpace, Cr3Loader, DIRECTORY_SPAN, ENTRIES, FrameAlloc, PageEntryBits,
    PhysMapper, RootLoader, UserSpace, VmError, directory_index,
};

/// Directory slot of the first kernel-half entry.
const KERNEL_SLOT: usize = directory_index(VirtualAddress::new(KERNBASE));

/// Manager for user address spaces.
pub struct UserVmm<M: PhysMapper, A: FrameAlloc, L: RootLoader = Cr3Loader> {
    mapper: M,
    alloc: A,
    kernel_root: PhysicalPage,
    loader: L,
}

impl<M: PhysMapper, A: FrameAlloc, L: RootLoader> UserVmm<M, A, L> {
    /// `kernel_root` is the kernel's own directory; its upper half is shared
    /// into every new space.
    pub const fn new(mapper: M, alloc: A, kernel_root: PhysicalPage, loader: L) -> Self {
        Self {
            mapper,
            alloc,
            kernel_root,
            loader,
        }
    }

    #[inline]
    pub const fn allocator(&self) -> &A {
        &self.alloc
    }

    #[inline]
    pub const fn loader(&self) -> &L {
        &self.loader
    }

    #[inline]
    fn view(&self, space: &UserSpace) -> AddressSpace<'_, M> {
        AddressSpace::from_root(&self.mapper, space.root())
    }

    /// A fresh space: no user mappings, kernel half shared.
    ///
    /// # Errors
    /// [`VmError::OutOfMemory`] if the directory cannot be allocated.
    pub fn new_space(&self) -> Result<UserSpace, VmError> {
        let root = self.alloc.alloc_4k().ok_or(VmError::OutOfMemory)?;
        let view = AddressSpace::from_root(&self.mapper, root);
        view.directory().zero();

        let kernel = AddressSpace::from_root(&self.mapper, self.kernel_root);
        view.share_directory_entries(&kernel, KERNEL_SLOT..ENTRIES);

        // SAFETY: a freshly built directory, owned by nobody else.
        Ok(unsafe { UserSpace::from_root(root) })
    }

    /// Map zeroed, user-writable frames so the space covers `[0, new)`,
    /// given that it currently covers `[0, old)`.
    ///
    /// Returns the new size; `old` if `new < old`. On failure every frame
    /// mapped by this call is released again.
    ///
    /// # Errors
    /// [`VmError::AboveUserLimit`] if `new` reaches `KERNBASE`,
    /// [`VmError::OutOfMemory`] on exhaustion.
    pub fn grow(&self, space: &UserSpace, old: u32, new: u32) -> Result<u32, VmError> {
        if new >= KERNBASE {
            return Err(VmError::AboveUserLimit(VirtualAddress::new(new)));
        }
        if new < old {
            return Ok(old);
        }

        let view = self.view(space);
        let mut a = page_round_up(old).ok_or(VmError::Overflow)?;
        while a < new {
            if let Err(e) = self.map_zeroed(&view, VirtualAddress::new(a)) {
                self.shrink(space, new, old);
                return Err(e);
            }
            a += PAGE_SIZE;
        }
        Ok(new)
    }

    fn map_zeroed(&self, view: &AddressSpace<'_, M>, va: VirtualAddress) -> Result<(), VmError> {
        let frame = self.alloc.alloc_4k().ok_or(VmError::OutOfMemory)?;
        // SAFETY: freshly allocated and exclusively ours.
        unsafe { self.mapper.frame_mut(frame) }.fill(0);

        let mapped = view.map_one(
            &self.alloc,
            VirtualPage::from_addr(va),
            PageEntryBits::user_page(frame),
        );
        if mapped.is_err() {
            // SAFETY: never became reachable.
            unsafe { self.alloc.free_4k(frame) };
        }
        mapped
    }

    /// Release the frames covering `[round_up(new), old)`.
    ///
    /// Returns the new size; `old` if `new >= old`.
    pub fn shrink(&self, space: &UserSpace, old: u32, new: u32) -> u32 {
        if new >= old {
            return old;
        }

        let view = self.view(space);
        let mut next = page_round_up(new);
        while let Some(a) = next {
            if a >= old {
                break;
            }
            let va = VirtualAddress::new(a);
            if view.pte_mut(va).is_none() {
                // no page table: skip its whole span
                next = page_round_down(a)
                    .checked_add(DIRECTORY_SPAN)
                    .map(|b| b & !(DIRECTORY_SPAN - 1));
                continue;
            }
            if let Some(frame) = view.unmap_one(VirtualPage::from_addr(va)) {
                // SAFETY: unlinked from the only space that mapped it.
                unsafe { self.alloc.free_4k(frame) };
            }
            next = a.checked_add(PAGE_SIZE);
        }
        new
    }

    /// Revoke user access to the page at `va`, keeping it mapped.
    ///
    /// # Panics
    /// If `va` is not mapped.
    pub fn clear_user(&self, space: &UserSpace, va: VirtualAddress) {
        match self.view(space).pte_mut(va) {
            Some(pte) if pte.present() => pte.set_user_access(false),
            _ => panic!("clear_user: no mapping at {va}"),
        }
    }

    /// Fill `[va, va + len)` page by page.
    ///
    /// `reader(dst, offset)` receives the slice of each mapped frame and the
    /// byte offset of that slice from `va`. `va` must be page aligned and the
    /// range already mapped.
    ///
    /// # Errors
    /// [`VmError::Unaligned`], [`VmError::Unmapped`], [`VmError::Overflow`],
    /// or whatever `reader` returns.
    pub fn load_with<E, F>(
        &self,
        space: &UserSpace,
        va: VirtualAddress,
        len: u32,
        mut reader: F,
    ) -> Result<(), E>
    where
        E: From<VmError>,
        F: FnMut(&mut [u8], u32) -> Result<(), E>,
    {
        if !va.is_page_aligned() {
            return Err(VmError::Unaligned(va).into());
        }
        va.checked_add(len).ok_or(VmError::Overflow)?;

        let view = self.view(space);
        let mut offset = 0;
        while offset < len {
            let at = va + offset;
            let pte = match view.pte_mut(at) {
                Some(pte) if pte.present() => *pte,
                _ => return Err(VmError::Unmapped(at).into()),
            };
            let n = (len - offset).min(PAGE_SIZE) as usize;
            // SAFETY: a present user frame of this space.
            let frame = unsafe { self.mapper.frame_mut(pte.page()) };
            reader(&mut frame[..n], offset)?;
            match offset.checked_add(PAGE_SIZE) {
                Some(o) => offset = o,
                None => break,
            }
        }
        Ok(())
    }

    /// Copy `bytes` to `va` as seen by user mode.
    ///
    /// Every touched page must be present and user accessible, so the guard
    /// page below a stack rejects the write.
    ///
    /// # Errors
    /// [`VmError::Unmapped`], [`VmError::NotUserAccessible`],
    /// [`VmError::Overflow`].
    pub fn copy_out(&self, space: &UserSpace, va: VirtualAddress, bytes: &[u8]) -> Result<(), VmError> {
        let view = self.view(space);
        walk_pages(va, bytes.len(), |at, range| {
            let pa = view.translate_user(at)?;
            // SAFETY: a present user frame of this space.
            let frame = unsafe { self.mapper.frame_mut(pa.page()) };
            let off = pa.offset() as usize;
            frame[off..off + range.len()].copy_from_slice(&bytes[range]);
            Ok(())
        })
    }

    /// Read `buf.len()` bytes at `va` from any present page.
    ///
    /// # Errors
    /// [`VmError::Unmapped`], [`VmError::Overflow`].
    pub fn copy_in(&self, space: &UserSpace, va: VirtualAddress, buf: &mut [u8]) -> Result<(), VmError> {
        let view = self.view(space);
        walk_pages(va, buf.len(), |at, range| {
            let pa = view.query(at).ok_or(VmError::Unmapped(at))?;
            // SAFETY: a present frame of this space.
            let frame = unsafe { self.mapper.frame_mut(pa.page()) };
            let off = pa.offset() as usize;
            buf[range.clone()].copy_from_slice(&frame[off..off + range.len()]);
            Ok(())
        })
    }

    /// Make `space` the active translation root.
    pub fn activate(&self, space: &UserSpace) {
        // SAFETY: every space built by `new_space` shares the kernel half.
        unsafe { self.loader.load_root(space.root()) }
    }

    /// Free every user frame, every user page table and the directory.
    ///
    /// Kernel-half page tables are shared and stay untouched.
    pub fn destroy(&self, space: UserSpace) {
        self.shrink(&space, KERNBASE, 0);

        let view = self.view(&space);
        for pdx in 0..KERNEL_SLOT {
            if let Some(table) = view.take_page_table(pdx) {
                // SAFETY: user page tables belong to this space alone.
                unsafe { self.alloc.free_4k(table) };
            }
        }

        let root = space.into_root();
        // SAFETY: the handle is consumed.
        unsafe { self.alloc.free_4k(root) };
        log::trace!("destroyed address space {root}");
    }
}

/// Split `[va, va + len)` at page boundaries, handing each piece's start
/// address and its range within the caller's buffer to `f`.
fn walk_pages(
    va: VirtualAddress,
    len: usize,
    mut f: impl FnMut(VirtualAddress, core::ops::Range<usize>) -> Result<(), VmError>,
) -> Result<(), VmError> {
    let len32 = u32::try_from(len).map_err(|_| VmError::Overflow)?;
    va.checked_add(len32).ok_or(VmError::Overflow)?;

    let mut done = 0;
    while done < len {
        let at = va + done as u32;
        let chunk = ((PAGE_SIZE - at.offset()) as usize).min(len - done);
        f(at, done..done + chunk)?;
        done += chunk;
    }
    Ok(())
}
