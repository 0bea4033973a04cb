use crate::{ExecError, FsError, Inode};
use kernel_alloc::vmm::UserVmm;
use kernel_memory_addresses::VirtualAddress;
use kernel_vmem::{FrameAlloc, PhysMapper, RootLoader, UserSpace, VmError};

/// Address-space operations a load needs.
///
/// Sizes are the top of user memory: a space of size `n` covers `[0, n)`.
pub trait UserMemory {
    /// Exclusively owned handle to one address space.
    type Space;

    /// A fresh space with no user mappings.
    ///
    /// # Errors
    /// On exhaustion.
    fn new_space(&self) -> Result<Self::Space, VmError>;

    /// Extend `space` from `old` to `new` bytes with zero-filled pages.
    ///
    /// Returns the resulting size, never less than `old`.
    ///
    /// # Errors
    /// On exhaustion or when `new` reaches kernel space; nothing stays mapped.
    fn grow(&self, space: &Self::Space, old: u32, new: u32) -> Result<u32, VmError>;

    /// Make the page at `va` inaccessible from user mode.
    fn clear_user(&self, space: &Self::Space, va: VirtualAddress);

    /// Copy `len` bytes at file `offset` to the page-aligned, mapped `va`.
    ///
    /// # Errors
    /// On unmapped or unaligned destinations and on read failures.
    fn load_segment<I: Inode + ?Sized>(
        &self,
        space: &Self::Space,
        va: VirtualAddress,
        inode: &I,
        offset: u32,
        len: u32,
    ) -> Result<(), ExecError>;

    /// Write `bytes` at `va` through user-accessible mappings only.
    ///
    /// # Errors
    /// If any touched page is missing or supervisor-only.
    fn copy_out(&self, space: &Self::Space, va: VirtualAddress, bytes: &[u8]) -> Result<(), VmError>;

    /// Install `space` on this CPU.
    fn activate(&self, space: &Self::Space);

    /// Release `space` and everything it maps.
    fn destroy(&self, space: Self::Space);
}

impl<M: PhysMapper, A: FrameAlloc, L: RootLoader> UserMemory for UserVmm<M, A, L> {
    type Space = UserSpace;

    fn new_space(&self) -> Result<UserSpace, VmError> {
        Self::new_space(self)
    }

    fn grow(&self, space: &UserSpace, old: u32, new: u32) -> Result<u32, VmError> {
        Self::grow(self, space, old, new)
    }

    fn clear_user(&self, space: &UserSpace, va: VirtualAddress) {
        Self::clear_user(self, space, va);
    }

    fn load_segment<I: Inode + ?Sized>(
        &self,
        space: &UserSpace,
        va: VirtualAddress,
        inode: &I,
        offset: u32,
        len: u32,
    ) -> Result<(), ExecError> {
        self.load_with(space, va, len, |dst, at| {
            let Some(file_at) = offset.checked_add(at) else {
                return Err(FsError::ShortRead {
                    offset,
                    wanted: dst.len(),
                    got: 0,
                }
                .into());
            };
            inode.read_exact_at(file_at, dst)?;
            Ok(())
        })
    }

    fn copy_out(&self, space: &UserSpace, va: VirtualAddress, bytes: &[u8]) -> Result<(), VmError> {
        Self::copy_out(self, space, va, bytes)
    }

    fn activate(&self, space: &UserSpace) {
        Self::activate(self, space);
    }

    fn destroy(&self, space: UserSpace) {
        Self::destroy(self, space);
    }
}
