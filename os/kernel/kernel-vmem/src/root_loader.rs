use kernel_memory_addresses::PhysicalPage;

/// Installs a page directory as the active translation root.
pub trait RootLoader {
    /// # Safety
    /// `root` must be a complete directory that maps the currently executing
    /// kernel code and data.
    unsafe fn load_root(&self, root: PhysicalPage);
}

/// Loads CR3 on the executing CPU.
#[derive(Debug, Default, Clone, Copy)]
pub struct Cr3Loader;

impl RootLoader for Cr3Loader {
    #[inline]
    unsafe fn load_root(&self, root: PhysicalPage) {
        #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
        unsafe {
            core::arch::asm!(
                "mov cr3, {}",
                in(reg) root.base().as_usize(),
                options(nostack, preserves_flags)
            );
        }

        #[cfg(not(any(target_arch = "x86", target_arch = "x86_64")))]
        let _ = root;
    }
}
