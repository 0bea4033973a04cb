use kernel_memory_addresses::PhysicalPage;

/// Exclusive handle to a user address space, identified by its page directory.
///
/// Not `Clone`: exactly one owner (a process, or a load in progress) holds a
/// space at a time, and releasing it consumes the handle.
#[derive(Debug, PartialEq, Eq)]
#[must_use = "dropping a UserSpace leaks its frames; hand it back for destruction"]
pub struct UserSpace {
    root: PhysicalPage,
}

impl UserSpace {
    /// Wrap a page directory frame.
    ///
    /// # Safety
    /// `root` must be a directory built for user space and owned by no other handle.
    #[inline]
    pub const unsafe fn from_root(root: PhysicalPage) -> Self {
        Self { root }
    }

    /// Page directory frame.
    #[inline]
    pub const fn root(&self) -> PhysicalPage {
        self.root
    }

    /// Give up the handle, returning the directory frame.
    #[inline]
    pub const fn into_root(self) -> PhysicalPage {
        self.root
    }
}
