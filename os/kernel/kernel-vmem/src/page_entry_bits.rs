use bitfield_struct::bitfield;
use kernel_memory_addresses::PhysicalPage;

/// A single 32-bit x86 page-directory or page-table entry in raw bitfield form.
///
/// Non-PAE 32-bit paging uses the same layout on both levels. A directory
/// entry (PDE) points to a page table; a table entry (PTE) maps one 4 KiB
/// frame. Large pages (`PS` in a PDE) are never created by this crate.
///
/// ### Bit layout
///
/// | Bits  | Name / Mnemonic | Meaning |
/// |-------|-----------------|---------|
/// | 0     | `P`             | Present |
/// | 1     | `RW`            | Writable |
/// | 2     | `US`            | User-mode accessible |
/// | 3     | `PWT`           | Write-through caching |
/// | 4     | `PCD`           | Disable caching |
/// | 5     | `A`             | Accessed |
/// | 6     | `D`             | Dirty (PTE only) |
/// | 7     | `PS`            | 4 MiB page (PDE only) |
/// | 8     | `G`             | Global (PTE only) |
/// | 9–11  | OS avail        | Ignored by hardware |
/// | 12–31 | `frame`         | Physical frame number |
///
/// ### Example
/// ```rust
/// # use kernel_memory_addresses::{PhysicalAddress, PhysicalPage};
/// # use kernel_vmem::PageEntryBits;
/// let page = PhysicalPage::from_addr(PhysicalAddress::new(0x0012_3000));
/// let e = PageEntryBits::user_page(page);
/// assert!(e.present());
/// assert!(e.user_access());
/// assert_eq!(e.page(), page);
/// assert_eq!(e.into_bits(), 0x0012_3007);
/// ```
#[bitfield(u32)]
#[derive(PartialEq, Eq)]
pub struct PageEntryBits {
    /// Present (P, bit 0).
    ///
    /// Clear means any access through this entry faults.
    pub present: bool,

    /// Writable (RW, bit 1).
    pub writable: bool,

    /// User/Supervisor (US, bit 2).
    ///
    /// Clear restricts the page to supervisor mode. A mapped page with this
    /// bit cleared is how the stack guard page is made inaccessible.
    pub user_access: bool,

    /// Page-level write-through (PWT, bit 3).
    pub write_through: bool,

    /// Page-level cache disable (PCD, bit 4).
    pub cache_disabled: bool,

    /// Accessed (A, bit 5). Set by the CPU.
    pub accessed: bool,

    /// Dirty (D, bit 6). Set by the CPU on first write through a PTE.
    pub dirty: bool,

    /// Page size (PS, bit 7). Only meaningful in a PDE.
    pub large_page: bool,

    /// Global (G, bit 8).
    pub global: bool,

    /// Bits 9–11, free for the OS.
    #[bits(3)]
    pub os_available: u8,

    /// Physical frame number (bits 12–31).
    #[bits(20)]
    pub frame: u32,
}

impl PageEntryBits {
    /// Entry for an intermediate page table (PDE).
    ///
    /// Directory entries are maximally permissive; the leaf decides.
    #[must_use]
    pub const fn table(page: PhysicalPage) -> Self {
        Self::new()
            .with_present(true)
            .with_writable(true)
            .with_user_access(true)
            .with_frame(page.number())
    }

    /// Leaf entry for a writable user page.
    #[must_use]
    pub const fn user_page(page: PhysicalPage) -> Self {
        Self::table(page)
    }

    /// The frame this entry refers to.
    #[inline]
    #[must_use]
    pub const fn page(self) -> PhysicalPage {
        PhysicalPage::from_number(self.frame())
    }

    /// Whether the entry is present and reachable from user mode.
    #[inline]
    #[must_use]
    pub const fn is_user_present(self) -> bool {
        self.present() && self.user_access()
    }
}
