//! # Page directory / page table frames
//!
//! A 32-bit virtual address splits into three fields:
//!
//! ```text
//! | 31‒22 | 21‒12 | 11‒0   |
//! |  PDX  |  PTX  | Offset |
//! ```
//!
//! `PDX` selects an entry in the page directory (the root, referenced by
//! CR3), `PTX` selects an entry in the page table that entry points to.
//! Both levels hold 1024 four-byte entries, so each is exactly one frame.

use crate::PageEntryBits;
use kernel_memory_addresses::VirtualAddress;

/// Entries per directory or table.
pub const ENTRIES: usize = 1024;

/// Bytes of virtual address space covered by one directory entry (4 MiB).
pub const DIRECTORY_SPAN: u32 = 1 << 22;

/// One 4 KiB frame interpreted as 1024 paging entries.
#[repr(C, align(4096))]
pub struct PageTable {
    entries: [PageEntryBits; ENTRIES],
}

const _: () = assert!(size_of::<PageTable>() == 4096);

impl PageTable {
    #[must_use]
    pub const fn zeroed() -> Self {
        Self {
            entries: [PageEntryBits::new(); ENTRIES],
        }
    }

    /// Clear every entry.
    #[inline]
    pub fn zero(&mut self) {
        self.entries.fill(PageEntryBits::new());
    }

    #[inline]
    #[must_use]
    pub const fn entry(&self, index: usize) -> PageEntryBits {
        self.entries[index]
    }

    #[inline]
    pub const fn entry_mut(&mut self, index: usize) -> &mut PageEntryBits {
        &mut self.entries[index]
    }

    #[inline]
    pub const fn set_entry(&mut self, index: usize, e: PageEntryBits) {
        self.entries[index] = e;
    }
}

/// Page-directory index of `va`.
#[inline]
#[must_use]
pub const fn directory_index(va: VirtualAddress) -> usize {
    (va.as_u32() >> 22) as usize
}

/// Page-table index of `va`.
#[inline]
#[must_use]
pub const fn table_index(va: VirtualAddress) -> usize {
    ((va.as_u32() >> 12) & 0x3FF) as usize
}

/// `(PDX, PTX)` of `va`.
///
/// ```rust
/// # use kernel_memory_addresses::VirtualAddress;
/// # use kernel_vmem::split_indices;
/// assert_eq!(split_indices(VirtualAddress::new(0x0000_0000)), (0, 0));
/// assert_eq!(split_indices(VirtualAddress::new(0x0040_1000)), (1, 1));
/// assert_eq!(split_indices(VirtualAddress::new(0x8000_0000)), (512, 0));
/// assert_eq!(split_indices(VirtualAddress::new(0xFFFF_FFFF)), (1023, 1023));
/// ```
#[inline]
#[must_use]
pub const fn split_indices(va: VirtualAddress) -> (usize, usize) {
    (directory_index(va), table_index(va))
}
