//! # Virtual and Physical Memory Address Types
//!
//! Strongly typed wrappers for raw 32-bit memory addresses and page bases used
//! by the frame allocator, the paging code and the image loader.
//!
//! ## Overview
//!
//! The kernel runs on a 32-bit two-level paging model with a single page size
//! of [`PAGE_SIZE`] bytes. Physical frames and virtual pages share that
//! granularity, but must never be mixed up: a frame address handed to the
//! allocator is meaningless as a user pointer and vice versa.
//!
//! | Type | Meaning |
//! |------|---------|
//! | [`PhysicalAddress`] / [`PhysicalPage`] | Physical memory (RAM frames, page tables). |
//! | [`VirtualAddress`] / [`VirtualPage`] | Addresses translated through a page directory. |
//!
//! The `*Page` types are only constructible page-aligned, so any API that
//! takes a [`PhysicalPage`] has alignment guaranteed by the type.
//!
//! ## Typical Usage
//!
//! ```rust
//! # use kernel_memory_addresses::*;
//! let va = VirtualAddress::new(0x0000_3123);
//! let page = va.page();
//! assert_eq!(page.base().as_u32(), 0x0000_3000);
//! assert_eq!(va.offset(), 0x123);
//!
//! let pa = PhysicalAddress::new(0x0040_0000);
//! assert!(PhysicalPage::from_aligned(pa).is_some());
//! assert!(PhysicalPage::from_aligned(pa + 8).is_none());
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]

mod physical_address;
mod physical_page;
mod virtual_address;
mod virtual_page;

pub use physical_address::PhysicalAddress;
pub use physical_page::PhysicalPage;
pub use virtual_address::VirtualAddress;
pub use virtual_page::VirtualPage;

/// Size of a page (and of a physical frame) in bytes.
pub const PAGE_SIZE: u32 = 4096;

/// `log2(PAGE_SIZE)`, the number of in-page offset bits.
pub const PAGE_SHIFT: u32 = 12;

const _: () = assert!(1 << PAGE_SHIFT == PAGE_SIZE);

/// Round `x` down to a page boundary.
///
/// ```rust
/// # use kernel_memory_addresses::page_round_down;
/// assert_eq!(page_round_down(0), 0);
/// assert_eq!(page_round_down(4095), 0);
/// assert_eq!(page_round_down(4097), 4096);
/// ```
#[inline]
#[must_use]
pub const fn page_round_down(x: u32) -> u32 {
    x & !(PAGE_SIZE - 1)
}

/// Round `x` up to a page boundary, or `None` if that would leave the 32-bit
/// address space.
///
/// ```rust
/// # use kernel_memory_addresses::page_round_up;
/// assert_eq!(page_round_up(0), Some(0));
/// assert_eq!(page_round_up(1), Some(4096));
/// assert_eq!(page_round_up(4096), Some(4096));
/// assert_eq!(page_round_up(u32::MAX), None);
/// ```
#[inline]
#[must_use]
pub const fn page_round_up(x: u32) -> Option<u32> {
    match x.checked_add(PAGE_SIZE - 1) {
        Some(v) => Some(page_round_down(v)),
        None => None,
    }
}

/// Whether `x` sits on a page boundary.
#[inline]
#[must_use]
pub const fn is_page_aligned(x: u32) -> bool {
    x & (PAGE_SIZE - 1) == 0
}
