//! # Kernel Memory Allocation
//!
//! Physical frames and the user address spaces built from them.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │            User address-space manager (vmm)         │
//! │    • new / grow / shrink / destroy user spaces      │
//! │    • copy in and out of user pages, guard pages     │
//! └─────────────────┬───────────────────────────────────┘
//!                   │ page tables, user frames
//! ┌─────────────────▼───────────────────────────────────┐
//! │           Physical frame allocator                  │
//! │    • O(1) free list of 4 KiB frames                 │
//! │    • poison on free, fatal on bad or double free    │
//! │    • lock gated off during early boot               │
//! └─────────────────┬───────────────────────────────────┘
//!                   │ frame bytes
//! ┌─────────────────▼───────────────────────────────────┐
//! │              Physical mapper                        │
//! │    • direct map at KERNBASE, or a fixed offset      │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! ## Lifecycle
//!
//! The kernel owns one [`FrameAllocator`](frame_alloc::FrameAllocator), a
//! `static` configured by [`boot::init_bootstrap`] while only the first 4 MiB of physical
//! memory are mapped, and completed by [`boot::init_operational`] once the
//! kernel's page tables cover all of it. From then on every call takes the
//! allocator's lock.
//!
//! Freed frames are filled with [`POISON_BYTE`](frame_alloc::POISON_BYTE) so
//! that a stale reader sees garbage instead of old data.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

pub mod boot;
pub mod frame_alloc;
pub mod phys_mapper;
pub mod vmm;
