//! # Kernel Configuration
//!
//! Compile-time configuration shared by the memory subsystems and the image
//! loader. There is no runtime configuration source; every tunable is a
//! constant checked at compile time.
//!
//! ## Modules
//!
//! * [`memory`]: physical and virtual memory layout (`KERNBASE`, `PHYSTOP`,
//!   the bootstrap mapping window).
//! * [`params`]: process and loader limits (`MAX_ARGS`, `PROC_NAME_LEN`).
//!
//! ## Virtual Memory Layout
//!
//! ```text
//! 0x0000_0000 ┌─────────────────────────────────┐
//!             │ User image (segments)           │
//!             │ Guard page                      │
//!             │ User stack page                 │
//!             │ (heap grows upward)             │
//! KERNBASE    ├─────────────────────────────────┤
//!             │ Direct map of physical memory   │
//!             │ [0, PHYSTOP) at KERNBASE + pa   │
//! 0xFFFF_FFFF └─────────────────────────────────┘
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]

pub mod memory;
pub mod params;
