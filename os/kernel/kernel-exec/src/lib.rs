//! # Process image loading
//!
//! [`load_image`] replaces a process's memory image with an ELF32 executable
//! read from a [`FileSystem`]:
//!
//! ```text
//!  open + header ──► new space ──► segments ──► close file ──► guard + stack ──► commit
//!        │               │             │                            │              │
//!        └───────────────┴─────────────┴──── any failure ───────────┘              ▼
//!                          new space destroyed, file released,        swap, activate,
//!                          process untouched                          destroy old
//! ```
//!
//! The new address space is built beside the live one and only swapped in
//! once every fallible step has succeeded. A failed load is invisible to
//! the process.
//!
//! The address-space work goes through [`UserMemory`], implemented for
//! [`UserVmm`](kernel_alloc::vmm::UserVmm).

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

pub mod elf;
mod error;
mod exec;
pub mod fs;
pub mod process;
pub mod stack;
mod vm;

pub use crate::error::{ExecError, FsError, SegmentError};
pub use crate::exec::load_image;
pub use crate::fs::{FileSystem, Inode};
pub use crate::process::{ProcName, Process, TrapFrame};
pub use crate::vm::UserMemory;
