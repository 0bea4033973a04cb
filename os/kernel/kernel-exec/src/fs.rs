//! Filesystem collaborator.
//!
//! The loader opens one file, reads byte ranges from it and releases it.
//! Everything it does between [`FileSystem::begin_op`] and
//! [`FileSystem::end_op`] is one transaction from the filesystem's view.

use crate::FsError;
use core::sync::atomic::{AtomicUsize, Ordering};

/// An open, readable file.
pub trait Inode {
    /// Read up to `buf.len()` bytes at `offset`; returns the count read.
    ///
    /// # Errors
    /// [`FsError::Io`] if the underlying device fails.
    fn read_at(&self, offset: u32, buf: &mut [u8]) -> Result<usize, FsError>;

    /// Fill `buf` from `offset` or fail.
    ///
    /// # Errors
    /// [`FsError::ShortRead`] if fewer bytes are available.
    fn read_exact_at(&self, offset: u32, buf: &mut [u8]) -> Result<(), FsError> {
        let got = self.read_at(offset, buf)?;
        if got == buf.len() {
            Ok(())
        } else {
            Err(FsError::ShortRead {
                offset,
                wanted: buf.len(),
                got,
            })
        }
    }
}

pub trait FileSystem {
    type Inode: Inode;

    /// Enter a filesystem transaction.
    fn begin_op(&self) {}

    /// Leave the transaction entered by [`begin_op`](Self::begin_op).
    fn end_op(&self) {}

    /// Resolve `path` to an inode.
    fn open(&self, path: &str) -> Option<Self::Inode>;

    /// Unlock and drop the reference taken by [`open`](Self::open).
    fn release(&self, inode: &Self::Inode);
}

/// A read-only table of in-memory files.
///
/// Names are matched with leading `/` stripped on both sides. Open inodes
/// and running transactions are counted so a caller can check that all of
/// them were balanced.
pub struct StaticFs<'a> {
    files: &'a [(&'a str, &'a [u8])],
    open: AtomicUsize,
    ops: AtomicUsize,
}

impl<'a> StaticFs<'a> {
    #[must_use]
    pub const fn new(files: &'a [(&'a str, &'a [u8])]) -> Self {
        Self {
            files,
            open: AtomicUsize::new(0),
            ops: AtomicUsize::new(0),
        }
    }

    /// Inodes opened and not yet released.
    pub fn open_inodes(&self) -> usize {
        self.open.load(Ordering::Acquire)
    }

    /// Transactions begun and not yet ended.
    pub fn active_ops(&self) -> usize {
        self.ops.load(Ordering::Acquire)
    }
}

/// A file of a [`StaticFs`].
#[derive(Debug, Clone, Copy)]
pub struct StaticInode<'a> {
    bytes: &'a [u8],
}

impl Inode for StaticInode<'_> {
    fn read_at(&self, offset: u32, buf: &mut [u8]) -> Result<usize, FsError> {
        let Some(src) = self.bytes.get(offset as usize..) else {
            return Ok(0);
        };
        let n = src.len().min(buf.len());
        buf[..n].copy_from_slice(&src[..n]);
        Ok(n)
    }
}

impl<'a> FileSystem for StaticFs<'a> {
    type Inode = StaticInode<'a>;

    fn begin_op(&self) {
        self.ops.fetch_add(1, Ordering::AcqRel);
    }

    fn end_op(&self) {
        let prev = self.ops.fetch_sub(1, Ordering::AcqRel);
        assert!(prev > 0, "end_op: no transaction in progress");
    }

    fn open(&self, path: &str) -> Option<Self::Inode> {
        let wanted = path.trim_start_matches('/');
        let bytes = self
            .files
            .iter()
            .find(|(name, _)| name.trim_start_matches('/') == wanted)?
            .1;
        self.open.fetch_add(1, Ordering::AcqRel);
        Some(StaticInode { bytes })
    }

    fn release(&self, _inode: &Self::Inode) {
        let prev = self.open.fetch_sub(1, Ordering::AcqRel);
        assert!(prev > 0, "release: inode was not open");
    }
}
