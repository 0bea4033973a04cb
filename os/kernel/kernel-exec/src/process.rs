//! The parts of a process record a load rewrites.

use core::fmt;
use kernel_info::params::PROC_NAME_LEN;

/// Fixed-size, NUL-terminated process name.
#[derive(Copy, Clone, PartialEq, Eq)]
pub struct ProcName([u8; PROC_NAME_LEN]);

impl ProcName {
    #[must_use]
    pub const fn empty() -> Self {
        Self([0; PROC_NAME_LEN])
    }

    /// Copy at most `PROC_NAME_LEN - 1` bytes of `name`; always NUL-terminated.
    #[must_use]
    pub fn new(name: &[u8]) -> Self {
        let mut buf = [0; PROC_NAME_LEN];
        let n = name.len().min(PROC_NAME_LEN - 1);
        buf[..n].copy_from_slice(&name[..n]);
        Self(buf)
    }

    /// Name from the final segment of `path`.
    ///
    /// ```rust
    /// # use kernel_exec::ProcName;
    /// assert_eq!(ProcName::from_path("/bin/sh").as_bytes(), b"sh");
    /// assert_eq!(ProcName::from_path("init").as_bytes(), b"init");
    /// assert_eq!(ProcName::from_path("/bin/").as_bytes(), b"");
    /// ```
    #[must_use]
    pub fn from_path(path: &str) -> Self {
        let last = path.rsplit('/').next().unwrap_or(path);
        Self::new(last.as_bytes())
    }

    /// The bytes before the terminating NUL.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        let len = self.0.iter().position(|&b| b == 0).unwrap_or(PROC_NAME_LEN);
        &self.0[..len]
    }

    /// The raw buffer including the terminator.
    #[must_use]
    pub const fn raw(&self) -> &[u8; PROC_NAME_LEN] {
        &self.0
    }
}

impl Default for ProcName {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Display for ProcName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for chunk in self.as_bytes().utf8_chunks() {
            f.write_str(chunk.valid())?;
            if !chunk.invalid().is_empty() {
                f.write_str("\u{FFFD}")?;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for ProcName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ProcName(\"{self}\")")
    }
}

/// Saved user registers restored on return to user mode.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct TrapFrame {
    pub eip: u32,
    pub esp: u32,
}

/// A process as far as image loading is concerned.
///
/// `space` is the process's one and only address-space handle; replacing
/// the image moves a new handle in and the old one out.
#[derive(Debug)]
pub struct Process<S> {
    pub name: ProcName,
    pub space: S,
    /// Bytes of user memory, `[0, size)`.
    pub size: u32,
    pub tf: TrapFrame,
}

impl<S> Process<S> {
    pub const fn new(name: ProcName, space: S, size: u32) -> Self {
        Self {
            name,
            space,
            size,
            tf: TrapFrame { eip: 0, esp: 0 },
        }
    }
}
