use kernel_vmem::VmError;

/// Failures of the filesystem collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum FsError {
    #[error("i/o error")]
    Io,
    #[error("short read at offset {offset:#x}: wanted {wanted} bytes, got {got}")]
    ShortRead { offset: u32, wanted: usize, got: usize },
}

/// A loadable segment descriptor that cannot be honored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SegmentError {
    #[error("memory size {memsz:#x} is smaller than file size {filesz:#x}")]
    MemSmallerThanFile { memsz: u32, filesz: u32 },
    #[error("segment at {vaddr:#x} with size {memsz:#x} wraps the address space")]
    AddressOverflow { vaddr: u32, memsz: u32 },
    #[error("segment address {0:#x} is not page aligned")]
    Unaligned(u32),
}

/// Why a load failed. The calling process is left untouched in every case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ExecError {
    #[error("no such file")]
    NotFound,
    #[error("file too short for an ELF header")]
    ShortHeader,
    #[error("bad ELF magic {0:#010x}")]
    BadMagic(u32),
    #[error("program header {0} is truncated")]
    ShortSegment(u16),
    #[error("invalid segment: {0}")]
    Segment(#[from] SegmentError),
    #[error("address space: {0}")]
    Vm(#[from] VmError),
    #[error("file system: {0}")]
    Fs(#[from] FsError),
    #[error("more than {0} arguments")]
    TooManyArgs(usize),
}
