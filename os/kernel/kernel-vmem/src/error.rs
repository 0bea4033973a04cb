use kernel_memory_addresses::VirtualAddress;

/// Failures of address-space operations.
///
/// All of these are recoverable: the caller unwinds whatever it built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum VmError {
    #[error("out of physical frames")]
    OutOfMemory,
    #[error("address {0} reaches into kernel space")]
    AboveUserLimit(VirtualAddress),
    #[error("address {0} is not page aligned")]
    Unaligned(VirtualAddress),
    #[error("no mapping at {0}")]
    Unmapped(VirtualAddress),
    #[error("page at {0} is not user accessible")]
    NotUserAccessible(VirtualAddress),
    #[error("address range overflows")]
    Overflow,
}
