//! # Process and Loader Limits

/// Maximum number of command-line arguments accepted by the image loader.
pub const MAX_ARGS: usize = 32;

/// Size of the process name buffer, including the terminating NUL.
pub const PROC_NAME_LEN: usize = 16;

/// Sentinel return address placed at the bottom of a fresh user stack.
///
/// Returning from the program entry point jumps here and faults.
pub const FAKE_RETURN_PC: u32 = 0xFFFF_FFFF;

const _: () = {
    assert!(MAX_ARGS > 0);
    assert!(PROC_NAME_LEN > 1);
};
