//! Initial user stack.
//!
//! The stack page is filled from the top down so that `main(argc, argv)`
//! finds its arguments as if called normally:
//!
//! ```text
//!  stack top ─►  ┌──────────────────────────┐
//!                │ "argv[0]\0" … "argv[n]\0"│  strings, each start 4-byte aligned
//!                ├──────────────────────────┤
//!                │ 0                        │  argv[argc]
//!                │ &argv[argc-1] … &argv[0] │
//!                │ argv  ───────────────────┼─► &argv[0]
//!                │ argc                     │
//!      esp  ─►   │ 0xFFFF_FFFF              │  fake return address
//!                └──────────────────────────┘
//! ```

use crate::{ExecError, UserMemory};
use kernel_info::params::{FAKE_RETURN_PC, MAX_ARGS};
use kernel_memory_addresses::VirtualAddress;
use kernel_vmem::VmError;

const WORD: u32 = 4;

/// Words of the image: return address, argc, argv, pointers, terminator.
const MAX_WORDS: usize = 3 + MAX_ARGS + 1;

/// The word array copied below the argument strings.
#[derive(Debug, Clone)]
pub struct StackImage {
    words: [u32; MAX_WORDS],
    argc: usize,
}

impl Default for StackImage {
    fn default() -> Self {
        Self::new()
    }
}

impl StackImage {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            words: [0; MAX_WORDS],
            argc: 0,
        }
    }

    #[inline]
    #[must_use]
    pub const fn argc(&self) -> usize {
        self.argc
    }

    /// Record the user address of the next argument string.
    ///
    /// # Errors
    /// [`ExecError::TooManyArgs`] past `MAX_ARGS`.
    pub const fn push_arg(&mut self, ptr: u32) -> Result<(), ExecError> {
        if self.argc >= MAX_ARGS {
            return Err(ExecError::TooManyArgs(MAX_ARGS));
        }
        self.words[3 + self.argc] = ptr;
        self.argc += 1;
        Ok(())
    }

    /// Bytes the image occupies.
    #[must_use]
    pub const fn byte_len(&self) -> u32 {
        ((3 + self.argc + 1) as u32) * WORD
    }

    /// Complete the header for strings ending at `sp` and return the image
    /// bytes plus the stack pointer they must be written to.
    ///
    /// # Errors
    /// [`VmError::Overflow`] if the image does not fit below `sp`.
    pub fn finish(&mut self, sp: u32) -> Result<(u32, [u8; MAX_WORDS * 4]), VmError> {
        let argc = self.argc;
        let ptrs_len = (argc as u32 + 1) * WORD;
        self.words[0] = FAKE_RETURN_PC;
        self.words[1] = argc as u32;
        self.words[2] = sp.checked_sub(ptrs_len).ok_or(VmError::Overflow)?;
        self.words[3 + argc] = 0;

        let new_sp = sp.checked_sub(self.byte_len()).ok_or(VmError::Overflow)?;
        let mut bytes = [0u8; MAX_WORDS * 4];
        for (chunk, w) in bytes.chunks_exact_mut(4).zip(self.words.iter()) {
            chunk.copy_from_slice(&w.to_le_bytes());
        }
        Ok((new_sp, bytes))
    }
}

/// Copy `argv` and the [`StackImage`] below `stack_top`; returns the final
/// stack pointer.
///
/// # Errors
/// [`ExecError::TooManyArgs`], or a [`VmError`] if a write leaves the
/// user-accessible stack page (e.g. hits the guard page).
pub fn write_initial_stack<V, A>(
    vm: &V,
    space: &V::Space,
    stack_top: u32,
    argv: &[A],
) -> Result<u32, ExecError>
where
    V: UserMemory + ?Sized,
    A: AsRef<[u8]>,
{
    let mut image = StackImage::new();
    let mut sp = stack_top;

    for arg in argv {
        let arg = arg.as_ref();
        let len = u32::try_from(arg.len() + 1).map_err(|_| VmError::Overflow)?;
        let at = sp.checked_sub(len).ok_or(VmError::Overflow)? & !(WORD - 1);
        image.push_arg(at)?;

        let dst = VirtualAddress::new(at);
        vm.copy_out(space, dst, arg)?;
        vm.copy_out(space, dst + (len - 1), &[0])?;
        sp = at;
    }

    let (sp, bytes) = image.finish(sp)?;
    let used = image.byte_len() as usize;
    vm.copy_out(space, VirtualAddress::new(sp), &bytes[..used])?;

    log::debug!(
        "initial stack: argc {} sp {sp:#010x} ({} bytes below {stack_top:#010x})",
        image.argc(),
        stack_top - sp
    );
    Ok(sp)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn word(bytes: &[u8], i: usize) -> u32 {
        u32::from_le_bytes(bytes[i * 4..i * 4 + 4].try_into().unwrap())
    }

    #[test]
    fn empty_image_has_header_and_terminator() {
        let mut image = StackImage::new();
        let (sp, bytes) = image.finish(0x2000).unwrap();
        assert_eq!(sp, 0x2000 - 16);
        assert_eq!(word(&bytes, 0), FAKE_RETURN_PC);
        assert_eq!(word(&bytes, 1), 0);
        // argv points at the terminator
        assert_eq!(word(&bytes, 2), 0x2000 - 4);
        assert_eq!(word(&bytes, 3), 0);
    }

    #[test]
    fn pointers_follow_the_header() {
        let mut image = StackImage::new();
        image.push_arg(0x1FF8).unwrap();
        image.push_arg(0x1FF0).unwrap();
        let (sp, bytes) = image.finish(0x1FF0).unwrap();
        assert_eq!(sp, 0x1FF0 - 24);
        assert_eq!(word(&bytes, 1), 2);
        assert_eq!(word(&bytes, 2), sp + 12);
        assert_eq!(word(&bytes, 3), 0x1FF8);
        assert_eq!(word(&bytes, 4), 0x1FF0);
        assert_eq!(word(&bytes, 5), 0);
    }

    #[test]
    fn argument_limit() {
        let mut image = StackImage::new();
        for i in 0..MAX_ARGS {
            image.push_arg(i as u32).unwrap();
        }
        assert_eq!(image.push_arg(0), Err(ExecError::TooManyArgs(MAX_ARGS)));
        assert_eq!(image.argc(), MAX_ARGS);
    }

    #[test]
    fn image_below_zero_overflows() {
        let mut image = StackImage::new();
        assert_eq!(image.finish(8).unwrap_err(), VmError::Overflow);
    }
}
