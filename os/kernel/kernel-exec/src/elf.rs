//! ELF32 file and program headers, little endian.
//!
//! Only what loading needs is interpreted: the magic, the entry point and
//! the program header table. Everything else is carried along unvalidated.

use crate::SegmentError;
use bitfield_struct::bitfield;
use kernel_memory_addresses::{VirtualAddress, is_page_aligned};

/// `"\x7FELF"` read as a little-endian word.
pub const ELF_MAGIC: u32 = 0x464C_457F;

/// Program header kind of a loadable segment.
pub const PT_LOAD: u32 = 1;

/// Size of the ELF32 file header.
pub const ELF_HEADER_SIZE: usize = 52;

/// Size of one ELF32 program header.
pub const PROGRAM_HEADER_SIZE: usize = 32;

#[inline]
fn le16(x: &[u8]) -> u16 {
    u16::from_le_bytes([x[0], x[1]])
}

#[inline]
fn le32(x: &[u8]) -> u32 {
    u32::from_le_bytes([x[0], x[1], x[2], x[3]])
}

/// `Elf32_Ehdr`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[allow(clippy::struct_field_names)]
pub struct ElfHeader {
    pub magic: u32,
    pub ident: [u8; 12],
    pub e_type: u16,
    pub machine: u16,
    pub version: u32,
    pub entry: VirtualAddress,
    pub phoff: u32,
    pub shoff: u32,
    pub flags: u32,
    pub ehsize: u16,
    pub phentsize: u16,
    pub phnum: u16,
    pub shentsize: u16,
    pub shnum: u16,
    pub shstrndx: u16,
}

impl ElfHeader {
    #[must_use]
    pub fn parse(b: &[u8; ELF_HEADER_SIZE]) -> Self {
        let mut ident = [0; 12];
        ident.copy_from_slice(&b[4..16]);
        Self {
            magic: le32(&b[0..4]),
            ident,
            e_type: le16(&b[16..18]),
            machine: le16(&b[18..20]),
            version: le32(&b[20..24]),
            entry: VirtualAddress::new(le32(&b[24..28])),
            phoff: le32(&b[28..32]),
            shoff: le32(&b[32..36]),
            flags: le32(&b[36..40]),
            ehsize: le16(&b[40..42]),
            phentsize: le16(&b[42..44]),
            phnum: le16(&b[44..46]),
            shentsize: le16(&b[46..48]),
            shnum: le16(&b[48..50]),
            shstrndx: le16(&b[50..52]),
        }
    }

    #[inline]
    #[must_use]
    pub const fn has_valid_magic(&self) -> bool {
        self.magic == ELF_MAGIC
    }

    /// File offset of program header `index`; `None` if it overflows.
    ///
    /// Entries are packed at [`PROGRAM_HEADER_SIZE`]; `phentsize` is ignored.
    #[must_use]
    pub const fn program_header_offset(&self, index: u16) -> Option<u32> {
        self.phoff
            .checked_add(index as u32 * PROGRAM_HEADER_SIZE as u32)
    }
}

/// `Elf32_Phdr.p_flags`: bit0=X, bit1=W, bit2=R. Advisory only.
#[bitfield(u32)]
#[derive(PartialEq, Eq)]
pub struct PFlags {
    pub execute: bool,
    pub write: bool,
    pub read: bool,
    #[bits(29)]
    __: u32,
}

/// `Elf32_Phdr`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ProgramHeader {
    pub kind: u32,
    pub offset: u32,
    pub vaddr: VirtualAddress,
    pub paddr: u32,
    pub filesz: u32,
    pub memsz: u32,
    pub flags: PFlags,
    pub align: u32,
}

impl ProgramHeader {
    #[must_use]
    pub fn parse(b: &[u8; PROGRAM_HEADER_SIZE]) -> Self {
        Self {
            kind: le32(&b[0..4]),
            offset: le32(&b[4..8]),
            vaddr: VirtualAddress::new(le32(&b[8..12])),
            paddr: le32(&b[12..16]),
            filesz: le32(&b[16..20]),
            memsz: le32(&b[20..24]),
            flags: PFlags::from_bits(le32(&b[24..28])),
            align: le32(&b[28..32]),
        }
    }

    #[inline]
    #[must_use]
    pub const fn is_load(&self) -> bool {
        self.kind == PT_LOAD
    }

    /// Check the descriptor and return the end of its memory image.
    ///
    /// # Errors
    /// If `memsz < filesz`, `vaddr + memsz` wraps, or `vaddr` is not page aligned.
    pub const fn validate(&self) -> Result<u32, SegmentError> {
        let vaddr = self.vaddr.as_u32();
        if self.memsz < self.filesz {
            return Err(SegmentError::MemSmallerThanFile {
                memsz: self.memsz,
                filesz: self.filesz,
            });
        }
        let Some(end) = vaddr.checked_add(self.memsz) else {
            return Err(SegmentError::AddressOverflow {
                vaddr,
                memsz: self.memsz,
            });
        };
        if !is_page_aligned(vaddr) {
            return Err(SegmentError::Unaligned(vaddr));
        }
        Ok(end)
    }
}
