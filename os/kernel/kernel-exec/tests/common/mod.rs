#![allow(dead_code)]

use kernel_alloc::frame_alloc::{FrameAllocator, PhysicalLayout};
use kernel_alloc::phys_mapper::OffsetPhysMapper;
use kernel_alloc::vmm::UserVmm;
use kernel_exec::elf::{ELF_HEADER_SIZE, ELF_MAGIC, PROGRAM_HEADER_SIZE, PT_LOAD};
use kernel_exec::{ExecError, Inode, UserMemory};
use kernel_memory_addresses::{PAGE_SIZE, PhysicalAddress, PhysicalPage, VirtualAddress};
use kernel_vmem::{FRAME_BYTES, PhysMapper, RootLoader, UserSpace, VmError};
use std::cell::Cell;

pub const RAM_BASE: u32 = 0x0010_0000;
pub const FRAMES: usize = 128;

pub type Frames = FrameAllocator<OffsetPhysMapper, FRAMES>;
pub type Vmm<'a> = UserVmm<OffsetPhysMapper, &'a Frames, RecordingLoader>;

#[repr(align(4096))]
struct Frame([u8; FRAME_BYTES]);

/// Simulated physical memory starting at [`RAM_BASE`].
pub struct TestRam {
    frames: Vec<Frame>,
}

impl TestRam {
    pub fn new(frames: usize) -> Self {
        assert!(frames <= FRAMES);
        Self {
            frames: (0..frames).map(|_| Frame([0xEE; FRAME_BYTES])).collect(),
        }
    }

    pub fn mapper(&self) -> OffsetPhysMapper {
        let host = self.frames.as_ptr().expose_provenance();
        OffsetPhysMapper::new(host.wrapping_sub(RAM_BASE as usize))
    }

    /// An allocator over all of this RAM, every frame free and locking on.
    pub fn allocator(&self) -> Frames {
        let top = PhysicalAddress::new(RAM_BASE + self.frames.len() as u32 * PAGE_SIZE);
        let layout = PhysicalLayout {
            kernel_end: PhysicalAddress::new(RAM_BASE),
            phys_top: top,
        };
        let frames = unsafe { FrameAllocator::new(self.mapper(), layout) };
        unsafe { frames.register_range(PhysicalAddress::new(RAM_BASE), top) };
        frames.enter_operational();
        frames
    }

    /// A user space manager whose kernel directory is taken from `frames`.
    pub fn vmm<'a>(&self, frames: &'a Frames) -> Vmm<'a> {
        let root = frames.allocate_frame().expect("kernel directory");
        unsafe { frames.mapper().table_mut(root) }.zero();
        UserVmm::new(self.mapper(), frames, root, RecordingLoader::default())
    }
}

/// Remembers the last directory it was asked to load.
#[derive(Default)]
pub struct RecordingLoader {
    pub last: Cell<Option<PhysicalPage>>,
}

impl RootLoader for RecordingLoader {
    unsafe fn load_root(&self, root: PhysicalPage) {
        self.last.set(Some(root));
    }
}

/// Counts spaces handed out and taken back.
pub struct Tracked<'a> {
    pub inner: Vmm<'a>,
    pub created: Cell<usize>,
    pub destroyed: Cell<usize>,
}

impl<'a> Tracked<'a> {
    pub fn new(inner: Vmm<'a>) -> Self {
        Self {
            inner,
            created: Cell::new(0),
            destroyed: Cell::new(0),
        }
    }

    pub fn read(&self, space: &UserSpace, va: u32, len: usize) -> Vec<u8> {
        let mut buf = vec![0; len];
        self.inner
            .copy_in(space, VirtualAddress::new(va), &mut buf)
            .expect("readable");
        buf
    }

    pub fn read_u32(&self, space: &UserSpace, va: u32) -> u32 {
        u32::from_le_bytes(self.read(space, va, 4).try_into().unwrap())
    }

    pub fn read_cstr(&self, space: &UserSpace, mut va: u32) -> Vec<u8> {
        let mut out = Vec::new();
        loop {
            let b = self.read(space, va, 1)[0];
            if b == 0 {
                return out;
            }
            out.push(b);
            va += 1;
        }
    }
}

impl UserMemory for Tracked<'_> {
    type Space = UserSpace;

    fn new_space(&self) -> Result<UserSpace, VmError> {
        let space = self.inner.new_space()?;
        self.created.set(self.created.get() + 1);
        Ok(space)
    }

    fn grow(&self, space: &UserSpace, old: u32, new: u32) -> Result<u32, VmError> {
        self.inner.grow(space, old, new)
    }

    fn clear_user(&self, space: &UserSpace, va: VirtualAddress) {
        self.inner.clear_user(space, va);
    }

    fn load_segment<I: Inode + ?Sized>(
        &self,
        space: &UserSpace,
        va: VirtualAddress,
        inode: &I,
        offset: u32,
        len: u32,
    ) -> Result<(), ExecError> {
        UserMemory::load_segment(&self.inner, space, va, inode, offset, len)
    }

    fn copy_out(&self, space: &UserSpace, va: VirtualAddress, bytes: &[u8]) -> Result<(), VmError> {
        self.inner.copy_out(space, va, bytes)
    }

    fn activate(&self, space: &UserSpace) {
        self.inner.activate(space);
    }

    fn destroy(&self, space: UserSpace) {
        self.destroyed.set(self.destroyed.get() + 1);
        self.inner.destroy(space);
    }
}

struct Segment {
    kind: u32,
    vaddr: u32,
    data: Vec<u8>,
    memsz: u32,
    flags: u32,
}

/// Builds ELF32 images in memory.
pub struct ElfImage {
    magic: u32,
    entry: u32,
    segments: Vec<Segment>,
}

impl ElfImage {
    pub fn new(entry: u32) -> Self {
        Self {
            magic: ELF_MAGIC,
            entry,
            segments: Vec::new(),
        }
    }

    pub fn magic(mut self, magic: u32) -> Self {
        self.magic = magic;
        self
    }

    pub fn load(self, vaddr: u32, data: &[u8], memsz: u32) -> Self {
        self.segment(PT_LOAD, vaddr, data, memsz)
    }

    pub fn segment(mut self, kind: u32, vaddr: u32, data: &[u8], memsz: u32) -> Self {
        self.segments.push(Segment {
            kind,
            vaddr,
            data: data.to_vec(),
            memsz,
            flags: 0b101,
        });
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let phoff = ELF_HEADER_SIZE;
        let mut data_off = phoff + self.segments.len() * PROGRAM_HEADER_SIZE;

        let mut out = Vec::new();
        out.extend_from_slice(&self.magic.to_le_bytes());
        out.extend_from_slice(&[1, 1, 1, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
        out.extend_from_slice(&2u16.to_le_bytes()); // ET_EXEC
        out.extend_from_slice(&3u16.to_le_bytes()); // EM_386
        out.extend_from_slice(&1u32.to_le_bytes());
        out.extend_from_slice(&self.entry.to_le_bytes());
        out.extend_from_slice(&(phoff as u32).to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes());
        out.extend_from_slice(&(ELF_HEADER_SIZE as u16).to_le_bytes());
        out.extend_from_slice(&(PROGRAM_HEADER_SIZE as u16).to_le_bytes());
        out.extend_from_slice(&(self.segments.len() as u16).to_le_bytes());
        out.extend_from_slice(&[0; 6]);
        assert_eq!(out.len(), ELF_HEADER_SIZE);

        for s in &self.segments {
            for field in [
                s.kind,
                data_off as u32,
                s.vaddr,
                s.vaddr,
                s.data.len() as u32,
                s.memsz,
                s.flags,
                PAGE_SIZE,
            ] {
                out.extend_from_slice(&field.to_le_bytes());
            }
            data_off += s.data.len();
        }
        for s in &self.segments {
            out.extend_from_slice(&s.data);
        }
        out
    }
}
