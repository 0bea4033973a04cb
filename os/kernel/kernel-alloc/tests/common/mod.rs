#![allow(dead_code)]

use kernel_alloc::frame_alloc::{FrameAllocator, PhysicalLayout};
use kernel_alloc::phys_mapper::OffsetPhysMapper;
use kernel_memory_addresses::{PAGE_SIZE, PhysicalAddress, PhysicalPage};
use kernel_vmem::{FRAME_BYTES, PhysMapper, RootLoader};
use std::cell::Cell;

/// Physical address of the first simulated frame.
pub const RAM_BASE: u32 = 0x0010_0000;

#[repr(align(4096))]
struct Frame([u8; FRAME_BYTES]);

/// Simulated physical memory starting at [`RAM_BASE`].
pub struct TestRam {
    frames: Vec<Frame>,
}

impl TestRam {
    pub fn new(frames: usize) -> Self {
        Self {
            frames: (0..frames).map(|_| Frame([0xCD; FRAME_BYTES])).collect(),
        }
    }

    pub fn mapper(&self) -> OffsetPhysMapper {
        let host = self.frames.as_ptr().expose_provenance();
        OffsetPhysMapper::new(host.wrapping_sub(RAM_BASE as usize))
    }

    pub fn layout(&self) -> PhysicalLayout {
        PhysicalLayout {
            kernel_end: PhysicalAddress::new(RAM_BASE),
            phys_top: self.top(),
        }
    }

    pub fn top(&self) -> PhysicalAddress {
        PhysicalAddress::new(RAM_BASE + self.frames.len() as u32 * PAGE_SIZE)
    }

    /// An allocator over all of this RAM, every frame free.
    pub fn allocator<const N: usize>(&self) -> FrameAllocator<OffsetPhysMapper, N> {
        let frames = unsafe { FrameAllocator::new(self.mapper(), self.layout()) };
        unsafe { frames.register_range(PhysicalAddress::new(RAM_BASE), self.top()) };
        frames
    }
}

/// A zeroed kernel directory taken from `frames`.
pub fn kernel_directory<M: PhysMapper, const N: usize>(
    frames: &FrameAllocator<M, N>,
) -> PhysicalPage {
    let root = frames.allocate_frame().expect("kernel directory");
    unsafe { frames.mapper().table_mut(root) }.zero();
    root
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
