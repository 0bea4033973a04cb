//! # Physical frame allocator
//!
//! The single source and sink of 4 KiB physical frames. Every other memory
//! consumer (page tables, user segments, stacks, buffers) sits on top of it.
//!
//! ## Free list
//!
//! Frames are tracked in an index-based singly linked list over the managed
//! range `[round_up(kernel_end), phys_top)`. Slot `i` stands for the `i`-th
//! frame of that range. A slot holds either the index of the next free slot,
//! [`NIL`] for the list tail, or [`IN_USE`] while the frame is handed out
//! (or was never registered). Push and pop are O(1) and touch only the head.
//!
//! Keeping the links outside the frames leaves a freed frame entirely
//! poisoned with [`POISON_BYTE`], and makes a second free of the same frame
//! detectable.
//!
//! ## Locking
//!
//! The list sits behind a [`GatedMutex`]. During early boot the gate is
//! closed and the lock is a no-op; [`FrameAllocator::enter_operational`]
//! opens it for good.

use kernel_memory_addresses::{PAGE_SIZE, PhysicalAddress, PhysicalPage, page_round_up};
use kernel_sync::{GatedMutex, GatedSpin, LockPhase, Mutex, SyncOnceCell};
use kernel_vmem::{FrameAlloc, PhysMapper};

/// Byte pattern written over every freed frame.
pub const POISON_BYTE: u8 = 0x01;

const NIL: u32 = u32::MAX;
const IN_USE: u32 = u32::MAX - 1;

/// The physical range the allocator may ever hand out.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PhysicalLayout {
    /// First byte after the kernel's static data.
    pub kernel_end: PhysicalAddress,
    /// First byte past installed physical memory.
    pub phys_top: PhysicalAddress,
}

impl PhysicalLayout {
    /// First frame that may be managed.
    ///
    /// # Panics
    /// If `kernel_end` rounds up past 4 GiB.
    #[must_use]
    pub const fn first_frame(&self) -> PhysicalPage {
        match page_round_up(self.kernel_end.as_u32()) {
            Some(v) => PhysicalPage::from_addr(PhysicalAddress::new(v)),
            None => panic!("kernel end rounds past the address space"),
        }
    }

    /// Number of frames between [`first_frame`](Self::first_frame) and `phys_top`.
    #[must_use]
    pub const fn frame_count(&self) -> usize {
        let first = self.first_frame().base().as_u32();
        let top = self.phys_top.as_u32();
        if top <= first {
            0
        } else {
            ((top - first) / PAGE_SIZE) as usize
        }
    }
}

/// Free list state; only ever touched under the allocator's lock.
struct FreeList<const N: usize> {
    head: u32,
    next: [u32; N],
    free: usize,
}

/// The slot was already on the list.
struct DoubleFree;

impl<const N: usize> FreeList<N> {
    const fn new() -> Self {
        Self {
            head: NIL,
            next: [IN_USE; N],
            free: 0,
        }
    }

    fn push(&mut self, slot: u32) -> Result<(), DoubleFree> {
        let link = &mut self.next[slot as usize];
        if *link != IN_USE {
            return Err(DoubleFree);
        }
        *link = self.head;
        self.head = slot;
        self.free += 1;
        Ok(())
    }

    fn pop(&mut self) -> Option<u32> {
        let slot = self.head;
        if slot == NIL {
            return None;
        }
        let link = &mut self.next[slot as usize];
        self.head = *link;
        *link = IN_USE;
        self.free -= 1;
        Some(slot)
    }
}

/// Physical frame allocator for up to `N` frames, reaching frame contents
/// through the mapper `M`.
///
/// The free list is part of the value, so a kernel-sized allocator lives in
/// a `static` built by [`unconfigured`](Self::unconfigured) and receives its
/// [`PhysicalLayout`] at boot through [`configure`](Self::configure).
pub struct FrameAllocator<M: PhysMapper, const N: usize> {
    list: GatedMutex<FreeList<N>>,
    mapper: M,
    layout: SyncOnceCell<PhysicalLayout>,
}

impl<M: PhysMapper, const N: usize> FrameAllocator<M, N> {
    /// An empty allocator in the bootstrap phase, without a layout.
    ///
    /// # Safety
    /// Until [`enter_operational`](Self::enter_operational) is called the
    /// allocator must only be used from a single execution context.
    #[must_use]
    pub const unsafe fn unconfigured(mapper: M) -> Self {
        // SAFETY: forwarded to the caller.
        unsafe { Self::with_layout(mapper, SyncOnceCell::new()) }
    }

    /// An empty allocator in the bootstrap phase for `layout`.
    ///
    /// # Safety
    /// As for [`unconfigured`](Self::unconfigured).
    ///
    /// # Panics
    /// If the layout spans more than `N` frames.
    #[must_use]
    pub const unsafe fn new(mapper: M, layout: PhysicalLayout) -> Self {
        assert!(
            layout.frame_count() <= N,
            "physical layout exceeds allocator capacity"
        );
        // SAFETY: forwarded to the caller.
        unsafe { Self::with_layout(mapper, SyncOnceCell::with_value(layout)) }
    }

    const unsafe fn with_layout(mapper: M, layout: SyncOnceCell<PhysicalLayout>) -> Self {
        Self {
            // SAFETY: forwarded from the public constructors.
            list: Mutex::from_raw(unsafe { GatedSpin::new_bootstrap() }, FreeList::new()),
            mapper,
            layout,
        }
    }

    /// Fix the managed range of an [`unconfigured`](Self::unconfigured)
    /// allocator.
    ///
    /// # Panics
    /// If a layout is already set or `layout` spans more than `N` frames.
    pub fn configure(&self, layout: PhysicalLayout) {
        assert!(
            layout.frame_count() <= N,
            "physical layout exceeds allocator capacity"
        );
        assert!(
            self.layout.set(layout).is_ok(),
            "frame allocator layout already configured"
        );
    }

    #[inline]
    pub fn is_configured(&self) -> bool {
        self.layout.get().is_some()
    }

    /// # Panics
    /// If no layout has been configured.
    #[inline]
    pub fn layout(&self) -> PhysicalLayout {
        match self.layout.get() {
            Some(layout) => *layout,
            None => panic!("frame allocator used before its layout was configured"),
        }
    }

    #[inline]
    pub const fn mapper(&self) -> &M {
        &self.mapper
    }

    /// Free every whole frame in `[start, end)`, rounding `start` up.
    ///
    /// Returns the number of frames added.
    ///
    /// # Safety
    /// The range must be unused and reachable through the mapper.
    pub unsafe fn register_range(&self, start: PhysicalAddress, end: PhysicalAddress) -> usize {
        let mut count = 0;
        let mut next = page_round_up(start.as_u32());
        while let Some(p) = next {
            match p.checked_add(PAGE_SIZE) {
                Some(frame_end) if frame_end <= end.as_u32() => {}
                _ => break,
            }
            // SAFETY: forwarded to the caller.
            unsafe { self.free_frame(PhysicalAddress::new(p)) };
            count += 1;
            next = p.checked_add(PAGE_SIZE);
        }

        log::info!("frame allocator: registered {count} frames in [{start}, {end})");
        count
    }

    /// Poison the frame at `addr` and push it onto the free list.
    ///
    /// # Safety
    /// Nothing may still reference the frame.
    ///
    /// # Panics
    /// If `addr` is unaligned, below the kernel end, at or above the top of
    /// physical memory, or already free.
    pub unsafe fn free_frame(&self, addr: PhysicalAddress) {
        let layout = self.layout();
        assert!(addr.is_page_aligned(), "free_frame: unaligned {addr}");
        assert!(
            addr.as_u32() >= layout.kernel_end.as_u32(),
            "free_frame: {addr} lies inside the kernel image"
        );
        assert!(
            addr.as_u32() < layout.phys_top.as_u32(),
            "free_frame: {addr} lies beyond physical memory"
        );

        let page = addr.page();

        // SAFETY: the caller gives the frame up; it is within the managed range.
        unsafe { self.mapper.frame_mut(page) }.fill(POISON_BYTE);

        let slot = page.number() - layout.first_frame().number();
        let pushed = self.list.with_lock(|list| list.push(slot));
        assert!(pushed.is_ok(), "free_frame: double free of {addr}");
    }

    /// Pop a frame, or `None` when exhausted. Contents are unspecified.
    pub fn allocate_frame(&self) -> Option<PhysicalPage> {
        let first = self.layout().first_frame();
        let slot = self.list.with_lock(FreeList::pop)?;
        Some(PhysicalPage::from_number(first.number() + slot))
    }

    /// Current length of the free list.
    pub fn free_frames(&self) -> usize {
        self.list.with_lock(|list| list.free)
    }

    #[inline]
    pub fn phase(&self) -> LockPhase {
        self.list.raw().phase()
    }

    /// Latch into the operational phase; the lock is taken from now on.
    ///
    /// Returns `true` if this call performed the transition.
    pub fn enter_operational(&self) -> bool {
        let latched = self.list.raw().enable();
        if latched {
            log::info!(
                "frame allocator: operational, {} frames free",
                self.free_frames()
            );
        }
        latched
    }
}

impl<M: PhysMapper, const N: usize> FrameAlloc for FrameAllocator<M, N> {
    #[inline]
    fn alloc_4k(&self) -> Option<PhysicalPage> {
        self.allocate_frame()
    }

    #[inline]
    unsafe fn free_4k(&self, page: PhysicalPage) {
        unsafe { self.free_frame(page.base()) }
    }
}
