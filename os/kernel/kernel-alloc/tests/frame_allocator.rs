mod common;

use common::{RAM_BASE, TestRam};
use kernel_alloc::frame_alloc::POISON_BYTE;
use kernel_memory_addresses::{PAGE_SIZE, PhysicalAddress};
use kernel_sync::LockPhase;
use kernel_vmem::{FrameAlloc, PhysMapper};
use std::collections::HashSet;
use std::sync::{Arc, Barrier, Mutex};
use std::thread;

#[test]
fn two_phase_seeding() {
    let ram = TestRam::new(32);
    let frames = unsafe {
        kernel_alloc::frame_alloc::FrameAllocator::<_, 32>::new(ram.mapper(), ram.layout())
    };

    // early pool: the first eight frames only
    let early_end = PhysicalAddress::new(RAM_BASE + 8 * PAGE_SIZE);
    assert_eq!(unsafe { frames.register_range(PhysicalAddress::new(RAM_BASE), early_end) }, 8);
    assert_eq!(frames.phase(), LockPhase::Bootstrap);

    assert_eq!(unsafe { frames.register_range(early_end, ram.top()) }, 24);
    assert!(frames.enter_operational());
    assert_eq!(frames.phase(), LockPhase::Operational);
    assert_eq!(frames.free_frames(), 32);
}

#[test]
fn frames_stay_within_registered_range() {
    let ram = TestRam::new(16);
    let frames = ram.allocator::<16>();

    let mut seen = HashSet::new();
    while let Some(page) = frames.alloc_4k() {
        let pa = page.base().as_u32();
        assert!(pa >= RAM_BASE && pa < ram.top().as_u32());
        assert!(page.base().is_page_aligned());
        assert!(seen.insert(page), "{page} handed out twice");
    }
    assert_eq!(seen.len(), 16);
}

#[test]
fn free_through_trait_poisons() {
    let ram = TestRam::new(4);
    let frames = ram.allocator::<4>();
    let page = frames.alloc_4k().unwrap();
    let bytes = unsafe { frames.mapper().frame_mut(page) };
    bytes.fill(0);

    unsafe { frames.free_4k(page) };
    let bytes = unsafe { frames.mapper().frame_mut(page) };
    assert!(bytes.iter().all(|&b| b == POISON_BYTE));
}

#[test]
fn concurrent_allocations_never_share_a_frame() {
    const FRAMES: usize = 256;
    const THREADS: usize = 8;
    const HELD: usize = 24;
    const ROUNDS: usize = 200;

    let ram = TestRam::new(FRAMES);
    let frames = Arc::new(ram.allocator::<FRAMES>());
    frames.enter_operational();

    let start = Arc::new(Barrier::new(THREADS));
    let held = Arc::new(Mutex::new(Vec::new()));

    let mut handles = Vec::with_capacity(THREADS);
    for _ in 0..THREADS {
        let frames = Arc::clone(&frames);
        let start = Arc::clone(&start);
        let held = Arc::clone(&held);
        handles.push(thread::spawn(move || {
            start.wait();
            for _ in 0..ROUNDS {
                let page = frames.allocate_frame().expect("pool sized for all threads");
                unsafe { frames.free_frame(page.base()) };
            }
            let mine: Vec<_> = (0..HELD)
                .map(|_| frames.allocate_frame().expect("pool sized for all threads"))
                .collect();
            held.lock().unwrap().extend(mine);
        }));
    }
    for h in handles {
        h.join().unwrap();
    }

    let held = held.lock().unwrap();
    let unique: HashSet<_> = held.iter().copied().collect();
    assert_eq!(unique.len(), THREADS * HELD);
    assert_eq!(frames.free_frames(), FRAMES - THREADS * HELD);
}
