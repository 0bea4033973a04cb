use kernel_sync::{GatedMutex, GatedSpin, LockPhase, Mutex, SpinMutex, SyncOnceCell};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::{panic, thread};

fn bootstrap_mutex<T>(value: T) -> GatedMutex<T> {
    // SAFETY: each test owns its mutex and uses it from one thread until enabled.
    Mutex::from_raw(unsafe { GatedSpin::new_bootstrap() }, value)
}

#[test]
fn bootstrap_phase_does_not_take_the_lock() {
    let m = bootstrap_mutex(0_u32);
    assert_eq!(m.raw().phase(), LockPhase::Bootstrap);

    let g1 = m.lock();
    // gate closed: a second acquire does not spin
    let g2 = m.try_lock();
    assert!(g2.is_some());
    drop(g2);
    drop(g1);
}

#[test]
fn enabling_is_a_one_way_latch() {
    let m = bootstrap_mutex(());
    assert!(m.raw().enable());
    assert!(!m.raw().enable());
    assert_eq!(m.raw().phase(), LockPhase::Operational);

    let g1 = m.try_lock();
    assert!(g1.is_some());
    assert!(m.try_lock().is_none(), "gate open: lock must be exclusive");
    drop(g1);
    assert!(m.try_lock().is_some());
}

#[test]
fn guard_from_bootstrap_survives_the_gate_opening() {
    let m = bootstrap_mutex(5_u8);
    {
        let mut g = m.lock();
        m.raw().enable();
        *g += 1;
    }
    // the guard released cleanly; the lock is free
    assert_eq!(m.try_lock().map(|g| *g), Some(6));
}

#[test]
fn with_lock_works_and_unlocks() {
    let m = SpinMutex::new(String::from("a"));
    let len = m.with_lock(|s| {
        s.push('b');
        s.len()
    });
    assert_eq!(len, 2);
    assert_eq!(m.with_lock(|s| s.clone()), "ab");
}

#[test]
fn contended_increments_are_exact_and_exclusive() {
    let threads = 8;
    let iters = 5_000;

    let lock = Arc::new(bootstrap_mutex(0usize));
    lock.raw().enable();
    let in_cs = Arc::new(AtomicUsize::new(0));
    let start = Arc::new(Barrier::new(threads));

    let mut handles = Vec::with_capacity(threads);
    for _ in 0..threads {
        let lock = Arc::clone(&lock);
        let in_cs = Arc::clone(&in_cs);
        let start = Arc::clone(&start);
        handles.push(thread::spawn(move || {
            start.wait();
            for _ in 0..iters {
                lock.with_lock(|v| {
                    let prev = in_cs.fetch_add(1, Ordering::SeqCst);
                    assert_eq!(prev, 0, "mutual exclusion violated");
                    *v += 1;
                    in_cs.fetch_sub(1, Ordering::SeqCst);
                });
                thread::yield_now();
            }
        }));
    }

    for h in handles {
        h.join().unwrap();
    }

    assert_eq!(lock.with_lock(|v| *v), threads * iters);
}

#[test]
fn lock_is_released_on_panic() {
    let m = Mutex::from_raw(GatedSpin::new_operational(), 0u32);

    let res = panic::catch_unwind(panic::AssertUnwindSafe(|| {
        m.with_lock(|v| {
            *v = 123;
            panic!("boom");
        });
    }));
    assert!(res.is_err(), "expected panic");
    assert_eq!(m.with_lock(|v| *v), 123);
}

#[test]
fn once_cell_is_set_exactly_once() {
    let cell = SyncOnceCell::new();
    assert!(cell.get().is_none());
    assert_eq!(cell.set(7_u32).copied(), Ok(7));
    assert_eq!(cell.set(8), Err(8));
    assert_eq!(cell.get(), Some(&7));
}

#[test]
fn once_cell_has_one_winner_under_contention() {
    let cell = Arc::new(SyncOnceCell::new());
    let start = Arc::new(Barrier::new(8));

    let winners: usize = (0..8)
        .map(|i| {
            let cell = Arc::clone(&cell);
            let start = Arc::clone(&start);
            thread::spawn(move || {
                start.wait();
                usize::from(cell.set(i).is_ok())
            })
        })
        .collect::<Vec<_>>()
        .into_iter()
        .map(|h| h.join().unwrap())
        .sum();

    assert_eq!(winners, 1);
    assert!(cell.get().is_some_and(|v| *v < 8));
}

#[test]
fn gated_mutex_is_sync_for_send_t() {
    fn takes_sync<S: Sync>(_s: &S) {}
    let m = Mutex::from_raw(GatedSpin::new_operational(), 0u8);
    takes_sync(&m);
}
