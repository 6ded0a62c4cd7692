// Argument-vector release checked against a counting allocator
use recovery_bridge::{freeargv, release_argv, OwnedArgv};
use std::alloc::{GlobalAlloc, Layout, System};
use std::cell::Cell;
use std::mem::size_of;
use std::os::raw::c_char;

struct CountingAllocator;

#[global_allocator]
static ALLOCATOR: CountingAllocator = CountingAllocator;

// Per-thread so the test harness running other tests cannot skew the counts
thread_local! {
    static ALLOCS: Cell<usize> = const { Cell::new(0) };
    static FREES: Cell<usize> = const { Cell::new(0) };
    static LIVE_BYTES: Cell<isize> = const { Cell::new(0) };
}

fn bump_usize(key: &'static std::thread::LocalKey<Cell<usize>>) {
    let _ = key.try_with(|c| c.set(c.get() + 1));
}

fn add_live(delta: isize) {
    let _ = LIVE_BYTES.try_with(|c| c.set(c.get() + delta));
}

unsafe impl GlobalAlloc for CountingAllocator {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        let ptr = System.alloc(layout);
        if !ptr.is_null() {
            bump_usize(&ALLOCS);
            add_live(layout.size() as isize);
        }
        ptr
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        System.dealloc(ptr, layout);
        bump_usize(&FREES);
        add_live(-(layout.size() as isize));
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        let new_ptr = System.realloc(ptr, layout, new_size);
        if !new_ptr.is_null() {
            add_live(new_size as isize - layout.size() as isize);
        }
        new_ptr
    }
}

#[derive(Debug, Clone, Copy)]
struct Snapshot {
    allocs: usize,
    frees: usize,
    live_bytes: isize,
}

impl Snapshot {
    fn take() -> Self {
        Self {
            allocs: ALLOCS.with(Cell::get),
            frees: FREES.with(Cell::get),
            live_bytes: LIVE_BYTES.with(Cell::get),
        }
    }

    fn live_allocations(&self) -> isize {
        self.allocs as isize - self.frees as isize
    }
}

#[test]
fn three_strings_and_array_freed_once_each() {
    let baseline = Snapshot::take();

    let (argc, argv) = OwnedArgv::new(["--flag", "value", "extra"]).unwrap().into_raw();
    let built = Snapshot::take();
    assert_eq!(built.live_allocations() - baseline.live_allocations(), 4);

    unsafe { release_argv(argc as usize, argv) };
    let released = Snapshot::take();

    assert_eq!(released.frees - built.frees, 4);
    assert_eq!(released.allocs, built.allocs);

    let strings = "--flag".len() + 1 + "value".len() + 1 + "extra".len() + 1;
    let array = 3 * size_of::<*mut c_char>();
    assert_eq!(built.live_bytes - released.live_bytes, (strings + array) as isize);

    assert_eq!(released.live_allocations(), baseline.live_allocations());
    assert_eq!(released.live_bytes, baseline.live_bytes);
}

#[test]
fn release_of_null_vector_frees_nothing() {
    let before = Snapshot::take();
    unsafe {
        release_argv(0, std::ptr::null_mut());
        freeargv(0, std::ptr::null_mut());
    }
    let after = Snapshot::take();

    assert_eq!(after.frees, before.frees);
    assert_eq!(after.allocs, before.allocs);
}

#[test]
fn dropping_owned_vector_releases_everything() {
    let baseline = Snapshot::take();
    {
        let argv = OwnedArgv::new((0..64).map(|i| format!("arg-{}", i))).unwrap();
        assert_eq!(argv.len(), 64);
    }
    let after = Snapshot::take();

    assert_eq!(after.live_allocations(), baseline.live_allocations());
    assert_eq!(after.live_bytes, baseline.live_bytes);
}

#[test]
fn c_entry_point_releases_vector() {
    let (argc, argv) = OwnedArgv::new(["engine", "-a", "3"]).unwrap().into_raw();
    let built = Snapshot::take();

    unsafe { freeargv(argc, argv) };
    let released = Snapshot::take();

    assert_eq!(released.frees - built.frees, 4);
}

#[test]
fn rejected_release_leaves_vector_intact() {
    let (argc, argv) = OwnedArgv::new(["keep", "me"]).unwrap().into_raw();
    let before = Snapshot::take();

    // Refused before anything is touched; only the error report itself may
    // allocate, and it is gone again by the time the call returns
    unsafe {
        freeargv(-1, argv);
        freeargv(argc, std::ptr::null_mut());
    }
    let after = Snapshot::take();
    assert_eq!(after.live_allocations(), before.live_allocations());
    assert_eq!(after.live_bytes, before.live_bytes);

    let back = unsafe { OwnedArgv::from_raw(argc, argv) }.unwrap();
    assert_eq!(back.to_strings(), vec!["keep", "me"]);

    let frees = Snapshot::take().frees;
    drop(back);
    let released = Snapshot::take();
    assert_eq!(released.frees - frees, 3);
    assert_eq!(released.live_allocations(), before.live_allocations() - 3);
}
