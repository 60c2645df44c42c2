//! Allocators used by the unit tests to observe how the tables use memory.

use core::alloc::Layout;
use core::cell::Cell;
use core::ptr::NonNull;

use allocator_api2::alloc::AllocError;
use allocator_api2::alloc::Allocator;
use allocator_api2::alloc::Global;

/// Forwards to [`Global`] while counting every request.
#[derive(Default)]
pub(crate) struct CountingAlloc {
    allocations: Cell<usize>,
    deallocations: Cell<usize>,
    live_bytes: Cell<usize>,
}

impl CountingAlloc {
    pub(crate) fn total_allocations(&self) -> usize {
        self.allocations.get()
    }

    pub(crate) fn total_deallocations(&self) -> usize {
        self.deallocations.get()
    }

    pub(crate) fn live_allocations(&self) -> usize {
        self.allocations.get() - self.deallocations.get()
    }

    pub(crate) fn live_bytes(&self) -> usize {
        self.live_bytes.get()
    }
}

unsafe impl Allocator for CountingAlloc {
    fn allocate(&self, layout: Layout) -> Result<NonNull<[u8]>, AllocError> {
        let ptr = Global.allocate(layout)?;
        self.allocations.set(self.allocations.get() + 1);
        self.live_bytes.set(self.live_bytes.get() + layout.size());
        Ok(ptr)
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        self.deallocations.set(self.deallocations.get() + 1);
        self.live_bytes.set(self.live_bytes.get() - layout.size());
        // SAFETY: Every pointer handed out by this allocator came from `Global`.
        unsafe { Global.deallocate(ptr, layout) }
    }
}

/// Serves a fixed number of allocations, then refuses every request.
pub(crate) struct FailingAlloc {
    remaining: Cell<usize>,
}

impl FailingAlloc {
    pub(crate) fn new(budget: usize) -> Self {
        Self {
            remaining: Cell::new(budget),
        }
    }

    pub(crate) fn refill(&self, budget: usize) {
        self.remaining.set(budget);
    }
}

unsafe impl Allocator for FailingAlloc {
    fn allocate(&self, layout: Layout) -> Result<NonNull<[u8]>, AllocError> {
        match self.remaining.get() {
            0 => Err(AllocError),
            n => {
                self.remaining.set(n - 1);
                Global.allocate(layout)
            }
        }
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        // SAFETY: Every pointer handed out by this allocator came from `Global`.
        unsafe { Global.deallocate(ptr, layout) }
    }
}
