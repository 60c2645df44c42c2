use core::alloc::Layout;
use core::ptr::NonNull;

use allocator_api2::alloc::Allocator;

use crate::Error;

/// Link to the next node of a chain, or to the head of a bucket's chain.
pub(crate) type Link<V> = Option<NonNull<Node<V>>>;

/// One stored value plus the link to its successor in the same bucket.
///
/// Every node is owned by exactly one predecessor: either the bucket slot
/// that holds it as a head, or the node whose `next` points at it.
pub(crate) struct Node<V> {
    pub(crate) value: V,
    pub(crate) next: Link<V>,
}

impl<V> Node<V> {
    pub(crate) fn new(value: V) -> Self {
        Self { value, next: None }
    }
}

/// Allocates room for a `T` through `alloc` and moves `value` into it.
pub(crate) fn construct<T, A: Allocator>(alloc: &A, value: T) -> Result<NonNull<T>, Error> {
    let layout = Layout::new::<T>();
    let ptr = alloc
        .allocate(layout)
        .map_err(|_| Error::AllocFailed { layout })?
        .cast::<T>();

    // SAFETY: `ptr` was just returned by the allocator for the layout of `T`,
    // so it is valid for a write of one `T` and suitably aligned.
    unsafe { ptr.as_ptr().write(value) };
    Ok(ptr)
}

/// Moves the `T` out of `ptr` and returns its memory to `alloc`.
///
/// # Safety
///
/// `ptr` must have been produced by [`construct`] with the same allocator (or
/// one that can free its memory), must still hold an initialized `T`, and
/// must not be used again after this call.
pub(crate) unsafe fn destruct<T, A: Allocator>(alloc: &A, ptr: NonNull<T>) -> T {
    // SAFETY: Caller guarantees `ptr` holds an initialized `T` allocated by
    // `alloc` with `Layout::new::<T>()`.
    unsafe {
        let value = ptr.as_ptr().read();
        alloc.deallocate(ptr.cast(), Layout::new::<T>());
        value
    }
}

/// The bucket array: `len` chain heads in one allocation.
///
/// `Buckets` does not free itself or the nodes it points to; the owning table
/// releases both through its allocator.
pub(crate) struct Buckets<V> {
    ptr: NonNull<Link<V>>,
    len: usize,
    layout: Layout,
}

impl<V> Buckets<V> {
    /// A bucket array with zero slots that owns no memory.
    pub(crate) const fn empty() -> Self {
        Self {
            ptr: NonNull::dangling(),
            len: 0,
            layout: Layout::new::<()>(),
        }
    }

    /// Allocates `len` empty chain heads through `alloc`.
    pub(crate) fn allocate_in<A: Allocator>(alloc: &A, len: usize) -> Result<Self, Error> {
        if len == 0 {
            return Ok(Self::empty());
        }

        let layout = Layout::array::<Link<V>>(len).map_err(|_| Error::CapacityOverflow)?;
        let ptr = alloc
            .allocate(layout)
            .map_err(|_| Error::AllocFailed { layout })?
            .cast::<Link<V>>();

        for index in 0..len {
            // SAFETY: The allocation holds `len` slots of `Link<V>`, and
            // `index < len`.
            unsafe { ptr.as_ptr().add(index).write(None) };
        }

        Ok(Self { ptr, len, layout })
    }

    /// Returns the bucket array's memory to `alloc`. Any nodes still linked
    /// from the slots are not touched.
    ///
    /// # Safety
    ///
    /// `alloc` must be able to free memory handed out by the allocator that
    /// created this array.
    pub(crate) unsafe fn deallocate_in<A: Allocator>(self, alloc: &A) {
        if self.layout.size() != 0 {
            // SAFETY: A non-zero layout means `ptr` came from `allocate_in`
            // with exactly this layout.
            unsafe { alloc.deallocate(self.ptr.cast(), self.layout) };
        }
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    /// Size in bytes of the bucket array allocation.
    #[cfg(any(test, feature = "stats"))]
    pub(crate) fn allocated_bytes(&self) -> usize {
        self.layout.size()
    }

    #[inline]
    pub(crate) fn as_slice(&self) -> &[Link<V>] {
        // SAFETY: `ptr` is either dangling with `len == 0`, or points at `len`
        // initialized slots.
        unsafe { core::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    #[inline]
    pub(crate) fn as_mut_slice(&mut self) -> &mut [Link<V>] {
        // SAFETY: As in `as_slice`, and `&mut self` gives unique access.
        unsafe { core::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }
}
