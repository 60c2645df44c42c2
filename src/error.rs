use core::alloc::Layout;

/// Errors reported by the fallible operations of [`HashTable`] and
/// [`HashMap`].
///
/// Key absence is never an error; lookups and removals report it with
/// `None`.
///
/// [`HashTable`]: crate::HashTable
/// [`HashMap`]: crate::HashMap
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// The allocator could not satisfy a request.
    #[error("memory allocation of {} bytes failed", .layout.size())]
    AllocFailed {
        /// The layout that was requested from the allocator.
        layout: Layout,
    },

    /// The requested bucket count does not fit in the address space.
    #[error("capacity overflow")]
    CapacityOverflow,

    /// The table reports live entries but none of its buckets hold any.
    #[error("hash table corrupted: {len} entries recorded but every bucket is empty")]
    Corrupted {
        /// The entry count the table believed it held.
        len: usize,
    },
}

impl Error {
    /// Escalates the error the way the infallible operations do: allocation
    /// failures go to the global allocation error handler, everything else
    /// panics.
    pub(crate) fn fatal(self) -> ! {
        match self {
            Error::AllocFailed { layout } => alloc::alloc::handle_alloc_error(layout),
            other => panic!("{other}"),
        }
    }
}
