#![warn(missing_docs)]
#![doc = include_str!("../README.md")]
#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod chain;

mod error;

mod growth;

/// A HashMap implementation using separate chaining.
///
/// This module provides a `HashMap` that wraps the `HashTable` and provides a
/// key-value map interface with configurable hashers and allocators.
pub mod hash_map;

pub mod hash_table;

/// Chain length statistics for inspecting how well a hasher spreads keys.
#[cfg(any(test, feature = "stats"))]
pub mod stats;

#[cfg(test)]
mod test_alloc;

#[cfg(test)]
mod hash_map_proptest;

pub use error::Error;
pub use growth::GrowthPolicy;
pub use hash_map::HashMap;
pub use hash_table::HashTable;

cfg_if::cfg_if! {
    if #[cfg(feature = "foldhash")] {
        /// The hasher builder used by [`HashMap::new`].
        pub type DefaultHashBuilder = foldhash::fast::RandomState;
    } else if #[cfg(feature = "std")] {
        /// The hasher builder used by [`HashMap::new`].
        pub type DefaultHashBuilder = std::hash::RandomState;
    } else {
        /// Placeholder hasher builder when neither `foldhash` nor `std` is
        /// enabled. It cannot be constructed, so maps must be created with an
        /// explicit hasher builder such as [`HashMap::with_hasher`].
        #[derive(Clone, Copy, Debug)]
        pub enum DefaultHashBuilder {}

        /// The [`Hasher`](core::hash::Hasher) of the placeholder
        /// [`DefaultHashBuilder`]. It cannot be constructed.
        #[derive(Clone, Copy, Debug)]
        pub enum DefaultHasher {}

        impl core::hash::BuildHasher for DefaultHashBuilder {
            type Hasher = DefaultHasher;

            fn build_hasher(&self) -> DefaultHasher {
                match *self {}
            }
        }

        impl core::hash::Hasher for DefaultHasher {
            fn finish(&self) -> u64 {
                match *self {}
            }

            fn write(&mut self, _bytes: &[u8]) {
                match *self {}
            }
        }
    }
}
