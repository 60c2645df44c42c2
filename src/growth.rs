use crate::Error;

/// Decides how large the bucket array becomes when a table grows.
///
/// A table grows as the first step of an insertion whenever it holds at least
/// as many entries as it has buckets. The new bucket count is
/// `max(min_buckets, factor * len)`, so the default policy starts at 10
/// buckets and then doubles the entry count on every growth.
///
/// # Examples
///
/// ```rust
/// use chain_hash::GrowthPolicy;
///
/// let policy = GrowthPolicy::default();
/// assert_eq!(policy.next_capacity(0), Ok(10));
/// assert_eq!(policy.next_capacity(10), Ok(20));
///
/// let small = GrowthPolicy::new(2, 3);
/// assert_eq!(small.next_capacity(1), Ok(3));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GrowthPolicy {
    min_buckets: usize,
    factor: usize,
}

impl GrowthPolicy {
    /// Bucket count of the first allocated table under the default policy.
    pub const DEFAULT_MIN_BUCKETS: usize = 10;

    /// Multiplier applied to the entry count under the default policy.
    pub const DEFAULT_FACTOR: usize = 2;

    /// Creates a policy with the given bucket floor and growth factor.
    ///
    /// A floor of zero is raised to one so that the first growth always
    /// produces a table that can hold an entry.
    pub const fn new(min_buckets: usize, factor: usize) -> Self {
        Self {
            min_buckets: if min_buckets == 0 { 1 } else { min_buckets },
            factor,
        }
    }

    /// The smallest bucket count this policy will ever produce.
    pub const fn min_buckets(&self) -> usize {
        self.min_buckets
    }

    /// The multiplier applied to the entry count.
    pub const fn factor(&self) -> usize {
        self.factor
    }

    /// Computes the bucket count for a table that currently holds `len`
    /// entries.
    pub fn next_capacity(&self, len: usize) -> Result<usize, Error> {
        let scaled = len
            .checked_mul(self.factor)
            .ok_or(Error::CapacityOverflow)?;
        Ok(scaled.max(self.min_buckets))
    }
}

impl Default for GrowthPolicy {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MIN_BUCKETS, Self::DEFAULT_FACTOR)
    }
}
