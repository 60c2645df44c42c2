use alloc::vec::Vec;

/// A snapshot of how entries are spread across a table's chains.
///
/// Produced by [`HashTable::chain_stats`] and [`HashMap::chain_stats`].
///
/// [`HashTable::chain_stats`]: crate::HashTable::chain_stats
/// [`HashMap::chain_stats`]: crate::HashMap::chain_stats
#[derive(Debug, Clone, PartialEq)]
pub struct ChainStats {
    /// Number of live entries.
    pub len: usize,
    /// Number of buckets in the current table.
    pub buckets: usize,
    /// Buckets whose chain is empty.
    pub empty_buckets: usize,
    /// Length of the longest chain.
    pub longest_chain: usize,
    /// `histogram[n]` is the number of buckets holding exactly `n` entries.
    pub histogram: Vec<usize>,
    /// Entries per bucket (len / buckets).
    pub load_factor: f64,
    /// Bytes held by the bucket array.
    pub bucket_bytes: usize,
    /// Bytes held by chain nodes.
    pub node_bytes: usize,
}

impl ChainStats {
    /// Average number of nodes visited by a successful lookup, assuming every
    /// entry is looked up equally often.
    pub fn mean_successful_probe(&self) -> f64 {
        if self.len == 0 {
            return 0.0;
        }

        // A chain of length n costs 1 + 2 + ... + n over its entries.
        let total: usize = self
            .histogram
            .iter()
            .enumerate()
            .map(|(length, &count)| count * length * (length + 1) / 2)
            .sum();
        total as f64 / self.len as f64
    }

    /// Pretty-print the statistics, including a horizontal histogram of chain
    /// lengths.
    #[cfg(feature = "std")]
    pub fn print(&self) {
        println!("=== Chain Statistics ===");
        println!(
            "Population: {} entries in {} buckets ({:.2} load factor)",
            self.len, self.buckets, self.load_factor
        );
        println!(
            "Empty buckets: {} ({:.2}%)",
            self.empty_buckets,
            if self.buckets == 0 {
                0.0
            } else {
                self.empty_buckets as f64 / self.buckets as f64 * 100.0
            }
        );
        println!("Longest chain: {}", self.longest_chain);
        println!(
            "Mean nodes visited per hit: {:.2}",
            self.mean_successful_probe()
        );
        println!(
            "Memory: {} bytes of buckets, {} bytes of nodes",
            self.bucket_bytes, self.node_bytes
        );

        let max = self.histogram.iter().copied().max().unwrap_or(0);
        if max == 0 {
            println!("chain histogram: empty");
            return;
        }

        let max_bar = 60usize;
        for (length, &count) in self.histogram.iter().enumerate() {
            let width = (count * max_bar).div_ceil(max);
            println!("{:>3} | {} ({})", length, "█".repeat(width), count);
        }
    }
}
