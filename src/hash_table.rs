use core::fmt::Debug;
use core::iter::FusedIterator;
use core::marker::PhantomData;

use allocator_api2::alloc::Allocator;
use allocator_api2::alloc::Global;

use crate::Error;
use crate::GrowthPolicy;
use crate::chain::Buckets;
use crate::chain::Link;
use crate::chain::Node;
use crate::chain::construct;
use crate::chain::destruct;

/// Maps a hash to its bucket. The hash is truncated to 32 bits before the
/// modulo, so tables never spread entries over more than `u32::MAX` buckets.
#[inline(always)]
fn bucket_index(hash: u64, buckets: usize) -> usize {
    (hash as u32 as usize) % buckets
}

fn chain_len<V>(mut link: Link<V>) -> usize {
    let mut len = 0;
    while let Some(node) = link {
        len += 1;
        // SAFETY: Callers only pass heads of chains owned by a live table.
        link = unsafe { node.as_ref() }.next;
    }
    len
}

/// A separately-chained hash table.
///
/// `HashTable<V, A>` stores values of type `V` in singly-linked chains hanging
/// off an array of buckets. Every node and every bucket array is obtained from
/// the allocator `A`, which may be a borrowed allocator (`&MyAllocator`) so
/// that the borrow checker guarantees it outlives the table.
///
/// Like the raw tables of other hash map crates, this type does not hash
/// anything by itself: callers supply the `u64` hash of the value they are
/// inserting or looking for, an equality predicate, and on insertion a
/// function that rehashes stored values when the table grows.
///
/// Duplicates are allowed. A new value is pushed onto the head of its chain,
/// so lookups and removals see the most recently inserted match first, until
/// the next growth reverses the order within each chain.
///
/// ## Example
///
/// ```rust
/// # use core::hash::Hash;
/// # use core::hash::Hasher;
/// #
/// # use chain_hash::HashTable;
/// # use siphasher::sip::SipHasher;
/// #
/// # fn hash_id(id: u64) -> u64 {
/// #     let mut hasher = SipHasher::new();
/// #     id.hash(&mut hasher);
/// #     hasher.finish()
/// # }
/// #
/// #[derive(Debug, PartialEq)]
/// struct Person {
///     id: u64,
///     name: String,
/// }
///
/// let mut table = HashTable::new();
/// table.insert(
///     hash_id(123),
///     Person {
///         id: 123,
///         name: "Alice".to_string(),
///     },
///     |p| hash_id(p.id),
/// );
///
/// let alice = table.find(hash_id(123), |p| p.id == 123).unwrap();
/// assert_eq!(alice.name, "Alice");
/// ```
pub struct HashTable<V, A: Allocator = Global> {
    buckets: Buckets<V>,
    len: usize,
    policy: GrowthPolicy,
    alloc: A,

    _phantom: PhantomData<V>,
}

// SAFETY: The table exclusively owns every node it links to, so moving it to
// another thread moves the `V`s with it.
unsafe impl<V: Send, A: Allocator + Send> Send for HashTable<V, A> {}

// SAFETY: Shared access only hands out `&V` and `&A`.
unsafe impl<V: Sync, A: Allocator + Sync> Sync for HashTable<V, A> {}

impl<V, A: Allocator> Debug for HashTable<V, A> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        struct ChainLengths<'a, V>(&'a [Link<V>]);

        impl<V> Debug for ChainLengths<'_, V> {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.debug_list()
                    .entries(self.0.iter().map(|head| chain_len(*head)))
                    .finish()
            }
        }

        f.debug_struct("HashTable")
            .field("len", &self.len)
            .field("capacity", &self.buckets.len())
            .field("policy", &self.policy)
            .field("chains", &ChainLengths(self.buckets.as_slice()))
            .finish()
    }
}

impl<V, A: Allocator> Drop for HashTable<V, A> {
    fn drop(&mut self) {
        self.clear();
        let buckets = core::mem::replace(&mut self.buckets, Buckets::empty());
        // SAFETY: The bucket array was allocated with `self.alloc`.
        unsafe { buckets.deallocate_in(&self.alloc) };
    }
}

impl<V> HashTable<V> {
    /// Creates an empty table backed by the global allocator.
    ///
    /// No memory is allocated until the first insertion.
    pub const fn new() -> Self {
        Self::new_in(Global)
    }

    /// Creates an empty table backed by the global allocator that grows
    /// according to `policy`.
    pub const fn with_policy(policy: GrowthPolicy) -> Self {
        Self::with_policy_in(policy, Global)
    }
}

impl<V, A: Allocator + Default> Default for HashTable<V, A> {
    fn default() -> Self {
        Self::new_in(A::default())
    }
}

impl<V, A: Allocator> HashTable<V, A> {
    /// Creates an empty table that allocates through `alloc`.
    ///
    /// No memory is allocated until the first insertion.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use allocator_api2::alloc::Global;
    /// use chain_hash::HashTable;
    ///
    /// let table: HashTable<u32, _> = HashTable::new_in(&Global);
    /// assert_eq!(table.capacity(), 0);
    /// assert!(table.is_empty());
    /// ```
    pub const fn new_in(alloc: A) -> Self {
        Self::with_policy_in(
            GrowthPolicy::new(
                GrowthPolicy::DEFAULT_MIN_BUCKETS,
                GrowthPolicy::DEFAULT_FACTOR,
            ),
            alloc,
        )
    }

    /// Creates an empty table that allocates through `alloc` and grows
    /// according to `policy`.
    pub const fn with_policy_in(policy: GrowthPolicy, alloc: A) -> Self {
        Self {
            buckets: Buckets::empty(),
            len: 0,
            policy,
            alloc,
            _phantom: PhantomData,
        }
    }

    /// Returns the number of values in the table.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the table holds no values.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the number of buckets in the table.
    ///
    /// The table grows on the next insertion once `len() >= capacity()`.
    pub fn capacity(&self) -> usize {
        self.buckets.len()
    }

    /// Returns the growth policy of the table.
    pub fn policy(&self) -> GrowthPolicy {
        self.policy
    }

    /// Returns a reference to the table's allocator.
    pub fn allocator(&self) -> &A {
        &self.alloc
    }

    /// Inserts `value` at the head of the chain selected by `hash` and returns
    /// a mutable reference to it.
    ///
    /// `hasher` must return, for every stored value, the same hash that value
    /// was inserted with. It is only called when the table grows.
    ///
    /// No duplicate check is performed.
    ///
    /// # Panics
    ///
    /// Aborts through [`handle_alloc_error`] if the allocator fails, and panics
    /// if the new bucket count overflows. Use [`try_insert`] to handle these
    /// cases instead.
    ///
    /// [`handle_alloc_error`]: alloc::alloc::handle_alloc_error
    /// [`try_insert`]: HashTable::try_insert
    pub fn insert(&mut self, hash: u64, value: V, hasher: impl Fn(&V) -> u64) -> &mut V {
        match self.try_insert(hash, value, hasher) {
            Ok(value) => value,
            Err(err) => err.fatal(),
        }
    }

    /// Fallible form of [`insert`](HashTable::insert).
    ///
    /// On error the table is left unchanged apart from possibly having grown,
    /// and `value` is dropped.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use chain_hash::HashTable;
    ///
    /// let mut table = HashTable::new();
    /// let value = table.try_insert(42, "answer", |_| 42).unwrap();
    /// assert_eq!(*value, "answer");
    /// assert_eq!(table.capacity(), 10);
    /// ```
    pub fn try_insert(
        &mut self,
        hash: u64,
        value: V,
        hasher: impl Fn(&V) -> u64,
    ) -> Result<&mut V, Error> {
        if self.len >= self.buckets.len() {
            self.try_rehash(&hasher)?;
        }

        let node = construct(&self.alloc, Node::new(value))?;
        let index = bucket_index(hash, self.buckets.len());
        let head = &mut self.buckets.as_mut_slice()[index];
        // SAFETY: `node` was just allocated and nothing else refers to it yet.
        unsafe { (*node.as_ptr()).next = head.take() };
        *head = Some(node);
        self.len += 1;

        // SAFETY: The node is now owned by this table and stays alive for as
        // long as the table is mutably borrowed.
        Ok(unsafe { &mut (*node.as_ptr()).value })
    }

    /// Returns the first value in the chain for `hash` that satisfies `eq`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use chain_hash::HashTable;
    ///
    /// let mut table = HashTable::new();
    /// table.insert(7, (7, "first"), |&(k, _)| k);
    /// table.insert(7, (7, "second"), |&(k, _)| k);
    ///
    /// // The most recent insertion shadows the older one.
    /// assert_eq!(table.find(7, |&(k, _)| k == 7), Some(&(7, "second")));
    /// assert_eq!(table.find(8, |&(k, _)| k == 8), None);
    /// ```
    pub fn find(&self, hash: u64, eq: impl Fn(&V) -> bool) -> Option<&V> {
        if self.len == 0 {
            return None;
        }

        let mut link = self.buckets.as_slice()[bucket_index(hash, self.buckets.len())];
        while let Some(node) = link {
            // SAFETY: Linked nodes are live and owned by this table, which is
            // borrowed for the lifetime of the returned reference.
            let node = unsafe { node.as_ref() };
            if eq(&node.value) {
                return Some(&node.value);
            }
            link = node.next;
        }

        None
    }

    /// Returns a mutable reference to the first value in the chain for `hash`
    /// that satisfies `eq`.
    pub fn find_mut(&mut self, hash: u64, eq: impl Fn(&V) -> bool) -> Option<&mut V> {
        if self.len == 0 {
            return None;
        }

        let mut link = self.buckets.as_slice()[bucket_index(hash, self.buckets.len())];
        while let Some(node) = link {
            // SAFETY: Linked nodes are live and owned by this table, which is
            // mutably borrowed for the lifetime of the returned reference.
            let node = unsafe { &mut *node.as_ptr() };
            if eq(&node.value) {
                return Some(&mut node.value);
            }
            link = node.next;
        }

        None
    }

    /// Unlinks the first value in the chain for `hash` that satisfies `eq`,
    /// frees its node, and returns the value.
    ///
    /// Removal never shrinks the bucket array.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use chain_hash::HashTable;
    ///
    /// let mut table = HashTable::new();
    /// table.insert(1, "one", |_| 1);
    /// assert_eq!(table.remove(1, |v| *v == "one"), Some("one"));
    /// assert_eq!(table.remove(1, |v| *v == "one"), None);
    /// assert_eq!(table.capacity(), 10);
    /// ```
    pub fn remove(&mut self, hash: u64, eq: impl Fn(&V) -> bool) -> Option<V> {
        if self.len == 0 {
            return None;
        }

        let index = bucket_index(hash, self.buckets.len());
        let mut link: *mut Link<V> = &mut self.buckets.as_mut_slice()[index];

        // SAFETY: `link` always points either at a bucket slot or at the `next`
        // field of a live node of this table, and `&mut self` guarantees no
        // other access while we relink.
        unsafe {
            while let Some(node) = *link {
                if eq(&(*node.as_ptr()).value) {
                    *link = (*node.as_ptr()).next;
                    self.len -= 1;
                    return Some(destruct(&self.alloc, node).value);
                }
                link = &raw mut (*node.as_ptr()).next;
            }
        }

        None
    }

    /// Destroys every value, keeping the bucket array.
    pub fn clear(&mut self) {
        for slot in self.buckets.as_mut_slice() {
            let mut link = slot.take();
            while let Some(node) = link {
                // SAFETY: The node was detached from the table above (its
                // predecessor is gone), and was allocated with `self.alloc`.
                let Node { value, next } = unsafe { destruct(&self.alloc, node) };
                link = next;
                drop(value);
            }
        }
        self.len = 0;
    }

    /// Returns an iterator over the values in the table.
    ///
    /// The iterator walks bucket 0's chain head to tail, then bucket 1's, and
    /// so on. The order is otherwise unspecified and changes when the table
    /// grows.
    ///
    /// # Panics
    ///
    /// Panics if the table records live values but every bucket is empty,
    /// which can only happen if its memory was corrupted. See
    /// [`try_iter`](HashTable::try_iter).
    pub fn iter(&self) -> Iter<'_, V> {
        match self.try_iter() {
            Ok(iter) => iter,
            Err(err) => err.fatal(),
        }
    }

    /// Returns an iterator over the values in the table, or
    /// [`Error::Corrupted`] if the table records live values but no bucket
    /// holds any.
    pub fn try_iter(&self) -> Result<Iter<'_, V>, Error> {
        let (next_bucket, node) = self.first_node()?;
        Ok(Iter {
            buckets: self.buckets.as_slice(),
            next_bucket,
            node,
            remaining: self.len,
            _phantom: PhantomData,
        })
    }

    /// Returns an iterator over mutable references to the values in the
    /// table.
    ///
    /// Mutating a value must not change its hash.
    ///
    /// # Panics
    ///
    /// Panics under the same conditions as [`iter`](HashTable::iter).
    pub fn iter_mut(&mut self) -> IterMut<'_, V> {
        let (next_bucket, node) = match self.first_node() {
            Ok(start) => start,
            Err(err) => err.fatal(),
        };
        IterMut {
            buckets: self.buckets.as_slice(),
            next_bucket,
            node,
            remaining: self.len,
            _phantom: PhantomData,
        }
    }

    /// Returns an iterator that removes and yields every value.
    ///
    /// The bucket array is kept. Values not consumed before the iterator is
    /// dropped are destroyed.
    pub fn drain(&mut self) -> Drain<'_, V, A> {
        Drain {
            table: self,
            bucket: 0,
        }
    }

    /// Locates the start position of an iteration: the head of the first
    /// non-empty bucket, and the bucket to resume scanning from afterwards.
    fn first_node(&self) -> Result<(usize, Link<V>), Error> {
        if self.len == 0 {
            return Ok((self.buckets.len(), None));
        }

        for (index, head) in self.buckets.as_slice().iter().enumerate() {
            if head.is_some() {
                return Ok((index + 1, *head));
            }
        }

        log::error!(
            "hash table corrupted: {} entries recorded but all {} buckets are empty",
            self.len,
            self.buckets.len()
        );
        Err(Error::Corrupted { len: self.len })
    }

    /// Replaces the bucket array with one sized by the growth policy and
    /// relinks every node into it. Nodes are reused, not reallocated.
    ///
    /// Each old chain is walked head to tail and every node is pushed onto the
    /// head of its new chain, so nodes that stay together end up in reverse
    /// order. A panicking `hasher` leaks the nodes not yet relinked and leaves
    /// `len` overstated.
    fn try_rehash(&mut self, hasher: &impl Fn(&V) -> u64) -> Result<(), Error> {
        let new_capacity = self.policy.next_capacity(self.len)?;
        let mut new_buckets = Buckets::allocate_in(&self.alloc, new_capacity)?;

        let new_slots = new_buckets.as_mut_slice();
        for slot in self.buckets.as_mut_slice() {
            let mut link = slot.take();
            while let Some(node) = link {
                // SAFETY: Every node reachable from the old buckets is live and
                // owned by this table; `&mut self` gives exclusive access.
                let node_ref = unsafe { &mut *node.as_ptr() };
                link = node_ref.next;

                let index = bucket_index(hasher(&node_ref.value), new_capacity);
                node_ref.next = new_slots[index];
                new_slots[index] = Some(node);
            }
        }

        let old_buckets = core::mem::replace(&mut self.buckets, new_buckets);
        let old_capacity = old_buckets.len();
        // SAFETY: The old bucket array was allocated with `self.alloc`, and
        // every node it referenced now hangs off the new array.
        unsafe { old_buckets.deallocate_in(&self.alloc) };

        log::trace!(
            "rehashed {} entries from {} to {} buckets",
            self.len,
            old_capacity,
            new_capacity
        );
        Ok(())
    }

    /// Computes chain length statistics for the current table state.
    #[cfg(any(test, feature = "stats"))]
    pub fn chain_stats(&self) -> crate::stats::ChainStats {
        let mut histogram = alloc::vec::Vec::new();
        let mut empty_buckets = 0;
        let mut longest_chain = 0;

        for head in self.buckets.as_slice() {
            let len = chain_len(*head);
            if histogram.len() <= len {
                histogram.resize(len + 1, 0);
            }
            histogram[len] += 1;
            if len == 0 {
                empty_buckets += 1;
            }
            longest_chain = longest_chain.max(len);
        }

        crate::stats::ChainStats {
            len: self.len,
            buckets: self.buckets.len(),
            empty_buckets,
            longest_chain,
            histogram,
            load_factor: if self.buckets.len() == 0 {
                0.0
            } else {
                self.len as f64 / self.buckets.len() as f64
            },
            bucket_bytes: self.buckets.allocated_bytes(),
            node_bytes: self.len * core::mem::size_of::<Node<V>>(),
        }
    }

    /// Checks that every node sits in the bucket its hash selects and that
    /// `len` matches the number of linked nodes.
    #[cfg(test)]
    pub(crate) fn assert_invariants(&self, hasher: impl Fn(&V) -> u64) {
        let mut count = 0;
        for (index, head) in self.buckets.as_slice().iter().enumerate() {
            let mut link = *head;
            while let Some(node) = link {
                // SAFETY: Linked nodes are live while the table is borrowed.
                let node = unsafe { node.as_ref() };
                assert_eq!(bucket_index(hasher(&node.value), self.buckets.len()), index);
                count += 1;
                link = node.next;
            }
        }
        assert_eq!(count, self.len);
    }

    #[cfg(test)]
    pub(crate) fn set_len_for_test(&mut self, len: usize) {
        self.len = len;
    }
}

/// An iterator over the values in a [`HashTable`].
///
/// This struct is created by the [`iter`] method on [`HashTable`]. Once it
/// returns `None` it stays exhausted; call [`iter`] again to start over.
///
/// [`iter`]: HashTable::iter
///
/// # Examples
///
/// ```rust
/// use chain_hash::HashTable;
///
/// let mut table = HashTable::new();
/// table.insert(1, "a", |_| 1);
/// table.insert(2, "b", |_| 2);
///
/// let mut values: Vec<_> = table.iter().copied().collect();
/// values.sort();
/// assert_eq!(values, ["a", "b"]);
/// ```
pub struct Iter<'a, V> {
    buckets: &'a [Link<V>],
    next_bucket: usize,
    node: Link<V>,
    remaining: usize,
    _phantom: PhantomData<&'a V>,
}

impl<V> Clone for Iter<'_, V> {
    fn clone(&self) -> Self {
        Self {
            buckets: self.buckets,
            next_bucket: self.next_bucket,
            node: self.node,
            remaining: self.remaining,
            _phantom: PhantomData,
        }
    }
}

impl<'a, V> Iterator for Iter<'a, V> {
    type Item = &'a V;

    fn next(&mut self) -> Option<Self::Item> {
        // SAFETY: Nodes reachable from `buckets` are owned by the table, which
        // is borrowed for `'a`.
        let node = unsafe { self.node?.as_ref() };

        self.node = node.next;
        while self.node.is_none() && self.next_bucket < self.buckets.len() {
            self.node = self.buckets[self.next_bucket];
            self.next_bucket += 1;
        }
        self.remaining = self.remaining.saturating_sub(1);

        Some(&node.value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<V> ExactSizeIterator for Iter<'_, V> {}

impl<V> FusedIterator for Iter<'_, V> {}

/// A mutable iterator over the values in a [`HashTable`].
///
/// This struct is created by the [`iter_mut`] method on [`HashTable`].
///
/// [`iter_mut`]: HashTable::iter_mut
pub struct IterMut<'a, V> {
    buckets: &'a [Link<V>],
    next_bucket: usize,
    node: Link<V>,
    remaining: usize,
    _phantom: PhantomData<&'a mut V>,
}

impl<'a, V> Iterator for IterMut<'a, V> {
    type Item = &'a mut V;

    fn next(&mut self) -> Option<Self::Item> {
        // SAFETY: The table is mutably borrowed for `'a` and every node is
        // yielded at most once, so the returned references never alias.
        let node = unsafe { &mut *self.node?.as_ptr() };

        self.node = node.next;
        while self.node.is_none() && self.next_bucket < self.buckets.len() {
            self.node = self.buckets[self.next_bucket];
            self.next_bucket += 1;
        }
        self.remaining = self.remaining.saturating_sub(1);

        Some(&mut node.value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<V> ExactSizeIterator for IterMut<'_, V> {}

impl<V> FusedIterator for IterMut<'_, V> {}

/// A draining iterator over the values in a [`HashTable`].
///
/// This struct is created by the [`drain`] method on [`HashTable`].
/// It yields owned `V` values and empties the table as it iterates.
///
/// [`drain`]: HashTable::drain
///
/// # Examples
///
/// ```rust
/// use chain_hash::HashTable;
///
/// let mut table = HashTable::new();
/// table.insert(1, "a".to_string(), |_| 1);
/// table.insert(2, "b".to_string(), |_| 2);
///
/// let values: Vec<String> = table.drain().collect();
/// assert!(table.is_empty());
/// assert_eq!(values.len(), 2);
/// ```
pub struct Drain<'a, V, A: Allocator = Global> {
    table: &'a mut HashTable<V, A>,
    bucket: usize,
}

impl<V, A: Allocator> Iterator for Drain<'_, V, A> {
    type Item = V;

    fn next(&mut self) -> Option<Self::Item> {
        while self.bucket < self.table.buckets.len() {
            let slot = &mut self.table.buckets.as_mut_slice()[self.bucket];
            if let Some(node) = *slot {
                // SAFETY: `node` heads a chain of this table; after relinking
                // the slot past it nothing refers to it, and it was allocated
                // with the table's allocator.
                unsafe {
                    *slot = (*node.as_ptr()).next;
                    self.table.len -= 1;
                    return Some(destruct(&self.table.alloc, node).value);
                }
            }
            self.bucket += 1;
        }

        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.table.len, Some(self.table.len))
    }
}

impl<V, A: Allocator> ExactSizeIterator for Drain<'_, V, A> {}

impl<V, A: Allocator> FusedIterator for Drain<'_, V, A> {}

impl<V, A: Allocator> Drop for Drain<'_, V, A> {
    fn drop(&mut self) {
        for _ in &mut *self {}
    }
}
