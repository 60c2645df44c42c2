// Property tests for HashMap kept inside the crate so they can check the
// table's structural invariants after every step.

use std::collections::HashMap as StdHashMap;
use std::hash::BuildHasher;

use allocator_api2::alloc::Global;
use proptest::prelude::*;
use siphasher::sip::SipHasher;

use crate::GrowthPolicy;
use crate::HashMap;
use crate::test_alloc::CountingAlloc;

#[derive(Clone, Copy, Default)]
struct FixedSip;

impl BuildHasher for FixedSip {
    type Hasher = SipHasher;

    fn build_hasher(&self) -> SipHasher {
        SipHasher::new_with_keys(0x0123_4567, 0x89ab_cdef)
    }
}

// Pool-indexed operations so shrinking moves toward earlier keys and shorter
// op lists. Small pools force duplicate keys.
#[derive(Clone, Debug)]
enum Op {
    Insert(usize, i32),
    Remove(usize),
    Get(usize),
    Contains(String),
    Iterate,
}

fn arb_scenario() -> impl Strategy<Value = (Vec<String>, Vec<Op>)> {
    proptest::collection::vec("[a-z]{0,4}", 1..=6).prop_flat_map(|pool| {
        let idxs: Vec<usize> = (0..pool.len()).collect();
        let idx = proptest::sample::select(idxs);
        let op = prop_oneof![
            3 => (idx.clone(), any::<i32>()).prop_map(|(i, v)| Op::Insert(i, v)),
            2 => idx.clone().prop_map(Op::Remove),
            2 => idx.clone().prop_map(Op::Get),
            1 => "[a-z]{0,4}".prop_map(Op::Contains),
            1 => Just(Op::Iterate),
        ];
        proptest::collection::vec(op, 1..80).prop_map(move |ops| (pool.clone(), ops))
    })
}

fn arb_policy() -> impl Strategy<Value = GrowthPolicy> {
    prop_oneof![
        Just(GrowthPolicy::default()),
        (0usize..=12, 1usize..=3).prop_map(|(min, factor)| GrowthPolicy::new(min, factor)),
    ]
}

fn live_values(model: &[(String, i32)], key: &str) -> Vec<i32> {
    model
        .iter()
        .filter(|(k, _)| k == key)
        .map(|(_, v)| *v)
        .collect()
}

// Property: the map behaves as a multiset of (key, value) pairs.
// - `get`/`remove` find some live value for the key, and `None` iff none is live.
// - While the table has not grown since the latest insert of a key, that
//   insert shadows older duplicates.
// - Iteration yields every live pair exactly once.
// - Capacity follows the growth policy: it changes only when an insert finds
//   `len >= capacity`.
proptest! {
    #![proptest_config(ProptestConfig { cases: 128, .. ProptestConfig::default() })]
    #[test]
    fn prop_multiset_model((pool, ops) in arb_scenario(), policy in arb_policy()) {
        let mut sut: HashMap<String, i32, FixedSip> =
            HashMap::with_policy_and_hasher_in(policy, FixedSip, Global);
        let mut model: Vec<(String, i32)> = Vec::new();
        let mut growths = 0usize;
        let mut newest: StdHashMap<String, (i32, usize)> = StdHashMap::new();

        for op in ops {
            match op {
                Op::Insert(i, v) => {
                    let key = pool[i].clone();
                    let (len, capacity) = (sut.len(), sut.capacity());
                    sut.insert(key.clone(), v);
                    if len >= capacity {
                        growths += 1;
                        prop_assert_eq!(Ok(sut.capacity()), policy.next_capacity(len));
                    } else {
                        prop_assert_eq!(sut.capacity(), capacity);
                    }
                    newest.insert(key.clone(), (v, growths));
                    model.push((key, v));
                }
                Op::Remove(i) => {
                    let key = &pool[i];
                    let live = live_values(&model, key);
                    let removed = sut.remove(key.as_str());
                    match removed {
                        None => prop_assert!(live.is_empty()),
                        Some(v) => {
                            prop_assert!(live.contains(&v));
                            if let Some(&(latest, epoch)) = newest.get(key) {
                                if epoch == growths {
                                    prop_assert_eq!(v, latest);
                                }
                            }
                            let at = model
                                .iter()
                                .position(|(k, mv)| k == key && *mv == v)
                                .unwrap();
                            model.swap_remove(at);
                        }
                    }
                    newest.remove(key);
                }
                Op::Get(i) => {
                    let key = &pool[i];
                    let live = live_values(&model, key);
                    match sut.get(key.as_str()) {
                        None => prop_assert!(live.is_empty()),
                        Some(v) => {
                            prop_assert!(live.contains(v));
                            if let Some(&(latest, epoch)) = newest.get(key) {
                                if epoch == growths {
                                    prop_assert_eq!(*v, latest);
                                }
                            }
                        }
                    }
                }
                Op::Contains(key) => {
                    prop_assert_eq!(
                        sut.contains_key(key.as_str()),
                        !live_values(&model, &key).is_empty()
                    );
                }
                Op::Iterate => {
                    let mut seen: Vec<(String, i32)> =
                        sut.iter().map(|(k, v)| (k.clone(), *v)).collect();
                    let mut expected = model.clone();
                    seen.sort();
                    expected.sort();
                    prop_assert_eq!(seen, expected);
                }
            }

            prop_assert_eq!(sut.len(), model.len());
            prop_assert_eq!(sut.is_empty(), model.is_empty());
            sut.assert_invariants();
        }

        let mut drained: Vec<(String, i32)> = sut.drain().collect();
        drained.sort();
        model.sort();
        prop_assert_eq!(drained, model);
        prop_assert!(sut.is_empty());
    }
}

// Property: every allocation made on behalf of the map is returned to its
// allocator by the time the map is dropped, whatever the operation mix.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_no_leaks((pool, ops) in arb_scenario()) {
        let alloc = CountingAlloc::default();
        {
            let mut sut: HashMap<String, i32, FixedSip, &CountingAlloc> =
                HashMap::with_hasher_in(FixedSip, &alloc);
            for op in ops {
                match op {
                    Op::Insert(i, v) => sut.insert(pool[i].clone(), v),
                    Op::Remove(i) => {
                        sut.remove(pool[i].as_str());
                    }
                    Op::Get(_) | Op::Contains(_) | Op::Iterate => {}
                }
                // One node per entry, plus the bucket array once allocated.
                let expected = sut.len() + usize::from(sut.capacity() > 0);
                prop_assert_eq!(alloc.live_allocations(), expected);
            }
        }
        prop_assert_eq!(alloc.live_allocations(), 0);
        prop_assert_eq!(alloc.live_bytes(), 0);
    }
}
