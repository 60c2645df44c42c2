use std::hash::BuildHasher;
use std::hash::RandomState;

use allocator_api2::alloc::Global;
use chain_hash::GrowthPolicy;
use chain_hash::HashMap;
use clap::Parser;

#[derive(Parser, Debug)]
struct Args {
    #[arg(short = 'n', long = "entries", default_value_t = 1000)]
    entries: usize,

    #[arg(short = 'm', long = "min_buckets", default_value_t = GrowthPolicy::DEFAULT_MIN_BUCKETS)]
    min_buckets: usize,

    #[arg(short = 'f', long = "factor", default_value_t = GrowthPolicy::DEFAULT_FACTOR)]
    factor: usize,

    /// Number of distinct keys; smaller values produce duplicate entries.
    #[arg(short = 'k', long = "distinct_keys")]
    distinct_keys: Option<usize>,
}

fn main() {
    let args = Args::parse();
    let policy = GrowthPolicy::new(args.min_buckets, args.factor);
    let distinct = args.distinct_keys.unwrap_or(args.entries).max(1);

    println!(
        "Creating HashMap with min_buckets = {}, factor = {}",
        policy.min_buckets(),
        policy.factor()
    );

    let hash_builder = RandomState::new();
    let mut map: HashMap<u64, u64, RandomState> =
        HashMap::with_policy_and_hasher_in(policy, hash_builder, Global);

    let mut growth_steps = 0;
    for i in 0..args.entries {
        let before = map.capacity();
        let key = (i % distinct) as u64;

        if let Err(err) = map.try_insert(key, i as u64) {
            eprintln!("insert {} failed: {}", i, err);
            break;
        }

        if map.capacity() != before {
            growth_steps += 1;
            println!(
                "grew {:>8} -> {:>8} buckets at len {}",
                before,
                map.capacity(),
                map.len()
            );
        }
    }

    println!("Inserted {} entries ({} distinct keys)", map.len(), distinct);
    println!("Growth steps: {}", growth_steps);
    println!(
        "Final load factor: {:.2}%",
        (map.len() as f64 / map.capacity().max(1) as f64) * 100.0
    );

    // Spot check that every key is still reachable after the last rehash.
    let missing = (0..distinct.min(args.entries) as u64)
        .filter(|key| !map.contains_key(key))
        .count();
    println!(
        "Unreachable keys: {} (hash of key 0 = {:#018x})",
        missing,
        map.hasher().hash_one(0u64)
    );

    map.chain_stats().print();
}
