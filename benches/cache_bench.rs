//! Throughput of the two cache variants under a few access patterns. Not a criterion
//! harness: `cargo bench --bench cache_bench -- [iterations] [num_blocks] [--json] [--filter pat]`.

use std::sync::Arc;

use frontier_graph::benchmark_framework::{benchmark, parse_bench_args, print_header, should_run, BenchResult};
use frontier_graph::{BlockCache, BlockId, EdgeBlock, InMemorySerializer, SimpleCache};

fn filled_serializer(num_blocks: u32) -> InMemorySerializer {
    let s = InMemorySerializer::for_write();
    for b in 0..num_blocks {
        s.write_block(b, &EdgeBlock::zeroed()).unwrap();
    }
    s
}

fn bench_simple_cache_hit(iterations: usize, num_blocks: usize) -> BenchResult {
    let cache = SimpleCache::new(num_blocks);
    let serializer = filled_serializer(num_blocks as u32);
    let (idx, _) = cache.request(0, 1);
    cache.fill(idx, 0, &serializer).unwrap();
    cache.release(idx);

    benchmark("simple_cache/repeated_hit", iterations, iterations / 10, || {
        let (idx, needs_fill) = cache.request(0, 1);
        if needs_fill {
            cache.fill(idx, 0, &serializer).unwrap();
        }
        std::hint::black_box(cache.get(idx));
        cache.release(idx);
    })
}

fn bench_simple_cache_round_robin(iterations: usize, num_blocks: usize) -> BenchResult {
    let cache = SimpleCache::new(num_blocks);
    let serializer = filled_serializer(num_blocks as u32 * 2);
    let mut next_block: BlockId = 0;

    benchmark("simple_cache/round_robin_miss", iterations, iterations / 10, || {
        let block_id = next_block;
        next_block = (next_block + 1) % (num_blocks as u32 * 2);
        let (idx, needs_fill) = cache.request(block_id, 1);
        if needs_fill {
            cache.fill(idx, block_id, &serializer).unwrap();
        }
        std::hint::black_box(cache.get(idx));
        cache.release(idx);
    })
}

fn bench_block_cache_concurrent_hit(iterations: usize, num_blocks: usize) -> BenchResult {
    let cache = Arc::new(BlockCache::new(num_blocks));
    let serializer = Arc::new(filled_serializer(num_blocks as u32));
    let idx = cache.request(0);
    cache.get(idx, 0, serializer.as_ref()).unwrap();
    cache.release(idx);

    benchmark("block_cache/repeated_hit", iterations, iterations / 10, || {
        let idx = cache.request(0);
        std::hint::black_box(cache.get(idx, 0, serializer.as_ref()).unwrap());
        cache.release(idx);
    })
}

fn main() {
    let (iterations, num_blocks, json, filter) = parse_bench_args();

    let results = [
        ("simple_cache/repeated_hit", bench_simple_cache_hit as fn(usize, usize) -> BenchResult),
        ("simple_cache/round_robin_miss", bench_simple_cache_round_robin),
        ("block_cache/repeated_hit", bench_block_cache_concurrent_hit),
    ]
    .into_iter()
    .filter(|(name, _)| should_run(name, filter.as_deref()))
    .map(|(_, f)| f(iterations, num_blocks))
    .collect::<Vec<_>>();

    if json {
        for r in &results {
            println!("{}", r.to_json());
        }
    } else {
        print_header();
        for r in &results {
            println!("{r}");
        }
    }
}
