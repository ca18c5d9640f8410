//! Throughput of segment-tree point updates and first-fit queries.
//! `cargo bench --bench segment_tree_bench -- [iterations] [length] [--json] [--filter pat]`.

use frontier_graph::benchmark_framework::{benchmark, parse_bench_args, print_header, should_run, BenchResult};
use frontier_graph::segment_tree::SegmentTree;

fn bench_update(iterations: usize, length: usize) -> BenchResult {
    let mut tree = SegmentTree::construct(length, 100);
    let mut pos = 0usize;

    benchmark("segment_tree/update", iterations, iterations / 10, || {
        tree.update(pos, 50);
        pos = (pos + 1) % length;
    })
}

fn bench_query_first_ge(iterations: usize, length: usize) -> BenchResult {
    let mut tree = SegmentTree::construct(length, 100);
    for i in (0..length).step_by(2) {
        tree.update(i, 10);
    }

    benchmark("segment_tree/query_first_ge", iterations, iterations / 10, || {
        std::hint::black_box(tree.query_first_ge(50));
    })
}

fn main() {
    let (iterations, length, json, filter) = parse_bench_args();
    let length = length.max(2);

    let results = [
        ("segment_tree/update", bench_update as fn(usize, usize) -> BenchResult),
        ("segment_tree/query_first_ge", bench_query_first_ge),
    ]
    .into_iter()
    .filter(|(name, _)| should_run(name, filter.as_deref()))
    .map(|(_, f)| f(iterations, length))
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
