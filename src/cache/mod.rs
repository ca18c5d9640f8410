//! The concurrent block cache: a single-pin variant ([`simple::SimpleCache`]) and a
//! multi-pin variant ([`block_cache::BlockCache`]), sharing the clock-hand skeleton
//! in [`slot`].

pub(crate) mod slot;

pub mod block_cache;
pub mod simple;

pub use block_cache::BlockCache;
pub use simple::SimpleCache;

/// Which cache strategy the graph should route block requests through.
///
/// Mirrors the three-way choice in the graph's public surface (`set_cache_mode`):
/// skip the cache entirely (useful when the whole graph fits in memory already, or
/// for benchmarking raw serializer throughput), the single-pin cache for the
/// per-block traversal shape where each worker owns a block exclusively for the
/// duration of its batch, or the multi-pin cache for every other access pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheMode {
    NoCache,
    Simple,
    Normal,
}
