//! Storage and concurrency core of an out-of-core graph engine: a concurrent block
//! cache (single-pin and multi-pin variants sharing one clock-hand skeleton), the
//! segment-tree-backed edge-block index that packs vertex adjacency into blocks, and
//! a frontier executor that drives parallel traversal over both.
//!
//! The graph parser, user-facing algorithms, the serializer's on-disk byte layout,
//! and the CLI are external collaborators; this crate only defines the narrow
//! interfaces ([`serializer::BlockSerializer`], [`pool::WorkerPool`]) they plug into.

pub mod test_utils;

pub mod benchmark_framework;
pub mod block;
pub mod cache;
pub mod directory;
pub mod frontier;
pub mod graph;
pub mod pool;
pub mod segment_tree;
pub mod serializer;

pub use block::{BlockId, EdgeBlock, VertexId, BLOCK_CAPACITY_BYTES, EDGES_PER_BLOCK};
pub use cache::{BlockCache, CacheMode, SimpleCache};
pub use graph::{CacheSize, Graph, GraphBuilder, VertexRecord};
pub use serializer::{BlockSerializer, InMemorySerializer, MetaRecord, Mode};
