//! The graph: a two-phase handle over vertex adjacency, backed by the block cache.
//!
//! [`GraphBuilder`] is the open/build phase: nodes and edges can be added in any
//! order. [`GraphBuilder::prep_gs`] consumes the builder — so there is no longer a
//! value on which `add_edge` could even be called — and returns the frozen [`Graph`],
//! which only answers queries and drives traversals.

pub mod index;

use std::collections::HashMap;
use std::io;
use std::sync::Arc;

use crate::block::{BlockId, EdgeBlock, VertexId, BLOCK_CAPACITY_BYTES, EDGES_PER_BLOCK};
use crate::cache::{BlockCache, CacheMode, SimpleCache};
use crate::pool::WorkerPool;
use crate::serializer::{BlockSerializer, MetaRecord};

pub use index::VertexRecord;
use index::EdgeBlockIndex;

const DEFAULT_CACHE_BLOCKS: usize = 64;
const RECORD_WORDS: usize = 3;

fn records_per_vertex_block() -> usize {
    EDGES_PER_BLOCK / RECORD_WORDS
}

fn vertex_block_count(num_vertices: usize) -> usize {
    if num_vertices == 0 {
        return 0;
    }
    (num_vertices + records_per_vertex_block() - 1) / records_per_vertex_block()
}

fn default_thread_count() -> usize {
    std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
}

/// How much of the graph's edge blocks the cache should be able to hold at once.
#[derive(Debug, Clone, Copy)]
pub enum CacheSize {
    Megabytes(usize),
    Ratio(f64),
}

impl CacheSize {
    fn to_blocks(self, num_edge_blocks: usize) -> usize {
        match self {
            CacheSize::Megabytes(mb) => {
                let bytes = mb as u64 * 1024 * 1024;
                (bytes / BLOCK_CAPACITY_BYTES as u64).max(1) as usize
            }
            CacheSize::Ratio(ratio) => {
                ((num_edge_blocks as f64 * ratio).ceil() as usize).max(1)
            }
        }
    }
}

enum CacheBackend {
    NoCache,
    Simple(SimpleCache),
    Normal(BlockCache),
}

impl CacheBackend {
    fn build(mode: CacheMode, capacity_blocks: usize) -> Self {
        match mode {
            CacheMode::NoCache => CacheBackend::NoCache,
            CacheMode::Simple => CacheBackend::Simple(SimpleCache::new(capacity_blocks.max(1))),
            CacheMode::Normal => CacheBackend::Normal(BlockCache::new(capacity_blocks.max(1))),
        }
    }

    fn clear(&self) {
        match self {
            CacheBackend::NoCache => {}
            CacheBackend::Simple(c) => c.clear(),
            CacheBackend::Normal(c) => c.clear(),
        }
    }
}

/// Open/build phase: accumulates per-vertex adjacency before it is packed into edge
/// blocks. Mutation methods assert the graph has not yet been finalized; once
/// [`prep_gs`](Self::prep_gs) consumes `self` there is no longer a value to call them
/// on, which is the compile-time half of the phase distinction.
pub struct GraphBuilder {
    num_nodes: usize,
    adjacency: Vec<Vec<VertexId>>,
    reorder: Option<HashMap<VertexId, VertexId>>,
    next_dense_id: VertexId,
    finalized: bool,
}

impl GraphBuilder {
    pub fn init_nodes(num_nodes: usize) -> Self {
        Self {
            num_nodes,
            adjacency: vec![Vec::new(); num_nodes],
            reorder: None,
            next_dense_id: 0,
            finalized: false,
        }
    }

    /// Enables the external-id -> dense-id reorder map; ids are assigned in the
    /// order they're first seen by [`add_edge`](Self::add_edge).
    pub fn with_reorder_map(mut self) -> Self {
        self.reorder = Some(HashMap::new());
        self
    }

    fn dense_id(&mut self, external_id: VertexId) -> VertexId {
        if self.reorder.is_none() {
            return external_id;
        }
        if let Some(&id) = self.reorder.as_ref().unwrap().get(&external_id) {
            return id;
        }
        let id = self.next_dense_id;
        self.next_dense_id += 1;
        self.reorder.as_mut().unwrap().insert(external_id, id);
        id
    }

    pub fn add_edge(&mut self, src: VertexId, dst: VertexId) {
        assert!(!self.finalized, "add_edge called after finalize_edgelist");
        let src = self.dense_id(src);
        let dst = self.dense_id(dst);
        self.adjacency[src as usize].push(dst);
    }

    pub fn set_node_edges(&mut self, v: VertexId, edges: Vec<VertexId>) {
        assert!(!self.finalized, "set_node_edges called after finalize_edgelist");
        self.adjacency[v as usize] = edges;
    }

    pub fn finalize_edgelist(&mut self) {
        self.finalized = true;
    }

    /// Packs every vertex's adjacency into edge blocks, persists them through
    /// `serializer`, and returns the frozen [`Graph`]. Releases the per-vertex
    /// adjacency vectors: only the packed layout and the small per-vertex records
    /// survive into the returned `Graph`.
    pub fn prep_gs(mut self, serializer: Arc<dyn BlockSerializer>) -> Graph {
        assert!(self.finalized, "prep_gs called before finalize_edgelist");

        let mut index = EdgeBlockIndex::new(self.num_nodes.max(1));
        let mut vertex_records = Vec::with_capacity(self.num_nodes);
        let mut num_edges: u64 = 0;
        for edges in self.adjacency.drain(..) {
            num_edges += edges.len() as u64;
            vertex_records.push(index.place(&edges));
        }
        self.adjacency.shrink_to_fit();

        let blocks = index.into_blocks();
        for (block_id, block) in blocks.iter().enumerate() {
            serializer
                .write_block(block_id as BlockId, block)
                .expect("initial edge block write failed");
        }

        let num_edge_blocks = blocks.len() as u32;
        debug!("packed {} vertices into {num_edge_blocks} edge blocks", vertex_records.len());
        serializer
            .write_metadata(&MetaRecord {
                num_nodes: self.num_nodes as u32,
                num_edges,
                num_edge_blocks,
                num_vertex_blocks: vertex_block_count(vertex_records.len()) as u32,
                edge_block_bytes: BLOCK_CAPACITY_BYTES as u32,
            })
            .expect("initial metadata write failed");

        let cache_mode = CacheMode::Normal;
        let cache_size = CacheSize::Ratio(0.1);
        let cache = CacheBackend::build(cache_mode, cache_size.to_blocks(num_edge_blocks as usize));

        Graph {
            vertex_records,
            num_edge_blocks,
            reorder: self.reorder,
            serializer,
            cache_mode,
            cache_size,
            cache,
            pool: WorkerPool::new(default_thread_count()),
        }
    }
}

/// Frozen/query phase: vertex records and edge blocks are immutable; only the cache
/// configuration and contents change.
pub struct Graph {
    vertex_records: Vec<VertexRecord>,
    num_edge_blocks: u32,
    #[allow(dead_code)]
    reorder: Option<HashMap<VertexId, VertexId>>,
    serializer: Arc<dyn BlockSerializer>,
    cache_mode: CacheMode,
    cache_size: CacheSize,
    cache: CacheBackend,
    pool: WorkerPool,
}

impl Graph {
    pub fn get_num_nodes(&self) -> usize {
        self.vertex_records.len()
    }

    pub fn get_degree(&self, v: VertexId) -> u32 {
        self.vertex_records[v as usize].degree
    }

    pub(crate) fn record(&self, v: VertexId) -> VertexRecord {
        self.vertex_records[v as usize]
    }

    pub fn get_edges(&self, v: VertexId) -> io::Result<Vec<VertexId>> {
        let record = self.record(v);
        self.with_block(record.edge_block_id, 1, |block| {
            block.neighbours(record.offset, record.degree).to_vec()
        })
    }

    /// Runs `f` with a read-only view of `block_id`'s contents, routed through
    /// whichever cache is currently configured (or straight through the serializer
    /// when caching is disabled). Shared by [`Self::get_edges`] and the frontier
    /// executor's per-block traversal, so both pay for at most one fill per
    /// residency.
    pub(crate) fn with_block<R>(
        &self,
        block_id: BlockId,
        ref_hint: i64,
        f: impl FnOnce(&EdgeBlock) -> R,
    ) -> io::Result<R> {
        match &self.cache {
            CacheBackend::NoCache => {
                let mut buffer = EdgeBlock::zeroed();
                self.serializer.read_block(block_id, &mut buffer)?;
                Ok(f(&buffer))
            }
            CacheBackend::Simple(cache) => {
                let (slot_idx, needs_fill) = cache.request(block_id, ref_hint);
                if needs_fill {
                    cache.fill(slot_idx, block_id, self.serializer.as_ref())?;
                }
                let result = f(&cache.get(slot_idx));
                cache.release(slot_idx);
                Ok(result)
            }
            CacheBackend::Normal(cache) => {
                let slot_idx = cache.request(block_id);
                let guard = cache.get(slot_idx, block_id, self.serializer.as_ref())?;
                let result = f(&guard);
                drop(guard);
                cache.release(slot_idx);
                Ok(result)
            }
        }
    }

    pub fn set_cache_mode(&mut self, mode: CacheMode) {
        self.cache_mode = mode;
        self.rebuild_cache();
    }

    pub fn set_cache_size(&mut self, size: CacheSize) {
        self.cache_size = size;
        self.rebuild_cache();
    }

    pub fn disable_cache(&mut self) {
        self.set_cache_mode(CacheMode::NoCache);
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    fn rebuild_cache(&mut self) {
        let blocks = self.cache_size.to_blocks(self.num_edge_blocks as usize);
        debug!("rebuilding cache: mode={:?} capacity={blocks} blocks", self.cache_mode);
        self.cache = CacheBackend::build(self.cache_mode, blocks);
    }

    pub fn set_thread_pool_size(&self, num_threads: usize) {
        self.pool.resize(num_threads);
    }

    pub(crate) fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    pub fn read_metadata(&self) -> io::Result<MetaRecord> {
        self.serializer.read_metadata()
    }

    fn dump_vertices(&self) -> io::Result<()> {
        let per_block = records_per_vertex_block();
        for (i, chunk) in self.vertex_records.chunks(per_block).enumerate() {
            let mut block = EdgeBlock::zeroed();
            for (j, record) in chunk.iter().enumerate() {
                let base = j * RECORD_WORDS;
                let out = block.as_mut_slice();
                out[base] = record.edge_block_id;
                out[base + 1] = record.offset;
                out[base + 2] = record.degree;
            }
            self.serializer
                .write_block(self.num_edge_blocks + i as u32, &block)?;
        }
        Ok(())
    }

    pub fn read_vertex_blocks(&self) -> io::Result<Vec<VertexRecord>> {
        let per_block = records_per_vertex_block();
        let num_vertex_blocks = vertex_block_count(self.vertex_records.len());
        let mut out = Vec::with_capacity(self.vertex_records.len());
        let mut remaining = self.vertex_records.len();
        for i in 0..num_vertex_blocks {
            let mut block = EdgeBlock::zeroed();
            self.serializer
                .read_block(self.num_edge_blocks + i as u32, &mut block)?;
            let take = remaining.min(per_block);
            let slice = block.as_slice();
            for j in 0..take {
                let base = j * RECORD_WORDS;
                out.push(VertexRecord {
                    edge_block_id: slice[base],
                    offset: slice[base + 1],
                    degree: slice[base + 2],
                });
            }
            remaining -= take;
        }
        Ok(out)
    }

    pub fn dump_graph(&self) -> io::Result<()> {
        self.dump_vertices()?;
        self.serializer.write_metadata(&MetaRecord {
            num_nodes: self.vertex_records.len() as u32,
            num_edges: self.vertex_records.iter().map(|r| r.degree as u64).sum(),
            num_edge_blocks: self.num_edge_blocks,
            num_vertex_blocks: vertex_block_count(self.vertex_records.len()) as u32,
            edge_block_bytes: BLOCK_CAPACITY_BYTES as u32,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serializer::InMemorySerializer;

    fn small_graph() -> Graph {
        let mut builder = GraphBuilder::init_nodes(3);
        builder.set_node_edges(0, vec![1, 2]);
        builder.set_node_edges(1, vec![2]);
        builder.set_node_edges(2, vec![]);
        builder.finalize_edgelist();
        builder.prep_gs(Arc::new(InMemorySerializer::for_write()))
    }

    #[test]
    fn get_edges_round_trips_through_the_default_cache() {
        let graph = small_graph();
        assert_eq!(graph.get_num_nodes(), 3);
        assert_eq!(graph.get_degree(0), 2);
        assert_eq!(graph.get_edges(0).unwrap(), vec![1, 2]);
        assert_eq!(graph.get_edges(1).unwrap(), vec![2]);
        assert!(graph.get_edges(2).unwrap().is_empty());
    }

    #[test]
    fn get_edges_agrees_across_every_cache_mode() {
        let mut graph = small_graph();
        let via_normal = graph.get_edges(0).unwrap();

        graph.set_cache_mode(CacheMode::Simple);
        assert_eq!(graph.get_edges(0).unwrap(), via_normal);

        graph.disable_cache();
        assert_eq!(graph.get_edges(0).unwrap(), via_normal);
    }

    #[test]
    fn vertex_blocks_round_trip_through_dump_and_read() {
        let graph = small_graph();
        graph.dump_graph().unwrap();
        let reloaded = graph.read_vertex_blocks().unwrap();
        assert_eq!(reloaded.len(), 3);
        assert_eq!(reloaded[0].degree, 2);
        assert_eq!(reloaded[1].degree, 1);
    }

    #[test]
    #[should_panic(expected = "add_edge called after finalize_edgelist")]
    fn mutation_after_finalize_is_rejected() {
        let mut builder = GraphBuilder::init_nodes(2);
        builder.finalize_edgelist();
        builder.add_edge(0, 1);
    }
}
