//! Edge-block index: bin-packs per-vertex adjacency lists into fixed-capacity edge
//! blocks and remembers where each vertex's slice ended up.
//!
//! Placement is first-fit: the leftmost edge block with enough remaining capacity,
//! found via [`SegmentTree::query_first_ge`]. This is the construction-time
//! counterpart to the query-time `(block_id, offset, degree)` lookup the cache keys
//! off of.

use std::collections::HashMap;

use crate::block::{BlockId, EdgeBlock, VertexId, EDGES_PER_BLOCK};
use crate::segment_tree::{SegmentTree, NONE};

/// Where one vertex's neighbour list lives once packed. Immutable after
/// [`super::GraphBuilder::prep_gs`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexRecord {
    pub edge_block_id: BlockId,
    pub offset: u32,
    pub degree: u32,
}

pub struct EdgeBlockIndex {
    tree: SegmentTree,
    node_to_block: HashMap<usize, BlockId>,
    blocks: Vec<EdgeBlock>,
}

impl EdgeBlockIndex {
    /// `capacity_hint` upper-bounds how many distinct edge blocks could ever be
    /// needed: one per vertex, the worst case where every vertex's degree alone
    /// exhausts a fresh block.
    pub fn new(capacity_hint: usize) -> Self {
        Self {
            tree: SegmentTree::construct(capacity_hint.max(1), EDGES_PER_BLOCK as i64),
            node_to_block: HashMap::new(),
            blocks: Vec::new(),
        }
    }

    /// Places one vertex's adjacency list, returning the record to persist for it.
    pub fn place(&mut self, edges: &[VertexId]) -> VertexRecord {
        let degree = edges.len();
        assert!(
            degree <= EDGES_PER_BLOCK,
            "vertex degree {degree} exceeds a single block's capacity ({EDGES_PER_BLOCK}); \
             splitting one vertex's adjacency across blocks is not supported"
        );

        let node = self.tree.query_first_ge(degree as i64);
        assert_ne!(
            node, NONE,
            "edge-block index exhausted its capacity hint ({} blocks)",
            self.tree.len()
        );

        let block_id = match self.node_to_block.get(&node) {
            Some(&id) => id,
            None => {
                let id = self.blocks.len() as BlockId;
                self.blocks.push(EdgeBlock::zeroed());
                self.node_to_block.insert(node, id);
                id
            }
        };

        let remaining_before = self.tree.read(node);
        let offset = EDGES_PER_BLOCK as i64 - remaining_before;
        assert!(offset >= 0, "segment tree leaf capacity invariant violated");
        let offset = offset as u32;

        self.blocks[block_id as usize].as_mut_slice()[offset as usize..offset as usize + degree]
            .copy_from_slice(edges);

        let remaining_after = remaining_before - degree as i64;
        self.tree.update_by_node(node, remaining_after, -1);

        VertexRecord {
            edge_block_id: block_id,
            offset,
            degree: degree as u32,
        }
    }

    pub fn num_edge_blocks(&self) -> usize {
        self.blocks.len()
    }

    /// Consumes the index, handing back the packed blocks for persistence. A block's
    /// id is its position in the returned vector.
    pub fn into_blocks(self) -> Vec<EdgeBlock> {
        self.blocks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edges_of_degree(n: usize) -> Vec<VertexId> {
        (0..n as VertexId).collect()
    }

    #[test]
    fn first_fit_reuses_a_block_with_enough_remaining_capacity() {
        let mut index = EdgeBlockIndex::new(4);
        let r1 = index.place(&edges_of_degree(7));
        let r2 = index.place(&edges_of_degree(5));
        // block 0 has 10-7=3 remaining (assuming a small test block size would be
        // needed to exercise reuse within EDGES_PER_BLOCK; at the crate's real block
        // size both fit in block 0 with room to spare).
        assert_eq!(r1.edge_block_id, 0);
        assert_eq!(r2.edge_block_id, 0);
        assert_eq!(r1.offset, 0);
        assert_eq!(r2.offset, 7);
    }

    #[test]
    fn each_vertex_slice_is_recoverable_from_its_record() {
        let mut index = EdgeBlockIndex::new(8);
        let edges_a = vec![10, 11, 12];
        let edges_b = vec![20, 21];
        let rec_a = index.place(&edges_a);
        let rec_b = index.place(&edges_b);

        let blocks = index.into_blocks();
        let block_a = &blocks[rec_a.edge_block_id as usize];
        let block_b = &blocks[rec_b.edge_block_id as usize];
        assert_eq!(
            block_a.neighbours(rec_a.offset, rec_a.degree),
            edges_a.as_slice()
        );
        assert_eq!(
            block_b.neighbours(rec_b.offset, rec_b.degree),
            edges_b.as_slice()
        );
    }

    #[test]
    #[should_panic(expected = "exceeds a single block's capacity")]
    fn degree_larger_than_a_block_is_rejected() {
        let mut index = EdgeBlockIndex::new(1);
        index.place(&edges_of_degree(EDGES_PER_BLOCK + 1));
    }
}
