//! Parallel traversal over the graph: two traversal shapes (per-vertex, per-block),
//! each in three callback flavours (thread-local merge, atomic bitvector, direct
//! shared write), all driven by the graph's [`crate::pool::WorkerPool`].
//!
//! The per-block shape exists purely to amortise cache churn: instead of pinning a
//! block once per vertex routed through it, it pins each distinct block exactly once
//! and iterates every frontier vertex that lands in it before releasing.

use std::collections::HashMap;
use std::io;
use std::sync::atomic::AtomicBool;
use std::sync::Mutex;

use crate::block::{BlockId, VertexId};
use crate::graph::Graph;

const VERTEX_CHUNK_SIZE: usize = 256;

fn vertex_chunks(frontier: &[VertexId]) -> Vec<Vec<VertexId>> {
    frontier.chunks(VERTEX_CHUNK_SIZE).map(|c| c.to_vec()).collect()
}

fn group_by_block(graph: &Graph, frontier: &[VertexId]) -> Vec<(BlockId, Vec<VertexId>)> {
    let mut groups: HashMap<BlockId, Vec<VertexId>> = HashMap::new();
    for &v in frontier {
        groups.entry(graph.record(v).edge_block_id).or_default().push(v);
    }
    groups.into_iter().collect()
}

fn take_error(error: Mutex<Option<io::Error>>) -> io::Result<()> {
    match error.into_inner().unwrap() {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

// --- per-vertex shape -------------------------------------------------------

/// Flavour 1: each worker accumulates into its own `Vec`, merged into the returned
/// vector once every chunk has finished.
pub fn process_queue_by_vertex_local<F>(graph: &Graph, frontier: &[VertexId], update: F) -> io::Result<Vec<VertexId>>
where
    F: Fn(VertexId, u32, &[VertexId], &mut Vec<VertexId>) + Sync,
{
    let partials: Mutex<Vec<Vec<VertexId>>> = Mutex::new(Vec::new());
    let error: Mutex<Option<io::Error>> = Mutex::new(None);

    graph.pool().run_batch(vertex_chunks(frontier), |chunk| {
        let mut local = Vec::new();
        for v in chunk {
            let record = graph.record(v);
            let result = graph.with_block(record.edge_block_id, 1, |block| {
                update(v, record.degree, block.neighbours(record.offset, record.degree), &mut local);
            });
            if let Err(e) = result {
                *error.lock().unwrap() = Some(e);
            }
        }
        partials.lock().unwrap().push(local);
    });

    take_error(error)?;
    Ok(partials.into_inner().unwrap().into_iter().flatten().collect())
}

/// Flavour 2: the callback marks entries directly in a caller-owned atomic bitvector
/// (e.g. "active in the next frontier"). No merge step; the effect is the mutation.
pub fn process_queue_by_vertex_bitvector<F>(
    graph: &Graph,
    frontier: &[VertexId],
    active: &[AtomicBool],
    update: F,
) -> io::Result<()>
where
    F: Fn(VertexId, u32, &[VertexId], &[AtomicBool]) + Sync,
{
    let error: Mutex<Option<io::Error>> = Mutex::new(None);

    graph.pool().run_batch(vertex_chunks(frontier), |chunk| {
        for v in chunk {
            let record = graph.record(v);
            let result = graph.with_block(record.edge_block_id, 1, |block| {
                update(v, record.degree, block.neighbours(record.offset, record.degree), active);
            });
            if let Err(e) = result {
                *error.lock().unwrap() = Some(e);
            }
        }
    });

    take_error(error)
}

/// Flavour 3: the callback writes directly into a shared `next` vector, synchronising
/// itself (here, a `Mutex`; the cache's involvement is identical to the other two
/// flavours).
pub fn process_queue_by_vertex_direct<F>(
    graph: &Graph,
    frontier: &[VertexId],
    next: &Mutex<Vec<VertexId>>,
    update: F,
) -> io::Result<()>
where
    F: Fn(VertexId, u32, &[VertexId], &Mutex<Vec<VertexId>>) + Sync,
{
    let error: Mutex<Option<io::Error>> = Mutex::new(None);

    graph.pool().run_batch(vertex_chunks(frontier), |chunk| {
        for v in chunk {
            let record = graph.record(v);
            let result = graph.with_block(record.edge_block_id, 1, |block| {
                update(v, record.degree, block.neighbours(record.offset, record.degree), next);
            });
            if let Err(e) = result {
                *error.lock().unwrap() = Some(e);
            }
        }
    });

    take_error(error)
}

// --- per-block shape ---------------------------------------------------------

/// Flavour 1, batched: each distinct edge block is pinned once; every frontier vertex
/// it hosts is visited before it is released.
pub fn process_queue_in_blocks_local<F>(graph: &Graph, frontier: &[VertexId], update: F) -> io::Result<Vec<VertexId>>
where
    F: Fn(VertexId, u32, &[VertexId], &mut Vec<VertexId>) + Sync,
{
    let partials: Mutex<Vec<Vec<VertexId>>> = Mutex::new(Vec::new());
    let error: Mutex<Option<io::Error>> = Mutex::new(None);

    graph.pool().run_batch(group_by_block(graph, frontier), |(block_id, vertices)| {
        let mut local = Vec::new();
        let ref_hint = vertices.len() as i64;
        let result = graph.with_block(block_id, ref_hint, |block| {
            for &v in &vertices {
                let record = graph.record(v);
                update(v, record.degree, block.neighbours(record.offset, record.degree), &mut local);
            }
        });
        if let Err(e) = result {
            *error.lock().unwrap() = Some(e);
        }
        partials.lock().unwrap().push(local);
    });

    take_error(error)?;
    Ok(partials.into_inner().unwrap().into_iter().flatten().collect())
}

pub fn process_queue_in_blocks_bitvector<F>(
    graph: &Graph,
    frontier: &[VertexId],
    active: &[AtomicBool],
    update: F,
) -> io::Result<()>
where
    F: Fn(VertexId, u32, &[VertexId], &[AtomicBool]) + Sync,
{
    let error: Mutex<Option<io::Error>> = Mutex::new(None);

    graph.pool().run_batch(group_by_block(graph, frontier), |(block_id, vertices)| {
        let ref_hint = vertices.len() as i64;
        let result = graph.with_block(block_id, ref_hint, |block| {
            for &v in &vertices {
                let record = graph.record(v);
                update(v, record.degree, block.neighbours(record.offset, record.degree), active);
            }
        });
        if let Err(e) = result {
            *error.lock().unwrap() = Some(e);
        }
    });

    take_error(error)
}

pub fn process_queue_in_blocks_direct<F>(
    graph: &Graph,
    frontier: &[VertexId],
    next: &Mutex<Vec<VertexId>>,
    update: F,
) -> io::Result<()>
where
    F: Fn(VertexId, u32, &[VertexId], &Mutex<Vec<VertexId>>) + Sync,
{
    let error: Mutex<Option<io::Error>> = Mutex::new(None);

    graph.pool().run_batch(group_by_block(graph, frontier), |(block_id, vertices)| {
        let ref_hint = vertices.len() as i64;
        let result = graph.with_block(block_id, ref_hint, |block| {
            for &v in &vertices {
                let record = graph.record(v);
                update(v, record.degree, block.neighbours(record.offset, record.degree), next);
            }
        });
        if let Err(e) = result {
            *error.lock().unwrap() = Some(e);
        }
    });

    take_error(error)
}
