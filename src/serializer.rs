//! The block serializer contract the cache consumes, plus two concrete
//! implementations. The byte-level layout a production deployment would use for its
//! data files is explicitly out of scope for this crate (an external collaborator's
//! concern); these implementations exist so the cache's testable properties (round
//! trip, invariant checks under contention) have something real to read and write.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::block::{BlockId, EdgeBlock, BLOCK_CAPACITY_BYTES};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Read,
    Write,
}

/// The single metadata record persisted alongside the blocks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetaRecord {
    pub num_nodes: u32,
    pub num_edges: u64,
    pub num_edge_blocks: u32,
    pub num_vertex_blocks: u32,
    pub edge_block_bytes: u32,
}

const META_RECORD_BYTES: usize = 4 + 8 + 4 + 4 + 4;

impl MetaRecord {
    fn to_bytes(self) -> [u8; META_RECORD_BYTES] {
        let mut buf = [0u8; META_RECORD_BYTES];
        buf[0..4].copy_from_slice(&self.num_nodes.to_le_bytes());
        buf[4..12].copy_from_slice(&self.num_edges.to_le_bytes());
        buf[12..16].copy_from_slice(&self.num_edge_blocks.to_le_bytes());
        buf[16..20].copy_from_slice(&self.num_vertex_blocks.to_le_bytes());
        buf[20..24].copy_from_slice(&self.edge_block_bytes.to_le_bytes());
        buf
    }

    fn from_bytes(buf: &[u8; META_RECORD_BYTES]) -> Self {
        Self {
            num_nodes: u32::from_le_bytes(buf[0..4].try_into().unwrap()),
            num_edges: u64::from_le_bytes(buf[4..12].try_into().unwrap()),
            num_edge_blocks: u32::from_le_bytes(buf[12..16].try_into().unwrap()),
            num_vertex_blocks: u32::from_le_bytes(buf[16..20].try_into().unwrap()),
            edge_block_bytes: u32::from_le_bytes(buf[20..24].try_into().unwrap()),
        }
    }
}

/// Opaque sink/source for fixed-size edge blocks and the single metadata record, by
/// integer block id. Implementations must make `read_block` safe to call from any
/// worker thread concurrently for distinct block ids (the cache never calls it twice
/// concurrently for the *same* id thanks to the fill lock/eager fill precondition).
pub trait BlockSerializer: Send + Sync + std::fmt::Debug {
    fn mode(&self) -> Mode;
    fn read_block(&self, block_id: BlockId, out: &mut EdgeBlock) -> io::Result<()>;
    fn write_block(&self, block_id: BlockId, data: &EdgeBlock) -> io::Result<()>;
    fn read_metadata(&self) -> io::Result<MetaRecord>;
    fn write_metadata(&self, record: &MetaRecord) -> io::Result<()>;
}

/// In-memory serializer. The primary vehicle for unit and property tests, and handy
/// as a default for graphs small enough to never actually need paging.
#[derive(Debug)]
pub struct InMemorySerializer {
    mode: Mode,
    blocks: Mutex<HashMap<BlockId, EdgeBlock>>,
    meta: Mutex<Option<MetaRecord>>,
}

impl InMemorySerializer {
    pub fn for_write() -> Self {
        Self {
            mode: Mode::Write,
            blocks: Mutex::new(HashMap::new()),
            meta: Mutex::new(None),
        }
    }

    pub fn for_read() -> Self {
        Self {
            mode: Mode::Read,
            blocks: Mutex::new(HashMap::new()),
            meta: Mutex::new(None),
        }
    }
}

impl BlockSerializer for InMemorySerializer {
    fn mode(&self) -> Mode {
        self.mode
    }

    fn read_block(&self, block_id: BlockId, out: &mut EdgeBlock) -> io::Result<()> {
        match self.blocks.lock().unwrap().get(&block_id) {
            Some(block) => {
                out.as_mut_slice().copy_from_slice(block.as_slice());
                Ok(())
            }
            None => {
                out.as_mut_slice().fill(0);
                Ok(())
            }
        }
    }

    fn write_block(&self, block_id: BlockId, data: &EdgeBlock) -> io::Result<()> {
        self.blocks.lock().unwrap().insert(block_id, data.clone());
        Ok(())
    }

    fn read_metadata(&self) -> io::Result<MetaRecord> {
        self.meta
            .lock()
            .unwrap()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no metadata written"))
    }

    fn write_metadata(&self, record: &MetaRecord) -> io::Result<()> {
        *self.meta.lock().unwrap() = Some(*record);
        Ok(())
    }
}

/// File-backed serializer. Blocks live at a fixed offset (`block_id * BLOCK_CAPACITY_BYTES`)
/// in one data file; the metadata record lives in a small sibling file. This is a
/// minimal, working I/O path, not a production on-disk format.
#[derive(Debug)]
pub struct FileBlockSerializer {
    mode: Mode,
    data_file: Mutex<File>,
    meta_path: PathBuf,
}

impl FileBlockSerializer {
    pub fn open<P: AsRef<Path>>(directory: P, mode: Mode) -> io::Result<Self> {
        let directory = directory.as_ref();
        std::fs::create_dir_all(directory)?;
        let data_path = directory.join("blocks.dat");
        let data_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(data_path)?;
        Ok(Self {
            mode,
            data_file: Mutex::new(data_file),
            meta_path: directory.join("meta.dat"),
        })
    }
}

impl BlockSerializer for FileBlockSerializer {
    fn mode(&self) -> Mode {
        self.mode
    }

    fn read_block(&self, block_id: BlockId, out: &mut EdgeBlock) -> io::Result<()> {
        let mut file = self.data_file.lock().unwrap();
        let offset = block_id as u64 * BLOCK_CAPACITY_BYTES as u64;
        file.seek(SeekFrom::Start(offset))?;
        match file.read_exact(out.as_bytes_mut()) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                out.as_mut_slice().fill(0);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    fn write_block(&self, block_id: BlockId, data: &EdgeBlock) -> io::Result<()> {
        let mut file = self.data_file.lock().unwrap();
        let offset = block_id as u64 * BLOCK_CAPACITY_BYTES as u64;
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(data.as_bytes())?;
        Ok(())
    }

    fn read_metadata(&self) -> io::Result<MetaRecord> {
        let mut buf = [0u8; META_RECORD_BYTES];
        let mut file = File::open(&self.meta_path)?;
        file.read_exact(&mut buf)?;
        Ok(MetaRecord::from_bytes(&buf))
    }

    fn write_metadata(&self, record: &MetaRecord) -> io::Result<()> {
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&self.meta_path)?;
        file.write_all(&record.to_bytes())?;
        file.sync_all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::TestDir;

    #[test]
    fn in_memory_round_trip_fill_law() {
        let serializer = InMemorySerializer::for_write();
        let mut written = EdgeBlock::zeroed();
        written.as_mut_slice()[0] = 42;
        serializer.write_block(3, &written).unwrap();

        let mut read_back = EdgeBlock::zeroed();
        serializer.read_block(3, &mut read_back).unwrap();
        assert_eq!(read_back.as_slice(), written.as_slice());
    }

    #[test]
    fn in_memory_missing_block_reads_as_zero() {
        let serializer = InMemorySerializer::for_read();
        let mut out = EdgeBlock::zeroed();
        out.as_mut_slice()[0] = 0xff;
        serializer.read_block(5, &mut out).unwrap();
        assert!(out.as_slice().iter().all(|&v| v == 0));
    }

    #[test]
    fn file_backed_round_trip_fill_law() {
        let dir = TestDir::new_temp("serializer_round_trip");
        let serializer = FileBlockSerializer::open(&dir, Mode::Write).unwrap();
        let mut written = EdgeBlock::zeroed();
        written.as_mut_slice()[1] = 7;
        serializer.write_block(0, &written).unwrap();

        let mut read_back = EdgeBlock::zeroed();
        serializer.read_block(0, &mut read_back).unwrap();
        assert_eq!(read_back.as_slice(), written.as_slice());
    }

    #[test]
    fn file_backed_metadata_round_trips() {
        let dir = TestDir::new_temp("serializer_metadata");
        let serializer = FileBlockSerializer::open(&dir, Mode::Write).unwrap();
        let record = MetaRecord {
            num_nodes: 10,
            num_edges: 20,
            num_edge_blocks: 2,
            num_vertex_blocks: 1,
            edge_block_bytes: BLOCK_CAPACITY_BYTES as u32,
        };
        serializer.write_metadata(&record).unwrap();
        assert_eq!(serializer.read_metadata().unwrap(), record);
    }
}
