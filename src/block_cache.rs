//! Process-global LRU cache of decoded DEM row bands.
//!
//! File-backed sources decode fixed-height bands of grid rows from raw
//! bytes. Tiles processed concurrently against the same dataset tend to
//! request overlapping bands, so decoded bands are shared process-wide
//! under a single byte budget. When a dataset file is replaced on disk its
//! stale bands can be dropped with [`purge_source`].

use lru::LruCache;
use std::sync::{Arc, LazyLock, Mutex};

/// Total byte budget for decoded bands across all sources.
const CACHE_CAPACITY_BYTES: usize = 256 * 1024 * 1024;

/// Grids a file-backed source can carry.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum GridKind {
    Elevation,
    Surface,
}

#[derive(Clone, Eq, PartialEq, Hash)]
struct BlockKey {
    /// Source identifier (path or URL), shared to keep keys cheap to clone.
    source: Arc<str>,
    grid: GridKind,
    band: u32,
}

fn band_bytes(data: &[i16]) -> usize {
    data.len() * std::mem::size_of::<i16>()
}

/// Byte-budgeted LRU over decoded bands. Accounting is derived from the
/// stored band lengths, so `bytes` is always the sum of what `entries`
/// actually holds.
struct BlockCache {
    entries: LruCache<BlockKey, Arc<Vec<i16>>>,
    bytes: usize,
    capacity: usize,
}

impl BlockCache {
    fn new(capacity: usize) -> Self {
        BlockCache {
            entries: LruCache::unbounded(),
            bytes: 0,
            capacity,
        }
    }

    fn get(&mut self, key: &BlockKey) -> Option<Arc<Vec<i16>>> {
        self.entries.get(key).cloned()
    }

    fn insert(&mut self, key: BlockKey, data: Arc<Vec<i16>>) {
        let incoming = band_bytes(&data);
        if incoming > self.capacity {
            return;
        }

        self.forget(&key);
        while self.bytes + incoming > self.capacity {
            match self.entries.pop_lru() {
                Some((_, evicted)) => self.bytes -= band_bytes(&evicted),
                None => break,
            }
        }

        self.bytes += incoming;
        self.entries.put(key, data);
    }

    /// Drop one band if present, keeping the byte accounting in step.
    fn forget(&mut self, key: &BlockKey) {
        if let Some(old) = self.entries.pop(key) {
            self.bytes -= band_bytes(&old);
        }
    }

    fn purge_source(&mut self, source: &str) {
        // LruCache has no retain; collect the doomed keys first.
        let doomed: Vec<BlockKey> = self
            .entries
            .iter()
            .map(|(key, _)| key)
            .filter(|key| key.source.as_ref() == source)
            .cloned()
            .collect();
        for key in &doomed {
            self.forget(key);
        }
    }
}

static BLOCK_CACHE: LazyLock<Mutex<BlockCache>> =
    LazyLock::new(|| Mutex::new(BlockCache::new(CACHE_CAPACITY_BYTES)));

fn make_key(source: &str, grid: GridKind, band: usize) -> BlockKey {
    BlockKey {
        source: Arc::from(source),
        grid,
        band: band as u32,
    }
}

/// Look up a decoded row band.
pub fn get(source: &str, grid: GridKind, band: usize) -> Option<Arc<Vec<i16>>> {
    let key = make_key(source, grid, band);
    BLOCK_CACHE.lock().unwrap().get(&key)
}

/// Insert a decoded row band, evicting least-recently-used bands until it
/// fits the byte budget. A band larger than the whole budget is not cached.
pub fn insert(source: &str, grid: GridKind, band: usize, data: Arc<Vec<i16>>) {
    let key = make_key(source, grid, band);
    BLOCK_CACHE.lock().unwrap().insert(key, data);
}

/// Drop every cached band of the named source, across all its grids.
pub fn purge_source(source: &str) {
    BLOCK_CACHE.lock().unwrap().purge_source(source);
}
