//! Byte-range reader seam for file-backed DEM grids.
//!
//! Whole-planet elevation grids are large (a 30-arcsecond global grid is
//! over 1.7 GB of `i16`s), and a tile's regions only ever touch a few row
//! bands of it. Reading by byte range keeps memory flat and lets the same
//! grid-decoding code serve local files, HTTP-hosted datasets (via Range
//! requests), and in-memory buffers in tests.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{DemGridError, Result};

/// Trait for reading byte ranges from any backing store.
///
/// Implementations must be reentrant: concurrently processed tiles share
/// one reader through an `Arc`.
pub trait RangeReader: Send + Sync {
    /// Read `length` bytes starting at `offset`.
    fn read_range(&self, offset: u64, length: usize) -> Result<Vec<u8>>;

    /// Total size of the backing store in bytes.
    fn size(&self) -> u64;

    /// Human-readable identifier, used for logging and as a cache key.
    fn identifier(&self) -> &str;
}

/// Range reader over a local file.
///
/// Opens the file per read; the OS page cache makes repeated row-band
/// reads cheap and there is no shared file handle to lock around.
pub struct LocalRangeReader {
    path: PathBuf,
    identifier: String,
    size: u64,
}

impl LocalRangeReader {
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let metadata = std::fs::metadata(&path)?;
        let identifier = path.to_string_lossy().into_owned();
        Ok(Self {
            path,
            identifier,
            size: metadata.len(),
        })
    }
}

impl RangeReader for LocalRangeReader {
    fn read_range(&self, offset: u64, length: usize) -> Result<Vec<u8>> {
        let mut file = File::open(&self.path)?;
        file.seek(SeekFrom::Start(offset))?;
        let mut buffer = vec![0u8; length];
        file.read_exact(&mut buffer)?;
        Ok(buffer)
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn identifier(&self) -> &str {
        &self.identifier
    }
}

/// Range reader over an HTTP(S)-hosted dataset using Range requests.
pub struct HttpRangeReader {
    url: String,
    size: u64,
    client: reqwest::blocking::Client,
}

impl HttpRangeReader {
    pub fn new(url: &str) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| DemGridError::http(e.to_string()))?;

        // Size up front via HEAD so geometry validation can run on open.
        let response = client
            .head(url)
            .send()
            .map_err(|e| DemGridError::http(e.to_string()))?;
        let size = response
            .headers()
            .get("content-length")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok())
            .ok_or_else(|| DemGridError::http(format!("no content-length from {url}")))?;

        Ok(Self {
            url: url.to_string(),
            size,
            client,
        })
    }
}

impl RangeReader for HttpRangeReader {
    fn read_range(&self, offset: u64, length: usize) -> Result<Vec<u8>> {
        let range = format!("bytes={}-{}", offset, offset + length as u64 - 1);
        let response = self
            .client
            .get(&self.url)
            .header("Range", range)
            .send()
            .map_err(|e| DemGridError::http(e.to_string()))?;

        if !response.status().is_success() {
            return Err(DemGridError::http(format!(
                "range request to {} failed: {}",
                self.url,
                response.status()
            )));
        }

        let bytes = response
            .bytes()
            .map_err(|e| DemGridError::http(e.to_string()))?;
        if bytes.len() != length {
            return Err(DemGridError::http(format!(
                "range request to {} returned {} bytes, expected {length}",
                self.url,
                bytes.len()
            )));
        }
        Ok(bytes.to_vec())
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn identifier(&self) -> &str {
        &self.url
    }
}

/// Range reader over an in-memory buffer, for tests and embedded data.
pub struct MemoryRangeReader {
    data: Vec<u8>,
    identifier: String,
}

impl MemoryRangeReader {
    #[must_use]
    pub fn new(data: Vec<u8>, identifier: impl Into<String>) -> Self {
        Self {
            data,
            identifier: identifier.into(),
        }
    }
}

impl RangeReader for MemoryRangeReader {
    fn read_range(&self, offset: u64, length: usize) -> Result<Vec<u8>> {
        let start = usize::try_from(offset)
            .map_err(|_| DemGridError::geometry(format!("offset {offset} out of range")))?;
        let end = start.checked_add(length).filter(|&e| e <= self.data.len());
        match end {
            Some(end) => Ok(self.data[start..end].to_vec()),
            None => Err(DemGridError::geometry(format!(
                "range {offset}+{length} exceeds buffer of {} bytes",
                self.data.len()
            ))),
        }
    }

    fn size(&self) -> u64 {
        self.data.len() as u64
    }

    fn identifier(&self) -> &str {
        &self.identifier
    }
}

/// Create a range reader from a path or URL.
///
/// `http://` and `https://` dispatch to [`HttpRangeReader`]; anything else
/// is treated as a local path.
pub fn create_range_reader(source: &str) -> Result<Arc<dyn RangeReader>> {
    if source.starts_with("http://") || source.starts_with("https://") {
        // Validate eagerly so a typo'd URL fails at open, not on first read.
        url::Url::parse(source).map_err(|e| DemGridError::http(e.to_string()))?;
        Ok(Arc::new(HttpRangeReader::new(source)?))
    } else {
        Ok(Arc::new(LocalRangeReader::new(source)?))
    }
}
