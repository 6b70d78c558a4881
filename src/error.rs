//! Error types for the box-sampling engine.
//!
//! Invalid points and missing samples are *not* errors anywhere in this
//! crate; they surface as `None` / the wire sentinel. Errors are reserved
//! for the cases that must abort a tile: a failed bulk read against the
//! gridded source, or a source whose declared geometry is inconsistent.

use thiserror::Error;

use crate::partition::Quadrant;
use crate::source::IndexWindow;

/// Errors that can occur while attaching grid data or reading a source.
#[derive(Error, Debug)]
pub enum DemGridError {
    /// A bulk read against the gridded source failed. Fatal for the tile;
    /// the quadrant and index window identify which region to log and abort.
    #[error("bulk read failed for {quadrant} region, window {window}: {source}")]
    BlockRead {
        quadrant: Quadrant,
        window: IndexWindow,
        #[source]
        source: Box<DemGridError>,
    },

    /// A requested index window does not fit inside the source grid.
    #[error("window {window} exceeds grid dimensions {lat_count}x{lon_count}")]
    WindowOutOfBounds {
        window: IndexWindow,
        lat_count: usize,
        lon_count: usize,
    },

    /// The declared grid geometry is unusable (zero-sized axis, inverted
    /// bounds, file size mismatch, ...).
    #[error("invalid grid geometry: {0}")]
    Geometry(String),

    /// An HTTP range request against a remote dataset failed.
    #[error("http request failed: {0}")]
    Http(String),

    /// Filesystem I/O failure.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl DemGridError {
    /// Create a [`DemGridError::Geometry`] error.
    pub fn geometry(msg: impl Into<String>) -> Self {
        Self::Geometry(msg.into())
    }

    /// Create a [`DemGridError::Http`] error.
    pub fn http(msg: impl Into<String>) -> Self {
        Self::Http(msg.into())
    }

    /// Wrap a source failure with the region context required to log and
    /// abort the affected tile.
    pub fn block_read(quadrant: Quadrant, window: IndexWindow, source: DemGridError) -> Self {
        Self::BlockRead {
            quadrant,
            window,
            source: Box::new(source),
        }
    }
}

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, DemGridError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_read_error_names_region_and_window() {
        let window = IndexWindow::new(4, 10, 3, 5);
        let inner = DemGridError::http("connection reset");
        let err = DemGridError::block_read(Quadrant::SouthWest, window, inner);

        let message = err.to_string();
        assert!(message.contains("south-west"));
        assert!(message.contains("lat 4..7"));
        assert!(message.contains("connection reset"));
    }
}
