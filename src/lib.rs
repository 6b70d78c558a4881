//! # demgrid - Box Sampling Engine for Gridded Elevation Data
//!
//! A library for sampling coarse, gridded elevation/bathymetry datasets
//! onto arbitrary target rasters whose per-pixel geographic positions come
//! from an independent geocoding function.
//!
//! ## Features
//!
//! - **Region partitioning**: Buckets a tile's point cloud into hemisphere
//!   quadrants, so no bulk read ever spans the antimeridian or the equator
//! - **Single bulk read per region**: Point-derived extents are widened by
//!   a one-cell halo and satisfied with one rectangular fetch
//! - **Bilinear interpolation**: Smooth point queries with a principled
//!   fallback to the nearest raw sample when neighbors are missing
//! - **Explicit missing data**: Queries return `Option<i16>`; the wire
//!   sentinel survives only at the boundary with the gridded source
//! - **Pluggable sources**: In-memory grids, or raw `i16` grid files read
//!   by byte range from local disk or HTTP
//! - **Row-band caching**: Global LRU over decoded file blocks, shared by
//!   concurrently processed tiles
//!
//! ## Quick Start
//!
//! ```rust
//! use demgrid::{GeoBounds, GeoPoint, MemoryGridSource, TileSampler};
//! use ndarray::array;
//!
//! // A coarse 3x3 elevation grid spanning lat/lon [0, 2].
//! let bounds = GeoBounds { min_lat: 0.0, max_lat: 2.0, min_lon: 0.0, max_lon: 2.0 };
//! let values = array![[10, 20, 30], [40, 50, 60], [70, 80, 90]];
//! let source = MemoryGridSource::new(bounds, values, -32768).unwrap();
//!
//! // First pass: ingest every pixel's geographic position.
//! let mut sampler = TileSampler::new(source);
//! sampler.ingest(GeoPoint::new(1.0, 1.0));
//! sampler.ingest(GeoPoint::new(0.5, 0.5));
//!
//! // One bulk read per non-empty region.
//! sampler.finalize_regions().unwrap();
//!
//! // Second pass: interpolated elevations per pixel.
//! assert_eq!(sampler.sample(GeoPoint::new(1.0, 1.0)), Some(50));
//! assert_eq!(sampler.sample(GeoPoint::new(0.5, 0.5)), Some(30));
//! ```
//!
//! ## Architecture
//!
//! - [`sampler`]: Per-tile orchestration via [`TileSampler`]
//! - [`partition`]: Hemisphere-quadrant region assignment
//! - [`extent`]: Running bounding box grown during the ingestion pass
//! - [`grid_box`]: Frozen per-region sample cache and interpolation
//! - [`source`]: The [`GridSource`] seam plus bundled implementations
//! - [`range_reader`]: Byte-range I/O for file-backed grids
//! - [`block_cache`]: Global LRU for decoded row bands
//! - [`geometry`]: The [`GeoPoint`] coordinate type

// ============================================================================
// Public modules
// ============================================================================

pub mod block_cache;
pub mod error;
pub mod extent;
pub mod geometry;
pub mod grid_box;
pub mod partition;
pub mod range_reader;
pub mod sampler;
pub mod source;

// ============================================================================
// Core Sampling Types
// ============================================================================

pub use sampler::{SamplerOptions, TileSampler};

pub use grid_box::GridBox;

pub use partition::{Quadrant, RegionPartitioner};

pub use extent::{ExtentBuilder, GeoBounds};

// ============================================================================
// Geometry
// ============================================================================

pub use geometry::GeoPoint;

// ============================================================================
// Sources
// ============================================================================

pub use source::{GridSource, IndexWindow, MemoryGridSource};

pub use source::dem_file::{DemFileGeometry, DemFileSource};

// ============================================================================
// Range Readers (I/O Abstraction)
// ============================================================================

pub use range_reader::{
    create_range_reader,
    HttpRangeReader,
    LocalRangeReader,
    MemoryRangeReader,
    RangeReader,
};

// ============================================================================
// Errors
// ============================================================================

pub use error::{DemGridError, Result};
