//! Gridded-data source abstraction.
//!
//! A [`GridSource`] presents a coarse, regular lat/lon grid of signed 16-bit
//! samples and answers bulk rectangular reads. The sampling engine issues
//! exactly one [`fetch_block`](GridSource::fetch_block) per region per tile;
//! everything else (coordinate/index mapping, dimensions, the missing-value
//! sentinel) is metadata.
//!
//! Two implementations ship with the crate:
//! - [`MemoryGridSource`]: an `ndarray`-backed grid, for tests and for
//!   embedding data that is already resident.
//! - [`DemFileSource`](dem_file::DemFileSource): a whole-planet raw `i16`
//!   file read through the byte-range seam (local, HTTP, or in-memory).

pub mod dem_file;

use ndarray::Array2;
use std::fmt;

use crate::error::{DemGridError, Result};
use crate::extent::GeoBounds;

/// A rectangular index window into a source grid.
///
/// `lat_start`/`lon_start` are inclusive origins; the window covers
/// `lat_count` rows and `lon_count` columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexWindow {
    pub lat_start: usize,
    pub lon_start: usize,
    pub lat_count: usize,
    pub lon_count: usize,
}

impl IndexWindow {
    /// Create a window from its origin and size.
    #[must_use]
    pub fn new(lat_start: usize, lon_start: usize, lat_count: usize, lon_count: usize) -> Self {
        Self {
            lat_start,
            lon_start,
            lat_count,
            lon_count,
        }
    }

    /// Build the window spanning two inclusive index pairs.
    #[must_use]
    pub fn from_inclusive(
        min_lat_idx: usize,
        max_lat_idx: usize,
        min_lon_idx: usize,
        max_lon_idx: usize,
    ) -> Self {
        Self {
            lat_start: min_lat_idx,
            lon_start: min_lon_idx,
            lat_count: max_lat_idx - min_lat_idx + 1,
            lon_count: max_lon_idx - min_lon_idx + 1,
        }
    }

    /// Exclusive end of the latitude index range.
    #[must_use]
    pub fn lat_end(&self) -> usize {
        self.lat_start + self.lat_count
    }

    /// Exclusive end of the longitude index range.
    #[must_use]
    pub fn lon_end(&self) -> usize {
        self.lon_start + self.lon_count
    }

    /// Whether the window fits inside a grid of the given dimensions.
    #[must_use]
    pub fn fits(&self, lat_count: usize, lon_count: usize) -> bool {
        self.lat_count >= 1
            && self.lon_count >= 1
            && self.lat_end() <= lat_count
            && self.lon_end() <= lon_count
    }
}

impl fmt::Display for IndexWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "lat {}..{} x lon {}..{}",
            self.lat_start,
            self.lat_end(),
            self.lon_start,
            self.lon_end()
        )
    }
}

/// A regular lat/lon grid of `i16` samples answering bulk rectangular reads.
///
/// Index 0 on each axis is the minimum coordinate; coordinates grow with
/// index. Implementations must be safe to call from concurrently processed
/// tiles: the engine holds no lock around [`fetch_block`](Self::fetch_block),
/// so concurrent bulk reads must be reentrant.
pub trait GridSource: Send + Sync {
    /// Number of grid rows (latitude axis).
    fn lat_count(&self) -> usize;

    /// Number of grid columns (longitude axis).
    fn lon_count(&self) -> usize;

    /// The reserved sample value meaning "no data".
    fn missing_value(&self) -> i16;

    /// Map a latitude to its truncated grid row, clamped to
    /// `[0, lat_count - 1]`.
    fn lat_index(&self, lat: f64) -> usize;

    /// Map a longitude to its truncated grid column, clamped to
    /// `[0, lon_count - 1]`.
    fn lon_index(&self, lon: f64) -> usize;

    /// Latitude of a grid row.
    fn lat_at(&self, index: usize) -> f64;

    /// Longitude of a grid column.
    fn lon_at(&self, index: usize) -> f64;

    /// Read one rectangular block of raw samples.
    ///
    /// The returned array has shape `(window.lat_count, window.lon_count)`,
    /// row = latitude index. This is the engine's single blocking call; a
    /// failure here is fatal for the requesting tile and is never retried
    /// by the engine.
    fn fetch_block(&self, window: IndexWindow) -> Result<Array2<i16>>;

    /// Read the co-registered surface-type block for the same window, if
    /// this source carries one.
    fn fetch_surface_block(&self, _window: IndexWindow) -> Result<Option<Array2<i16>>> {
        Ok(None)
    }

    /// Whether this source carries a co-registered surface-type grid.
    fn has_surface(&self) -> bool {
        false
    }
}

/// Truncated coordinate-to-index mapping shared by the bundled sources.
pub(crate) fn truncated_index(coord: f64, min: f64, step: f64, count: usize) -> usize {
    debug_assert!(count >= 1);
    let raw = ((coord - min) / step).floor();
    raw.clamp(0.0, (count - 1) as f64) as usize
}

/// In-memory [`GridSource`] over an `ndarray` grid.
///
/// Rows are latitude (row 0 = `min_lat`), columns are longitude. Useful as
/// a test double and for datasets already resident in memory.
///
/// # Example
///
/// ```rust
/// use demgrid::{GeoBounds, MemoryGridSource};
/// use ndarray::array;
///
/// let bounds = GeoBounds { min_lat: 0.0, max_lat: 2.0, min_lon: 0.0, max_lon: 2.0 };
/// let values = array![[10, 20, 30], [40, 50, 60], [70, 80, 90]];
/// let source = MemoryGridSource::new(bounds, values, -32768).unwrap();
/// ```
pub struct MemoryGridSource {
    bounds: GeoBounds,
    step_lat: f64,
    step_lon: f64,
    values: Array2<i16>,
    surface: Option<Array2<i16>>,
    missing_value: i16,
}

impl MemoryGridSource {
    /// Create a source over `values` spanning `bounds`.
    ///
    /// Both axes need at least two samples so the grid spacing is defined.
    pub fn new(bounds: GeoBounds, values: Array2<i16>, missing_value: i16) -> Result<Self> {
        let (lat_count, lon_count) = values.dim();
        if lat_count < 2 || lon_count < 2 {
            return Err(DemGridError::geometry(format!(
                "grid must be at least 2x2, got {lat_count}x{lon_count}"
            )));
        }
        if bounds.min_lat >= bounds.max_lat || bounds.min_lon >= bounds.max_lon {
            return Err(DemGridError::geometry(format!(
                "inverted or empty bounds: lat [{}, {}], lon [{}, {}]",
                bounds.min_lat, bounds.max_lat, bounds.min_lon, bounds.max_lon
            )));
        }

        let step_lat = (bounds.max_lat - bounds.min_lat) / (lat_count - 1) as f64;
        let step_lon = (bounds.max_lon - bounds.min_lon) / (lon_count - 1) as f64;

        Ok(Self {
            bounds,
            step_lat,
            step_lon,
            values,
            surface: None,
            missing_value,
        })
    }

    /// Attach a co-registered surface-type grid of identical dimensions.
    pub fn with_surface(mut self, surface: Array2<i16>) -> Result<Self> {
        if surface.dim() != self.values.dim() {
            return Err(DemGridError::geometry(format!(
                "surface grid {:?} does not match value grid {:?}",
                surface.dim(),
                self.values.dim()
            )));
        }
        self.surface = Some(surface);
        Ok(self)
    }

    fn slice_block(grid: &Array2<i16>, window: IndexWindow) -> Array2<i16> {
        grid.slice(ndarray::s![
            window.lat_start..window.lat_end(),
            window.lon_start..window.lon_end()
        ])
        .to_owned()
    }

    fn check_window(&self, window: IndexWindow) -> Result<()> {
        let (lat_count, lon_count) = self.values.dim();
        if !window.fits(lat_count, lon_count) {
            return Err(DemGridError::WindowOutOfBounds {
                window,
                lat_count,
                lon_count,
            });
        }
        Ok(())
    }
}

impl GridSource for MemoryGridSource {
    fn lat_count(&self) -> usize {
        self.values.dim().0
    }

    fn lon_count(&self) -> usize {
        self.values.dim().1
    }

    fn missing_value(&self) -> i16 {
        self.missing_value
    }

    fn lat_index(&self, lat: f64) -> usize {
        truncated_index(lat, self.bounds.min_lat, self.step_lat, self.lat_count())
    }

    fn lon_index(&self, lon: f64) -> usize {
        truncated_index(lon, self.bounds.min_lon, self.step_lon, self.lon_count())
    }

    fn lat_at(&self, index: usize) -> f64 {
        self.bounds.min_lat + index as f64 * self.step_lat
    }

    fn lon_at(&self, index: usize) -> f64 {
        self.bounds.min_lon + index as f64 * self.step_lon
    }

    fn fetch_block(&self, window: IndexWindow) -> Result<Array2<i16>> {
        self.check_window(window)?;
        Ok(Self::slice_block(&self.values, window))
    }

    fn fetch_surface_block(&self, window: IndexWindow) -> Result<Option<Array2<i16>>> {
        match &self.surface {
            Some(surface) => {
                self.check_window(window)?;
                Ok(Some(Self::slice_block(surface, window)))
            }
            None => Ok(None),
        }
    }

    fn has_surface(&self) -> bool {
        self.surface.is_some()
    }
}
