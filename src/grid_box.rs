//! Frozen per-region sample cache and point interpolation.
//!
//! A [`GridBox`] is built once per non-empty region: the point-derived
//! extent is mapped into grid index space, widened by a one-cell halo where
//! the data boundary allows, and satisfied by a single bulk read. After
//! construction the box is self-sufficient; every point query inside it is
//! answered from the cached block without further I/O.
//!
//! Queries bilinearly blend the four bracketing samples. If any corner is
//! missing, blending would smear the sentinel into fabricated elevations,
//! so the query falls back to the raw sample at the truncated index.

use ndarray::Array2;

use crate::error::{DemGridError, Result};
use crate::extent::GeoBounds;
use crate::partition::Quadrant;
use crate::source::{truncated_index, GridSource, IndexWindow};

/// A region's extent frozen to grid-index-aligned bounds, plus the block of
/// raw samples covering it.
///
/// The geographic bounds are the *actual* coordinates of the fetched
/// boundary indices, not the original point-derived extent, so index math
/// and bounds always agree. Sample grids are populated exactly once by the
/// bulk read and never mutated afterwards.
#[derive(Debug)]
pub struct GridBox {
    quadrant: Quadrant,
    min_lat: f64,
    max_lat: f64,
    min_lon: f64,
    max_lon: f64,
    lat_count: usize,
    lon_count: usize,
    /// Grid spacing; `None` on a degenerate axis (single row/column).
    delta_lat: Option<f64>,
    delta_lon: Option<f64>,
    values: Array2<i16>,
    surface: Option<Array2<i16>>,
    missing_value: i16,
    use_averaging: bool,
}

impl GridBox {
    /// Attach grid data to a point-derived extent with one bulk read.
    ///
    /// The extent's corners are mapped to grid indices, expanded by a
    /// one-cell halo on every side not already at the data boundary (so
    /// interpolation near the extent edge has a real neighbor on both
    /// sides), and fetched as a single rectangular block. A read failure
    /// is fatal for the region and carries the quadrant and index window.
    pub fn fetch<S: GridSource + ?Sized>(
        quadrant: Quadrant,
        bounds: GeoBounds,
        source: &S,
        use_averaging: bool,
    ) -> Result<Self> {
        let lat_count = source.lat_count();
        let lon_count = source.lon_count();

        let mut min_lat_idx = source.lat_index(bounds.min_lat);
        let mut max_lat_idx = source.lat_index(bounds.max_lat);
        let mut min_lon_idx = source.lon_index(bounds.min_lon);
        let mut max_lon_idx = source.lon_index(bounds.max_lon);

        // One-cell halo where the data boundary allows.
        if min_lat_idx > 0 {
            min_lat_idx -= 1;
        }
        if max_lat_idx + 1 < lat_count {
            max_lat_idx += 1;
        }
        if min_lon_idx > 0 {
            min_lon_idx -= 1;
        }
        if max_lon_idx + 1 < lon_count {
            max_lon_idx += 1;
        }

        let window = IndexWindow::from_inclusive(min_lat_idx, max_lat_idx, min_lon_idx, max_lon_idx);

        let values = source
            .fetch_block(window)
            .map_err(|e| DemGridError::block_read(quadrant, window, e))?;
        let surface = source
            .fetch_surface_block(window)
            .map_err(|e| DemGridError::block_read(quadrant, window, e))?;

        if values.dim() != (window.lat_count, window.lon_count) {
            return Err(DemGridError::geometry(format!(
                "source returned {:?} block for window {window}",
                values.dim()
            )));
        }
        if let Some(surface) = &surface {
            if surface.dim() != values.dim() {
                return Err(DemGridError::geometry(format!(
                    "surface block {:?} does not match value block {:?}",
                    surface.dim(),
                    values.dim()
                )));
            }
        }

        Ok(Self::from_parts(
            quadrant,
            GeoBounds {
                min_lat: source.lat_at(min_lat_idx),
                max_lat: source.lat_at(max_lat_idx),
                min_lon: source.lon_at(min_lon_idx),
                max_lon: source.lon_at(max_lon_idx),
            },
            values,
            surface,
            source.missing_value(),
            use_averaging,
        ))
    }

    fn from_parts(
        quadrant: Quadrant,
        bounds: GeoBounds,
        values: Array2<i16>,
        surface: Option<Array2<i16>>,
        missing_value: i16,
        use_averaging: bool,
    ) -> Self {
        let (lat_count, lon_count) = values.dim();

        let delta_lat = (lat_count > 1)
            .then(|| (bounds.max_lat - bounds.min_lat) / (lat_count - 1) as f64);
        let delta_lon = (lon_count > 1)
            .then(|| (bounds.max_lon - bounds.min_lon) / (lon_count - 1) as f64);

        Self {
            quadrant,
            min_lat: bounds.min_lat,
            max_lat: bounds.max_lat,
            min_lon: bounds.min_lon,
            max_lon: bounds.max_lon,
            lat_count,
            lon_count,
            delta_lat,
            delta_lon,
            values,
            surface,
            missing_value,
            use_averaging,
        }
    }

    /// The quadrant this box serves.
    #[must_use]
    pub fn quadrant(&self) -> Quadrant {
        self.quadrant
    }

    /// Index-aligned geographic bounds of the cached block.
    #[must_use]
    pub fn bounds(&self) -> GeoBounds {
        GeoBounds {
            min_lat: self.min_lat,
            max_lat: self.max_lat,
            min_lon: self.min_lon,
            max_lon: self.max_lon,
        }
    }

    /// Rows in the cached block.
    #[must_use]
    pub fn lat_count(&self) -> usize {
        self.lat_count
    }

    /// Columns in the cached block.
    #[must_use]
    pub fn lon_count(&self) -> usize {
        self.lon_count
    }

    /// Grid spacing along latitude, `None` when the axis is degenerate.
    #[must_use]
    pub fn delta_lat(&self) -> Option<f64> {
        self.delta_lat
    }

    /// Grid spacing along longitude, `None` when the axis is degenerate.
    #[must_use]
    pub fn delta_lon(&self) -> Option<f64> {
        self.delta_lon
    }

    /// The wire sentinel of the underlying source.
    #[must_use]
    pub fn missing_value(&self) -> i16 {
        self.missing_value
    }

    /// Whether a co-registered surface-type block was attached.
    #[must_use]
    pub fn has_surface(&self) -> bool {
        self.surface.is_some()
    }

    /// Raw elevation sample at a block index, sentinel mapped to `None`.
    #[must_use]
    pub fn value_at(&self, lat_idx: usize, lon_idx: usize) -> Option<i16> {
        self.present(self.values[[lat_idx, lon_idx]])
    }

    /// Sample the elevation grid at a geographic coordinate.
    ///
    /// Bilinear over the four bracketing samples when averaging is enabled
    /// and both axes are non-degenerate; otherwise the raw sample at the
    /// truncated index. `None` means the resolved sample is missing data.
    /// Coordinates outside the box's bounds clamp to its edge samples.
    #[must_use]
    pub fn sample(&self, lat: f64, lon: f64) -> Option<i16> {
        self.interpolate(&self.values, lat, lon)
    }

    /// Sample the surface-type grid with the identical index geometry.
    #[must_use]
    pub fn sample_surface(&self, lat: f64, lon: f64) -> Option<i16> {
        self.interpolate(self.surface.as_ref()?, lat, lon)
    }

    fn present(&self, value: i16) -> Option<i16> {
        (value != self.missing_value).then_some(value)
    }

    fn lat_of(&self, index: usize) -> f64 {
        self.min_lat + index as f64 * self.delta_lat.unwrap_or(0.0)
    }

    fn lon_of(&self, index: usize) -> f64 {
        self.min_lon + index as f64 * self.delta_lon.unwrap_or(0.0)
    }

    fn interpolate(&self, grid: &Array2<i16>, lat: f64, lon: f64) -> Option<i16> {
        // Truncating index computation: floors toward the lower-indexed
        // sample, clamped into the block.
        let lat_idx = match self.delta_lat {
            Some(delta) => truncated_index(lat, self.min_lat, delta, self.lat_count),
            None => 0,
        };
        let lon_idx = match self.delta_lon {
            Some(delta) => truncated_index(lon, self.min_lon, delta, self.lon_count),
            None => 0,
        };

        let nearest = self.present(grid[[lat_idx, lon_idx]]);

        let (Some(_), Some(_)) = (self.delta_lat, self.delta_lon) else {
            // Degenerate axis: no meaningful spacing, nearest raw sample.
            return nearest;
        };
        if !self.use_averaging {
            return nearest;
        }

        // Bracketing pair per axis: a coordinate strictly above the sample
        // at the truncated index brackets upward, otherwise downward.
        let (north, south) = if lat > self.lat_of(lat_idx) {
            ((lat_idx + 1).min(self.lat_count - 1), lat_idx)
        } else {
            (lat_idx, lat_idx.saturating_sub(1))
        };
        let (east, west) = if lon > self.lon_of(lon_idx) {
            ((lon_idx + 1).min(self.lon_count - 1), lon_idx)
        } else {
            (lon_idx, lon_idx.saturating_sub(1))
        };

        let nw = grid[[north, west]];
        let ne = grid[[north, east]];
        let sw = grid[[south, west]];
        let se = grid[[south, east]];

        if nw == self.missing_value
            || ne == self.missing_value
            || sw == self.missing_value
            || se == self.missing_value
        {
            return nearest;
        }

        let lat_north = self.lat_of(north);
        let lat_south = self.lat_of(south);
        let (west_edge, east_edge) = if lat_north == lat_south {
            (f64::from(nw), f64::from(ne))
        } else {
            let w_south = (lat_north - lat) / (lat_north - lat_south);
            let w_north = 1.0 - w_south;
            (
                f64::from(nw) * w_north + f64::from(sw) * w_south,
                f64::from(ne) * w_north + f64::from(se) * w_south,
            )
        };

        let lon_east = self.lon_of(east);
        let lon_west = self.lon_of(west);
        let value = if lon_east == lon_west {
            east_edge
        } else {
            let w_west = (lon_east - lon) / (lon_east - lon_west);
            east_edge * (1.0 - w_west) + west_edge * w_west
        };

        // Deliberately truncating: the sample type is integral and the
        // cast keeps results bit-for-bit reproducible.
        Some(value as i16)
    }
}
