//! File-backed whole-planet DEM grid source.
//!
//! Reads a regular lat/lon grid stored as raw big-endian `i16`, row-major
//! with the northernmost row first (the usual raster order). Access goes
//! through the [`RangeReader`] seam, so the same code serves local files,
//! HTTP-hosted datasets, and in-memory buffers. Decoded row bands are
//! shared process-wide through the [`block_cache`](crate::block_cache).
//!
//! An optional companion file of identical geometry provides the
//! co-registered surface-type grid.

use ndarray::Array2;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use crate::block_cache::{self, GridKind};
use crate::error::{DemGridError, Result};
use crate::range_reader::{create_range_reader, RangeReader};
use crate::source::{truncated_index, GridSource, IndexWindow};

/// Grid rows decoded per cache band.
const BAND_ROWS: usize = 32;

/// Declared layout of a raw DEM grid file.
#[derive(Debug, Clone, Copy)]
pub struct DemFileGeometry {
    pub lat_count: usize,
    pub lon_count: usize,
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
    pub missing_value: i16,
}

impl DemFileGeometry {
    /// Geometry of a grid covering the whole globe edge to edge.
    #[must_use]
    pub fn global(lat_count: usize, lon_count: usize, missing_value: i16) -> Self {
        Self {
            lat_count,
            lon_count,
            min_lat: -90.0,
            max_lat: 90.0,
            min_lon: -180.0,
            max_lon: 180.0,
            missing_value,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.lat_count < 2 || self.lon_count < 2 {
            return Err(DemGridError::geometry(format!(
                "grid must be at least 2x2, got {}x{}",
                self.lat_count, self.lon_count
            )));
        }
        if self.min_lat >= self.max_lat || self.min_lon >= self.max_lon {
            return Err(DemGridError::geometry(format!(
                "inverted or empty bounds: lat [{}, {}], lon [{}, {}]",
                self.min_lat, self.max_lat, self.min_lon, self.max_lon
            )));
        }
        Ok(())
    }

    fn expected_bytes(&self) -> u64 {
        self.lat_count as u64 * self.lon_count as u64 * 2
    }
}

/// [`GridSource`] over a raw big-endian `i16` grid file.
pub struct DemFileSource {
    reader: Arc<dyn RangeReader>,
    surface_reader: Option<Arc<dyn RangeReader>>,
    geometry: DemFileGeometry,
    step_lat: f64,
    step_lon: f64,
}

impl fmt::Debug for DemFileSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DemFileSource")
            .field("source", &self.reader.identifier())
            .field(
                "surface",
                &self.surface_reader.as_ref().map(|r| r.identifier()),
            )
            .field("geometry", &self.geometry)
            .finish()
    }
}

impl DemFileSource {
    /// Open a DEM grid from a path or URL, validating the backing store's
    /// size against the declared geometry.
    pub fn open(source: &str, geometry: DemFileGeometry) -> Result<Self> {
        Self::from_reader(create_range_reader(source)?, geometry)
    }

    /// Wrap an existing range reader.
    pub fn from_reader(reader: Arc<dyn RangeReader>, geometry: DemFileGeometry) -> Result<Self> {
        geometry.validate()?;
        if reader.size() != geometry.expected_bytes() {
            return Err(DemGridError::geometry(format!(
                "{} holds {} bytes but geometry {}x{} needs {}",
                reader.identifier(),
                reader.size(),
                geometry.lat_count,
                geometry.lon_count,
                geometry.expected_bytes()
            )));
        }

        let step_lat = (geometry.max_lat - geometry.min_lat) / (geometry.lat_count - 1) as f64;
        let step_lon = (geometry.max_lon - geometry.min_lon) / (geometry.lon_count - 1) as f64;

        Ok(Self {
            reader,
            surface_reader: None,
            geometry,
            step_lat,
            step_lon,
        })
    }

    /// Attach a companion surface-type file of identical geometry.
    pub fn with_surface(mut self, source: &str) -> Result<Self> {
        let reader = create_range_reader(source)?;
        if reader.size() != self.geometry.expected_bytes() {
            return Err(DemGridError::geometry(format!(
                "surface file {} holds {} bytes, expected {}",
                reader.identifier(),
                reader.size(),
                self.geometry.expected_bytes()
            )));
        }
        self.surface_reader = Some(reader);
        Ok(self)
    }

    /// Attach a surface-type range reader of identical geometry.
    pub fn with_surface_reader(mut self, reader: Arc<dyn RangeReader>) -> Result<Self> {
        if reader.size() != self.geometry.expected_bytes() {
            return Err(DemGridError::geometry(format!(
                "surface reader {} holds {} bytes, expected {}",
                reader.identifier(),
                reader.size(),
                self.geometry.expected_bytes()
            )));
        }
        self.surface_reader = Some(reader);
        Ok(self)
    }

    /// Decode one band of file rows, going through the global cache.
    fn band(&self, reader: &Arc<dyn RangeReader>, grid: GridKind, band: usize) -> Result<Arc<Vec<i16>>> {
        if let Some(cached) = block_cache::get(reader.identifier(), grid, band) {
            return Ok(cached);
        }

        let first_file_row = band * BAND_ROWS;
        let rows = BAND_ROWS.min(self.geometry.lat_count - first_file_row);
        let offset = first_file_row as u64 * self.geometry.lon_count as u64 * 2;
        let length = rows * self.geometry.lon_count * 2;

        let bytes = reader.read_range(offset, length)?;
        let mut samples = Vec::with_capacity(rows * self.geometry.lon_count);
        for pair in bytes.chunks_exact(2) {
            samples.push(i16::from_be_bytes([pair[0], pair[1]]));
        }
        let samples = Arc::new(samples);

        debug!(
            source = reader.identifier(),
            ?grid,
            band,
            rows,
            "decoded DEM row band"
        );
        block_cache::insert(reader.identifier(), grid, band, Arc::clone(&samples));
        Ok(samples)
    }

    fn read_window(
        &self,
        reader: &Arc<dyn RangeReader>,
        grid: GridKind,
        window: IndexWindow,
    ) -> Result<Array2<i16>> {
        if !window.fits(self.geometry.lat_count, self.geometry.lon_count) {
            return Err(DemGridError::WindowOutOfBounds {
                window,
                lat_count: self.geometry.lat_count,
                lon_count: self.geometry.lon_count,
            });
        }

        let mut block = Array2::zeros((window.lat_count, window.lon_count));
        for (out_row, lat_idx) in (window.lat_start..window.lat_end()).enumerate() {
            // The file stores the northernmost row first; grid index 0 is
            // the southernmost row.
            let file_row = self.geometry.lat_count - 1 - lat_idx;
            let band_data = self.band(reader, grid, file_row / BAND_ROWS)?;
            let row_in_band = file_row % BAND_ROWS;
            let start = row_in_band * self.geometry.lon_count + window.lon_start;

            let src = &band_data[start..start + window.lon_count];
            block
                .row_mut(out_row)
                .iter_mut()
                .zip(src)
                .for_each(|(dst, &s)| *dst = s);
        }
        Ok(block)
    }
}

impl GridSource for DemFileSource {
    fn lat_count(&self) -> usize {
        self.geometry.lat_count
    }

    fn lon_count(&self) -> usize {
        self.geometry.lon_count
    }

    fn missing_value(&self) -> i16 {
        self.geometry.missing_value
    }

    fn lat_index(&self, lat: f64) -> usize {
        truncated_index(lat, self.geometry.min_lat, self.step_lat, self.geometry.lat_count)
    }

    fn lon_index(&self, lon: f64) -> usize {
        truncated_index(lon, self.geometry.min_lon, self.step_lon, self.geometry.lon_count)
    }

    fn lat_at(&self, index: usize) -> f64 {
        self.geometry.min_lat + index as f64 * self.step_lat
    }

    fn lon_at(&self, index: usize) -> f64 {
        self.geometry.min_lon + index as f64 * self.step_lon
    }

    fn fetch_block(&self, window: IndexWindow) -> Result<Array2<i16>> {
        self.read_window(&self.reader, GridKind::Elevation, window)
    }

    fn fetch_surface_block(&self, window: IndexWindow) -> Result<Option<Array2<i16>>> {
        match &self.surface_reader {
            Some(reader) => Ok(Some(self.read_window(reader, GridKind::Surface, window)?)),
            None => Ok(None),
        }
    }

    fn has_surface(&self) -> bool {
        self.surface_reader.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::GeoPoint;
    use crate::range_reader::MemoryRangeReader;
    use crate::sampler::TileSampler;
    use ndarray::array;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const MISSING: i16 = -32768;

    /// Encode a grid (row 0 = southernmost) into the north-first file
    /// layout, big-endian.
    fn encode_north_first(grid: &Array2<i16>) -> Vec<u8> {
        let (rows, _cols) = grid.dim();
        let mut bytes = Vec::new();
        for r in (0..rows).rev() {
            for &v in grid.row(r) {
                bytes.extend_from_slice(&v.to_be_bytes());
            }
        }
        bytes
    }

    fn test_geometry(lat_count: usize, lon_count: usize) -> DemFileGeometry {
        DemFileGeometry {
            lat_count,
            lon_count,
            min_lat: 0.0,
            max_lat: (lat_count - 1) as f64,
            min_lon: 0.0,
            max_lon: (lon_count - 1) as f64,
            missing_value: MISSING,
        }
    }

    fn memory_source(grid: &Array2<i16>, id: &str) -> DemFileSource {
        let (lat_count, lon_count) = grid.dim();
        let reader = Arc::new(MemoryRangeReader::new(
            encode_north_first(grid),
            id.to_string(),
        ));
        DemFileSource::from_reader(reader, test_geometry(lat_count, lon_count)).unwrap()
    }

    #[test]
    fn test_global_geometry_mapping() {
        let geometry = DemFileGeometry::global(19, 37, MISSING);
        let reader = Arc::new(MemoryRangeReader::new(
            vec![0u8; 19 * 37 * 2],
            "mem:global",
        ));
        let source = DemFileSource::from_reader(reader, geometry).unwrap();

        assert_eq!(source.lat_at(0), -90.0);
        assert_eq!(source.lat_at(18), 90.0);
        assert_eq!(source.lon_at(0), -180.0);
        assert_eq!(source.lon_at(36), 180.0);
        assert_eq!(source.lat_index(-90.0), 0);
        assert_eq!(source.lon_index(179.9), 35); // truncating
        assert_eq!(source.lon_index(180.0), 36);
    }

    #[test]
    fn test_source_debug_names_backing_stores() {
        let grid = array![[1, 2], [3, 4]];
        let surf_reader = Arc::new(MemoryRangeReader::new(
            encode_north_first(&grid),
            "mem:debug-surface",
        ));
        let source = memory_source(&grid, "mem:debug-elev")
            .with_surface_reader(surf_reader)
            .unwrap();

        let dump = format!("{source:?}");
        assert!(dump.contains("mem:debug-elev"));
        assert!(dump.contains("mem:debug-surface"));
        assert!(dump.contains("geometry"));
    }

    #[test]
    fn test_open_rejects_size_mismatch() {
        let reader = Arc::new(MemoryRangeReader::new(vec![0u8; 10], "mem:short"));
        let err = DemFileSource::from_reader(reader, test_geometry(3, 3)).unwrap_err();
        assert!(matches!(err, DemGridError::Geometry(_)));
    }

    #[test]
    fn test_fetch_block_decodes_north_first_layout() {
        let grid = array![[10, 20, 30], [40, 50, 60], [70, 80, 90]];
        let source = memory_source(&grid, "mem:north-first");

        let block = source
            .fetch_block(IndexWindow::new(0, 0, 3, 3))
            .unwrap();
        assert_eq!(block, grid);

        let partial = source
            .fetch_block(IndexWindow::new(1, 1, 2, 2))
            .unwrap();
        assert_eq!(partial, array![[50, 60], [80, 90]]);
    }

    #[test]
    fn test_fetch_block_rejects_out_of_bounds_window() {
        let grid = array![[1, 2], [3, 4]];
        let source = memory_source(&grid, "mem:oob");
        assert!(source.fetch_block(IndexWindow::new(1, 0, 2, 2)).is_err());
    }

    #[test]
    fn test_fetch_spanning_multiple_bands() {
        // Taller than one cache band, so reads cross a band boundary.
        let lat_count = BAND_ROWS * 2 + 5;
        let grid = Array2::from_shape_fn((lat_count, 4), |(r, c)| (r * 10 + c) as i16);
        let source = memory_source(&grid, "mem:multi-band");

        // Grid rows 33..39 map to file rows 35..29, straddling the band
        // boundary at file row 32.
        let window = IndexWindow::new(BAND_ROWS + 1, 1, 6, 2);
        let block = source.fetch_block(window).unwrap();
        for (out_row, lat_idx) in (window.lat_start..window.lat_end()).enumerate() {
            assert_eq!(block[[out_row, 0]], (lat_idx * 10 + 1) as i16);
            assert_eq!(block[[out_row, 1]], (lat_idx * 10 + 2) as i16);
        }
    }

    #[test]
    fn test_local_file_round_trip_through_sampler() {
        let grid = array![[10, 20, 30], [40, 50, 60], [70, 80, 90]];
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&encode_north_first(&grid)).unwrap();
        file.flush().unwrap();

        let source =
            DemFileSource::open(file.path().to_str().unwrap(), test_geometry(3, 3)).unwrap();

        let mut sampler = TileSampler::new(source);
        sampler.ingest(GeoPoint::new(1.0, 1.0));
        sampler.ingest(GeoPoint::new(0.5, 0.5));
        sampler.finalize_regions().unwrap();

        assert_eq!(sampler.sample(GeoPoint::new(1.0, 1.0)), Some(50));
        assert_eq!(sampler.sample(GeoPoint::new(0.5, 0.5)), Some(30));
    }

    #[test]
    fn test_surface_file_round_trip() {
        let elevation = array![[10, 20], [30, 40]];
        let surface = array![[0, 1], [1, 0]];

        let elev_reader = Arc::new(MemoryRangeReader::new(
            encode_north_first(&elevation),
            "mem:surface-elev",
        ));
        let surf_reader = Arc::new(MemoryRangeReader::new(
            encode_north_first(&surface),
            "mem:surface-type",
        ));

        let source = DemFileSource::from_reader(elev_reader, test_geometry(2, 2))
            .unwrap()
            .with_surface_reader(surf_reader)
            .unwrap();
        assert!(source.has_surface());

        let block = source
            .fetch_surface_block(IndexWindow::new(0, 0, 2, 2))
            .unwrap()
            .unwrap();
        assert_eq!(block, surface);
    }

    #[test]
    fn test_surface_reader_size_mismatch() {
        let elevation = array![[10, 20], [30, 40]];
        let source = memory_source(&elevation, "mem:surface-mismatch");
        let short = Arc::new(MemoryRangeReader::new(vec![0u8; 2], "mem:short-surface"));
        assert!(source.with_surface_reader(short).is_err());
    }
}
