//! Per-tile orchestration of the box sampling engine.
//!
//! The surrounding harness drives two passes over a tile's pixels. In the
//! first pass every pixel's geographic position is [`ingest`]ed; the
//! positions bucket into at most four hemisphere-quadrant regions. Then
//! [`finalize_regions`] attaches grid data to each non-empty region with a
//! single bulk read. In the second pass the harness re-streams the same
//! positions through [`sample`] and writes the results to the output.
//!
//! The engine is single-threaded and synchronous; the bulk read is its only
//! blocking call. Tiles processed concurrently each own their sampler, so
//! no locking is needed here — only the injected [`GridSource`] must
//! tolerate concurrent reads.
//!
//! [`ingest`]: TileSampler::ingest
//! [`finalize_regions`]: TileSampler::finalize_regions
//! [`sample`]: TileSampler::sample
//!
//! # Example
//!
//! ```rust
//! use demgrid::{GeoBounds, GeoPoint, MemoryGridSource, TileSampler};
//! use ndarray::array;
//!
//! let bounds = GeoBounds { min_lat: 0.0, max_lat: 2.0, min_lon: 0.0, max_lon: 2.0 };
//! let values = array![[10, 20, 30], [40, 50, 60], [70, 80, 90]];
//! let source = MemoryGridSource::new(bounds, values, -32768).unwrap();
//!
//! let mut sampler = TileSampler::new(source);
//! sampler.ingest(GeoPoint::new(1.0, 1.0));
//! sampler.finalize_regions().unwrap();
//! assert_eq!(sampler.sample(GeoPoint::new(1.0, 1.0)), Some(50));
//! ```

use ahash::AHashMap;
use tracing::debug;

use crate::error::Result;
use crate::geometry::GeoPoint;
use crate::grid_box::GridBox;
use crate::partition::{Quadrant, RegionPartitioner};
use crate::source::GridSource;

/// Tuning knobs for a [`TileSampler`].
#[derive(Debug, Clone, Copy)]
pub struct SamplerOptions {
    /// Bilinear-interpolate point queries (true, default) or return the
    /// nearest raw sample (false).
    pub use_averaging: bool,
}

impl Default for SamplerOptions {
    fn default() -> Self {
        Self { use_averaging: true }
    }
}

impl SamplerOptions {
    /// Disable bilinear interpolation in favor of nearest raw samples.
    #[must_use]
    pub fn with_nearest(mut self) -> Self {
        self.use_averaging = false;
        self
    }
}

/// Tile-local sampling state: the partitioner for the ingestion pass and
/// the frozen per-quadrant boxes for the query pass.
pub struct TileSampler<S: GridSource> {
    source: S,
    partitioner: RegionPartitioner,
    boxes: AHashMap<Quadrant, GridBox>,
    options: SamplerOptions,
}

impl<S: GridSource> TileSampler<S> {
    /// Create a sampler over an injected gridded-data source.
    #[must_use]
    pub fn new(source: S) -> Self {
        Self::with_options(source, SamplerOptions::default())
    }

    /// Create a sampler with explicit options.
    #[must_use]
    pub fn with_options(source: S, options: SamplerOptions) -> Self {
        Self {
            source,
            partitioner: RegionPartitioner::new(),
            boxes: AHashMap::new(),
            options,
        }
    }

    /// Accumulate a pixel's geographic position into the active
    /// partitioning pass. Invalid positions are dropped here and sample as
    /// missing data later.
    pub fn ingest(&mut self, point: GeoPoint) {
        if point.is_valid() {
            self.partitioner.ingest(point);
        }
    }

    /// Attach grid data to every non-empty region, one bulk read each.
    ///
    /// Returns the number of regions fetched. A failed bulk read is fatal
    /// for the whole tile, is not retried here, and names the region and
    /// index window that failed.
    pub fn finalize_regions(&mut self) -> Result<usize> {
        let partitioner = std::mem::take(&mut self.partitioner);
        for (quadrant, extent) in partitioner.into_regions() {
            // Non-empty by construction of into_regions().
            let Some(bounds) = extent.bounds() else {
                continue;
            };
            let grid_box =
                GridBox::fetch(quadrant, bounds, &self.source, self.options.use_averaging)?;
            debug!(
                %quadrant,
                lat_count = grid_box.lat_count(),
                lon_count = grid_box.lon_count(),
                "attached grid block to region"
            );
            self.boxes.insert(quadrant, grid_box);
        }
        Ok(self.boxes.len())
    }

    /// Number of regions carrying grid data.
    #[must_use]
    pub fn region_count(&self) -> usize {
        self.boxes.len()
    }

    /// The frozen box serving a quadrant, if that region was non-empty.
    #[must_use]
    pub fn region(&self, quadrant: Quadrant) -> Option<&GridBox> {
        self.boxes.get(&quadrant)
    }

    /// Sampled elevation for a position, `None` for invalid positions,
    /// positions outside every finalized region, or missing data.
    #[must_use]
    pub fn sample(&self, point: GeoPoint) -> Option<i16> {
        self.lookup(point)?.sample(point.lat, point.lon)
    }

    /// Sampled surface type for a position, same resolution rules as
    /// [`sample`](Self::sample).
    #[must_use]
    pub fn sample_surface(&self, point: GeoPoint) -> Option<i16> {
        self.lookup(point)?.sample_surface(point.lat, point.lon)
    }

    /// Sampled elevation with the wire sentinel substituted for "no data",
    /// for harnesses writing raw `i16` rasters.
    #[must_use]
    pub fn sample_or_missing(&self, point: GeoPoint) -> i16 {
        self.sample(point).unwrap_or_else(|| self.missing_value())
    }

    /// The missing-value sentinel of the underlying source.
    #[must_use]
    pub fn missing_value(&self) -> i16 {
        self.source.missing_value()
    }

    /// Access to the injected source.
    #[must_use]
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Second-pass region lookup: same pure policy as the ingestion pass.
    fn lookup(&self, point: GeoPoint) -> Option<&GridBox> {
        if !point.is_valid() {
            return None;
        }
        self.boxes.get(&Quadrant::of(point))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extent::GeoBounds;
    use crate::source::{IndexWindow, MemoryGridSource};
    use ndarray::{array, Array2};
    use std::sync::atomic::{AtomicUsize, Ordering};

    const MISSING: i16 = -32768;

    fn three_by_three() -> MemoryGridSource {
        let bounds = GeoBounds {
            min_lat: 0.0,
            max_lat: 2.0,
            min_lon: 0.0,
            max_lon: 2.0,
        };
        let values = array![[10, 20, 30], [40, 50, 60], [70, 80, 90]];
        MemoryGridSource::new(bounds, values, MISSING).unwrap()
    }

    /// Global source spanning both hemispheres on each axis.
    fn global_source() -> MemoryGridSource {
        let bounds = GeoBounds {
            min_lat: -90.0,
            max_lat: 90.0,
            min_lon: -180.0,
            max_lon: 180.0,
        };
        let values = Array2::from_shape_fn((19, 37), |(r, c)| (100 * r + c) as i16);
        MemoryGridSource::new(bounds, values, MISSING).unwrap()
    }

    #[test]
    fn test_end_to_end_three_by_three_scenario() {
        let mut sampler = TileSampler::new(three_by_three());

        let pixels = [
            GeoPoint::new(1.0, 1.0),
            GeoPoint::new(0.5, 0.5),
            GeoPoint::new(2.0, 2.0),
        ];
        for p in pixels {
            sampler.ingest(p);
        }
        assert_eq!(sampler.finalize_regions().unwrap(), 1);

        assert_eq!(sampler.sample(GeoPoint::new(1.0, 1.0)), Some(50));
        // Equal-weight blend of the four bracketing corners 10/20/40/50.
        assert_eq!(sampler.sample(GeoPoint::new(0.5, 0.5)), Some(30));
        assert_eq!(sampler.sample(GeoPoint::new(2.0, 2.0)), Some(90));
    }

    #[test]
    fn test_invalid_points_bypass_lookup() {
        let mut sampler = TileSampler::new(three_by_three());
        sampler.ingest(GeoPoint::new(1.0, 1.0));
        sampler.ingest(GeoPoint::new(f64::NAN, 1.0)); // dropped on ingest
        sampler.finalize_regions().unwrap();

        assert_eq!(sampler.sample(GeoPoint::new(f64::NAN, 1.0)), None);
        assert_eq!(
            sampler.sample_or_missing(GeoPoint::new(f64::NAN, 1.0)),
            MISSING
        );
        assert_eq!(sampler.sample_or_missing(GeoPoint::new(1.0, 1.0)), 50);
    }

    #[test]
    fn test_sampling_before_finalization_resolves_nothing() {
        let mut sampler = TileSampler::new(three_by_three());
        sampler.ingest(GeoPoint::new(1.0, 1.0));
        assert_eq!(sampler.sample(GeoPoint::new(1.0, 1.0)), None);
        assert_eq!(sampler.region_count(), 0);
    }

    #[test]
    fn test_antimeridian_points_use_separate_regions() {
        let mut sampler = TileSampler::new(global_source());
        sampler.ingest(GeoPoint::new(10.0, 170.0));
        sampler.ingest(GeoPoint::new(-5.0, -170.0));
        assert_eq!(sampler.finalize_regions().unwrap(), 2);

        assert!(sampler.region(Quadrant::NorthEast).is_some());
        assert!(sampler.region(Quadrant::SouthWest).is_some());
        assert!(sampler.region(Quadrant::NorthWest).is_none());

        // Neither box spans the ±180° seam.
        for quadrant in [Quadrant::NorthEast, Quadrant::SouthWest] {
            let b = sampler.region(quadrant).unwrap().bounds();
            assert!(b.max_lon - b.min_lon < 180.0);
        }

        assert!(sampler.sample(GeoPoint::new(10.0, 170.0)).is_some());
        assert!(sampler.sample(GeoPoint::new(-5.0, -170.0)).is_some());
    }

    #[test]
    fn test_point_outside_every_region_is_no_data() {
        let mut sampler = TileSampler::new(global_source());
        sampler.ingest(GeoPoint::new(10.0, 10.0)); // north-east only
        sampler.finalize_regions().unwrap();

        // Valid point, but its quadrant holds no box.
        assert_eq!(sampler.sample(GeoPoint::new(-10.0, 10.0)), None);
        assert_eq!(
            sampler.sample_or_missing(GeoPoint::new(-10.0, 10.0)),
            MISSING
        );
    }

    /// Counts bulk reads so the halo-sufficiency property is observable:
    /// every sample inside an ingested extent must be answered without a
    /// second fetch.
    struct CountingSource {
        inner: MemoryGridSource,
        fetches: AtomicUsize,
    }

    impl GridSource for CountingSource {
        fn lat_count(&self) -> usize {
            self.inner.lat_count()
        }
        fn lon_count(&self) -> usize {
            self.inner.lon_count()
        }
        fn missing_value(&self) -> i16 {
            self.inner.missing_value()
        }
        fn lat_index(&self, lat: f64) -> usize {
            self.inner.lat_index(lat)
        }
        fn lon_index(&self, lon: f64) -> usize {
            self.inner.lon_index(lon)
        }
        fn lat_at(&self, index: usize) -> f64 {
            self.inner.lat_at(index)
        }
        fn lon_at(&self, index: usize) -> f64 {
            self.inner.lon_at(index)
        }
        fn fetch_block(&self, window: IndexWindow) -> crate::Result<Array2<i16>> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            self.inner.fetch_block(window)
        }
    }

    #[test]
    fn test_halo_keeps_interpolation_within_one_fetch_per_region() {
        let source = CountingSource {
            inner: global_source(),
            fetches: AtomicUsize::new(0),
        };
        let mut sampler = TileSampler::new(source);

        // Dense sub-tile strictly inside the north-east quadrant.
        let mut points = Vec::new();
        for i in 0..20 {
            for j in 0..20 {
                points.push(GeoPoint::new(
                    20.0 + f64::from(i) * 0.9,
                    40.0 + f64::from(j) * 0.9,
                ));
            }
        }
        for &p in &points {
            sampler.ingest(p);
        }
        sampler.finalize_regions().unwrap();
        assert_eq!(sampler.source().fetches.load(Ordering::SeqCst), 1);

        // Every point, including those on the extent's edge, interpolates
        // from in-bounds corners without further I/O.
        for &p in &points {
            assert!(sampler.sample(p).is_some(), "no data at {p:?}");
        }
        assert_eq!(sampler.source().fetches.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_nearest_mode_option() {
        let sampler_opts = SamplerOptions::default().with_nearest();
        let mut sampler = TileSampler::with_options(three_by_three(), sampler_opts);
        sampler.ingest(GeoPoint::new(0.5, 0.5));
        sampler.finalize_regions().unwrap();

        // Truncated index instead of the bilinear blend.
        assert_eq!(sampler.sample(GeoPoint::new(0.5, 0.5)), Some(10));
    }

    #[test]
    fn test_surface_sampling_end_to_end() {
        let bounds = GeoBounds {
            min_lat: 0.0,
            max_lat: 2.0,
            min_lon: 0.0,
            max_lon: 2.0,
        };
        let values = array![[10, 20, 30], [40, 50, 60], [70, 80, 90]];
        let surface = array![[0, 0, 0], [0, 7, 0], [0, 0, 0]];
        let source = MemoryGridSource::new(bounds, values, MISSING)
            .unwrap()
            .with_surface(surface)
            .unwrap();

        let mut sampler = TileSampler::new(source);
        sampler.ingest(GeoPoint::new(1.0, 1.0));
        sampler.finalize_regions().unwrap();

        assert_eq!(sampler.sample_surface(GeoPoint::new(1.0, 1.0)), Some(7));
        assert_eq!(sampler.sample(GeoPoint::new(1.0, 1.0)), Some(50));
    }
}
