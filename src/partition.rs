//! Hemisphere-quadrant partitioning of a tile's point cloud.
//!
//! A single bounding box around an arbitrary point cloud can straddle the
//! antimeridian or wrap a pole, which makes grid index math ambiguous and
//! can turn "one bulk read" into a window covering most of the planet.
//! Splitting by hemisphere sign of latitude and longitude yields at most
//! four boxes, none of which can cross the ±180° seam or the equator.
//!
//! The assignment is a pure function of the point, so the ingestion pass
//! and the later lookup pass bucket every point identically.

use ahash::AHashMap;
use std::fmt;

use crate::extent::ExtentBuilder;
use crate::geometry::GeoPoint;

/// One of the four hemisphere-sign regions.
///
/// Points at exactly 0° latitude or longitude belong to the positive side
/// (north / east), in both the ingestion and the lookup pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Quadrant {
    NorthEast,
    NorthWest,
    SouthEast,
    SouthWest,
}

impl Quadrant {
    /// Assign a point to its quadrant.
    ///
    /// Pure and total over valid points; invalid points must be filtered
    /// by the caller.
    #[must_use]
    pub fn of(point: GeoPoint) -> Self {
        match (point.lat >= 0.0, point.lon >= 0.0) {
            (true, true) => Quadrant::NorthEast,
            (true, false) => Quadrant::NorthWest,
            (false, true) => Quadrant::SouthEast,
            (false, false) => Quadrant::SouthWest,
        }
    }

    /// All four quadrants, for iteration in a stable order.
    pub const ALL: [Quadrant; 4] = [
        Quadrant::NorthEast,
        Quadrant::NorthWest,
        Quadrant::SouthEast,
        Quadrant::SouthWest,
    ];
}

impl fmt::Display for Quadrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Quadrant::NorthEast => "north-east",
            Quadrant::NorthWest => "north-west",
            Quadrant::SouthEast => "south-east",
            Quadrant::SouthWest => "south-west",
        };
        f.write_str(name)
    }
}

/// Buckets a stream of points into per-quadrant extents.
///
/// Created once per tile. After the ingestion pass, [`into_regions`]
/// surrenders the non-empty extents so grid data can be attached to each;
/// the second pass re-derives the owning quadrant per point via
/// [`Quadrant::of`].
///
/// [`into_regions`]: RegionPartitioner::into_regions
#[derive(Debug, Default)]
pub struct RegionPartitioner {
    extents: AHashMap<Quadrant, ExtentBuilder>,
}

impl RegionPartitioner {
    /// Create a partitioner with no points ingested.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a point into its quadrant's extent and report the assignment.
    pub fn ingest(&mut self, point: GeoPoint) -> Quadrant {
        let quadrant = Quadrant::of(point);
        self.extents.entry(quadrant).or_default().add(point);
        quadrant
    }

    /// Number of quadrants that have received at least one point.
    #[must_use]
    pub fn region_count(&self) -> usize {
        self.extents.values().filter(|e| !e.is_empty()).count()
    }

    /// Consume the partitioner, yielding the non-empty `(quadrant, extent)`
    /// pairs in the stable order of [`Quadrant::ALL`].
    #[must_use]
    pub fn into_regions(mut self) -> Vec<(Quadrant, ExtentBuilder)> {
        let mut regions = Vec::with_capacity(self.extents.len());
        for quadrant in Quadrant::ALL {
            if let Some(extent) = self.extents.remove(&quadrant) {
                if !extent.is_empty() {
                    regions.push((quadrant, extent));
                }
            }
        }
        regions
    }
}
