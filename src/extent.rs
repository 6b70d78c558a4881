//! Running geographic bounding box grown from a stream of points.
//!
//! During the first pass over a tile, every pixel's geographic position is
//! folded into an [`ExtentBuilder`]. The builder only ever widens; it is
//! consumed by value when the region's grid data is attached, so the frozen
//! [`GridBox`](crate::GridBox) that replaces it can never be widened again.

use crate::geometry::GeoPoint;

/// Finalized bounds of a non-empty extent.
///
/// Invariants: `min_lat <= max_lat`, `min_lon <= max_lon`, and all four
/// values lie inside the legal global range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoBounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl GeoBounds {
    /// Whether a position falls inside these bounds (edges inclusive).
    #[must_use]
    pub fn contains(&self, point: GeoPoint) -> bool {
        point.lat >= self.min_lat
            && point.lat <= self.max_lat
            && point.lon >= self.min_lon
            && point.lon <= self.max_lon
    }
}

/// Mutable bounding-box tracker for the ingestion pass.
///
/// Starts empty; [`add`](ExtentBuilder::add) widens the box monotonically,
/// clamping raw coordinates that exceed the legal global range. Accessors
/// report `None` until the first point has been added.
#[derive(Debug, Clone, Default)]
pub struct ExtentBuilder {
    bounds: Option<GeoBounds>,
}

impl ExtentBuilder {
    /// Create an empty extent.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Widen the extent to include `point`.
    ///
    /// Coordinates outside `[-90, 90]` / `[-180, 180]` are clamped to the
    /// range edge before widening. Callers are responsible for filtering
    /// non-finite positions; they would poison the bounds otherwise.
    pub fn add(&mut self, point: GeoPoint) {
        let lat = point.lat.clamp(-90.0, 90.0);
        let lon = point.lon.clamp(-180.0, 180.0);

        match &mut self.bounds {
            Some(b) => {
                if lat < b.min_lat {
                    b.min_lat = lat;
                }
                if lat > b.max_lat {
                    b.max_lat = lat;
                }
                if lon < b.min_lon {
                    b.min_lon = lon;
                }
                if lon > b.max_lon {
                    b.max_lon = lon;
                }
            }
            None => {
                self.bounds = Some(GeoBounds {
                    min_lat: lat,
                    max_lat: lat,
                    min_lon: lon,
                    max_lon: lon,
                });
            }
        }
    }

    /// The current bounds, or `None` while no point has been added.
    #[must_use]
    pub fn bounds(&self) -> Option<GeoBounds> {
        self.bounds
    }

    /// Whether no point has been added yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bounds.is_none()
    }
}
