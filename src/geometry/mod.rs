/// A geographic position in degrees.
///
/// Latitude grows northward in `[-90, 90]`, longitude grows eastward in
/// `[-180, 180]`. Positions produced by a geocoding function may be
/// non-finite (e.g. a pixel that does not map onto the globe); such points
/// are *invalid* rather than erroneous and every consumer in this crate
/// treats them as "no data".
///
/// # Example
///
/// ```rust
/// use demgrid::GeoPoint;
///
/// let p = GeoPoint::new(37.8, -122.4);
/// assert_eq!(p.lat, 37.8);
/// assert_eq!(p.lon, -122.4);
/// assert!(p.is_valid());
///
/// // From a (lat, lon) tuple
/// let p2: GeoPoint = (37.8, -122.4).into();
/// assert_eq!(p, p2);
///
/// assert!(!GeoPoint::new(f64::NAN, 0.0).is_valid());
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    /// Latitude in degrees, north positive
    pub lat: f64,
    /// Longitude in degrees, east positive
    pub lon: f64,
}

impl GeoPoint {
    /// Create a new position from latitude and longitude in degrees.
    #[inline]
    #[must_use]
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// The intersection of the equator and the prime meridian.
    #[inline]
    #[must_use]
    pub fn origin() -> Self {
        Self { lat: 0.0, lon: 0.0 }
    }

    /// Whether this position is geolocatable: both components finite and
    /// within the legal global range.
    ///
    /// Invalid positions bypass region lookup entirely and sample as
    /// missing data.
    #[inline]
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lon.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lon)
    }

    /// Convert to a `(lat, lon)` tuple.
    #[inline]
    #[must_use]
    pub fn to_tuple(&self) -> (f64, f64) {
        (self.lat, self.lon)
    }
}

impl Default for GeoPoint {
    fn default() -> Self {
        Self::origin()
    }
}

impl From<(f64, f64)> for GeoPoint {
    #[inline]
    fn from((lat, lon): (f64, f64)) -> Self {
        Self::new(lat, lon)
    }
}

impl From<GeoPoint> for (f64, f64) {
    #[inline]
    fn from(p: GeoPoint) -> Self {
        (p.lat, p.lon)
    }
}

impl From<[f64; 2]> for GeoPoint {
    #[inline]
    fn from([lat, lon]: [f64; 2]) -> Self {
        Self::new(lat, lon)
    }
}
