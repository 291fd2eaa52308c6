//! Planar simulation coordinates to geographic coordinates, for map display.

use crate::telemetry::Location;

/// Geographic position the planar origin maps to (Berlin centre).
pub const REFERENCE_POINT: GeoPoint = GeoPoint {
    lat: 52.5200,
    lng: 13.4050,
};

/// Degrees per planar unit, roughly 1.1 m at the reference latitude.
pub const DEGREES_PER_UNIT: f64 = 0.00001;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

/// Planar `y` runs north/south, `x` east/west.
pub fn planar_to_geo(x: f64, y: f64) -> GeoPoint {
    GeoPoint {
        lat: REFERENCE_POINT.lat + y * DEGREES_PER_UNIT,
        lng: REFERENCE_POINT.lng + x * DEGREES_PER_UNIT,
    }
}

impl From<Location> for GeoPoint {
    fn from(location: Location) -> Self {
        planar_to_geo(location.x, location.y)
    }
}
