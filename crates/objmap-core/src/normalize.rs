//! Conversion of site-local Cartesian poses into geographic coordinates.
//!
//! The transform is a first-order local approximation calibrated for a single
//! deployment site; points far outside that site come out systematically wrong.
//! Downstream viewers depend on these exact constants.

use serde::{Deserialize, Serialize};

pub const LAT_BASE: f64 = 35.181433;
pub const LON_BASE: f64 = 136.906421;
pub const X_SCALE: f64 = 9.109;
pub const Y_SCALE: f64 = 11.094;

/// A geographic coordinate in degrees.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    /// Accepts only finite in-range coordinates.
    pub fn checked(lat: f64, lon: f64) -> Option<Self> {
        let valid = lat.is_finite()
            && lon.is_finite()
            && (-90.0..=90.0).contains(&lat)
            && (-180.0..=180.0).contains(&lon);
        valid.then_some(Self { lat, lon })
    }

    /// Pins the coordinate into the valid range.
    pub fn clamped(lat: f64, lon: f64) -> Self {
        Self {
            lat: lat.clamp(-90.0, 90.0),
            lon: lon.clamp(-180.0, 180.0),
        }
    }
}

/// Map a local pose `(x, y)` in metres to latitude/longitude.
pub fn normalize(x: f64, y: f64) -> GeoPoint {
    let lat = LAT_BASE + 0.001 * (y / Y_SCALE);
    let lon = LON_BASE + 0.001 * (x / X_SCALE);
    // out-of-range output means the inputs are far outside the calibrated site
    GeoPoint::clamped(lat, lon)
}
