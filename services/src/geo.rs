//! Great-circle distance between two coordinates.

use crate::error::AttendanceError;
use serde::{Deserialize, Serialize};

/// Mean Earth radius used by the haversine formula.
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinates {
    /// Builds a coordinate pair, rejecting anything outside the WGS84 ranges.
    pub fn new(lat: f64, lng: f64) -> Result<Self, AttendanceError> {
        let c = Self { lat, lng };
        c.validate()?;
        Ok(c)
    }

    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }

    pub fn validate(&self) -> Result<(), AttendanceError> {
        if self.is_valid() {
            Ok(())
        } else {
            Err(AttendanceError::InvalidCoordinates {
                lat: self.lat,
                lng: self.lng,
            })
        }
    }
}

/// Haversine distance in meters.
pub fn distance(a: Coordinates, b: Coordinates) -> Result<f64, AttendanceError> {
    a.validate()?;
    b.validate()?;
    Ok(haversine(a, b))
}

fn haversine(a: Coordinates, b: Coordinates) -> f64 {
    let (lat1, lat2) = (a.lat.to_radians(), b.lat.to_radians());
    let half_dlat = (lat2 - lat1) / 2.0;
    let half_dlng = (b.lng - a.lng).to_radians() / 2.0;

    let h = half_dlat.sin().powi(2) + lat1.cos() * lat2.cos() * half_dlng.sin().powi(2);
    // rounding can push h a hair outside [0, 1] for antipodal points
    let h = h.clamp(0.0, 1.0);

    2.0 * EARTH_RADIUS_METERS * h.sqrt().atan2((1.0 - h).sqrt())
}
