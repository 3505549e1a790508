use crate::error::AttendanceError;
use crate::geo::{self, Coordinates};
use serde::Serialize;

/// Default accepted radius. Consumer GPS accuracy, not a security boundary.
pub const DEFAULT_TOLERANCE_METERS: f64 = 50.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProximityCheck {
    pub accepted: bool,
    pub distance: f64,
    pub tolerance: f64,
}

impl ProximityCheck {
    /// True when the claimed position is so far off that a honest GPS error
    /// cannot explain it.
    pub fn is_implausible(&self, multiplier: f64) -> bool {
        !self.accepted && self.distance > self.tolerance * multiplier
    }
}

/// Accepts iff `distance(claimed, reference) <= tolerance_meters`.
pub fn verify(
    claimed: Coordinates,
    reference: Coordinates,
    tolerance_meters: f64,
) -> Result<ProximityCheck, AttendanceError> {
    let distance = geo::distance(claimed, reference)?;
    Ok(ProximityCheck {
        accepted: distance <= tolerance_meters,
        distance,
        tolerance: tolerance_meters,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn class_location() -> Coordinates {
        Coordinates::new(40.7128, -74.0060).unwrap()
    }

    #[test]
    fn nearby_attendee_is_accepted() {
        let claimed = Coordinates::new(40.71281, -74.00601).unwrap();
        let check = verify(claimed, class_location(), DEFAULT_TOLERANCE_METERS).unwrap();
        assert!(check.accepted);
        assert!(check.distance < 2.0);
        assert_eq!(check.tolerance, 50.0);
    }

    #[test]
    fn tolerance_boundary_is_inclusive() {
        // ~100 m north of the class
        let claimed = Coordinates::new(40.7137, -74.0060).unwrap();
        let exact = geo::distance(claimed, class_location()).unwrap();

        let at_edge = verify(claimed, class_location(), exact).unwrap();
        assert!(at_edge.accepted);

        let one_meter_short = verify(claimed, class_location(), exact - 1.0).unwrap();
        assert!(!one_meter_short.accepted);
    }

    #[test]
    fn far_attendee_is_rejected_and_implausible() {
        let la = Coordinates::new(34.0522, -118.2437).unwrap();
        let check = verify(la, class_location(), DEFAULT_TOLERANCE_METERS).unwrap();
        assert!(!check.accepted);
        assert!(check.distance > 3_900_000.0);
        assert!(check.is_implausible(10.0));
    }

    #[test]
    fn modest_miss_is_not_implausible() {
        let claimed = Coordinates::new(40.7137, -74.0060).unwrap();
        let check = verify(claimed, class_location(), DEFAULT_TOLERANCE_METERS).unwrap();
        assert!(!check.accepted);
        assert!(!check.is_implausible(10.0));
    }
}
