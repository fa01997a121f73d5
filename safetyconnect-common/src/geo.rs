use serde::{Deserialize, Serialize};

#[cfg(feature = "openapi")]
use utoipa::ToSchema;

#[cfg(feature = "validation")]
use validator::Validate;

/// Mean Earth radius used by every distance computation, in kilometres.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// A WGS84 position in decimal degrees.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[cfg_attr(feature = "validation", derive(Validate))]
pub struct Coordinates {
    #[cfg_attr(feature = "validation", validate(range(min = -90.0, max = 90.0)))]
    pub lat: f64,
    #[cfg_attr(feature = "validation", validate(range(min = -180.0, max = 180.0)))]
    pub lng: f64,
}

impl Coordinates {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }

    /// Latitude clamped to the poles, longitude wrapped onto [-180, 180].
    /// Non-finite components pass through untouched.
    pub fn normalized(&self) -> Self {
        let lat = self.lat.clamp(-90.0, 90.0);
        let lng = if (-180.0..=180.0).contains(&self.lng) || !self.lng.is_finite() {
            self.lng
        } else {
            (self.lng + 180.0).rem_euclid(360.0) - 180.0
        };
        Self { lat, lng }
    }

    pub fn distance_km(&self, other: &Coordinates) -> f64 {
        haversine_km(self, other)
    }
}

impl std::fmt::Display for Coordinates {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.4}, {:.4}", self.lat, self.lng)
    }
}

/// Great-circle distance between two positions on a sphere of radius
/// [`EARTH_RADIUS_KM`].
pub fn haversine_km(from: &Coordinates, to: &Coordinates) -> f64 {
    let d_lat = (to.lat - from.lat).to_radians();
    let d_lng = (to.lng - from.lng).to_radians();

    let a = (d_lat / 2.0).sin().powi(2)
        + from.lat.to_radians().cos() * to.lat.to_radians().cos() * (d_lng / 2.0).sin().powi(2);

    2.0 * EARTH_RADIUS_KM * a.sqrt().atan2((1.0 - a).sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance_is_symmetric() {
        let manila = Coordinates::new(14.5995, 120.9842);
        let davao = Coordinates::new(7.1907, 125.4553);
        let there = haversine_km(&manila, &davao);
        let back = haversine_km(&davao, &manila);
        assert!((there - back).abs() < 1e-9);
    }

    #[test]
    fn test_one_degree_of_latitude() {
        let a = Coordinates::new(10.0, 120.0);
        let b = Coordinates::new(11.0, 120.0);
        let d = a.distance_km(&b);
        assert!((d - 111.0).abs() < 1.0, "got {d}");
    }

    #[test]
    fn test_same_point_is_zero() {
        let p = Coordinates::new(9.7392, 118.7353);
        assert_eq!(haversine_km(&p, &p), 0.0);
    }

    #[test]
    fn test_normalized_clamps_and_wraps() {
        let c = Coordinates::new(95.0, 478.7353).normalized();
        assert_eq!(c.lat, 90.0);
        assert!((c.lng - 118.7353).abs() < 1e-9);

        let c = Coordinates::new(-91.0, -190.0).normalized();
        assert_eq!(c.lat, -90.0);
        assert!((c.lng - 170.0).abs() < 1e-9);

        let inside = Coordinates::new(9.7392, 118.7353);
        assert_eq!(inside.normalized(), inside);
    }

    #[test]
    fn test_is_valid() {
        assert!(Coordinates::new(90.0, -180.0).is_valid());
        assert!(!Coordinates::new(90.5, 0.0).is_valid());
        assert!(!Coordinates::new(0.0, 180.1).is_valid());
        assert!(!Coordinates::new(f64::NAN, 0.0).is_valid());
    }

    #[test]
    fn test_display_uses_four_decimals() {
        assert_eq!(Coordinates::new(40.0, -74.0).to_string(), "40.0000, -74.0000");
    }
}
