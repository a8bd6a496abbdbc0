use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

const EARTH_RADIUS_KM: f64 = 6371.0;

/// Great-circle distance in kilometres.
pub fn haversine_km(a: GeoPoint, b: GeoPoint) -> f64 {
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lon = (b.lon - a.lon).to_radians();
    let h = (d_lat / 2.0).sin().powi(2)
        + a.lat.to_radians().cos() * b.lat.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().asin()
}

/// Parse a radius query value like "10km", "2.5km" or plain "7" into km.
pub fn parse_radius_km(raw: Option<&str>) -> f64 {
    raw.map(|s| s.trim().trim_end_matches("km").trim())
        .and_then(|s| s.parse::<f64>().ok())
        .filter(|r| *r > 0.0)
        .unwrap_or(10.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_distance_for_same_point() {
        let p = GeoPoint {
            lat: 19.0760,
            lon: 72.8777,
        };
        assert!(haversine_km(p, p) < 1e-9);
    }

    #[test]
    fn mumbai_to_pune_is_roughly_120km() {
        let mumbai = GeoPoint {
            lat: 19.0760,
            lon: 72.8777,
        };
        let pune = GeoPoint {
            lat: 18.5204,
            lon: 73.8567,
        };
        let d = haversine_km(mumbai, pune);
        assert!(d > 100.0 && d < 140.0, "got {d}");
    }

    #[test]
    fn radius_parsing_accepts_km_suffix_and_defaults() {
        assert_eq!(parse_radius_km(Some("10km")), 10.0);
        assert_eq!(parse_radius_km(Some("2.5 km")), 2.5);
        assert_eq!(parse_radius_km(Some("7")), 7.0);
        assert_eq!(parse_radius_km(Some("bogus")), 10.0);
        assert_eq!(parse_radius_km(None), 10.0);
    }
}
