use serde::Serialize;
use utoipa::ToSchema;

use crate::model::work_location::WorkLocation;

const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Great-circle distance in meters between two (lat, lng) pairs.
pub fn haversine_meters(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lng = (lng2 - lng1).to_radians();

    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lng / 2.0).sin().powi(2);

    2.0 * a.sqrt().asin() * EARTH_RADIUS_M
}

/// Outcome of matching a coordinate pair against the configured work
/// locations. Advisory only: an unmatched result still allows the clock
/// action, it is just recorded as offsite with a coordinate label.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct GeofenceCheck {
    #[schema(example = true)]
    pub matched: bool,
    /// Id of the nearest active location, if any are configured.
    #[schema(example = 3)]
    pub location_id: Option<u64>,
    /// Location name when matched, otherwise a "lat, lng" label.
    #[schema(example = "Head Office")]
    pub label: String,
    /// Distance to the nearest active location in meters.
    #[schema(example = 12.8)]
    pub distance_m: Option<f64>,
}

impl GeofenceCheck {
    pub fn is_offsite(&self) -> bool {
        !self.matched
    }
}

fn coordinate_label(lat: f64, lng: f64) -> String {
    format!("{lat:.5}, {lng:.5}")
}

/// Finds the minimum-distance active location and compares against its
/// radius: matched ⇔ distance <= radius_meters.
pub fn resolve(locations: &[WorkLocation], lat: f64, lng: f64) -> GeofenceCheck {
    let nearest = locations
        .iter()
        .filter(|loc| loc.is_active)
        .map(|loc| {
            let d = haversine_meters(lat, lng, loc.latitude, loc.longitude);
            (loc, d)
        })
        .min_by(|(_, a), (_, b)| a.total_cmp(b));

    match nearest {
        Some((loc, distance)) if distance <= loc.radius_meters => GeofenceCheck {
            matched: true,
            location_id: Some(loc.id),
            label: loc.name.clone(),
            distance_m: Some(distance),
        },
        Some((loc, distance)) => GeofenceCheck {
            matched: false,
            location_id: Some(loc.id),
            label: coordinate_label(lat, lng),
            distance_m: Some(distance),
        },
        None => GeofenceCheck {
            matched: false,
            location_id: None,
            label: coordinate_label(lat, lng),
            distance_m: None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn location(id: u64, name: &str, lat: f64, lng: f64, radius: f64, active: bool) -> WorkLocation {
        WorkLocation {
            id,
            name: name.to_string(),
            latitude: lat,
            longitude: lng,
            radius_meters: radius,
            is_active: active,
        }
    }

    #[test]
    fn distance_to_self_is_zero() {
        assert_eq!(haversine_meters(23.777, 90.399, 23.777, 90.399), 0.0);
    }

    #[test]
    fn known_distance_roughly_correct() {
        // ~0.01 degrees of latitude is ~1.11 km
        let d = haversine_meters(23.77, 90.39, 23.78, 90.39);
        assert!((d - 1_112.0).abs() < 10.0, "got {d}");
    }

    #[test]
    fn matches_within_radius() {
        let locs = vec![location(1, "HQ", 23.7770, 90.3990, 150.0, true)];
        let check = resolve(&locs, 23.7771, 90.3991);
        assert!(check.matched);
        assert_eq!(check.location_id, Some(1));
        assert_eq!(check.label, "HQ");
        assert!(check.distance_m.unwrap() <= 150.0);
    }

    #[test]
    fn outside_radius_is_offsite_with_coordinate_label() {
        let locs = vec![location(1, "HQ", 23.7770, 90.3990, 50.0, true)];
        let check = resolve(&locs, 23.8000, 90.4500);
        assert!(check.is_offsite());
        assert_eq!(check.label, "23.80000, 90.45000");
        assert!(check.distance_m.unwrap() > 50.0);
    }

    #[test]
    fn picks_minimum_distance_active_location() {
        let locs = vec![
            location(1, "Far", 24.0, 91.0, 100_000.0, true),
            location(2, "Near", 23.7771, 90.3991, 100.0, true),
            location(3, "Nearest but inactive", 23.7770, 90.3990, 100.0, false),
        ];
        let check = resolve(&locs, 23.7770, 90.3990);
        assert_eq!(check.location_id, Some(2));
        assert!(check.matched);
    }

    #[test]
    fn no_configured_locations_is_offsite() {
        let check = resolve(&[], 1.0, 2.0);
        assert!(check.is_offsite());
        assert_eq!(check.location_id, None);
        assert_eq!(check.distance_m, None);
    }
}
