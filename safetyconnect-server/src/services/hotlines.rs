use crate::hotline_table::RegionTable;
use safetyconnect_common::{
    Coordinates, DialableContact, EmergencyContact, HotlineResponse, RegionSummary, ServiceRegion,
};
use tracing::debug;

/// Outcome of a hotline lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution<'a> {
    /// `None` when no region covers the coordinate.
    pub region: Option<&'a ServiceRegion>,
    pub distance_km: Option<f64>,
    /// Matched region contacts sorted by priority, or the default list as declared.
    pub contacts: Vec<EmergencyContact>,
}

impl Resolution<'_> {
    pub fn is_fallback(&self) -> bool {
        self.region.is_none()
    }
}

/// Maps coordinates to the most local emergency contacts.
///
/// The resolver never fails: coordinates outside every region, or that are
/// not numbers at all, resolve to the default contact list.
pub struct HotlineResolver {
    table: RegionTable,
}

impl HotlineResolver {
    pub fn new(table: RegionTable) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &RegionTable {
        &self.table
    }

    /// Nearest region whose radius covers the coordinate. Out-of-range input
    /// is clamped (latitude) or wrapped (longitude) first. Exact distance ties
    /// go to the region declared first.
    pub fn resolve(&self, latitude: f64, longitude: f64) -> Resolution<'_> {
        let point = Coordinates::new(latitude, longitude).normalized();

        let mut best: Option<(&ServiceRegion, f64)> = None;
        for region in self.table.regions() {
            let distance = region.distance_km(&point);
            let covered = distance <= region.radius_km;
            if !covered {
                continue;
            }
            let closer = best.map_or(true, |(_, shortest)| distance < shortest);
            if closer {
                best = Some((region, distance));
            }
        }

        match best {
            Some((region, distance)) => {
                debug!(
                    region = %region.name,
                    distance_km = distance,
                    "Resolved hotline region"
                );
                let mut contacts = region.contacts.clone();
                contacts.sort_by_key(|c| c.priority);
                Resolution {
                    region: Some(region),
                    distance_km: Some(distance),
                    contacts,
                }
            }
            None => {
                debug!(%point, "No hotline region covers coordinate, using defaults");
                Resolution {
                    region: None,
                    distance_km: None,
                    contacts: self.table.default_contacts().to_vec(),
                }
            }
        }
    }

    /// `"<city>, <province>"` for covered coordinates, otherwise the raw
    /// coordinate with four decimals.
    pub fn describe_location(&self, latitude: f64, longitude: f64) -> String {
        match self.resolve(latitude, longitude).region {
            Some(region) => region.label(),
            None => Coordinates::new(latitude, longitude).to_string(),
        }
    }

    /// Closest region center regardless of radius.
    pub fn nearest_region(&self, latitude: f64, longitude: f64) -> Option<(&ServiceRegion, f64)> {
        let point = Coordinates::new(latitude, longitude).normalized();

        let mut best: Option<(&ServiceRegion, f64)> = None;
        for region in self.table.regions() {
            let distance = region.distance_km(&point);
            if distance.is_nan() {
                continue;
            }
            if best.map_or(true, |(_, shortest)| distance < shortest) {
                best = Some((region, distance));
            }
        }
        best
    }

    /// Regions whose name or parent region contains `query`, ignoring case.
    pub fn search_regions(&self, query: &str) -> Vec<&ServiceRegion> {
        let needle = query.trim().to_lowercase();
        self.table
            .regions()
            .iter()
            .filter(|r| {
                r.name.to_lowercase().contains(&needle)
                    || r.parent_region.to_lowercase().contains(&needle)
            })
            .collect()
    }

    /// Every region, alphabetically. The table keeps its declared order.
    pub fn all_regions(&self) -> Vec<&ServiceRegion> {
        let mut regions: Vec<&ServiceRegion> = self.table.regions().iter().collect();
        regions.sort_by_key(|r| r.name.to_lowercase());
        regions
    }

    pub fn hotlines_for(&self, point: Coordinates) -> HotlineResponse {
        let resolution = self.resolve(point.lat, point.lng);
        let location = match resolution.region {
            Some(region) => region.label(),
            None => point.to_string(),
        };
        let nearest_distance_km = self.nearest_region(point.lat, point.lng).map(|(_, d)| d);

        HotlineResponse {
            region: resolution.region.map(RegionSummary::from),
            location,
            contacts: resolution
                .contacts
                .into_iter()
                .map(DialableContact::from)
                .collect(),
            nearest_distance_km,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contact(name: &str, priority: u32) -> EmergencyContact {
        EmergencyContact::new(name, &["911"], "Emergency Services", priority)
    }

    fn region(name: &str, lat: f64, lng: f64, radius_km: f64) -> ServiceRegion {
        ServiceRegion {
            name: name.to_string(),
            parent_region: "Test Province".to_string(),
            center: Coordinates::new(lat, lng),
            radius_km,
            contacts: vec![contact(&format!("{name} Hotline"), 1)],
        }
    }

    fn defaults() -> Vec<EmergencyContact> {
        vec![contact("National", 2), contact("Police", 1)]
    }

    fn resolver(regions: Vec<ServiceRegion>) -> HotlineResolver {
        HotlineResolver::new(RegionTable::new(regions, defaults()).unwrap())
    }

    fn philippines() -> HotlineResolver {
        HotlineResolver::new(RegionTable::philippines().unwrap())
    }

    #[test]
    fn test_resolve_is_deterministic() {
        let resolver = philippines();
        let first = resolver.resolve(14.60, 120.99);
        let second = resolver.resolve(14.60, 120.99);
        assert_eq!(first, second);
        assert_eq!(first.region.map(|r| r.name.as_str()), Some("Manila"));
    }

    #[test]
    fn test_point_within_radius_matches() {
        let resolver = resolver(vec![region("Alpha", 10.0, 120.0, 50.0)]);
        // ~44 km north of the center.
        let resolution = resolver.resolve(10.4, 120.0);
        assert_eq!(resolution.region.map(|r| r.name.as_str()), Some("Alpha"));
        let d = resolution.distance_km.unwrap();
        assert!(d > 40.0 && d <= 50.0);
    }

    #[test]
    fn test_radius_boundary_is_inclusive() {
        let center = Coordinates::new(10.0, 120.0);
        let edge = Coordinates::new(10.3, 120.0);
        let radius = center.distance_km(&edge);
        let resolver = resolver(vec![region("Alpha", 10.0, 120.0, radius)]);
        assert!(!resolver.resolve(10.3, 120.0).is_fallback());
        assert!(resolver.resolve(10.31, 120.0).is_fallback());
    }

    #[test]
    fn test_outside_all_regions_falls_back_unsorted() {
        let resolver = resolver(vec![region("Alpha", 10.0, 120.0, 50.0)]);
        let resolution = resolver.resolve(40.0, -74.0);
        assert!(resolution.is_fallback());
        assert_eq!(resolution.distance_km, None);
        let names: Vec<&str> = resolution.contacts.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["National", "Police"]);
    }

    #[test]
    fn test_nearest_region_wins_regardless_of_order() {
        let wide = region("Wide", 10.0, 120.0, 200.0);
        let close = region("Close", 10.5, 120.5, 100.0);
        let point = (10.45, 120.45);

        let resolver_a = resolver(vec![wide.clone(), close.clone()]);
        let resolver_b = resolver(vec![close, wide]);
        assert_eq!(
            resolver_a.resolve(point.0, point.1).region.map(|r| r.name.as_str()),
            Some("Close")
        );
        assert_eq!(
            resolver_b.resolve(point.0, point.1).region.map(|r| r.name.as_str()),
            Some("Close")
        );
    }

    #[test]
    fn test_exact_tie_goes_to_first_declared() {
        let east = region("East", 0.0, 1.0, 200.0);
        let west = region("West", 0.0, -1.0, 200.0);

        let resolver_a = resolver(vec![east.clone(), west.clone()]);
        let resolver_b = resolver(vec![west, east]);
        for _ in 0..3 {
            assert_eq!(
                resolver_a.resolve(0.0, 0.0).region.map(|r| r.name.as_str()),
                Some("East")
            );
            assert_eq!(
                resolver_b.resolve(0.0, 0.0).region.map(|r| r.name.as_str()),
                Some("West")
            );
        }
    }

    #[test]
    fn test_contacts_sorted_stably_by_priority() {
        let mut alpha = region("Alpha", 10.0, 120.0, 50.0);
        alpha.contacts = vec![
            contact("third", 3),
            contact("first-a", 1),
            contact("second", 2),
            contact("first-b", 1),
        ];
        let resolver = resolver(vec![alpha]);

        let resolution = resolver.resolve(10.0, 120.0);
        let names: Vec<&str> = resolution.contacts.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["first-a", "first-b", "second", "third"]);

        // The table keeps its declared order.
        let stored: Vec<&str> = resolver.table().regions()[0]
            .contacts
            .iter()
            .map(|c| c.name.as_str())
            .collect();
        assert_eq!(stored, vec!["third", "first-a", "second", "first-b"]);
    }

    #[test]
    fn test_puerto_princesa_example() {
        let resolver = philippines();
        let resolution = resolver.resolve(9.7392, 118.7353);
        let region = resolution.region.unwrap();
        assert_eq!(region.name, "Puerto Princesa");
        assert_eq!(resolution.distance_km, Some(0.0));

        let names: Vec<&str> = resolution.contacts.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names[0], "CHO-HERO (HEALTH EMERGENCY RESPONSE OPERATION)");
        assert_eq!(names[1], "PUERTO PRINCESA CITY 911");
        assert_eq!(names[2], "PPC- BUREAU OF FIRE PROTECTION");
        assert_eq!(names[3], "CDRRMO");
        assert!(resolution
            .contacts
            .windows(2)
            .all(|w| w[0].priority <= w[1].priority));
    }

    #[test]
    fn test_new_york_gets_national_hotlines() {
        let resolver = philippines();
        let resolution = resolver.resolve(40.0, -74.0);
        assert!(resolution.is_fallback());
        assert_eq!(resolution.contacts, resolver.table().default_contacts());
        assert_eq!(resolution.contacts[0].name, "National Emergency Hotline");
    }

    #[test]
    fn test_out_of_range_input_is_clamped_and_wrapped() {
        let resolver = philippines();
        let wrapped = resolver.resolve(9.7392, 118.7353 + 360.0);
        assert_eq!(wrapped.region.map(|r| r.name.as_str()), Some("Puerto Princesa"));

        let polar = resolver.resolve(95.0, 0.0);
        assert_eq!(polar, resolver.resolve(90.0, 0.0));
        assert!(polar.is_fallback());
    }

    #[test]
    fn test_nan_falls_back() {
        let resolver = philippines();
        assert!(resolver.resolve(f64::NAN, 118.7353).is_fallback());
        assert!(resolver.nearest_region(f64::NAN, f64::NAN).is_none());
        assert_eq!(resolver.describe_location(f64::NAN, 1.0), "NaN, 1.0000");
    }

    #[test]
    fn test_describe_location() {
        let resolver = philippines();
        assert_eq!(
            resolver.describe_location(9.7392, 118.7353),
            "Puerto Princesa, Palawan"
        );
        assert_eq!(resolver.describe_location(40.0, -74.0), "40.0000, -74.0000");
    }

    #[test]
    fn test_search_regions() {
        let resolver = philippines();
        let names: Vec<&str> = resolver
            .search_regions("metro manila")
            .iter()
            .map(|r| r.name.as_str())
            .collect();
        assert_eq!(names, vec!["Manila", "Quezon City", "Makati"]);

        let names: Vec<&str> = resolver
            .search_regions("  PALAWAN ")
            .iter()
            .map(|r| r.name.as_str())
            .collect();
        assert_eq!(names, vec!["Puerto Princesa"]);

        assert!(resolver.search_regions("tokyo").is_empty());
        assert_eq!(resolver.search_regions("").len(), 10);
    }

    #[test]
    fn test_all_regions_sorted_without_touching_table() {
        let resolver = philippines();
        let names: Vec<&str> = resolver.all_regions().iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names.first(), Some(&"Baguio City"));
        assert_eq!(names.last(), Some(&"Zamboanga City"));
        assert_eq!(resolver.table().regions()[0].name, "Manila");
    }

    #[test]
    fn test_hotlines_for_reports_nearest_distance() {
        let resolver = philippines();
        let response = resolver.hotlines_for(Coordinates::new(40.0, -74.0));
        assert!(response.region.is_none());
        assert_eq!(response.location, "40.0000, -74.0000");
        assert!(response.nearest_distance_km.unwrap() > 10_000.0);

        let response = resolver.hotlines_for(Coordinates::new(10.3157, 123.8854));
        assert_eq!(response.region.unwrap().name, "Cebu City");
        assert_eq!(response.contacts[0].tel_uris, vec!["tel:911", "tel:0324124131"]);
    }
}
