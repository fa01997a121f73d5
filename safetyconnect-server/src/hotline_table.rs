//! Static region table backing hotline resolution.
//!
//! A [`RegionTable`] can only be obtained through [`RegionTable::new`] (or the
//! loaders built on it), so every table handed to the resolver has already
//! been checked for empty contact lists, bad radii and out-of-range centers.

use safetyconnect_common::{Coordinates, EmergencyContact, ServiceRegion};
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;
use tracing::info;

const DEFAULT_LIST_LABEL: &str = "default contacts";

#[derive(Error, Debug)]
pub enum TableError {
    #[error("default contact list is empty")]
    EmptyDefaults,

    #[error("region #{index} has a blank name")]
    BlankRegionName { index: usize },

    #[error("region '{region}' has no contacts")]
    NoContacts { region: String },

    #[error("region '{region}' has invalid radius {radius_km} km")]
    InvalidRadius { region: String, radius_km: f64 },

    #[error("region '{region}' has out-of-range center {center}")]
    InvalidCenter { region: String, center: Coordinates },

    #[error("contact '{contact}' in {region} has no phone numbers")]
    NoPhoneNumbers { region: String, contact: String },

    #[error("contact '{contact}' in {region} has undialable number '{number}'")]
    InvalidPhoneNumber {
        region: String,
        contact: String,
        number: String,
    },

    #[error("contact '{contact}' in {region} has priority 0")]
    InvalidPriority { region: String, contact: String },

    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse region table: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Deserialize)]
struct TableFile {
    regions: Vec<ServiceRegion>,
    default_contacts: Vec<EmergencyContact>,
}

#[derive(Debug, Clone)]
pub struct RegionTable {
    regions: Vec<ServiceRegion>,
    default_contacts: Vec<EmergencyContact>,
}

impl RegionTable {
    pub fn new(
        regions: Vec<ServiceRegion>,
        default_contacts: Vec<EmergencyContact>,
    ) -> Result<Self, TableError> {
        if default_contacts.is_empty() {
            return Err(TableError::EmptyDefaults);
        }
        validate_contacts(DEFAULT_LIST_LABEL, &default_contacts)?;

        for (index, region) in regions.iter().enumerate() {
            validate_region(index, region)?;
        }

        Ok(Self {
            regions,
            default_contacts,
        })
    }

    pub fn from_json_str(json: &str) -> Result<Self, TableError> {
        let file: TableFile = serde_json::from_str(json)?;
        Self::new(file.regions, file.default_contacts)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, TableError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| TableError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let table = Self::from_json_str(&contents)?;
        info!(
            "Loaded {} hotline regions from {}",
            table.regions.len(),
            path.display()
        );
        Ok(table)
    }

    /// Region table from `path` when given, otherwise the embedded Philippine data.
    pub fn load(path: Option<&str>) -> Result<Self, TableError> {
        match path {
            Some(p) if !p.trim().is_empty() => Self::from_json_file(p),
            _ => Self::philippines(),
        }
    }

    /// Regions in declaration order.
    pub fn regions(&self) -> &[ServiceRegion] {
        &self.regions
    }

    pub fn default_contacts(&self) -> &[EmergencyContact] {
        &self.default_contacts
    }

    pub fn philippines() -> Result<Self, TableError> {
        Self::new(philippine_regions(), national_hotlines())
    }
}

fn validate_region(index: usize, region: &ServiceRegion) -> Result<(), TableError> {
    if region.name.trim().is_empty() {
        return Err(TableError::BlankRegionName { index });
    }
    if !region.radius_km.is_finite() || region.radius_km <= 0.0 {
        return Err(TableError::InvalidRadius {
            region: region.name.clone(),
            radius_km: region.radius_km,
        });
    }
    if !region.center.is_valid() {
        return Err(TableError::InvalidCenter {
            region: region.name.clone(),
            center: region.center,
        });
    }
    if region.contacts.is_empty() {
        return Err(TableError::NoContacts {
            region: region.name.clone(),
        });
    }
    validate_contacts(&region.name, &region.contacts)
}

fn validate_contacts(region: &str, contacts: &[EmergencyContact]) -> Result<(), TableError> {
    for contact in contacts {
        if contact.phone_numbers.is_empty() {
            return Err(TableError::NoPhoneNumbers {
                region: region.to_string(),
                contact: contact.name.clone(),
            });
        }
        // Every number must yield a usable tel: URI.
        let undialable = contact
            .phone_numbers
            .iter()
            .find(|n| !n.chars().any(|c| c.is_ascii_digit()));
        if let Some(number) = undialable {
            return Err(TableError::InvalidPhoneNumber {
                region: region.to_string(),
                contact: contact.name.clone(),
                number: number.clone(),
            });
        }
        if contact.priority == 0 {
            return Err(TableError::InvalidPriority {
                region: region.to_string(),
                contact: contact.name.clone(),
            });
        }
    }
    Ok(())
}

fn region(
    name: &str,
    parent_region: &str,
    lat: f64,
    lng: f64,
    radius_km: f64,
    contacts: Vec<EmergencyContact>,
) -> ServiceRegion {
    ServiceRegion {
        name: name.to_string(),
        parent_region: parent_region.to_string(),
        center: Coordinates::new(lat, lng),
        radius_km,
        contacts,
    }
}

fn national_hotlines() -> Vec<EmergencyContact> {
    vec![
        EmergencyContact::new("National Emergency Hotline", &["911"], "Emergency Services", 1),
        EmergencyContact::new("Philippine National Police", &["117"], "Police", 2),
        EmergencyContact::new("Bureau of Fire Protection", &["116"], "Fire Department", 2),
        EmergencyContact::new("Philippine Red Cross", &["143"], "Medical Emergency", 3),
        EmergencyContact::new("NDRRMC Emergency", &["(02) 8911-1406"], "Disaster Response", 4),
    ]
}

fn philippine_regions() -> Vec<ServiceRegion> {
    vec![
        region(
            "Manila",
            "Metro Manila",
            14.5995,
            120.9842,
            15.0,
            vec![
                EmergencyContact::new(
                    "Manila Emergency 911",
                    &["911", "117"],
                    "Emergency Services",
                    1,
                ),
                EmergencyContact::new(
                    "Manila Police District (MPD)",
                    &["(02) 527-3110", "(02) 527-3116"],
                    "Police",
                    2,
                ),
                EmergencyContact::new(
                    "Bureau of Fire Protection Manila",
                    &["(02) 244-1250", "116"],
                    "Fire Department",
                    2,
                ),
                EmergencyContact::new(
                    "Manila Disaster Risk Reduction",
                    &["(02) 527-3000"],
                    "Disaster Response",
                    3,
                ),
                EmergencyContact::new(
                    "Philippine General Hospital",
                    &["(02) 554-8400"],
                    "Hospital",
                    3,
                ),
                EmergencyContact::new(
                    "Manila Health Department",
                    &["(02) 711-5585"],
                    "Health Emergency",
                    4,
                ),
                EmergencyContact::new("MMDA Emergency", &["136"], "Traffic/Road Emergency", 4),
            ],
        ),
        region(
            "Quezon City",
            "Metro Manila",
            14.6760,
            121.0437,
            20.0,
            vec![
                EmergencyContact::new("Quezon City 911", &["911", "122"], "Emergency Services", 1),
                EmergencyContact::new(
                    "QCPD Emergency Hotline",
                    &["(02) 8806-4701", "(02) 414-2584"],
                    "Police",
                    2,
                ),
                EmergencyContact::new(
                    "QC Fire Department",
                    &["(02) 426-0219", "116"],
                    "Fire Department",
                    2,
                ),
                EmergencyContact::new(
                    "QC Disaster Risk Reduction",
                    &["(02) 988-4242"],
                    "Disaster Response",
                    3,
                ),
                EmergencyContact::new(
                    "East Avenue Medical Center",
                    &["(02) 435-0870"],
                    "Hospital",
                    3,
                ),
                EmergencyContact::new(
                    "Veterans Memorial Medical Center",
                    &["(02) 927-0001"],
                    "Hospital",
                    4,
                ),
            ],
        ),
        region(
            "Makati",
            "Metro Manila",
            14.5547,
            121.0244,
            10.0,
            vec![
                EmergencyContact::new(
                    "Makati Emergency Response",
                    &["168", "911"],
                    "Emergency Services",
                    1,
                ),
                EmergencyContact::new(
                    "Makati Police Station",
                    &["(02) 899-9014", "(02) 899-9015"],
                    "Police",
                    2,
                ),
                EmergencyContact::new(
                    "Makati Fire Department",
                    &["(02) 899-9016", "116"],
                    "Fire Department",
                    2,
                ),
                EmergencyContact::new("Makati Medical Center", &["(02) 888-8999"], "Hospital", 3),
                EmergencyContact::new(
                    "Makati Health Department",
                    &["(02) 870-1448"],
                    "Health Emergency",
                    4,
                ),
            ],
        ),
        region(
            "Cebu City",
            "Cebu",
            10.3157,
            123.8854,
            15.0,
            vec![
                EmergencyContact::new(
                    "Cebu City Emergency 911",
                    &["911", "(032) 412-4131"],
                    "Emergency Services",
                    1,
                ),
                EmergencyContact::new(
                    "Cebu City Police Office",
                    &["(032) 231-3161", "(032) 231-0916"],
                    "Police",
                    2,
                ),
                EmergencyContact::new(
                    "Cebu City Fire Department",
                    &["(032) 254-4180", "116"],
                    "Fire Department",
                    2,
                ),
                EmergencyContact::new(
                    "Cebu City Disaster Risk Reduction",
                    &["(032) 412-7640"],
                    "Disaster Response",
                    3,
                ),
                EmergencyContact::new(
                    "Vicente Sotto Memorial Medical Center",
                    &["(032) 253-9891"],
                    "Hospital",
                    3,
                ),
                EmergencyContact::new("Cebu Doctors Hospital", &["(032) 255-5555"], "Hospital", 4),
            ],
        ),
        region(
            "Davao City",
            "Davao del Sur",
            7.1907,
            125.4553,
            25.0,
            vec![
                EmergencyContact::new(
                    "Davao Emergency 911",
                    &["911", "(082) 241-1911"],
                    "Emergency Services",
                    1,
                ),
                EmergencyContact::new(
                    "Davao City Police Office",
                    &["(082) 244-4374", "117"],
                    "Police",
                    2,
                ),
                EmergencyContact::new(
                    "Davao Fire Bureau",
                    &["(082) 221-0251", "116"],
                    "Fire Department",
                    2,
                ),
                EmergencyContact::new(
                    "City Disaster Risk Reduction",
                    &["(082) 241-1000"],
                    "Disaster Response",
                    3,
                ),
                EmergencyContact::new(
                    "Southern Philippines Medical Center",
                    &["(082) 227-2731"],
                    "Hospital",
                    3,
                ),
                EmergencyContact::new(
                    "Davao Medical School Foundation",
                    &["(082) 226-4433"],
                    "Hospital",
                    4,
                ),
            ],
        ),
        region(
            "Baguio City",
            "Benguet",
            16.4023,
            120.5960,
            10.0,
            vec![
                EmergencyContact::new(
                    "Baguio Emergency Services",
                    &["911", "117"],
                    "Emergency Services",
                    1,
                ),
                EmergencyContact::new(
                    "Baguio City Police Office",
                    &["(074) 442-8293"],
                    "Police",
                    2,
                ),
                EmergencyContact::new(
                    "Baguio Fire Bureau",
                    &["(074) 442-3121", "116"],
                    "Fire Department",
                    2,
                ),
                EmergencyContact::new(
                    "Baguio General Hospital",
                    &["(074) 442-2216"],
                    "Hospital",
                    3,
                ),
                EmergencyContact::new(
                    "Saint Louis University Hospital",
                    &["(074) 447-6361"],
                    "Hospital",
                    4,
                ),
            ],
        ),
        region(
            "Puerto Princesa",
            "Palawan",
            9.7392,
            118.7353,
            50.0,
            vec![
                EmergencyContact::new(
                    "CHO-HERO (HEALTH EMERGENCY RESPONSE OPERATION)",
                    &["0917-777-7296", "0966-802-7420", "0950-491-2599", "0951-312-6727"],
                    "Health Emergency",
                    1,
                ),
                EmergencyContact::new(
                    "PUERTO PRINCESA CITY 911",
                    &["0927-797-2009", "0920-430-5378", "0917-112-0324"],
                    "Emergency Services",
                    1,
                ),
                EmergencyContact::new(
                    "PPC- BUREAU OF FIRE PROTECTION",
                    &["0977-855-1600", "0925-707-7710"],
                    "Fire Department",
                    2,
                ),
                EmergencyContact::new(
                    "CDRRMO",
                    &["0965-314-8399", "0938-794-4004"],
                    "Disaster Response",
                    2,
                ),
                EmergencyContact::new(
                    "PNP STATION 1 (MENDOZA STATION)",
                    &["0917-311-5746"],
                    "Police",
                    3,
                ),
                EmergencyContact::new(
                    "PNP STATION 2 (IRAWAN STATION)",
                    &["0927-162-4065"],
                    "Police",
                    3,
                ),
                EmergencyContact::new(
                    "PNP STATION 3 (LUZVIMINDA)",
                    &["0927-234-7433"],
                    "Police",
                    3,
                ),
                EmergencyContact::new(
                    "PNP STATION 4 (MACARASCAS STATION)",
                    &["0928-200-6155"],
                    "Police",
                    3,
                ),
                EmergencyContact::new("OSPITAL NG PALAWAN", &["0927-133-8635"], "Hospital", 4),
                EmergencyContact::new(
                    "ACE MEDICAL CENTER",
                    &["0917-632-3122"],
                    "Medical Center",
                    4,
                ),
                EmergencyContact::new(
                    "ADVENTIST HOSPITAL-PALAWAN",
                    &["0945-509-7723"],
                    "Hospital",
                    4,
                ),
                EmergencyContact::new("PMMG-COOP", &["0908-813-0866"], "Cooperative", 5),
                EmergencyContact::new(
                    "PSU HOTLINES: UDRRMO",
                    &["0964-921-8925"],
                    "University Emergency",
                    5,
                ),
                EmergencyContact::new(
                    "PSU HOTLINES: CLINIC",
                    &["0949-758-4517"],
                    "University Clinic",
                    5,
                ),
                EmergencyContact::new("CNHS (MEDIC)", &["0964-921-8925"], "School Medic", 5),
            ],
        ),
        region(
            "Iloilo City",
            "Iloilo",
            10.7202,
            122.5621,
            15.0,
            vec![
                EmergencyContact::new(
                    "Iloilo Emergency 911",
                    &["911", "(033) 335-0297"],
                    "Emergency Services",
                    1,
                ),
                EmergencyContact::new(
                    "Iloilo City Police Office",
                    &["(033) 320-9634", "117"],
                    "Police",
                    2,
                ),
                EmergencyContact::new(
                    "Iloilo Fire Bureau",
                    &["(033) 335-0336", "116"],
                    "Fire Department",
                    2,
                ),
                EmergencyContact::new(
                    "Western Visayas Medical Center",
                    &["(033) 321-0853"],
                    "Hospital",
                    3,
                ),
                EmergencyContact::new(
                    "Iloilo Mission Hospital",
                    &["(033) 338-7071"],
                    "Hospital",
                    4,
                ),
            ],
        ),
        region(
            "Zamboanga City",
            "Zamboanga del Sur",
            6.9214,
            122.0790,
            20.0,
            vec![
                EmergencyContact::new(
                    "Zamboanga Emergency 911",
                    &["911", "(062) 991-2923"],
                    "Emergency Services",
                    1,
                ),
                EmergencyContact::new(
                    "Zamboanga City Police Office",
                    &["(062) 991-2977", "117"],
                    "Police",
                    2,
                ),
                EmergencyContact::new(
                    "Zamboanga Fire Bureau",
                    &["(062) 991-2344", "116"],
                    "Fire Department",
                    2,
                ),
                EmergencyContact::new(
                    "Zamboanga City Medical Center",
                    &["(062) 991-2927"],
                    "Hospital",
                    3,
                ),
                EmergencyContact::new("Brent Hospital", &["(062) 991-2071"], "Hospital", 4),
            ],
        ),
        region(
            "Cagayan de Oro",
            "Misamis Oriental",
            8.4542,
            124.6319,
            15.0,
            vec![
                EmergencyContact::new(
                    "CDO Emergency 911",
                    &["911", "(088) 856-2225"],
                    "Emergency Services",
                    1,
                ),
                EmergencyContact::new("CDO Police Office", &["(088) 856-4003", "117"], "Police", 2),
                EmergencyContact::new(
                    "CDO Fire Bureau",
                    &["(088) 857-3894", "116"],
                    "Fire Department",
                    2,
                ),
                EmergencyContact::new(
                    "Northern Mindanao Medical Center",
                    &["(088) 856-3271"],
                    "Hospital",
                    3,
                ),
                EmergencyContact::new(
                    "Polymedic General Hospital",
                    &["(088) 856-0908"],
                    "Hospital",
                    4,
                ),
            ],
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use safetyconnect_common::DEFAULT_CONTACT_PRIORITY;

    fn contact(priority: u32) -> EmergencyContact {
        EmergencyContact::new("Station", &["117"], "Police", priority)
    }

    fn region_with(radius_km: f64, contacts: Vec<EmergencyContact>) -> ServiceRegion {
        region("Testville", "Test Province", 10.0, 120.0, radius_km, contacts)
    }

    #[test]
    fn test_embedded_table_is_valid() {
        let table = RegionTable::philippines().unwrap();
        assert_eq!(table.regions().len(), 10);
        assert_eq!(table.default_contacts().len(), 5);
        assert_eq!(table.regions()[0].name, "Manila");
    }

    #[test]
    fn test_rejects_empty_defaults() {
        let err = RegionTable::new(vec![], vec![]).unwrap_err();
        assert!(matches!(err, TableError::EmptyDefaults));
    }

    #[test]
    fn test_rejects_region_without_contacts() {
        let err = RegionTable::new(vec![region_with(5.0, vec![])], vec![contact(1)]).unwrap_err();
        assert!(matches!(err, TableError::NoContacts { ref region } if region == "Testville"));
    }

    #[test]
    fn test_rejects_non_positive_radius() {
        for radius in [0.0, -3.0, f64::NAN, f64::INFINITY] {
            let bad = region_with(radius, vec![contact(1)]);
            let err = RegionTable::new(vec![bad], vec![contact(1)]).unwrap_err();
            assert!(matches!(err, TableError::InvalidRadius { .. }));
        }
    }

    #[test]
    fn test_rejects_out_of_range_center() {
        let mut bad = region_with(5.0, vec![contact(1)]);
        bad.center = Coordinates::new(91.0, 0.0);
        let err = RegionTable::new(vec![bad], vec![contact(1)]).unwrap_err();
        assert!(matches!(err, TableError::InvalidCenter { .. }));
    }

    #[test]
    fn test_rejects_contact_without_numbers_or_priority() {
        let mut silent = contact(1);
        silent.phone_numbers = vec![];
        let err = RegionTable::new(vec![region_with(5.0, vec![silent])], vec![contact(1)])
            .unwrap_err();
        assert!(matches!(err, TableError::NoPhoneNumbers { .. }));

        let err = RegionTable::new(vec![], vec![contact(0)]).unwrap_err();
        assert!(matches!(
            err,
            TableError::InvalidPriority { ref region, .. } if region == DEFAULT_LIST_LABEL
        ));
    }

    #[test]
    fn test_rejects_any_blank_number() {
        for numbers in [vec!["911", ""], vec!["   "], vec!["117", "--"]] {
            let mut partial = contact(1);
            partial.phone_numbers = numbers.iter().map(|n| n.to_string()).collect();
            let err = RegionTable::new(vec![region_with(5.0, vec![partial])], vec![contact(1)])
                .unwrap_err();
            assert!(
                matches!(
                    err,
                    TableError::InvalidPhoneNumber { ref region, .. } if region == "Testville"
                ),
                "{:?} accepted",
                numbers
            );
        }
    }

    #[test]
    fn test_loads_json_table() {
        let json = r#"{
            "regions": [{
                "name": "El Nido",
                "parent_region": "Palawan",
                "center": { "lat": 11.1956, "lng": 119.4075 },
                "radius_km": 20,
                "contacts": [
                    { "name": "El Nido MDRRMO", "phone_numbers": ["0917-000-0000"], "category": "Disaster Response", "priority": 1 },
                    { "name": "El Nido Tourist Police", "phone_numbers": ["0918-000-0000"], "category": "Police" }
                ]
            }],
            "default_contacts": [
                { "name": "National Emergency Hotline", "phone_numbers": ["911"], "category": "Emergency Services", "priority": 1 }
            ]
        }"#;

        let table = RegionTable::from_json_str(json).unwrap();
        assert_eq!(table.regions().len(), 1);
        assert_eq!(table.regions()[0].contacts[1].priority, 999);
    }

    #[test]
    fn test_json_table_is_validated() {
        let json = r#"{ "regions": [], "default_contacts": [] }"#;
        assert!(matches!(
            RegionTable::from_json_str(json),
            Err(TableError::EmptyDefaults)
        ));
        assert!(matches!(
            RegionTable::from_json_str("{ not json"),
            Err(TableError::Parse(_))
        ));
    }

    #[test]
    fn test_sample_table_loads() {
        let json = include_str!("../config/regions.sample.json");
        let table = RegionTable::from_json_str(json).unwrap();
        assert_eq!(table.regions().len(), 2);
        assert_eq!(table.regions()[0].contacts[2].priority, DEFAULT_CONTACT_PRIORITY);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("regions.json");
        std::fs::write(
            &path,
            r#"{ "regions": [], "default_contacts": [
                { "name": "National Emergency Hotline", "phone_numbers": ["911"], "category": "Emergency Services", "priority": 1 }
            ] }"#,
        )
        .unwrap();

        let table = RegionTable::load(path.to_str()).unwrap();
        assert!(table.regions().is_empty());

        let missing = dir.path().join("missing.json");
        assert!(matches!(
            RegionTable::load(missing.to_str()),
            Err(TableError::Io { .. })
        ));

        assert_eq!(RegionTable::load(None).unwrap().regions().len(), 10);
    }
}
