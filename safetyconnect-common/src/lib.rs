use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[cfg(feature = "openapi")]
use utoipa::{IntoParams, ToSchema};

#[cfg(feature = "validation")]
use validator::Validate;

pub mod geo;

pub use geo::{haversine_km, Coordinates, EARTH_RADIUS_KM};

/// Priority given to contacts whose source data does not carry one.
pub const DEFAULT_CONTACT_PRIORITY: u32 = 999;

fn default_priority() -> u32 {
    DEFAULT_CONTACT_PRIORITY
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct EmergencyContact {
    pub name: String,
    pub phone_numbers: Vec<String>,
    pub category: String,
    /// Lower value is shown first.
    #[serde(default = "default_priority")]
    pub priority: u32,
}

impl EmergencyContact {
    pub fn new(name: &str, phone_numbers: &[&str], category: &str, priority: u32) -> Self {
        Self {
            name: name.to_string(),
            phone_numbers: phone_numbers.iter().map(|n| n.to_string()).collect(),
            category: category.to_string(),
            priority,
        }
    }

    pub fn primary_number(&self) -> Option<&str> {
        self.phone_numbers.first().map(String::as_str)
    }

    pub fn tel_uris(&self) -> Vec<String> {
        self.phone_numbers.iter().map(|n| tel_uri(n)).collect()
    }
}

/// Builds a `tel:` URI from a display number such as `(02) 527-3110`.
pub fn tel_uri(number: &str) -> String {
    let dialable: String = number
        .trim()
        .chars()
        .enumerate()
        .filter(|(i, c)| c.is_ascii_digit() || (*i == 0 && *c == '+'))
        .map(|(_, c)| c)
        .collect();
    format!("tel:{}", dialable)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct ServiceRegion {
    pub name: String,
    pub parent_region: String,
    pub center: Coordinates,
    pub radius_km: f64,
    pub contacts: Vec<EmergencyContact>,
}

impl ServiceRegion {
    pub fn distance_km(&self, point: &Coordinates) -> f64 {
        self.center.distance_km(point)
    }

    pub fn label(&self) -> String {
        format!("{}, {}", self.name, self.parent_region)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct RegionSummary {
    pub name: String,
    pub parent_region: String,
    pub center: Coordinates,
    pub radius_km: f64,
}

impl From<&ServiceRegion> for RegionSummary {
    fn from(region: &ServiceRegion) -> Self {
        Self {
            name: region.name.clone(),
            parent_region: region.parent_region.clone(),
            center: region.center,
            radius_km: region.radius_km,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct DialableContact {
    pub name: String,
    pub category: String,
    pub priority: u32,
    pub phone_numbers: Vec<String>,
    pub tel_uris: Vec<String>,
}

impl From<EmergencyContact> for DialableContact {
    fn from(contact: EmergencyContact) -> Self {
        let tel_uris = contact.tel_uris();
        Self {
            name: contact.name,
            category: contact.category,
            priority: contact.priority,
            phone_numbers: contact.phone_numbers,
            tel_uris,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "openapi", derive(ToSchema, IntoParams))]
#[cfg_attr(feature = "openapi", into_params(parameter_in = Query))]
#[cfg_attr(feature = "validation", derive(Validate))]
pub struct HotlineQuery {
    #[cfg_attr(feature = "validation", validate(range(min = -90.0, max = 90.0)))]
    pub lat: f64,
    #[cfg_attr(feature = "validation", validate(range(min = -180.0, max = 180.0)))]
    pub lng: f64,
}

impl HotlineQuery {
    pub fn coordinates(&self) -> Coordinates {
        Coordinates::new(self.lat, self.lng)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct HotlineResponse {
    /// `None` when the national default list was returned.
    pub region: Option<RegionSummary>,
    pub location: String,
    pub contacts: Vec<DialableContact>,
    /// Distance to the closest region center, covered or not.
    pub nearest_distance_km: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct LocationDescription {
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[cfg_attr(feature = "openapi", derive(ToSchema, IntoParams))]
#[cfg_attr(feature = "openapi", into_params(parameter_in = Query))]
pub struct RegionQuery {
    pub q: Option<String>,
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub enum ReportStatus {
    Draft,
    #[default]
    Submitted,
    #[serde(rename = "Under Review")]
    UnderReview,
    Assigned,
    #[serde(rename = "In Progress")]
    InProgress,
    Resolved,
}

impl ReportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportStatus::Draft => "Draft",
            ReportStatus::Submitted => "Submitted",
            ReportStatus::UnderReview => "Under Review",
            ReportStatus::Assigned => "Assigned",
            ReportStatus::InProgress => "In Progress",
            ReportStatus::Resolved => "Resolved",
        }
    }

    pub fn all() -> &'static [ReportStatus] {
        &[
            ReportStatus::Draft,
            ReportStatus::Submitted,
            ReportStatus::UnderReview,
            ReportStatus::Assigned,
            ReportStatus::InProgress,
            ReportStatus::Resolved,
        ]
    }

    /// Position in the triage pipeline, used for status ordering.
    pub fn rank(&self) -> u8 {
        match self {
            ReportStatus::Draft => 0,
            ReportStatus::Submitted => 1,
            ReportStatus::UnderReview => 2,
            ReportStatus::Assigned => 3,
            ReportStatus::InProgress => 4,
            ReportStatus::Resolved => 5,
        }
    }
}

impl fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReportStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = normalize_label(s);
        ReportStatus::all()
            .iter()
            .copied()
            .find(|status| normalize_label(status.as_str()) == wanted)
            .ok_or_else(|| format!("unknown report status: {}", s))
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub enum SosStatus {
    #[default]
    Active,
    Responded,
    Closed,
}

impl SosStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SosStatus::Active => "Active",
            SosStatus::Responded => "Responded",
            SosStatus::Closed => "Closed",
        }
    }
}

impl fmt::Display for SosStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SosStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_label(s).as_str() {
            "active" => Ok(SosStatus::Active),
            "responded" => Ok(SosStatus::Responded),
            "closed" => Ok(SosStatus::Closed),
            _ => Err(format!("unknown SOS status: {}", s)),
        }
    }
}

fn normalize_label(s: &str) -> String {
    s.trim()
        .chars()
        .filter(|c| !matches!(c, ' ' | '_' | '-'))
        .collect::<String>()
        .to_lowercase()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct TimelineEntry {
    pub status: ReportStatus,
    pub date: DateTime<Utc>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct Report {
    pub id: Uuid,
    pub tracking_id: String,
    pub title: String,
    pub category: String,
    pub description: String,
    pub status: ReportStatus,
    pub date_submitted: DateTime<Utc>,
    pub last_edit_date: Option<DateTime<Utc>>,
    pub user_id: String,
    pub user_name: String,
    pub is_emergency: bool,
    pub is_confidential: bool,
    pub emergency_type: Option<String>,
    pub emergency_details: Option<String>,
    pub location: Option<String>,
    pub barangay: Option<String>,
    pub purok: Option<String>,
    pub street: Option<String>,
    pub coordinates: Option<Coordinates>,
    pub assigned_staff: Option<String>,
    pub resolution_notes: Option<String>,
    pub can_edit: bool,
    pub timeline: Vec<TimelineEntry>,
    #[serde(default)]
    pub edit_history: Vec<ReportEdit>,
}

/// Text fields of a report as they stood before an edit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct ReportSnapshot {
    pub title: String,
    pub category: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct ReportEdit {
    pub date: DateTime<Utc>,
    pub edited_by: String,
    pub previous: ReportSnapshot,
    /// Human-readable summary, one line per changed field.
    pub changes: Vec<String>,
}

fn trimmed(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn replace_if_changed<T: PartialEq>(slot: &mut T, value: T) -> bool {
    if *slot == value {
        return false;
    }
    *slot = value;
    true
}

impl Report {
    /// Moves the report to `status`. The timeline only gains an entry the
    /// first time a given status is reached.
    pub fn record_status(
        &mut self,
        status: ReportStatus,
        notes: Option<String>,
        at: DateTime<Utc>,
    ) {
        if !self.timeline.iter().any(|t| t.status == status) {
            self.timeline.push(TimelineEntry {
                status,
                date: at,
                notes: notes.clone(),
            });
        }
        self.status = status;

        if status == ReportStatus::Resolved {
            self.can_edit = false;
            if notes.is_some() {
                self.resolution_notes = notes;
            }
        }
    }

    /// Hands the report to `staff` and moves it to Assigned.
    pub fn assign(&mut self, staff: &str, notes: Option<String>, at: DateTime<Utc>) {
        let staff = staff.trim().to_string();
        let notes = notes.or_else(|| Some(format!("Assigned to {}", staff)));
        self.assigned_staff = Some(staff);
        self.record_status(ReportStatus::Assigned, notes, at);
    }

    /// Clears the assignment. Status and timeline are left alone.
    pub fn unassign(&mut self) -> Option<String> {
        self.assigned_staff.take()
    }

    /// Applies the non-empty parts of `edit` and returns what changed. A
    /// history entry is recorded only when something actually changed.
    /// Blank title, category or description values are ignored; blank
    /// optional fields clear them.
    pub fn apply_edit(
        &mut self,
        edit: &EditReportRequest,
        edited_by: &str,
        at: DateTime<Utc>,
    ) -> Vec<String> {
        let previous = ReportSnapshot {
            title: self.title.clone(),
            category: self.category.clone(),
            description: self.description.clone(),
        };
        let mut changes = Vec::new();

        if let Some(title) = trimmed(edit.title.as_deref()) {
            if replace_if_changed(&mut self.title, title) {
                changes.push("Title updated".to_string());
            }
        }
        if let Some(description) = trimmed(edit.description.as_deref()) {
            if replace_if_changed(&mut self.description, description) {
                changes.push("Description updated".to_string());
            }
        }
        if let Some(category) = trimmed(edit.category.as_deref()) {
            if replace_if_changed(&mut self.category, category) {
                changes.push("Category changed".to_string());
            }
        }

        let optional = [
            (&edit.location, &mut self.location, "Location updated"),
            (&edit.barangay, &mut self.barangay, "Barangay updated"),
            (&edit.purok, &mut self.purok, "Purok updated"),
            (&edit.street, &mut self.street, "Street updated"),
        ];
        for (value, slot, label) in optional {
            if let Some(value) = value {
                if replace_if_changed(slot, trimmed(Some(value.as_str()))) {
                    changes.push(label.to_string());
                }
            }
        }

        if let Some(flag) = edit.is_emergency {
            if replace_if_changed(&mut self.is_emergency, flag) {
                let label = if flag {
                    "Marked as emergency"
                } else {
                    "Unmarked as emergency"
                };
                changes.push(label.to_string());
            }
        }
        if let Some(flag) = edit.is_confidential {
            if replace_if_changed(&mut self.is_confidential, flag) {
                let label = if flag {
                    "Marked as confidential"
                } else {
                    "Unmarked as confidential"
                };
                changes.push(label.to_string());
            }
        }

        if !changes.is_empty() {
            self.last_edit_date = Some(at);
            self.edit_history.push(ReportEdit {
                date: at,
                edited_by: edited_by.to_string(),
                previous,
                changes: changes.clone(),
            });
        }
        changes
    }

    /// Case-insensitive match over title, description, location and tracking id.
    /// `needle` must already be lowercase.
    pub fn matches_search(&self, needle: &str) -> bool {
        if needle.is_empty() {
            return true;
        }
        self.title.to_lowercase().contains(needle)
            || self.description.to_lowercase().contains(needle)
            || self.tracking_id.to_lowercase().contains(needle)
            || self
                .location
                .as_deref()
                .map(|l| l.to_lowercase().contains(needle))
                .unwrap_or(false)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[cfg_attr(feature = "validation", derive(Validate))]
pub struct CreateReportRequest {
    #[cfg_attr(feature = "validation", validate(length(min = 1, max = 100)))]
    pub user_id: String,
    #[cfg_attr(feature = "validation", validate(length(min = 1, max = 100)))]
    pub user_name: String,
    #[cfg_attr(
        feature = "validation",
        validate(length(max = 100), custom(function = "validate_not_blank"))
    )]
    pub title: String,
    #[cfg_attr(
        feature = "validation",
        validate(length(max = 50), custom(function = "validate_not_blank"))
    )]
    pub category: String,
    #[cfg_attr(
        feature = "validation",
        validate(length(max = 1000), custom(function = "validate_not_blank"))
    )]
    pub description: String,
    #[serde(default)]
    pub is_emergency: bool,
    #[serde(default)]
    pub is_confidential: bool,
    #[cfg_attr(feature = "validation", validate(length(max = 100)))]
    pub emergency_type: Option<String>,
    #[cfg_attr(feature = "validation", validate(length(max = 1000)))]
    pub emergency_details: Option<String>,
    #[cfg_attr(feature = "validation", validate(length(max = 200)))]
    pub location: Option<String>,
    #[cfg_attr(feature = "validation", validate(length(max = 100)))]
    pub barangay: Option<String>,
    #[cfg_attr(feature = "validation", validate(length(max = 100)))]
    pub purok: Option<String>,
    #[cfg_attr(feature = "validation", validate(length(max = 200)))]
    pub street: Option<String>,
    #[cfg_attr(feature = "validation", validate(nested))]
    pub coordinates: Option<Coordinates>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[cfg_attr(feature = "validation", derive(Validate))]
pub struct EditReportRequest {
    #[cfg_attr(feature = "validation", validate(length(min = 1, max = 100)))]
    pub title: Option<String>,
    #[cfg_attr(feature = "validation", validate(length(min = 1, max = 50)))]
    pub category: Option<String>,
    #[cfg_attr(feature = "validation", validate(length(min = 1, max = 1000)))]
    pub description: Option<String>,
    #[cfg_attr(feature = "validation", validate(length(max = 200)))]
    pub location: Option<String>,
    #[cfg_attr(feature = "validation", validate(length(max = 100)))]
    pub barangay: Option<String>,
    #[cfg_attr(feature = "validation", validate(length(max = 100)))]
    pub purok: Option<String>,
    #[cfg_attr(feature = "validation", validate(length(max = 200)))]
    pub street: Option<String>,
    pub is_emergency: Option<bool>,
    pub is_confidential: Option<bool>,
    /// Recorded in the edit history; the report owner's name when absent.
    #[cfg_attr(feature = "validation", validate(length(max = 100)))]
    pub edited_by: Option<String>,
}

impl EditReportRequest {
    /// True when no report field is touched. `edited_by` alone is not a change.
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.category.is_none()
            && self.description.is_none()
            && self.location.is_none()
            && self.barangay.is_none()
            && self.purok.is_none()
            && self.street.is_none()
            && self.is_emergency.is_none()
            && self.is_confidential.is_none()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[cfg_attr(feature = "validation", derive(Validate))]
pub struct UpdateReportStatusRequest {
    pub status: ReportStatus,
    #[cfg_attr(feature = "validation", validate(length(max = 1000)))]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[cfg_attr(feature = "validation", derive(Validate))]
pub struct AssignReportRequest {
    #[cfg_attr(
        feature = "validation",
        validate(length(max = 100), custom(function = "validate_not_blank"))
    )]
    pub staff_name: String,
    #[cfg_attr(feature = "validation", validate(length(max = 1000)))]
    pub notes: Option<String>,
}

/// One status and/or staff change applied to many reports. A blank
/// `staff_name` clears the assignment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[cfg_attr(feature = "validation", derive(Validate))]
pub struct BulkUpdateRequest {
    #[cfg_attr(feature = "validation", validate(length(min = 1, max = 100)))]
    pub tracking_ids: Vec<String>,
    pub status: Option<ReportStatus>,
    #[cfg_attr(feature = "validation", validate(length(max = 100)))]
    pub staff_name: Option<String>,
    #[cfg_attr(feature = "validation", validate(length(max = 1000)))]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct BulkUpdateResponse {
    pub updated: Vec<Report>,
    /// Resolved reports, whose assignment can no longer change.
    pub skipped: Vec<String>,
    pub not_found: Vec<String>,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum ReportSort {
    #[default]
    Newest,
    Oldest,
    Status,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[cfg_attr(feature = "openapi", derive(ToSchema, IntoParams))]
#[cfg_attr(feature = "openapi", into_params(parameter_in = Query))]
pub struct ReportQuery {
    pub status: Option<ReportStatus>,
    pub category: Option<String>,
    pub user_id: Option<String>,
    pub is_emergency: Option<bool>,
    pub search: Option<String>,
    pub sort: Option<ReportSort>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct ReportStats {
    pub total: u64,
    pub emergencies: u64,
    pub draft: u64,
    pub submitted: u64,
    pub under_review: u64,
    pub assigned: u64,
    pub in_progress: u64,
    pub resolved: u64,
}

impl ReportStats {
    pub fn record(&mut self, status: ReportStatus, is_emergency: bool, count: u64) {
        self.total += count;
        if is_emergency {
            self.emergencies += count;
        }
        let slot = match status {
            ReportStatus::Draft => &mut self.draft,
            ReportStatus::Submitted => &mut self.submitted,
            ReportStatus::UnderReview => &mut self.under_review,
            ReportStatus::Assigned => &mut self.assigned,
            ReportStatus::InProgress => &mut self.in_progress,
            ReportStatus::Resolved => &mut self.resolved,
        };
        *slot += count;
    }

    /// Reports still waiting on staff.
    pub fn open(&self) -> u64 {
        self.total - self.resolved - self.draft
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct SosAlert {
    pub id: String,
    pub user_id: String,
    pub user_name: String,
    pub time: DateTime<Utc>,
    pub location: String,
    pub coordinates: Option<Coordinates>,
    pub status: SosStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[cfg_attr(feature = "validation", derive(Validate))]
pub struct SosRequest {
    #[cfg_attr(feature = "validation", validate(length(min = 1, max = 100)))]
    pub user_id: String,
    #[cfg_attr(feature = "validation", validate(length(min = 1, max = 100)))]
    pub user_name: String,
    #[cfg_attr(feature = "validation", validate(length(max = 200)))]
    pub location: Option<String>,
    #[cfg_attr(feature = "validation", validate(nested))]
    pub coordinates: Option<Coordinates>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct SosResponse {
    pub alert: SosAlert,
    pub hotlines: HotlineResponse,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct SosStatusRequest {
    pub status: SosStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[cfg_attr(feature = "openapi", derive(ToSchema, IntoParams))]
#[cfg_attr(feature = "openapi", into_params(parameter_in = Query))]
pub struct SosQuery {
    pub status: Option<SosStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct ErrorResponse {
    pub error: String,
    pub success: bool,
}


#[cfg(feature = "validation")]
fn validate_not_blank(value: &str) -> Result<(), validator::ValidationError> {
    if value.trim().is_empty() {
        return Err(validator::ValidationError::new("required"));
    }
    Ok(())
}
