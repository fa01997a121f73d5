use crate::error::{AppError, AppResult};
use chrono::{DateTime, Datelike, Utc};
use rand::{distributions::Alphanumeric, Rng};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

pub use safetyconnect_common::{
    Coordinates, Report, ReportEdit, ReportStatus, SosAlert, SosStatus, TimelineEntry,
};

/// Column list shared by every report query; must match [`ReportRow`].
pub const REPORT_COLUMNS: &str = "id, tracking_id, title, category, description, status, \
    date_submitted, last_edit_date, user_id, user_name, is_emergency, is_confidential, \
    emergency_type, emergency_details, location, barangay, purok, street, latitude, longitude, \
    assigned_staff, resolution_notes, can_edit, timeline, edit_history";

pub const SOS_COLUMNS: &str = "id, user_id, user_name, time, location, latitude, longitude, status";

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ReportRow {
    pub id: String,
    pub tracking_id: String,
    pub title: String,
    pub category: String,
    pub description: String,
    pub status: String,
    pub date_submitted: i64,
    pub last_edit_date: Option<i64>,
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
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub assigned_staff: Option<String>,
    pub resolution_notes: Option<String>,
    pub can_edit: bool,
    pub timeline: String,
    pub edit_history: String,
}

impl ReportRow {
    pub fn into_common(self) -> AppResult<Report> {
        let id = Uuid::parse_str(&self.id)
            .map_err(|e| anyhow::anyhow!("corrupt report id {}: {}", self.id, e))?;
        let status = self
            .status
            .parse::<ReportStatus>()
            .map_err(|e| anyhow::anyhow!("report {}: {}", self.tracking_id, e))?;
        let timeline: Vec<TimelineEntry> = serde_json::from_str(&self.timeline)
            .map_err(|e| anyhow::anyhow!("report {} timeline: {}", self.tracking_id, e))?;
        let edit_history: Vec<ReportEdit> = serde_json::from_str(&self.edit_history)
            .map_err(|e| anyhow::anyhow!("report {} edit history: {}", self.tracking_id, e))?;

        Ok(Report {
            id,
            tracking_id: self.tracking_id,
            title: self.title,
            category: self.category,
            description: self.description,
            status,
            date_submitted: from_millis(self.date_submitted),
            last_edit_date: self.last_edit_date.map(from_millis),
            user_id: self.user_id,
            user_name: self.user_name,
            is_emergency: self.is_emergency,
            is_confidential: self.is_confidential,
            emergency_type: self.emergency_type,
            emergency_details: self.emergency_details,
            location: self.location,
            barangay: self.barangay,
            purok: self.purok,
            street: self.street,
            coordinates: coordinates(self.latitude, self.longitude),
            assigned_staff: self.assigned_staff,
            resolution_notes: self.resolution_notes,
            can_edit: self.can_edit,
            timeline,
            edit_history,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SosRow {
    pub id: String,
    pub user_id: String,
    pub user_name: String,
    pub time: i64,
    pub location: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub status: String,
}

impl SosRow {
    pub fn into_common(self) -> AppResult<SosAlert> {
        let status = self
            .status
            .parse::<SosStatus>()
            .map_err(|e| AppError::Internal(anyhow::anyhow!("alert {}: {}", self.id, e)))?;

        Ok(SosAlert {
            id: self.id,
            user_id: self.user_id,
            user_name: self.user_name,
            time: from_millis(self.time),
            location: self.location,
            coordinates: coordinates(self.latitude, self.longitude),
            status,
        })
    }
}

fn coordinates(latitude: Option<f64>, longitude: Option<f64>) -> Option<Coordinates> {
    match (latitude, longitude) {
        (Some(lat), Some(lng)) => Some(Coordinates::new(lat, lng)),
        _ => None,
    }
}

pub fn from_millis(millis: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(millis).unwrap_or_default()
}

/// Current time truncated to the millisecond precision the store keeps.
pub fn now_millis() -> DateTime<Utc> {
    from_millis(Utc::now().timestamp_millis())
}

/// `SC-<YYYY><MM>-`; the database appends the zero-padded sequence.
pub fn tracking_prefix(at: DateTime<Utc>) -> String {
    format!("SC-{}{:02}-", at.year(), at.month())
}

/// `SOS-<unix millis>-<4 uppercase alphanumerics>`.
pub fn sos_id(at: DateTime<Utc>) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(4)
        .map(char::from)
        .collect::<String>()
        .to_uppercase();
    format!("SOS-{}-{}", at.timestamp_millis(), suffix)
}
