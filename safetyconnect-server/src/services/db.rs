use crate::error::{AppError, AppResult};
use crate::models::{
    from_millis, now_millis, sos_id, tracking_prefix, ReportRow, SosRow, REPORT_COLUMNS,
    SOS_COLUMNS,
};
use chrono::{DateTime, Utc};
use safetyconnect_common::{
    Coordinates, CreateReportRequest, Report, ReportQuery, ReportSort, ReportStats, ReportStatus,
    SosAlert, SosStatus, TimelineEntry,
};
use serde::Serialize;
use sqlx::{sqlite::SqlitePool, Executor, QueryBuilder, Sqlite};
use tracing::info;
use uuid::Uuid;

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn new(url: &str) -> AppResult<Self> {
        let in_memory = url.contains(":memory:");

        // Each in-memory connection is its own database.
        let max_connections = if in_memory { 1 } else { 10 };

        let options = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(std::time::Duration::from_secs(5));
        let options = if in_memory {
            options.idle_timeout(None).max_lifetime(None)
        } else {
            options.idle_timeout(std::time::Duration::from_secs(600))
        };
        let pool = options.connect(url).await?;

        if !in_memory {
            sqlx::query("PRAGMA journal_mode=WAL;")
                .execute(&pool)
                .await?;
            sqlx::query("PRAGMA synchronous=NORMAL;")
                .execute(&pool)
                .await?;
        }

        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self { pool })
    }

    /// Inserts a Submitted report. The sequence and tracking id are derived
    /// inside the INSERT itself, so concurrent submissions serialize on
    /// SQLite's write lock instead of racing on a prior read.
    pub async fn create_report(
        &self,
        request: &CreateReportRequest,
        location: Option<String>,
    ) -> AppResult<Report> {
        let now = now_millis();

        let mut report = Report {
            id: Uuid::new_v4(),
            tracking_id: String::new(),
            title: request.title.trim().to_string(),
            category: request.category.trim().to_string(),
            description: request.description.trim().to_string(),
            status: ReportStatus::Submitted,
            date_submitted: now,
            last_edit_date: None,
            user_id: request.user_id.clone(),
            user_name: request.user_name.clone(),
            is_emergency: request.is_emergency,
            is_confidential: request.is_confidential,
            emergency_type: request.emergency_type.clone(),
            emergency_details: request.emergency_details.clone(),
            location,
            barangay: request.barangay.clone(),
            purok: request.purok.clone(),
            street: request.street.clone(),
            coordinates: request.coordinates,
            assigned_staff: None,
            resolution_notes: None,
            can_edit: true,
            timeline: vec![TimelineEntry {
                status: ReportStatus::Submitted,
                date: now,
                notes: None,
            }],
            edit_history: vec![],
        };

        let timeline = encode_json(&report.timeline, "timeline")?;

        let (sequence, tracking_id): (i64, String) = sqlx::query_as(
            "INSERT INTO reports (id, sequence, tracking_id, title, category, description, status, \
             date_submitted, last_edit_date, user_id, user_name, is_emergency, is_confidential, \
             emergency_type, emergency_details, location, barangay, purok, street, latitude, \
             longitude, assigned_staff, resolution_notes, can_edit, timeline, edit_history) \
             SELECT ?, COALESCE(MAX(sequence), 0) + 1, \
             ? || printf('%04d', COALESCE(MAX(sequence), 0) + 1), \
             ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, '[]' \
             FROM reports \
             RETURNING sequence, tracking_id",
        )
        .bind(report.id.to_string())
        .bind(tracking_prefix(now))
        .bind(&report.title)
        .bind(&report.category)
        .bind(&report.description)
        .bind(report.status.as_str())
        .bind(report.date_submitted.timestamp_millis())
        .bind(report.last_edit_date.map(|d| d.timestamp_millis()))
        .bind(&report.user_id)
        .bind(&report.user_name)
        .bind(report.is_emergency)
        .bind(report.is_confidential)
        .bind(&report.emergency_type)
        .bind(&report.emergency_details)
        .bind(&report.location)
        .bind(&report.barangay)
        .bind(&report.purok)
        .bind(&report.street)
        .bind(report.coordinates.map(|c| c.lat))
        .bind(report.coordinates.map(|c| c.lng))
        .bind(&report.assigned_staff)
        .bind(&report.resolution_notes)
        .bind(report.can_edit)
        .bind(&timeline)
        .fetch_one(&self.pool)
        .await?;

        report.tracking_id = tracking_id;
        info!(
            tracking_id = %report.tracking_id,
            sequence,
            emergency = report.is_emergency,
            "Report submitted"
        );
        Ok(report)
    }

    pub async fn get_report(&self, tracking_id: &str) -> AppResult<Option<Report>> {
        let row: Option<ReportRow> = sqlx::query_as(&format!(
            "SELECT {} FROM reports WHERE tracking_id = ?",
            REPORT_COLUMNS
        ))
        .bind(tracking_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(ReportRow::into_common).transpose()
    }

    pub async fn list_reports(&self, query: &ReportQuery) -> AppResult<Vec<Report>> {
        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {} FROM reports WHERE 1 = 1", REPORT_COLUMNS));

        if let Some(status) = query.status {
            qb.push(" AND status = ").push_bind(status.as_str());
        }
        if let Some(category) = query.category.as_deref().map(str::trim) {
            if !category.is_empty() {
                qb.push(" AND LOWER(category) = LOWER(")
                    .push_bind(category.to_string())
                    .push(")");
            }
        }
        if let Some(user_id) = &query.user_id {
            qb.push(" AND user_id = ").push_bind(user_id.clone());
        }
        if let Some(is_emergency) = query.is_emergency {
            qb.push(" AND is_emergency = ").push_bind(is_emergency);
        }

        match query.sort.unwrap_or_default() {
            ReportSort::Oldest => qb.push(" ORDER BY date_submitted ASC, sequence ASC"),
            ReportSort::Newest | ReportSort::Status => {
                qb.push(" ORDER BY date_submitted DESC, sequence DESC")
            }
        };

        let rows: Vec<ReportRow> = qb.build_query_as().fetch_all(&self.pool).await?;

        let needle = query
            .search
            .as_deref()
            .map(|s| s.trim().to_lowercase())
            .unwrap_or_default();

        let mut reports = rows
            .into_iter()
            .map(ReportRow::into_common)
            .collect::<AppResult<Vec<Report>>>()?;
        reports.retain(|r| r.matches_search(&needle));

        if query.sort == Some(ReportSort::Status) {
            reports.sort_by_key(|r| r.status.rank());
        }

        Ok(reports)
    }

    /// Writes back every mutable field of `report`.
    pub async fn save_report(&self, report: &Report) -> AppResult<()> {
        if !update_report(&self.pool, report).await? {
            return Err(AppError::NotFound(format!("Report {}", report.tracking_id)));
        }
        Ok(())
    }

    /// Saves all `reports` in one transaction; any missing row aborts it.
    pub async fn save_reports(&self, reports: &[Report]) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;
        for report in reports {
            if !update_report(&mut *tx, report).await? {
                tx.rollback().await?;
                return Err(AppError::NotFound(format!("Report {}", report.tracking_id)));
            }
        }
        tx.commit().await?;
        Ok(())
    }

    /// Reports for the given tracking ids, in no particular order. Unknown
    /// ids are simply absent.
    pub async fn get_reports(&self, tracking_ids: &[String]) -> AppResult<Vec<Report>> {
        if tracking_ids.is_empty() {
            return Ok(vec![]);
        }

        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            "SELECT {} FROM reports WHERE tracking_id IN (",
            REPORT_COLUMNS
        ));
        let mut ids = qb.separated(", ");
        for id in tracking_ids {
            ids.push_bind(id.clone());
        }
        ids.push_unseparated(")");

        let rows: Vec<ReportRow> = qb.build_query_as().fetch_all(&self.pool).await?;
        rows.into_iter().map(ReportRow::into_common).collect()
    }

    pub async fn delete_report(&self, tracking_id: &str) -> AppResult<bool> {
        let res = sqlx::query("DELETE FROM reports WHERE tracking_id = ?")
            .bind(tracking_id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    pub async fn report_stats(&self) -> AppResult<ReportStats> {
        let rows: Vec<(String, bool, i64)> = sqlx::query_as(
            "SELECT status, is_emergency, COUNT(*) FROM reports GROUP BY status, is_emergency",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut stats = ReportStats::default();
        for (status, is_emergency, count) in rows {
            let status = status
                .parse::<ReportStatus>()
                .map_err(|e| anyhow::anyhow!("report stats: {}", e))?;
            stats.record(status, is_emergency, count.max(0) as u64);
        }
        Ok(stats)
    }

    pub async fn create_sos(
        &self,
        user_id: &str,
        user_name: &str,
        location: &str,
        coordinates: Option<Coordinates>,
        at: DateTime<Utc>,
    ) -> AppResult<SosAlert> {
        let alert = SosAlert {
            id: sos_id(at),
            user_id: user_id.to_string(),
            user_name: user_name.to_string(),
            time: from_millis(at.timestamp_millis()),
            location: location.to_string(),
            coordinates,
            status: SosStatus::Active,
        };

        sqlx::query(
            "INSERT INTO sos_alerts \
             (id, user_id, user_name, time, location, latitude, longitude, status) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&alert.id)
        .bind(&alert.user_id)
        .bind(&alert.user_name)
        .bind(alert.time.timestamp_millis())
        .bind(&alert.location)
        .bind(alert.coordinates.map(|c| c.lat))
        .bind(alert.coordinates.map(|c| c.lng))
        .bind(alert.status.as_str())
        .execute(&self.pool)
        .await?;

        Ok(alert)
    }

    pub async fn list_sos(&self, status: Option<SosStatus>) -> AppResult<Vec<SosAlert>> {
        let rows: Vec<SosRow> = match status {
            Some(status) => {
                sqlx::query_as(&format!(
                    "SELECT {} FROM sos_alerts WHERE status = ? ORDER BY time DESC, rowid DESC",
                    SOS_COLUMNS
                ))
                .bind(status.as_str())
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as(&format!(
                    "SELECT {} FROM sos_alerts ORDER BY time DESC, rowid DESC",
                    SOS_COLUMNS
                ))
                .fetch_all(&self.pool)
                .await?
            }
        };

        rows.into_iter().map(SosRow::into_common).collect()
    }

    pub async fn update_sos_status(
        &self,
        id: &str,
        status: SosStatus,
    ) -> AppResult<Option<SosAlert>> {
        let res = sqlx::query("UPDATE sos_alerts SET status = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(id)
            .execute(&self.pool)
            .await?;

        if res.rows_affected() == 0 {
            return Ok(None);
        }

        let row: SosRow = sqlx::query_as(&format!(
            "SELECT {} FROM sos_alerts WHERE id = ?",
            SOS_COLUMNS
        ))
        .bind(id)
        .fetch_one(&self.pool)
        .await?;

        Ok(Some(row.into_common()?))
    }
}

fn encode_json<T: Serialize>(value: &T, what: &str) -> AppResult<String> {
    serde_json::to_string(value)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("failed to encode {}: {}", what, e)))
}

/// Returns false when no row carries the report's tracking id.
async fn update_report<'e, E>(executor: E, report: &Report) -> AppResult<bool>
where
    E: Executor<'e, Database = Sqlite>,
{
    let timeline = encode_json(&report.timeline, "timeline")?;
    let edit_history = encode_json(&report.edit_history, "edit history")?;

    let res = sqlx::query(
        "UPDATE reports SET title = ?, category = ?, description = ?, status = ?, \
         last_edit_date = ?, is_emergency = ?, is_confidential = ?, location = ?, \
         barangay = ?, purok = ?, street = ?, assigned_staff = ?, resolution_notes = ?, \
         can_edit = ?, timeline = ?, edit_history = ? WHERE tracking_id = ?",
    )
    .bind(&report.title)
    .bind(&report.category)
    .bind(&report.description)
    .bind(report.status.as_str())
    .bind(report.last_edit_date.map(|d| d.timestamp_millis()))
    .bind(report.is_emergency)
    .bind(report.is_confidential)
    .bind(&report.location)
    .bind(&report.barangay)
    .bind(&report.purok)
    .bind(&report.street)
    .bind(&report.assigned_staff)
    .bind(&report.resolution_notes)
    .bind(report.can_edit)
    .bind(&timeline)
    .bind(&edit_history)
    .bind(&report.tracking_id)
    .execute(executor)
    .await?;

    Ok(res.rows_affected() > 0)
}
