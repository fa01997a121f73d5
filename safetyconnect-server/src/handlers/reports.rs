use crate::error::{AppError, AppResult};
use crate::models::now_millis;
use crate::AppState;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use safetyconnect_common::{
    AssignReportRequest, BulkUpdateRequest, BulkUpdateResponse, CreateReportRequest,
    EditReportRequest, ErrorResponse, Report, ReportQuery, ReportStats, ReportStatus,
    UpdateReportStatusRequest,
};
use std::collections::HashSet;
use std::sync::Arc;
use validator::Validate;

async fn load_report(state: &AppState, tracking_id: &str) -> AppResult<Report> {
    state
        .db
        .get_report(tracking_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Report {}", tracking_id)))
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[utoipa::path(
    post,
    path = "/api/v1/reports",
    request_body = CreateReportRequest,
    responses(
        (status = 201, description = "Report submitted", body = Report),
        (status = 400, description = "Invalid report", body = ErrorResponse)
    )
)]
pub async fn create_report(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateReportRequest>,
) -> AppResult<(StatusCode, Json<Report>)> {
    payload.validate()?;

    let location = match (non_blank(payload.location.as_deref()), payload.coordinates) {
        (Some(location), _) => Some(location),
        (None, Some(c)) => Some(state.hotlines.describe_location(c.lat, c.lng)),
        (None, None) => None,
    };

    let report = state.db.create_report(&payload, location).await?;
    if report.is_emergency {
        tracing::warn!(tracking_id = %report.tracking_id, "Emergency report submitted");
    }
    Ok((StatusCode::CREATED, Json(report)))
}

#[utoipa::path(
    get,
    path = "/api/v1/reports",
    params(ReportQuery),
    responses(
        (status = 200, description = "Matching reports", body = [Report])
    )
)]
pub async fn list_reports(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ReportQuery>,
) -> AppResult<Json<Vec<Report>>> {
    Ok(Json(state.db.list_reports(&query).await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/reports/stats",
    responses(
        (status = 200, description = "Report counts by status", body = ReportStats)
    )
)]
pub async fn report_stats(State(state): State<Arc<AppState>>) -> AppResult<Json<ReportStats>> {
    Ok(Json(state.db.report_stats().await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/reports/{tracking_id}",
    params(("tracking_id" = String, Path, description = "Report tracking id")),
    responses(
        (status = 200, description = "Report", body = Report),
        (status = 404, description = "Unknown tracking id", body = ErrorResponse)
    )
)]
pub async fn get_report(
    State(state): State<Arc<AppState>>,
    Path(tracking_id): Path<String>,
) -> AppResult<Json<Report>> {
    Ok(Json(load_report(&state, &tracking_id).await?))
}

#[utoipa::path(
    patch,
    path = "/api/v1/reports/{tracking_id}",
    params(("tracking_id" = String, Path, description = "Report tracking id")),
    request_body = EditReportRequest,
    responses(
        (status = 200, description = "Report updated", body = Report),
        (status = 400, description = "Nothing to change", body = ErrorResponse),
        (status = 404, description = "Unknown tracking id", body = ErrorResponse),
        (status = 409, description = "Report is locked", body = ErrorResponse)
    )
)]
pub async fn edit_report(
    State(state): State<Arc<AppState>>,
    Path(tracking_id): Path<String>,
    Json(payload): Json<EditReportRequest>,
) -> AppResult<Json<Report>> {
    payload.validate()?;
    if payload.is_empty() {
        return Err(AppError::BadRequest("no fields to update".to_string()));
    }

    let mut report = load_report(&state, &tracking_id).await?;
    if !report.can_edit {
        return Err(AppError::Conflict(format!(
            "report {} can no longer be edited",
            tracking_id
        )));
    }

    let blank_required = [&payload.title, &payload.category, &payload.description]
        .into_iter()
        .any(|field| field.is_some() && non_blank(field.as_deref()).is_none());
    if blank_required {
        return Err(AppError::BadRequest(
            "title, category and description cannot be blank".to_string(),
        ));
    }

    let editor =
        non_blank(payload.edited_by.as_deref()).unwrap_or_else(|| report.user_name.clone());
    let changes = report.apply_edit(&payload, &editor, now_millis());
    if changes.is_empty() {
        return Ok(Json(report));
    }

    state.db.save_report(&report).await?;
    tracing::info!(
        tracking_id = %report.tracking_id,
        changes = changes.len(),
        "Report edited"
    );
    Ok(Json(report))
}

#[utoipa::path(
    delete,
    path = "/api/v1/reports/{tracking_id}",
    params(("tracking_id" = String, Path, description = "Report tracking id")),
    responses(
        (status = 204, description = "Report deleted"),
        (status = 404, description = "Unknown tracking id", body = ErrorResponse)
    )
)]
pub async fn delete_report(
    State(state): State<Arc<AppState>>,
    Path(tracking_id): Path<String>,
) -> AppResult<StatusCode> {
    if !state.db.delete_report(&tracking_id).await? {
        return Err(AppError::NotFound(format!("Report {}", tracking_id)));
    }
    tracing::info!(tracking_id = %tracking_id, "Report deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/api/v1/reports/{tracking_id}/status",
    params(("tracking_id" = String, Path, description = "Report tracking id")),
    request_body = UpdateReportStatusRequest,
    responses(
        (status = 200, description = "Status recorded", body = Report),
        (status = 404, description = "Unknown tracking id", body = ErrorResponse)
    )
)]
pub async fn update_report_status(
    State(state): State<Arc<AppState>>,
    Path(tracking_id): Path<String>,
    Json(payload): Json<UpdateReportStatusRequest>,
) -> AppResult<Json<Report>> {
    payload.validate()?;

    let mut report = load_report(&state, &tracking_id).await?;
    report.record_status(
        payload.status,
        non_blank(payload.notes.as_deref()),
        now_millis(),
    );
    state.db.save_report(&report).await?;

    tracing::info!(
        tracking_id = %report.tracking_id,
        status = %report.status,
        "Report status updated"
    );
    Ok(Json(report))
}

#[utoipa::path(
    post,
    path = "/api/v1/reports/{tracking_id}/assign",
    params(("tracking_id" = String, Path, description = "Report tracking id")),
    request_body = AssignReportRequest,
    responses(
        (status = 200, description = "Report assigned", body = Report),
        (status = 404, description = "Unknown tracking id", body = ErrorResponse),
        (status = 409, description = "Report already resolved", body = ErrorResponse)
    )
)]
pub async fn assign_report(
    State(state): State<Arc<AppState>>,
    Path(tracking_id): Path<String>,
    Json(payload): Json<AssignReportRequest>,
) -> AppResult<Json<Report>> {
    payload.validate()?;

    let mut report = load_report(&state, &tracking_id).await?;
    if report.status == ReportStatus::Resolved {
        return Err(AppError::Conflict(format!(
            "report {} is already resolved",
            tracking_id
        )));
    }

    report.assign(
        &payload.staff_name,
        non_blank(payload.notes.as_deref()),
        now_millis(),
    );
    state.db.save_report(&report).await?;

    tracing::info!(
        tracking_id = %report.tracking_id,
        staff = report.assigned_staff.as_deref().unwrap_or_default(),
        "Report assigned"
    );
    Ok(Json(report))
}

#[utoipa::path(
    delete,
    path = "/api/v1/reports/{tracking_id}/assign",
    params(("tracking_id" = String, Path, description = "Report tracking id")),
    responses(
        (status = 200, description = "Assignment cleared", body = Report),
        (status = 404, description = "Unknown tracking id", body = ErrorResponse),
        (status = 409, description = "Report already resolved", body = ErrorResponse)
    )
)]
pub async fn unassign_report(
    State(state): State<Arc<AppState>>,
    Path(tracking_id): Path<String>,
) -> AppResult<Json<Report>> {
    let mut report = load_report(&state, &tracking_id).await?;
    if report.status == ReportStatus::Resolved {
        return Err(AppError::Conflict(format!(
            "report {} is already resolved",
            tracking_id
        )));
    }

    if let Some(staff) = report.unassign() {
        state.db.save_report(&report).await?;
        tracing::info!(tracking_id = %report.tracking_id, staff = %staff, "Report unassigned");
    }
    Ok(Json(report))
}

#[utoipa::path(
    post,
    path = "/api/v1/reports/bulk",
    request_body = BulkUpdateRequest,
    responses(
        (status = 200, description = "Reports updated", body = BulkUpdateResponse),
        (status = 400, description = "Nothing to change", body = ErrorResponse)
    )
)]
pub async fn bulk_update_reports(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<BulkUpdateRequest>,
) -> AppResult<Json<BulkUpdateResponse>> {
    payload.validate()?;
    if payload.status.is_none() && payload.staff_name.is_none() {
        return Err(AppError::BadRequest(
            "status or staff_name is required".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    let tracking_ids: Vec<String> = payload
        .tracking_ids
        .iter()
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty() && seen.insert(id.clone()))
        .collect();

    let mut found = state.db.get_reports(&tracking_ids).await?;
    let notes = non_blank(payload.notes.as_deref());
    let staff = payload.staff_name.as_deref().map(|s| non_blank(Some(s)));
    let now = now_millis();

    let mut response = BulkUpdateResponse::default();
    for tracking_id in &tracking_ids {
        let Some(index) = found.iter().position(|r| &r.tracking_id == tracking_id) else {
            response.not_found.push(tracking_id.clone());
            continue;
        };
        let mut report = found.swap_remove(index);

        if let Some(staff) = &staff {
            if report.status == ReportStatus::Resolved {
                response.skipped.push(report.tracking_id);
                continue;
            }
            match staff {
                Some(name) => report.assign(name, notes.clone(), now),
                None => {
                    report.unassign();
                }
            }
        }
        if let Some(status) = payload.status {
            report.record_status(status, notes.clone(), now);
        }
        response.updated.push(report);
    }

    state.db.save_reports(&response.updated).await?;

    tracing::info!(
        updated = response.updated.len(),
        skipped = response.skipped.len(),
        not_found = response.not_found.len(),
        "Bulk report update"
    );
    Ok(Json(response))
}
