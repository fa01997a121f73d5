use crate::error::{AppError, AppResult};
use crate::AppState;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use safetyconnect_common::{
    ErrorResponse, SosAlert, SosQuery, SosRequest, SosResponse, SosStatusRequest,
};
use std::sync::Arc;
use validator::Validate;

#[utoipa::path(
    post,
    path = "/api/v1/sos",
    request_body = SosRequest,
    responses(
        (status = 201, description = "SOS alert raised; local hotlines attached", body = SosResponse),
        (status = 400, description = "Invalid request", body = ErrorResponse)
    )
)]
pub async fn raise_sos(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<SosRequest>,
) -> AppResult<(StatusCode, Json<SosResponse>)> {
    payload.validate()?;

    // Without a device fix, hotlines come from the configured fallback
    // coordinate, which is not stored on the alert.
    let point = payload
        .coordinates
        .unwrap_or_else(|| state.settings.hotlines.fallback());
    let hotlines = state.hotlines.hotlines_for(point);

    let location = match payload.location.as_deref().map(str::trim) {
        Some(l) if !l.is_empty() => l.to_string(),
        _ => hotlines.location.clone(),
    };

    let alert = state
        .db
        .create_sos(
            &payload.user_id,
            &payload.user_name,
            &location,
            payload.coordinates,
            Utc::now(),
        )
        .await?;

    tracing::warn!(
        alert_id = %alert.id,
        location = %alert.location,
        region = hotlines.region.as_ref().map(|r| r.name.as_str()).unwrap_or("none"),
        "SOS alert raised"
    );

    Ok((StatusCode::CREATED, Json(SosResponse { alert, hotlines })))
}

#[utoipa::path(
    get,
    path = "/api/v1/sos",
    params(SosQuery),
    responses(
        (status = 200, description = "SOS alerts, newest first", body = [SosAlert])
    )
)]
pub async fn list_sos(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SosQuery>,
) -> AppResult<Json<Vec<SosAlert>>> {
    Ok(Json(state.db.list_sos(query.status).await?))
}

#[utoipa::path(
    post,
    path = "/api/v1/sos/{id}/status",
    params(("id" = String, Path, description = "SOS alert id")),
    request_body = SosStatusRequest,
    responses(
        (status = 200, description = "Status updated", body = SosAlert),
        (status = 404, description = "Unknown alert", body = ErrorResponse)
    )
)]
pub async fn update_sos_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(payload): Json<SosStatusRequest>,
) -> AppResult<Json<SosAlert>> {
    let alert = state
        .db
        .update_sos_status(&id, payload.status)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("SOS alert {}", id)))?;

    tracing::info!(alert_id = %alert.id, status = %alert.status, "SOS alert status updated");
    Ok(Json(alert))
}
