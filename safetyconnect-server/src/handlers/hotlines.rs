use crate::error::{AppError, AppResult};
use crate::AppState;
use axum::extract::{Query, State};
use axum::Json;
use safetyconnect_common::{
    Coordinates, ErrorResponse, HotlineQuery, HotlineResponse, LocationDescription, RegionQuery,
    ServiceRegion,
};
use std::sync::Arc;
use validator::Validate;

fn checked_coordinates(query: &HotlineQuery) -> AppResult<Coordinates> {
    query.validate()?;
    let coordinates = query.coordinates();
    if !coordinates.is_valid() {
        return Err(AppError::BadRequest(format!(
            "coordinates out of range: {}",
            coordinates
        )));
    }
    Ok(coordinates)
}

#[utoipa::path(
    get,
    path = "/api/v1/hotlines",
    params(HotlineQuery),
    responses(
        (status = 200, description = "Emergency contacts for the coordinate", body = HotlineResponse),
        (status = 400, description = "Coordinates out of range", body = ErrorResponse)
    )
)]
pub async fn get_hotlines(
    State(state): State<Arc<AppState>>,
    Query(query): Query<HotlineQuery>,
) -> AppResult<Json<HotlineResponse>> {
    let coordinates = checked_coordinates(&query)?;
    Ok(Json(state.hotlines.hotlines_for(coordinates)))
}

#[utoipa::path(
    get,
    path = "/api/v1/location/describe",
    params(HotlineQuery),
    responses(
        (status = 200, description = "Human-readable location", body = LocationDescription),
        (status = 400, description = "Coordinates out of range", body = ErrorResponse)
    )
)]
pub async fn describe_location(
    State(state): State<Arc<AppState>>,
    Query(query): Query<HotlineQuery>,
) -> AppResult<Json<LocationDescription>> {
    let coordinates = checked_coordinates(&query)?;
    Ok(Json(LocationDescription {
        description: state
            .hotlines
            .describe_location(coordinates.lat, coordinates.lng),
    }))
}

#[utoipa::path(
    get,
    path = "/api/v1/regions",
    params(RegionQuery),
    responses(
        (status = 200, description = "Covered regions, filtered by name or province when q is set", body = [ServiceRegion])
    )
)]
pub async fn list_regions(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RegionQuery>,
) -> Json<Vec<ServiceRegion>> {
    let regions = match query.q.as_deref().map(str::trim) {
        Some(q) if !q.is_empty() => state.hotlines.search_regions(q),
        _ => state.hotlines.all_regions(),
    };
    Json(regions.into_iter().cloned().collect())
}
