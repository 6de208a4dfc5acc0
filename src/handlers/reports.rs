use axum::{Json, extract::State, http::StatusCode};
use uuid::Uuid;

use crate::{
    AppState,
    error::AppResult,
    middleware::{AuthUser, JsonBody, PathParam, QueryParams},
    models::{
        CreateReportInput, ListReportsQuery, ReportResponse, ReportsResponse, UpdateReportInput,
    },
};

pub async fn create_report(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    JsonBody(input): JsonBody<CreateReportInput>,
) -> AppResult<(StatusCode, Json<ReportResponse>)> {
    let response = state.report_service.create(user_id, input).await?;

    Ok((StatusCode::CREATED, Json(response)))
}

pub async fn list_reports(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    QueryParams(query): QueryParams<ListReportsQuery>,
) -> AppResult<Json<ReportsResponse>> {
    let response = state.report_service.list(user_id, query).await?;

    Ok(Json(response))
}

pub async fn get_report(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    PathParam(id): PathParam<Uuid>,
) -> AppResult<Json<ReportResponse>> {
    let response = state.report_service.get(user_id, id).await?;

    Ok(Json(response))
}

pub async fn update_report(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    PathParam(id): PathParam<Uuid>,
    JsonBody(input): JsonBody<UpdateReportInput>,
) -> AppResult<Json<ReportResponse>> {
    let response = state.report_service.update(user_id, id, input).await?;

    Ok(Json(response))
}

pub async fn delete_report(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    PathParam(id): PathParam<Uuid>,
) -> AppResult<StatusCode> {
    state.report_service.delete(user_id, id).await?;

    Ok(StatusCode::NO_CONTENT)
}
