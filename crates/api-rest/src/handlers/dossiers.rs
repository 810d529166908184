//! Study (`/dossiers-etude`) and execution (`/dossiers-execution`) dossier routes.
//!
//! Both kinds expose the same five operations. Status changes go through the reconciler, which
//! enforces the two-approval rule on combined requests.

use crate::error::ApiResult;
use crate::extract::{ApiJson, AuthenticatedCaller};
use crate::AppState;
use api_shared::{
    parse_id, AttachDocumentsReq, DossierDetailDto, DossierListRes, ErrorRes, StatusUpdateRes,
    UpdateStatusReq,
};
use axum::extract::{Path, State};
use axum::response::Json;
use raccord_core::RequestType;

// ============================================================================
// STUDY DOSSIERS
// ============================================================================

#[utoipa::path(
    get,
    path = "/dossiers-etude/client",
    responses(
        (status = 200, description = "The caller's study dossiers", body = DossierListRes),
        (status = 401, description = "Missing caller identity", body = ErrorRes)
    )
)]
/// List the calling client's study dossiers
#[axum::debug_handler]
pub async fn list_client_studies(
    State(state): State<AppState>,
    AuthenticatedCaller(caller): AuthenticatedCaller,
) -> ApiResult<Json<DossierListRes>> {
    let dossiers = state.dossiers.study_for_client(&caller).await?;
    Ok(Json(dossiers.into()))
}

#[utoipa::path(
    get,
    path = "/dossiers-etude/by-type/{type}",
    params(("type" = String, Path, description = "AEP, ASSEU or LES_DEUX")),
    responses(
        (status = 200, description = "Study dossiers matching the type filter", body = DossierListRes),
        (status = 400, description = "Unknown request type", body = ErrorRes)
    )
)]
/// List study dossiers for a network
#[axum::debug_handler]
pub async fn list_studies_by_type(
    State(state): State<AppState>,
    AuthenticatedCaller(_caller): AuthenticatedCaller,
    Path(request_type): Path<String>,
) -> ApiResult<Json<DossierListRes>> {
    let request_type: RequestType = request_type.parse()?;
    let dossiers = state.dossiers.study_by_type(request_type).await?;
    Ok(Json(dossiers.into()))
}

#[utoipa::path(
    get,
    path = "/dossiers-etude/{id}",
    params(("id" = String, Path, description = "Study dossier id")),
    responses(
        (status = 200, description = "Study dossier with its request and documents", body = DossierDetailDto),
        (status = 404, description = "Study dossier not found", body = ErrorRes)
    )
)]
/// Read one study dossier
#[axum::debug_handler]
pub async fn get_study(
    State(state): State<AppState>,
    AuthenticatedCaller(_caller): AuthenticatedCaller,
    Path(id): Path<String>,
) -> ApiResult<Json<DossierDetailDto>> {
    let detail = state.dossiers.study(parse_id(&id)?).await?;
    Ok(Json(detail.into()))
}

#[utoipa::path(
    put,
    path = "/dossiers-etude/{id}/status",
    params(("id" = String, Path, description = "Study dossier id")),
    request_body = UpdateStatusReq,
    responses(
        (status = 200, description = "Status applied", body = StatusUpdateRes),
        (status = 400, description = "Unknown status", body = ErrorRes),
        (status = 403, description = "Caller may not review this request", body = ErrorRes),
        (status = 404, description = "Study dossier not found", body = ErrorRes),
        (status = 409, description = "Concurrent updates kept conflicting", body = ErrorRes),
        (status = 500, description = "Internal server error", body = ErrorRes)
    )
)]
/// Change a study dossier's status
///
/// Accepting a study dossier opens the request's execution dossier, once.
#[axum::debug_handler]
pub async fn update_study_status(
    State(state): State<AppState>,
    AuthenticatedCaller(caller): AuthenticatedCaller,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<UpdateStatusReq>,
) -> ApiResult<Json<StatusUpdateRes>> {
    let reconciled = state
        .dossiers
        .update_study_status(&caller, parse_id(&id)?, &req.status, req.remarks)
        .await?;
    Ok(Json(reconciled.into()))
}

#[utoipa::path(
    put,
    path = "/dossiers-etude/{id}/documents",
    params(("id" = String, Path, description = "Study dossier id")),
    request_body = AttachDocumentsReq,
    responses(
        (status = 200, description = "Documents linked", body = DossierDetailDto),
        (status = 400, description = "No files, or file and label counts differ", body = ErrorRes),
        (status = 403, description = "Caller does not own the dossier", body = ErrorRes),
        (status = 404, description = "Study dossier not found", body = ErrorRes)
    )
)]
/// Link uploaded files to a study dossier, one label per file
#[axum::debug_handler]
pub async fn attach_study_documents(
    State(state): State<AppState>,
    AuthenticatedCaller(caller): AuthenticatedCaller,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<AttachDocumentsReq>,
) -> ApiResult<Json<DossierDetailDto>> {
    let (files, labels) = req.into_parts();
    let detail = state
        .dossiers
        .attach_study_documents(&caller, parse_id(&id)?, files, labels)
        .await?;
    Ok(Json(detail.into()))
}

// ============================================================================
// EXECUTION DOSSIERS
// ============================================================================

#[utoipa::path(
    get,
    path = "/dossiers-execution/client",
    responses(
        (status = 200, description = "The caller's execution dossiers", body = DossierListRes),
        (status = 401, description = "Missing caller identity", body = ErrorRes)
    )
)]
/// List the calling client's execution dossiers
#[axum::debug_handler]
pub async fn list_client_executions(
    State(state): State<AppState>,
    AuthenticatedCaller(caller): AuthenticatedCaller,
) -> ApiResult<Json<DossierListRes>> {
    let dossiers = state.dossiers.execution_for_client(&caller).await?;
    Ok(Json(dossiers.into()))
}

#[utoipa::path(
    get,
    path = "/dossiers-execution/by-type/{type}",
    params(("type" = String, Path, description = "AEP, ASSEU or LES_DEUX")),
    responses(
        (status = 200, description = "Execution dossiers matching the type filter", body = DossierListRes),
        (status = 400, description = "Unknown request type", body = ErrorRes)
    )
)]
/// List execution dossiers for a network
#[axum::debug_handler]
pub async fn list_executions_by_type(
    State(state): State<AppState>,
    AuthenticatedCaller(_caller): AuthenticatedCaller,
    Path(request_type): Path<String>,
) -> ApiResult<Json<DossierListRes>> {
    let request_type: RequestType = request_type.parse()?;
    let dossiers = state.dossiers.execution_by_type(request_type).await?;
    Ok(Json(dossiers.into()))
}

#[utoipa::path(
    get,
    path = "/dossiers-execution/{id}",
    params(("id" = String, Path, description = "Execution dossier id")),
    responses(
        (status = 200, description = "Execution dossier with its request and documents", body = DossierDetailDto),
        (status = 404, description = "Execution dossier not found", body = ErrorRes)
    )
)]
#[axum::debug_handler]
pub async fn get_execution(
    State(state): State<AppState>,
    AuthenticatedCaller(_caller): AuthenticatedCaller,
    Path(id): Path<String>,
) -> ApiResult<Json<DossierDetailDto>> {
    let detail = state.dossiers.execution(parse_id(&id)?).await?;
    Ok(Json(detail.into()))
}

#[utoipa::path(
    put,
    path = "/dossiers-execution/{id}/status",
    params(("id" = String, Path, description = "Execution dossier id")),
    request_body = UpdateStatusReq,
    responses(
        (status = 200, description = "Status applied, partially or finally", body = StatusUpdateRes),
        (status = 400, description = "Unknown status", body = ErrorRes),
        (status = 403, description = "Caller may not review this request", body = ErrorRes),
        (status = 404, description = "Execution dossier not found", body = ErrorRes),
        (status = 409, description = "Already accepted, or concurrent updates kept conflicting", body = ErrorRes),
        (status = 500, description = "Internal server error", body = ErrorRes)
    )
)]
/// Change an execution dossier's status
///
/// On a `LES_DEUX` request, `ACCEPTEE` from one responsible records that responsible's partial
/// approval (`PARTIAL`); the second responsible's approval makes the dossier `ACCEPTEE`
/// (`FINAL`).
///
/// # Errors
/// - `409 Conflict` if the dossier is already `ACCEPTEE`
#[axum::debug_handler]
pub async fn update_execution_status(
    State(state): State<AppState>,
    AuthenticatedCaller(caller): AuthenticatedCaller,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<UpdateStatusReq>,
) -> ApiResult<Json<StatusUpdateRes>> {
    let reconciled = state
        .dossiers
        .update_execution_status(&caller, parse_id(&id)?, &req.status, req.remarks)
        .await?;
    Ok(Json(reconciled.into()))
}

#[utoipa::path(
    put,
    path = "/dossiers-execution/{id}/documents",
    params(("id" = String, Path, description = "Execution dossier id")),
    request_body = AttachDocumentsReq,
    responses(
        (status = 200, description = "Documents linked", body = DossierDetailDto),
        (status = 400, description = "No files, or file and label counts differ", body = ErrorRes),
        (status = 403, description = "Caller does not own the dossier", body = ErrorRes),
        (status = 404, description = "Execution dossier not found", body = ErrorRes)
    )
)]
#[axum::debug_handler]
pub async fn attach_execution_documents(
    State(state): State<AppState>,
    AuthenticatedCaller(caller): AuthenticatedCaller,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<AttachDocumentsReq>,
) -> ApiResult<Json<DossierDetailDto>> {
    let (files, labels) = req.into_parts();
    let detail = state
        .dossiers
        .attach_execution_documents(&caller, parse_id(&id)?, files, labels)
        .await?;
    Ok(Json(detail.into()))
}
