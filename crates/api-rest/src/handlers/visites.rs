use crate::error::ApiResult;
use crate::extract::{ApiJson, AuthenticatedCaller};
use crate::AppState;
use api_shared::{parse_id, CreateVisitReq, ErrorRes, VisitDetailDto, VisitDto, VisitListRes};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Json;
use raccord_core::RequestType;

#[utoipa::path(
    post,
    path = "/visites",
    request_body = CreateVisitReq,
    responses(
        (status = 201, description = "Visit logged", body = VisitDto),
        (status = 400, description = "Malformed id, date or visit type", body = ErrorRes),
        (status = 404, description = "Execution dossier not found", body = ErrorRes)
    )
)]
/// Log a site visit on an execution dossier
///
/// An attached file is filed as a visit document. Visits cannot be edited afterwards.
#[axum::debug_handler]
pub async fn create_visit(
    State(state): State<AppState>,
    AuthenticatedCaller(caller): AuthenticatedCaller,
    ApiJson(req): ApiJson<CreateVisitReq>,
) -> ApiResult<(StatusCode, Json<VisitDto>)> {
    let visit = state.visits.create(&caller, req.into_input()?).await?;
    Ok((StatusCode::CREATED, Json(visit.into())))
}

#[utoipa::path(
    get,
    path = "/visites/{id}",
    params(("id" = String, Path, description = "Visit id")),
    responses(
        (status = 200, description = "Visit with its dossier and request", body = VisitDetailDto),
        (status = 404, description = "Visit not found", body = ErrorRes)
    )
)]
#[axum::debug_handler]
pub async fn get_visit(
    State(state): State<AppState>,
    AuthenticatedCaller(_caller): AuthenticatedCaller,
    Path(id): Path<String>,
) -> ApiResult<Json<VisitDetailDto>> {
    let detail = state.visits.get(parse_id(&id)?).await?;
    Ok(Json(detail.into()))
}

#[utoipa::path(
    get,
    path = "/visites/by-type/{type}",
    params(("type" = String, Path, description = "AEP, ASSEU or LES_DEUX")),
    responses(
        (status = 200, description = "Visits, most recent first", body = VisitListRes),
        (status = 400, description = "Unknown request type", body = ErrorRes)
    )
)]
/// List visits on dossiers of a network, most recent visit first
#[axum::debug_handler]
pub async fn list_visits_by_type(
    State(state): State<AppState>,
    AuthenticatedCaller(_caller): AuthenticatedCaller,
    Path(request_type): Path<String>,
) -> ApiResult<Json<VisitListRes>> {
    let request_type: RequestType = request_type.parse()?;
    let visits = state.visits.by_type(request_type).await?;
    Ok(Json(VisitListRes {
        visits: visits.into_iter().map(VisitDto::from).collect(),
    }))
}

#[utoipa::path(
    get,
    path = "/visites/by-client/{client_id}",
    params(("client_id" = String, Path, description = "Client id")),
    responses(
        (status = 200, description = "Visits, most recent first", body = VisitListRes),
        (status = 400, description = "Malformed client id", body = ErrorRes)
    )
)]
/// List visits on a client's dossiers, most recent visit first
#[axum::debug_handler]
pub async fn list_visits_by_client(
    State(state): State<AppState>,
    AuthenticatedCaller(_caller): AuthenticatedCaller,
    Path(client_id): Path<String>,
) -> ApiResult<Json<VisitListRes>> {
    let visits = state.visits.by_client(parse_id(&client_id)?).await?;
    Ok(Json(VisitListRes {
        visits: visits.into_iter().map(VisitDto::from).collect(),
    }))
}
