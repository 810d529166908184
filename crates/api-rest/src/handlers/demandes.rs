use crate::error::ApiResult;
use crate::extract::{ApiJson, AuthenticatedCaller};
use crate::AppState;
use api_shared::{
    parse_id, CreateRequestReq, CreateRequestRes, ErrorRes, RequestDetailDto, RequestListRes,
};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Json;
use raccord_core::RequestType;

#[utoipa::path(
    post,
    path = "/demandes",
    request_body = CreateRequestReq,
    responses(
        (status = 201, description = "Request filed with its study dossier", body = CreateRequestRes),
        (status = 400, description = "Invalid type or missing title", body = ErrorRes),
        (status = 401, description = "Missing caller identity", body = ErrorRes),
        (status = 403, description = "Caller is not a client", body = ErrorRes),
        (status = 500, description = "Internal server error", body = ErrorRes)
    )
)]
/// File a new permit request
///
/// Writes the request, its `EN_COURS` study dossier and the metadata of the files uploaded with
/// it.
///
/// # Errors
/// - `400 Bad Request` for an unknown `type` or a blank title
/// - `403 Forbidden` if the caller is not a client
#[axum::debug_handler]
pub async fn create_request(
    State(state): State<AppState>,
    AuthenticatedCaller(caller): AuthenticatedCaller,
    ApiJson(req): ApiJson<CreateRequestReq>,
) -> ApiResult<(StatusCode, Json<CreateRequestRes>)> {
    let (request_type, input) = req.into_parts();
    let request_type: RequestType = request_type.parse()?;
    let created = state.requests.create(&caller, request_type, input).await?;
    Ok((StatusCode::CREATED, Json(created.into())))
}

#[utoipa::path(
    get,
    path = "/demandes/mine",
    responses(
        (status = 200, description = "The caller's requests, newest first", body = RequestListRes),
        (status = 401, description = "Missing caller identity", body = ErrorRes),
        (status = 403, description = "Caller is not a client", body = ErrorRes)
    )
)]
/// List the calling client's requests with their documents
#[axum::debug_handler]
pub async fn list_my_requests(
    State(state): State<AppState>,
    AuthenticatedCaller(caller): AuthenticatedCaller,
) -> ApiResult<Json<RequestListRes>> {
    let requests = state.requests.list_mine(&caller).await?;
    Ok(Json(RequestListRes {
        requests: requests.into_iter().map(RequestDetailDto::from).collect(),
    }))
}

#[utoipa::path(
    get,
    path = "/demandes/by-type/{type}",
    params(("type" = String, Path, description = "AEP, ASSEU or LES_DEUX")),
    responses(
        (status = 200, description = "Requests matching the type filter", body = RequestListRes),
        (status = 400, description = "Unknown request type", body = ErrorRes),
        (status = 403, description = "Caller is a client", body = ErrorRes)
    )
)]
/// List requests for a network
///
/// `AEP` and `ASSEU` listings include combined requests; `LES_DEUX` lists only combined ones.
#[axum::debug_handler]
pub async fn list_requests_by_type(
    State(state): State<AppState>,
    AuthenticatedCaller(caller): AuthenticatedCaller,
    Path(request_type): Path<String>,
) -> ApiResult<Json<RequestListRes>> {
    let request_type: RequestType = request_type.parse()?;
    let requests = state.requests.list_by_type(&caller, request_type).await?;
    Ok(Json(RequestListRes {
        requests: requests.into_iter().map(RequestDetailDto::from).collect(),
    }))
}

#[utoipa::path(
    get,
    path = "/demandes/{id}",
    params(("id" = String, Path, description = "Request id")),
    responses(
        (status = 200, description = "Request with its documents", body = RequestDetailDto),
        (status = 403, description = "Request belongs to another client", body = ErrorRes),
        (status = 404, description = "Request not found", body = ErrorRes)
    )
)]
/// Read one request with its documents
#[axum::debug_handler]
pub async fn get_request(
    State(state): State<AppState>,
    AuthenticatedCaller(caller): AuthenticatedCaller,
    Path(id): Path<String>,
) -> ApiResult<Json<RequestDetailDto>> {
    let detail = state.requests.get(&caller, parse_id(&id)?).await?;
    Ok(Json(detail.into()))
}
