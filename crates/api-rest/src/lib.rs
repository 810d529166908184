//! # API REST
//!
//! REST API implementation for Raccord.
//!
//! Handles:
//! - HTTP endpoints with axum
//! - OpenAPI/Swagger documentation
//! - REST-specific concerns (JSON bodies, CORS, error to status mapping)
//!
//! Uses `api-shared` for wire types, caller authentication and configuration.

#![warn(rust_2018_idioms)]

pub mod error;
pub mod extract;
pub mod handlers;

use axum::{
    routing::{get, post, put},
    Router,
};
use raccord_core::{CoreConfig, DossierService, DossierStore, RequestService, VisitService};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use handlers::{demandes, dossiers, health, visites};

/// Application state shared across REST API handlers
///
/// Every service holds the same store handle, opened once at startup.
#[derive(Clone)]
pub struct AppState {
    pub cfg: Arc<CoreConfig>,
    pub requests: RequestService,
    pub dossiers: DossierService,
    pub visits: VisitService,
}

impl AppState {
    pub fn new(cfg: Arc<CoreConfig>, store: Arc<dyn DossierStore>) -> Self {
        Self {
            requests: RequestService::new(Arc::clone(&store)),
            dossiers: DossierService::new(Arc::clone(&store), cfg.retry()),
            visits: VisitService::new(store),
            cfg,
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        demandes::create_request,
        demandes::list_my_requests,
        demandes::list_requests_by_type,
        demandes::get_request,
        dossiers::list_client_studies,
        dossiers::list_studies_by_type,
        dossiers::get_study,
        dossiers::update_study_status,
        dossiers::attach_study_documents,
        dossiers::list_client_executions,
        dossiers::list_executions_by_type,
        dossiers::get_execution,
        dossiers::update_execution_status,
        dossiers::attach_execution_documents,
        visites::create_visit,
        visites::get_visit,
        visites::list_visits_by_type,
        visites::list_visits_by_client,
    ),
    components(schemas(
        api_shared::HealthRes,
        api_shared::ErrorRes,
        api_shared::DocumentDto,
        api_shared::UploadedFileDto,
        api_shared::AttachDocumentsReq,
        api_shared::RequestDto,
        api_shared::RequestDetailDto,
        api_shared::CreateRequestReq,
        api_shared::CreateRequestRes,
        api_shared::RequestListRes,
        api_shared::DossierDto,
        api_shared::DossierDetailDto,
        api_shared::DossierListRes,
        api_shared::UpdateStatusReq,
        api_shared::StatusUpdateRes,
        api_shared::CreateVisitReq,
        api_shared::VisitDto,
        api_shared::VisitDetailDto,
        api_shared::VisitListRes,
    ))
)]
pub struct ApiDoc;

/// Builds the REST router with Swagger UI and permissive CORS.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/demandes", post(demandes::create_request))
        .route("/demandes/mine", get(demandes::list_my_requests))
        .route("/demandes/by-type/:type", get(demandes::list_requests_by_type))
        .route("/demandes/:id", get(demandes::get_request))
        .route("/dossiers-etude/client", get(dossiers::list_client_studies))
        .route(
            "/dossiers-etude/by-type/:type",
            get(dossiers::list_studies_by_type),
        )
        .route("/dossiers-etude/:id", get(dossiers::get_study))
        .route(
            "/dossiers-etude/:id/status",
            put(dossiers::update_study_status),
        )
        .route(
            "/dossiers-etude/:id/documents",
            put(dossiers::attach_study_documents),
        )
        .route(
            "/dossiers-execution/client",
            get(dossiers::list_client_executions),
        )
        .route(
            "/dossiers-execution/by-type/:type",
            get(dossiers::list_executions_by_type),
        )
        .route("/dossiers-execution/:id", get(dossiers::get_execution))
        .route(
            "/dossiers-execution/:id/status",
            put(dossiers::update_execution_status),
        )
        .route(
            "/dossiers-execution/:id/documents",
            put(dossiers::attach_execution_documents),
        )
        .route("/visites", post(visites::create_visit))
        .route("/visites/by-type/:type", get(visites::list_visits_by_type))
        .route(
            "/visites/by-client/:client_id",
            get(visites::list_visits_by_client),
        )
        .route("/visites/:id", get(visites::get_visit))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
