//! JSON wire types shared by the API surfaces.
//!
//! Identifiers and timestamps travel as strings (hyphenated UUIDs, RFC 3339). Field names are
//! camelCase to match the existing front end.

use chrono::{DateTime, SecondsFormat, Utc};
use raccord_core::records::{CreatedRequest, Document, Dossier, Request, Visit};
use raccord_core::reconcile::Reconciled;
use raccord_core::repositories::dossiers::DossierDetail;
use raccord_core::repositories::requests::{RequestDetail, RequestInput};
use raccord_core::repositories::visits::{VisitDetail, VisitInput};
use raccord_core::status::DossierStatus;
use raccord_core::{Outcome, RaccordError, RaccordResult, RecordId, UploadedFile, VisitType};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parses a UUID supplied in a path or body field.
pub fn parse_id(value: &str) -> RaccordResult<raccord_core::uuid::Uuid> {
    RecordId::parse(value).map(|id| id.uuid())
}

// ============================================================================
// GENERIC
// ============================================================================

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct HealthRes {
    pub ok: bool,
    pub message: String,
}

/// Body of every error response.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ErrorRes {
    pub success: bool,
    pub message: String,
}

impl ErrorRes {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

// ============================================================================
// DOCUMENTS
// ============================================================================

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DocumentDto {
    pub id: String,
    pub filename: String,
    pub path: String,
    pub label: Option<String>,
    pub created_at: String,
}

impl From<Document> for DocumentDto {
    fn from(doc: Document) -> Self {
        Self {
            id: doc.id.to_string(),
            filename: doc.filename,
            path: doc.path.as_str().to_string(),
            label: doc.label,
            created_at: timestamp(doc.created_at),
        }
    }
}

/// A file already stored by the upload subsystem.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct UploadedFileDto {
    #[serde(default)]
    pub filename: String,
    pub path: String,
}

impl From<UploadedFileDto> for UploadedFile {
    fn from(file: UploadedFileDto) -> Self {
        UploadedFile::new(file.filename, file.path)
    }
}

fn documents(docs: Vec<Document>) -> Vec<DocumentDto> {
    docs.into_iter().map(DocumentDto::from).collect()
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AttachDocumentsReq {
    #[serde(default)]
    pub files: Vec<UploadedFileDto>,
    #[serde(default)]
    pub labels: Vec<String>,
}

impl AttachDocumentsReq {
    pub fn into_parts(self) -> (Vec<UploadedFile>, Vec<String>) {
        (
            self.files.into_iter().map(UploadedFile::from).collect(),
            self.labels,
        )
    }
}

// ============================================================================
// REQUESTS
// ============================================================================

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RequestDto {
    pub id: String,
    pub client_id: String,
    #[serde(rename = "type")]
    pub request_type: String,
    pub title: String,
    pub city: Option<String>,
    pub address: Option<String>,
    pub description: Option<String>,
    pub remarks: Option<String>,
    pub created_at: String,
}

impl From<Request> for RequestDto {
    fn from(req: Request) -> Self {
        Self {
            id: req.id.to_string(),
            client_id: req.client_id.to_string(),
            request_type: req.request_type.as_str().to_string(),
            title: req.title.into_inner(),
            city: req.city,
            address: req.address,
            description: req.description,
            remarks: req.remarks,
            created_at: timestamp(req.created_at),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct RequestDetailDto {
    pub request: RequestDto,
    pub documents: Vec<DocumentDto>,
}

impl From<RequestDetail> for RequestDetailDto {
    fn from(detail: RequestDetail) -> Self {
        Self {
            request: detail.request.into(),
            documents: documents(detail.documents),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CreateRequestReq {
    #[serde(rename = "type")]
    pub request_type: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub remarks: Option<String>,
    #[serde(default)]
    pub files: Vec<UploadedFileDto>,
}

impl CreateRequestReq {
    /// Splits the body into the request type string and the service input.
    pub fn into_parts(self) -> (String, RequestInput) {
        let input = RequestInput {
            title: self.title,
            city: self.city,
            address: self.address,
            description: self.description,
            remarks: self.remarks,
            files: self.files.into_iter().map(UploadedFile::from).collect(),
        };
        (self.request_type, input)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateRequestRes {
    pub request: RequestDto,
    pub study_dossier: DossierDto,
    pub documents: Vec<DocumentDto>,
}

impl From<CreatedRequest> for CreateRequestRes {
    fn from(created: CreatedRequest) -> Self {
        Self {
            request: created.request.into(),
            study_dossier: created.study_dossier.into(),
            documents: documents(created.documents),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct RequestListRes {
    pub requests: Vec<RequestDetailDto>,
}

// ============================================================================
// DOSSIERS
// ============================================================================

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DossierDto {
    pub id: String,
    pub request_id: String,
    pub client_id: String,
    pub status: String,
    pub remarks: String,
    pub created_at: String,
    pub updated_at: String,
}

impl<S: DossierStatus> From<Dossier<S>> for DossierDto {
    fn from(dossier: Dossier<S>) -> Self {
        Self {
            id: dossier.id.to_string(),
            request_id: dossier.request_id.to_string(),
            client_id: dossier.client_id.to_string(),
            status: dossier.status.as_str().to_string(),
            remarks: dossier.remarks,
            created_at: timestamp(dossier.created_at),
            updated_at: timestamp(dossier.updated_at),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct DossierDetailDto {
    pub dossier: DossierDto,
    pub request: RequestDto,
    pub documents: Vec<DocumentDto>,
}

impl<S: DossierStatus> From<DossierDetail<S>> for DossierDetailDto {
    fn from(detail: DossierDetail<S>) -> Self {
        Self {
            dossier: detail.dossier.into(),
            request: detail.request.into(),
            documents: documents(detail.documents),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct DossierListRes {
    pub dossiers: Vec<DossierDetailDto>,
}

impl<S: DossierStatus> From<Vec<DossierDetail<S>>> for DossierListRes {
    fn from(details: Vec<DossierDetail<S>>) -> Self {
        Self {
            dossiers: details.into_iter().map(DossierDetailDto::from).collect(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct UpdateStatusReq {
    pub status: String,
    #[serde(default, alias = "remarques")]
    pub remarks: Option<String>,
}

/// Result of a status change.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct StatusUpdateRes {
    pub success: bool,
    /// `DIRECT`, `PARTIAL` or `FINAL`.
    pub outcome: String,
    pub status: String,
    pub message: String,
}

/// User-facing message for each outcome.
pub fn status_message(outcome: Outcome) -> &'static str {
    match outcome {
        Outcome::Direct => "Statut mis à jour.",
        Outcome::Partial => "Validation partielle enregistrée. En attente de l'autre responsable.",
        Outcome::Final => "Dossier validé par AEP et ASSEU. Statut final : ACCEPTEE.",
    }
}

impl<S: DossierStatus> From<Reconciled<S>> for StatusUpdateRes {
    fn from(reconciled: Reconciled<S>) -> Self {
        Self {
            success: true,
            outcome: reconciled.outcome.as_str().to_string(),
            status: reconciled.status.as_str().to_string(),
            message: status_message(reconciled.outcome).to_string(),
        }
    }
}

// ============================================================================
// VISITS
// ============================================================================

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateVisitReq {
    pub execution_dossier_id: String,
    /// Defaults to the caller.
    #[serde(default)]
    pub responsible_id: Option<String>,
    /// RFC 3339 timestamp of the visit.
    pub date: String,
    #[serde(default, alias = "remarques")]
    pub remarks: Option<String>,
    #[serde(default, rename = "type")]
    pub visit_type: Option<String>,
    #[serde(default)]
    pub file: Option<UploadedFileDto>,
}

impl CreateVisitReq {
    /// Parses identifiers, date and visit type into the service input.
    ///
    /// # Errors
    ///
    /// `InvalidInput` for a malformed identifier, date or visit type.
    pub fn into_input(self) -> RaccordResult<VisitInput> {
        let date = DateTime::parse_from_rfc3339(self.date.trim())
            .map_err(|e| RaccordError::InvalidInput(format!("invalid date '{}': {e}", self.date)))?
            .with_timezone(&Utc);
        let visit_type = self
            .visit_type
            .filter(|t| !t.trim().is_empty())
            .map(|t| t.parse::<VisitType>())
            .transpose()?;

        Ok(VisitInput {
            execution_dossier_id: parse_id(&self.execution_dossier_id)?,
            responsible_id: self.responsible_id.as_deref().map(parse_id).transpose()?,
            date,
            remarks: self.remarks,
            visit_type,
            file: self.file.map(UploadedFile::from),
        })
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VisitDto {
    pub id: String,
    pub execution_dossier_id: String,
    pub responsible_id: String,
    pub date: String,
    pub remarks: Option<String>,
    #[serde(rename = "type")]
    pub visit_type: Option<String>,
    pub document: Option<DocumentDto>,
    pub created_at: String,
}

impl From<Visit> for VisitDto {
    fn from(visit: Visit) -> Self {
        Self {
            id: visit.id.to_string(),
            execution_dossier_id: visit.execution_dossier_id.to_string(),
            responsible_id: visit.responsible_id.to_string(),
            date: timestamp(visit.date),
            remarks: visit.remarks,
            visit_type: visit.visit_type.map(|t| t.as_str().to_string()),
            document: visit.document.map(DocumentDto::from),
            created_at: timestamp(visit.created_at),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VisitDetailDto {
    pub visit: VisitDto,
    pub execution_dossier: DossierDto,
    pub request: RequestDto,
}

impl From<VisitDetail> for VisitDetailDto {
    fn from(detail: VisitDetail) -> Self {
        Self {
            visit: detail.visit.into(),
            execution_dossier: detail.execution_dossier.into(),
            request: detail.request.into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct VisitListRes {
    pub visits: Vec<VisitDto>,
}
