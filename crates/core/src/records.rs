//! Persisted records and the inputs used to create them.

use crate::status::{DossierStatus, ExecutionStatus, RequestType, Role, StudyStatus, VisitType};
use crate::uuid::Uuid;
use chrono::{DateTime, Utc};
use raccord_types::{NonEmptyText, StoredPath};
use serde::{Deserialize, Serialize};

/// Identity of an authenticated caller, as established by the upstream auth layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Caller {
    pub id: Uuid,
    pub role: Role,
}

impl Caller {
    pub fn new(id: Uuid, role: Role) -> Self {
        Self { id, role }
    }
}

/// A permit request ("demande"). Its type never changes after creation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub id: Uuid,
    pub client_id: Uuid,
    pub request_type: RequestType,
    pub title: NonEmptyText,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub remarks: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A dossier tracking one phase of a request. `S` fixes the phase's status domain.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Dossier<S> {
    pub id: Uuid,
    pub request_id: Uuid,
    pub client_id: Uuid,
    pub status: S,
    #[serde(default)]
    pub remarks: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl<S: DossierStatus> Dossier<S> {
    /// A fresh dossier in the kind's initial status.
    pub fn open(request_id: Uuid, client_id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            request_id,
            client_id,
            status: S::INITIAL,
            remarks: String::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

pub type StudyDossier = Dossier<StudyStatus>;
pub type ExecutionDossier = Dossier<ExecutionStatus>;

/// A dossier together with the type of the request that owns it.
#[derive(Clone, Debug, PartialEq)]
pub struct Loaded<S> {
    pub dossier: Dossier<S>,
    pub request_type: RequestType,
}

/// Record a document is linked to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum DocumentOwner {
    Request(Uuid),
    StudyDossier(Uuid),
    ExecutionDossier(Uuid),
    Visit(Uuid),
}

/// Metadata of an uploaded file. The bytes belong to the upload subsystem.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    pub request_id: Uuid,
    pub owner: DocumentOwner,
    pub filename: String,
    pub path: StoredPath,
    #[serde(default)]
    pub label: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// One file as reported by the upload subsystem.
#[derive(Clone, Debug, PartialEq)]
pub struct NewDocument {
    pub filename: NonEmptyText,
    pub path: StoredPath,
    pub label: Option<String>,
}

impl NewDocument {
    pub(crate) fn into_document(
        self,
        request_id: Uuid,
        owner: DocumentOwner,
        now: DateTime<Utc>,
    ) -> Document {
        Document {
            id: Uuid::new_v4(),
            request_id,
            owner,
            filename: self.filename.into_inner(),
            path: self.path,
            label: self.label.filter(|l| !l.trim().is_empty()),
            created_at: now,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct NewRequest {
    pub client_id: Uuid,
    pub request_type: RequestType,
    pub title: NonEmptyText,
    pub city: Option<String>,
    pub address: Option<String>,
    pub description: Option<String>,
    pub remarks: Option<String>,
    pub documents: Vec<NewDocument>,
}

/// Everything written when a request is filed.
#[derive(Clone, Debug, PartialEq)]
pub struct CreatedRequest {
    pub request: Request,
    pub study_dossier: StudyDossier,
    pub documents: Vec<Document>,
}

/// A logged site visit. Visits are append-only.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Visit {
    pub id: Uuid,
    pub execution_dossier_id: Uuid,
    pub responsible_id: Uuid,
    pub date: DateTime<Utc>,
    #[serde(default)]
    pub remarks: Option<String>,
    #[serde(default)]
    pub visit_type: Option<VisitType>,
    #[serde(default)]
    pub document: Option<Document>,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct NewVisit {
    pub execution_dossier_id: Uuid,
    pub responsible_id: Uuid,
    pub date: DateTime<Utc>,
    pub remarks: Option<String>,
    pub visit_type: Option<VisitType>,
    pub document: Option<NewDocument>,
}

/// Selects dossiers for a listing.
#[derive(Clone, Debug, PartialEq)]
pub enum DossierFilter {
    Client(Uuid),
    RequestTypes(Vec<RequestType>),
}

/// Selects visits for a listing.
#[derive(Clone, Debug, PartialEq)]
pub enum VisitFilter {
    /// Visits whose execution dossier belongs to a request of one of these types.
    RequestTypes(Vec<RequestType>),
    /// Visits whose execution dossier belongs to this client.
    Client(Uuid),
}

/// A compare-and-set on a dossier's status.
#[derive(Clone, Debug, PartialEq)]
pub struct StatusWrite<S> {
    pub expected: S,
    pub new: S,
    pub remarks: String,
}

/// Result of a study-dossier compare-and-set.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StudyCas {
    pub applied: bool,
    /// Set when this write accepted the study and created the execution dossier.
    pub execution_created: bool,
}

impl StudyCas {
    pub const REJECTED: StudyCas = StudyCas {
        applied: false,
        execution_created: false,
    };
}
