//! In-memory record store.
//!
//! [`MemoryStore`] keeps every table behind one `RwLock`, so each trait call is a single critical
//! section and compare-and-set is trivially atomic.
//!
//! ## Limitations
//!
//! - **Single-process only**: nothing is shared across process boundaries
//! - **No persistence**: all records are lost when the process exits

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use chrono::Utc;

use super::{newest_first, DossierStore};
use crate::error::{RaccordError, RaccordResult};
use crate::records::{
    CreatedRequest, Document, DocumentOwner, Dossier, DossierFilter, ExecutionDossier, Loaded,
    NewDocument, NewRequest, NewVisit, Request, StatusWrite, StudyCas, StudyDossier, Visit,
    VisitFilter,
};
use crate::status::{DossierStatus, ExecutionStatus, RequestType, StudyStatus};
use crate::uuid::Uuid;

#[derive(Debug, Default)]
struct Tables {
    requests: HashMap<Uuid, Request>,
    studies: HashMap<Uuid, StudyDossier>,
    executions: HashMap<Uuid, ExecutionDossier>,
    /// request id -> execution dossier id; at most one entry per request.
    execution_by_request: HashMap<Uuid, Uuid>,
    documents: Vec<Document>,
    visits: HashMap<Uuid, Visit>,
}

impl Tables {
    fn request(&self, id: Uuid) -> RaccordResult<&Request> {
        self.requests
            .get(&id)
            .ok_or_else(|| RaccordError::not_found("request", id))
    }

    fn request_type_of(&self, request_id: Uuid) -> RaccordResult<RequestType> {
        self.requests
            .get(&request_id)
            .map(|r| r.request_type)
            .ok_or_else(|| {
                RaccordError::Storage(format!("dossier refers to missing request {request_id}"))
            })
    }

    fn type_matches(&self, request_id: Uuid, types: &[RequestType]) -> bool {
        self.requests
            .get(&request_id)
            .is_some_and(|r| types.contains(&r.request_type))
    }

    fn dossier_matches<S>(&self, dossier: &Dossier<S>, filter: &DossierFilter) -> bool {
        match filter {
            DossierFilter::Client(client_id) => dossier.client_id == *client_id,
            DossierFilter::RequestTypes(types) => self.type_matches(dossier.request_id, types),
        }
    }

    /// Request id an owner's documents are filed under.
    fn owner_request_id(&self, owner: DocumentOwner) -> RaccordResult<Uuid> {
        match owner {
            DocumentOwner::Request(id) => self.request(id).map(|r| r.id),
            DocumentOwner::StudyDossier(id) => self
                .studies
                .get(&id)
                .map(|d| d.request_id)
                .ok_or_else(|| RaccordError::not_found("study dossier", id)),
            DocumentOwner::ExecutionDossier(id) => self
                .executions
                .get(&id)
                .map(|d| d.request_id)
                .ok_or_else(|| RaccordError::not_found("execution dossier", id)),
            DocumentOwner::Visit(id) => {
                let visit = self
                    .visits
                    .get(&id)
                    .ok_or_else(|| RaccordError::not_found("visit", id))?;
                self.executions
                    .get(&visit.execution_dossier_id)
                    .map(|d| d.request_id)
                    .ok_or_else(|| {
                        RaccordError::not_found("execution dossier", visit.execution_dossier_id)
                    })
            }
        }
    }

    fn insert_execution_if_absent(&mut self, request_id: Uuid, client_id: Uuid) -> bool {
        if self.execution_by_request.contains_key(&request_id) {
            return false;
        }
        let dossier = ExecutionDossier::open(request_id, client_id, Utc::now());
        self.execution_by_request.insert(request_id, dossier.id);
        self.executions.insert(dossier.id, dossier);
        true
    }
}

/// Converts a lock poison error to a storage error.
fn poison_err<T>(_: PoisonError<T>) -> RaccordError {
    RaccordError::Storage("memory store lock poisoned".into())
}

/// Process-local [`DossierStore`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DossierStore for MemoryStore {
    async fn create_request(&self, new: NewRequest) -> RaccordResult<CreatedRequest> {
        let now = Utc::now();
        let request = Request {
            id: Uuid::new_v4(),
            client_id: new.client_id,
            request_type: new.request_type,
            title: new.title,
            city: new.city,
            address: new.address,
            description: new.description,
            remarks: new.remarks,
            created_at: now,
        };
        let study_dossier = StudyDossier::open(request.id, request.client_id, now);
        let documents: Vec<Document> = new
            .documents
            .into_iter()
            .map(|d| d.into_document(request.id, DocumentOwner::Request(request.id), now))
            .collect();

        let mut tables = self.tables.write().map_err(poison_err)?;
        tables.requests.insert(request.id, request.clone());
        tables.studies.insert(study_dossier.id, study_dossier.clone());
        tables.documents.extend(documents.iter().cloned());

        Ok(CreatedRequest {
            request,
            study_dossier,
            documents,
        })
    }

    async fn request(&self, id: Uuid) -> RaccordResult<Request> {
        let tables = self.tables.read().map_err(poison_err)?;
        tables.request(id).cloned()
    }

    async fn requests_for_client(&self, client_id: Uuid) -> RaccordResult<Vec<Request>> {
        let tables = self.tables.read().map_err(poison_err)?;
        let mut out: Vec<Request> = tables
            .requests
            .values()
            .filter(|r| r.client_id == client_id)
            .cloned()
            .collect();
        newest_first(&mut out, |r| (r.created_at, r.id));
        Ok(out)
    }

    async fn requests_by_types(&self, types: &[RequestType]) -> RaccordResult<Vec<Request>> {
        let tables = self.tables.read().map_err(poison_err)?;
        let mut out: Vec<Request> = tables
            .requests
            .values()
            .filter(|r| types.contains(&r.request_type))
            .cloned()
            .collect();
        newest_first(&mut out, |r| (r.created_at, r.id));
        Ok(out)
    }

    async fn load_study(&self, id: Uuid) -> RaccordResult<Loaded<StudyStatus>> {
        let tables = self.tables.read().map_err(poison_err)?;
        let dossier = tables
            .studies
            .get(&id)
            .cloned()
            .ok_or_else(|| RaccordError::not_found(StudyStatus::KIND.entity_name(), id))?;
        let request_type = tables.request_type_of(dossier.request_id)?;
        Ok(Loaded {
            dossier,
            request_type,
        })
    }

    async fn load_execution(&self, id: Uuid) -> RaccordResult<Loaded<ExecutionStatus>> {
        let tables = self.tables.read().map_err(poison_err)?;
        let dossier = tables
            .executions
            .get(&id)
            .cloned()
            .ok_or_else(|| RaccordError::not_found(ExecutionStatus::KIND.entity_name(), id))?;
        let request_type = tables.request_type_of(dossier.request_id)?;
        Ok(Loaded {
            dossier,
            request_type,
        })
    }

    async fn compare_and_set_study_status(
        &self,
        id: Uuid,
        write: StatusWrite<StudyStatus>,
    ) -> RaccordResult<StudyCas> {
        let mut tables = self.tables.write().map_err(poison_err)?;
        let dossier = tables
            .studies
            .get_mut(&id)
            .ok_or_else(|| RaccordError::not_found(StudyStatus::KIND.entity_name(), id))?;
        if dossier.status != write.expected {
            return Ok(StudyCas::REJECTED);
        }
        dossier.status = write.new;
        dossier.remarks = write.remarks;
        dossier.updated_at = Utc::now();
        let (request_id, client_id) = (dossier.request_id, dossier.client_id);

        let execution_created = write.new == StudyStatus::Acceptee
            && tables.insert_execution_if_absent(request_id, client_id);
        Ok(StudyCas {
            applied: true,
            execution_created,
        })
    }

    async fn compare_and_set_execution_status(
        &self,
        id: Uuid,
        write: StatusWrite<ExecutionStatus>,
    ) -> RaccordResult<bool> {
        let mut tables = self.tables.write().map_err(poison_err)?;
        let dossier = tables
            .executions
            .get_mut(&id)
            .ok_or_else(|| RaccordError::not_found(ExecutionStatus::KIND.entity_name(), id))?;
        if dossier.status != write.expected {
            return Ok(false);
        }
        dossier.status = write.new;
        dossier.remarks = write.remarks;
        dossier.updated_at = Utc::now();
        Ok(true)
    }

    async fn create_execution_if_absent(
        &self,
        request_id: Uuid,
        client_id: Uuid,
    ) -> RaccordResult<bool> {
        let mut tables = self.tables.write().map_err(poison_err)?;
        tables.request(request_id)?;
        Ok(tables.insert_execution_if_absent(request_id, client_id))
    }

    async fn execution_for_request(
        &self,
        request_id: Uuid,
    ) -> RaccordResult<Option<ExecutionDossier>> {
        let tables = self.tables.read().map_err(poison_err)?;
        Ok(tables
            .execution_by_request
            .get(&request_id)
            .and_then(|id| tables.executions.get(id))
            .cloned())
    }

    async fn study_dossiers(&self, filter: DossierFilter) -> RaccordResult<Vec<StudyDossier>> {
        let tables = self.tables.read().map_err(poison_err)?;
        let mut out: Vec<StudyDossier> = tables
            .studies
            .values()
            .filter(|d| tables.dossier_matches(d, &filter))
            .cloned()
            .collect();
        newest_first(&mut out, |d| (d.created_at, d.id));
        Ok(out)
    }

    async fn execution_dossiers(
        &self,
        filter: DossierFilter,
    ) -> RaccordResult<Vec<ExecutionDossier>> {
        let tables = self.tables.read().map_err(poison_err)?;
        let mut out: Vec<ExecutionDossier> = tables
            .executions
            .values()
            .filter(|d| tables.dossier_matches(d, &filter))
            .cloned()
            .collect();
        newest_first(&mut out, |d| (d.created_at, d.id));
        Ok(out)
    }

    async fn attach_documents(
        &self,
        owner: DocumentOwner,
        documents: Vec<NewDocument>,
    ) -> RaccordResult<Vec<Document>> {
        let mut tables = self.tables.write().map_err(poison_err)?;
        let request_id = tables.owner_request_id(owner)?;
        let now = Utc::now();
        let created: Vec<Document> = documents
            .into_iter()
            .map(|d| d.into_document(request_id, owner, now))
            .collect();
        tables.documents.extend(created.iter().cloned());
        Ok(created)
    }

    async fn documents_for(&self, owner: DocumentOwner) -> RaccordResult<Vec<Document>> {
        let tables = self.tables.read().map_err(poison_err)?;
        Ok(tables
            .documents
            .iter()
            .filter(|d| d.owner == owner)
            .cloned()
            .collect())
    }

    async fn create_visit(&self, new: NewVisit) -> RaccordResult<Visit> {
        let mut tables = self.tables.write().map_err(poison_err)?;
        let request_id = tables
            .executions
            .get(&new.execution_dossier_id)
            .map(|d| d.request_id)
            .ok_or_else(|| {
                RaccordError::not_found(
                    ExecutionStatus::KIND.entity_name(),
                    new.execution_dossier_id,
                )
            })?;

        let now = Utc::now();
        let id = Uuid::new_v4();
        let document = new
            .document
            .map(|d| d.into_document(request_id, DocumentOwner::Visit(id), now));
        let visit = Visit {
            id,
            execution_dossier_id: new.execution_dossier_id,
            responsible_id: new.responsible_id,
            date: new.date,
            remarks: new.remarks,
            visit_type: new.visit_type,
            document: document.clone(),
            created_at: now,
        };
        tables.documents.extend(document);
        tables.visits.insert(id, visit.clone());
        Ok(visit)
    }

    async fn visit(&self, id: Uuid) -> RaccordResult<Visit> {
        let tables = self.tables.read().map_err(poison_err)?;
        tables
            .visits
            .get(&id)
            .cloned()
            .ok_or_else(|| RaccordError::not_found("visit", id))
    }

    async fn visits(&self, filter: VisitFilter) -> RaccordResult<Vec<Visit>> {
        let tables = self.tables.read().map_err(poison_err)?;
        let mut out: Vec<Visit> = tables
            .visits
            .values()
            .filter(|v| {
                let Some(dossier) = tables.executions.get(&v.execution_dossier_id) else {
                    return false;
                };
                match &filter {
                    VisitFilter::Client(client_id) => dossier.client_id == *client_id,
                    VisitFilter::RequestTypes(types) => {
                        tables.type_matches(dossier.request_id, types)
                    }
                }
            })
            .cloned()
            .collect();
        newest_first(&mut out, |v| (v.date, v.id));
        Ok(out)
    }
}
