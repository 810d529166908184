//! Site visit log.
//!
//! Visits are appended to an execution dossier and never edited afterwards. A visit may carry
//! one document, filed under the visit.

use crate::constants::VISIT_DOCUMENT_LABEL;
use crate::error::RaccordResult;
use crate::records::{Caller, ExecutionDossier, NewVisit, Request, Visit, VisitFilter};
use crate::repositories::shared::{labelled_documents, non_blank, UploadedFile};
use crate::status::{RequestType, VisitType};
use crate::store::DossierStore;
use crate::uuid::Uuid;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Fields submitted when logging a visit.
#[derive(Clone, Debug)]
pub struct VisitInput {
    pub execution_dossier_id: Uuid,
    /// Responsible who carried out the visit; defaults to the caller.
    pub responsible_id: Option<Uuid>,
    pub date: DateTime<Utc>,
    pub remarks: Option<String>,
    pub visit_type: Option<VisitType>,
    pub file: Option<UploadedFile>,
}

/// A visit with the dossier and request it belongs to.
#[derive(Clone, Debug, PartialEq)]
pub struct VisitDetail {
    pub visit: Visit,
    pub execution_dossier: ExecutionDossier,
    pub request: Request,
}

#[derive(Clone)]
pub struct VisitService {
    store: Arc<dyn DossierStore>,
}

impl VisitService {
    pub fn new(store: Arc<dyn DossierStore>) -> Self {
        Self { store }
    }

    /// Logs a visit against an execution dossier.
    ///
    /// # Errors
    ///
    /// `NotFound` if the execution dossier does not exist; `InvalidInput` if the attached file's
    /// path is not acceptable.
    pub async fn create(&self, caller: &Caller, input: VisitInput) -> RaccordResult<Visit> {
        let document = input
            .file
            .map(|file| labelled_documents(vec![file], vec![VISIT_DOCUMENT_LABEL.into()]))
            .transpose()?
            .and_then(|mut docs| docs.pop());

        let visit = self
            .store
            .create_visit(NewVisit {
                execution_dossier_id: input.execution_dossier_id,
                responsible_id: input.responsible_id.unwrap_or(caller.id),
                date: input.date,
                remarks: non_blank(input.remarks),
                visit_type: input.visit_type,
                document,
            })
            .await?;
        tracing::info!(
            "visit {} logged on execution dossier {} by {}",
            visit.id,
            visit.execution_dossier_id,
            caller.id
        );
        Ok(visit)
    }

    pub async fn get(&self, id: Uuid) -> RaccordResult<VisitDetail> {
        let visit = self.store.visit(id).await?;
        let execution_dossier = self
            .store
            .load_execution(visit.execution_dossier_id)
            .await?
            .dossier;
        let request = self.store.request(execution_dossier.request_id).await?;
        Ok(VisitDetail {
            visit,
            execution_dossier,
            request,
        })
    }

    /// Visits on dossiers a listing for `request_type` covers, most recent visit first.
    pub async fn by_type(&self, request_type: RequestType) -> RaccordResult<Vec<Visit>> {
        self.store
            .visits(VisitFilter::RequestTypes(
                request_type.listing_types().to_vec(),
            ))
            .await
    }

    /// Visits on a client's dossiers, most recent visit first.
    pub async fn by_client(&self, client_id: Uuid) -> RaccordResult<Vec<Visit>> {
        self.store.visits(VisitFilter::Client(client_id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RaccordError;
    use crate::records::{DocumentOwner, NewRequest};
    use crate::status::Role;
    use crate::store::MemoryStore;
    use chrono::Duration;
    use raccord_types::NonEmptyText;

    async fn execution(
        store: &Arc<dyn DossierStore>,
        request_type: RequestType,
    ) -> ExecutionDossier {
        let created = store
            .create_request(NewRequest {
                client_id: Uuid::new_v4(),
                request_type,
                title: NonEmptyText::new("Station de pompage").unwrap(),
                city: None,
                address: None,
                description: None,
                remarks: None,
                documents: vec![],
            })
            .await
            .unwrap();
        store
            .create_execution_if_absent(created.request.id, created.request.client_id)
            .await
            .unwrap();
        store
            .execution_for_request(created.request.id)
            .await
            .unwrap()
            .unwrap()
    }

    fn input(dossier: Uuid, date: DateTime<Utc>) -> VisitInput {
        VisitInput {
            execution_dossier_id: dossier,
            responsible_id: None,
            date,
            remarks: Some("Tranchée conforme".into()),
            visit_type: Some(VisitType::Asseu),
            file: None,
        }
    }

    #[tokio::test]
    async fn visit_document_gets_default_label() {
        let store: Arc<dyn DossierStore> = Arc::new(MemoryStore::new());
        let exec = execution(&store, RequestType::Asseu).await;
        let svc = VisitService::new(Arc::clone(&store));
        let resp = Caller::new(Uuid::new_v4(), Role::RespAsseu);

        let mut visit_input = input(exec.id, Utc::now());
        visit_input.file = Some(UploadedFile::new("photo.jpg", r"uploads\photo.jpg"));
        let visit = svc.create(&resp, visit_input).await.unwrap();

        assert_eq!(visit.responsible_id, resp.id);
        let document = visit.document.clone().unwrap();
        assert_eq!(document.label.as_deref(), Some(VISIT_DOCUMENT_LABEL));
        assert_eq!(document.path.as_str(), "uploads/photo.jpg");
        assert_eq!(document.owner, DocumentOwner::Visit(visit.id));

        let detail = svc.get(visit.id).await.unwrap();
        assert_eq!(detail.execution_dossier.id, exec.id);
        assert_eq!(detail.request.id, exec.request_id);
    }

    #[tokio::test]
    async fn visit_on_missing_dossier_is_not_found() {
        let store: Arc<dyn DossierStore> = Arc::new(MemoryStore::new());
        let svc = VisitService::new(store);
        let resp = Caller::new(Uuid::new_v4(), Role::RespAep);
        let err = svc
            .create(&resp, input(Uuid::new_v4(), Utc::now()))
            .await
            .unwrap_err();
        assert!(matches!(err, RaccordError::NotFound { .. }));
    }

    #[tokio::test]
    async fn visits_are_listed_by_date_newest_first() {
        let store: Arc<dyn DossierStore> = Arc::new(MemoryStore::new());
        let exec = execution(&store, RequestType::LesDeux).await;
        let svc = VisitService::new(Arc::clone(&store));
        let resp = Caller::new(Uuid::new_v4(), Role::RespAep);

        let now = Utc::now();
        let older = svc
            .create(&resp, input(exec.id, now - Duration::days(3)))
            .await
            .unwrap();
        let newer = svc.create(&resp, input(exec.id, now)).await.unwrap();

        let listed = svc.by_type(RequestType::Aep).await.unwrap();
        assert_eq!(
            listed.iter().map(|v| v.id).collect::<Vec<_>>(),
            vec![newer.id, older.id]
        );
        assert_eq!(svc.by_client(exec.client_id).await.unwrap().len(), 2);
        assert!(svc.by_client(Uuid::new_v4()).await.unwrap().is_empty());
    }
}
