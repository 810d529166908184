//! Study and execution dossier management.
//!
//! Reads return each dossier with its request and its documents. Status changes are parsed
//! here and handed to the [`StatusReconciler`]; document linking is restricted to the client
//! who owns the dossier.

use crate::config::RetryPolicy;
use crate::error::{RaccordError, RaccordResult};
use crate::reconcile::{Reconciled, StatusReconciler};
use crate::records::{Caller, Document, DocumentOwner, Dossier, DossierFilter, Request};
use crate::repositories::shared::{labelled_documents, UploadedFile};
use crate::status::{DossierStatus, ExecutionStatus, RequestType, RequestedStatus, StudyStatus};
use crate::store::DossierStore;
use crate::uuid::Uuid;
use std::sync::Arc;

/// A dossier with the request that owns it and the documents linked to it.
#[derive(Clone, Debug, PartialEq)]
pub struct DossierDetail<S> {
    pub dossier: Dossier<S>,
    pub request: Request,
    pub documents: Vec<Document>,
}

/// Service for reading dossiers, changing their status and linking documents.
#[derive(Clone)]
pub struct DossierService {
    store: Arc<dyn DossierStore>,
    reconciler: StatusReconciler,
}

impl DossierService {
    pub fn new(store: Arc<dyn DossierStore>, retry: RetryPolicy) -> Self {
        Self {
            reconciler: StatusReconciler::new(Arc::clone(&store), retry),
            store,
        }
    }

    // ========================================================================
    // STUDY DOSSIERS
    // ========================================================================

    /// The caller's own study dossiers, newest first.
    pub async fn study_for_client(
        &self,
        caller: &Caller,
    ) -> RaccordResult<Vec<DossierDetail<StudyStatus>>> {
        let dossiers = self
            .store
            .study_dossiers(DossierFilter::Client(caller.id))
            .await?;
        self.details(dossiers, DocumentOwner::StudyDossier).await
    }

    /// Study dossiers a listing for `request_type` covers.
    pub async fn study_by_type(
        &self,
        request_type: RequestType,
    ) -> RaccordResult<Vec<DossierDetail<StudyStatus>>> {
        let dossiers = self
            .store
            .study_dossiers(DossierFilter::RequestTypes(
                request_type.listing_types().to_vec(),
            ))
            .await?;
        self.details(dossiers, DocumentOwner::StudyDossier).await
    }

    pub async fn study(&self, id: Uuid) -> RaccordResult<DossierDetail<StudyStatus>> {
        let loaded = self.store.load_study(id).await?;
        self.detail(loaded.dossier, DocumentOwner::StudyDossier(id))
            .await
    }

    /// Parses `status` and applies it to a study dossier.
    ///
    /// # Errors
    ///
    /// `InvalidStatus` for anything but `EN_COURS`, `ACCEPTEE` or `A_CORRIGER`; otherwise as
    /// [`StatusReconciler::update_study_status`].
    pub async fn update_study_status(
        &self,
        caller: &Caller,
        id: Uuid,
        status: &str,
        remarks: Option<String>,
    ) -> RaccordResult<Reconciled<StudyStatus>> {
        let requested: RequestedStatus = status.parse()?;
        self.reconciler
            .update_study_status(caller, id, requested, remarks)
            .await
    }

    /// Links uploaded files, one label each, to a study dossier.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the dossier does not exist
    /// - `Unauthorized` if the caller is not the dossier's client
    /// - `InvalidInput` if no file was sent or the label count differs
    pub async fn attach_study_documents(
        &self,
        caller: &Caller,
        id: Uuid,
        files: Vec<UploadedFile>,
        labels: Vec<String>,
    ) -> RaccordResult<DossierDetail<StudyStatus>> {
        let loaded = self.store.load_study(id).await?;
        self.attach(caller, &loaded.dossier, files, labels, DocumentOwner::StudyDossier(id))
            .await?;
        self.study(id).await
    }

    // ========================================================================
    // EXECUTION DOSSIERS
    // ========================================================================

    pub async fn execution_for_client(
        &self,
        caller: &Caller,
    ) -> RaccordResult<Vec<DossierDetail<ExecutionStatus>>> {
        let dossiers = self
            .store
            .execution_dossiers(DossierFilter::Client(caller.id))
            .await?;
        self.details(dossiers, DocumentOwner::ExecutionDossier)
            .await
    }

    pub async fn execution_by_type(
        &self,
        request_type: RequestType,
    ) -> RaccordResult<Vec<DossierDetail<ExecutionStatus>>> {
        let dossiers = self
            .store
            .execution_dossiers(DossierFilter::RequestTypes(
                request_type.listing_types().to_vec(),
            ))
            .await?;
        self.details(dossiers, DocumentOwner::ExecutionDossier)
            .await
    }

    pub async fn execution(&self, id: Uuid) -> RaccordResult<DossierDetail<ExecutionStatus>> {
        let loaded = self.store.load_execution(id).await?;
        self.detail(loaded.dossier, DocumentOwner::ExecutionDossier(id))
            .await
    }

    /// Parses `status` and applies it to an execution dossier, enforcing the two-approval rule
    /// for combined requests.
    pub async fn update_execution_status(
        &self,
        caller: &Caller,
        id: Uuid,
        status: &str,
        remarks: Option<String>,
    ) -> RaccordResult<Reconciled<ExecutionStatus>> {
        let requested: RequestedStatus = status.parse()?;
        self.reconciler
            .update_execution_status(caller, id, requested, remarks)
            .await
    }

    pub async fn attach_execution_documents(
        &self,
        caller: &Caller,
        id: Uuid,
        files: Vec<UploadedFile>,
        labels: Vec<String>,
    ) -> RaccordResult<DossierDetail<ExecutionStatus>> {
        let loaded = self.store.load_execution(id).await?;
        self.attach(
            caller,
            &loaded.dossier,
            files,
            labels,
            DocumentOwner::ExecutionDossier(id),
        )
        .await?;
        self.execution(id).await
    }

    // ========================================================================
    // HELPERS
    // ========================================================================

    async fn attach<S: DossierStatus>(
        &self,
        caller: &Caller,
        dossier: &Dossier<S>,
        files: Vec<UploadedFile>,
        labels: Vec<String>,
        owner: DocumentOwner,
    ) -> RaccordResult<Vec<Document>> {
        if dossier.client_id != caller.id {
            return Err(RaccordError::Unauthorized(format!(
                "{} {} belongs to another client",
                S::KIND.entity_name(),
                dossier.id
            )));
        }
        let documents = labelled_documents(files, labels)?;
        let attached = self.store.attach_documents(owner, documents).await?;
        tracing::info!(
            "{} document(s) linked to {} {}",
            attached.len(),
            S::KIND.entity_name(),
            dossier.id
        );
        Ok(attached)
    }

    async fn detail<S: DossierStatus>(
        &self,
        dossier: Dossier<S>,
        owner: DocumentOwner,
    ) -> RaccordResult<DossierDetail<S>> {
        let request = self.store.request(dossier.request_id).await?;
        let documents = self.store.documents_for(owner).await?;
        Ok(DossierDetail {
            dossier,
            request,
            documents,
        })
    }

    async fn details<S: DossierStatus>(
        &self,
        dossiers: Vec<Dossier<S>>,
        owner: fn(Uuid) -> DocumentOwner,
    ) -> RaccordResult<Vec<DossierDetail<S>>> {
        let mut out = Vec::with_capacity(dossiers.len());
        for dossier in dossiers {
            let (id, request_id) = (dossier.id, dossier.request_id);
            match self.detail(dossier, owner(id)).await {
                Ok(detail) => out.push(detail),
                // Request records are written last: the request is mid-create or rolled back.
                Err(RaccordError::NotFound {
                    entity: "request", ..
                }) => {
                    tracing::warn!(
                        "skipping {} {id}: request {request_id} not found",
                        S::KIND.entity_name()
                    );
                }
                Err(e) => return Err(e),
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::requests::{RequestInput, RequestService};
    use crate::records::CreatedRequest;
    use crate::status::{Outcome, Role};
    use crate::store::MemoryStore;
    use std::time::Duration;

    struct Fixture {
        requests: RequestService,
        dossiers: DossierService,
        client: Caller,
    }

    fn fixture() -> Fixture {
        let store: Arc<dyn DossierStore> = Arc::new(MemoryStore::new());
        Fixture {
            requests: RequestService::new(Arc::clone(&store)),
            dossiers: DossierService::new(
                store,
                RetryPolicy::new(5, 3, Duration::from_millis(1)).unwrap(),
            ),
            client: Caller::new(Uuid::new_v4(), Role::Client),
        }
    }

    async fn file(fx: &Fixture, request_type: RequestType) -> CreatedRequest {
        fx.requests
            .create(
                &fx.client,
                request_type,
                RequestInput {
                    title: "Raccordement".into(),
                    ..RequestInput::default()
                },
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn accepting_study_opens_execution_dossier() {
        let fx = fixture();
        let created = file(&fx, RequestType::LesDeux).await;
        let resp = Caller::new(Uuid::new_v4(), Role::RespAep);

        let result = fx
            .dossiers
            .update_study_status(&resp, created.study_dossier.id, "ACCEPTEE", None)
            .await
            .unwrap();
        assert_eq!(result.status, StudyStatus::Acceptee);
        assert!(result.execution_created);

        let executions = fx.dossiers.execution_for_client(&fx.client).await.unwrap();
        assert_eq!(executions.len(), 1);
        assert_eq!(executions[0].request.id, created.request.id);
        assert_eq!(executions[0].dossier.status, ExecutionStatus::EnCours);
    }

    #[tokio::test]
    async fn unknown_status_leaves_dossier_unchanged() {
        let fx = fixture();
        let created = file(&fx, RequestType::Aep).await;
        let resp = Caller::new(Uuid::new_v4(), Role::RespAep);

        let err = fx
            .dossiers
            .update_study_status(&resp, created.study_dossier.id, "VALIDEE", None)
            .await
            .unwrap_err();
        assert!(matches!(err, RaccordError::InvalidStatus(_)));
        let detail = fx.dossiers.study(created.study_dossier.id).await.unwrap();
        assert_eq!(detail.dossier.status, StudyStatus::EnCours);
    }

    #[tokio::test]
    async fn combined_execution_needs_both_responsibles() {
        let fx = fixture();
        let created = file(&fx, RequestType::LesDeux).await;
        let aep = Caller::new(Uuid::new_v4(), Role::RespAep);
        let asseu = Caller::new(Uuid::new_v4(), Role::RespAsseu);
        fx.dossiers
            .update_study_status(&aep, created.study_dossier.id, "ACCEPTEE", None)
            .await
            .unwrap();
        let exec_id = fx.dossiers.execution_for_client(&fx.client).await.unwrap()[0]
            .dossier
            .id;

        let first = fx
            .dossiers
            .update_execution_status(&asseu, exec_id, "ACCEPTEE", None)
            .await
            .unwrap();
        assert_eq!(first.outcome, Outcome::Partial);
        assert_eq!(first.status, ExecutionStatus::AccepteeAsseu);

        let second = fx
            .dossiers
            .update_execution_status(&aep, exec_id, "ACCEPTEE", Some("RAS".into()))
            .await
            .unwrap();
        assert_eq!(second.outcome, Outcome::Final);

        let listed = fx
            .dossiers
            .execution_by_type(RequestType::Asseu)
            .await
            .unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].dossier.status, ExecutionStatus::Acceptee);
        assert_eq!(listed[0].dossier.remarks, "RAS");
    }

    #[tokio::test]
    async fn only_owner_links_documents() {
        let fx = fixture();
        let created = file(&fx, RequestType::Asseu).await;
        let id = created.study_dossier.id;

        let stranger = Caller::new(Uuid::new_v4(), Role::Client);
        let err = fx
            .dossiers
            .attach_study_documents(
                &stranger,
                id,
                vec![UploadedFile::new("a.pdf", "uploads/a.pdf")],
                vec!["Plan".into()],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, RaccordError::Unauthorized(_)));

        let err = fx
            .dossiers
            .attach_study_documents(
                &fx.client,
                id,
                vec![UploadedFile::new("a.pdf", "uploads/a.pdf")],
                vec![],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, RaccordError::InvalidInput(_)));

        let detail = fx
            .dossiers
            .attach_study_documents(
                &fx.client,
                id,
                vec![
                    UploadedFile::new("a.pdf", "uploads/a.pdf"),
                    UploadedFile::new("b.pdf", "uploads/b.pdf"),
                ],
                vec!["Plan".into(), "Devis".into()],
            )
            .await
            .unwrap();
        assert_eq!(detail.documents.len(), 2);
        assert!(detail
            .documents
            .iter()
            .all(|d| d.owner == DocumentOwner::StudyDossier(id)));
    }

    #[tokio::test]
    async fn study_listing_by_type_excludes_other_network() {
        let fx = fixture();
        file(&fx, RequestType::Aep).await;
        file(&fx, RequestType::Asseu).await;
        file(&fx, RequestType::LesDeux).await;

        let asseu = fx.dossiers.study_by_type(RequestType::Asseu).await.unwrap();
        assert_eq!(asseu.len(), 2);
        assert!(asseu
            .iter()
            .all(|d| d.request.request_type != RequestType::Aep));
    }

    #[tokio::test]
    async fn client_listing_skips_study_whose_request_is_missing() {
        use crate::constants::REQUESTS_DIR_NAME;
        use crate::store::FileStore;
        use crate::uuid::RecordId;

        let temp_dir = tempfile::TempDir::new().unwrap();
        let store: Arc<dyn DossierStore> =
            Arc::new(FileStore::open(temp_dir.path(), Duration::from_secs(1)).unwrap());
        let fx = Fixture {
            requests: RequestService::new(Arc::clone(&store)),
            dossiers: DossierService::new(store, RetryPolicy::default()),
            client: Caller::new(Uuid::new_v4(), Role::Client),
        };
        let kept = file(&fx, RequestType::Aep).await;
        let half_written = file(&fx, RequestType::Asseu).await;

        // Study and documents on disk, request record not (yet) written.
        std::fs::remove_dir_all(
            RecordId::from_uuid(half_written.request.id)
                .sharded_dir(&temp_dir.path().join(REQUESTS_DIR_NAME)),
        )
        .unwrap();

        let listed = fx.dossiers.study_for_client(&fx.client).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].request.id, kept.request.id);
    }
}
