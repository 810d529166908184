//! Persistence boundary for requests, dossiers, documents and visits.
//!
//! The [`DossierStore`] trait is the only way the rest of the crate touches stored records.
//! Two implementations ship with the crate:
//!
//! - [`MemoryStore`]: process-local tables, used by tests and throwaway runs
//! - [`FileStore`]: YAML records under a data directory, safe across processes
//!
//! ## Atomicity
//!
//! Status changes go through compare-and-set: the write only lands if the persisted status still
//! equals the status the caller computed from. Callers recompute from a fresh load when a
//! compare-and-set reports `false`; they never overwrite blindly.
//!
//! Accepting a study dossier and creating its execution dossier happen in one store call, so
//! no caller can observe an accepted study without its execution dossier.

pub mod file;
pub mod memory;

use crate::config::{CoreConfig, StoreBackend};
use crate::error::RaccordResult;
use crate::records::{
    CreatedRequest, Document, DocumentOwner, DossierFilter, ExecutionDossier, Loaded, NewDocument,
    NewRequest, NewVisit, Request, StatusWrite, StudyCas, StudyDossier, Visit, VisitFilter,
};
use crate::status::{ExecutionStatus, RequestType, StudyStatus};
use crate::uuid::Uuid;
use async_trait::async_trait;
use std::sync::Arc;

pub use file::FileStore;
pub use memory::MemoryStore;

/// Record storage used by the reconciler and the CRUD services.
///
/// All methods are `Send + Sync` so one handle can be shared by concurrent request handlers.
/// Listing methods return records newest first.
#[async_trait]
pub trait DossierStore: Send + Sync {
    /// Files a request and opens its study dossier in one operation.
    async fn create_request(&self, new: NewRequest) -> RaccordResult<CreatedRequest>;

    async fn request(&self, id: Uuid) -> RaccordResult<Request>;

    async fn requests_for_client(&self, client_id: Uuid) -> RaccordResult<Vec<Request>>;

    async fn requests_by_types(&self, types: &[RequestType]) -> RaccordResult<Vec<Request>>;

    /// Loads a study dossier with its request type.
    ///
    /// # Errors
    ///
    /// [`RaccordError::NotFound`](crate::RaccordError::NotFound) if the dossier does not exist.
    async fn load_study(&self, id: Uuid) -> RaccordResult<Loaded<StudyStatus>>;

    /// Loads an execution dossier with its request type.
    async fn load_execution(&self, id: Uuid) -> RaccordResult<Loaded<ExecutionStatus>>;

    /// Sets a study dossier's status if it still equals `write.expected`.
    ///
    /// When the new status is `ACCEPTEE`, the request's execution dossier is created in the same
    /// operation unless it already exists.
    async fn compare_and_set_study_status(
        &self,
        id: Uuid,
        write: StatusWrite<StudyStatus>,
    ) -> RaccordResult<StudyCas>;

    /// Sets an execution dossier's status if it still equals `write.expected`.
    ///
    /// Returns `Ok(false)` without writing anything when the persisted status differs.
    async fn compare_and_set_execution_status(
        &self,
        id: Uuid,
        write: StatusWrite<ExecutionStatus>,
    ) -> RaccordResult<bool>;

    /// Creates the execution dossier for `request_id` unless one exists.
    ///
    /// Returns `true` only for the call that created it.
    async fn create_execution_if_absent(
        &self,
        request_id: Uuid,
        client_id: Uuid,
    ) -> RaccordResult<bool>;

    async fn execution_for_request(
        &self,
        request_id: Uuid,
    ) -> RaccordResult<Option<ExecutionDossier>>;

    async fn study_dossiers(&self, filter: DossierFilter) -> RaccordResult<Vec<StudyDossier>>;

    async fn execution_dossiers(
        &self,
        filter: DossierFilter,
    ) -> RaccordResult<Vec<ExecutionDossier>>;

    /// Links uploaded files to a record.
    ///
    /// # Errors
    ///
    /// `NotFound` if the owner does not exist.
    async fn attach_documents(
        &self,
        owner: DocumentOwner,
        documents: Vec<NewDocument>,
    ) -> RaccordResult<Vec<Document>>;

    async fn documents_for(&self, owner: DocumentOwner) -> RaccordResult<Vec<Document>>;

    /// Appends a visit to an execution dossier's log.
    ///
    /// # Errors
    ///
    /// `NotFound` if the execution dossier does not exist.
    async fn create_visit(&self, new: NewVisit) -> RaccordResult<Visit>;

    async fn visit(&self, id: Uuid) -> RaccordResult<Visit>;

    async fn visits(&self, filter: VisitFilter) -> RaccordResult<Vec<Visit>>;
}

/// Opens the store selected by `cfg`.
///
/// Called once at startup; the returned handle is passed to every service that needs it.
pub fn open_store(cfg: &CoreConfig) -> RaccordResult<Arc<dyn DossierStore>> {
    match cfg.store_backend() {
        StoreBackend::Memory => {
            tracing::info!("using in-memory record store");
            Ok(Arc::new(MemoryStore::new()))
        }
        StoreBackend::File => {
            tracing::info!("using file record store at {}", cfg.data_dir().display());
            let store = FileStore::open(cfg.data_dir(), cfg.lock_wait())?;
            Ok(Arc::new(store))
        }
    }
}

/// Newest first, falling back to id so listings are stable.
pub(crate) fn newest_first<T>(
    items: &mut [T],
    key: impl Fn(&T) -> (chrono::DateTime<chrono::Utc>, Uuid),
) {
    items.sort_by(|a, b| key(b).cmp(&key(a)));
}
