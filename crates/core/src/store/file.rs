//! YAML file record store.
//!
//! Every record is one `record.yaml` inside a sharded directory (see [`crate::uuid`]):
//!
//! ```text
//! <data_dir>/
//!   demandes/<s1>/<s2>/<uuid>/record.yaml
//!   dossiers_etude/<s1>/<s2>/<uuid>/record.yaml
//!   dossiers_execution/<s1>/<s2>/<uuid>/record.yaml
//!   visites/<s1>/<s2>/<uuid>/record.yaml
//!   documents/<s1>/<s2>/<uuid>/record.yaml
//! ```
//!
//! ## Concurrency
//!
//! - Records are staged in a [`NamedTempFile`] beside `record.yaml` and persisted over it, so
//!   readers never see a half-written record.
//! - Status mutations hold an `fd-lock` write lock on the dossier's `record.lock`. The OS drops
//!   the lock with the file handle, including when the holder dies, so there is no stale lock
//!   to clean up.
//! - A request's execution dossier id is derived from the request id, and its record is
//!   persisted without clobbering: whoever creates that record owns the one execution dossier.
//!
//! Blocking filesystem work runs on Tokio's blocking pool.

use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind as IoErrorKind, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tempfile::NamedTempFile;

use super::{newest_first, DossierStore};
use crate::constants::{
    DOCUMENTS_DIR_NAME, EXECUTION_DIR_NAME, EXECUTION_ID_NAMESPACE, LOCK_RETRY_INTERVAL_MS,
    RECORD_FILENAME, RECORD_LOCK_FILENAME, REQUESTS_DIR_NAME, STUDY_DIR_NAME, VISITS_DIR_NAME,
};
use crate::error::{RaccordError, RaccordResult};
use crate::records::{
    CreatedRequest, Document, DocumentOwner, Dossier, DossierFilter, ExecutionDossier, Loaded,
    NewDocument, NewRequest, NewVisit, Request, StatusWrite, StudyCas, StudyDossier, Visit,
    VisitFilter,
};
use crate::status::{DossierStatus, ExecutionStatus, RequestType, StudyStatus};
use crate::uuid::{RecordId, Uuid};

/// [`DossierStore`] persisting YAML records under a data directory.
#[derive(Clone, Debug)]
pub struct FileStore {
    layout: Layout,
}

impl FileStore {
    /// Opens (and if needed creates) a store rooted at `data_dir`.
    ///
    /// `lock_wait` bounds how long a status change waits for another writer's record lock.
    ///
    /// # Errors
    ///
    /// Returns [`RaccordError::RecordDirCreation`] if the directory tree cannot be created.
    pub fn open(data_dir: &Path, lock_wait: Duration) -> RaccordResult<Self> {
        let layout = Layout {
            root: data_dir.to_path_buf(),
            lock_wait,
        };
        for dir in [
            layout.requests_dir(),
            layout.study_dir(),
            layout.execution_dir(),
            layout.visits_dir(),
            layout.documents_dir(),
        ] {
            fs::create_dir_all(&dir).map_err(RaccordError::RecordDirCreation)?;
        }
        Ok(Self { layout })
    }

    pub fn data_dir(&self) -> &Path {
        &self.layout.root
    }

    async fn blocking<T, F>(&self, f: F) -> RaccordResult<T>
    where
        F: FnOnce(&Layout) -> RaccordResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let layout = self.layout.clone();
        tokio::task::spawn_blocking(move || f(&layout))
            .await
            .map_err(|e| RaccordError::Storage(format!("blocking store task failed: {e}")))?
    }
}

/// Runs `f` while holding the write lock on `<record_dir>/record.lock`.
///
/// The lock belongs to the open file handle. It is released when `f` returns, or by the OS if
/// the process dies first; the lock file itself stays and is reused.
///
/// # Errors
///
/// [`RaccordError::LockBusy`] if another writer holds the lock for longer than `wait`.
fn with_record_lock<T>(
    record_dir: &Path,
    wait: Duration,
    f: impl FnOnce() -> RaccordResult<T>,
) -> RaccordResult<T> {
    let path = record_dir.join(RECORD_LOCK_FILENAME);
    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(false)
        .open(&path)
        .map_err(RaccordError::FileWrite)?;
    let mut lock = fd_lock::RwLock::new(file);

    let deadline = Instant::now() + wait;
    let _guard = loop {
        match lock.try_write() {
            Ok(guard) => break guard,
            Err(e) if Instant::now() >= deadline => {
                return Err(RaccordError::LockBusy {
                    path,
                    reason: format!("still held after {}ms: {e}", wait.as_millis()),
                });
            }
            Err(_) => thread::sleep(Duration::from_millis(LOCK_RETRY_INTERVAL_MS)),
        }
    };
    f()
}

/// Id of the one execution dossier a request can have.
fn execution_id(request_id: Uuid) -> Uuid {
    Uuid::new_v5(&EXECUTION_ID_NAMESPACE, request_id.as_bytes())
}

/// Path arithmetic and blocking record I/O.
#[derive(Clone, Debug)]
struct Layout {
    root: PathBuf,
    lock_wait: Duration,
}

impl Layout {
    fn requests_dir(&self) -> PathBuf {
        self.root.join(REQUESTS_DIR_NAME)
    }

    fn study_dir(&self) -> PathBuf {
        self.root.join(STUDY_DIR_NAME)
    }

    fn execution_dir(&self) -> PathBuf {
        self.root.join(EXECUTION_DIR_NAME)
    }

    fn visits_dir(&self) -> PathBuf {
        self.root.join(VISITS_DIR_NAME)
    }

    fn documents_dir(&self) -> PathBuf {
        self.root.join(DOCUMENTS_DIR_NAME)
    }

    fn record_dir(parent: &Path, id: Uuid) -> PathBuf {
        RecordId::from_uuid(id).sharded_dir(parent)
    }

    fn read<T: DeserializeOwned>(parent: &Path, id: Uuid) -> RaccordResult<Option<T>> {
        read_record(&Self::record_dir(parent, id).join(RECORD_FILENAME))
    }

    fn write<T: Serialize>(parent: &Path, id: Uuid, value: &T) -> RaccordResult<()> {
        let dir = Self::record_dir(parent, id);
        fs::create_dir_all(&dir).map_err(RaccordError::RecordDirCreation)?;
        write_record(&dir.join(RECORD_FILENAME), value)
    }

    fn remove(parent: &Path, id: Uuid) -> std::io::Result<()> {
        match fs::remove_dir_all(Self::record_dir(parent, id)) {
            Err(e) if e.kind() != IoErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }

    fn request(&self, id: Uuid) -> RaccordResult<Request> {
        Self::read(&self.requests_dir(), id)?.ok_or_else(|| RaccordError::not_found("request", id))
    }

    fn dossier<S>(&self, parent: &Path, id: Uuid) -> RaccordResult<Dossier<S>>
    where
        S: DossierStatus + DeserializeOwned,
    {
        Self::read(parent, id)?.ok_or_else(|| RaccordError::not_found(S::KIND.entity_name(), id))
    }

    fn loaded<S>(&self, parent: &Path, id: Uuid) -> RaccordResult<Loaded<S>>
    where
        S: DossierStatus + DeserializeOwned,
    {
        let dossier: Dossier<S> = self.dossier(parent, id)?;
        let request: Request = Self::read(&self.requests_dir(), dossier.request_id)?
            .ok_or_else(|| {
                RaccordError::Storage(format!(
                    "dossier {id} refers to missing request {}",
                    dossier.request_id
                ))
            })?;
        Ok(Loaded {
            dossier,
            request_type: request.request_type,
        })
    }

    fn request_types(&self) -> RaccordResult<HashMap<Uuid, RequestType>> {
        Ok(list_records::<Request>(&self.requests_dir())?
            .into_iter()
            .map(|r| (r.id, r.request_type))
            .collect())
    }

    fn dossiers<S>(&self, parent: &Path, filter: &DossierFilter) -> RaccordResult<Vec<Dossier<S>>>
    where
        S: DossierStatus + DeserializeOwned,
    {
        let all: Vec<Dossier<S>> = list_records(parent)?;
        let mut out: Vec<Dossier<S>> = match filter {
            DossierFilter::Client(client_id) => {
                all.into_iter().filter(|d| d.client_id == *client_id).collect()
            }
            DossierFilter::RequestTypes(types) => {
                let request_types = self.request_types()?;
                all.into_iter()
                    .filter(|d| {
                        request_types
                            .get(&d.request_id)
                            .is_some_and(|t| types.contains(t))
                    })
                    .collect()
            }
        };
        newest_first(&mut out, |d| (d.created_at, d.id));
        Ok(out)
    }

    /// Creates the request's execution dossier unless its record already exists.
    ///
    /// The record appears in one no-clobber persist, whole or not at all, so an interrupted
    /// creation leaves nothing that blocks the next attempt.
    fn create_execution_if_absent(&self, request_id: Uuid, client_id: Uuid) -> RaccordResult<bool> {
        let mut dossier = ExecutionDossier::open(request_id, client_id, Utc::now());
        dossier.id = execution_id(request_id);
        let dir = Self::record_dir(&self.execution_dir(), dossier.id);
        fs::create_dir_all(&dir).map_err(RaccordError::RecordDirCreation)?;

        let created = create_record(&dir.join(RECORD_FILENAME), &dossier)?;
        if created {
            tracing::info!("opened execution dossier {} for request {request_id}", dossier.id);
        }
        Ok(created)
    }

    /// Undoes a [`Layout::create_execution_if_absent`] whose enclosing write failed.
    fn remove_execution(&self, request_id: Uuid) -> std::io::Result<()> {
        Self::remove(&self.execution_dir(), execution_id(request_id))
    }

    fn execution_for_request(&self, request_id: Uuid) -> RaccordResult<Option<ExecutionDossier>> {
        Self::read(&self.execution_dir(), execution_id(request_id))
    }

    /// Removes the records an operation wrote before one of its writes failed.
    fn roll_back(written: &[(PathBuf, Uuid)], write_error: RaccordError) -> RaccordError {
        for (parent, id) in written.iter().rev() {
            if let Err(rollback_error) = Self::remove(parent, *id) {
                let path = Self::record_dir(parent, *id);
                tracing::warn!("rollback of {} failed: {rollback_error}", path.display());
                return RaccordError::RollbackFailed {
                    path,
                    write_error: Box::new(write_error),
                    rollback_error,
                };
            }
        }
        write_error
    }

    fn compare_and_set_study(
        &self,
        id: Uuid,
        write: StatusWrite<StudyStatus>,
    ) -> RaccordResult<StudyCas> {
        let study_dir = self.study_dir();
        let record_dir = Self::record_dir(&study_dir, id);
        if !record_dir.is_dir() {
            return Err(RaccordError::not_found(StudyStatus::KIND.entity_name(), id));
        }

        with_record_lock(&record_dir, self.lock_wait, || {
            let mut dossier: StudyDossier = self.dossier(&study_dir, id)?;
            if dossier.status != write.expected {
                return Ok(StudyCas::REJECTED);
            }

            let execution_created = write.new == StudyStatus::Acceptee
                && self.create_execution_if_absent(dossier.request_id, dossier.client_id)?;

            dossier.status = write.new;
            dossier.remarks = write.remarks;
            dossier.updated_at = Utc::now();
            if let Err(write_error) = Self::write(&study_dir, id, &dossier) {
                if execution_created {
                    if let Err(rollback_error) = self.remove_execution(dossier.request_id) {
                        return Err(RaccordError::RollbackFailed {
                            path: record_dir.clone(),
                            write_error: Box::new(write_error),
                            rollback_error,
                        });
                    }
                }
                return Err(write_error);
            }

            Ok(StudyCas {
                applied: true,
                execution_created,
            })
        })
    }

    fn compare_and_set_execution(
        &self,
        id: Uuid,
        write: StatusWrite<ExecutionStatus>,
    ) -> RaccordResult<bool> {
        let execution_dir = self.execution_dir();
        let record_dir = Self::record_dir(&execution_dir, id);
        if !record_dir.is_dir() {
            return Err(RaccordError::not_found(
                ExecutionStatus::KIND.entity_name(),
                id,
            ));
        }

        with_record_lock(&record_dir, self.lock_wait, || {
            let mut dossier: ExecutionDossier = self.dossier(&execution_dir, id)?;
            if dossier.status != write.expected {
                return Ok(false);
            }
            dossier.status = write.new;
            dossier.remarks = write.remarks;
            dossier.updated_at = Utc::now();
            Self::write(&execution_dir, id, &dossier)?;
            Ok(true)
        })
    }

    fn create_request(&self, new: NewRequest) -> RaccordResult<CreatedRequest> {
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

        // The request goes last: once it is readable, everything it owns is too.
        let mut written: Vec<(PathBuf, Uuid)> = Vec::new();
        let result = Self::write(&self.study_dir(), study_dossier.id, &study_dossier)
            .map(|()| written.push((self.study_dir(), study_dossier.id)))
            .and_then(|()| {
                documents.iter().try_for_each(|d| {
                    Self::write(&self.documents_dir(), d.id, d)
                        .map(|()| written.push((self.documents_dir(), d.id)))
                })
            })
            .and_then(|()| Self::write(&self.requests_dir(), request.id, &request));

        if let Err(write_error) = result {
            return Err(Self::roll_back(&written, write_error));
        }

        Ok(CreatedRequest {
            request,
            study_dossier,
            documents,
        })
    }

    fn owner_request_id(&self, owner: DocumentOwner) -> RaccordResult<Uuid> {
        match owner {
            DocumentOwner::Request(id) => self.request(id).map(|r| r.id),
            DocumentOwner::StudyDossier(id) => self
                .dossier::<StudyStatus>(&self.study_dir(), id)
                .map(|d| d.request_id),
            DocumentOwner::ExecutionDossier(id) => self
                .dossier::<ExecutionStatus>(&self.execution_dir(), id)
                .map(|d| d.request_id),
            DocumentOwner::Visit(id) => {
                let visit = self.visit(id)?;
                self.dossier::<ExecutionStatus>(&self.execution_dir(), visit.execution_dossier_id)
                    .map(|d| d.request_id)
            }
        }
    }

    fn attach_documents(
        &self,
        owner: DocumentOwner,
        documents: Vec<NewDocument>,
    ) -> RaccordResult<Vec<Document>> {
        let request_id = self.owner_request_id(owner)?;
        let now = Utc::now();
        let created: Vec<Document> = documents
            .into_iter()
            .map(|d| d.into_document(request_id, owner, now))
            .collect();
        for document in &created {
            Self::write(&self.documents_dir(), document.id, document)?;
        }
        Ok(created)
    }

    fn documents_for(&self, owner: DocumentOwner) -> RaccordResult<Vec<Document>> {
        let mut out: Vec<Document> = list_records::<Document>(&self.documents_dir())?
            .into_iter()
            .filter(|d| d.owner == owner)
            .collect();
        // Oldest first, the order they were uploaded in.
        out.sort_by_key(|d| (d.created_at, d.id));
        Ok(out)
    }

    fn create_visit(&self, new: NewVisit) -> RaccordResult<Visit> {
        let dossier: ExecutionDossier =
            self.dossier(&self.execution_dir(), new.execution_dossier_id)?;

        let now = Utc::now();
        let id = Uuid::new_v4();
        let document = new
            .document
            .map(|d| d.into_document(dossier.request_id, DocumentOwner::Visit(id), now));
        let visit = Visit {
            id,
            execution_dossier_id: new.execution_dossier_id,
            responsible_id: new.responsible_id,
            date: new.date,
            remarks: new.remarks,
            visit_type: new.visit_type,
            document,
            created_at: now,
        };

        let mut written: Vec<(PathBuf, Uuid)> = Vec::new();
        if let Some(document) = &visit.document {
            Self::write(&self.documents_dir(), document.id, document)?;
            written.push((self.documents_dir(), document.id));
        }
        if let Err(write_error) = Self::write(&self.visits_dir(), id, &visit) {
            return Err(Self::roll_back(&written, write_error));
        }
        Ok(visit)
    }

    fn visit(&self, id: Uuid) -> RaccordResult<Visit> {
        Self::read(&self.visits_dir(), id)?.ok_or_else(|| RaccordError::not_found("visit", id))
    }

    fn visits(&self, filter: &VisitFilter) -> RaccordResult<Vec<Visit>> {
        let executions: HashMap<Uuid, ExecutionDossier> =
            list_records::<ExecutionDossier>(&self.execution_dir())?
                .into_iter()
                .map(|d| (d.id, d))
                .collect();
        let request_types = match filter {
            VisitFilter::RequestTypes(_) => self.request_types()?,
            VisitFilter::Client(_) => HashMap::new(),
        };

        let mut out: Vec<Visit> = list_records::<Visit>(&self.visits_dir())?
            .into_iter()
            .filter(|v| {
                let Some(dossier) = executions.get(&v.execution_dossier_id) else {
                    return false;
                };
                match filter {
                    VisitFilter::Client(client_id) => dossier.client_id == *client_id,
                    VisitFilter::RequestTypes(types) => request_types
                        .get(&dossier.request_id)
                        .is_some_and(|t| types.contains(t)),
                }
            })
            .collect();
        newest_first(&mut out, |v| (v.date, v.id));
        Ok(out)
    }
}

fn read_record<T: DeserializeOwned>(path: &Path) -> RaccordResult<Option<T>> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == IoErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(RaccordError::FileRead(e)),
    };
    serde_yaml::from_str(&contents)
        .map(Some)
        .map_err(RaccordError::YamlDeserialization)
}

/// Serializes `value` into a synced temporary file in `path`'s directory.
fn stage_record<T: Serialize>(path: &Path, value: &T) -> RaccordResult<NamedTempFile> {
    let yaml = serde_yaml::to_string(value).map_err(RaccordError::YamlSerialization)?;
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut staged = NamedTempFile::new_in(dir).map_err(RaccordError::FileWrite)?;
    staged
        .write_all(yaml.as_bytes())
        .and_then(|()| staged.as_file().sync_all())
        .map_err(RaccordError::FileWrite)?;
    Ok(staged)
}

/// Replaces the record at `path` atomically.
fn write_record<T: Serialize>(path: &Path, value: &T) -> RaccordResult<()> {
    stage_record(path, value)?
        .persist(path)
        .map_err(|e| RaccordError::FileWrite(e.error))?;
    Ok(())
}

/// Writes the record at `path` only if none exists yet. Returns whether it was written.
fn create_record<T: Serialize>(path: &Path, value: &T) -> RaccordResult<bool> {
    match stage_record(path, value)?.persist_noclobber(path) {
        Ok(_) => Ok(true),
        Err(e) if e.error.kind() == IoErrorKind::AlreadyExists => Ok(false),
        Err(e) => Err(RaccordError::FileWrite(e.error)),
    }
}

/// Reads every record under a sharded directory tree.
///
/// Directories that are not canonical record ids are skipped, as are record directories whose
/// `record.yaml` has not been written yet.
fn list_records<T: DeserializeOwned>(parent: &Path) -> RaccordResult<Vec<T>> {
    let mut records = Vec::new();
    let s1_iter = match fs::read_dir(parent) {
        Ok(it) => it,
        Err(e) if e.kind() == IoErrorKind::NotFound => return Ok(records),
        Err(e) => return Err(RaccordError::FileRead(e)),
    };

    for s1 in s1_iter.flatten() {
        let s1_path = s1.path();
        if !s1_path.is_dir() {
            continue;
        }
        let Ok(s2_iter) = fs::read_dir(&s1_path) else {
            continue;
        };

        for s2 in s2_iter.flatten() {
            let s2_path = s2.path();
            if !s2_path.is_dir() {
                continue;
            }
            let Ok(id_iter) = fs::read_dir(&s2_path) else {
                continue;
            };

            for id_ent in id_iter.flatten() {
                let id_path = id_ent.path();
                let is_record_dir = id_path.is_dir()
                    && id_ent
                        .file_name()
                        .to_str()
                        .is_some_and(RecordId::is_canonical);
                if !is_record_dir {
                    continue;
                }
                if let Some(record) = read_record(&id_path.join(RECORD_FILENAME))? {
                    records.push(record);
                }
            }
        }
    }
    Ok(records)
}

#[async_trait]
impl DossierStore for FileStore {
    async fn create_request(&self, new: NewRequest) -> RaccordResult<CreatedRequest> {
        self.blocking(move |l| l.create_request(new)).await
    }

    async fn request(&self, id: Uuid) -> RaccordResult<Request> {
        self.blocking(move |l| l.request(id)).await
    }

    async fn requests_for_client(&self, client_id: Uuid) -> RaccordResult<Vec<Request>> {
        self.blocking(move |l| {
            let mut out: Vec<Request> = list_records::<Request>(&l.requests_dir())?
                .into_iter()
                .filter(|r| r.client_id == client_id)
                .collect();
            newest_first(&mut out, |r| (r.created_at, r.id));
            Ok(out)
        })
        .await
    }

    async fn requests_by_types(&self, types: &[RequestType]) -> RaccordResult<Vec<Request>> {
        let types = types.to_vec();
        self.blocking(move |l| {
            let mut out: Vec<Request> = list_records::<Request>(&l.requests_dir())?
                .into_iter()
                .filter(|r| types.contains(&r.request_type))
                .collect();
            newest_first(&mut out, |r| (r.created_at, r.id));
            Ok(out)
        })
        .await
    }

    async fn load_study(&self, id: Uuid) -> RaccordResult<Loaded<StudyStatus>> {
        self.blocking(move |l| l.loaded(&l.study_dir(), id)).await
    }

    async fn load_execution(&self, id: Uuid) -> RaccordResult<Loaded<ExecutionStatus>> {
        self.blocking(move |l| l.loaded(&l.execution_dir(), id))
            .await
    }

    async fn compare_and_set_study_status(
        &self,
        id: Uuid,
        write: StatusWrite<StudyStatus>,
    ) -> RaccordResult<StudyCas> {
        self.blocking(move |l| l.compare_and_set_study(id, write))
            .await
    }

    async fn compare_and_set_execution_status(
        &self,
        id: Uuid,
        write: StatusWrite<ExecutionStatus>,
    ) -> RaccordResult<bool> {
        self.blocking(move |l| l.compare_and_set_execution(id, write))
            .await
    }

    async fn create_execution_if_absent(
        &self,
        request_id: Uuid,
        client_id: Uuid,
    ) -> RaccordResult<bool> {
        self.blocking(move |l| {
            l.request(request_id)?;
            l.create_execution_if_absent(request_id, client_id)
        })
        .await
    }

    async fn execution_for_request(
        &self,
        request_id: Uuid,
    ) -> RaccordResult<Option<ExecutionDossier>> {
        self.blocking(move |l| l.execution_for_request(request_id))
            .await
    }

    async fn study_dossiers(&self, filter: DossierFilter) -> RaccordResult<Vec<StudyDossier>> {
        self.blocking(move |l| l.dossiers(&l.study_dir(), &filter))
            .await
    }

    async fn execution_dossiers(
        &self,
        filter: DossierFilter,
    ) -> RaccordResult<Vec<ExecutionDossier>> {
        self.blocking(move |l| l.dossiers(&l.execution_dir(), &filter))
            .await
    }

    async fn attach_documents(
        &self,
        owner: DocumentOwner,
        documents: Vec<NewDocument>,
    ) -> RaccordResult<Vec<Document>> {
        self.blocking(move |l| l.attach_documents(owner, documents))
            .await
    }

    async fn documents_for(&self, owner: DocumentOwner) -> RaccordResult<Vec<Document>> {
        self.blocking(move |l| l.documents_for(owner)).await
    }

    async fn create_visit(&self, new: NewVisit) -> RaccordResult<Visit> {
        self.blocking(move |l| l.create_visit(new)).await
    }

    async fn visit(&self, id: Uuid) -> RaccordResult<Visit> {
        self.blocking(move |l| l.visit(id)).await
    }

    async fn visits(&self, filter: VisitFilter) -> RaccordResult<Vec<Visit>> {
        self.blocking(move |l| l.visits(&filter)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use raccord_types::{NonEmptyText, StoredPath};
    use std::sync::Arc;
    use tempfile::TempDir;

    fn store(temp_dir: &TempDir) -> FileStore {
        FileStore::open(temp_dir.path(), Duration::from_secs(5)).unwrap()
    }

    fn new_request(client_id: Uuid, request_type: RequestType) -> NewRequest {
        NewRequest {
            client_id,
            request_type,
            title: NonEmptyText::new("Branchement immeuble").unwrap(),
            city: None,
            address: Some("12 rue des Oliviers".into()),
            description: None,
            remarks: None,
            documents: vec![NewDocument {
                filename: NonEmptyText::new("cadastre.pdf").unwrap(),
                path: StoredPath::new("uploads/cadastre.pdf").unwrap(),
                label: Some("Plan cadastral".into()),
            }],
        }
    }

    fn accept(expected: StudyStatus) -> StatusWrite<StudyStatus> {
        StatusWrite {
            expected,
            new: StudyStatus::Acceptee,
            remarks: String::new(),
        }
    }

    #[tokio::test]
    async fn create_request_writes_sharded_records() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir);
        let created = store
            .create_request(new_request(Uuid::new_v4(), RequestType::Aep))
            .await
            .unwrap();

        let request_file = RecordId::from_uuid(created.request.id)
            .sharded_dir(&temp_dir.path().join(REQUESTS_DIR_NAME))
            .join(RECORD_FILENAME);
        assert!(request_file.is_file());

        let loaded = store.load_study(created.study_dossier.id).await.unwrap();
        assert_eq!(loaded.dossier.request_id, created.request.id);
        assert_eq!(loaded.request_type, RequestType::Aep);

        let docs = store
            .documents_for(DocumentOwner::Request(created.request.id))
            .await
            .unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].filename, "cadastre.pdf");
    }

    #[tokio::test]
    async fn records_survive_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let client = Uuid::new_v4();
        let request_id = {
            let store = store(&temp_dir);
            store
                .create_request(new_request(client, RequestType::LesDeux))
                .await
                .unwrap()
                .request
                .id
        };

        let reopened = store(&temp_dir);
        let requests = reopened.requests_for_client(client).await.unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].id, request_id);
        assert_eq!(requests[0].request_type, RequestType::LesDeux);
    }

    #[tokio::test]
    async fn study_acceptance_creates_one_execution() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir);
        let created = store
            .create_request(new_request(Uuid::new_v4(), RequestType::Asseu))
            .await
            .unwrap();
        let study_id = created.study_dossier.id;

        let first = store
            .compare_and_set_study_status(study_id, accept(StudyStatus::EnCours))
            .await
            .unwrap();
        assert!(first.applied && first.execution_created);

        let second = store
            .compare_and_set_study_status(study_id, accept(StudyStatus::Acceptee))
            .await
            .unwrap();
        assert!(second.applied && !second.execution_created);

        let executions = store
            .execution_dossiers(DossierFilter::Client(created.request.client_id))
            .await
            .unwrap();
        assert_eq!(executions.len(), 1);
        assert_eq!(executions[0].status, ExecutionStatus::EnCours);
        assert_eq!(
            store
                .execution_for_request(created.request.id)
                .await
                .unwrap()
                .map(|d| d.id),
            Some(executions[0].id)
        );
    }

    #[tokio::test]
    async fn study_cas_with_stale_expectation_writes_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir);
        let created = store
            .create_request(new_request(Uuid::new_v4(), RequestType::Aep))
            .await
            .unwrap();

        let result = store
            .compare_and_set_study_status(created.study_dossier.id, accept(StudyStatus::ACorriger))
            .await
            .unwrap();
        assert_eq!(result, StudyCas::REJECTED);
        assert!(store
            .execution_for_request(created.request.id)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn cas_on_missing_dossier_is_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir);
        let err = store
            .compare_and_set_execution_status(
                Uuid::new_v4(),
                StatusWrite {
                    expected: ExecutionStatus::EnCours,
                    new: ExecutionStatus::Acceptee,
                    remarks: String::new(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, RaccordError::NotFound { .. }));
    }

    #[test]
    fn record_lock_is_exclusive_while_held() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();

        let inner = with_record_lock(dir, Duration::from_secs(1), || {
            Ok(with_record_lock(dir, Duration::from_millis(20), || Ok(())))
        })
        .unwrap();
        let err = inner.unwrap_err();
        assert!(matches!(err, RaccordError::LockBusy { .. }));
        assert!(err.is_retryable());

        assert!(with_record_lock(dir, Duration::from_millis(20), || Ok(())).is_ok());
    }

    #[test]
    fn leftover_lock_file_does_not_block() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join(RECORD_LOCK_FILENAME), "4242").unwrap();

        let result = with_record_lock(temp_dir.path(), Duration::from_millis(20), || Ok(7));
        assert_eq!(result.unwrap(), 7);
    }

    #[test]
    fn record_lock_admits_one_writer_at_a_time() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let temp_dir = TempDir::new().unwrap();
        let inside = Arc::new(AtomicUsize::new(0));
        let most_inside = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let dir = temp_dir.path().to_path_buf();
                let inside = Arc::clone(&inside);
                let most_inside = Arc::clone(&most_inside);
                thread::spawn(move || {
                    with_record_lock(&dir, Duration::from_secs(10), || {
                        let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                        most_inside.fetch_max(now, Ordering::SeqCst);
                        thread::sleep(Duration::from_millis(5));
                        inside.fetch_sub(1, Ordering::SeqCst);
                        Ok(())
                    })
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap().unwrap();
        }
        assert_eq!(most_inside.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn interrupted_execution_creation_does_not_block_acceptance() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir);
        let created = store
            .create_request(new_request(Uuid::new_v4(), RequestType::Aep))
            .await
            .unwrap();

        // Debris of a creation that died before persisting the record.
        let exec_dir = RecordId::from_uuid(execution_id(created.request.id))
            .sharded_dir(&temp_dir.path().join(EXECUTION_DIR_NAME));
        fs::create_dir_all(&exec_dir).unwrap();
        fs::write(exec_dir.join(".tmpA1b2C3"), "").unwrap();

        let cas = store
            .compare_and_set_study_status(created.study_dossier.id, accept(StudyStatus::EnCours))
            .await
            .unwrap();
        assert!(cas.applied && cas.execution_created);
        let execution = store
            .execution_for_request(created.request.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(execution.status, ExecutionStatus::EnCours);
        assert_eq!(execution.request_id, created.request.id);
    }

    #[tokio::test]
    async fn failed_request_write_removes_its_study_and_documents() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir);
        let requests_dir = temp_dir.path().join(REQUESTS_DIR_NAME);
        fs::remove_dir_all(&requests_dir).unwrap();
        fs::write(&requests_dir, "not a directory").unwrap();

        let err = store
            .create_request(new_request(Uuid::new_v4(), RequestType::Aep))
            .await
            .unwrap_err();
        assert!(matches!(err, RaccordError::RecordDirCreation(_)));

        let studies: Vec<StudyDossier> =
            list_records(&temp_dir.path().join(STUDY_DIR_NAME)).unwrap();
        let documents: Vec<Document> =
            list_records(&temp_dir.path().join(DOCUMENTS_DIR_NAME)).unwrap();
        assert!(studies.is_empty());
        assert!(documents.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_execution_creation_yields_one_dossier() {
        let temp_dir = TempDir::new().unwrap();
        let store = Arc::new(store(&temp_dir));
        let created = store
            .create_request(new_request(Uuid::new_v4(), RequestType::LesDeux))
            .await
            .unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = Arc::clone(&store);
            let request_id = created.request.id;
            let client_id = created.request.client_id;
            handles.push(tokio::spawn(async move {
                store
                    .create_execution_if_absent(request_id, client_id)
                    .await
                    .unwrap()
            }));
        }
        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);

        let executions = store
            .execution_dossiers(DossierFilter::RequestTypes(vec![RequestType::LesDeux]))
            .await
            .unwrap();
        assert_eq!(executions.len(), 1);
    }

    #[tokio::test]
    async fn list_skips_non_record_entries() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir);
        let client = Uuid::new_v4();
        store
            .create_request(new_request(client, RequestType::Aep))
            .await
            .unwrap();
        fs::create_dir_all(temp_dir.path().join(REQUESTS_DIR_NAME).join("zz/zz/not-a-record"))
            .unwrap();
        fs::write(temp_dir.path().join(REQUESTS_DIR_NAME).join("README"), "notes").unwrap();

        let requests = store
            .requests_by_types(RequestType::Aep.listing_types())
            .await
            .unwrap();
        assert_eq!(requests.len(), 1);
    }

    #[tokio::test]
    async fn visit_document_is_filed_under_visit() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir);
        let created = store
            .create_request(new_request(Uuid::new_v4(), RequestType::Aep))
            .await
            .unwrap();
        store
            .compare_and_set_study_status(created.study_dossier.id, accept(StudyStatus::EnCours))
            .await
            .unwrap();
        let exec = store
            .execution_for_request(created.request.id)
            .await
            .unwrap()
            .unwrap();

        let visit = store
            .create_visit(NewVisit {
                execution_dossier_id: exec.id,
                responsible_id: Uuid::new_v4(),
                date: Utc::now(),
                remarks: Some("Compteur posé".into()),
                visit_type: Some(crate::status::VisitType::Aep),
                document: Some(NewDocument {
                    filename: NonEmptyText::new("photo.jpg").unwrap(),
                    path: StoredPath::new("uploads/photo.jpg").unwrap(),
                    label: None,
                }),
            })
            .await
            .unwrap();

        let fetched = store.visit(visit.id).await.unwrap();
        assert_eq!(fetched, visit);
        let docs = store
            .documents_for(DocumentOwner::Visit(visit.id))
            .await
            .unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].request_id, created.request.id);
    }
}
