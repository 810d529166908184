//! Constants used throughout the Raccord core crate.
//!
//! Path and filename constants live here so the file store layout is defined in one place.

/// Default directory for record storage when no explicit directory is configured.
pub const DEFAULT_DATA_DIR: &str = "raccord_data";

/// Directory name for permit request records.
pub const REQUESTS_DIR_NAME: &str = "demandes";

/// Directory name for study dossier records.
pub const STUDY_DIR_NAME: &str = "dossiers_etude";

/// Directory name for execution dossier records.
pub const EXECUTION_DIR_NAME: &str = "dossiers_execution";

/// Directory name for site visit records.
pub const VISITS_DIR_NAME: &str = "visites";

/// Directory name for document metadata records.
pub const DOCUMENTS_DIR_NAME: &str = "documents";

/// Filename of the YAML record inside each sharded record directory.
pub const RECORD_FILENAME: &str = "record.yaml";

/// Filename of the advisory lock taken while a record is being mutated. The file itself is
/// never removed; only the OS lock on it matters.
pub const RECORD_LOCK_FILENAME: &str = "record.lock";

/// Label given to a visit's attached document when the uploader supplies none.
pub const VISIT_DOCUMENT_LABEL: &str = "Document de visite";

pub const DEFAULT_CAS_ATTEMPTS: u32 = 5;
pub const DEFAULT_STORAGE_ATTEMPTS: u32 = 3;
pub const DEFAULT_RETRY_BACKOFF_MS: u64 = 20;
pub const DEFAULT_LOCK_WAIT_MS: u64 = 1000;

/// Pause between record lock attempts, in milliseconds.
pub const LOCK_RETRY_INTERVAL_MS: u64 = 5;

/// Namespace for deriving an execution dossier's id from its request id (UUID v5), so each
/// request maps to exactly one execution record path.
pub const EXECUTION_ID_NAMESPACE: crate::uuid::Uuid =
    crate::uuid::Uuid::from_u128(0x6c1f_2b7e_9a44_4d0e_b3c5_8e2a_1f70_d915);
