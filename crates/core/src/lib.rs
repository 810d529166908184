//! # Raccord Core
//!
//! Core business logic for the connection-permit dossier backend.
//!
//! This crate contains the domain model and everything that mutates it:
//! - Requests ("demandes"), study and execution dossiers, documents and site visits
//! - The [`DossierStore`] boundary with in-memory and YAML file implementations
//! - The [`StatusReconciler`], which applies status changes with compare-and-set and enforces
//!   the two-approval rule for combined requests
//! - Services that apply role rules and input validation on top of the store
//!
//! **No API concerns**: HTTP servers, caller authentication and wire formats belong in
//! `api-rest` or `api-shared`.

pub mod config;
pub mod constants;
pub mod error;
pub mod reconcile;
pub mod records;
pub mod repositories;
pub mod status;
pub mod store;
pub mod uuid;

pub use config::{CoreConfig, RetryPolicy, StoreBackend};
pub use error::{ErrorKind, RaccordError, RaccordResult};
pub use reconcile::{Reconciled, StatusReconciler};
pub use records::Caller;
pub use repositories::dossiers::DossierService;
pub use repositories::requests::RequestService;
pub use repositories::shared::UploadedFile;
pub use repositories::visits::VisitService;
pub use status::{
    ExecutionStatus, Outcome, RequestType, RequestedStatus, Role, StudyStatus, VisitType,
};
pub use store::{open_store, DossierStore, FileStore, MemoryStore};
pub use uuid::RecordId;
