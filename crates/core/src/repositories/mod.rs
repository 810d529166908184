//! Record services.
//!
//! Each service wraps the shared [`DossierStore`](crate::store::DossierStore) handle and applies
//! the role rules and input validation for one kind of record.

pub mod dossiers;
pub mod requests;
pub mod shared;
pub mod visits;
