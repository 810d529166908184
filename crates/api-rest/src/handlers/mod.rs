//! Route handlers, one module per resource.

pub mod demandes;
pub mod dossiers;
pub mod health;
pub mod visites;
