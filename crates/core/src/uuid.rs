//! Record identifiers and sharded-path utilities.
//!
//! Every record (request, dossier, visit, document) is identified by a UUID. Identifiers arrive
//! from API paths and CLI arguments in either hyphenated or simple form; both are accepted.
//!
//! The file store derives on-disk locations from the *canonical* form: 32 lowercase hex
//! characters, no hyphens (the value of `Uuid::simple()`).
//!
//! ## Sharded directory layout
//! For a canonical UUID `u`, a record lives under:
//! `parent_dir/<u[0..2]>/<u[2..4]>/<u>/`
//!
//! Example:
//! `raccord_data/dossiers_execution/55/0e/550e8400e29b41d4a716446655440000/`
//!
//! This keeps any single directory from accumulating every record.

use crate::error::{RaccordError, RaccordResult};
use std::path::{Path, PathBuf};
use std::{fmt, str::FromStr};

pub use ::uuid::Uuid;

/// A record identifier pinned to its canonical storage form.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RecordId(Uuid);

impl RecordId {
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Parses an externally supplied identifier.
    ///
    /// Hyphenated and simple forms are both accepted, case-insensitively.
    ///
    /// # Errors
    ///
    /// Returns [`RaccordError::InvalidInput`] if `input` is not a UUID.
    pub fn parse(input: &str) -> RaccordResult<Self> {
        Uuid::parse_str(input.trim())
            .map(Self)
            .map_err(|_| RaccordError::InvalidInput(format!("invalid identifier: '{input}'")))
    }

    pub fn uuid(&self) -> Uuid {
        self.0
    }

    /// Returns true if `input` is in canonical storage form.
    ///
    /// Used when walking record directories to skip anything that is not a record.
    pub fn is_canonical(input: &str) -> bool {
        input.len() == 32
            && input
                .bytes()
                .all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
    }

    /// Returns `parent_dir/<s1>/<s2>/<uuid>/` where `s1`/`s2` are derived from this UUID.
    pub fn sharded_dir(&self, parent_dir: &Path) -> PathBuf {
        let canonical = self.0.simple().to_string();
        let s1 = &canonical[0..2];
        let s2 = &canonical[2..4];
        parent_dir.join(s1).join(s2).join(&canonical)
    }
}

impl fmt::Display for RecordId {
    /// Formats the UUID in canonical form.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

impl FromStr for RecordId {
    type Err = RaccordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RecordId::parse(s)
    }
}

impl From<Uuid> for RecordId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_generates_canonical_display() {
        let id = RecordId::from_uuid(Uuid::new_v4());
        assert!(RecordId::is_canonical(&id.to_string()));
    }

    #[test]
    fn test_parse_accepts_hyphenated_and_simple_forms() {
        let hyphenated = RecordId::parse("550e8400-e29b-41d4-a716-446655440000").unwrap();
        let simple = RecordId::parse("550e8400e29b41d4a716446655440000").unwrap();
        assert_eq!(hyphenated, simple);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        let err = RecordId::parse("42").unwrap_err();
        match err {
            RaccordError::InvalidInput(msg) => assert!(msg.contains("42")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_is_canonical_invalid() {
        assert!(!RecordId::is_canonical(
            "550E8400E29B41D4A716446655440000"
        ));
        assert!(!RecordId::is_canonical(
            "550e8400-e29b-41d4-a716-446655440000"
        ));
        assert!(!RecordId::is_canonical("record.lock"));
        assert!(!RecordId::is_canonical(""));
    }

    #[test]
    fn test_sharded_dir_structure() {
        let id = RecordId::parse("550e8400e29b41d4a716446655440000").unwrap();
        let sharded = id.sharded_dir(Path::new("/data/dossiers_execution"));

        assert_eq!(
            sharded,
            PathBuf::from("/data/dossiers_execution/55/0e/550e8400e29b41d4a716446655440000")
        );
    }
}
