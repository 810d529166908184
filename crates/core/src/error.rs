use std::path::PathBuf;
use uuid::Uuid;

/// Classification of a [`RaccordError`] into the taxonomy callers act on.
///
/// API layers map each kind to exactly one response status; the reconciler uses it to decide
/// what is worth retrying.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidInput,
    NotFound,
    Conflict,
    StorageFailure,
    Unauthorized,
}

#[derive(Debug, thiserror::Error)]
pub enum RaccordError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("invalid status: {0}")]
    InvalidStatus(String),
    #[error("invalid request type: {0}")]
    InvalidRequestType(String),
    #[error("invalid role: {0}")]
    InvalidRole(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: Uuid },

    #[error("dossier {0} is already in its final accepted state")]
    AlreadyFinal(Uuid),
    #[error("dossier {id} kept changing under concurrent updates ({attempts} attempts)")]
    Conflict { id: Uuid, attempts: u32 },

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("failed to create record directory: {0}")]
    RecordDirCreation(std::io::Error),
    #[error("failed to read record file: {0}")]
    FileRead(std::io::Error),
    #[error("failed to write record file: {0}")]
    FileWrite(std::io::Error),
    #[error("failed to serialize YAML: {0}")]
    YamlSerialization(serde_yaml::Error),
    #[error("failed to deserialize YAML: {0}")]
    YamlDeserialization(serde_yaml::Error),
    #[error("record lock busy (path: {path}): {reason}", path = path.display())]
    LockBusy { path: PathBuf, reason: String },
    #[error(
        "write failed and rollback also failed (path: {path}): write={write_error}; rollback={rollback_error}",
        path = path.display()
    )]
    RollbackFailed {
        path: PathBuf,
        #[source]
        write_error: Box<RaccordError>,
        rollback_error: std::io::Error,
    },
    #[error("storage failure: {0}")]
    Storage(String),
}

impl RaccordError {
    pub fn not_found(entity: &'static str, id: Uuid) -> Self {
        Self::NotFound { entity, id }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidInput(_)
            | Self::InvalidStatus(_)
            | Self::InvalidRequestType(_)
            | Self::InvalidRole(_) => ErrorKind::InvalidInput,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::AlreadyFinal(_) | Self::Conflict { .. } => ErrorKind::Conflict,
            Self::Unauthorized(_) => ErrorKind::Unauthorized,
            Self::RecordDirCreation(_)
            | Self::FileRead(_)
            | Self::FileWrite(_)
            | Self::YamlSerialization(_)
            | Self::YamlDeserialization(_)
            | Self::LockBusy { .. }
            | Self::RollbackFailed { .. }
            | Self::Storage(_) => ErrorKind::StorageFailure,
        }
    }

    /// Transient storage failures that a fresh attempt may get past.
    ///
    /// Serialization errors and failed rollbacks are storage failures too, but repeating the
    /// same operation will not fix them.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RecordDirCreation(_)
                | Self::FileRead(_)
                | Self::FileWrite(_)
                | Self::LockBusy { .. }
                | Self::Storage(_)
        )
    }
}

impl From<raccord_types::TextError> for RaccordError {
    fn from(err: raccord_types::TextError) -> Self {
        Self::InvalidInput(err.to_string())
    }
}

pub type RaccordResult<T> = std::result::Result<T, RaccordError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn already_final_is_a_conflict() {
        let err = RaccordError::AlreadyFinal(Uuid::nil());
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert!(!err.is_retryable());
    }

    #[test]
    fn lock_busy_is_retryable_storage_failure() {
        let err = RaccordError::LockBusy {
            path: PathBuf::from("/tmp/x/record.lock"),
            reason: "held".into(),
        };
        assert_eq!(err.kind(), ErrorKind::StorageFailure);
        assert!(err.is_retryable());
    }

    #[test]
    fn text_errors_become_invalid_input() {
        let err: RaccordError = raccord_types::TextError::Empty.into();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }
}
