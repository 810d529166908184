//! Shared service utilities.
//!
//! Role gates and conversion of upload results into document metadata, used by every service
//! in this module.

use crate::error::{RaccordError, RaccordResult};
use crate::records::{Caller, NewDocument};
use crate::status::Role;
use raccord_types::{NonEmptyText, StoredPath};

/// One file as reported by the upload subsystem once its bytes are stored.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadedFile {
    /// Name the client uploaded the file under.
    pub filename: String,
    /// Where the upload subsystem stored it.
    pub path: String,
}

impl UploadedFile {
    pub fn new(filename: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            path: path.into(),
        }
    }

    /// A blank original name falls back to the stored file's name.
    fn into_new_document(self, label: Option<String>) -> RaccordResult<NewDocument> {
        let path = StoredPath::new(&self.path)?;
        let filename = match NonEmptyText::new(&self.filename) {
            Ok(name) => name,
            Err(_) => NonEmptyText::new(path.file_name())?,
        };
        Ok(NewDocument {
            filename,
            path,
            label: non_blank(label),
        })
    }
}

/// Fails with `Unauthorized` unless the caller holds one of `allowed`.
pub(crate) fn require_role(caller: &Caller, allowed: &[Role], action: &str) -> RaccordResult<()> {
    if allowed.contains(&caller.role) {
        Ok(())
    } else {
        Err(RaccordError::Unauthorized(format!(
            "role {} may not {action}",
            caller.role
        )))
    }
}

/// Unlabelled documents, as attached when a request is filed.
pub(crate) fn unlabelled_documents(files: Vec<UploadedFile>) -> RaccordResult<Vec<NewDocument>> {
    files
        .into_iter()
        .map(|f| f.into_new_document(None))
        .collect()
}

/// Pairs each uploaded file with its label.
///
/// # Errors
///
/// `InvalidInput` if no file was uploaded or if the counts differ.
pub(crate) fn labelled_documents(
    files: Vec<UploadedFile>,
    labels: Vec<String>,
) -> RaccordResult<Vec<NewDocument>> {
    if files.is_empty() {
        return Err(RaccordError::InvalidInput("no file provided".into()));
    }
    if files.len() != labels.len() {
        return Err(RaccordError::InvalidInput(format!(
            "{} files but {} labels",
            files.len(),
            labels.len()
        )));
    }
    files
        .into_iter()
        .zip(labels)
        .map(|(f, label)| f.into_new_document(Some(label)))
        .collect()
}

/// Trims optional free text; blank becomes `None`.
pub(crate) fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::uuid::Uuid;

    #[test]
    fn labelled_documents_requires_matching_counts() {
        let files = vec![
            UploadedFile::new("a.pdf", "uploads/a.pdf"),
            UploadedFile::new("b.pdf", "uploads/b.pdf"),
        ];
        let err = labelled_documents(files, vec!["Plan".into()]).unwrap_err();
        assert!(matches!(err, RaccordError::InvalidInput(_)));

        let err = labelled_documents(vec![], vec![]).unwrap_err();
        assert!(matches!(err, RaccordError::InvalidInput(_)));
    }

    #[test]
    fn labelled_documents_normalises_paths() {
        let docs = labelled_documents(
            vec![UploadedFile::new("plan.pdf", r"uploads\2024\plan.pdf")],
            vec!["  Plan de masse ".into()],
        )
        .unwrap();
        assert_eq!(docs[0].path.as_str(), "uploads/2024/plan.pdf");
        assert_eq!(docs[0].label.as_deref(), Some("Plan de masse"));
    }

    #[test]
    fn blank_filename_falls_back_to_stored_name() {
        let docs = unlabelled_documents(vec![UploadedFile::new(" ", "uploads/devis.pdf")]).unwrap();
        assert_eq!(docs[0].filename.as_str(), "devis.pdf");
    }

    #[test]
    fn uploaded_file_rejects_traversal() {
        let err = unlabelled_documents(vec![UploadedFile::new("x", "../etc/passwd")]).unwrap_err();
        assert!(matches!(err, RaccordError::InvalidInput(_)));
    }

    #[test]
    fn require_role_names_the_action() {
        let caller = Caller::new(Uuid::new_v4(), Role::Directeur);
        let err = require_role(&caller, &[Role::Client], "file requests").unwrap_err();
        assert!(err.to_string().contains("file requests"));
        assert!(require_role(&caller, &[Role::Directeur], "read").is_ok());
    }
}
