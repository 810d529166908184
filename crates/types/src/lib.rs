//! Validated primitive types shared across the Raccord crates.

/// Errors that can occur when creating validated text types.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TextError {
    /// The input text was empty or contained only whitespace
    #[error("Text cannot be empty")]
    Empty,
    /// The stored path contained a parent-directory component
    #[error("Path must not contain '..' components: {0}")]
    ParentTraversal(String),
}

/// A string type that guarantees non-empty content.
///
/// The input is trimmed of leading and trailing whitespace during construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NonEmptyText(String);

impl NonEmptyText {
    /// Creates a new `NonEmptyText` from the given input.
    ///
    /// Returns `Err(TextError::Empty)` if the trimmed input is empty.
    pub fn new(input: impl AsRef<str>) -> Result<Self, TextError> {
        let trimmed = input.as_ref().trim();
        if trimmed.is_empty() {
            return Err(TextError::Empty);
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Returns the inner string as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl std::fmt::Display for NonEmptyText {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for NonEmptyText {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl serde::Serialize for NonEmptyText {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> serde::Deserialize<'de> for NonEmptyText {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        NonEmptyText::new(&s).map_err(serde::de::Error::custom)
    }
}

/// Location of an uploaded file as reported by the upload subsystem.
///
/// Separators are normalised to `/` so that paths recorded from Windows hosts compare equal to
/// the same path recorded elsewhere. Parent-directory components are rejected.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StoredPath(String);

impl StoredPath {
    pub fn new(input: impl AsRef<str>) -> Result<Self, TextError> {
        let normalised = input.as_ref().trim().replace('\\', "/");
        if normalised.is_empty() {
            return Err(TextError::Empty);
        }
        if normalised.split('/').any(|segment| segment == "..") {
            return Err(TextError::ParentTraversal(normalised));
        }
        Ok(Self(normalised))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Final path segment, used as a fallback display name.
    pub fn file_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }
}

impl std::fmt::Display for StoredPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl serde::Serialize for StoredPath {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> serde::Deserialize<'de> for StoredPath {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        StoredPath::new(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_empty_text_trims_input() {
        let text = NonEmptyText::new("  Raccordement rue Ibn Sina  ").unwrap();
        assert_eq!(text.as_str(), "Raccordement rue Ibn Sina");
    }

    #[test]
    fn non_empty_text_rejects_whitespace() {
        assert_eq!(NonEmptyText::new(" \t\n"), Err(TextError::Empty));
    }

    #[test]
    fn non_empty_text_deserialize_rejects_empty_string() {
        let result: Result<NonEmptyText, _> = serde_json::from_str("\"   \"");
        assert!(result.is_err());
    }

    #[test]
    fn stored_path_normalises_backslashes() {
        let path = StoredPath::new(r"uploads\2024\plan.pdf").unwrap();
        assert_eq!(path.as_str(), "uploads/2024/plan.pdf");
        assert_eq!(path.file_name(), "plan.pdf");
    }

    #[test]
    fn stored_path_rejects_parent_traversal() {
        let err = StoredPath::new("uploads/../etc/passwd").unwrap_err();
        assert!(matches!(err, TextError::ParentTraversal(_)));
    }

    #[test]
    fn stored_path_serializes_as_plain_string() {
        let path = StoredPath::new(r"a\b.png").unwrap();
        assert_eq!(serde_json::to_string(&path).unwrap(), "\"a/b.png\"");
    }
}
