//! # Tumorboard Types
//!
//! Validated value types shared by the core, API and CLI crates.
//!
//! Identifiers arriving from HTTP paths, CLI arguments or directory listings are embedded in
//! file names by the record sources, so they are validated once, at construction, and carried
//! as newtypes from then on.

use std::fmt;

/// Errors that can occur when creating validated text types.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TextError {
    /// The input text was empty or contained only whitespace
    #[error("Text cannot be empty")]
    Empty,
    /// The identifier contains characters that are not allowed in file names
    #[error("invalid identifier '{0}': only ASCII letters, digits, '-', '_' and '.' are allowed")]
    InvalidIdentifier(String),
}

/// A string type that guarantees non-empty content.
///
/// This type wraps a `String` and ensures it contains at least one non-whitespace character.
/// The input is automatically trimmed of leading and trailing whitespace during construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NonEmptyText(String);

impl NonEmptyText {
    /// Creates a new `NonEmptyText` from the given input.
    ///
    /// # Errors
    ///
    /// Returns `TextError::Empty` if the trimmed input is empty.
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
}

impl fmt::Display for NonEmptyText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
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

/// Trims and checks an identifier that will be used as part of a file or directory name.
fn validate_identifier(input: &str) -> Result<String, TextError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(TextError::Empty);
    }
    let allowed = trimmed
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if !allowed || trimmed.starts_with('.') {
        return Err(TextError::InvalidIdentifier(trimmed.to_owned()));
    }
    Ok(trimmed.to_owned())
}

/// Identifier of a patient case.
///
/// Opaque to the rest of the system, but restricted to a file-name-safe alphabet because the
/// file sources derive paths such as `patient_<id>/patient_<id>_complete_workflow.json` from it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PatientId(String);

impl PatientId {
    /// Parses and validates a patient identifier.
    ///
    /// # Errors
    ///
    /// Returns `TextError::Empty` for blank input and `TextError::InvalidIdentifier` when the
    /// identifier contains path separators or other characters outside the allowed set.
    pub fn parse(input: impl AsRef<str>) -> Result<Self, TextError> {
        validate_identifier(input.as_ref()).map(Self)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PatientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for PatientId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::str::FromStr for PatientId {
    type Err = TextError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl serde::Serialize for PatientId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> serde::Deserialize<'de> for PatientId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        PatientId::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Identifier chosen by a study participant at registration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ParticipantId(String);

impl ParticipantId {
    /// Parses and validates a participant identifier.
    ///
    /// # Errors
    ///
    /// Same rules as [`PatientId::parse`]; participant ids end up inside evaluation ids.
    pub fn parse(input: impl AsRef<str>) -> Result<Self, TextError> {
        validate_identifier(input.as_ref()).map(Self)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl serde::Serialize for ParticipantId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> serde::Deserialize<'de> for ParticipantId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        ParticipantId::parse(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_empty_text_trims_and_rejects_blank() {
        assert_eq!(NonEmptyText::new("  Oncologist ").unwrap().as_str(), "Oncologist");
        assert_eq!(NonEmptyText::new(" \t ").unwrap_err(), TextError::Empty);
    }

    #[test]
    fn test_patient_id_accepts_file_name_safe_values() {
        for id in ["1", "42", "case-07", "A_12.v2"] {
            let parsed = PatientId::parse(id).expect("id should be accepted");
            assert_eq!(parsed.as_str(), id);
        }
    }

    #[test]
    fn test_patient_id_rejects_path_traversal() {
        for id in ["../etc", "a/b", "a\\b", ".hidden", "with space"] {
            assert!(
                matches!(PatientId::parse(id), Err(TextError::InvalidIdentifier(_))),
                "{id} should be rejected"
            );
        }
        assert_eq!(PatientId::parse("   ").unwrap_err(), TextError::Empty);
    }

    #[test]
    fn test_patient_id_deserialize_validates() {
        let ok: PatientId = serde_json::from_str("\"17\"").expect("valid id");
        assert_eq!(ok.to_string(), "17");
        assert!(serde_json::from_str::<PatientId>("\"../17\"").is_err());
    }

    #[test]
    fn test_patient_ids_order_lexically() {
        let mut ids = vec![
            PatientId::parse("b").unwrap(),
            PatientId::parse("a").unwrap(),
        ];
        ids.sort();
        assert_eq!(ids[0].as_str(), "a");
    }
}
