//! Identifier - Composite internal identifiers and import strings
//!
//! Resources are addressed remotely by a tuple of scoping IDs (e.g. project ID
//! and instance ID). Internally they are tracked by joining that tuple with a
//! reserved separator, which is also the format accepted on import.

use thiserror::Error;

/// Reserved separator between the parts of a composite identifier
pub const SEPARATOR: char = ',';

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentifierError {
    #[error("identifier part '{0}' must not contain '{SEPARATOR}'")]
    ContainsSeparator(String),

    #[error("identifier part at position {0} is empty")]
    EmptyPart(usize),

    #[error("Expected import identifier with format: {expected}  Got: {got:?}")]
    InvalidImportFormat { expected: String, got: String },
}

/// Check that a single identifier part can be safely joined
pub fn validate_no_separator(part: &str) -> Result<(), IdentifierError> {
    if part.contains(SEPARATOR) {
        Err(IdentifierError::ContainsSeparator(part.to_string()))
    } else {
        Ok(())
    }
}

/// Build the internal identifier from its scoping parts, in order
pub fn build_internal_id<S: AsRef<str>>(parts: &[S]) -> Result<String, IdentifierError> {
    for (i, part) in parts.iter().enumerate() {
        let part = part.as_ref();
        if part.is_empty() {
            return Err(IdentifierError::EmptyPart(i));
        }
        validate_no_separator(part)?;
    }
    Ok(parts
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join(&SEPARATOR.to_string()))
}

/// Split an import identifier into exactly `fields.len()` non-empty parts
///
/// `fields` names the parts in order and is only used for the error message.
pub fn parse_import_id(import_id: &str, fields: &[&str]) -> Result<Vec<String>, IdentifierError> {
    let parts: Vec<&str> = import_id.split(SEPARATOR).collect();
    if parts.len() != fields.len() || parts.iter().any(|p| p.is_empty()) {
        let expected = fields
            .iter()
            .map(|f| format!("[{}]", f))
            .collect::<Vec<_>>()
            .join(&SEPARATOR.to_string());
        return Err(IdentifierError::InvalidImportFormat {
            expected,
            got: import_id.to_string(),
        });
    }
    Ok(parts.into_iter().map(str::to_string).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_joins_in_order() {
        let id = build_internal_id(&["pid", "iid"]).unwrap();
        assert_eq!(id, "pid,iid");
    }

    #[test]
    fn build_then_parse_is_identity() {
        let tuples: [&[&str]; 3] = [
            &["only"],
            &["project", "instance"],
            &["project", "eu01", "cluster-name"],
        ];
        for tuple in tuples {
            let id = build_internal_id(tuple).unwrap();
            let fields = vec!["f"; tuple.len()];
            let parsed = parse_import_id(&id, &fields).unwrap();
            assert_eq!(parsed, tuple);
        }
    }

    #[test]
    fn build_rejects_separator() {
        let err = build_internal_id(&["pid", "a,b"]).unwrap_err();
        assert_eq!(err, IdentifierError::ContainsSeparator("a,b".to_string()));
    }

    #[test]
    fn build_rejects_empty_part() {
        assert_eq!(
            build_internal_id(&["pid", ""]).unwrap_err(),
            IdentifierError::EmptyPart(1)
        );
    }

    #[test]
    fn parse_rejects_wrong_shape() {
        let fields = ["project_id", "instance_id"];
        assert!(parse_import_id("pid", &fields).is_err());
        assert!(parse_import_id("pid,", &fields).is_err());
        assert!(parse_import_id(",iid", &fields).is_err());
        assert!(parse_import_id("a,b,c", &fields).is_err());

        let err = parse_import_id("pid", &fields).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Expected import identifier with format: [project_id],[instance_id]  Got: \"pid\""
        );
    }
}
