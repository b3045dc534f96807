//! Document records and the search filter.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// A stored document as persisted, with its permanent asset reference.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentRecord {
    pub id: Uuid,
    pub subject: String,
    pub class_name: String,
    pub school_name: String,
    pub file_url: String,
    pub uploaded_by: String,
    pub created_at: OffsetDateTime,
}

/// Input for creating a document. `file_url` is the permanent reference the
/// asset store produced; it is never signed at rest.
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub subject: String,
    pub class_name: String,
    pub school_name: String,
    pub file_url: String,
    pub uploaded_by: String,
}

impl NewDocument {
    /// All descriptive fields are required; whitespace-only values count as
    /// missing. Error messages carry the wire-format field name.
    pub fn validate(&self) -> Result<(), String> {
        for (field, value) in [
            ("subject", &self.subject),
            ("className", &self.class_name),
            ("schoolName", &self.school_name),
        ] {
            if value.trim().is_empty() {
                return Err(format!("{field} is required"));
            }
        }
        if self.file_url.trim().is_empty() {
            return Err("fileUrl is required".to_string());
        }
        if self.uploaded_by.trim().is_empty() {
            return Err("uploadedBy is required".to_string());
        }
        Ok(())
    }
}

/// Search predicates, each an optional case-insensitive substring match.
///
/// Field order is load-bearing: the canonical serialization of this struct
/// (in declaration order, absent predicates as `null`) is embedded verbatim
/// in search cache keys, so two requests with the same predicates always
/// produce the same key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentFilter {
    pub subject: Option<String>,
    pub class_name: Option<String>,
    pub school_name: Option<String>,
}

impl DocumentFilter {
    pub fn is_empty(&self) -> bool {
        self.subject.is_none() && self.class_name.is_none() && self.school_name.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_document() -> NewDocument {
        NewDocument {
            subject: "Physics".to_string(),
            class_name: "12th Grade".to_string(),
            school_name: "ABC Public School".to_string(),
            file_url: "https://cdn.example/raw/upload/v1/2026/01/02/a-b.pdf".to_string(),
            uploaded_by: "academy@example.com".to_string(),
        }
    }

    #[test]
    fn complete_document_validates() {
        assert!(new_document().validate().is_ok());
    }

    #[test]
    fn blank_fields_are_rejected_with_wire_names() {
        let mut doc = new_document();
        doc.class_name = "   ".to_string();
        assert_eq!(doc.validate().unwrap_err(), "className is required");

        let mut doc = new_document();
        doc.school_name = String::new();
        assert_eq!(doc.validate().unwrap_err(), "schoolName is required");
    }

    #[test]
    fn filter_serialization_is_stable() {
        let filter = DocumentFilter {
            subject: Some("Physics".to_string()),
            class_name: None,
            school_name: Some("ABC".to_string()),
        };
        assert_eq!(
            serde_json::to_string(&filter).unwrap(),
            r#"{"subject":"Physics","className":null,"schoolName":"ABC"}"#
        );
    }

    #[test]
    fn empty_filter_reports_empty() {
        assert!(DocumentFilter::default().is_empty());
        assert!(
            !DocumentFilter {
                subject: Some("Math".to_string()),
                ..Default::default()
            }
            .is_empty()
        );
    }
}
