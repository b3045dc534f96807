//! Cache key construction.
//!
//! Keys are deterministic and namespaced so pattern deletion can target the
//! search namespace without touching single-record entries:
//!
//! - `pdfs:search:<canonical-filter-json>:page:<n>:limit:<n>`
//! - `pdf:<id>`

use uuid::Uuid;

use crate::domain::documents::DocumentFilter;

/// Prefix shared by all paginated search entries. `SEARCH_PATTERN` deletes
/// the whole namespace; the `pdf:` record namespace never matches it.
pub const SEARCH_PREFIX: &str = "pdfs:search:";
pub const SEARCH_PATTERN: &str = "pdfs:*";
pub const RECORD_PREFIX: &str = "pdf:";

/// Key for one page of search results.
///
/// The filter serialization is canonical: `DocumentFilter` has a fixed field
/// order and absent predicates serialize as `null`, so equal filters always
/// produce equal keys regardless of how they were assembled.
pub fn search_key(filter: &DocumentFilter, page: u32, limit: u32) -> String {
    // Serializing a plain struct of Option<String> cannot fail.
    let canonical = serde_json::to_string(filter).unwrap_or_else(|_| "{}".to_string());
    format!("{SEARCH_PREFIX}{canonical}:page:{page}:limit:{limit}")
}

/// Key for a single record projection.
pub fn record_key(id: Uuid) -> String {
    format!("{RECORD_PREFIX}{id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter(subject: Option<&str>, class: Option<&str>, school: Option<&str>) -> DocumentFilter {
        DocumentFilter {
            subject: subject.map(str::to_string),
            class_name: class.map(str::to_string),
            school_name: school.map(str::to_string),
        }
    }

    #[test]
    fn equal_filters_produce_equal_keys() {
        // Assemble the same filter two different ways.
        let a = filter(Some("Physics"), None, Some("ABC"));
        let mut b = DocumentFilter {
            school_name: Some("ABC".to_string()),
            ..Default::default()
        };
        b.subject = Some("Physics".to_string());

        assert_eq!(search_key(&a, 1, 5), search_key(&b, 1, 5));
    }

    #[test]
    fn differing_tuples_produce_distinct_keys() {
        let base = filter(Some("Physics"), None, None);
        let reference = search_key(&base, 1, 5);

        assert_ne!(reference, search_key(&base, 2, 5));
        assert_ne!(reference, search_key(&base, 1, 6));
        assert_ne!(reference, search_key(&filter(Some("Chemistry"), None, None), 1, 5));
        assert_ne!(
            reference,
            search_key(&filter(None, Some("Physics"), None), 1, 5),
            "same value under a different field must not collide"
        );
    }

    #[test]
    fn search_key_matches_persisted_layout() {
        let key = search_key(&filter(Some("Physics"), None, None), 1, 5);
        assert_eq!(
            key,
            r#"pdfs:search:{"subject":"Physics","className":null,"schoolName":null}:page:1:limit:5"#
        );
    }

    #[test]
    fn namespaces_are_disjoint() {
        let id = Uuid::nil();
        let record = record_key(id);
        assert!(record.starts_with(RECORD_PREFIX));
        assert!(!record.starts_with("pdfs:"));
        assert!(search_key(&DocumentFilter::default(), 1, 5).starts_with(SEARCH_PREFIX));
    }

    #[test]
    fn record_keys_differ_per_id() {
        assert_ne!(record_key(Uuid::new_v4()), record_key(Uuid::new_v4()));
    }
}
