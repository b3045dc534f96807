//! Cache policy configuration.

use std::time::Duration;

use crate::domain::documents::DocumentFilter;

/// TTLs and warm-up policy for the document caches.
///
/// The record TTL must stay strictly below the signed-URL lifetime so a
/// cached projection can never serve an already-expired URL; `config`
/// validates that invariant at load time.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub enabled: bool,
    pub search_ttl: Duration,
    pub record_ttl: Duration,
    /// How many of the most recent records the warmer pre-caches.
    pub warm_recent_limit: u64,
    /// Page size used for warmed popular searches (always page 1).
    pub warm_search_limit: u32,
    /// Filters warmed at startup. Data, not logic — swap without touching
    /// warmer control flow.
    pub popular_searches: Vec<DocumentFilter>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            search_ttl: Duration::from_secs(3600),
            record_ttl: Duration::from_secs(3000),
            warm_recent_limit: 20,
            warm_search_limit: 6,
            popular_searches: default_popular_searches(),
        }
    }
}

pub fn default_popular_searches() -> Vec<DocumentFilter> {
    let subject = |value: &str| DocumentFilter {
        subject: Some(value.to_string()),
        ..Default::default()
    };
    let class_name = |value: &str| DocumentFilter {
        class_name: Some(value.to_string()),
        ..Default::default()
    };
    vec![
        subject("Mathematics"),
        subject("Physics"),
        subject("Chemistry"),
        class_name("10th Grade"),
        class_name("12th Grade"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_ttls_are_positive_and_ordered() {
        let config = CacheConfig::default();
        assert!(config.search_ttl > Duration::ZERO);
        assert!(config.record_ttl > Duration::ZERO);
        assert!(config.record_ttl < config.search_ttl);
    }

    #[test]
    fn default_popular_searches_are_single_field_filters() {
        for filter in default_popular_searches() {
            let fields = [&filter.subject, &filter.class_name, &filter.school_name]
                .iter()
                .filter(|field| field.is_some())
                .count();
            assert_eq!(fields, 1);
        }
    }
}
