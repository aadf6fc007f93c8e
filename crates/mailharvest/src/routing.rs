//! Business-key derivation and routing criteria.

use std::collections::HashMap;
use std::io::Read;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{Result, SyncError};

static EMAIL_ADDRESS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\w.-]+@[\w.-]+").unwrap());

/// Derives the business key from a sender address.
///
/// The first email-shaped substring is used (the whole input when none
/// is found). The key is the first label of the address domain, provided
/// the domain has more than one label: `invoices@billing.acme.com` →
/// `billing`. `None` is a legitimate terminal state, not an error.
pub fn extract_business(address: &str) -> Option<String> {
    let extracted = EMAIL_ADDRESS
        .find(address)
        .map(|m| m.as_str())
        .unwrap_or(address);

    let parts: Vec<&str> = extracted.split('@').collect();
    if parts.len() != 2 {
        return None;
    }

    let domain_labels: Vec<&str> = parts[1].split('.').collect();
    if domain_labels.len() > 1 {
        Some(domain_labels[0].to_string())
    } else {
        None
    }
}

/// Read-only mapping from business key to a subject pattern.
///
/// Patterns are compiled once; a pattern that fails to compile simply
/// never matches.
pub struct RoutingCriteria {
    patterns: HashMap<String, Regex>,
}

impl RoutingCriteria {
    /// Builds criteria from an already-loaded mapping.
    pub fn from_map(criteria: HashMap<String, String>) -> Self {
        let patterns = criteria
            .into_iter()
            .filter_map(|(business, pattern)| {
                Regex::new(&pattern).ok().map(|regex| (business, regex))
            })
            .collect();
        Self { patterns }
    }

    /// Loads criteria from a JSON document of the form
    /// `{"business": "pattern", ...}`.
    pub fn from_json_reader(reader: impl Read) -> Result<Self> {
        let criteria: HashMap<String, String> = serde_json::from_reader(reader)
            .map_err(|e| SyncError::Config(format!("invalid criteria document: {}", e)))?;
        Ok(Self::from_map(criteria))
    }

    /// Returns true only when `business` is a known key AND its pattern
    /// is found in `subject` (a search, not a full match). An unknown
    /// business never matches, even when the pattern would.
    pub fn should_process(&self, business: Option<&str>, subject: &str) -> bool {
        business
            .and_then(|key| self.patterns.get(key))
            .is_some_and(|pattern| pattern.is_match(subject))
    }

    /// Number of known business keys.
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    /// Whether the criteria mapping is empty.
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn criteria() -> RoutingCriteria {
        let mut map = HashMap::new();
        map.insert("billing".to_string(), r"Rechnung".to_string());
        map.insert("acme".to_string(), r"INV-\d{4}".to_string());
        RoutingCriteria::from_map(map)
    }

    #[test]
    fn test_extract_business_from_plain_address() {
        assert_eq!(
            extract_business("invoices@billing.acme.com"),
            Some("billing".to_string())
        );
    }

    #[test]
    fn test_extract_business_from_display_name_form() {
        assert_eq!(
            extract_business("Billing Dept <invoices@billing.acme.com>"),
            Some("billing".to_string())
        );
    }

    #[test]
    fn test_extract_business_without_address_shape() {
        assert_eq!(extract_business("no-domain-struct"), None);
    }

    #[test]
    fn test_extract_business_single_label_domain() {
        assert_eq!(extract_business("a@b"), None);
    }

    #[test]
    fn test_should_process_requires_known_business_and_match() {
        let criteria = criteria();
        assert!(criteria.should_process(Some("billing"), "Ihre Rechnung #42"));
        assert!(!criteria.should_process(Some("billing"), "Newsletter"));
        // Unknown business never matches, even though the pattern would.
        assert!(!criteria.should_process(Some("unknown"), "Ihre Rechnung #42"));
        assert!(!criteria.should_process(None, "Ihre Rechnung #42"));
    }

    #[test]
    fn test_should_process_searches_not_full_match() {
        let criteria = criteria();
        assert!(criteria.should_process(Some("acme"), "Fwd: INV-2026 attached"));
    }

    #[test]
    fn test_invalid_pattern_never_matches() {
        let mut map = HashMap::new();
        map.insert("broken".to_string(), "[invalid".to_string());
        let criteria = RoutingCriteria::from_map(map);
        assert!(!criteria.should_process(Some("broken"), "anything"));
    }

    #[test]
    fn test_from_json_reader() {
        let json = r#"{"billing": "Rechnung", "acme": "Invoice"}"#;
        let criteria = RoutingCriteria::from_json_reader(json.as_bytes()).unwrap();
        assert_eq!(criteria.len(), 2);
        assert!(criteria.should_process(Some("acme"), "Invoice 9"));
    }

    #[test]
    fn test_from_json_reader_rejects_malformed_document() {
        let result = RoutingCriteria::from_json_reader("not json".as_bytes());
        assert!(matches!(result, Err(SyncError::Config(_))));
    }
}
