use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Longest label value accepted by label-indexed stores such as Kubernetes.
pub const MAX_LABEL_VALUE_LEN: usize = 63;

/// A single stored document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Deterministic key, unique within the backend namespace.
    pub name: String,
    /// Secondary index entries.
    pub labels: BTreeMap<String, String>,
    /// Opaque payload, JSON by convention.
    pub data: String,
}

impl Record {
    pub fn new(name: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            labels: BTreeMap::new(),
            data: data.into(),
        }
    }

    /// Builder-style label insertion.
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    pub fn has_label(&self, key: &str, value: &str) -> bool {
        self.labels.get(key).is_some_and(|v| v == value)
    }
}

/// Map an arbitrary string onto the restricted label alphabet.
///
/// Lowercases, replaces anything outside `[a-z0-9._-]` with `-`, trims
/// non-alphanumeric characters from both ends and caps the length at
/// [`MAX_LABEL_VALUE_LEN`]. `"Org/Team A"` becomes `"org-team-a"`.
pub fn sanitize_label_value(value: &str) -> String {
    let mapped: String = value
        .chars()
        .map(|c| {
            let c = c.to_ascii_lowercase();
            if c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-' {
                c
            } else {
                '-'
            }
        })
        .collect();

    let truncated: String = mapped.chars().take(MAX_LABEL_VALUE_LEN).collect();
    truncated
        .trim_matches(|c: char| !c.is_ascii_alphanumeric())
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_replaces_slashes_and_spaces() {
        assert_eq!(sanitize_label_value("Org/Team A"), "org-team-a");
    }

    #[test]
    fn sanitize_keeps_valid_values() {
        assert_eq!(sanitize_label_value("user_42.dev"), "user_42.dev");
    }

    #[test]
    fn sanitize_caps_length_and_trims_edges() {
        let long = format!("-{}-", "a".repeat(100));
        let out = sanitize_label_value(&long);
        assert!(out.len() <= MAX_LABEL_VALUE_LEN);
        assert!(out.starts_with('a'));
        assert!(out.ends_with('a'));
    }

    #[test]
    fn has_label_matches_exact_value() {
        let record = Record::new("a", "{}").with_label("kind", "schedule");
        assert!(record.has_label("kind", "schedule"));
        assert!(!record.has_label("kind", "other"));
        assert!(!record.has_label("missing", "schedule"));
    }
}
