use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::citation::Citation;

/// Open mapping of provider-specific metadata (pmid, doi, cited_by_count,
/// is_open_access, ...). A `BTreeMap` rather than `serde_json::Map` keeps
/// iteration order deterministic for the canonical-ID lookups below.
pub type Metadata = BTreeMap<String, Value>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    pub content: String,
    pub citation: Citation,
    /// 0.0-1.0, clamped at construction.
    pub relevance: f32,
    #[serde(default)]
    pub metadata: Metadata,
}

impl Evidence {
    pub fn new(content: impl Into<String>, citation: Citation, relevance: f32) -> Self {
        Self {
            content: content.into(),
            citation,
            relevance: relevance.clamp(0.0, 1.0),
            metadata: Metadata::new(),
        }
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(Value::as_str).map(str::trim).filter(|v| !v.is_empty())
    }

    /// Canonical dedup key, priority order `pmid:` > `doi:` > `url:`
    /// (spec.md §3). A DOI is lower-cased so two records differing only in
    /// DOI case still collide.
    pub fn canonical_id(&self) -> String {
        if let Some(pmid) = self.metadata_str("pmid") {
            return format!("pmid:{pmid}");
        }
        if let Some(doi) = self.metadata_str("doi") {
            return format!("doi:{}", doi.to_ascii_lowercase());
        }
        format!("url:{}", self.citation.url)
    }

    /// Shallow-merges `other`'s metadata into `self`, keeping `self`'s
    /// values on key collision ("first-in wins for content; metadata is
    /// merged shallowly", spec.md §3).
    pub fn merge_metadata_from(&mut self, other: &Evidence) {
        for (key, value) in &other.metadata {
            self.metadata.entry(key.clone()).or_insert_with(|| value.clone());
        }
    }
}
