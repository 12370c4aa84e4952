use serde::{Deserialize, Serialize};

use super::citation::SourceKind;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    pub title: String,
    #[serde(default)]
    pub authors: Vec<String>,
    pub source: SourceKind,
    pub date: String,
    pub url: String,
}

/// Final output of a research request (spec.md §3, §4.4). Produced either by
/// normal LLM-driven synthesis or by the templated fallback path; both
/// populate every field so downstream consumers never need to branch on
/// which path produced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub title: String,
    pub research_question: String,
    /// 100-1000 chars, enforced at construction.
    pub executive_summary: String,
    pub methodology: String,
    pub mechanistic_findings: String,
    pub clinical_findings: String,
    #[serde(default)]
    pub drug_candidates: Vec<String>,
    #[serde(default)]
    pub limitations: Vec<String>,
    pub conclusion: String,
    pub references: Vec<Reference>,
    pub sources_searched: Vec<String>,
    pub total_papers_reviewed: usize,
    pub search_iterations: u32,
    /// 0.0-1.0; low (<0.3) on the fallback synthesis path.
    pub confidence_score: f32,
}

impl Report {
    /// Clamps `executive_summary` into the 100-1000 char band spec.md §3
    /// requires: short summaries are padded with the conclusion, long ones
    /// truncated. A malformed LLM summary shouldn't fail the whole report.
    pub fn normalize_executive_summary(mut self) -> Self {
        let len = self.executive_summary.chars().count();
        if len > 1000 {
            self.executive_summary = self.executive_summary.chars().take(1000).collect();
        } else if len < 100 && !self.conclusion.is_empty() {
            let mut padded = self.executive_summary.clone();
            padded.push(' ');
            padded.push_str(&self.conclusion);
            self.executive_summary = padded.chars().take(1000).collect();
        }
        self
    }
}
